use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The metrics source could not produce a reading for this tick.
#[derive(Debug, Error)]
#[error("metrics unavailable: {0}")]
pub struct CollectionError(pub String);

impl CollectionError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn unsupported(what: &str) -> Self {
        Self(format!("{what} is not supported by this source"))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// Existing history could not be read or parsed.
    #[error("history file {} is unreadable: {detail}", path.display())]
    Corrupt { path: PathBuf, detail: String },

    /// The new state could not be made durable.
    #[error("failed to persist history to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
