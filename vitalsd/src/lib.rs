pub mod api;
pub mod capability;
pub mod commands;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fanout;
pub mod history;
pub mod host;
pub mod metrics;
pub mod monitor;
pub mod sampler;
pub mod sinks;
pub mod source;
pub mod types;
pub mod ui;

pub use config::Config;
pub use evaluator::{Thresholds, evaluate};
pub use fanout::{FanOut, Sink};
pub use history::HistoryStore;
pub use metrics::Metrics;
pub use monitor::MonitorContext;
pub use types::{HealthEvent, Severity, Snapshot, Status};
