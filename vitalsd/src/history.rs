//! Bounded, durable snapshot history.
//!
//! The whole history lives in one JSON array. Every append writes the next
//! state to a sibling temp file, fsyncs it and renames it over the real file,
//! so the file on disk is always either the previous or the new array.
//! In memory the published state is an `Arc` that is swapped only after the
//! rename succeeded; readers clone the `Arc` and never wait on disk I/O.

use crate::error::StorageError;
use crate::types::Snapshot;
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

pub const DEFAULT_MAX_ENTRIES: usize = 100;

type State = Arc<VecDeque<Snapshot>>;

pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
    writer: Mutex<()>,
    published: RwLock<State>,
}

impl HistoryStore {
    /// Load the history at `path`, falling back to an empty history when the
    /// file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let capacity = capacity.max(1);

        let entries = match load(&path) {
            Ok(Some(mut entries)) => {
                let excess = entries.len().saturating_sub(capacity);
                entries.drain(..excess);
                info!(
                    "[history] loaded {} snapshots from {}",
                    entries.len(),
                    path.display()
                );
                entries
            }
            Ok(None) => {
                info!("[history] no history at {}; starting empty", path.display());
                VecDeque::new()
            }
            Err(err) => {
                warn!("[history] {err}; starting with an empty history");
                VecDeque::new()
            }
        };

        Self {
            path,
            capacity,
            writer: Mutex::new(()),
            published: RwLock::new(Arc::new(entries)),
        }
    }

    /// Append a snapshot, evicting the oldest entries past capacity. The new
    /// state is on disk before it becomes visible to readers; on error
    /// nothing changes.
    pub fn append(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = VecDeque::clone(&self.state());
        next.push_back(snapshot);
        while next.len() > self.capacity {
            next.pop_front();
        }

        persist(&self.path, &next).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;

        debug!("[history] stored snapshot #{} at {}", next.len(), self.path.display());
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(())
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.state().back().cloned()
    }

    /// Full history, oldest first.
    pub fn all(&self) -> Vec<Snapshot> {
        self.state().iter().cloned().collect()
    }

    /// The newest `limit` snapshots, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<Snapshot> {
        let state = self.state();
        let skip = state.len().saturating_sub(limit);
        state.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> State {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn load(path: &Path) -> Result<Option<VecDeque<Snapshot>>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(StorageError::Corrupt {
                path: path.to_path_buf(),
                detail: err.to_string(),
            });
        }
    };

    serde_json::from_str::<VecDeque<Snapshot>>(&content)
        .map(Some)
        .map_err(|err| StorageError::Corrupt {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })
}

fn persist(path: &Path, entries: &VecDeque<Snapshot>) -> io::Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_vec_pretty(entries).map_err(io::Error::other)?;

    let tmp = temp_path(path);
    let written = write_synced(&tmp, &body).and_then(|()| fs::rename(&tmp, path));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    sync_parent(path);
    Ok(())
}

fn write_synced(path: &Path, body: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(body)?;
    file.write_all(b"\n")?;
    file.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "history.json".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

// Makes the rename itself durable. Best effort: not every platform lets you
// open a directory for syncing.
fn sync_parent(path: &Path) {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        let dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
            debug!("[history] directory sync failed for {}: {err}", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TIMESTAMP_FORMAT;
    use chrono::{Duration, NaiveDateTime};
    use std::thread;
    use tempfile::TempDir;

    fn sample(i: usize) -> Snapshot {
        let base = NaiveDateTime::parse_from_str("2024-03-01 00:00:00", TIMESTAMP_FORMAT).unwrap();
        Snapshot::new(
            base + Duration::seconds(i as i64 * 300),
            (i % 100) as f64,
            50.0,
            60.0,
        )
    }

    fn store_in(dir: &TempDir, capacity: usize) -> HistoryStore {
        HistoryStore::open(dir.path().join("server_health_log.json"), capacity)
    }

    #[test]
    fn keeps_the_last_entries_in_order() {
        for (appends, capacity) in [(0, 3), (2, 3), (3, 3), (7, 3), (12, 1)] {
            let dir = TempDir::new().unwrap();
            let store = store_in(&dir, capacity);
            let produced: Vec<Snapshot> = (0..appends).map(sample).collect();
            for snap in &produced {
                store.append(snap.clone()).unwrap();
            }

            let expected = &produced[appends.saturating_sub(capacity)..];
            assert_eq!(store.len(), appends.min(capacity));
            assert_eq!(store.all(), expected);
        }
    }

    #[test]
    fn evicts_oldest_past_one_hundred() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, DEFAULT_MAX_ENTRIES);
        for i in 0..105 {
            store.append(sample(i)).unwrap();
        }

        let all = store.all();
        assert_eq!(all.len(), 100);
        assert_eq!(all[0], sample(5), "first kept entry is the 6th appended");
        assert_eq!(store.latest(), Some(sample(104)));
    }

    #[test]
    fn empty_store_has_no_latest() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        assert!(store.is_empty());
        assert_eq!(store.latest(), None);
        assert!(store.all().is_empty());
    }

    #[test]
    fn reopening_yields_the_same_sequence() {
        let dir = TempDir::new().unwrap();
        let before = {
            let store = store_in(&dir, 5);
            for i in 0..8 {
                store.append(sample(i)).unwrap();
            }
            store.all()
        };

        let reopened = store_in(&dir, 5);
        assert_eq!(reopened.all(), before);
    }

    #[test]
    fn file_is_a_pretty_json_array() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 5);
        store.append(sample(1)).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.starts_with("[\n  {"));
        let parsed: Vec<Snapshot> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, store.all());
        assert!(!temp_path(store.path()).exists(), "temp file is renamed away");
    }

    #[test]
    fn truncated_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server_health_log.json");
        {
            let store = HistoryStore::open(&path, 10);
            for i in 0..4 {
                store.append(sample(i)).unwrap();
            }
        }
        let raw = fs::read_to_string(&path).unwrap();
        fs::write(&path, &raw[..raw.len() / 2]).unwrap();

        let store = HistoryStore::open(&path, 10);
        assert!(store.is_empty());

        // the next append replaces the damaged file
        store.append(sample(9)).unwrap();
        assert_eq!(HistoryStore::open(&path, 10).all(), vec![sample(9)]);
    }

    #[test]
    fn garbage_and_empty_files_load_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");

        fs::write(&path, b"{not json").unwrap();
        assert!(HistoryStore::open(&path, 10).is_empty());

        fs::write(&path, b"").unwrap();
        assert!(HistoryStore::open(&path, 10).is_empty());
    }

    #[test]
    fn shrinks_oversized_history_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        {
            let store = HistoryStore::open(&path, 10);
            for i in 0..10 {
                store.append(sample(i)).unwrap();
            }
        }

        let store = HistoryStore::open(&path, 4);
        assert_eq!(store.all(), (6..10).map(sample).collect::<Vec<_>>());
    }

    #[test]
    fn failed_write_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"file").unwrap();

        let store = HistoryStore::open(blocker.join("history.json"), 10);
        let err = store.append(sample(0)).unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert_eq!(store.latest(), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn recent_returns_newest_oldest_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 10);
        for i in 0..6 {
            store.append(sample(i)).unwrap();
        }
        assert_eq!(store.recent(2), vec![sample(4), sample(5)]);
        assert_eq!(store.recent(50).len(), 6);
        assert!(store.recent(0).is_empty());
    }

    #[test]
    fn readers_never_see_partial_appends() {
        const CAPACITY: usize = 16;
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir, CAPACITY));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let all = store.all();
                        assert!(all.len() <= CAPACITY);
                        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                    }
                })
            })
            .collect();

        for i in 0..150 {
            let snap = sample(i);
            store.append(snap.clone()).unwrap();
            assert_eq!(store.latest(), Some(snap.clone()));
            assert_eq!(store.all().last(), Some(&snap));
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.len(), CAPACITY);
    }
}
