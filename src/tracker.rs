use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{IngestError, Result};

pub const DEFAULT_TRACKER_PATH: &str = "congress_holdings_data/last_trade_id.json";

/// Last successfully ingested trade id, per calendar day (`YYYY-MM-DD`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressTracker(BTreeMap<String, i64>);

impl ProgressTracker {
    pub fn get(&self, day: &str) -> Option<i64> {
        self.0.get(day).copied()
    }

    pub fn record(&mut self, day: &str, trade_id: i64) {
        self.0.insert(day.to_string(), trade_id);
    }

    /// Id to resume after: today's entry, else the entry under the greatest key
    /// (string order, which is chronological for `YYYY-MM-DD`), else `default`.
    pub fn start_id(&self, today: &str, default: i64) -> i64 {
        self.get(today)
            .or_else(|| self.0.last_key_value().map(|(_, id)| *id))
            .unwrap_or(default)
    }
}

impl<const N: usize> From<[(&str, i64); N]> for ProgressTracker {
    fn from(entries: [(&str, i64); N]) -> Self {
        Self(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }
}

/// Durable home of the tracker.
pub trait ProgressStore {
    fn load(&self) -> Result<ProgressTracker>;
    fn save(&mut self, tracker: &ProgressTracker) -> Result<()>;
}

/// Tracker stored as a pretty-printed JSON object, rewritten in full on every save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl ToString) -> IngestError {
        IngestError::Progress {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ProgressStore for JsonFileStore {
    fn load(&self) -> Result<ProgressTracker> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no tracker at {:?}, starting empty", self.path);
                return Ok(ProgressTracker::default());
            }
            Err(e) => return Err(self.error(e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| self.error(e))
    }

    fn save(&mut self, tracker: &ProgressTracker) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(tracker)?;
        std::fs::write(&self.path, json)?;
        trace!("tracker saved to {:?}", self.path);
        Ok(())
    }
}

/// Keeps every saved snapshot; used by the update loop tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pub initial: ProgressTracker,
    pub saves: Vec<ProgressTracker>,
}

#[cfg(test)]
impl ProgressStore for MemoryStore {
    fn load(&self) -> Result<ProgressTracker> {
        Ok(self.saves.last().unwrap_or(&self.initial).clone())
    }

    fn save(&mut self, tracker: &ProgressTracker) -> Result<()> {
        self.saves.push(tracker.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: i64 = 20003780000;

    #[test]
    fn empty_uses_default() {
        assert_eq!(ProgressTracker::default().start_id("2024-01-02", DEFAULT), DEFAULT);
    }

    #[test]
    fn today_wins() {
        let t = ProgressTracker::from([("2024-01-02", 200), ("2024-01-03", 300)]);
        assert_eq!(t.start_id("2024-01-02", DEFAULT), 200);
    }

    #[test]
    fn falls_back_to_greatest_key() {
        let t = ProgressTracker::from([("2024-01-01", 100), ("2024-01-03", 300)]);
        assert_eq!(t.start_id("2024-01-02", DEFAULT), 300);
    }

    #[test]
    fn greatest_key_is_string_order() {
        // non-padded keys sort as strings, not as dates
        let t = ProgressTracker::from([("2024-9-01", 9), ("2024-10-01", 10)]);
        assert_eq!(t.start_id("2025-01-01", DEFAULT), 9);
    }

    #[test]
    fn record_overwrites_today() {
        let mut t = ProgressTracker::default();
        t.record("2024-01-02", 5);
        t.record("2024-01-02", 7);
        assert_eq!(t.get("2024-01-02"), Some(7));
        assert_eq!(t, ProgressTracker::from([("2024-01-02", 7)]));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), ProgressTracker::default());
    }

    #[test]
    fn file_roundtrip_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("data/last_trade_id.json"));
        let t = ProgressTracker::from([("2024-01-01", 100), ("2024-01-03", 300)]);
        store.save(&t).unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"2024-01-03\": 300"));
        assert_eq!(store.load().unwrap(), t);
    }

    #[test]
    fn reads_existing_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_trade_id.json");
        std::fs::write(&path, r#"{"2025-06-01": 20003780042}"#).unwrap();
        let t = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(t.get("2025-06-01"), Some(20003780042));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("last_trade_id.json");
        std::fs::write(&path, "{\"2025-06-01\": 2000").unwrap();
        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, IngestError::Progress { .. }));
    }
}
