//! Durable mapping from endpoint key to the message that represents it.
//!
//! The file is a flat, pretty-printed JSON object of `"host:port"` to
//! message id.  Reads are forgiving: a missing or corrupt file simply
//! means nothing has been published yet.  Writes are not, since a ledger
//! that cannot be saved would make every restart post duplicate cards.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl Ledger {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path).await;
        debug!("Loaded {} ledger entries from {}", entries.len(), path.display());
        Self { path, entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Record `message_id` for `key`, in memory and on disk.
    ///
    /// The file is re-read and merged before writing, then replaced via a
    /// temporary sibling and a rename.
    pub async fn put(&mut self, key: &str, message_id: &str) -> Result<(), LedgerError> {
        let mut on_disk = read_entries(&self.path).await;
        on_disk.insert(key.to_string(), message_id.to_string());
        write_atomic(&self.path, &serde_json::to_string_pretty(&on_disk)?).await?;

        self.entries.insert(key.to_string(), message_id.to_string());
        Ok(())
    }
}

async fn read_entries(path: &Path) -> BTreeMap<String, String> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            warn!("Could not read {}: {}; starting empty", path.display(), e);
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        warn!("Ignoring malformed {}: {}", path.display(), e);
        BTreeMap::new()
    })
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), LedgerError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let wrap = |source| LedgerError::Write {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, contents).await.map_err(wrap)?;
    fs::rename(&tmp, path).await.map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::load(dir.path().join("post_id.json")).await;
        assert_eq!(ledger.len(), 0);
    }

    #[tokio::test]
    async fn malformed_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("post_id.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Ledger::load(&path).await.len(), 0);

        fs::write(&path, r#"["an", "array"]"#).unwrap();
        assert_eq!(Ledger::load(&path).await.len(), 0);
    }

    #[tokio::test]
    async fn put_survives_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("post_id.json");

        let mut ledger = Ledger::load(&path).await;
        ledger.put("10.0.0.1:2302", "111").await.unwrap();
        assert_eq!(ledger.get("10.0.0.1:2302"), Some("111"));

        let reloaded = Ledger::load(&path).await;
        assert_eq!(reloaded.get("10.0.0.1:2302"), Some("111"));
        assert!(!dir.path().join("post_id.json.tmp").exists());
    }

    #[tokio::test]
    async fn put_overwrites_and_merges_with_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("post_id.json");
        let mut ledger = Ledger::load(&path).await;
        ledger.put("a:1", "1").await.unwrap();

        // Written by someone else after we loaded.
        fs::write(&path, r#"{"a:1": "1", "b:2": "2"}"#).unwrap();

        ledger.put("a:1", "9").await.unwrap();
        let reloaded = Ledger::load(&path).await;
        assert_eq!(reloaded.get("a:1"), Some("9"));
        assert_eq!(reloaded.get("b:2"), Some("2"));
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn file_is_pretty_printed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("post_id.json");
        Ledger::load(&path).await.put("a:1", "1").await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n  \"a:1\": \"1\"\n}");
    }

    #[tokio::test]
    async fn write_failure_propagates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("post_id.json");
        let mut ledger = Ledger::load(&path).await;
        assert!(matches!(
            ledger.put("a:1", "1").await,
            Err(LedgerError::Write { .. })
        ));
        assert_eq!(ledger.get("a:1"), None);
    }
}
