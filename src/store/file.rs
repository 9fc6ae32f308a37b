//! JSON file belief store
//!
//! Keeps the whole belief map in memory and mirrors it to one JSON document.
//! Each write renders the next state, writes it to a sibling temp file and
//! renames it over the target; only then is the in-memory view swapped.
//! A failed write therefore changes neither disk nor memory.

use super::{sorted, BeliefStore};
use crate::error::BeliefError;
use crate::models::{Belief, HistorySnapshot};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    version: u32,
    beliefs: Vec<Belief>,
}

pub struct JsonFileBeliefStore {
    path: PathBuf,
    beliefs: RwLock<HashMap<String, Belief>>,
    /// Serialises writers; readers only touch `beliefs`
    write_gate: Mutex<()>,
}

impl JsonFileBeliefStore {
    /// Open a store at `path`, loading existing state if the file exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let beliefs = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let state: StoredState = serde_json::from_slice(&bytes)?;
                if state.version != FORMAT_VERSION {
                    return Err(BeliefError::Storage(format!(
                        "unsupported belief file version {}",
                        state.version
                    )));
                }
                state
                    .beliefs
                    .into_iter()
                    .map(|b| (b.key.clone(), b))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), beliefs = beliefs.len(), "Belief file opened");

        Ok(Self {
            path,
            beliefs: RwLock::new(beliefs),
            write_gate: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the current state, persist it, then swap it in
    async fn write_with<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, Belief>) -> Result<()> + Send,
    {
        let _gate = self.write_gate.lock().await;

        let mut next = self.beliefs.read().await.clone();
        change(&mut next)?;

        self.persist(&next).await?;

        *self.beliefs.write().await = next;
        Ok(())
    }

    async fn persist(&self, beliefs: &HashMap<String, Belief>) -> Result<()> {
        let state = StoredState {
            version: FORMAT_VERSION,
            beliefs: sorted(beliefs.values().cloned()),
        };
        let bytes = serde_json::to_vec_pretty(&state)?;

        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            discard(&tmp).await;
            return Err(BeliefError::Storage(format!("write {}: {}", tmp.display(), e)));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            discard(&tmp).await;
            return Err(BeliefError::Storage(format!("rename {}: {}", tmp.display(), e)));
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "Belief file written");
        Ok(())
    }
}

/// Best-effort removal of a leftover temp file
async fn discard(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %tmp.display(), error = %e, "Could not remove temp belief file");
        }
    }
}

#[async_trait::async_trait]
impl BeliefStore for JsonFileBeliefStore {
    async fn get(&self, key: &str) -> Result<Option<Belief>> {
        Ok(self.beliefs.read().await.get(key).cloned())
    }

    async fn put(&self, belief: Belief) -> Result<()> {
        self.write_with(move |beliefs| {
            beliefs.insert(belief.key.clone(), belief);
            Ok(())
        })
        .await
    }

    async fn list_active(&self) -> Result<Vec<Belief>> {
        let beliefs = self.beliefs.read().await;
        Ok(sorted(beliefs.values().filter(|b| b.active).cloned()))
    }

    async fn list_all(&self) -> Result<Vec<Belief>> {
        let beliefs = self.beliefs.read().await;
        Ok(sorted(beliefs.values().cloned()))
    }

    async fn append_history(&self, key: &str, snapshot: HistorySnapshot) -> Result<()> {
        let key = key.to_string();
        self.write_with(move |beliefs| {
            let belief = beliefs
                .get_mut(&key)
                .ok_or_else(|| BeliefError::NotFound(key.clone()))?;
            belief.push_snapshot(snapshot);
            Ok(())
        })
        .await
    }

    async fn commit(&self, batch: Vec<Belief>) -> Result<()> {
        self.write_with(move |beliefs| {
            for belief in batch {
                beliefs.insert(belief.key.clone(), belief);
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateUpdate, ChangeKind};
    use chrono::Utc;

    #[tokio::test]
    async fn test_roundtrip_preserves_every_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beliefs.json");

        let mut belief = Belief::from_candidate(&CandidateUpdate::new(
            "fed_policy_stance",
            "hawkish",
            0.8,
            0.6,
            "news-1",
        ));
        belief.statement = "dovish".to_string();
        belief.polarity = -0.4;
        belief.contradiction_streak = 1;
        belief.record(ChangeKind::Contradicted, "news-2", Utc::now(), Some("hawkish".to_string()));

        let mut retired = Belief::from_candidate(&CandidateUpdate::new("old", "x", 0.1, 0.3, "n"));
        retired.active = false;

        {
            let store = JsonFileBeliefStore::open(&path).await.unwrap();
            store.commit(vec![belief.clone(), retired.clone()]).await.unwrap();
        }

        let reopened = JsonFileBeliefStore::open(&path).await.unwrap();
        let loaded = reopened.get("fed_policy_stance").await.unwrap().unwrap();
        assert_eq!(loaded, belief);
        assert_eq!(loaded.history()[0].statement, "hawkish");
        assert_eq!(loaded.history()[1].statement, "dovish");

        assert_eq!(reopened.list_active().await.unwrap().len(), 1);
        assert_eq!(reopened.get("old").await.unwrap().unwrap(), retired);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beliefs.json");
        let store = JsonFileBeliefStore::open(&path).await.unwrap();

        let missing = HistorySnapshot {
            statement: "s".to_string(),
            confidence: 0.5,
            polarity: 0.0,
            timestamp: Utc::now(),
            source_ref: "r".to_string(),
            change: ChangeKind::Reinforced,
            competing_statement: None,
            sequence: 0,
        };
        assert!(store.append_history("nope", missing).await.is_err());
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(!path.exists());
    }

    fn belief(key: &str, confidence: f64) -> Belief {
        Belief::from_candidate(&CandidateUpdate::new(key, "steady", 0.3, confidence, "seed"))
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_disk_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beliefs.json");
        let store = JsonFileBeliefStore::open(&path).await.unwrap();

        let first = belief("economic_growth", 0.6);
        store.commit(vec![first.clone()]).await.unwrap();
        let on_disk = tokio::fs::read(&path).await.unwrap();

        // A directory where the temp file goes makes the write itself fail
        let tmp = path.with_extension("json.tmp");
        tokio::fs::create_dir(&tmp).await.unwrap();

        let result = store.commit(vec![belief("economic_growth", 0.9), belief("extra", 0.5)]).await;
        assert!(matches!(result, Err(BeliefError::Storage(_))));

        assert_eq!(store.list_all().await.unwrap(), vec![first.clone()]);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), on_disk);

        tokio::fs::remove_dir(&tmp).await.unwrap();
        let reopened = JsonFileBeliefStore::open(&path).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beliefs.json");
        let store = JsonFileBeliefStore::open(&path).await.unwrap();

        // A non-empty directory at the target refuses the rename
        tokio::fs::create_dir(&path).await.unwrap();
        tokio::fs::write(path.join("keep"), b"x").await.unwrap();

        let result = store.commit(vec![belief("a", 0.5)]).await;
        assert!(matches!(result, Err(BeliefError::Storage(_))));

        assert!(!path.with_extension("json.tmp").exists());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beliefs.json");
        tokio::fs::write(&path, r#"{"version": 99, "beliefs": []}"#).await.unwrap();

        let result = JsonFileBeliefStore::open(&path).await;
        assert!(matches!(result, Err(BeliefError::Storage(_))));
    }
}
