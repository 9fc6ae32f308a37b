//! Belief persistence layer
//!
//! Responsible for storing and loading beliefs with their full history.
//! `InMemoryBeliefStore` is the development default; `JsonFileBeliefStore`
//! keeps the same state in a JSON document on disk.

use crate::error::BeliefError;
use crate::models::{Belief, HistorySnapshot};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod file;
pub use file::JsonFileBeliefStore;

/// Trait for belief persistence
#[async_trait::async_trait]
pub trait BeliefStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Belief>>;
    async fn put(&self, belief: Belief) -> Result<()>;
    /// Beliefs that have not been retired, ordered by key
    async fn list_active(&self) -> Result<Vec<Belief>>;
    /// Every belief, retired ones included, ordered by key
    async fn list_all(&self) -> Result<Vec<Belief>>;
    async fn append_history(&self, key: &str, snapshot: HistorySnapshot) -> Result<()>;
    /// Write several beliefs as one unit: all become visible, or none do
    async fn commit(&self, beliefs: Vec<Belief>) -> Result<()>;
}

/// In-memory belief store for development and tests
pub struct InMemoryBeliefStore {
    beliefs: Arc<RwLock<HashMap<String, Belief>>>,
}

impl InMemoryBeliefStore {
    pub fn new() -> Self {
        Self {
            beliefs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryBeliefStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn sorted(beliefs: impl Iterator<Item = Belief>) -> Vec<Belief> {
    let mut out: Vec<Belief> = beliefs.collect();
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

#[async_trait::async_trait]
impl BeliefStore for InMemoryBeliefStore {
    async fn get(&self, key: &str) -> Result<Option<Belief>> {
        let beliefs = self.beliefs.read().await;
        Ok(beliefs.get(key).cloned())
    }

    async fn put(&self, belief: Belief) -> Result<()> {
        let mut beliefs = self.beliefs.write().await;
        beliefs.insert(belief.key.clone(), belief);
        Ok(())
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
        let mut beliefs = self.beliefs.write().await;

        let belief = beliefs
            .get_mut(key)
            .ok_or_else(|| BeliefError::NotFound(key.to_string()))?;

        belief.push_snapshot(snapshot);
        Ok(())
    }

    async fn commit(&self, batch: Vec<Belief>) -> Result<()> {
        // One write guard for the whole batch, so readers see all or nothing
        let mut beliefs = self.beliefs.write().await;
        for belief in batch {
            beliefs.insert(belief.key.clone(), belief);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateUpdate, ChangeKind};
    use chrono::Utc;

    fn belief(key: &str, confidence: f64) -> Belief {
        Belief::from_candidate(&CandidateUpdate::new(key, "steady", 0.5, confidence, "seed"))
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = InMemoryBeliefStore::new();
        store.put(belief("economic_growth", 0.6)).await.unwrap();

        let loaded = store.get("economic_growth").await.unwrap().unwrap();
        assert_eq!(loaded.confidence, 0.6);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_skips_retired() {
        let store = InMemoryBeliefStore::new();
        let mut retired = belief("b", 0.4);
        retired.active = false;

        store.commit(vec![belief("c", 0.5), retired, belief("a", 0.7)]).await.unwrap();

        let active: Vec<String> = store
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.key)
            .collect();
        assert_eq!(active, vec!["a", "c"]);
        assert_eq!(store.list_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_append_history() {
        let store = InMemoryBeliefStore::new();
        store.put(belief("a", 0.5)).await.unwrap();

        let snapshot = HistorySnapshot {
            statement: "imported".to_string(),
            confidence: 0.3,
            polarity: 0.0,
            timestamp: Utc::now(),
            source_ref: "archive".to_string(),
            change: ChangeKind::Reinforced,
            competing_statement: None,
            sequence: 0,
        };
        store.append_history("a", snapshot.clone()).await.unwrap();

        let loaded = store.get("a").await.unwrap().unwrap();
        assert_eq!(loaded.history().len(), 2);
        assert_eq!(loaded.history()[1], snapshot);
        // current state is untouched
        assert_eq!(loaded.confidence, 0.5);

        let missing = store.append_history("zzz", snapshot).await;
        assert!(matches!(missing, Err(BeliefError::NotFound(_))));
    }
}
