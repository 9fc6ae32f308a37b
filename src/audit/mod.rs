//! Batch audit trail and snapshot digests
//!
//! The most recent committed batch results are kept so the conversational
//! layer can show why a belief moved. Snapshot digests compare whole belief states cheaply.

use crate::models::{BatchResult, Belief};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const DEFAULT_CAPACITY: usize = 1_000;

struct AuditState {
    records: VecDeque<BatchResult>,
    /// batch_id → absolute position in commit order
    index: HashMap<Uuid, u64>,
    /// Absolute position of `records[0]`
    first: u64,
}

/// The most recent committed batch results, in commit order
pub struct BatchAuditLog {
    state: Arc<RwLock<AuditState>>,
    capacity: usize,
}

impl BatchAuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Keep at most `capacity` batches, evicting the oldest first
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Arc::new(RwLock::new(AuditState {
                records: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                index: HashMap::new(),
                first: 0,
            })),
            capacity,
        }
    }

    /// Store a committed batch result
    pub async fn record(&self, result: BatchResult) -> Uuid {
        let batch_id = result.batch_id;
        let mut state = self.state.write().await;

        if state.records.len() == self.capacity {
            if let Some(evicted) = state.records.pop_front() {
                state.index.remove(&evicted.batch_id);
            }
            state.first += 1;
        }

        let position = state.first + state.records.len() as u64;
        state.index.insert(batch_id, position);
        state.records.push_back(result);
        batch_id
    }

    pub async fn get(&self, batch_id: Uuid) -> Option<BatchResult> {
        let state = self.state.read().await;
        let position = *state.index.get(&batch_id)?;
        state.records.get((position - state.first) as usize).cloned()
    }

    /// Most recent `count` batches, newest first
    pub async fn recent(&self, count: usize) -> Vec<BatchResult> {
        let state = self.state.read().await;
        state.records.iter().rev().take(count).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BatchAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA256 digest of a belief list.
/// Streams JSON straight into the hasher.
pub fn snapshot_digest(beliefs: &[Belief]) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), beliefs).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateUpdate;

    #[tokio::test]
    async fn test_record_and_recent() {
        let log = BatchAuditLog::new();
        let first = log.record(BatchResult::empty()).await;
        let second = log.record(BatchResult::empty()).await;

        assert_eq!(log.len().await, 2);
        assert_eq!(log.get(first).await.unwrap().batch_id, first);

        let recent = log.recent(1).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].batch_id, second);
        assert!(log.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_oldest_batches_are_evicted() {
        let log = BatchAuditLog::with_capacity(2);
        let first = log.record(BatchResult::empty()).await;
        let second = log.record(BatchResult::empty()).await;
        let third = log.record(BatchResult::empty()).await;

        assert_eq!(log.len().await, 2);
        assert!(log.get(first).await.is_none());
        assert_eq!(log.get(second).await.unwrap().batch_id, second);
        assert_eq!(log.get(third).await.unwrap().batch_id, third);

        let ids: Vec<Uuid> = log.recent(5).await.iter().map(|r| r.batch_id).collect();
        assert_eq!(ids, vec![third, second]);
    }

    #[test]
    fn test_digest_changes_with_state() {
        let candidate = CandidateUpdate::new("market_sentiment", "cautious", -0.2, 0.7, "seed");
        let a = vec![Belief::from_candidate(&candidate)];

        let mut b = a.clone();
        b[0].confidence = 0.71;

        assert_eq!(snapshot_digest(&a), snapshot_digest(&a.clone()));
        assert_ne!(snapshot_digest(&a), snapshot_digest(&b));
        assert_eq!(snapshot_digest(&a).len(), 64);
    }
}
