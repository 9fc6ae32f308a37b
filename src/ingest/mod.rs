//! News ingestion boundary
//!
//! The only place that talks to the signal extractor. Every extractor call
//! is bounded by the configured timeout; a slow or failing extractor yields
//! no candidates for that item instead of an error.

use crate::extractor::SignalExtractor;
use crate::models::{BatchResult, CandidateUpdate, NewsItem};
use crate::tracker::BeliefTracker;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct NewsIngestor {
    extractor: Arc<dyn SignalExtractor>,
    tracker: Arc<BeliefTracker>,
    timeout: Duration,
}

impl NewsIngestor {
    pub fn new(extractor: Arc<dyn SignalExtractor>, tracker: Arc<BeliefTracker>) -> Self {
        let timeout = tracker.config().extraction_timeout;
        Self {
            extractor,
            tracker,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract candidates for one item, or nothing if the extractor misbehaves
    pub async fn extract(&self, item: &NewsItem) -> Vec<CandidateUpdate> {
        match tokio::time::timeout(self.timeout, self.extractor.extract(item)).await {
            Ok(Ok(candidates)) => {
                debug!(
                    news_id = %item.id,
                    extractor = self.extractor.name(),
                    candidates = candidates.len(),
                    "Signals extracted"
                );
                candidates
            }
            Ok(Err(e)) => {
                warn!(news_id = %item.id, error = %e, "Signal extraction failed");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    news_id = %item.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Signal extraction timed out"
                );
                Vec::new()
            }
        }
    }

    /// Extract every item and apply all candidates as one batch
    pub async fn ingest(&self, items: &[NewsItem]) -> Result<BatchResult> {
        let mut candidates = Vec::new();
        for item in items {
            candidates.extend(self.extract(item).await);
        }

        info!(
            items = items.len(),
            candidates = candidates.len(),
            "Ingesting news batch"
        );

        self.tracker.apply_batch(candidates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::error::BeliefError;
    use crate::extractor::KeywordSignalExtractor;
    use crate::models::ChangeKind;
    use crate::store::InMemoryBeliefStore;
    use async_trait::async_trait;

    struct Stalled;

    #[async_trait]
    impl SignalExtractor for Stalled {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn extract(&self, _item: &NewsItem) -> Result<Vec<CandidateUpdate>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    struct Broken;

    #[async_trait]
    impl SignalExtractor for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn extract(&self, _item: &NewsItem) -> Result<Vec<CandidateUpdate>> {
            Err(BeliefError::Extraction("upstream 503".to_string()))
        }
    }

    fn tracker() -> Arc<BeliefTracker> {
        Arc::new(
            BeliefTracker::new(TrackerConfig::default(), Box::new(InMemoryBeliefStore::new()))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_keyword_ingest() {
        let tracker = tracker();
        let ingestor = NewsIngestor::new(Arc::new(KeywordSignalExtractor), Arc::clone(&tracker));

        let items = vec![
            NewsItem::new("n1", "Fed lowers rates as expected"),
            NewsItem::new("n2", "Bull market extends into a fifth month"),
        ];
        let result = ingestor.ingest(&items).await.unwrap();

        assert_eq!(result.count(ChangeKind::Created), 2);
        let fed = tracker.query("fed_policy").await.unwrap();
        assert_eq!(fed.statement, "easing");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_an_empty_batch() {
        let ingestor = NewsIngestor::new(Arc::new(Stalled), tracker())
            .with_timeout(Duration::from_millis(100));

        let result = ingestor
            .ingest(&[NewsItem::new("n1", "Fed raises rates")])
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_error_is_an_empty_batch() {
        let ingestor = NewsIngestor::new(Arc::new(Broken), tracker());
        let result = ingestor
            .ingest(&[NewsItem::new("n1", "Fed raises rates")])
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
