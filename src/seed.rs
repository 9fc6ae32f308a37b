//! Default market beliefs and causal links
//!
//! The starting picture of the advisor before any news arrives.

use crate::graph::CausalGraph;
use crate::models::{BatchResult, CandidateUpdate};
use crate::tracker::BeliefTracker;
use crate::Result;
use chrono::{DateTime, Utc};

pub const SEED_SOURCE: &str = "seed:defaults";

/// (key, statement, polarity, confidence)
const DEFAULT_BELIEFS: &[(&str, &str, f64, f64)] = &[
    ("fed_policy", "neutral", 0.0, 0.6),
    ("inflation_trend", "moderate", 0.0, 0.5),
    ("market_sentiment", "cautious", -0.3, 0.7),
    ("economic_growth", "steady", 0.3, 0.6),
    ("interest_rates", "stable", 0.0, 0.8),
    ("consumer_confidence", "moderate", 0.0, 0.5),
    ("corporate_earnings", "growing", 0.5, 0.6),
    ("geopolitical_risk", "elevated", -0.5, 0.7),
    ("technology_disruption", "accelerating", 0.4, 0.8),
    ("energy_transition", "ongoing", 0.2, 0.9),
];

/// (cause, effect, strength)
const DEFAULT_LINKS: &[(&str, &str, f64)] = &[
    ("fed_policy", "interest_rates", 0.9),
    ("interest_rates", "market_sentiment", 0.7),
    ("inflation_trend", "fed_policy", 0.8),
    ("economic_growth", "corporate_earnings", 0.8),
    ("geopolitical_risk", "market_sentiment", 0.6),
    ("consumer_confidence", "economic_growth", 0.7),
];

pub fn default_beliefs(at: DateTime<Utc>) -> Vec<CandidateUpdate> {
    DEFAULT_BELIEFS
        .iter()
        .map(|(key, statement, polarity, confidence)| {
            CandidateUpdate::new(*key, *statement, *polarity, *confidence, SEED_SOURCE).at(at)
        })
        .collect()
}

pub fn default_graph() -> Result<CausalGraph> {
    CausalGraph::with_links(DEFAULT_LINKS.iter().copied())
}

/// Install the default links and apply the default beliefs as one batch
pub async fn seed_defaults(tracker: &BeliefTracker) -> Result<BatchResult> {
    let defaults = default_graph()?;
    {
        let mut graph = tracker.graph_mut().await;
        for link in defaults.links() {
            graph.add_link(&link.from_key, &link.to_key, link.weight)?;
        }
    }

    tracker.apply_batch(default_beliefs(Utc::now())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::models::ChangeKind;
    use crate::store::InMemoryBeliefStore;

    #[test]
    fn test_default_graph() {
        let graph = default_graph().unwrap();
        assert_eq!(graph.len(), 6);
        assert_eq!(graph.neighbors("fed_policy")[0].to_key, "interest_rates");
        assert_eq!(graph.incoming("market_sentiment").len(), 2);
    }

    #[tokio::test]
    async fn test_seed_defaults() {
        let tracker =
            BeliefTracker::new(TrackerConfig::default(), Box::new(InMemoryBeliefStore::new()))
                .unwrap();

        let result = seed_defaults(&tracker).await.unwrap();
        assert_eq!(result.count(ChangeKind::Created), 10);
        assert!(result.rejected.is_empty());

        let summary = tracker.summary().await.unwrap();
        assert_eq!(summary.total_beliefs, 10);
        assert_eq!(summary.causal_links_count, 6);

        let rates = tracker.query("interest_rates").await.unwrap();
        assert_eq!(rates.statement, "stable");
    }
}
