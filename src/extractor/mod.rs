//! Signal extraction
//!
//! Turns news items into candidate belief updates. The tracker only sees the
//! `CandidateUpdate` shape; any extractor (keyword rules, a language model
//! call, a vendor feed) plugs in behind `SignalExtractor`.

use crate::models::{CandidateUpdate, NewsItem};
use crate::Result;
use async_trait::async_trait;

/// Trait for news → candidate update extraction
#[async_trait]
pub trait SignalExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    async fn extract(&self, item: &NewsItem) -> Result<Vec<CandidateUpdate>>;
}

/// One keyword rule: any phrase match proposes the given update
struct SignalRule {
    phrases: &'static [&'static str],
    key: &'static str,
    statement: &'static str,
    polarity: f64,
    confidence: f64,
}

/// Static rule table - zero allocation
const RULES: &[SignalRule] = &[
    SignalRule {
        phrases: &["rate hike", "interest rate increase", "fed raises"],
        key: "fed_policy",
        statement: "tightening",
        polarity: -1.0,
        confidence: 0.8,
    },
    SignalRule {
        phrases: &["rate cut", "interest rate decrease", "fed lowers"],
        key: "fed_policy",
        statement: "easing",
        polarity: 1.0,
        confidence: 0.8,
    },
    SignalRule {
        phrases: &["inflation rising", "price increases", "cpi up"],
        key: "inflation_trend",
        statement: "rising",
        polarity: -1.0,
        confidence: 0.7,
    },
    SignalRule {
        phrases: &["market crash", "sell-off", "panic"],
        key: "market_sentiment",
        statement: "fearful",
        polarity: -1.0,
        confidence: 0.9,
    },
    SignalRule {
        phrases: &["market rally", "bull market", "optimism"],
        key: "market_sentiment",
        statement: "greedy",
        polarity: 1.0,
        confidence: 0.8,
    },
];

/// Deterministic phrase-matching extractor
pub struct KeywordSignalExtractor;

impl KeywordSignalExtractor {
    /// Candidates for one news item, in rule order
    pub fn extract_sync(item: &NewsItem) -> Vec<CandidateUpdate> {
        let text = format!("{} {}", item.headline, item.body).to_lowercase();

        RULES
            .iter()
            .filter(|rule| rule.phrases.iter().any(|p| text.contains(p)))
            .map(|rule| {
                CandidateUpdate::new(
                    rule.key,
                    rule.statement,
                    rule.polarity,
                    rule.confidence,
                    item.id.clone(),
                )
                .at(item.published_at)
            })
            .collect()
    }
}

#[async_trait]
impl SignalExtractor for KeywordSignalExtractor {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn extract(&self, item: &NewsItem) -> Result<Vec<CandidateUpdate>> {
        Ok(Self::extract_sync(item))
    }
}
