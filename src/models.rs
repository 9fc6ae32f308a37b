//! Core data models for the belief engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

/// What an evidence incorporation did to a belief
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Reinforced,
    Contradicted,
    Propagated,
    Retired,
    Revived,
}

/// Why a candidate update was refused
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    EmptyKey,
    ConfidenceNotFinite,
    ConfidenceOutOfRange,
    PolarityNotFinite,
    PolarityOutOfRange,
}

//
// ================= Belief =================
//

/// One entry of a belief's append-only audit trail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistorySnapshot {
    pub statement: String,
    pub confidence: f64,
    pub polarity: f64,
    pub timestamp: DateTime<Utc>,
    pub source_ref: String,
    pub change: ChangeKind,
    /// On contradiction entries, whichever statement lost out
    #[serde(default)]
    pub competing_statement: Option<String>,
    /// Tracker-wide write order; breaks ties between equal timestamps
    #[serde(default)]
    pub sequence: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Belief {
    pub key: String,
    pub statement: String,
    pub confidence: f64,
    pub polarity: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    history: Vec<HistorySnapshot>,
    pub source_refs: BTreeSet<String>,
    #[serde(default)]
    pub update_count: u32,
    #[serde(default)]
    pub contradiction_streak: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Belief {
    /// Create a belief from its first piece of evidence
    pub fn from_candidate(candidate: &CandidateUpdate) -> Self {
        let confidence = clamp_confidence(candidate.evidence_confidence);
        let polarity = clamp_polarity(candidate.proposed_polarity);

        let mut belief = Self {
            key: candidate.target_key.clone(),
            statement: candidate.proposed_statement.clone(),
            confidence,
            polarity,
            created_at: candidate.timestamp,
            last_updated: candidate.timestamp,
            history: Vec::new(),
            source_refs: BTreeSet::new(),
            update_count: 0,
            contradiction_streak: 0,
            active: true,
        };

        belief.record(ChangeKind::Created, &candidate.source_ref, candidate.timestamp, None);
        belief
    }

    /// Iterate the audit trail in insertion order
    pub fn history(&self) -> &[HistorySnapshot] {
        &self.history
    }

    pub fn latest_change(&self) -> Option<&HistorySnapshot> {
        self.history.last()
    }

    /// Append a snapshot of the current state.
    ///
    /// Clamps confidence and polarity first so no snapshot is ever stored
    /// out of range.
    pub(crate) fn record(
        &mut self,
        change: ChangeKind,
        source_ref: &str,
        timestamp: DateTime<Utc>,
        competing_statement: Option<String>,
    ) {
        self.confidence = clamp_confidence(self.confidence);
        self.polarity = clamp_polarity(self.polarity);

        if timestamp > self.last_updated {
            self.last_updated = timestamp;
        }
        if !source_ref.is_empty() {
            self.source_refs.insert(source_ref.to_string());
        }
        self.update_count += 1;

        self.history.push(HistorySnapshot {
            statement: self.statement.clone(),
            confidence: self.confidence,
            polarity: self.polarity,
            timestamp,
            source_ref: source_ref.to_string(),
            change,
            competing_statement,
            sequence: 0,
        });
    }

    /// Stamp the newest history entry with its position in the write order
    pub(crate) fn stamp_latest(&mut self, sequence: u64) {
        if let Some(latest) = self.history.last_mut() {
            latest.sequence = sequence;
        }
    }

    /// Append an externally produced snapshot without touching current state
    pub(crate) fn push_snapshot(&mut self, snapshot: HistorySnapshot) {
        self.history.push(snapshot);
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

pub fn clamp_polarity(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-1.0, 1.0)
}

//
// ================= Causal Link =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CausalLink {
    pub from_key: String,
    pub to_key: String,
    /// Sign is the direction of influence, magnitude its strength
    pub weight: f64,
}

//
// ================= Candidate Update =================
//

/// A proposed, unvalidated change to a belief
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateUpdate {
    pub target_key: String,
    pub proposed_statement: String,
    pub proposed_polarity: f64,
    pub evidence_confidence: f64,
    pub source_ref: String,
    pub timestamp: DateTime<Utc>,
}

impl CandidateUpdate {
    pub fn new(
        target_key: impl Into<String>,
        proposed_statement: impl Into<String>,
        proposed_polarity: f64,
        evidence_confidence: f64,
        source_ref: impl Into<String>,
    ) -> Self {
        Self {
            target_key: target_key.into(),
            proposed_statement: proposed_statement.into(),
            proposed_polarity,
            evidence_confidence,
            source_ref: source_ref.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), RejectionReason> {
        if self.target_key.trim().is_empty() {
            return Err(RejectionReason::EmptyKey);
        }
        if !self.evidence_confidence.is_finite() {
            return Err(RejectionReason::ConfidenceNotFinite);
        }
        if !(0.0..=1.0).contains(&self.evidence_confidence) {
            return Err(RejectionReason::ConfidenceOutOfRange);
        }
        if !self.proposed_polarity.is_finite() {
            return Err(RejectionReason::PolarityNotFinite);
        }
        if !(-1.0..=1.0).contains(&self.proposed_polarity) {
            return Err(RejectionReason::PolarityOutOfRange);
        }
        Ok(())
    }
}

//
// ================= Batch Result =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeliefOutcome {
    pub key: String,
    pub kind: ChangeKind,
    /// Decayed confidence before this step, `None` for new beliefs
    pub previous_confidence: Option<f64>,
    pub confidence: f64,
    pub polarity: f64,
    pub source_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedCandidate {
    /// Position of the candidate inside the submitted batch
    pub index: usize,
    pub target_key: String,
    pub reason: RejectionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub outcomes: Vec<BeliefOutcome>,
    pub rejected: Vec<RejectedCandidate>,
    pub applied_at: DateTime<Utc>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            outcomes: Vec::new(),
            rejected: Vec::new(),
            applied_at: Utc::now(),
        }
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }

    pub fn outcomes_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a BeliefOutcome> {
        self.outcomes.iter().filter(move |o| o.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty() && self.rejected.is_empty()
    }
}

//
// ================= Read Models =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SnapshotOptions {
    pub include_retired: bool,
    /// Drop beliefs whose current confidence is at or below this value
    pub min_confidence: Option<f64>,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            include_retired: false,
            min_confidence: None,
        }
    }
}

/// A single entry in the cross-belief change feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BeliefChange {
    pub key: String,
    pub snapshot: HistorySnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefSummary {
    pub total_beliefs: usize,
    pub high_confidence: Vec<Belief>,
    pub medium_confidence: Vec<Belief>,
    pub low_confidence: Vec<Belief>,
    pub causal_links_count: usize,
    pub recent_changes: Vec<BeliefChange>,
}

/// A belief downstream of another, with the weight of the connecting link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluencedBelief {
    pub belief: Belief,
    pub influence_strength: f64,
}

//
// ================= News =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    pub body: String,
    pub published_at: DateTime<Utc>,
}

impl NewsItem {
    pub fn new(id: impl Into<String>, headline: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            headline: headline.into(),
            body: String::new(),
            published_at: Utc::now(),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Created => "created",
            ChangeKind::Reinforced => "reinforced",
            ChangeKind::Contradicted => "contradicted",
            ChangeKind::Propagated => "propagated",
            ChangeKind::Retired => "retired",
            ChangeKind::Revived => "revived",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectionReason::EmptyKey => "target key is empty",
            RejectionReason::ConfidenceNotFinite => "evidence confidence is not a finite number",
            RejectionReason::ConfidenceOutOfRange => "evidence confidence outside [0, 1]",
            RejectionReason::PolarityNotFinite => "polarity is not a finite number",
            RejectionReason::PolarityOutOfRange => "polarity outside [-1, 1]",
        };
        write!(f, "{}", s)
    }
}
