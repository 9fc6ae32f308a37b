//! Belief tracker - the orchestrator
//!
//! VALIDATE → LOCK → MERGE → PROPAGATE (one hop) → COMMIT
//!
//! Each `apply_batch` call works on private copies of the beliefs it touches
//! and hands them to the store in a single `commit`, so readers only ever see
//! the state before the batch or the state after it.

use crate::audit::BatchAuditLog;
use crate::config::TrackerConfig;
use crate::confidence::{ConfidenceModel, Relation};
use crate::graph::CausalGraph;
use crate::models::{
    BatchResult, Belief, BeliefChange, BeliefOutcome, BeliefSummary, CandidateUpdate, ChangeKind,
    InfluencedBelief, RejectedCandidate, SnapshotOptions,
};
use crate::store::BeliefStore;
use crate::error::BeliefError;
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

pub mod locks;
pub use locks::KeyLocks;


/// Influences smaller than this are not worth a history entry
const MIN_PROPAGATED_DELTA: f64 = 1e-9;

const HIGH_CONFIDENCE: f64 = 0.7;
const LOW_CONFIDENCE: f64 = 0.4;

/// Confidence change produced by one primary update
struct PrimaryDelta {
    key: String,
    delta: f64,
}

/// Accumulated one-hop influence on a single target
struct PendingInfluence {
    target: String,
    delta: f64,
    sources: Vec<String>,
}

pub struct BeliefTracker {
    config: TrackerConfig,
    model: ConfidenceModel,
    store: Box<dyn BeliefStore>,
    graph: RwLock<CausalGraph>,
    locks: KeyLocks,
    audit_log: BatchAuditLog,
    sequence: AtomicU64,
}

impl BeliefTracker {
    pub fn new(config: TrackerConfig, store: Box<dyn BeliefStore>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            model: ConfidenceModel::from_config(&config),
            audit_log: BatchAuditLog::with_capacity(config.audit_capacity),
            config,
            store,
            graph: RwLock::new(CausalGraph::new()),
            locks: KeyLocks::new(),
            sequence: AtomicU64::new(1),
        })
    }

    pub fn with_graph(mut self, graph: CausalGraph) -> Self {
        self.graph = RwLock::new(graph);
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn model(&self) -> &ConfidenceModel {
        &self.model
    }

    pub fn audit_log(&self) -> &BatchAuditLog {
        &self.audit_log
    }

    /// Read access to the causal graph
    pub async fn graph(&self) -> RwLockReadGuard<'_, CausalGraph> {
        self.graph.read().await
    }

    /// Administrative write access; waits for in-flight batches to finish
    pub async fn graph_mut(&self) -> RwLockWriteGuard<'_, CausalGraph> {
        self.graph.write().await
    }

    // =============================
    // Write path
    // =============================

    /// Apply a batch of candidate updates as one transaction
    pub async fn apply_batch(&self, candidates: Vec<CandidateUpdate>) -> Result<BatchResult> {
        let mut result = BatchResult::empty();

        info!(
            batch_id = %result.batch_id,
            candidates = candidates.len(),
            "Applying belief batch"
        );

        // === VALIDATE ===
        let mut valid = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.into_iter().enumerate() {
            match candidate.validate() {
                Ok(()) => valid.push(candidate),
                Err(reason) => {
                    warn!(
                        batch_id = %result.batch_id,
                        index,
                        key = %candidate.target_key,
                        %reason,
                        "Rejecting candidate update"
                    );
                    result.rejected.push(RejectedCandidate {
                        index,
                        target_key: candidate.target_key,
                        reason,
                    });
                }
            }
        }

        if valid.is_empty() {
            self.audit_log.record(result.clone()).await;
            return Ok(result);
        }

        // Links are read-only for the rest of the cycle
        let graph = self.graph.read().await;

        // === LOCK ===
        let mut lock_keys: HashSet<String> = HashSet::new();
        for candidate in &valid {
            lock_keys.insert(candidate.target_key.clone());
            for link in graph.neighbors(&candidate.target_key) {
                lock_keys.insert(link.to_key.clone());
            }
        }
        let guards = self.locks.acquire(lock_keys).await;

        let mut working: HashMap<String, Belief> = HashMap::with_capacity(guards.keys().len());
        for key in guards.keys() {
            if let Some(belief) = self.store.get(key).await? {
                working.insert(key.clone(), belief);
            }
        }

        // Continue the write order of state loaded from a previous process
        let highest = working
            .values()
            .filter_map(|b| b.latest_change())
            .map(|h| h.sequence)
            .max()
            .unwrap_or(0);
        self.sequence.fetch_max(highest + 1, Ordering::Relaxed);

        // === MERGE ===
        let mut touched: Vec<String> = Vec::new();
        let mut primary_deltas: Vec<PrimaryDelta> = Vec::new();
        let mut created: HashSet<String> = HashSet::new();
        // Pre-update value of keys whose latest primary change was a reinforcement
        let mut reinforced_from: HashMap<String, f64> = HashMap::new();
        let mut batch_time = valid[0].timestamp;

        for candidate in &valid {
            if candidate.timestamp > batch_time {
                batch_time = candidate.timestamp;
            }

            let key = candidate.target_key.clone();
            let outcomes = match working.get_mut(&key) {
                None => {
                    let mut belief = Belief::from_candidate(candidate);
                    self.stamp(&mut belief);
                    debug!(key = %key, confidence = belief.confidence, "Belief created");
                    let outcome = outcome_of(&belief, ChangeKind::Created, None, &candidate.source_ref);
                    working.insert(key.clone(), belief);
                    created.insert(key.clone());
                    vec![outcome]
                }
                Some(belief) => {
                    let (outcomes, delta) = self.merge_into(belief, candidate);
                    let propagates = !created.contains(&key);
                    if propagates && belief.active && delta.abs() > MIN_PROPAGATED_DELTA {
                        primary_deltas.push(PrimaryDelta {
                            key: key.clone(),
                            delta,
                        });
                    }

                    match outcomes.last() {
                        Some(last) if last.kind == ChangeKind::Reinforced => {
                            let before = last.previous_confidence.unwrap_or(last.confidence);
                            reinforced_from.insert(key.clone(), before);
                        }
                        _ => {
                            reinforced_from.remove(&key);
                        }
                    }
                    outcomes
                }
            };

            result.outcomes.extend(outcomes);
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        // === PROPAGATE ===
        let influences = self.collect_influences(&graph, &primary_deltas);
        for influence in influences {
            let Some(target) = working.get_mut(&influence.target) else {
                continue;
            };
            if !target.active {
                continue;
            }

            let keep_above = reinforced_from.get(&influence.target).copied();
            if let Some(outcome) = self.apply_influence(target, &influence, batch_time, keep_above) {
                result.outcomes.push(outcome);
                if !touched.contains(&influence.target) {
                    touched.push(influence.target.clone());
                }
            }
        }

        drop(graph);

        // === COMMIT ===
        let staged: Vec<Belief> = touched
            .iter()
            .filter_map(|key| working.remove(key))
            .collect();

        if let Err(e) = self.store.commit(staged).await {
            error!(batch_id = %result.batch_id, error = %e, "Belief batch rolled back");
            return Err(match e {
                storage @ BeliefError::Storage(_) => storage,
                other => BeliefError::Storage(other.to_string()),
            });
        }

        drop(guards);

        info!(
            batch_id = %result.batch_id,
            created = result.count(ChangeKind::Created),
            reinforced = result.count(ChangeKind::Reinforced),
            contradicted = result.count(ChangeKind::Contradicted),
            propagated = result.count(ChangeKind::Propagated),
            retired = result.count(ChangeKind::Retired),
            rejected = result.rejected.len(),
            "Belief batch committed"
        );

        self.audit_log.record(result.clone()).await;
        Ok(result)
    }

    /// Merge one candidate into an existing belief.
    ///
    /// Returns the outcomes plus the primary confidence delta measured
    /// against the decayed pre-update value.
    fn merge_into(
        &self,
        belief: &mut Belief,
        candidate: &CandidateUpdate,
    ) -> (Vec<BeliefOutcome>, f64) {
        let elapsed = candidate.timestamp - belief.last_updated;
        let decayed = self.model.decay(belief.confidence, elapsed);
        let incoming_is_newer = candidate.timestamp >= belief.last_updated;
        let evidence = candidate.evidence_confidence;
        let source = candidate.source_ref.as_str();

        if !belief.active {
            belief.statement = candidate.proposed_statement.clone();
            belief.confidence = evidence;
            belief.polarity = candidate.proposed_polarity;
            belief.contradiction_streak = 0;
            belief.active = true;
            belief.record(ChangeKind::Revived, source, candidate.timestamp, None);
            self.stamp(belief);

            info!(key = %belief.key, confidence = belief.confidence, "Retired belief revived");
            let outcome = outcome_of(belief, ChangeKind::Revived, Some(decayed), source);
            return (vec![outcome], belief.confidence - decayed);
        }

        let relation = self.model.relation(
            belief.polarity,
            candidate.proposed_polarity,
            incoming_is_newer,
        );

        let merged = self.model.merge(decayed, evidence, relation);
        let polarity = self.model.blend_polarity(
            belief.polarity,
            decayed,
            candidate.proposed_polarity,
            evidence,
            relation,
        );

        if !relation.is_contradiction() {
            belief.statement = candidate.proposed_statement.clone();
            belief.confidence = merged;
            belief.polarity = polarity;
            belief.contradiction_streak = 0;
            belief.record(ChangeKind::Reinforced, source, candidate.timestamp, None);
            self.stamp(belief);

            let outcome = outcome_of(belief, ChangeKind::Reinforced, Some(decayed), source);
            return (vec![outcome], belief.confidence - decayed);
        }

        // The proposed statement wins once the blended direction has crossed over
        let adopts_proposed = polarity.abs() > self.model.polarity_tolerance
            && polarity.signum() == candidate.proposed_polarity.signum();

        let competing = if adopts_proposed {
            std::mem::replace(&mut belief.statement, candidate.proposed_statement.clone())
        } else {
            candidate.proposed_statement.clone()
        };

        belief.confidence = merged;
        belief.polarity = polarity;
        belief.contradiction_streak += 1;
        belief.record(ChangeKind::Contradicted, source, candidate.timestamp, Some(competing));
        self.stamp(belief);

        warn!(
            key = %belief.key,
            previous = decayed,
            confidence = belief.confidence,
            streak = belief.contradiction_streak,
            adopted = adopts_proposed,
            incoming_is_newer,
            "Contradicting evidence"
        );

        let mut outcomes = vec![outcome_of(belief, ChangeKind::Contradicted, Some(decayed), source)];

        if belief.contradiction_streak >= self.config.retire_after_contradictions {
            let before_retire = belief.confidence;
            belief.confidence = belief.confidence.min(self.model.floor);
            belief.active = false;
            belief.record(ChangeKind::Retired, source, candidate.timestamp, None);
            self.stamp(belief);

            warn!(key = %belief.key, streak = belief.contradiction_streak, "Belief retired");
            outcomes.push(outcome_of(belief, ChangeKind::Retired, Some(before_retire), source));
        }

        (outcomes, belief.confidence - decayed)
    }

    /// Sum one-hop influences per target, in order of first appearance.
    ///
    /// Only primary deltas are expanded, so a cycle contributes at most one
    /// hop in each direction and the pass always terminates.
    fn collect_influences(
        &self,
        graph: &CausalGraph,
        primary_deltas: &[PrimaryDelta],
    ) -> Vec<PendingInfluence> {
        let damping = self.config.propagation_damping;
        let mut pending: Vec<PendingInfluence> = Vec::new();

        for primary in primary_deltas {
            for link in graph.neighbors(&primary.key) {
                let influence = link.weight * primary.delta * damping;
                if influence.abs() <= MIN_PROPAGATED_DELTA {
                    continue;
                }

                match pending.iter_mut().find(|p| p.target == link.to_key) {
                    Some(existing) => {
                        existing.delta += influence;
                        if !existing.sources.contains(&primary.key) {
                            existing.sources.push(primary.key.clone());
                        }
                    }
                    None => pending.push(PendingInfluence {
                        target: link.to_key.clone(),
                        delta: influence,
                        sources: vec![primary.key.clone()],
                    }),
                }
            }
        }

        pending
    }

    /// Apply one accumulated influence.
    ///
    /// `keep_above` is the pre-update value of a target reinforced earlier in
    /// the same batch; propagation may not undo that reinforcement.
    fn apply_influence(
        &self,
        target: &mut Belief,
        influence: &PendingInfluence,
        batch_time: DateTime<Utc>,
        keep_above: Option<f64>,
    ) -> Option<BeliefOutcome> {
        let decayed = self.model.decay(target.confidence, batch_time - target.last_updated);

        // Propagation neither pushes below the floor nor lifts past the
        // reinforcement ceiling, unless the belief already sits outside them
        let mut lower = decayed.min(self.model.floor);
        if let Some(before) = keep_above {
            lower = lower.max(before.min(target.confidence));
        }
        let upper = decayed.max(self.model.reinforcement_ceiling).max(lower);
        let next = (decayed + influence.delta).clamp(lower, upper);

        if (next - decayed).abs() <= MIN_PROPAGATED_DELTA {
            return None;
        }

        let source = format!("causal:{}", influence.sources.join(","));
        target.confidence = next;
        target.record(ChangeKind::Propagated, &source, batch_time, None);
        self.stamp(target);

        debug!(
            key = %target.key,
            previous = decayed,
            confidence = target.confidence,
            sources = ?influence.sources,
            "Causal influence applied"
        );

        Some(outcome_of(target, ChangeKind::Propagated, Some(decayed), &source))
    }

    // =============================
    // Read path
    // =============================

    /// Active beliefs with confidence decayed to now
    pub async fn snapshot(&self) -> Result<Vec<Belief>> {
        self.snapshot_at(Utc::now(), SnapshotOptions::default()).await
    }

    pub async fn snapshot_with(&self, options: SnapshotOptions) -> Result<Vec<Belief>> {
        self.snapshot_at(Utc::now(), options).await
    }

    pub async fn snapshot_at(
        &self,
        now: DateTime<Utc>,
        options: SnapshotOptions,
    ) -> Result<Vec<Belief>> {
        let beliefs = if options.include_retired {
            self.store.list_all().await?
        } else {
            self.store.list_active().await?
        };

        Ok(beliefs
            .into_iter()
            .map(|b| self.decayed_view(b, now))
            .filter(|b| options.min_confidence.map_or(true, |min| b.confidence > min))
            .collect())
    }

    /// Look up one belief, retired or not, with confidence decayed to now
    pub async fn query(&self, key: &str) -> Result<Belief> {
        self.query_at(key, Utc::now()).await
    }

    pub async fn query_at(&self, key: &str, now: DateTime<Utc>) -> Result<Belief> {
        self.store
            .get(key)
            .await?
            .map(|b| self.decayed_view(b, now))
            .ok_or_else(|| BeliefError::NotFound(key.to_string()))
    }

    /// Existing active beliefs directly downstream of `key`
    pub async fn influenced(&self, key: &str) -> Result<Vec<InfluencedBelief>> {
        let links = self.graph.read().await.neighbors(key).to_vec();
        let now = Utc::now();

        let mut influenced = Vec::with_capacity(links.len());
        for link in links {
            if let Some(belief) = self.store.get(&link.to_key).await? {
                if belief.active {
                    influenced.push(InfluencedBelief {
                        belief: self.decayed_view(belief, now),
                        influence_strength: link.weight,
                    });
                }
            }
        }

        Ok(influenced)
    }

    pub async fn summary(&self) -> Result<BeliefSummary> {
        self.summary_at(Utc::now()).await
    }

    /// Confidence buckets plus the latest changes across all beliefs
    pub async fn summary_at(&self, now: DateTime<Utc>) -> Result<BeliefSummary> {
        let beliefs = self.snapshot_at(now, SnapshotOptions::default()).await?;
        let causal_links_count = self.graph.read().await.len();

        let mut changes: Vec<BeliefChange> = self
            .store
            .list_all()
            .await?
            .into_iter()
            .flat_map(|b| {
                let key = b.key.clone();
                b.history()
                    .iter()
                    .map(|snapshot| BeliefChange {
                        key: key.clone(),
                        snapshot: snapshot.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        changes.sort_by_key(|c| (c.snapshot.timestamp, c.snapshot.sequence));
        let skip = changes.len().saturating_sub(self.config.recent_changes_limit);
        let recent_changes = changes.split_off(skip);

        let total_beliefs = beliefs.len();
        let mut high_confidence = Vec::new();
        let mut medium_confidence = Vec::new();
        let mut low_confidence = Vec::new();

        for belief in beliefs {
            if belief.confidence > HIGH_CONFIDENCE {
                high_confidence.push(belief);
            } else if belief.confidence >= LOW_CONFIDENCE {
                medium_confidence.push(belief);
            } else {
                low_confidence.push(belief);
            }
        }

        Ok(BeliefSummary {
            total_beliefs,
            high_confidence,
            medium_confidence,
            low_confidence,
            causal_links_count,
            recent_changes,
        })
    }

    /// Give the newest history entry of `belief` the next write-order number
    fn stamp(&self, belief: &mut Belief) {
        belief.stamp_latest(self.sequence.fetch_add(1, Ordering::Relaxed));
    }

    fn decayed_view(&self, mut belief: Belief, now: DateTime<Utc>) -> Belief {
        belief.confidence = self.model.decay(belief.confidence, now - belief.last_updated);
        belief
    }
}

fn outcome_of(
    belief: &Belief,
    kind: ChangeKind,
    previous_confidence: Option<f64>,
    source_ref: &str,
) -> BeliefOutcome {
    BeliefOutcome {
        key: belief.key.clone(),
        kind,
        previous_confidence,
        confidence: belief.confidence,
        polarity: belief.polarity,
        source_ref: source_ref.to_string(),
    }
}
