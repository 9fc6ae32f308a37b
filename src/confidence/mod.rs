//! Confidence model
//!
//! Pure functions over confidence and polarity values. Nothing here holds
//! state or reads a clock; callers pass elapsed time explicitly.
//!
//! - `decay` erodes confidence toward a floor once the grace window passes
//! - `merge` combines existing and incoming confidence
//! - `blend_polarity` moves the directional component

use crate::config::TrackerConfig;
use crate::models::{clamp_confidence, clamp_polarity};
use chrono::Duration;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// How a piece of evidence relates to the belief it targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Reinforcing,
    /// The newer side of the two gets the recency weight
    Contradicting { incoming_is_newer: bool },
}

impl Relation {
    pub fn is_contradiction(self) -> bool {
        matches!(self, Relation::Contradicting { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceModel {
    pub floor: f64,
    pub daily_retention: f64,
    pub grace_hours: f64,
    pub reinforcement_ceiling: f64,
    pub contradiction_ceiling: f64,
    pub recency_weight: f64,
    pub polarity_tolerance: f64,
}

impl ConfidenceModel {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            floor: config.decay_floor,
            daily_retention: config.daily_retention,
            grace_hours: config.decay_grace_hours,
            reinforcement_ceiling: config.reinforcement_ceiling,
            contradiction_ceiling: config.contradiction_ceiling,
            recency_weight: config.recency_weight,
            polarity_tolerance: config.polarity_tolerance,
        }
    }

    /// Exponential decay toward the floor.
    ///
    /// `c' = floor + (c - floor) * retention^(days past grace)`. Values at or
    /// below the floor are returned unchanged; negative elapsed time counts
    /// as zero.
    pub fn decay(&self, confidence: f64, elapsed: Duration) -> f64 {
        let confidence = clamp_confidence(confidence);
        if confidence <= self.floor {
            return confidence;
        }

        let hours = (elapsed.num_milliseconds() as f64 / MILLIS_PER_HOUR).max(0.0);
        let past_grace = (hours - self.grace_hours).max(0.0);
        if past_grace == 0.0 {
            return confidence;
        }

        let retained = self.daily_retention.powf(past_grace / 24.0);
        let decayed = self.floor + (confidence - self.floor) * retained;

        decayed.clamp(self.floor, confidence)
    }

    /// Classify incoming evidence against the current polarity
    pub fn relation(
        &self,
        existing_polarity: f64,
        incoming_polarity: f64,
        incoming_is_newer: bool,
    ) -> Relation {
        if self.is_contradiction(existing_polarity, incoming_polarity) {
            Relation::Contradicting { incoming_is_newer }
        } else {
            Relation::Reinforcing
        }
    }

    /// Share of a contradiction blend given to the incoming side
    fn incoming_weight(&self, incoming_is_newer: bool) -> f64 {
        if incoming_is_newer {
            self.recency_weight
        } else {
            1.0 - self.recency_weight
        }
    }

    /// Combine the (already decayed) existing confidence with new evidence.
    ///
    /// Reinforcement is a noisy-OR capped at the reinforcement ceiling, and
    /// never lands below either input. Contradiction is an average biased
    /// toward the newer evidence, capped at the contradiction ceiling.
    pub fn merge(&self, existing: f64, incoming: f64, relation: Relation) -> f64 {
        let existing = clamp_confidence(existing);
        let incoming = clamp_confidence(incoming);

        let merged = match relation {
            Relation::Contradicting { incoming_is_newer } => {
                let w = self.incoming_weight(incoming_is_newer);
                let blended = (1.0 - w) * existing + w * incoming;
                blended.min(self.contradiction_ceiling)
            }
            Relation::Reinforcing => {
                let noisy_or = 1.0 - (1.0 - existing) * (1.0 - incoming);
                noisy_or
                    .min(self.reinforcement_ceiling)
                    .max(existing)
                    .max(incoming)
            }
        };

        clamp_confidence(merged)
    }

    /// Directional component after merging.
    ///
    /// Reinforcement weights each side by its confidence; contradiction uses
    /// the same recency weight as `merge`.
    pub fn blend_polarity(
        &self,
        existing_polarity: f64,
        existing_confidence: f64,
        incoming_polarity: f64,
        incoming_confidence: f64,
        relation: Relation,
    ) -> f64 {
        let blended = match relation {
            Relation::Contradicting { incoming_is_newer } => {
                let w = self.incoming_weight(incoming_is_newer);
                (1.0 - w) * existing_polarity + w * incoming_polarity
            }
            Relation::Reinforcing => {
                let total = existing_confidence + incoming_confidence;
                if total <= f64::EPSILON {
                    incoming_polarity
                } else {
                    (existing_polarity * existing_confidence
                        + incoming_polarity * incoming_confidence)
                        / total
                }
            }
        };

        clamp_polarity(blended)
    }

    /// Signs disagree and neither side is within the neutral band
    pub fn is_contradiction(&self, existing_polarity: f64, incoming_polarity: f64) -> bool {
        existing_polarity.abs() > self.polarity_tolerance
            && incoming_polarity.abs() > self.polarity_tolerance
            && existing_polarity.signum() != incoming_polarity.signum()
    }
}

impl Default for ConfidenceModel {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}
