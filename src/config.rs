//! Tracker configuration
//!
//! Every tuning constant of the confidence model lives here so tests and
//! deployments can set them as parameters.

use crate::error::BeliefError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Configuration for the belief tracker and its confidence model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    /// Confidence never decays below this value
    pub decay_floor: f64,
    /// Share of the above-floor confidence kept per day without evidence
    pub daily_retention: f64,
    /// Hours after the last write before decay starts
    pub decay_grace_hours: f64,
    /// Upper bound for confidence gained through reinforcement
    pub reinforcement_ceiling: f64,
    /// Upper bound after a contradiction; must sit below the reinforcement ceiling
    pub contradiction_ceiling: f64,
    /// Weight given to the incoming evidence when blending a contradiction
    pub recency_weight: f64,
    /// Polarities with a magnitude at or below this count as neutral
    pub polarity_tolerance: f64,
    /// Multiplier applied to one-hop causal influence
    pub propagation_damping: f64,
    /// Consecutive contradictions before a belief is retired
    pub retire_after_contradictions: u32,
    /// Number of entries returned in the summary change feed
    pub recent_changes_limit: usize,
    /// Upper bound on a single signal extractor call
    pub extraction_timeout: Duration,
    /// Committed batches kept in the audit log; older ones are evicted
    pub audit_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            decay_floor: 0.1,
            daily_retention: 0.95,
            decay_grace_hours: 0.0,
            reinforcement_ceiling: 0.95,
            contradiction_ceiling: 0.5,
            recency_weight: 0.6,
            polarity_tolerance: 0.1,
            propagation_damping: 0.5,
            retire_after_contradictions: 3,
            recent_changes_limit: 5,
            extraction_timeout: Duration::from_secs(10),
            audit_capacity: 1_000,
        }
    }
}

impl TrackerConfig {
    /// Build a config from `BELIEF_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_f64("BELIEF_DECAY_FLOOR")? {
            config.decay_floor = v;
        }
        if let Some(v) = env_f64("BELIEF_DAILY_RETENTION")? {
            config.daily_retention = v;
        }
        if let Some(v) = env_f64("BELIEF_DECAY_GRACE_HOURS")? {
            config.decay_grace_hours = v;
        }
        if let Some(v) = env_f64("BELIEF_REINFORCEMENT_CEILING")? {
            config.reinforcement_ceiling = v;
        }
        if let Some(v) = env_f64("BELIEF_CONTRADICTION_CEILING")? {
            config.contradiction_ceiling = v;
        }
        if let Some(v) = env_f64("BELIEF_RECENCY_WEIGHT")? {
            config.recency_weight = v;
        }
        if let Some(v) = env_f64("BELIEF_POLARITY_TOLERANCE")? {
            config.polarity_tolerance = v;
        }
        if let Some(v) = env_f64("BELIEF_PROPAGATION_DAMPING")? {
            config.propagation_damping = v;
        }
        if let Some(v) = env_parse::<u32>("BELIEF_RETIRE_AFTER_CONTRADICTIONS")? {
            config.retire_after_contradictions = v;
        }
        if let Some(v) = env_parse::<usize>("BELIEF_RECENT_CHANGES_LIMIT")? {
            config.recent_changes_limit = v;
        }
        if let Some(ms) = env_parse::<u64>("BELIEF_EXTRACTION_TIMEOUT_MS")? {
            config.extraction_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = env_parse::<usize>("BELIEF_AUDIT_CAPACITY")? {
            config.audit_capacity = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let check = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(BeliefError::Config(msg.to_string()))
            }
        };

        check(
            (0.0..1.0).contains(&self.decay_floor),
            "decay_floor must be in [0, 1)",
        )?;
        check(
            self.daily_retention > 0.0 && self.daily_retention <= 1.0,
            "daily_retention must be in (0, 1]",
        )?;
        check(
            self.decay_grace_hours.is_finite() && self.decay_grace_hours >= 0.0,
            "decay_grace_hours must be non-negative",
        )?;
        check(
            self.reinforcement_ceiling > 0.0 && self.reinforcement_ceiling <= 1.0,
            "reinforcement_ceiling must be in (0, 1]",
        )?;
        check(
            self.contradiction_ceiling > 0.0
                && self.contradiction_ceiling < self.reinforcement_ceiling,
            "contradiction_ceiling must be positive and below reinforcement_ceiling",
        )?;
        check(
            self.recency_weight > 0.5 && self.recency_weight <= 1.0,
            "recency_weight must be in (0.5, 1]",
        )?;
        check(
            (0.0..1.0).contains(&self.polarity_tolerance),
            "polarity_tolerance must be in [0, 1)",
        )?;
        check(
            (0.0..=1.0).contains(&self.propagation_damping),
            "propagation_damping must be in [0, 1]",
        )?;
        check(
            self.retire_after_contradictions > 0,
            "retire_after_contradictions must be at least 1",
        )?;
        check(
            !self.extraction_timeout.is_zero(),
            "extraction_timeout must be non-zero",
        )?;
        check(self.audit_capacity > 0, "audit_capacity must be at least 1")?;

        Ok(())
    }
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    env_parse::<f64>(name)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| BeliefError::Config(format!("{} has invalid value '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.contradiction_ceiling < config.reinforcement_ceiling);
    }

    #[test]
    fn test_rejects_inverted_ceilings() {
        let config = TrackerConfig {
            contradiction_ceiling: 0.9,
            reinforcement_ceiling: 0.8,
            ..TrackerConfig::default()
        };
        assert!(matches!(config.validate(), Err(BeliefError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_recency_weight() {
        let config = TrackerConfig {
            recency_weight: 0.4,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_audit_capacity() {
        let config = TrackerConfig {
            audit_capacity: 0,
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_and_parse_errors() {
        env::set_var("BELIEF_PROPAGATION_DAMPING", "0.25");
        let config = TrackerConfig::from_env().unwrap();
        assert_eq!(config.propagation_damping, 0.25);

        env::set_var("BELIEF_RECENT_CHANGES_LIMIT", "lots");
        let result = TrackerConfig::from_env();
        assert!(matches!(result, Err(BeliefError::Config(_))));

        env::remove_var("BELIEF_PROPAGATION_DAMPING");
        env::remove_var("BELIEF_RECENT_CHANGES_LIMIT");
    }
}
