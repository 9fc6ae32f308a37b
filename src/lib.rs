//! Market Belief Engine
//!
//! Temporal belief tracking for a conversational financial advisor:
//! - Keeps a time-indexed model of what the advisor believes about markets
//! - Merges news-derived signals as reinforcement or contradiction
//! - Decays confidence lazily on read, never below a floor
//! - Propagates changes one hop along a weighted causal graph
//! - Applies every batch atomically, serialised per belief key
//!
//! DATA FLOW:
//! NEWS → EXTRACT → VALIDATE → MERGE → PROPAGATE → COMMIT → SNAPSHOT

pub mod audit;
pub mod confidence;
pub mod config;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod ingest;
pub mod models;
pub mod seed;
pub mod store;
pub mod tracker;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use config::TrackerConfig;
pub use tracker::BeliefTracker;
