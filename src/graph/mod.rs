//! Causal graph between beliefs
//!
//! Directed, weighted "A influences B" relations. Cycles are allowed; the
//! tracker only ever follows one hop per batch, so nothing here needs to
//! detect them. Mutation is administrative and validated here.

use crate::error::BeliefError;
use crate::models::CausalLink;
use crate::Result;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CausalGraph {
    /// from_key → outgoing links, in insertion order
    outgoing: HashMap<String, Vec<CausalLink>>,
}

impl CausalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(from, to, weight)` triples
    pub fn with_links<'a, I>(links: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str, f64)>,
    {
        let mut graph = Self::new();
        for (from, to, weight) in links {
            graph.add_link(from, to, weight)?;
        }
        Ok(graph)
    }

    /// Insert a link, or overwrite the weight of an existing one
    pub fn add_link(&mut self, from_key: &str, to_key: &str, weight: f64) -> Result<()> {
        let weight = validate_link(from_key, to_key, weight)?;

        let links = self.outgoing.entry(from_key.to_string()).or_default();
        match links.iter_mut().find(|l| l.to_key == to_key) {
            Some(existing) => existing.weight = weight,
            None => links.push(CausalLink {
                from_key: from_key.to_string(),
                to_key: to_key.to_string(),
                weight,
            }),
        }

        debug!(from = from_key, to = to_key, weight, "Causal link set");
        Ok(())
    }

    /// Change the weight of an existing link
    pub fn update_weight(&mut self, from_key: &str, to_key: &str, weight: f64) -> Result<()> {
        let weight = validate_link(from_key, to_key, weight)?;

        let link = self
            .outgoing
            .get_mut(from_key)
            .and_then(|links| links.iter_mut().find(|l| l.to_key == to_key))
            .ok_or_else(|| {
                BeliefError::InvalidLink(format!("no link {} -> {}", from_key, to_key))
            })?;

        link.weight = weight;
        Ok(())
    }

    pub fn remove_link(&mut self, from_key: &str, to_key: &str) -> Option<CausalLink> {
        let links = self.outgoing.get_mut(from_key)?;
        let position = links.iter().position(|l| l.to_key == to_key)?;
        let removed = links.remove(position);

        if links.is_empty() {
            self.outgoing.remove(from_key);
        }

        Some(removed)
    }

    /// Outgoing links of `key`
    pub fn neighbors(&self, key: &str) -> &[CausalLink] {
        self.outgoing.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Links pointing at `key`
    pub fn incoming(&self, key: &str) -> Vec<&CausalLink> {
        self.links().filter(|l| l.to_key == key).collect()
    }

    pub fn links(&self) -> impl Iterator<Item = &CausalLink> {
        self.outgoing.values().flat_map(|links| links.iter())
    }

    pub fn len(&self) -> usize {
        self.outgoing.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }
}

fn validate_link(from_key: &str, to_key: &str, weight: f64) -> Result<f64> {
    if from_key.trim().is_empty() || to_key.trim().is_empty() {
        return Err(BeliefError::InvalidLink("link keys must not be empty".to_string()));
    }
    if from_key == to_key {
        return Err(BeliefError::InvalidLink(format!(
            "self-loop on '{}' is not allowed",
            from_key
        )));
    }
    if weight.is_nan() {
        return Err(BeliefError::InvalidLink(format!(
            "weight for {} -> {} is NaN",
            from_key, to_key
        )));
    }
    Ok(weight.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_neighbors() {
        let mut graph = CausalGraph::new();
        graph.add_link("fed_policy", "interest_rates", 0.9).unwrap();
        graph.add_link("fed_policy", "market_sentiment", -0.3).unwrap();

        let neighbors = graph.neighbors("fed_policy");
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].to_key, "interest_rates");
        assert!(graph.neighbors("interest_rates").is_empty());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_self_loop_rejected() {
        let mut graph = CausalGraph::new();
        let result = graph.add_link("a", "a", 0.5);
        assert!(matches!(result, Err(BeliefError::InvalidLink(_))));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_weight_clamped_and_nan_rejected() {
        let mut graph = CausalGraph::new();
        graph.add_link("a", "b", 4.0).unwrap();
        graph.add_link("b", "c", -2.5).unwrap();
        assert_eq!(graph.neighbors("a")[0].weight, 1.0);
        assert_eq!(graph.neighbors("b")[0].weight, -1.0);
        assert!(graph.add_link("c", "d", f64::NAN).is_err());
    }

    #[test]
    fn test_add_is_upsert() {
        let mut graph = CausalGraph::new();
        graph.add_link("a", "b", 0.2).unwrap();
        graph.add_link("a", "b", 0.7).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.neighbors("a")[0].weight, 0.7);
    }

    #[test]
    fn test_update_and_remove() {
        let mut graph = CausalGraph::with_links([("a", "b", 0.5), ("b", "a", 0.5)]).unwrap();

        graph.update_weight("a", "b", -0.4).unwrap();
        assert_eq!(graph.neighbors("a")[0].weight, -0.4);
        assert!(graph.update_weight("a", "z", 0.1).is_err());

        assert_eq!(graph.incoming("a").len(), 1);
        let removed = graph.remove_link("b", "a").unwrap();
        assert_eq!(removed.weight, 0.5);
        assert!(graph.remove_link("b", "a").is_none());
        assert_eq!(graph.len(), 1);
    }
}
