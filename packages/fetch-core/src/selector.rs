//! Selector chains (spec §3 Data Model): ordered CSS/XPath selectors that
//! the lightweight and Playwright tiers fall back to when no API pattern
//! exists for a domain yet. Kept separate from [`crate::pattern`] because
//! selectors are scoped to a domain, not to a single endpoint shape.

use serde::{Deserialize, Serialize};

use crate::ids::SelectorChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    Css,
    XPath,
}

/// One step in a chain: try `selector`, and if it resolves zero nodes, the
/// chain moves to the next entry. `hits`/`misses` drive which selector in a
/// domain's chain is tried first the next time (most-reliable-first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorStep {
    pub kind: SelectorKind,
    pub selector: String,
    pub field: String,
    pub hits: u32,
    pub misses: u32,
}

impl SelectorStep {
    pub fn new(kind: SelectorKind, selector: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            field: field.into(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn reliability(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.5
        } else {
            self.hits as f32 / total as f32
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorChain {
    pub id: SelectorChainId,
    pub domain: String,
    pub steps: Vec<SelectorStep>,
}

impl SelectorChain {
    pub fn new(domain: impl Into<String>, steps: Vec<SelectorStep>) -> Self {
        Self {
            id: SelectorChainId::new(),
            domain: domain.into(),
            steps,
        }
    }

    /// Steps ordered most-reliable-first, ties broken by original order.
    pub fn ordered_by_reliability(&self) -> Vec<&SelectorStep> {
        let mut ordered: Vec<&SelectorStep> = self.steps.iter().collect();
        ordered.sort_by(|a, b| b.reliability().partial_cmp(&a.reliability()).unwrap_or(std::cmp::Ordering::Equal));
        ordered
    }

    pub fn record_outcome(&mut self, field: &str, hit: bool) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.field == field) {
            if hit {
                step.hits += 1;
            } else {
                step.misses += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_by_reliability_prefers_higher_hit_rate() {
        let mut chain = SelectorChain::new(
            "example.com",
            vec![
                SelectorStep::new(SelectorKind::Css, ".title-a", "title"),
                SelectorStep::new(SelectorKind::Css, ".title-b", "title"),
            ],
        );
        for _ in 0..9 {
            chain.steps[0].hits += 1;
        }
        chain.steps[0].misses += 1;
        chain.steps[1].hits += 1;
        chain.steps[1].misses += 1;

        let ordered = chain.ordered_by_reliability();
        assert_eq!(ordered[0].selector, ".title-a");
    }
}
