//! Aggregate fetch statistics (spec §3 Ownership: "the Stats component
//! retains aggregate counts only" — no per-request history, just running
//! totals suitable for an inspection endpoint).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::executor::FetchResult;
use crate::renderer::Tier;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierStats {
    pub attempts: u64,
    pub successes: u64,
    pub total_duration: Duration,
}

impl TierStats {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    pub fn avg_duration(&self) -> Duration {
        if self.attempts == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.attempts as u32
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_fetches: u64,
    pub total_failures: u64,
    pub per_tier: HashMap<String, TierStats>,
    pub escalation_count: u64,
}

#[derive(Default)]
pub struct Stats {
    inner: RwLock<StatsSnapshot>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, result: &FetchResult) {
        let mut snapshot = self.inner.write().unwrap();
        snapshot.total_fetches += 1;
        snapshot.escalation_count += result.decision_trace.tier_attempts.len().saturating_sub(1) as u64;

        for attempt in &result.decision_trace.tier_attempts {
            let entry = snapshot.per_tier.entry(attempt.tier.clone()).or_default();
            entry.attempts += 1;
            entry.total_duration += attempt.duration;
            if attempt.success {
                entry.successes += 1;
            }
        }
    }

    pub fn record_failure(&self, tier: Option<Tier>, duration: Duration) {
        let mut snapshot = self.inner.write().unwrap();
        snapshot.total_fetches += 1;
        snapshot.total_failures += 1;
        if let Some(tier) = tier {
            let entry = snapshot.per_tier.entry(format!("{tier:?}")).or_default();
            entry.attempts += 1;
            entry.total_duration += duration;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ContentResult, DecisionTrace, ResultMetadata, TierAttempt, VerificationSummary};

    fn result_with_attempts(attempts: Vec<TierAttempt>) -> FetchResult {
        let mut trace = DecisionTrace::default();
        let final_tier = attempts.iter().rev().find(|a| a.success).map(|a| a.tier.clone());
        trace.tier_attempts = attempts;
        trace.summary.final_tier = final_tier;

        FetchResult {
            final_url: "https://example.com".to_string(),
            title: None,
            content: ContentResult { markdown: String::new(), text: String::new(), html: None },
            tables: vec![],
            discovered_apis: vec![],
            verification: VerificationSummary { passed: true, errors: vec![], confidence: 1.0 },
            metadata: ResultMetadata { load_time: Duration::ZERO, tier: "Intelligence".to_string(), tiers_attempted: 1 },
            decision_trace: trace,
            network_log: vec![],
        }
    }

    #[test]
    fn records_per_tier_success_rate() {
        let stats = Stats::new();
        stats.record_success(&result_with_attempts(vec![TierAttempt {
            tier: "Intelligence".to_string(),
            duration: Duration::from_millis(200),
            success: true,
            extraction_strategy: "test".to_string(),
            validation_details: None,
            failure_reason: None,
        }]));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_fetches, 1);
        let tier = &snapshot.per_tier["Intelligence"];
        assert_eq!(tier.attempts, 1);
        assert_eq!(tier.success_rate(), 1.0);
    }

    #[test]
    fn escalations_are_counted_from_multi_tier_attempts() {
        let stats = Stats::new();
        stats.record_success(&result_with_attempts(vec![
            TierAttempt { tier: "Intelligence".to_string(), duration: Duration::from_millis(50), success: false, extraction_strategy: "none".to_string(), validation_details: None, failure_reason: Some("timeout".to_string()) },
            TierAttempt { tier: "Lightweight".to_string(), duration: Duration::from_millis(80), success: true, extraction_strategy: "test".to_string(), validation_details: None, failure_reason: None },
        ]));

        assert_eq!(stats.snapshot().escalation_count, 1);
    }
}
