//! Confidence update math (spec §4.3). Kept as free functions so the
//! Pattern Store, API Analyzer, and tests can all reuse the exact same
//! formula instead of re-deriving it.

use super::model::PatternMetrics;
use chrono::Utc;

/// `confidence <- confidence + (1 - confidence) * alpha`
pub fn on_success(metrics: &mut PatternMetrics, alpha: f32, latency_observed_at: chrono::DateTime<Utc>) {
    metrics.confidence += (1.0 - metrics.confidence) * alpha;
    metrics.confidence = metrics.confidence.clamp(0.0, 1.0);
    metrics.success_count += 1;
    metrics.last_success = Some(latency_observed_at);
}

/// `confidence <- confidence * (1 - beta)`
pub fn on_failure(metrics: &mut PatternMetrics, beta: f32) {
    metrics.confidence *= 1.0 - beta;
    metrics.confidence = metrics.confidence.clamp(0.0, 1.0);
    metrics.failure_count += 1;
}

/// Invariant check used both in tests and defensively at write time:
/// confidence stays in `[0, 1]` and every persisted pattern has at least one
/// recorded outcome (spec §8, invariant 1).
pub fn invariant_holds(metrics: &PatternMetrics) -> bool {
    (0.0..=1.0).contains(&metrics.confidence) && metrics.success_count + metrics.failure_count >= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_increases_confidence_monotonically() {
        let mut m = PatternMetrics::new(0.5, 1);
        let before = m.confidence;
        on_success(&mut m, 0.1, Utc::now());
        assert!(m.confidence > before);
        assert!(m.confidence <= 1.0);
    }

    #[test]
    fn failure_decreases_confidence_monotonically() {
        let mut m = PatternMetrics::new(0.5, 1);
        let before = m.confidence;
        on_failure(&mut m, 0.2);
        assert!(m.confidence < before);
        assert!(m.confidence >= 0.0);
    }

    #[test]
    fn confidence_never_escapes_unit_interval() {
        let mut m = PatternMetrics::new(0.99, 1);
        for _ in 0..50 {
            on_success(&mut m, 0.5, Utc::now());
        }
        assert!(invariant_holds(&m));
        assert!(m.confidence <= 1.0);
    }
}
