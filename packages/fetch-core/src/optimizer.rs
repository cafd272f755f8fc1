//! Workflow Optimizer (spec §4.8): proposes API-shortcut and
//! data-sufficiency optimizations for a recorded workflow, tracks how well
//! each one performs once applied, and promotes at most one per workflow.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ids::WorkflowId;
use crate::workflow::{StepAction, WorkflowStep};

const FIELD_COVERAGE_THRESHOLD: f64 = 0.8;
const MIN_PARAMS_NEEDED: usize = 2;
const PROMOTION_MIN_USES: u32 = 5;
const PROMOTION_MIN_SUCCESS_RATE: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ApiShortcut,
    DataSufficiency,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub times_used: u32,
    pub success_count: u32,
    pub failure_count: u32,
    pub avg_optimized_duration: Duration,
    pub avg_original_duration: Duration,
}

impl OptimizationMetrics {
    pub fn success_rate(&self) -> f32 {
        if self.times_used == 0 {
            0.0
        } else {
            self.success_count as f32 / self.times_used as f32
        }
    }

    pub fn record(&mut self, success: bool, optimized: Duration, original: Duration) {
        let n = self.times_used as u32 + 1;
        self.times_used = n;
        if success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.avg_optimized_duration = weighted_avg(self.avg_optimized_duration, optimized, n);
        self.avg_original_duration = weighted_avg(self.avg_original_duration, original, n);
    }
}

fn weighted_avg(current: Duration, sample: Duration, n: u32) -> Duration {
    let n = n as f64;
    Duration::from_secs_f64((current.as_secs_f64() * (n - 1.0) + sample.as_secs_f64()) / n)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Optimization {
    pub workflow_id: WorkflowId,
    pub strategy: Strategy,
    pub replaced_step_numbers: Vec<u32>,
    pub shortcut_request: Option<ShortcutRequest>,
    pub estimated_speedup: f32,
    pub confidence: f32,
    pub metrics: OptimizationMetrics,
    pub promoted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcutRequest {
    pub url: String,
    pub fields_covered: Vec<String>,
}

impl Optimization {
    pub fn eligible_for_promotion(&self) -> bool {
        self.metrics.times_used >= PROMOTION_MIN_USES && self.metrics.success_rate() >= PROMOTION_MIN_SUCCESS_RATE
    }
}

fn step_extracted_fields(step: &WorkflowStep) -> std::collections::HashSet<String> {
    match &step.extracted_data {
        Some(v) => crate::walk::field_names(v, 3),
        None => Default::default(),
    }
}

fn is_api_like(step: &WorkflowStep) -> bool {
    step.action == StepAction::Navigate
        && step
            .url
            .as_deref()
            .map(|u| u.contains("/api/") || u.contains(".json"))
            .unwrap_or(false)
}

/// Scans a workflow's steps backwards looking for an API-shaped request
/// whose extracted fields already cover what every later step needed (spec
/// §4.8 API-shortcut strategy).
pub fn propose_api_shortcut(workflow_id: WorkflowId, steps: &[WorkflowStep]) -> Option<Optimization> {
    if steps.len() < MIN_PARAMS_NEEDED + 1 {
        return None;
    }

    for (i, step) in steps.iter().enumerate().rev() {
        if !is_api_like(step) {
            continue;
        }
        let candidate_fields = step_extracted_fields(step);
        if candidate_fields.is_empty() {
            continue;
        }

        let later_steps = &steps[i + 1..];
        if later_steps.len() < MIN_PARAMS_NEEDED {
            continue;
        }
        let needed: std::collections::HashSet<String> =
            later_steps.iter().flat_map(step_extracted_fields).collect();
        if needed.is_empty() {
            continue;
        }

        let covered = needed.intersection(&candidate_fields).count();
        let coverage = covered as f64 / needed.len() as f64;
        if coverage < FIELD_COVERAGE_THRESHOLD {
            continue;
        }

        return Some(Optimization {
            workflow_id,
            strategy: Strategy::ApiShortcut,
            replaced_step_numbers: later_steps.iter().map(|s| s.step_number).collect(),
            shortcut_request: Some(ShortcutRequest {
                url: step.url.clone().unwrap_or_default(),
                fields_covered: candidate_fields.into_iter().collect(),
            }),
            estimated_speedup: later_steps.len() as f32,
            confidence: coverage as f32,
            metrics: OptimizationMetrics::default(),
            promoted: false,
        });
    }
    None
}

/// Data-sufficiency strategy (spec §4.8): if an earlier step's extracted
/// data already covers a later step's needs, the later step can be skipped
/// without a shortcut request at all.
pub fn propose_data_sufficiency(workflow_id: WorkflowId, steps: &[WorkflowStep]) -> Option<Optimization> {
    for i in 0..steps.len() {
        let earlier_fields = step_extracted_fields(&steps[i]);
        if earlier_fields.is_empty() {
            continue;
        }
        for later in &steps[i + 1..] {
            let later_fields = step_extracted_fields(later);
            if later_fields.is_empty() {
                continue;
            }
            let covered = later_fields.intersection(&earlier_fields).count();
            let coverage = covered as f64 / later_fields.len() as f64;
            if coverage >= FIELD_COVERAGE_THRESHOLD {
                return Some(Optimization {
                    workflow_id,
                    strategy: Strategy::DataSufficiency,
                    replaced_step_numbers: vec![later.step_number],
                    shortcut_request: None,
                    estimated_speedup: 1.0,
                    confidence: coverage as f32,
                    metrics: OptimizationMetrics::default(),
                    promoted: false,
                });
            }
        }
    }
    None
}

/// Tracks optimizations per workflow and enforces the "one promoted
/// optimization at a time" rule (spec §4.8).
#[derive(Default)]
pub struct WorkflowOptimizer {
    optimizations: std::collections::HashMap<WorkflowId, Vec<Optimization>>,
}

impl WorkflowOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propose(&mut self, workflow_id: WorkflowId, steps: &[WorkflowStep]) {
        let mut proposals = vec![];
        proposals.extend(propose_api_shortcut(workflow_id, steps));
        proposals.extend(propose_data_sufficiency(workflow_id, steps));
        self.optimizations.entry(workflow_id).or_default().extend(proposals);
    }

    pub fn record_outcome(&mut self, workflow_id: WorkflowId, index: usize, success: bool, optimized: Duration, original: Duration) {
        if let Some(opts) = self.optimizations.get_mut(&workflow_id) {
            if let Some(opt) = opts.get_mut(index) {
                opt.metrics.record(success, optimized, original);
                if opt.eligible_for_promotion() {
                    self.promote(workflow_id, index);
                }
            }
        }
    }

    /// Promotes `index`, demoting any other currently-promoted optimization
    /// for the same workflow (only one promoted optimization at a time).
    fn promote(&mut self, workflow_id: WorkflowId, index: usize) {
        if let Some(opts) = self.optimizations.get_mut(&workflow_id) {
            for (i, opt) in opts.iter_mut().enumerate() {
                opt.promoted = i == index;
            }
        }
    }

    pub fn promoted(&self, workflow_id: WorkflowId) -> Option<&Optimization> {
        self.optimizations.get(&workflow_id)?.iter().find(|o| o.promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Importance;

    fn step(n: u32, action: StepAction, url: Option<&str>, data: Option<serde_json::Value>) -> WorkflowStep {
        WorkflowStep {
            step_number: n,
            action,
            url: url.map(String::from),
            selector: None,
            value: None,
            annotation: None,
            importance: Importance::Important,
            duration: Duration::from_millis(100),
            tier: None,
            success: true,
            extracted_data: data,
        }
    }

    #[test]
    fn api_shortcut_found_when_earlier_api_covers_later_fields() {
        let wf = WorkflowId::new();
        let steps = vec![
            step(1, StepAction::Navigate, Some("https://example.com/api/product/1"), Some(serde_json::json!({"price": 10, "title": "x"}))),
            step(2, StepAction::Extract, None, Some(serde_json::json!({"price": 10}))),
            step(3, StepAction::Extract, None, Some(serde_json::json!({"title": "x"}))),
        ];
        let opt = propose_api_shortcut(wf, &steps).expect("should propose a shortcut");
        assert_eq!(opt.strategy, Strategy::ApiShortcut);
        assert_eq!(opt.replaced_step_numbers, vec![2, 3]);
    }

    #[test]
    fn promotion_requires_usage_and_success_rate() {
        let mut optimizer = WorkflowOptimizer::new();
        let wf = WorkflowId::new();
        let steps = vec![
            step(1, StepAction::Navigate, Some("https://example.com/api/x"), Some(serde_json::json!({"a": 1, "b": 2}))),
            step(2, StepAction::Extract, None, Some(serde_json::json!({"a": 1}))),
            step(3, StepAction::Extract, None, Some(serde_json::json!({"b": 2}))),
        ];
        optimizer.propose(wf, &steps);
        for _ in 0..5 {
            optimizer.record_outcome(wf, 0, true, Duration::from_millis(50), Duration::from_millis(500));
        }
        assert!(optimizer.promoted(wf).is_some());
    }

    #[test]
    fn only_one_optimization_stays_promoted() {
        let mut optimizer = WorkflowOptimizer::new();
        let wf = WorkflowId::new();
        optimizer.optimizations.insert(
            wf,
            vec![
                Optimization {
                    workflow_id: wf,
                    strategy: Strategy::ApiShortcut,
                    replaced_step_numbers: vec![1],
                    shortcut_request: None,
                    estimated_speedup: 1.0,
                    confidence: 1.0,
                    metrics: OptimizationMetrics::default(),
                    promoted: true,
                },
                Optimization {
                    workflow_id: wf,
                    strategy: Strategy::DataSufficiency,
                    replaced_step_numbers: vec![2],
                    shortcut_request: None,
                    estimated_speedup: 1.0,
                    confidence: 1.0,
                    metrics: OptimizationMetrics::default(),
                    promoted: false,
                },
            ],
        );
        optimizer.promote(wf, 1);
        assert!(!optimizer.optimizations[&wf][0].promoted);
        assert!(optimizer.optimizations[&wf][1].promoted);
    }
}
