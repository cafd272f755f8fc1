//! Skill / Skill Template data model (spec §4.7): reusable action
//! sequences distilled from successful workflow recordings, plus the
//! cross-domain generalized templates built from clusters of them.

use serde::{Deserialize, Serialize};

use crate::ids::{SkillId, SkillTemplateId};
use crate::workflow::{StepAction, WorkflowStep};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillPreconditions {
    pub page_type: Option<String>,
    pub required_selector_hints: Vec<String>,
    pub content_type_hints: Vec<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillMetrics {
    pub times_used: u32,
    pub success_count: u32,
}

impl SkillMetrics {
    pub fn success_rate(&self) -> f32 {
        if self.times_used == 0 {
            0.0
        } else {
            self.success_count as f32 / self.times_used as f32
        }
    }

    pub fn record(&mut self, success: bool) {
        self.times_used += 1;
        if success {
            self.success_count += 1;
        }
    }
}

/// A single reusable action sequence, distilled from one workflow recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub source_domain: String,
    pub preconditions: SkillPreconditions,
    pub actions: Vec<WorkflowStep>,
    pub metrics: SkillMetrics,
}

impl Skill {
    /// Eligibility gate for promotion into a cross-domain template (spec
    /// §4.7: successCount >= 3, successRate >= 0.7).
    pub fn eligible_for_generalization(&self) -> bool {
        self.metrics.success_count >= 3 && self.metrics.success_rate() >= 0.7
    }

    pub fn action_kinds(&self) -> Vec<StepAction> {
        self.actions.iter().map(|s| s.action).collect()
    }
}

/// A generalized, cross-domain version of one or more merged skills.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTemplate {
    pub id: SkillTemplateId,
    pub semantic_description: String,
    pub embedding: Vec<f32>,
    pub known_selectors: Vec<String>,
    pub source_skill_ids: Vec<SkillId>,
    pub successful_domains: Vec<String>,
    pub failed_domains: Vec<String>,
    pub cross_domain_success_rate: f32,
}

impl SkillTemplate {
    pub fn from_skill(skill: &Skill, embedding: Vec<f32>) -> Self {
        Self {
            id: SkillTemplateId::new(),
            semantic_description: describe(skill),
            embedding,
            known_selectors: skill
                .actions
                .iter()
                .filter_map(|s| s.selector.clone())
                .collect(),
            source_skill_ids: vec![skill.id],
            successful_domains: vec![skill.source_domain.clone()],
            failed_domains: vec![],
            cross_domain_success_rate: skill.metrics.success_rate(),
        }
    }
}

/// Builds the semantic description fed to the embedder: page type, action
/// types, abstracted selectors, content-type hints (spec §4.7).
pub fn describe(skill: &Skill) -> String {
    let actions: Vec<String> = skill.action_kinds().iter().map(|a| format!("{a:?}")).collect();
    format!(
        "page_type={} actions=[{}] content_types=[{}]",
        skill.preconditions.page_type.as_deref().unwrap_or("unknown"),
        actions.join(","),
        skill.preconditions.content_type_hints.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill_with(times_used: u32, success_count: u32) -> Skill {
        Skill {
            id: SkillId::new(),
            name: "extract product price".to_string(),
            source_domain: "shop.example.com".to_string(),
            preconditions: SkillPreconditions::default(),
            actions: vec![],
            metrics: SkillMetrics { times_used, success_count },
        }
    }

    #[test]
    fn eligible_requires_both_count_and_rate() {
        assert!(!skill_with(2, 2).eligible_for_generalization());
        assert!(!skill_with(10, 6).eligible_for_generalization());
        assert!(skill_with(4, 3).eligible_for_generalization());
    }
}
