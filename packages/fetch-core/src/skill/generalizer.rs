//! Skill Generalizer (spec §4.7): consumes eligible [`Skill`]s distilled
//! from completed workflows and clusters them into cross-domain
//! [`SkillTemplate`]s via embedding similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

use super::model::{Skill, SkillTemplate};

const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.65;
const MERGE_THRESHOLD: f32 = 0.85;

/// External embedding capability. Production implementations call out to
/// an embedding model; kept as a trait so the generalizer has no direct
/// dependency on any one provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContext {
    pub domain: String,
    pub url: String,
    pub page_type: Option<String>,
    pub available_selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub template_id: crate::ids::SkillTemplateId,
    pub score: f32,
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn precondition_overlap(template: &SkillTemplate, ctx: &PageContext) -> f32 {
    if template.known_selectors.is_empty() {
        return 0.5;
    }
    let hits = template
        .known_selectors
        .iter()
        .filter(|s| ctx.available_selectors.iter().any(|a| a == *s))
        .count();
    hits as f32 / template.known_selectors.len() as f32
}

pub struct Generalizer<'a> {
    embedder: &'a dyn Embedder,
    templates: RwLock<Vec<SkillTemplate>>,
    similarity_threshold: f32,
}

impl<'a> Generalizer<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder, templates: RwLock::new(vec![]), similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Consumes an eligible skill: embeds its semantic description, merges
    /// into an existing template above `MERGE_THRESHOLD` similarity or
    /// inserts a fresh one otherwise.
    pub async fn ingest(&self, skill: &Skill) -> anyhow::Result<crate::ids::SkillTemplateId> {
        if !skill.eligible_for_generalization() {
            anyhow::bail!("skill {} is not yet eligible for generalization", skill.id);
        }
        let description = super::model::describe(skill);
        let embedding = self.embedder.embed(&description).await?;

        let mut templates = self.templates.write().unwrap();
        let merge_target = templates
            .iter()
            .enumerate()
            .map(|(i, t)| (i, cosine_similarity(&t.embedding, &embedding)))
            .filter(|(_, sim)| *sim > MERGE_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((idx, _)) = merge_target {
            merge_into(&mut templates[idx], skill, &embedding);
            Ok(templates[idx].id)
        } else {
            let template = SkillTemplate::from_skill(skill, embedding);
            let id = template.id;
            templates.push(template);
            Ok(id)
        }
    }

    /// Ranks known templates against a page context (spec §4.7: combined
    /// score = 0.6*similarity + 0.4*preconditionMatch), returning the top
    /// matches at or above the similarity threshold.
    pub async fn match_page(&self, ctx: &PageContext, top_k: usize) -> anyhow::Result<Vec<TemplateMatch>> {
        let ctx_embedding = self.embedder.embed(&page_context_description(ctx)).await?;
        let templates = self.templates.read().unwrap();

        let mut scored: Vec<TemplateMatch> = templates
            .iter()
            .filter_map(|t| {
                let similarity = cosine_similarity(&t.embedding, &ctx_embedding);
                if similarity < self.similarity_threshold {
                    return None;
                }
                let precondition = precondition_overlap(t, ctx);
                let score = 0.6 * similarity + 0.4 * precondition;
                Some(TemplateMatch { template_id: t.id, score })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    pub fn templates(&self) -> Vec<SkillTemplate> {
        self.templates.read().unwrap().clone()
    }
}

fn page_context_description(ctx: &PageContext) -> String {
    format!(
        "page_type={} selectors=[{}]",
        ctx.page_type.as_deref().unwrap_or("unknown"),
        ctx.available_selectors.join(",")
    )
}

/// Merges `skill` into `template` in place: union of source ids, union of
/// successful domains, union of known selectors, weighted-average
/// cross-domain success rate (spec §4.7).
fn merge_into(template: &mut SkillTemplate, skill: &Skill, embedding: &[f32]) {
    if !template.source_skill_ids.contains(&skill.id) {
        template.source_skill_ids.push(skill.id);
    }
    if !template.successful_domains.iter().any(|d| d == &skill.source_domain) {
        template.successful_domains.push(skill.source_domain.clone());
    }
    for selector in skill.actions.iter().filter_map(|s| s.selector.as_ref()) {
        if !template.known_selectors.iter().any(|s| s == selector) {
            template.known_selectors.push(selector.clone());
        }
    }

    let n = template.source_skill_ids.len() as f32;
    template.cross_domain_success_rate =
        ((template.cross_domain_success_rate * (n - 1.0)) + skill.metrics.success_rate()) / n;

    // nudge the template embedding toward the new member's, cheap running mean.
    if template.embedding.len() == embedding.len() {
        for (t, s) in template.embedding.iter_mut().zip(embedding) {
            *t = (*t * (n - 1.0) + s) / n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SkillId;
    use crate::skill::model::{SkillMetrics, SkillPreconditions};

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            // deterministic toy embedding: bucket by text length parity
            if text.contains("price") {
                Ok(vec![1.0, 0.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0, 0.0])
            }
        }
    }

    fn eligible_skill(name: &str, domain: &str) -> Skill {
        Skill {
            id: SkillId::new(),
            name: name.to_string(),
            source_domain: domain.to_string(),
            preconditions: SkillPreconditions { page_type: Some("product".to_string()), ..Default::default() },
            actions: vec![],
            metrics: SkillMetrics { times_used: 5, success_count: 4 },
        }
    }

    #[tokio::test]
    async fn ineligible_skill_is_rejected() {
        let embedder = StubEmbedder;
        let gen = Generalizer::new(&embedder);
        let mut skill = eligible_skill("price", "a.com");
        skill.metrics = SkillMetrics { times_used: 2, success_count: 2 };
        assert!(gen.ingest(&skill).await.is_err());
    }

    #[tokio::test]
    async fn similar_skills_merge_into_one_template() {
        let embedder = StubEmbedder;
        let gen = Generalizer::new(&embedder);
        let a = eligible_skill("extract price", "a.com");
        let b = eligible_skill("extract price", "b.com");

        gen.ingest(&a).await.unwrap();
        gen.ingest(&b).await.unwrap();

        let templates = gen.templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].successful_domains.len(), 2);
    }

    #[tokio::test]
    async fn dissimilar_skills_stay_separate_templates() {
        let embedder = StubEmbedder;
        let gen = Generalizer::new(&embedder);
        let a = eligible_skill("price", "a.com");
        let mut b = eligible_skill("navigation menu", "b.com");
        b.name = "navigation".to_string();

        gen.ingest(&a).await.unwrap();
        gen.ingest(&b).await.unwrap();

        assert_eq!(gen.templates().len(), 2);
    }
}
