pub mod generalizer;
pub mod model;

pub use generalizer::{Embedder, Generalizer, PageContext, TemplateMatch};
pub use model::{Skill, SkillMetrics, SkillPreconditions, SkillTemplate};
