pub mod confidence;
pub mod model;
pub mod store;

pub use model::{
    ApiPattern, ContentMapping, Extractor, ExtractorSource, HttpMethod, PatternMetrics, ResponseFormat,
    TemplateType, Validation,
};
pub use store::{DomainIntelligence, InMemoryPatternStore, PatternStore};
