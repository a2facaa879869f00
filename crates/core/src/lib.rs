pub mod cache;
pub mod composer;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod explanation;
pub mod fixtures;
pub mod intent;
pub mod mode;
pub mod scoring;
pub mod tables;
pub mod tags;

pub use cache::{CacheKey, RecommendationCache};
pub use config::{ConfigError, ConfigOverrides, EngineSettings, LoadOptions, LogFormat};
pub use domain::blend::{BlendComponent, BlendEvaluation, CandidateBlend};
pub use domain::chemotype::{Cannabinoids, Chemotype, ChemotypeId, Inventory};
pub use domain::effect::{EffectDimension, EffectVector};
pub use domain::output::{
    BlendOutput, EngineErrorCode, EngineOutput, PhaseKind, Recommendation, StackOutput, StackPhase,
};
pub use domain::profile::TargetProfile;
pub use engine::RecommendationEngine;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use explanation::{
    ExplanationBuilder, ExplanationPayload, NarrationDecision, NarrationGuard, Narrator,
    TemplateNarrator, NARRATION_CONTRACT,
};
pub use intent::{Intent, IntentInterpreter, IntentOverrides};
pub use mode::{GateDecision, ModeGate};
pub use tables::EngineTables;
pub use tags::{DisplayTag, StaticTagTable, TagResolver};
