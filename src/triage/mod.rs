//! 分诊建议引擎：Prompt 编译、结构化生成、响应校验、引用修复与确定性兜底

pub mod engine;
pub mod error;
pub mod fallback;
pub mod generation;
pub mod prompt;
pub mod repair;
pub mod schema;
pub mod types;
pub mod validator;

pub use engine::{DiagnosticRecord, TriageEngine, TriageOutcome, TriagePath};
pub use error::{TriageError, ValidationError, ValidationErrorKind};
pub use fallback::fallback;
pub use generation::{GenerationOutcome, RetryPolicy, StructuredGenerator};
pub use prompt::compile_prompt;
pub use repair::repair;
pub use schema::suggestion_schema;
pub use types::{
    CaseType, Caseworker, Category, EmailType, ExistingCase, ExtractedContact, InboundEmail,
    KnownConstituent, MatchedCampaign, Priority, RecommendedAction, ReferenceData,
    ReferenceEntry, SuggestedAssignee, SuggestedEntity, Tag, TriageContext, TriageSuggestion,
};
pub use validator::validate;
