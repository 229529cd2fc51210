//! Casework Triage - 选民来信分诊建议引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **observability**: 日志初始化
//! - **triage**: Prompt 编译、结构化生成与重试、响应校验、引用修复、确定性兜底

pub mod config;
pub mod llm;
pub mod observability;
pub mod triage;

pub use triage::{DiagnosticRecord, TriageContext, TriageEngine, TriageOutcome, TriageSuggestion};
