//! 分诊流水线：编译 Prompt -> 结构化生成（含重试）-> 校验 -> 引用修复；生成耗尽时走确定性兜底
//!
//! 对调用方永远返回满足不变量的 TriageSuggestion，错误只保留在 DiagnosticRecord 中。
//! 引擎不持有跨调用的可变状态，可在多个任务中并发调用。

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::llm::{create_llm_from_config, LlmClient, LlmError};
use crate::triage::error::TriageError;
use crate::triage::generation::{GenerationOutcome, RetryPolicy, StructuredGenerator};
use crate::triage::{
    compile_prompt, fallback, repair, suggestion_schema, validate, TriageContext,
    TriageSuggestion,
};

/// 最终建议来自哪条路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriagePath {
    Generated,
    Fallback,
}

/// 诊断记录：仅供调试 / 测试工具展示，不属于业务契约
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticRecord {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    /// 生成耗尽时的最后一个错误
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub suggestion: TriageSuggestion,
    pub model: String,
    pub latency_ms: u64,
    pub attempts: u32,
    pub path: TriagePath,
}

/// 一次分诊的结果
#[derive(Debug, Clone, PartialEq)]
pub struct TriageOutcome {
    pub suggestion: TriageSuggestion,
    pub diagnostics: DiagnosticRecord,
}

/// 分诊引擎
pub struct TriageEngine {
    generator: StructuredGenerator,
}

impl TriageEngine {
    pub fn new(llm: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self {
            generator: StructuredGenerator::new(llm, policy),
        }
    }

    /// 按配置构建；真实 provider 缺少 API Key 时返回 MissingApiKey
    pub fn from_config(cfg: &AppConfig) -> Result<Self, LlmError> {
        Ok(Self::new(
            create_llm_from_config(cfg)?,
            RetryPolicy::from_config(cfg),
        ))
    }

    /// 对一封来信执行完整流水线
    pub async fn triage(&self, ctx: &TriageContext) -> TriageOutcome {
        let prompt = compile_prompt(ctx);
        let schema = suggestion_schema();
        debug!(prompt_chars = prompt.len(), "Compiled triage prompt");

        let started = Instant::now();
        let outcome = self
            .generator
            .generate(&prompt, &schema, |raw| validate(raw).map_err(TriageError::from))
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (suggestion, raw_response, error, attempts, path) = match outcome {
            GenerationOutcome::Succeeded {
                value,
                raw,
                attempts,
            } => (repair(value, ctx), Some(raw), None, attempts, TriagePath::Generated),
            GenerationOutcome::Exhausted {
                attempts,
                last_error,
                last_raw,
            } => (
                fallback(ctx),
                last_raw,
                Some(last_error.to_string()),
                attempts,
                TriagePath::Fallback,
            ),
        };

        info!(
            path = ?path,
            attempts,
            latency_ms,
            email_type = %suggestion.email_type,
            action = %suggestion.recommended_action,
            "Triage complete"
        );

        TriageOutcome {
            diagnostics: DiagnosticRecord {
                prompt,
                raw_response,
                error,
                suggestion: suggestion.clone(),
                model: self.generator.model().to_string(),
                latency_ms,
                attempts,
                path,
            },
            suggestion,
        }
    }
}
