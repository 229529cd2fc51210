//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 LlmClient：complete（自由文本）、complete_structured（按 Schema 约束输出）。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// provider 边界上的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 网络不可达、连接中断等
    #[error("Transport error: {0}")]
    Transport(String),

    /// provider 返回了响应但没有内容
    #[error("Empty response")]
    EmptyResponse,

    /// provider 明确报告的错误（限流、鉴权、拒答等）
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// 请求构造失败
    #[error("Invalid request: {0}")]
    Request(String),

    /// 选择了真实后端却没有可用的 API Key
    #[error(
        "No API key for provider '{0}': set llm.api_key, TRIAGE__LLM__API_KEY or OPENAI_API_KEY, or use provider = \"mock\""
    )]
    MissingApiKey(String),
}

/// 交给 provider 的输出契约：名称 + JSON Schema
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub description: Option<String>,
    pub schema: serde_json::Value,
}

impl OutputSchema {
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_default()
    }
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 自由文本完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 结构化完成：要求输出符合 schema
    ///
    /// 默认实现把 Schema 以 system 消息注入，适用于不支持 response_format 的后端
    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<String, LlmError> {
        let mut with_schema = Vec::with_capacity(messages.len() + 1);
        with_schema.push(Message::system(format!(
            "Respond with one JSON object that conforms to this JSON Schema and nothing else:\n{}",
            schema.to_pretty_json()
        )));
        with_schema.extend_from_slice(messages);
        self.complete(&with_schema).await
    }

    /// 当前使用的模型标识
    fn model(&self) -> &str;
}
