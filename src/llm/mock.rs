//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 按顺序返回预设的回复；预设用尽后返回 EmptyResponse。记录每次调用收到的消息与结构化输出 Schema，便于断言 Prompt。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, Message, OutputSchema};

pub const MOCK_MODEL: &str = "mock";

/// Mock 客户端：脚本化回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: Mutex<Vec<Vec<Message>>>,
    schemas: Mutex<Vec<OutputSchema>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设回复序列
    pub fn with_replies(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            schemas: Mutex::new(Vec::new()),
        }
    }

    /// 每次都返回同一个错误
    pub fn failing(err: LlmError, times: usize) -> Self {
        Self::with_replies(std::iter::repeat(Err(err)).take(times))
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 每次调用收到的消息快照
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 每次 complete_structured 收到的 Schema
    pub fn schemas(&self) -> Vec<OutputSchema> {
        self.schemas.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }

    async fn complete_structured(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<String, LlmError> {
        self.schemas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(schema.clone());
        self.complete(messages).await
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_empty() {
        let mock = MockLlmClient::with_replies(vec![
            Err(LlmError::Transport("reset".into())),
            Ok("{}".to_string()),
        ]);
        let msgs = [Message::user("hi")];
        assert!(matches!(mock.complete(&msgs).await, Err(LlmError::Transport(_))));
        assert_eq!(mock.complete(&msgs).await.unwrap(), "{}");
        assert_eq!(mock.complete(&msgs).await, Err(LlmError::EmptyResponse));
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[0][0].content, "hi");
    }

    #[tokio::test]
    async fn test_structured_call_records_schema() {
        let mock = MockLlmClient::with_replies(vec![Ok("{}".to_string())]);
        let schema = OutputSchema {
            name: "reply".to_string(),
            description: None,
            schema: serde_json::json!({"type": "object"}),
        };
        mock.complete_structured(&[Message::user("hi")], &schema)
            .await
            .unwrap();
        assert_eq!(mock.schemas(), vec![schema]);
        assert_eq!(mock.calls()[0].len(), 1);
    }
}
