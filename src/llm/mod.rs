//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock）与后端选择

pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError, OutputSchema};

/// 配置选定的后端
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Mock,
    OpenAi { api_key: String },
}

/// 由 provider 与 API Key 决定后端；非 mock 的 provider 缺少 Key 时报错而不是静默换成 Mock
pub fn select_backend(provider: &str, api_key: Option<String>) -> Result<Backend, LlmError> {
    let provider = provider.to_lowercase();
    match (provider.as_str(), api_key.filter(|k| !k.trim().is_empty())) {
        ("mock", _) => Ok(Backend::Mock),
        (_, Some(api_key)) => Ok(Backend::OpenAi { api_key }),
        (_, None) => Err(LlmError::MissingApiKey(provider)),
    }
}

/// 按配置创建 LLM 客户端；api_key 未配置时读取 OPENAI_API_KEY
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let api_key = cfg
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    match select_backend(&cfg.llm.provider, api_key)? {
        Backend::Mock => {
            tracing::info!("Using Mock LLM");
            Ok(Arc::new(MockLlmClient::new()))
        }
        Backend::OpenAi { api_key } => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Ok(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                Some(api_key.as_str()),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_needs_no_key() {
        assert_eq!(select_backend("Mock", None), Ok(Backend::Mock));
    }

    #[test]
    fn test_openai_with_key() {
        assert_eq!(
            select_backend("openai", Some("sk-test".to_string())),
            Ok(Backend::OpenAi {
                api_key: "sk-test".to_string()
            })
        );
    }

    #[test]
    fn test_openai_without_key_is_an_error() {
        for key in [None, Some("  ".to_string())] {
            let err = select_backend("openai", key).unwrap_err();
            assert_eq!(err, LlmError::MissingApiKey("openai".to_string()));
            let text = err.to_string();
            assert!(text.contains("llm.api_key"));
            assert!(text.contains("TRIAGE__LLM__API_KEY"));
            assert!(text.contains("OPENAI_API_KEY"));
        }
    }
}
