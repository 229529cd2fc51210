//! Structured Generation Client：带重试与指数退避的结构化生成
//!
//! 状态机：Attempting(n) -> Succeeded / Exhausted。每次尝试的结果是 Result 值而不是异常；
//! 任何失败（传输、空响应、非法输出、违反 Schema）都消耗一次尝试，
//! 第 n 次失败后若还有剩余次数则等待 backoff_base^n 秒。耗尽后交回调用方做兜底。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::llm::{LlmClient, LlmError, Message, OutputSchema};
use crate::triage::error::TriageError;

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次），小于 1 时按 1 处理
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    /// 单次尝试超时；None 表示只依赖 provider 自身的请求生命周期
    pub request_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_secs: 2,
            request_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            max_retries: cfg.triage.max_retries,
            backoff_base_secs: cfg.triage.backoff_base_secs,
            request_timeout: cfg.request_timeout(),
        }
    }

    /// 不等待的策略（测试用）
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_base_secs: 0,
            request_timeout: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// 第 attempt 次失败后的等待时长：2s、4s、8s…
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }
}

/// 生成结果
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome<T> {
    Succeeded {
        value: T,
        raw: String,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        last_error: TriageError,
        /// 最近一次拿到的原始文本（若有）
        last_raw: Option<String>,
    },
}

/// 单次尝试失败：错误与（若已拿到）原始文本
#[derive(Debug)]
struct AttemptFailure {
    error: TriageError,
    raw: Option<String>,
}

enum GenerationState<T> {
    Attempting {
        attempt: u32,
        last_raw: Option<String>,
    },
    Done(GenerationOutcome<T>),
}

/// 结构化生成客户端：持有 LLM 与重试策略，自身无跨调用状态
pub struct StructuredGenerator {
    llm: Arc<dyn LlmClient>,
    policy: RetryPolicy,
}

impl StructuredGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// 发出 prompt 并要求输出符合 schema；accept 拒绝的输出与生成失败同等对待
    pub async fn generate<T, F>(
        &self,
        prompt: &str,
        schema: &OutputSchema,
        accept: F,
    ) -> GenerationOutcome<T>
    where
        F: Fn(&str) -> Result<T, TriageError>,
    {
        let messages = [Message::user(prompt)];
        let max_attempts = self.policy.attempts();
        let mut state = GenerationState::Attempting {
            attempt: 1,
            last_raw: None,
        };

        loop {
            state = match state {
                GenerationState::Done(outcome) => return outcome,
                GenerationState::Attempting { attempt, last_raw } => {
                    debug!(attempt, max_attempts, "Requesting structured triage output");
                    match self.attempt(&messages, schema, &accept).await {
                        Ok((value, raw)) => GenerationState::Done(GenerationOutcome::Succeeded {
                            value,
                            raw,
                            attempts: attempt,
                        }),
                        Err(failure) => {
                            warn!(
                                attempt,
                                max_attempts,
                                error = %failure.error,
                                "Triage generation attempt failed"
                            );
                            let last_raw = failure.raw.or(last_raw);
                            if attempt >= max_attempts {
                                GenerationState::Done(GenerationOutcome::Exhausted {
                                    attempts: attempt,
                                    last_error: failure.error,
                                    last_raw,
                                })
                            } else {
                                tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
                                GenerationState::Attempting {
                                    attempt: attempt + 1,
                                    last_raw,
                                }
                            }
                        }
                    }
                }
            };
        }
    }

    async fn attempt<T, F>(
        &self,
        messages: &[Message],
        schema: &OutputSchema,
        accept: &F,
    ) -> Result<(T, String), AttemptFailure>
    where
        F: Fn(&str) -> Result<T, TriageError>,
    {
        let call = self.llm.complete_structured(messages, schema);
        let response = match self.policy.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(LlmError::Timeout(limit.as_secs()))),
            None => call.await,
        };

        let raw = response.map_err(|e| AttemptFailure {
            error: TriageError::from(e),
            raw: None,
        })?;

        match accept(&raw) {
            Ok(value) => Ok((value, raw)),
            Err(error) => Err(AttemptFailure {
                error,
                raw: Some(raw),
            }),
        }
    }
}
