//! 分诊错误分类与校验错误
//!
//! 四类错误（传输失败 / 空响应 / 非法输出 / 违反 Schema）在重试循环中一视同仁：各消耗一次尝试。

use thiserror::Error;

use crate::llm::LlmError;

/// 校验失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// 无法解析为 JSON 对象
    Malformed,
    /// 可解析但类型 / 枚举 / 区间 / 必填不符
    SchemaViolation,
}

/// Response Validator 的错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?}{}: {message}", .field.as_ref().map(|f| format!(" ({f})")).unwrap_or_default())]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub field: Option<String>,
    pub message: String,
}

impl ValidationError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::Malformed,
            field: None,
            message: message.into(),
        }
    }

    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::SchemaViolation,
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

/// 生成路径上单次尝试的失败原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriageError {
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Empty response from provider")]
    EmptyResponse,

    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    #[error("Schema violation at {field}: {message}")]
    SchemaViolation { field: String, message: String },
}

impl From<LlmError> for TriageError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyResponse => TriageError::EmptyResponse,
            other => TriageError::TransportFailure(other.to_string()),
        }
    }
}

impl From<ValidationError> for TriageError {
    fn from(err: ValidationError) -> Self {
        match err.kind {
            ValidationErrorKind::Malformed => TriageError::MalformedOutput(err.message),
            ValidationErrorKind::SchemaViolation => TriageError::SchemaViolation {
                field: err.field.unwrap_or_default(),
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_mapping() {
        assert_eq!(TriageError::from(LlmError::EmptyResponse), TriageError::EmptyResponse);
        assert!(matches!(
            TriageError::from(LlmError::Timeout(60)),
            TriageError::TransportFailure(msg) if msg.contains("60")
        ));
        assert!(matches!(
            TriageError::from(LlmError::Provider("rate limited".into())),
            TriageError::TransportFailure(_)
        ));
    }

    #[test]
    fn test_validation_error_mapping() {
        let err = TriageError::from(ValidationError::schema("emailType", "unknown value"));
        assert_eq!(
            err,
            TriageError::SchemaViolation {
                field: "emailType".to_string(),
                message: "unknown value".to_string()
            }
        );
        assert!(matches!(
            TriageError::from(ValidationError::malformed("eof")),
            TriageError::MalformedOutput(_)
        ));
    }

    #[test]
    fn test_validation_error_display_names_field() {
        let err = ValidationError::schema("priorityConfidence", "out of range");
        assert_eq!(err.to_string(), "SchemaViolation (priorityConfidence): out of range");
    }
}
