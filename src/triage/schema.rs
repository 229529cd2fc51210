//! 输出契约：由 TriageSuggestion 的 JsonSchema 派生生成
//!
//! 同一份 Schema 随每次请求交给 provider 约束输出（response_format），Validator 按同样的字段规则校验。

use schemars::schema_for;

use crate::llm::OutputSchema;
use crate::triage::TriageSuggestion;

pub const SUGGESTION_SCHEMA_NAME: &str = "triage_suggestion";

/// TriageSuggestion 的 JSON Schema（含枚举闭集、置信度区间与必填字段）
pub fn suggestion_schema() -> OutputSchema {
    let schema = schema_for!(TriageSuggestion);
    OutputSchema {
        name: SUGGESTION_SCHEMA_NAME.to_string(),
        description: Some(
            "Structured triage classification for one inbound constituent email".to_string(),
        ),
        schema: serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lists_required_fields() {
        let schema = suggestion_schema();
        let required: Vec<&str> = schema.schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        for field in [
            "emailType",
            "classificationConfidence",
            "recommendedAction",
            "actionConfidence",
            "suggestedPriority",
            "priorityConfidence",
        ] {
            assert!(required.contains(&field), "missing required field {field}");
        }
        assert!(!required.contains(&"suggestedTags"));
        assert!(!required.contains(&"suggestedCaseType"));
    }

    #[test]
    fn test_schema_is_stable() {
        assert_eq!(suggestion_schema().schema, suggestion_schema().schema);
        assert_eq!(suggestion_schema().name, SUGGESTION_SCHEMA_NAME);
    }
}
