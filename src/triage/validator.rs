//! Response Validator：provider 原始文本 -> TriageSuggestion
//!
//! 两阶段：先解析为 JSON 对象（失败即 Malformed），再逐字段类型检查（失败即 SchemaViolation 并指明字段）。
//! 可选字段仅在存在且非空时进入结果；建议值一次性构造，不做先填后删。

use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::triage::error::ValidationError;
use crate::triage::{
    EmailType, ExtractedContact, Priority, RecommendedAction, SuggestedAssignee, SuggestedEntity,
    TriageSuggestion,
};

type Object = Map<String, Value>;

/// 校验 provider 输出
pub fn validate(raw: &str) -> Result<TriageSuggestion, ValidationError> {
    let obj = parse_object(raw)?;

    let suggested_existing_case_id = optional_id(&obj, "suggestedExistingCaseId")?;
    let existing_case_confidence = optional_confidence(&obj, "existingCaseConfidence")?;
    let suggested_campaign_id = optional_id(&obj, "suggestedCampaignId")?;
    let suggested_campaign_confidence = optional_confidence(&obj, "suggestedCampaignConfidence")?;

    Ok(TriageSuggestion {
        email_type: required_enum::<EmailType>(&obj, "emailType", &EmailType::ALL.map(|t| t.as_str()))?,
        classification_confidence: required_confidence(&obj, "classificationConfidence")?,
        classification_reasoning: optional_text(&obj, "classificationReasoning")?,
        recommended_action: required_enum::<RecommendedAction>(
            &obj,
            "recommendedAction",
            &RecommendedAction::ALL.map(|a| a.as_str()),
        )?,
        action_confidence: required_confidence(&obj, "actionConfidence")?,
        action_reasoning: optional_text(&obj, "actionReasoning")?,
        existing_case_confidence: suggested_existing_case_id
            .as_ref()
            .and(existing_case_confidence),
        suggested_existing_case_id,
        suggested_campaign_confidence: suggested_campaign_id
            .as_ref()
            .and(suggested_campaign_confidence),
        suggested_campaign_id,
        suggested_case_type: optional_entity(&obj, "suggestedCaseType")?,
        suggested_category: optional_entity(&obj, "suggestedCategory")?,
        suggested_assignee: optional_assignee(&obj, "suggestedAssignee")?,
        suggested_priority: required_enum::<Priority>(
            &obj,
            "suggestedPriority",
            &Priority::ALL.map(|p| p.as_str()),
        )?,
        priority_confidence: required_confidence(&obj, "priorityConfidence")?,
        suggested_tags: tags(&obj, "suggestedTags")?,
        case_summary: optional_text(&obj, "caseSummary")?,
        suggested_review_date: optional_date(&obj, "suggestedReviewDate")?,
        draft_response: optional_text(&obj, "draftResponse")?,
        extracted_contact: optional_contact(&obj, "extractedContact")?,
    })
}

/// 第一阶段：去掉 Markdown 代码围栏，必要时截取第一个能解析的平衡 JSON 对象
fn parse_object(raw: &str) -> Result<Object, ValidationError> {
    let text = strip_markdown_fences(raw);
    if text.is_empty() {
        return Err(ValidationError::malformed("output is empty"));
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(v) => v,
        Err(first_err) => json_object_candidates(text)
            .find_map(|fragment| serde_json::from_str::<Value>(fragment).ok())
            .ok_or_else(|| ValidationError::malformed(first_err.to_string()))?,
    };

    match value {
        Value::Object(obj) => Ok(obj),
        other => Err(ValidationError::malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let clean = clean.strip_suffix("```").unwrap_or(clean);
    clean.trim()
}

/// 依次截取每个 `{` 起始的平衡片段，忽略字符串内的括号
///
/// 按起始位置排序，外层对象先于其内部对象出现
fn json_object_candidates(text: &str) -> impl Iterator<Item = &str> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .filter_map(move |(start, _)| balanced_object_at(text, start))
}

/// 从 start 处的 `{` 开始扫描到与之配对的 `}`
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 缺省与 null 视为同一含义
fn present<'a>(obj: &'a Object, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn required_enum<T: DeserializeOwned>(
    obj: &Object,
    field: &str,
    allowed: &[&str],
) -> Result<T, ValidationError> {
    let value = present(obj, field)
        .ok_or_else(|| ValidationError::schema(field, "required field is missing"))?;
    serde_json::from_value::<T>(value.clone()).map_err(|_| {
        ValidationError::schema(
            field,
            format!("{} is not one of [{}]", value, allowed.join(", ")),
        )
    })
}

fn confidence_value(value: &Value, field: &str) -> Result<f64, ValidationError> {
    let n = value
        .as_f64()
        .ok_or_else(|| ValidationError::schema(field, format!("expected number, got {}", json_kind(value))))?;
    if !(0.0..=1.0).contains(&n) {
        return Err(ValidationError::schema(field, format!("{n} is outside [0, 1]")));
    }
    Ok(n)
}

fn required_confidence(obj: &Object, field: &str) -> Result<f64, ValidationError> {
    let value = present(obj, field)
        .ok_or_else(|| ValidationError::schema(field, "required field is missing"))?;
    confidence_value(value, field)
}

fn optional_confidence(obj: &Object, field: &str) -> Result<Option<f64>, ValidationError> {
    present(obj, field)
        .map(|v| confidence_value(v, field))
        .transpose()
}

fn text_value(value: &Value, field: &str) -> Result<Option<String>, ValidationError> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        other => Err(ValidationError::schema(
            field,
            format!("expected string, got {}", json_kind(other)),
        )),
    }
}

fn optional_text(obj: &Object, field: &str) -> Result<Option<String>, ValidationError> {
    match present(obj, field) {
        Some(v) => text_value(v, field),
        None => Ok(None),
    }
}

/// id 允许字符串或整数
fn id_value(value: &Value, field: &str) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(Some(n.to_string())),
        Value::String(_) => text_value(value, field),
        other => Err(ValidationError::schema(
            field,
            format!("expected string or integer id, got {}", json_kind(other)),
        )),
    }
}

fn optional_id(obj: &Object, field: &str) -> Result<Option<String>, ValidationError> {
    match present(obj, field) {
        Some(v) => id_value(v, field),
        None => Ok(None),
    }
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a Object, ValidationError> {
    value.as_object().ok_or_else(|| {
        ValidationError::schema(field, format!("expected object, got {}", json_kind(value)))
    })
}

/// 解析 {id, name, confidence}；缺 id 视为整个字段缺省
fn entity_value(value: &Value, field: &str) -> Result<Option<SuggestedEntity>, ValidationError> {
    let obj = as_object(value, field)?;
    let Some(id) = optional_id(obj, "id").map_err(|e| nested(e, field))? else {
        return Ok(None);
    };
    let name = optional_text(obj, "name")
        .map_err(|e| nested(e, field))?
        .unwrap_or_default();
    let confidence = required_confidence(obj, "confidence").map_err(|e| nested(e, field))?;
    Ok(Some(SuggestedEntity { id, name, confidence }))
}

fn nested(err: ValidationError, parent: &str) -> ValidationError {
    let field = match err.field {
        Some(inner) => format!("{parent}.{inner}"),
        None => parent.to_string(),
    };
    ValidationError {
        field: Some(field),
        ..err
    }
}

fn optional_entity(obj: &Object, field: &str) -> Result<Option<SuggestedEntity>, ValidationError> {
    match present(obj, field) {
        Some(v) => entity_value(v, field),
        None => Ok(None),
    }
}

fn optional_assignee(
    obj: &Object,
    field: &str,
) -> Result<Option<SuggestedAssignee>, ValidationError> {
    let Some(value) = present(obj, field) else {
        return Ok(None);
    };
    let Some(entity) = entity_value(value, field)? else {
        return Ok(None);
    };
    let reasoning = optional_text(as_object(value, field)?, "reasoning").map_err(|e| nested(e, field))?;
    Ok(Some(SuggestedAssignee {
        id: entity.id,
        name: entity.name,
        confidence: entity.confidence,
        reasoning,
    }))
}

fn tags(obj: &Object, field: &str) -> Result<Vec<SuggestedEntity>, ValidationError> {
    let Some(value) = present(obj, field) else {
        return Ok(Vec::new());
    };
    let items = value.as_array().ok_or_else(|| {
        ValidationError::schema(field, format!("expected array, got {}", json_kind(value)))
    })?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(tag) = entity_value(item, &format!("{field}[{i}]"))? {
            out.push(tag);
        }
    }
    Ok(out)
}

/// 接受 YYYY-MM-DD 或 RFC 3339 时间戳，统一输出 YYYY-MM-DD
fn optional_date(obj: &Object, field: &str) -> Result<Option<String>, ValidationError> {
    let Some(text) = optional_text(obj, field)? else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(&text).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| ValidationError::schema(field, format!("'{text}' is not an ISO date")))?;
    Ok(Some(date.format("%Y-%m-%d").to_string()))
}

fn optional_contact(
    obj: &Object,
    field: &str,
) -> Result<Option<ExtractedContact>, ValidationError> {
    let Some(value) = present(obj, field) else {
        return Ok(None);
    };
    let contact_obj = as_object(value, field)?;
    let read = |key: &str| optional_text(contact_obj, key).map_err(|e| nested(e, field));
    let contact = ExtractedContact {
        name: read("name")?,
        address: read("address")?,
        phone: read("phone")?,
        postcode: read("postcode")?,
    };
    Ok((!contact.is_empty()).then_some(contact))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::error::ValidationErrorKind;

    const MINIMAL: &str = r#"{
        "emailType": "casework",
        "classificationConfidence": 0.8,
        "recommendedAction": "create_case",
        "actionConfidence": 0.7,
        "suggestedPriority": "high",
        "priorityConfidence": 0.6
    }"#;

    fn with_fields(extra: &str) -> String {
        let trimmed = MINIMAL.trim_end().trim_end_matches('}');
        format!("{trimmed}, {extra} }}")
    }

    #[test]
    fn test_minimal_suggestion() {
        let s = validate(MINIMAL).unwrap();
        assert_eq!(s.email_type, EmailType::Casework);
        assert_eq!(s.recommended_action, RecommendedAction::CreateCase);
        assert_eq!(s.suggested_priority, Priority::High);
        assert!((s.classification_confidence - 0.8).abs() < f64::EPSILON);
        assert!(s.suggested_tags.is_empty());
        assert!(s.extracted_contact.is_none());
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = validate("Sorry, I cannot help with that.").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Malformed);
        assert!(err.field.is_none());

        let err = validate("   ").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Malformed);

        let err = validate("[1, 2]").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Malformed);
    }

    #[test]
    fn test_markdown_fences_and_prose_are_tolerated() {
        let fenced = format!("```json\n{MINIMAL}\n```");
        assert!(validate(&fenced).is_ok());

        let prose = format!("Here is the triage result: {MINIMAL} Let me know if you need more.");
        assert!(validate(&prose).is_ok());
    }

    #[test]
    fn test_unknown_enum_is_schema_violation() {
        let raw = MINIMAL.replace("\"casework\"", "\"complaint\"");
        let err = validate(&raw).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::SchemaViolation);
        assert_eq!(err.field.as_deref(), Some("emailType"));
        assert!(err.message.contains("casework"));
    }

    #[test]
    fn test_confidence_out_of_range() {
        let raw = MINIMAL.replace("0.6", "1.5");
        let err = validate(&raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("priorityConfidence"));

        let raw = MINIMAL.replace("0.7", "\"high\"");
        let err = validate(&raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("actionConfidence"));
    }

    #[test]
    fn test_missing_required_field() {
        let raw = MINIMAL.replace("\"suggestedPriority\": \"high\",", "");
        let err = validate(&raw).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::SchemaViolation);
        assert_eq!(err.field.as_deref(), Some("suggestedPriority"));
    }

    #[test]
    fn test_optional_fields_elided_when_empty() {
        let raw = with_fields(
            r#""suggestedTags": [], "caseSummary": "  ", "draftResponse": null,
               "extractedContact": {"name": "", "phone": null},
               "existingCaseConfidence": 0.9"#,
        );
        let s = validate(&raw).unwrap();
        assert!(s.suggested_tags.is_empty());
        assert!(s.case_summary.is_none());
        assert!(s.draft_response.is_none());
        assert!(s.extracted_contact.is_none());
        // 无 id 时配对的置信度同样缺省
        assert!(s.existing_case_confidence.is_none());
    }

    #[test]
    fn test_entities_and_numeric_ids() {
        let raw = with_fields(
            r#""suggestedCaseType": {"id": 999, "name": "Housing", "confidence": 0.9},
               "suggestedAssignee": {"id": "u1", "name": "Sam", "confidence": 0.5, "reasoning": "housing lead"},
               "suggestedTags": [{"id": "t1", "name": "Damp", "confidence": 0.4}],
               "suggestedExistingCaseId": "X", "existingCaseConfidence": 0.3"#,
        );
        let s = validate(&raw).unwrap();
        assert_eq!(s.suggested_case_type.unwrap().id, "999");
        let assignee = s.suggested_assignee.unwrap();
        assert_eq!(assignee.reasoning.as_deref(), Some("housing lead"));
        assert_eq!(s.suggested_tags.len(), 1);
        assert_eq!(s.suggested_existing_case_id.as_deref(), Some("X"));
        assert_eq!(s.existing_case_confidence, Some(0.3));
    }

    #[test]
    fn test_nested_field_is_named() {
        let raw = with_fields(r#""suggestedTags": [{"id": "t1", "name": "Damp", "confidence": 2}]"#);
        let err = validate(&raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("suggestedTags[0].confidence"));
    }

    #[test]
    fn test_review_date_normalized() {
        let raw = with_fields(r#""suggestedReviewDate": "2026-11-02T09:00:00Z""#);
        assert_eq!(validate(&raw).unwrap().suggested_review_date.as_deref(), Some("2026-11-02"));

        let raw = with_fields(r#""suggestedReviewDate": "next tuesday""#);
        let err = validate(&raw).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("suggestedReviewDate"));
    }

    #[test]
    fn test_object_candidates_ignore_braces_in_strings() {
        let text = r#"note {"a": "}{", "b": {"c": 1}} tail"#;
        let candidates: Vec<&str> = json_object_candidates(text).collect();
        assert_eq!(candidates, vec![r#"{"a": "}{", "b": {"c": 1}}"#, r#"{"c": 1}"#]);
        assert_eq!(json_object_candidates("no json").next(), None);
        assert_eq!(json_object_candidates("open { only").next(), None);
    }

    #[test]
    fn test_skips_unparseable_brace_group_before_object() {
        let raw = format!("Result {{see below}}: {MINIMAL} hope this helps");
        let s = validate(&raw).unwrap();
        assert_eq!(s.email_type, EmailType::Casework);
        assert_eq!(s.recommended_action, RecommendedAction::CreateCase);
    }
}
