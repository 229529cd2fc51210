//! 分诊数据模型：输入上下文（TriageContext）与输出建议（TriageSuggestion）
//!
//! 线上字段名统一 camelCase；可选字段缺省时不序列化。
//! 所有实体 id 以字符串保存，输入中出现的数字 id 会被规范化为十进制字符串。

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// 入站邮件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InboundEmail {
    pub subject: String,
    pub body: String,
    pub from_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
}

/// 参考数据条目：案件类型 / 分类 / 办案人员 / 标签共用同一形状
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
}

impl ReferenceEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

pub type CaseType = ReferenceEntry;
pub type Category = ReferenceEntry;
pub type Caseworker = ReferenceEntry;
pub type Tag = ReferenceEntry;

/// 单个办公室范围内的权威参考数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceData {
    pub case_types: Vec<CaseType>,
    pub categories: Vec<Category>,
    pub caseworkers: Vec<Caseworker>,
    pub tags: Vec<Tag>,
}

impl ReferenceData {
    pub fn case_type(&self, id: &str) -> Option<&CaseType> {
        find_entry(&self.case_types, id)
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        find_entry(&self.categories, id)
    }

    pub fn caseworker(&self, id: &str) -> Option<&Caseworker> {
        find_entry(&self.caseworkers, id)
    }

    pub fn tag(&self, id: &str) -> Option<&Tag> {
        find_entry(&self.tags, id)
    }
}

fn find_entry<'a>(entries: &'a [ReferenceEntry], id: &str) -> Option<&'a ReferenceEntry> {
    entries.iter().find(|e| e.id == id)
}

/// 发件人对应的已知选民记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownConstituent {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// 该选民名下可追加的既有案件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingCase {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ExistingCase {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: None,
            status: None,
            case_type: None,
            created_at: None,
        }
    }
}

/// 相似度匹配到的活动；调用方按 match_confidence 降序给出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedCampaign {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub match_confidence: f64,
}

impl MatchedCampaign {
    /// 调用方给出的匹配度可能越界，写入建议前收敛到 [0, 1]
    pub fn confidence(&self) -> f64 {
        clamp_confidence(self.match_confidence)
    }
}

/// 收敛到 [0, 1]，NaN 视为 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 一次分诊调用的完整输入，调用期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TriageContext {
    pub email: InboundEmail,
    #[serde(default)]
    pub reference_data: ReferenceData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constituent: Option<KnownConstituent>,
    #[serde(default)]
    pub existing_cases: Vec<ExistingCase>,
    #[serde(default)]
    pub matched_campaigns: Vec<MatchedCampaign>,
}

impl TriageContext {
    pub fn existing_case(&self, id: &str) -> Option<&ExistingCase> {
        self.existing_cases.iter().find(|c| c.id == id)
    }

    pub fn matched_campaign(&self, id: &str) -> Option<&MatchedCampaign> {
        self.matched_campaigns.iter().find(|c| c.id == id)
    }

    /// 约定首个元素即置信度最高的匹配
    pub fn best_campaign(&self) -> Option<&MatchedCampaign> {
        self.matched_campaigns.first()
    }

    pub fn sender_is_constituent(&self) -> bool {
        self.constituent.is_some()
    }
}

/// 邮件分类（闭集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Casework,
    Policy,
    Campaign,
    Spam,
    Personal,
}

impl EmailType {
    pub const ALL: [EmailType; 5] = [
        EmailType::Casework,
        EmailType::Policy,
        EmailType::Campaign,
        EmailType::Spam,
        EmailType::Personal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Casework => "casework",
            EmailType::Policy => "policy",
            EmailType::Campaign => "campaign",
            EmailType::Spam => "spam",
            EmailType::Personal => "personal",
        }
    }
}

/// 建议动作（闭集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    CreateCase,
    AddToCase,
    AssignCampaign,
    Ignore,
}

impl RecommendedAction {
    pub const ALL: [RecommendedAction; 4] = [
        RecommendedAction::CreateCase,
        RecommendedAction::AddToCase,
        RecommendedAction::AssignCampaign,
        RecommendedAction::Ignore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::CreateCase => "create_case",
            RecommendedAction::AddToCase => "add_to_case",
            RecommendedAction::AssignCampaign => "assign_campaign",
            RecommendedAction::Ignore => "ignore",
        }
    }
}

/// 优先级（闭集）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

macro_rules! impl_display_as_str {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display_as_str!(EmailType, RecommendedAction, Priority);

/// 建议的参考实体（案件类型 / 分类 / 标签）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuggestedEntity {
    pub id: String,
    pub name: String,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
}

/// 建议的承办人，额外带理由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SuggestedAssignee {
    pub id: String,
    pub name: String,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// 从正文中抽取的联系方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
}

impl ExtractedContact {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.phone.is_none() && self.postcode.is_none()
    }
}

/// 分诊建议：引擎唯一的业务输出
///
/// 不变量（由 repair 保证）：所有带 id 的可选字段均指向产生它的 TriageContext 中存在的条目；
/// `AddToCase` 必有 `suggested_existing_case_id`，`AssignCampaign` 必有 `suggested_campaign_id`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriageSuggestion {
    pub email_type: EmailType,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub classification_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification_reasoning: Option<String>,

    pub recommended_action: RecommendedAction,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub action_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_existing_case_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0.0, max = 1.0))]
    pub existing_case_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0.0, max = 1.0))]
    pub suggested_campaign_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_case_type: Option<SuggestedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_category: Option<SuggestedEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_assignee: Option<SuggestedAssignee>,

    pub suggested_priority: Priority,
    #[schemars(range(min = 0.0, max = 1.0))]
    pub priority_confidence: f64,

    /// 空列表等同于缺省
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_tags: Vec<SuggestedEntity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_summary: Option<String>,
    /// ISO 日期（YYYY-MM-DD）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_review_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_contact: Option<ExtractedContact>,
}

impl TriageSuggestion {
    /// 仅含必填字段的建议，可选字段一律缺省
    pub fn new(
        email_type: EmailType,
        classification_confidence: f64,
        recommended_action: RecommendedAction,
        action_confidence: f64,
        suggested_priority: Priority,
        priority_confidence: f64,
    ) -> Self {
        Self {
            email_type,
            classification_confidence,
            classification_reasoning: None,
            recommended_action,
            action_confidence,
            action_reasoning: None,
            suggested_existing_case_id: None,
            existing_case_confidence: None,
            suggested_campaign_id: None,
            suggested_campaign_confidence: None,
            suggested_case_type: None,
            suggested_category: None,
            suggested_assignee: None,
            suggested_priority,
            priority_confidence,
            suggested_tags: Vec::new(),
            case_summary: None,
            suggested_review_date: None,
            draft_response: None,
            extracted_contact: None,
        }
    }

    pub fn with_classification_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.classification_reasoning = Some(reasoning.into());
        self
    }

    pub fn with_action_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.action_reasoning = Some(reasoning.into());
        self
    }

    pub fn with_existing_case(mut self, id: impl Into<String>, confidence: f64) -> Self {
        self.suggested_existing_case_id = Some(id.into());
        self.existing_case_confidence = Some(confidence);
        self
    }

    pub fn with_campaign(mut self, id: impl Into<String>, confidence: f64) -> Self {
        self.suggested_campaign_id = Some(id.into());
        self.suggested_campaign_confidence = Some(confidence);
        self
    }

    pub fn with_case_summary(mut self, summary: impl Into<String>) -> Self {
        self.case_summary = Some(summary.into());
        self
    }
}

/// 允许 id 以字符串或数字出现，统一为字符串
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Uint(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accepts_numeric_ids() {
        let json = r#"{
            "email": {"subject": "Pothole", "body": "Fix it", "fromAddress": "a@b.com"},
            "referenceData": {"caseTypes": [{"id": 1, "name": "Roads"}]},
            "existingCases": [{"id": "Y"}],
            "matchedCampaigns": [{"id": 7, "name": "Library", "matchConfidence": 0.9}]
        }"#;
        let ctx: TriageContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.reference_data.case_types[0].id, "1");
        assert!(ctx.reference_data.case_type("1").is_some());
        assert_eq!(ctx.best_campaign().map(|c| c.id.as_str()), Some("7"));
        assert!(!ctx.sender_is_constituent());
    }

    #[test]
    fn test_suggestion_skips_absent_fields() {
        let s = TriageSuggestion::new(
            EmailType::Casework,
            0.4,
            RecommendedAction::CreateCase,
            0.4,
            Priority::Medium,
            0.5,
        );
        let value = serde_json::to_value(&s).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["emailType"], "casework");
        assert_eq!(obj["recommendedAction"], "create_case");
        assert!(!obj.contains_key("suggestedTags"));
        assert!(!obj.contains_key("suggestedCampaignId"));
        assert_eq!(obj.len(), 6);
    }

    #[test]
    fn test_clamp_confidence() {
        assert_eq!(clamp_confidence(87.0), 1.0);
        assert_eq!(clamp_confidence(-0.2), 0.0);
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(0.75), 0.75);
    }

    #[test]
    fn test_enum_display_matches_wire_name() {
        for t in EmailType::ALL {
            let wire = serde_json::to_value(t).unwrap();
            assert_eq!(wire, t.to_string());
        }
        assert_eq!(RecommendedAction::AssignCampaign.to_string(), "assign_campaign");
        assert_eq!(Priority::Urgent.to_string(), "urgent");
    }
}
