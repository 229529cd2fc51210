//! 确定性兜底建议：生成路径耗尽时仅凭上下文给出保守建议
//!
//! 判定顺序：高置信度活动匹配 -> 已知选民的既有案件 -> 新建案件。
//! 只引用 ctx 中已存在的活动 / 案件 id，因此天然满足引用完整性。

use crate::triage::{EmailType, Priority, RecommendedAction, TriageContext, TriageSuggestion};

/// 活动匹配置信度达到该值才直接归入活动
pub const CAMPAIGN_MATCH_THRESHOLD: f64 = 0.8;
pub const MANUAL_REVIEW_SUMMARY: &str = "Manual review required - automated triage failed";

const CAMPAIGN_PRIORITY_CONFIDENCE: f64 = 0.7;
const EXISTING_CASE_CONFIDENCE: f64 = 0.5;
const GENERIC_CONFIDENCE: f64 = 0.4;
const GENERIC_PRIORITY_CONFIDENCE: f64 = 0.5;

/// 兜底建议（纯函数）
pub fn fallback(ctx: &TriageContext) -> TriageSuggestion {
    if let Some(campaign) = ctx
        .best_campaign()
        .filter(|c| c.confidence() >= CAMPAIGN_MATCH_THRESHOLD)
    {
        let confidence = campaign.confidence();
        return TriageSuggestion::new(
            EmailType::Campaign,
            confidence,
            RecommendedAction::AssignCampaign,
            confidence,
            Priority::Low,
            CAMPAIGN_PRIORITY_CONFIDENCE,
        )
        .with_classification_reasoning(format!(
            "Automated analysis failed; email closely matches campaign '{}'",
            campaign.name
        ))
        .with_action_reasoning("Matched campaign by content similarity")
        .with_campaign(campaign.id.clone(), confidence);
    }

    if ctx.sender_is_constituent() {
        if let Some(case) = ctx.existing_cases.first() {
            return TriageSuggestion::new(
                EmailType::Casework,
                EXISTING_CASE_CONFIDENCE,
                RecommendedAction::AddToCase,
                EXISTING_CASE_CONFIDENCE,
                Priority::Medium,
                EXISTING_CASE_CONFIDENCE,
            )
            .with_classification_reasoning(
                "Automated analysis failed; sender is a known constituent with an open case",
            )
            .with_action_reasoning("Adding to the constituent's most recent case for review")
            .with_existing_case(case.id.clone(), EXISTING_CASE_CONFIDENCE)
            .with_case_summary(default_summary(ctx));
        }
    }

    TriageSuggestion::new(
        EmailType::Casework,
        GENERIC_CONFIDENCE,
        RecommendedAction::CreateCase,
        GENERIC_CONFIDENCE,
        Priority::Medium,
        GENERIC_PRIORITY_CONFIDENCE,
    )
    .with_classification_reasoning("Automated analysis failed; defaulting to casework for manual review")
    .with_action_reasoning("Automated analysis failed; creating a new case so staff can review it")
    .with_case_summary(default_summary(ctx))
}

fn default_summary(ctx: &TriageContext) -> String {
    let subject = ctx.email.subject.trim();
    if subject.is_empty() {
        MANUAL_REVIEW_SUMMARY.to_string()
    } else {
        subject.to_string()
    }
}
