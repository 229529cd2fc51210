//! Reference Integrity Repairer：用实时参考数据校正建议中的实体引用
//!
//! 全函数，永不失败。固定顺序：
//! 1. 案件类型 / 分类 / 承办人：id 不存在则整项删除
//! 2. 标签：仅保留存在的 id，同一 id 只保留首次出现，全部无效则为空
//! 3. 既有案件：id 不存在则删除；若动作为 add_to_case，降级为 create_case
//! 4. 活动：id 不存在则删除；若动作为 assign_campaign，改用最佳匹配活动，无可用活动则降级为 create_case
//!
//! 3、4 放在最后，保证最终动作只依赖真正可用的链接。存活的实体名称统一替换为参考数据中的规范名称。

use std::collections::HashSet;

use tracing::warn;

use crate::triage::{
    RecommendedAction, ReferenceEntry, SuggestedAssignee, SuggestedEntity, TriageContext,
    TriageSuggestion,
};

pub const CASE_NOT_FOUND_REASONING: &str =
    "suggested case not found, recommending new case instead";
pub const NO_CAMPAIGN_REASONING: &str = "no valid campaign found, recommending new case";

/// 修复建议，使所有引用均指向 ctx 中存在的条目
pub fn repair(suggestion: TriageSuggestion, ctx: &TriageContext) -> TriageSuggestion {
    let refs = &ctx.reference_data;
    let suggestion = TriageSuggestion {
        suggested_case_type: suggestion
            .suggested_case_type
            .and_then(|e| resolve_entity(e, "caseType", |id| refs.case_type(id))),
        suggested_category: suggestion
            .suggested_category
            .and_then(|e| resolve_entity(e, "category", |id| refs.category(id))),
        suggested_assignee: suggestion
            .suggested_assignee
            .and_then(|a| resolve_assignee(a, |id| refs.caseworker(id))),
        ..suggestion
    };

    let mut seen_tags = HashSet::new();
    let suggestion = TriageSuggestion {
        suggested_tags: suggestion
            .suggested_tags
            .into_iter()
            .filter_map(|t| resolve_entity(t, "tag", |id| refs.tag(id)))
            .filter(|t| seen_tags.insert(t.id.clone()))
            .collect(),
        ..suggestion
    };

    let suggestion = repair_existing_case(suggestion, ctx);
    repair_campaign(suggestion, ctx)
}

fn resolve_entity<'a>(
    entity: SuggestedEntity,
    kind: &str,
    lookup: impl Fn(&str) -> Option<&'a ReferenceEntry>,
) -> Option<SuggestedEntity> {
    match lookup(&entity.id) {
        Some(found) => Some(SuggestedEntity {
            name: found.name.clone(),
            ..entity
        }),
        None => {
            warn!(kind, id = %entity.id, "Dropping suggested {} with unknown id", kind);
            None
        }
    }
}

fn resolve_assignee<'a>(
    assignee: SuggestedAssignee,
    lookup: impl Fn(&str) -> Option<&'a ReferenceEntry>,
) -> Option<SuggestedAssignee> {
    match lookup(&assignee.id) {
        Some(found) => Some(SuggestedAssignee {
            name: found.name.clone(),
            ..assignee
        }),
        None => {
            warn!(id = %assignee.id, "Dropping suggested assignee with unknown id");
            None
        }
    }
}

fn repair_existing_case(suggestion: TriageSuggestion, ctx: &TriageContext) -> TriageSuggestion {
    let valid_id = match suggestion.suggested_existing_case_id {
        Some(ref id) if ctx.existing_case(id).is_some() => true,
        Some(ref id) => {
            warn!(id = %id, "Dropping suggested existing case with unknown id");
            false
        }
        None => false,
    };
    if valid_id {
        return suggestion;
    }

    let unlinked = TriageSuggestion {
        suggested_existing_case_id: None,
        existing_case_confidence: None,
        ..suggestion
    };
    if unlinked.recommended_action != RecommendedAction::AddToCase {
        return unlinked;
    }

    warn!("add_to_case has no valid case, downgrading to create_case");
    TriageSuggestion {
        recommended_action: RecommendedAction::CreateCase,
        action_reasoning: Some(CASE_NOT_FOUND_REASONING.to_string()),
        ..unlinked
    }
}

fn repair_campaign(suggestion: TriageSuggestion, ctx: &TriageContext) -> TriageSuggestion {
    let valid_id = match suggestion.suggested_campaign_id {
        Some(ref id) if ctx.matched_campaign(id).is_some() => true,
        Some(ref id) => {
            warn!(id = %id, "Dropping suggested campaign with unknown id");
            false
        }
        None => false,
    };
    if valid_id {
        return suggestion;
    }

    let unlinked = TriageSuggestion {
        suggested_campaign_id: None,
        suggested_campaign_confidence: None,
        ..suggestion
    };
    if unlinked.recommended_action != RecommendedAction::AssignCampaign {
        return unlinked;
    }

    match ctx.best_campaign() {
        Some(best) => {
            warn!(id = %best.id, "Substituting best matched campaign");
            unlinked.with_campaign(best.id.clone(), best.confidence())
        }
        None => {
            warn!("assign_campaign has no valid campaign, downgrading to create_case");
            TriageSuggestion {
                recommended_action: RecommendedAction::CreateCase,
                action_reasoning: Some(NO_CAMPAIGN_REASONING.to_string()),
                ..unlinked
            }
        }
    }
}
