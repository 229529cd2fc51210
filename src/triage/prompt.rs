//! Prompt 编译：TriageContext -> 单段文本 Prompt
//!
//! 纯函数，同一上下文产出逐字节相同的 Prompt。结构为：固定策略前言 + 上下文渲染 + 结尾约束。

use std::fmt::Write;

use crate::triage::{ReferenceEntry, TriageContext};

const POLICY_PREAMBLE: &str = r#"You are a triage assistant for a constituency office. Analyse the inbound email and return a structured triage suggestion.

Classify the email as exactly one of:
- casework: the sender needs help with a personal issue that staff must follow up (housing, benefits, immigration, local services)
- policy: the sender is expressing a view on, or asking about, a policy or vote
- campaign: the email is one of many near-identical messages from an organised mailing effort
- spam: unsolicited, commercial or abusive mail that needs no action
- personal: private correspondence not related to constituency business

Recommend exactly one action:
- create_case: open a new case for this sender
- add_to_case: attach the email to one of the sender's existing cases listed below
- assign_campaign: file the email under one of the matched campaigns listed below
- ignore: no further handling is required

Also, where the email supports it:
- suggest a case type, category, assignee and tags from the reference data below
- suggest a priority (low, medium, high, urgent); use urgent only for imminent risk to health, safety or housing
- write a one-sentence case summary and, if follow-up is time-bound, a review date (YYYY-MM-DD)
- draft a short, polite acknowledgement reply
- extract the sender's name, postal address, phone number and postcode if they appear in the body

Every confidence value must be a number between 0 and 1."#;

const CLOSING_INSTRUCTION: &str = "Use only ids that appear in the reference data, existing cases and matched campaigns above. If nothing fits, omit the field rather than inventing an id.";

/// 编译 Prompt（确定性）
pub fn compile_prompt(ctx: &TriageContext) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(POLICY_PREAMBLE);
    out.push_str("\n\n");

    out.push_str("## Reference data\n\n");
    render_entries(&mut out, "Case types", &ctx.reference_data.case_types);
    render_entries(&mut out, "Categories", &ctx.reference_data.categories);
    render_entries(&mut out, "Caseworkers", &ctx.reference_data.caseworkers);
    render_entries(&mut out, "Tags", &ctx.reference_data.tags);

    out.push_str("## Sender\n\n");
    match &ctx.constituent {
        Some(c) => {
            let _ = writeln!(
                out,
                "Known constituent: id={}{}",
                c.id,
                c.name
                    .as_deref()
                    .map(|n| format!(", name={n}"))
                    .unwrap_or_default()
            );
        }
        None => out.push_str("Sender is not a known constituent.\n"),
    }
    out.push('\n');

    out.push_str("## Existing cases for this constituent\n\n");
    if ctx.existing_cases.is_empty() {
        out.push_str("(none)\n");
    }
    for case in &ctx.existing_cases {
        let _ = write!(out, "- id={}", case.id);
        if let Some(ref ct) = case.case_type {
            let _ = write!(out, " | type: {ct}");
        }
        if let Some(ref status) = case.status {
            let _ = write!(out, " | status: {status}");
        }
        if let Some(ref created) = case.created_at {
            let _ = write!(out, " | opened: {created}");
        }
        if let Some(ref summary) = case.summary {
            let _ = write!(out, " | summary: {summary}");
        }
        out.push('\n');
    }
    out.push('\n');

    out.push_str("## Matched campaigns\n\n");
    if ctx.matched_campaigns.is_empty() {
        out.push_str("(none)\n");
    }
    for campaign in &ctx.matched_campaigns {
        let _ = writeln!(
            out,
            "- id={} | name: {} | match confidence: {:.2}",
            campaign.id, campaign.name, campaign.match_confidence
        );
    }
    out.push('\n');

    out.push_str("## Email\n\n");
    let sender = match ctx.email.from_name.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            format!("{} <{}>", name.trim(), ctx.email.from_address)
        }
        _ => ctx.email.from_address.clone(),
    };
    let _ = writeln!(out, "From: {sender}");
    let _ = writeln!(out, "Subject: {}", ctx.email.subject);
    out.push_str("Body:\n");
    out.push_str(&ctx.email.body);
    out.push_str("\n\n");

    out.push_str(CLOSING_INSTRUCTION);
    out
}

fn render_entries(out: &mut String, title: &str, entries: &[ReferenceEntry]) {
    let _ = writeln!(out, "{title}:");
    if entries.is_empty() {
        out.push_str("(none)\n");
    }
    for e in entries {
        let _ = writeln!(out, "- id={} | {}", e.id, e.name);
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::{ExistingCase, InboundEmail, MatchedCampaign, ReferenceData};

    fn sample_context() -> TriageContext {
        TriageContext {
            email: InboundEmail {
                subject: "Damp in my flat".to_string(),
                body: "My landlord will not fix the mould.".to_string(),
                from_address: "jo@example.com".to_string(),
                from_name: Some("Jo Bloggs".to_string()),
            },
            reference_data: ReferenceData {
                case_types: vec![ReferenceEntry::new("1", "Housing")],
                categories: vec![ReferenceEntry::new("10", "Private rented")],
                caseworkers: vec![ReferenceEntry::new("u1", "Sam")],
                tags: vec![],
            },
            constituent: None,
            existing_cases: vec![ExistingCase::new("Y")],
            matched_campaigns: vec![MatchedCampaign {
                id: "c1".to_string(),
                name: "Library".to_string(),
                match_confidence: 0.9,
            }],
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let ctx = sample_context();
        assert_eq!(compile_prompt(&ctx), compile_prompt(&ctx.clone()));
    }

    #[test]
    fn test_prompt_renders_context() {
        let prompt = compile_prompt(&sample_context());
        assert!(prompt.starts_with(POLICY_PREAMBLE));
        assert!(prompt.contains("- id=1 | Housing"));
        assert!(prompt.contains("- id=u1 | Sam"));
        assert!(prompt.contains("Tags:\n(none)"));
        assert!(prompt.contains("- id=Y"));
        assert!(prompt.contains("- id=c1 | name: Library | match confidence: 0.90"));
        assert!(prompt.contains("From: Jo Bloggs <jo@example.com>"));
        assert!(prompt.contains("My landlord will not fix the mould."));
        assert!(prompt.ends_with(CLOSING_INSTRUCTION));
    }

    #[test]
    fn test_prompt_changes_with_email() {
        let a = sample_context();
        let mut b = sample_context();
        b.email.body.push_str(" It is getting worse.");
        assert_ne!(compile_prompt(&a), compile_prompt(&b));
    }
}
