//! Prompt construction for plan generation.

use crate::config::EngagementConfig;
use crate::leads::Lead;
use crate::templates::MessageTemplate;

/// Build the plan-generation prompt for one lead.
pub fn plan_prompt(
    lead: &Lead,
    business_type: &str,
    engagement: &EngagementConfig,
    history_summary: &str,
    available_templates: &[MessageTemplate],
) -> String {
    let lead_details = serde_json::json!({
        "name": lead.full_name(),
        "company": lead.company_name,
        "industry": lead.industry,
        "job_title": lead.job_title,
        "pain_points": lead.pain_points,
        "interests": lead.interests,
        "last_contact": lead.last_contact.map(|t| t.to_rfc3339()),
    });

    let engagement_rules = serde_json::json!({
        "min_open_rate": engagement.min_open_rate,
        "min_reply_rate": engagement.min_reply_rate,
    });

    let templates = available_templates
        .iter()
        .map(|t| format!("- {} ({}, {})", t.name, t.channel, t.industry))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You're a sales nurturing assistant. Create a personalized follow-up plan based on:\n\n\
         Lead Details: {lead_details}\n\
         Business Type: {business_type}\n\
         Engagement Rules: {engagement_rules}\n\n\
         Recent Interactions:\n{history}\n\n\
         Available Templates:\n{templates}\n\n\
         Generate a JSON plan with:\n\
         - \"strategy\": \"aggressive\"|\"moderate\"|\"conservative\" (based on engagement)\n\
         - \"steps\": [{{\n\
             \"days_after_previous\": int,\n\
             \"channel\": \"email\"|\"slack\",\n\
             \"template\": str,\n\
             \"conditions\": str,\n\
             \"require_open\": bool (wait for open before next step?),\n\
             \"require_reply\": bool (require reply to continue?)\n\
           }}]\n\n\
         Rules:\n\
         1. If open rate < min_open_rate, use \"conservative\" strategy\n\
         2. If reply rate < min_reply_rate, space steps further apart\n\
         3. Never suggest more than 5 steps\n\
         4. Only use template names from the available templates\n\
         Respond with JSON only.",
        history = if history_summary.is_empty() {
            "(no prior interactions)"
        } else {
            history_summary
        },
    )
}

/// Summarize the most recent interactions for the prompt, newest last.
pub fn history_summary(events: &[crate::engagement::InteractionEvent], limit: usize) -> String {
    let start = events.len().saturating_sub(limit);
    events[start..]
        .iter()
        .map(|event| {
            format!(
                "{:?} ({}): {}",
                event.kind,
                event.timestamp.to_rfc3339(),
                truncate(&event.content, 120)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::{InteractionEvent, InteractionKind};

    #[test]
    fn prompt_carries_lead_and_templates() {
        let mut lead = Lead::new("Ada", "Lovelace", "ada@engines.dev", "Engines");
        lead.industry = Some("manufacturing".into());
        let templates = vec![MessageTemplate::generic_fallback()];

        let prompt = plan_prompt(
            &lead,
            "B2B",
            &EngagementConfig::default(),
            "",
            &templates,
        );
        assert!(prompt.contains("Ada Lovelace"));
        assert!(prompt.contains("general_followup"));
        assert!(prompt.contains("(no prior interactions)"));
        assert!(prompt.contains("min_open_rate"));
    }

    #[test]
    fn history_summary_takes_most_recent() {
        let events: Vec<_> = (0..5)
            .map(|i| {
                InteractionEvent::new("lead_1", InteractionKind::Sent, &format!("message {i}"))
            })
            .collect();
        let summary = history_summary(&events, 3);
        assert_eq!(summary.lines().count(), 3);
        assert!(summary.contains("message 4"));
        assert!(!summary.contains("message 0"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(t));
    }
}
