//! Plan generation — LLM-backed with a deterministic fallback.
//!
//! Generation never fails the caller: every error path (transport, timeout,
//! malformed or invalid plan) lands on the fallback plan.

pub mod plan;
pub mod prompts;

pub use plan::{NurturePlan, PlanStep, Strategy, parse_llm_plan};

use std::sync::Arc;

use crate::channels::ChannelKind;
use crate::config::NurtureConfig;
use crate::leads::Lead;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::templates::{GENERAL_FOLLOWUP, MessageTemplate};

/// Observed engagement rates for a lead, when history exists.
#[derive(Debug, Clone, Copy)]
pub struct EngagementSnapshot {
    pub open_rate: f64,
    pub reply_rate: f64,
}

/// Generates nurture plans.
pub struct PlanGenerator {
    llm: Arc<dyn LlmProvider>,
    config: NurtureConfig,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: NurtureConfig) -> Self {
        Self { llm, config }
    }

    /// Generate a plan for a lead.
    ///
    /// `engagement` is `None` for leads with no sent history; when present
    /// it drives the strategy adjustment after a successful generation.
    pub async fn generate(
        &self,
        lead: &Lead,
        history_summary: &str,
        engagement: Option<EngagementSnapshot>,
        available_templates: &[MessageTemplate],
    ) -> NurturePlan {
        let prompt = prompts::plan_prompt(
            lead,
            &self.config.business_type,
            &self.config.engagement,
            history_summary,
            available_templates,
        );

        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)]);

        let response =
            match tokio::time::timeout(self.config.llm_timeout, self.llm.complete(request)).await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::warn!(lead = %lead.id, "Plan generation failed: {e}");
                    return self.fallback_plan(lead, available_templates);
                }
                Err(_) => {
                    tracing::warn!(
                        lead = %lead.id,
                        timeout = ?self.config.llm_timeout,
                        "Plan generation timed out"
                    );
                    return self.fallback_plan(lead, available_templates);
                }
            };

        let mut plan = match parse_llm_plan(&lead.id, &response.content) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(lead = %lead.id, "Rejecting generated plan: {e}");
                return self.fallback_plan(lead, available_templates);
            }
        };

        if let Some(snapshot) = engagement {
            self.adjust_for_engagement(&mut plan, snapshot);
        }

        tracing::info!(
            lead = %lead.id,
            plan = %plan.id,
            strategy = ?plan.strategy,
            steps = plan.steps.len(),
            "Generated nurture plan"
        );
        plan
    }

    /// Deterministic plan used whenever generation cannot be trusted.
    pub fn fallback_plan(
        &self,
        lead: &Lead,
        available_templates: &[MessageTemplate],
    ) -> NurturePlan {
        let template = if available_templates.is_empty()
            || available_templates.iter().any(|t| t.name == GENERAL_FOLLOWUP)
        {
            GENERAL_FOLLOWUP.to_string()
        } else {
            available_templates[0].name.clone()
        };

        tracing::info!(lead = %lead.id, %template, "Using fallback nurture plan");

        NurturePlan::new(
            &lead.id,
            Strategy::Conservative,
            vec![PlanStep {
                days_after_previous: 7,
                channel: ChannelKind::Email,
                template,
                conditions: Some("if no negative response".to_string()),
                require_open: true,
                require_reply: false,
            }],
        )
    }

    /// Post-generation strategy adjustment from observed engagement.
    fn adjust_for_engagement(&self, plan: &mut NurturePlan, snapshot: EngagementSnapshot) {
        let engagement = &self.config.engagement;

        if snapshot.open_rate < engagement.min_open_rate
            && plan.strategy != Strategy::Conservative
        {
            tracing::debug!(
                plan = %plan.id,
                open_rate = snapshot.open_rate,
                "Forcing conservative strategy"
            );
            plan.strategy = Strategy::Conservative;
        }

        if snapshot.reply_rate < engagement.min_reply_rate {
            tracing::debug!(
                plan = %plan.id,
                reply_rate = snapshot.reply_rate,
                factor = self.config.spacing_multiplier,
                "Widening step spacing"
            );
            plan.widen_spacing(self.config.spacing_multiplier);
        }
    }
}
