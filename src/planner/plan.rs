//! Nurture plan types and validation of LLM-produced plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels::ChannelKind;
use crate::error::{MAX_PLAN_STEPS, PlanError};

/// Outreach pacing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Aggressive,
    Moderate,
    Conservative,
}

impl std::str::FromStr for Strategy {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aggressive" => Ok(Strategy::Aggressive),
            "moderate" => Ok(Strategy::Moderate),
            "conservative" => Ok(Strategy::Conservative),
            other => Err(PlanError::UnknownStrategy(other.to_string())),
        }
    }
}

/// One follow-up step in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Days after the previous step's trigger (or the seed contact time).
    pub days_after_previous: u32,
    pub channel: ChannelKind,
    /// Template name; resolved against the template store at execution time.
    pub template: String,
    /// Free-text conditions the model attached to this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    /// Wait for an open before advancing past this step.
    #[serde(default)]
    pub require_open: bool,
    /// Require a reply before advancing past this step.
    #[serde(default)]
    pub require_reply: bool,
}

/// An ordered follow-up sequence for one lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NurturePlan {
    pub id: String,
    pub lead_id: String,
    pub strategy: Strategy,
    pub steps: Vec<PlanStep>,
    pub created_at: DateTime<Utc>,
}

impl NurturePlan {
    pub fn new(lead_id: &str, strategy: Strategy, steps: Vec<PlanStep>) -> Self {
        Self {
            id: format!("plan_{}", Uuid::new_v4()),
            lead_id: lead_id.to_string(),
            strategy,
            steps,
            created_at: Utc::now(),
        }
    }

    /// Multiply every step's spacing by `factor`, keeping the step count.
    pub fn widen_spacing(&mut self, factor: u32) {
        for step in &mut self.steps {
            step.days_after_previous = step.days_after_previous.saturating_mul(factor);
        }
    }
}

// ── LLM plan parsing ────────────────────────────────────────────────

/// Plan shape as produced by the model, before validation. Field-name
/// variants the prompt has drifted through are accepted as aliases.
#[derive(Debug, Deserialize)]
struct RawPlan {
    strategy: Option<String>,
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(alias = "days_after")]
    days_after_previous: Option<u32>,
    channel: Option<String>,
    #[serde(alias = "template_name")]
    template: Option<String>,
    #[serde(alias = "trigger_conditions")]
    conditions: Option<String>,
    require_open: Option<bool>,
    require_reply: Option<bool>,
}

/// Parse and validate a model-produced plan for a lead.
///
/// Rejections here never escalate: the generator answers every rejection
/// with the deterministic fallback plan.
pub fn parse_llm_plan(lead_id: &str, raw_text: &str) -> Result<NurturePlan, PlanError> {
    let json = extract_json(raw_text)
        .ok_or_else(|| PlanError::Malformed("no JSON object in response".to_string()))?;

    let raw: RawPlan =
        serde_json::from_str(json).map_err(|e| PlanError::Malformed(e.to_string()))?;

    let strategy: Strategy = raw
        .strategy
        .ok_or(PlanError::MissingField("strategy"))?
        .parse()?;

    let raw_steps = raw.steps.ok_or(PlanError::MissingField("steps"))?;
    if raw_steps.is_empty() || raw_steps.len() > MAX_PLAN_STEPS {
        return Err(PlanError::StepCountOutOfRange {
            count: raw_steps.len(),
        });
    }

    let mut steps = Vec::with_capacity(raw_steps.len());
    for (index, raw_step) in raw_steps.into_iter().enumerate() {
        let days_after_previous = raw_step
            .days_after_previous
            .ok_or(PlanError::InvalidStep {
                index,
                field: "days_after_previous",
            })?;
        let channel = raw_step
            .channel
            .ok_or(PlanError::InvalidStep {
                index,
                field: "channel",
            })?
            .parse::<ChannelKind>()
            .map_err(PlanError::UnknownChannel)?;
        let template = raw_step.template.ok_or(PlanError::InvalidStep {
            index,
            field: "template",
        })?;

        steps.push(PlanStep {
            days_after_previous,
            channel,
            template,
            conditions: raw_step.conditions,
            require_open: raw_step.require_open.unwrap_or(true),
            require_reply: raw_step.require_reply.unwrap_or(false),
        });
    }

    Ok(NurturePlan::new(lead_id, strategy, steps))
}

/// Slice the first top-level JSON object out of a model response, tolerating
/// markdown code fences and surrounding prose.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "strategy": "moderate",
        "steps": [
            {"days_after_previous": 3, "channel": "email", "template": "intro", "require_open": true},
            {"days_after_previous": 4, "channel": "slack", "template": "checkin"}
        ]
    }"#;

    #[test]
    fn parses_valid_plan() {
        let plan = parse_llm_plan("lead_1", VALID).unwrap();
        assert_eq!(plan.strategy, Strategy::Moderate);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].channel, ChannelKind::Slack);
        assert!(!plan.steps[1].require_reply);
    }

    #[test]
    fn parses_plan_in_code_fence() {
        let fenced = format!("Here is the plan:\n```json\n{VALID}\n```\n");
        let plan = parse_llm_plan("lead_1", &fenced).unwrap();
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn accepts_field_aliases() {
        let aliased = r#"{
            "strategy": "conservative",
            "steps": [{"days_after": 7, "channel": "email", "template_name": "general_followup"}]
        }"#;
        let plan = parse_llm_plan("lead_1", aliased).unwrap();
        assert_eq!(plan.steps[0].days_after_previous, 7);
        assert_eq!(plan.steps[0].template, "general_followup");
    }

    #[test]
    fn rejects_missing_strategy() {
        let raw = r#"{"steps": [{"days_after_previous": 1, "channel": "email", "template": "t"}]}"#;
        assert!(matches!(
            parse_llm_plan("lead_1", raw),
            Err(PlanError::MissingField("strategy"))
        ));
    }

    #[test]
    fn rejects_missing_steps() {
        let raw = r#"{"strategy": "moderate"}"#;
        assert!(matches!(
            parse_llm_plan("lead_1", raw),
            Err(PlanError::MissingField("steps"))
        ));
    }

    #[test]
    fn rejects_empty_and_oversized_step_lists() {
        let empty = r#"{"strategy": "moderate", "steps": []}"#;
        assert!(matches!(
            parse_llm_plan("lead_1", empty),
            Err(PlanError::StepCountOutOfRange { count: 0 })
        ));

        let step = r#"{"days_after_previous": 1, "channel": "email", "template": "t"}"#;
        let six = format!(
            r#"{{"strategy": "moderate", "steps": [{step},{step},{step},{step},{step},{step}]}}"#
        );
        assert!(matches!(
            parse_llm_plan("lead_1", &six),
            Err(PlanError::StepCountOutOfRange { count: 6 })
        ));
    }

    #[test]
    fn rejects_step_missing_required_field() {
        let raw = r#"{"strategy": "moderate", "steps": [{"channel": "email", "template": "t"}]}"#;
        assert!(matches!(
            parse_llm_plan("lead_1", raw),
            Err(PlanError::InvalidStep {
                index: 0,
                field: "days_after_previous"
            })
        ));
    }

    #[test]
    fn rejects_unknown_channel() {
        let raw = r#"{"strategy": "moderate", "steps": [{"days_after_previous": 1, "channel": "fax", "template": "t"}]}"#;
        assert!(matches!(
            parse_llm_plan("lead_1", raw),
            Err(PlanError::UnknownChannel(_))
        ));
    }

    #[test]
    fn rejects_prose_without_json() {
        assert!(matches!(
            parse_llm_plan("lead_1", "I could not produce a plan."),
            Err(PlanError::Malformed(_))
        ));
    }

    #[test]
    fn widen_spacing_multiplies_without_dropping_steps() {
        let mut plan = parse_llm_plan("lead_1", VALID).unwrap();
        plan.widen_spacing(2);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].days_after_previous, 6);
        assert_eq!(plan.steps[1].days_after_previous, 8);
    }
}
