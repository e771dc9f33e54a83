//! Nurture orchestrator — ties skip checks, planning, scheduling, and
//! delivery together.
//!
//! Trigger handling is a terminal boundary: it always resolves to a
//! `StepOutcome`, never an error. A failing step is logged and recorded; it
//! must not prevent later steps from firing.
//!
//! Concurrency: units of work for different leads run freely in parallel.
//! For one lead, the decide phase (claim + skip re-check + render) and the
//! record phase (event append + lead update) each hold that lead's lock; the
//! delivery network call runs between them with no lock held.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::channels::{ChannelKind, DeliveryOutcome, Dispatcher};
use crate::config::NurtureConfig;
use crate::engagement::{EngagementTracker, InteractionEvent, InteractionKind};
use crate::error::{Error, StoreError};
use crate::leads::{Lead, LeadStatus};
use crate::personalize::{Personalizer, Rendered};
use crate::planner::{EngagementSnapshot, PlanGenerator, prompts};
use crate::scheduler::{FollowUpJob, InMemoryScheduler, JobScheduler, PlanScheduler};
use crate::store::{LeadStore, TemplateStore};
use crate::templates::MessageTemplate;

/// Result of a plan-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Lead failed the skip check; no plan was generated.
    Skipped,
    /// Plan generated and all steps scheduled.
    Scheduled {
        plan_id: String,
        job_ids: Vec<String>,
    },
}

/// Result of one trigger firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// This job id already ran (or is running); nothing was dispatched.
    AlreadyExecuted,
    /// The plan is paused or was skipped; step not dispatched.
    PlanInactive,
    /// Skip re-check failed at fire time; this and remaining steps skipped.
    Skipped,
    /// Message dispatched; `success` reflects the delivery outcome.
    Dispatched { success: bool },
    /// Step aborted (missing lead or similar); other steps unaffected.
    Aborted { reason: String },
}

/// Lifecycle of a tracked plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Active,
    Paused,
    Skipped,
    Completed,
}

struct PlanRecord {
    lead_id: String,
    state: PlanState,
    job_ids: Vec<String>,
    completed_jobs: usize,
}

/// Collaborators injected into the orchestrator. All stores are owned by the
/// caller; the orchestrator never constructs persistence.
pub struct OrchestratorDeps {
    pub lead_store: Arc<dyn LeadStore>,
    pub template_store: Arc<dyn TemplateStore>,
    pub tracker: Arc<EngagementTracker>,
    pub generator: PlanGenerator,
    pub scheduler: Arc<dyn JobScheduler>,
    pub dispatcher: Dispatcher,
}

pub struct NurtureOrchestrator {
    config: NurtureConfig,
    lead_store: Arc<dyn LeadStore>,
    template_store: Arc<dyn TemplateStore>,
    tracker: Arc<EngagementTracker>,
    generator: PlanGenerator,
    scheduler: Arc<dyn JobScheduler>,
    plan_scheduler: PlanScheduler,
    dispatcher: Dispatcher,
    personalizer: Personalizer,
    plans: RwLock<HashMap<String, PlanRecord>>,
    /// Job ids that have been claimed by a firing. Claimed before dispatch so
    /// a misfire-retry racing the original cannot double-send.
    claimed_jobs: RwLock<HashSet<String>>,
    /// Per-lead locks serializing decide/record phases for the same lead.
    lead_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NurtureOrchestrator {
    pub fn new(config: NurtureConfig, deps: OrchestratorDeps) -> Self {
        let plan_scheduler = PlanScheduler::new(deps.scheduler.clone(), config.misfire_grace);
        let personalizer = Personalizer::new(&config.business_name);
        Self {
            config,
            lead_store: deps.lead_store,
            template_store: deps.template_store,
            tracker: deps.tracker,
            generator: deps.generator,
            scheduler: deps.scheduler,
            plan_scheduler,
            dispatcher: deps.dispatcher,
            personalizer,
            plans: RwLock::new(HashMap::new()),
            claimed_jobs: RwLock::new(HashSet::new()),
            lead_locks: Mutex::new(HashMap::new()),
        }
    }

    // ── Plan creation ───────────────────────────────────────────────

    /// Create and schedule a nurture plan for a lead.
    pub async fn create_plan(&self, lead_id: &str) -> Result<PlanOutcome, Error> {
        let lead = self.lead_store.get_lead(lead_id).await?;

        if self.tracker.should_skip(&lead).await {
            tracing::info!(lead = %lead.id, "Lead skipped, no plan created");
            return Ok(PlanOutcome::Skipped);
        }

        let events = self
            .lead_store
            .query_events(lead_id, None, None)
            .await
            .unwrap_or_default();
        let history = prompts::history_summary(&events, 3);
        let snapshot = self.engagement_snapshot(lead_id).await;

        let templates = self.relevant_templates(&lead).await;
        let plan = self
            .generator
            .generate(&lead, &history, snapshot, &templates)
            .await;

        let job_ids = self.plan_scheduler.schedule_plan(&lead, &plan).await?;

        self.plans.write().await.insert(
            plan.id.clone(),
            PlanRecord {
                lead_id: lead.id.clone(),
                state: PlanState::Active,
                job_ids: job_ids.clone(),
                completed_jobs: 0,
            },
        );

        Ok(PlanOutcome::Scheduled {
            plan_id: plan.id,
            job_ids,
        })
    }

    /// Observed open/reply rates, when the lead has sent-history in the
    /// configured window.
    async fn engagement_snapshot(&self, lead_id: &str) -> Option<EngagementSnapshot> {
        let window = self.config.engagement.rate_window;
        let since = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        let sent = self
            .lead_store
            .query_events(lead_id, Some(InteractionKind::Sent), Some(since))
            .await
            .unwrap_or_default();
        if sent.is_empty() {
            return None;
        }
        Some(EngagementSnapshot {
            open_rate: self.tracker.rate(lead_id, InteractionKind::Open, window).await,
            reply_rate: self.tracker.rate(lead_id, InteractionKind::Reply, window).await,
        })
    }

    /// Templates matching the lead's industry, falling back to the full list.
    async fn relevant_templates(&self, lead: &Lead) -> Vec<MessageTemplate> {
        if let Some(ref industry) = lead.industry {
            match self.template_store.list(Some(industry)).await {
                Ok(templates) if !templates.is_empty() => return templates,
                Ok(_) => {}
                Err(e) => tracing::warn!(lead = %lead.id, "Template listing failed: {e}"),
            }
        }
        self.template_store.list(None).await.unwrap_or_default()
    }

    // ── Trigger handling ────────────────────────────────────────────

    /// Handle one step's trigger firing. Terminal boundary: never errors.
    pub async fn handle_trigger(&self, job: FollowUpJob) -> StepOutcome {
        let lock = self.lead_lock(&job.lead_id).await;

        // Decide phase, under the lead's lock.
        let decision = {
            let _guard = lock.lock().await;

            if !self.claim(&job.id).await {
                tracing::info!(job = %job.id, "Job already executed, ignoring retry");
                return StepOutcome::AlreadyExecuted;
            }

            if !self.plan_is_active(&job.plan_id).await {
                tracing::info!(job = %job.id, plan = %job.plan_id, "Plan inactive, step skipped");
                return StepOutcome::PlanInactive;
            }

            let lead = match self.lead_store.get_lead(&job.lead_id).await {
                Ok(lead) => lead,
                Err(e) => {
                    tracing::error!(job = %job.id, "Step aborted: {e}");
                    return StepOutcome::Aborted {
                        reason: e.to_string(),
                    };
                }
            };

            // State may have changed since scheduling; this re-check is
            // mandatory.
            if self.tracker.should_skip(&lead).await {
                self.skip_plan(&job.plan_id).await;
                return StepOutcome::Skipped;
            }

            let template = self.resolve_template(&job).await;
            let rendered = self.personalizer.render(&template, &lead);
            let (channel, recipient) = self.route(&job, &lead);
            (lead, rendered, channel, recipient)
        };
        let (lead, rendered, channel, recipient) = decision;

        // Dispatch outside the lock; delivery may block on network I/O.
        let outcome = match self
            .dispatcher
            .send(channel, &recipient, &rendered.subject, &rendered.body)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => DeliveryOutcome::failed(e.to_string()),
        };

        // Record phase, back under the lock. The outcome is recorded whether
        // or not delivery succeeded.
        let _guard = lock.lock().await;
        self.record_dispatch(&job, lead, channel, &rendered, &outcome)
            .await;
        self.note_job_done(&job.plan_id).await;

        StepOutcome::Dispatched {
            success: outcome.success,
        }
    }

    async fn record_dispatch(
        &self,
        job: &FollowUpJob,
        mut lead: Lead,
        channel: ChannelKind,
        rendered: &Rendered,
        outcome: &DeliveryOutcome,
    ) {
        if outcome.success {
            tracing::info!(job = %job.id, channel = %channel, "Follow-up dispatched");
        } else {
            tracing::warn!(
                job = %job.id,
                channel = %channel,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Follow-up delivery failed"
            );
        }

        let event = InteractionEvent::new(&lead.id, InteractionKind::Sent, &rendered.body)
            .with_channel(channel)
            .with_delivery(outcome.clone());
        self.tracker.record(event).await;

        lead.last_contact = Some(Utc::now());
        if lead.status == LeadStatus::New {
            lead.status = LeadStatus::Nurturing;
        }
        lead.updated_at = Utc::now();
        if let Err(e) = self.lead_store.upsert_lead(&lead).await {
            tracing::warn!(lead = %lead.id, "Failed to persist lead after dispatch: {e}");
        }
    }

    /// Resolve the step's template, falling back to the generic follow-up
    /// when it is missing. A missing template aborts nothing.
    async fn resolve_template(&self, job: &FollowUpJob) -> MessageTemplate {
        match self.template_store.get(&job.step.template).await {
            Ok(template) => template,
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(
                    template = %job.step.template,
                    "Template missing at execution time, using generic fallback"
                );
                MessageTemplate::generic_fallback()
            }
            Err(e) => {
                tracing::warn!(template = %job.step.template, "Template lookup failed: {e}");
                MessageTemplate::generic_fallback()
            }
        }
    }

    /// Pick transport and recipient for a step. A Slack step for a lead with
    /// no Slack id degrades to email.
    fn route(&self, job: &FollowUpJob, lead: &Lead) -> (ChannelKind, String) {
        match job.step.channel {
            ChannelKind::Slack => match lead.slack_id {
                Some(ref slack_id) => (ChannelKind::Slack, slack_id.clone()),
                None => {
                    tracing::debug!(lead = %lead.id, "No Slack id, routing step to email");
                    (ChannelKind::Email, lead.email.clone())
                }
            },
            ChannelKind::Email => (ChannelKind::Email, lead.email.clone()),
            ChannelKind::Log => (ChannelKind::Log, lead.email.clone()),
        }
    }

    // ── Plan lifecycle ──────────────────────────────────────────────

    /// Pause a plan: steps that fire while paused are skipped permanently.
    pub async fn pause_plan(&self, plan_id: &str) -> Result<(), Error> {
        self.set_plan_state(plan_id, PlanState::Paused, &[PlanState::Active])
            .await
    }

    /// Resume a paused plan. Already-fired steps are unaffected.
    pub async fn resume_plan(&self, plan_id: &str) -> Result<(), Error> {
        self.set_plan_state(plan_id, PlanState::Active, &[PlanState::Paused])
            .await
    }

    pub async fn plan_state(&self, plan_id: &str) -> Option<PlanState> {
        self.plans.read().await.get(plan_id).map(|r| r.state)
    }

    async fn set_plan_state(
        &self,
        plan_id: &str,
        to: PlanState,
        allowed_from: &[PlanState],
    ) -> Result<(), Error> {
        let mut plans = self.plans.write().await;
        let record = plans.get_mut(plan_id).ok_or(StoreError::NotFound {
            entity: "plan",
            id: plan_id.to_string(),
        })?;
        if allowed_from.contains(&record.state) {
            tracing::info!(plan = %plan_id, from = ?record.state, to = ?to, "Plan state change");
            record.state = to;
        }
        Ok(())
    }

    async fn plan_is_active(&self, plan_id: &str) -> bool {
        match self.plans.read().await.get(plan_id) {
            Some(record) => record.state == PlanState::Active,
            // Unknown plan (e.g. scheduled by a previous process): the skip
            // re-check still gates dispatch.
            None => true,
        }
    }

    /// Mark a plan skipped and cancel its unclaimed jobs.
    async fn skip_plan(&self, plan_id: &str) {
        let remaining: Vec<String> = {
            let mut plans = self.plans.write().await;
            match plans.get_mut(plan_id) {
                Some(record) => {
                    record.state = PlanState::Skipped;
                    record.job_ids.clone()
                }
                None => Vec::new(),
            }
        };

        let claimed = self.claimed_jobs.read().await;
        for job_id in remaining.iter().filter(|id| !claimed.contains(*id)) {
            if let Err(e) = self.scheduler.cancel(job_id).await {
                tracing::debug!(job = %job_id, "Cancel on skip: {e}");
            }
        }
        tracing::info!(plan = %plan_id, "Plan skipped; remaining steps cancelled");
    }

    async fn note_job_done(&self, plan_id: &str) {
        let mut plans = self.plans.write().await;
        if let Some(record) = plans.get_mut(plan_id) {
            record.completed_jobs += 1;
            if record.completed_jobs >= record.job_ids.len()
                && record.state == PlanState::Active
            {
                tracing::info!(plan = %plan_id, lead = %record.lead_id, "Plan complete");
                record.state = PlanState::Completed;
            }
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Claim a job id. Returns false if it was already claimed.
    async fn claim(&self, job_id: &str) -> bool {
        self.claimed_jobs.write().await.insert(job_id.to_string())
    }

    async fn lead_lock(&self, lead_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.lead_locks.lock().await;
        locks
            .entry(lead_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Spawn the background ticker that drains due jobs from the in-process
/// scheduler and hands them to the orchestrator.
pub fn spawn_ticker(
    orchestrator: Arc<NurtureOrchestrator>,
    scheduler: Arc<InMemoryScheduler>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            for job in scheduler.due(Utc::now()).await {
                let orchestrator = Arc::clone(&orchestrator);
                // Jobs for different leads run concurrently; the per-lead
                // lock serializes same-lead work.
                tokio::spawn(async move {
                    orchestrator.handle_trigger(job).await;
                });
            }
        }
    })
}
