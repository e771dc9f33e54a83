//! Follow-up scheduling.
//!
//! The core converts plan steps into absolute-time jobs and hands them to a
//! `JobScheduler`. Job ids are derived from `(lead, template, trigger time)`
//! so re-scheduling the same plan overwrites instead of duplicating. Timer
//! ownership and persistence belong to the scheduler implementation; the
//! in-process one here backs the demo binary and tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::ScheduleError;
use crate::leads::Lead;
use crate::planner::{NurturePlan, PlanStep};

/// A plan step bound to an absolute trigger time.
#[derive(Debug, Clone)]
pub struct FollowUpJob {
    /// Deterministic id: `{lead_id}_{template}_{run_at_unix}`.
    pub id: String,
    pub lead_id: String,
    pub plan_id: String,
    pub step: PlanStep,
    pub run_at: DateTime<Utc>,
    /// A job firing later than `run_at + misfire_grace` is dropped.
    pub misfire_grace: Duration,
}

/// Derive the deterministic job id for a step trigger.
pub fn job_id(lead_id: &str, template: &str, run_at: DateTime<Utc>) -> String {
    format!("{lead_id}_{template}_{}", run_at.timestamp())
}

/// External job scheduler interface.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Submit a job. Submitting an id that already exists replaces the
    /// existing job.
    async fn schedule(&self, job: FollowUpJob) -> Result<(), ScheduleError>;

    /// Cancel a scheduled job.
    async fn cancel(&self, job_id: &str) -> Result<(), ScheduleError>;
}

/// Converts a plan into scheduled jobs.
pub struct PlanScheduler {
    scheduler: Arc<dyn JobScheduler>,
    misfire_grace: Duration,
}

impl PlanScheduler {
    pub fn new(scheduler: Arc<dyn JobScheduler>, misfire_grace: Duration) -> Self {
        Self {
            scheduler,
            misfire_grace,
        }
    }

    /// Schedule every step of a plan. Trigger times accumulate
    /// `days_after_previous` starting from the lead's last contact time, or
    /// now if the lead was never contacted. Returns the job ids, in step
    /// order.
    pub async fn schedule_plan(
        &self,
        lead: &Lead,
        plan: &NurturePlan,
    ) -> Result<Vec<String>, ScheduleError> {
        let mut trigger = lead.last_contact.unwrap_or_else(Utc::now);
        let mut job_ids = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            trigger += chrono::Duration::days(i64::from(step.days_after_previous));
            let id = job_id(&lead.id, &step.template, trigger);

            self.scheduler
                .schedule(FollowUpJob {
                    id: id.clone(),
                    lead_id: lead.id.clone(),
                    plan_id: plan.id.clone(),
                    step: step.clone(),
                    run_at: trigger,
                    misfire_grace: self.misfire_grace,
                })
                .await?;

            tracing::debug!(job = %id, run_at = %trigger, "Scheduled follow-up step");
            job_ids.push(id);
        }

        tracing::info!(
            lead = %lead.id,
            plan = %plan.id,
            jobs = job_ids.len(),
            "Scheduled nurture plan"
        );
        Ok(job_ids)
    }
}

/// In-process scheduler backed by a job map keyed by id.
#[derive(Default)]
pub struct InMemoryScheduler {
    jobs: RwLock<BTreeMap<String, FollowUpJob>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting to fire.
    pub async fn pending_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Pending job ids, sorted.
    pub async fn pending_ids(&self) -> Vec<String> {
        self.jobs.read().await.keys().cloned().collect()
    }

    /// Drain jobs due at `now`. Jobs past their misfire grace window are
    /// dropped with a warning instead of firing late.
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<FollowUpJob> {
        let mut jobs = self.jobs.write().await;
        let due_ids: Vec<String> = jobs
            .iter()
            .filter(|(_, job)| job.run_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut fired = Vec::new();
        for id in due_ids {
            let Some(job) = jobs.remove(&id) else {
                continue;
            };
            let deadline = job.run_at
                + chrono::Duration::from_std(job.misfire_grace)
                    .unwrap_or_else(|_| chrono::Duration::zero());
            if now > deadline {
                tracing::warn!(job = %job.id, run_at = %job.run_at, "Dropping job past misfire grace");
                continue;
            }
            fired.push(job);
        }

        fired.sort_by_key(|job| job.run_at);
        fired
    }
}

#[async_trait]
impl JobScheduler for InMemoryScheduler {
    async fn schedule(&self, job: FollowUpJob) -> Result<(), ScheduleError> {
        self.jobs.write().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ScheduleError> {
        match self.jobs.write().await.remove(job_id) {
            Some(_) => Ok(()),
            None => Err(ScheduleError::NotFound(job_id.to_string())),
        }
    }
}
