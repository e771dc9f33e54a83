//! Store traits — async interfaces for leads, interaction history, and
//! templates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::engagement::{InteractionEvent, InteractionKind};
use crate::error::StoreError;
use crate::leads::Lead;
use crate::templates::MessageTemplate;

/// Lead records plus their append-only interaction history.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Get a lead by id.
    async fn get_lead(&self, id: &str) -> Result<Lead, StoreError>;

    /// Insert or replace a lead.
    async fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    /// List all leads.
    async fn list_leads(&self) -> Result<Vec<Lead>, StoreError>;

    /// Append an interaction event. Events are never mutated or deleted.
    async fn append_event(&self, event: &InteractionEvent) -> Result<(), StoreError>;

    /// Query a lead's events, oldest first, optionally filtered by kind
    /// and/or a lower timestamp bound.
    async fn query_events(
        &self,
        lead_id: &str,
        kind: Option<InteractionKind>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InteractionEvent>, StoreError>;
}

/// Message templates by name and industry.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Get a template by name.
    async fn get(&self, name: &str) -> Result<MessageTemplate, StoreError>;

    /// List templates, optionally filtered by industry (case-insensitive).
    async fn list(&self, industry: Option<&str>) -> Result<Vec<MessageTemplate>, StoreError>;
}
