//! In-memory store implementations.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::engagement::{InteractionEvent, InteractionKind};
use crate::error::StoreError;
use crate::leads::Lead;
use crate::store::traits::{LeadStore, TemplateStore};
use crate::templates::MessageTemplate;

/// In-memory lead + interaction store.
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: RwLock<BTreeMap<String, Lead>>,
    events: RwLock<Vec<InteractionEvent>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with leads.
    pub async fn with_leads(leads: Vec<Lead>) -> Self {
        let store = Self::new();
        for lead in leads {
            store.leads.write().await.insert(lead.id.clone(), lead);
        }
        store
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn get_lead(&self, id: &str) -> Result<Lead, StoreError> {
        self.leads
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "lead",
                id: id.to_string(),
            })
    }

    async fn upsert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        self.leads
            .write()
            .await
            .insert(lead.id.clone(), lead.clone());
        Ok(())
    }

    async fn list_leads(&self) -> Result<Vec<Lead>, StoreError> {
        Ok(self.leads.read().await.values().cloned().collect())
    }

    async fn append_event(&self, event: &InteractionEvent) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn query_events(
        &self,
        lead_id: &str,
        kind: Option<InteractionKind>,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InteractionEvent>, StoreError> {
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.lead_id == lead_id)
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| since.is_none_or(|s| e.timestamp >= s))
            .cloned()
            .collect())
    }
}

/// In-memory template store keyed by template name.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<BTreeMap<String, MessageTemplate>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_templates(templates: Vec<MessageTemplate>) -> Self {
        let store = Self::new();
        for template in templates {
            store
                .templates
                .write()
                .await
                .insert(template.name.clone(), template);
        }
        store
    }

    pub async fn insert(&self, template: MessageTemplate) {
        self.templates
            .write()
            .await
            .insert(template.name.clone(), template);
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn get(&self, name: &str) -> Result<MessageTemplate, StoreError> {
        self.templates
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "template",
                id: name.to_string(),
            })
    }

    async fn list(&self, industry: Option<&str>) -> Result<Vec<MessageTemplate>, StoreError> {
        let templates = self.templates.read().await;
        Ok(templates
            .values()
            .filter(|t| {
                industry.is_none_or(|filter| t.industry.eq_ignore_ascii_case(filter))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelKind;

    fn template(name: &str, industry: &str) -> MessageTemplate {
        MessageTemplate {
            name: name.into(),
            subject: "s".into(),
            body: "b".into(),
            channel: ChannelKind::Email,
            industry: industry.into(),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn missing_lead_is_not_found() {
        let store = MemoryLeadStore::new();
        let result = store.get_lead("lead_missing").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn events_filter_by_kind_and_since() {
        let store = MemoryLeadStore::new();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        store.upsert_lead(&lead).await.unwrap();

        let old = Utc::now() - chrono::Duration::days(10);
        let mut sent = InteractionEvent::new(&lead.id, InteractionKind::Sent, "hello");
        sent.timestamp = old;
        store.append_event(&sent).await.unwrap();
        store
            .append_event(&InteractionEvent::new(&lead.id, InteractionKind::Reply, "yes"))
            .await
            .unwrap();

        let replies = store
            .query_events(&lead.id, Some(InteractionKind::Reply), None)
            .await
            .unwrap();
        assert_eq!(replies.len(), 1);

        let recent = store
            .query_events(&lead.id, None, Some(Utc::now() - chrono::Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, InteractionKind::Reply);
    }

    #[tokio::test]
    async fn template_list_filters_industry() {
        let store = MemoryTemplateStore::with_templates(vec![
            template("a", "saas"),
            template("b", "Retail"),
            template("c", "saas"),
        ])
        .await;

        let saas = store.list(Some("SaaS")).await.unwrap();
        assert_eq!(saas.len(), 2);
        let all = store.list(None).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
