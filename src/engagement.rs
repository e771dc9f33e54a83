//! Engagement tracking — interaction events, rates, and the gates that
//! decide whether a lead keeps receiving follow-ups.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels::{ChannelKind, DeliveryOutcome};
use crate::config::EngagementConfig;
use crate::leads::{Lead, LeadStatus};
use crate::store::LeadStore;

/// Kind of an interaction event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Outbound message sent (or attempted — see delivery metadata).
    Sent,
    Open,
    Click,
    Reply,
    WebsiteVisit,
    FormSubmission,
    MeetingScheduled,
    NegativeKeyword,
    Custom,
}

/// One interaction with a lead. Append-only: never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: String,
    pub lead_id: String,
    pub kind: InteractionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelKind>,
    pub content: String,
    /// Delivery metadata for `Sent` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryOutcome>,
    pub timestamp: DateTime<Utc>,
}

impl InteractionEvent {
    pub fn new(lead_id: &str, kind: InteractionKind, content: &str) -> Self {
        Self {
            id: format!("event_{}", Uuid::new_v4()),
            lead_id: lead_id.to_string(),
            kind,
            channel: None,
            content: content.to_string(),
            delivery: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelKind) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryOutcome) -> Self {
        self.delivery = Some(delivery);
        self
    }
}

/// Records engagement events and evaluates skip/escalation criteria.
pub struct EngagementTracker {
    store: Arc<dyn LeadStore>,
    config: EngagementConfig,
}

impl EngagementTracker {
    pub fn new(store: Arc<dyn LeadStore>, config: EngagementConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    /// Append an interaction event. Side effect only: store failures are
    /// logged, never surfaced to the caller.
    pub async fn record(&self, event: InteractionEvent) {
        let lead_id = event.lead_id.clone();
        if let Err(e) = self.store.append_event(&event).await {
            tracing::warn!(%lead_id, "Failed to record interaction event: {e}");
        }
    }

    /// Ratio of `kind` events to `Sent` events within the trailing window.
    /// No sent events in the window ⇒ 0.0.
    pub async fn rate(&self, lead_id: &str, kind: InteractionKind, window: Duration) -> f64 {
        let since =
            Utc::now() - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());

        let sent = self.count(lead_id, InteractionKind::Sent, Some(since)).await;
        if sent == 0 {
            return 0.0;
        }
        let matching = self.count(lead_id, kind, Some(since)).await;
        matching as f64 / sent as f64
    }

    /// Whether follow-ups to this lead should be skipped.
    ///
    /// A lead with no sent history is never skipped for low engagement;
    /// only the unsubscribe, cooldown, and negative-keyword gates apply.
    pub async fn should_skip(&self, lead: &Lead) -> bool {
        if lead.status == LeadStatus::Unsubscribed {
            tracing::info!(lead = %lead.id, "Skip: unsubscribed");
            return true;
        }

        if self.recently_converted(lead) {
            tracing::info!(lead = %lead.id, "Skip: within conversion cooldown");
            return true;
        }

        let events = match self.store.query_events(&lead.id, None, None).await {
            Ok(events) => events,
            Err(e) => {
                // History unreadable: only the lead-local gates above apply.
                tracing::warn!(lead = %lead.id, "Skip check could not read history: {e}");
                return false;
            }
        };

        if self.detected_negative(&events) {
            tracing::info!(lead = %lead.id, "Skip: negative keyword in recent history");
            return true;
        }

        if !self.meets_engagement(lead, &events) {
            tracing::info!(lead = %lead.id, "Skip: engagement below thresholds");
            return true;
        }

        false
    }

    /// Whether this lead should be escalated to a human.
    pub async fn meets_escalation(&self, lead: &Lead) -> bool {
        let month_ago = Utc::now() - chrono::Duration::days(30);

        let replies = self
            .count(&lead.id, InteractionKind::Reply, Some(month_ago))
            .await;
        if replies >= 3 {
            tracing::info!(lead = %lead.id, replies, "Escalation: reply volume");
            return true;
        }

        let meetings = self
            .count(&lead.id, InteractionKind::MeetingScheduled, Some(month_ago))
            .await;
        if meetings >= 2 {
            tracing::info!(lead = %lead.id, meetings, "Escalation: meetings scheduled");
            return true;
        }

        let forms = self
            .count(&lead.id, InteractionKind::FormSubmission, None)
            .await;
        if forms >= 1 {
            tracing::info!(lead = %lead.id, "Escalation: form submission");
            return true;
        }

        false
    }

    /// Record an inbound engagement event and promote the lead accordingly.
    /// Returns true if the lead now meets escalation criteria.
    pub async fn handle_event(
        &self,
        lead: &mut Lead,
        kind: InteractionKind,
        content: &str,
    ) -> bool {
        self.record(InteractionEvent::new(&lead.id, kind, content))
            .await;

        match kind {
            InteractionKind::Reply => lead.status = LeadStatus::Engaged,
            InteractionKind::MeetingScheduled => lead.status = LeadStatus::Qualified,
            _ => {}
        }

        let escalated = self.meets_escalation(lead).await;
        if escalated {
            lead.status = LeadStatus::Qualified;
            lead.append_note("Escalated to human due to high engagement.");
        }

        lead.updated_at = Utc::now();
        if let Err(e) = self.store.upsert_lead(lead).await {
            tracing::warn!(lead = %lead.id, "Failed to persist lead after event: {e}");
        }

        escalated
    }

    fn recently_converted(&self, lead: &Lead) -> bool {
        match lead.last_conversion {
            Some(converted_at) => {
                let elapsed = Utc::now().signed_duration_since(converted_at);
                elapsed < chrono::Duration::days(self.config.conversion_cooldown_days)
            }
            None => false,
        }
    }

    /// Engagement threshold gate over the configured rate window. Leads with
    /// no sent events pass unconditionally.
    fn meets_engagement(&self, lead: &Lead, events: &[InteractionEvent]) -> bool {
        let since = Utc::now()
            - chrono::Duration::from_std(self.config.rate_window)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let in_window: Vec<_> = events.iter().filter(|e| e.timestamp >= since).collect();

        let sent = in_window
            .iter()
            .filter(|e| e.kind == InteractionKind::Sent)
            .count();
        if sent == 0 {
            return true;
        }

        let opened = in_window
            .iter()
            .filter(|e| e.kind == InteractionKind::Open)
            .count();
        let replied = in_window
            .iter()
            .filter(|e| e.kind == InteractionKind::Reply)
            .count();

        let open_rate = opened as f64 / sent as f64;
        let reply_rate = replied as f64 / sent as f64;

        if open_rate < self.config.min_open_rate || reply_rate < self.config.min_reply_rate {
            tracing::debug!(
                lead = %lead.id,
                open_rate,
                reply_rate,
                "Engagement below thresholds"
            );
            return false;
        }

        true
    }

    /// Scan the most recent events' content for negative keywords.
    fn detected_negative(&self, events: &[InteractionEvent]) -> bool {
        let start = events.len().saturating_sub(self.config.negative_scan_depth);
        events[start..].iter().any(|event| {
            let content = event.content.to_lowercase();
            self.config
                .negative_keywords
                .iter()
                .any(|keyword| content.contains(keyword.as_str()))
        })
    }

    async fn count(
        &self,
        lead_id: &str,
        kind: InteractionKind,
        since: Option<DateTime<Utc>>,
    ) -> usize {
        match self.store.query_events(lead_id, Some(kind), since).await {
            Ok(events) => events.len(),
            Err(e) => {
                tracing::warn!(%lead_id, "Event count query failed: {e}");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLeadStore;

    fn tracker_with_store() -> (EngagementTracker, Arc<MemoryLeadStore>) {
        let store = Arc::new(MemoryLeadStore::new());
        let tracker = EngagementTracker::new(store.clone(), EngagementConfig::default());
        (tracker, store)
    }

    async fn seed(tracker: &EngagementTracker, lead_id: &str, kind: InteractionKind, n: usize) {
        for i in 0..n {
            tracker
                .record(InteractionEvent::new(lead_id, kind, &format!("event {i}")))
                .await;
        }
    }

    #[tokio::test]
    async fn no_history_lead_is_not_skipped() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        assert!(!tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn unsubscribed_lead_is_skipped() {
        let (tracker, _) = tracker_with_store();
        let mut lead = Lead::new("A", "B", "a@b.co", "Co");
        lead.status = LeadStatus::Unsubscribed;
        assert!(tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn conversion_cooldown_skips() {
        let (tracker, _) = tracker_with_store();
        let mut lead = Lead::new("A", "B", "a@b.co", "Co");
        lead.last_conversion = Some(Utc::now() - chrono::Duration::days(5));
        assert!(tracker.should_skip(&lead).await);

        lead.last_conversion = Some(Utc::now() - chrono::Duration::days(45));
        assert!(!tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn low_engagement_skips_when_history_exists() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        // 10 sends, 1 open, 0 replies: open rate 0.1 < 0.3.
        seed(&tracker, &lead.id, InteractionKind::Sent, 10).await;
        seed(&tracker, &lead.id, InteractionKind::Open, 1).await;
        assert!(tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn healthy_engagement_does_not_skip() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        // 10 sends, 5 opens, 2 replies: 0.5 / 0.2 — above both minimums.
        seed(&tracker, &lead.id, InteractionKind::Sent, 10).await;
        seed(&tracker, &lead.id, InteractionKind::Open, 5).await;
        seed(&tracker, &lead.id, InteractionKind::Reply, 2).await;
        assert!(!tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn negative_keyword_in_recent_history_skips() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        // Healthy rates, but a negative keyword in the latest reply.
        seed(&tracker, &lead.id, InteractionKind::Sent, 2).await;
        seed(&tracker, &lead.id, InteractionKind::Open, 2).await;
        seed(&tracker, &lead.id, InteractionKind::Reply, 1).await;
        tracker
            .record(InteractionEvent::new(
                &lead.id,
                InteractionKind::Reply,
                "Please UNSUBSCRIBE me from this list",
            ))
            .await;
        assert!(tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn negative_keyword_outside_scan_depth_is_ignored() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        tracker
            .record(InteractionEvent::new(
                &lead.id,
                InteractionKind::Reply,
                "stop contacting me",
            ))
            .await;
        // Push the negative reply out of the last-5 window with healthy events.
        seed(&tracker, &lead.id, InteractionKind::Sent, 2).await;
        seed(&tracker, &lead.id, InteractionKind::Open, 2).await;
        seed(&tracker, &lead.id, InteractionKind::Reply, 1).await;
        assert!(!tracker.should_skip(&lead).await);
    }

    #[tokio::test]
    async fn rate_is_zero_without_sent_events() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        seed(&tracker, &lead.id, InteractionKind::Open, 3).await;
        let rate = tracker
            .rate(&lead.id, InteractionKind::Open, Duration::from_secs(86400))
            .await;
        assert_eq!(rate, 0.0);
    }

    #[tokio::test]
    async fn rate_computes_ratio() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        seed(&tracker, &lead.id, InteractionKind::Sent, 4).await;
        seed(&tracker, &lead.id, InteractionKind::Open, 2).await;
        let rate = tracker
            .rate(&lead.id, InteractionKind::Open, Duration::from_secs(86400))
            .await;
        assert_eq!(rate, 0.5);
    }

    #[tokio::test]
    async fn escalation_on_three_replies() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        seed(&tracker, &lead.id, InteractionKind::Reply, 2).await;
        assert!(!tracker.meets_escalation(&lead).await);
        seed(&tracker, &lead.id, InteractionKind::Reply, 1).await;
        assert!(tracker.meets_escalation(&lead).await);
    }

    #[tokio::test]
    async fn escalation_on_single_form_submission() {
        let (tracker, _) = tracker_with_store();
        let lead = Lead::new("A", "B", "a@b.co", "Co");
        seed(&tracker, &lead.id, InteractionKind::FormSubmission, 1).await;
        assert!(tracker.meets_escalation(&lead).await);
    }

    #[tokio::test]
    async fn handle_event_promotes_status() {
        let (tracker, store) = tracker_with_store();
        let mut lead = Lead::new("A", "B", "a@b.co", "Co");
        store.upsert_lead(&lead).await.unwrap();

        tracker
            .handle_event(&mut lead, InteractionKind::Reply, "sounds good")
            .await;
        assert_eq!(lead.status, LeadStatus::Engaged);

        tracker
            .handle_event(&mut lead, InteractionKind::MeetingScheduled, "booked")
            .await;
        assert_eq!(lead.status, LeadStatus::Qualified);

        let stored = store.get_lead(&lead.id).await.unwrap();
        assert_eq!(stored.status, LeadStatus::Qualified);
    }

    #[tokio::test]
    async fn handle_event_escalates_and_notes() {
        let (tracker, store) = tracker_with_store();
        let mut lead = Lead::new("A", "B", "a@b.co", "Co");
        store.upsert_lead(&lead).await.unwrap();

        tracker
            .handle_event(&mut lead, InteractionKind::Reply, "r1")
            .await;
        tracker
            .handle_event(&mut lead, InteractionKind::Reply, "r2")
            .await;
        let escalated = tracker
            .handle_event(&mut lead, InteractionKind::Reply, "r3")
            .await;

        assert!(escalated);
        assert!(lead.notes.contains("Escalated to human"));
    }
}
