//! Lead record and its enums.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a lead record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Csv,
    Api,
    Manual,
}

/// Lifecycle status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Nurturing,
    Engaged,
    Qualified,
    Converted,
    ClosedLost,
    OnHold,
    Unsubscribed,
}

/// A prospective customer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Slack channel/user id, when the lead is reachable over Slack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_id: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Attributes outside the fixed set; also available to templates.
    #[serde(default)]
    pub custom_attributes: BTreeMap<String, String>,
    /// When we last reached out to this lead, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact: Option<DateTime<Utc>>,
    /// When this lead last converted, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_conversion: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Create a lead with the minimum required fields.
    pub fn new(first_name: &str, last_name: &str, email: &str, company_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: format!("lead_{}", Uuid::new_v4()),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            company_name: company_name.to_string(),
            job_title: None,
            industry: None,
            company_size: None,
            phone: None,
            website: None,
            slack_id: None,
            source: LeadSource::Manual,
            status: LeadStatus::New,
            pain_points: Vec::new(),
            interests: Vec::new(),
            notes: String::new(),
            tags: Vec::new(),
            custom_attributes: BTreeMap::new(),
            last_contact: None,
            last_conversion: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Append a timestamped line to the lead's notes.
    pub fn append_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes
            .push_str(&format!("[{}] {note}", Utc::now().to_rfc3339()));
        self.updated_at = Utc::now();
    }
}
