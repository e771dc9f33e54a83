//! Message templates.
//!
//! Templates are immutable once loaded and sourced externally (JSON files or
//! a template store). Placeholders are literal `{snake_case}` tokens filled
//! by the personalizer.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::channels::ChannelKind;
use crate::error::ParseError;

/// Template name used whenever a referenced template cannot be found.
pub const GENERAL_FOLLOWUP: &str = "general_followup";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").expect("placeholder regex"));

/// A message template for lead outreach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
    pub channel: ChannelKind,
    #[serde(default = "default_industry")]
    pub industry: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_industry() -> String {
    "general".to_string()
}

impl MessageTemplate {
    /// Placeholder names referenced by the subject or body, in order of
    /// first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for text in [&self.subject, &self.body] {
            for capture in PLACEHOLDER_RE.captures_iter(text) {
                let name = capture[1].to_string();
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
        seen
    }

    /// Built-in generic follow-up used when a referenced template is missing.
    pub fn generic_fallback() -> Self {
        Self {
            name: GENERAL_FOLLOWUP.to_string(),
            subject: "Following up, {first_name}".to_string(),
            body: "Hi {first_name},\n\nFollowing up on our conversation.\n\nRegards,\n{our_name}"
                .to_string(),
            channel: ChannelKind::Email,
            industry: default_industry(),
            tags: vec!["fallback".to_string()],
        }
    }
}

/// Load all `*.json` templates from a directory. Files that fail to parse
/// are skipped with a warning; a bad file never aborts the load.
pub fn load_template_dir(dir: &Path) -> Result<Vec<MessageTemplate>, ParseError> {
    let mut templates = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let raw = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<MessageTemplate>(&raw) {
            Ok(template) => {
                tracing::info!(name = %template.name, file = %path.display(), "Loaded template");
                templates.push(template);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), "Skipping unparseable template: {e}");
            }
        }
    }

    tracing::info!(count = templates.len(), "Loaded templates from {}", dir.display());
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_in_order_without_duplicates() {
        let template = MessageTemplate {
            name: "t".into(),
            subject: "Hi {first_name}".into(),
            body: "{first_name} from {company_name}, meet {our_name}.".into(),
            channel: ChannelKind::Email,
            industry: "general".into(),
            tags: vec![],
        };
        assert_eq!(
            template.placeholders(),
            vec!["first_name", "company_name", "our_name"]
        );
    }

    #[test]
    fn generic_fallback_is_email() {
        let template = MessageTemplate::generic_fallback();
        assert_eq!(template.name, GENERAL_FOLLOWUP);
        assert_eq!(template.channel, ChannelKind::Email);
    }

    #[test]
    fn loads_directory_skipping_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("welcome.json"),
            r#"{"name":"welcome","subject":"Hi {first_name}","body":"Welcome!","channel":"email"}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let templates = load_template_dir(dir.path()).unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "welcome");
        assert_eq!(templates[0].industry, "general");
    }
}
