//! Configuration types.
//!
//! Everything is env-var driven with typed defaults; `from_env()` never
//! fails for tunables. Missing credentials surface as `ConfigError` from the
//! component that needs them, at startup.

use std::time::Duration;

/// Engagement thresholds and skip-gate tuning.
#[derive(Debug, Clone)]
pub struct EngagementConfig {
    /// Minimum open rate before outreach is paused for a lead.
    pub min_open_rate: f64,
    /// Minimum reply rate before outreach is paused for a lead.
    pub min_reply_rate: f64,
    /// Case-insensitive substrings that flag a negative response.
    pub negative_keywords: Vec<String>,
    /// How many of the most recent events are scanned for negative keywords.
    pub negative_scan_depth: usize,
    /// Days after a conversion during which no follow-ups are sent.
    pub conversion_cooldown_days: i64,
    /// Window over which open/reply rates are computed for skip checks.
    pub rate_window: Duration,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            min_open_rate: 0.3,
            min_reply_rate: 0.1,
            negative_keywords: vec![
                "unsubscribe".to_string(),
                "not interested".to_string(),
                "stop".to_string(),
            ],
            negative_scan_depth: 5,
            conversion_cooldown_days: 30,
            rate_window: Duration::from_secs(90 * 24 * 3600),
        }
    }
}

/// Top-level nurture configuration.
#[derive(Debug, Clone)]
pub struct NurtureConfig {
    /// Business name substituted into templates as `{our_name}`.
    pub business_name: String,
    /// Business type fed to the plan prompt (e.g. "B2B").
    pub business_type: String,
    /// Engagement gates.
    pub engagement: EngagementConfig,
    /// Deadline for a single plan-generation LLM call.
    pub llm_timeout: Duration,
    /// Grace window within which a late-firing job still executes.
    pub misfire_grace: Duration,
    /// Factor applied to step spacing when reply rate is below minimum.
    pub spacing_multiplier: u32,
    /// How often the in-process scheduler polls for due jobs.
    pub tick_interval: Duration,
    /// Public base URL for open-tracking pixels, if tracking is enabled.
    pub tracking_base_url: Option<String>,
}

impl Default for NurtureConfig {
    fn default() -> Self {
        Self {
            business_name: "Our Team".to_string(),
            business_type: "B2B".to_string(),
            engagement: EngagementConfig::default(),
            llm_timeout: Duration::from_secs(20),
            misfire_grace: Duration::from_secs(3600),
            spacing_multiplier: 2,
            tick_interval: Duration::from_secs(30),
            tracking_base_url: None,
        }
    }
}

impl NurtureConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            business_name: std::env::var("BUSINESS_NAME")
                .unwrap_or(defaults.business_name),
            business_type: std::env::var("BUSINESS_TYPE")
                .unwrap_or(defaults.business_type),
            engagement: EngagementConfig {
                min_open_rate: env_parse("NURTURE_MIN_OPEN_RATE", 0.3),
                min_reply_rate: env_parse("NURTURE_MIN_REPLY_RATE", 0.1),
                conversion_cooldown_days: env_parse("NURTURE_CONVERSION_COOLDOWN_DAYS", 30),
                ..defaults.engagement
            },
            llm_timeout: Duration::from_secs(env_parse("NURTURE_LLM_TIMEOUT_SECS", 20)),
            misfire_grace: Duration::from_secs(env_parse("NURTURE_MISFIRE_GRACE_SECS", 3600)),
            spacing_multiplier: env_parse("NURTURE_SPACING_MULTIPLIER", 2),
            tick_interval: Duration::from_secs(env_parse("NURTURE_TICK_INTERVAL_SECS", 30)),
            tracking_base_url: std::env::var("NURTURE_TRACKING_BASE_URL").ok(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engagement_rules() {
        let config = EngagementConfig::default();
        assert_eq!(config.min_open_rate, 0.3);
        assert_eq!(config.min_reply_rate, 0.1);
        assert_eq!(config.negative_scan_depth, 5);
        assert_eq!(config.conversion_cooldown_days, 30);
        assert!(config.negative_keywords.contains(&"stop".to_string()));
    }

    #[test]
    fn misfire_grace_default_is_one_hour() {
        let config = NurtureConfig::default();
        assert_eq!(config.misfire_grace, Duration::from_secs(3600));
    }
}
