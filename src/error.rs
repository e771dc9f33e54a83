//! Error types for the lead-nurture core.

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Configuration-related errors. Fatal at startup, never per-operation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Store-related errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Delivery channel errors. Transient send failures are recorded as failed
/// interaction events, never retried by the core.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("No channel registered for kind {kind}")]
    Unsupported { kind: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid recipient for channel {name}: {reason}")]
    InvalidRecipient { name: String, reason: String },

    #[error("Authentication failed for channel {name}")]
    AuthFailed { name: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Plan validation errors. Recoverable: each of these triggers the
/// deterministic fallback plan rather than escalating.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Plan missing required field: {0}")]
    MissingField(&'static str),

    #[error("Plan has {count} steps, allowed range is 1..=5")]
    StepCountOutOfRange { count: usize },

    #[error("Step {index} missing required field: {field}")]
    InvalidStep { index: usize, field: &'static str },

    #[error("Plan is not valid JSON: {0}")]
    Malformed(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),
}

/// Hard cap on plan length.
pub const MAX_PLAN_STEPS: usize = 5;

/// Scheduling errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Job {id} rejected by scheduler: {reason}")]
    Rejected { id: String, reason: String },

    #[error("Job {0} not found")]
    NotFound(String),
}

/// Lead ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read source {path}: {reason}")]
    Source { path: String, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Discovery network errors.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Discovery request failed: {0}")]
    Request(String),

    #[error("Discovery service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
