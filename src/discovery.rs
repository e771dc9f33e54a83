//! Discovery network integration.
//!
//! Optionally announces this agent on an agent-discovery service and lists
//! peers by capability. Plain JSON over HTTP; failures are reported to the
//! caller and never retried here.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DiscoveryError};

/// A registered agent on the discovery network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Network address assigned at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    address: String,
}

/// Discovery service client.
pub struct DiscoveryClient {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(api_key: SecretString, base_url: &str) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from environment. `DISCOVERY_API_KEY` is required;
    /// `DISCOVERY_BASE_URL` is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("DISCOVERY_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("DISCOVERY_API_KEY".to_string()))?;
        let base_url = std::env::var("DISCOVERY_BASE_URL")
            .unwrap_or_else(|_| "https://agentverse.ai/api/v1".to_string());
        Ok(Self::new(SecretString::from(api_key), &base_url))
    }

    /// Register this agent. Returns the assigned network address.
    pub async fn register(&self, profile: &AgentProfile) -> Result<String, DiscoveryError> {
        let response = self
            .client
            .post(format!("{}/agents", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(profile)
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: RegisterResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Request(format!("invalid response: {e}")))?;

        tracing::info!(address = %parsed.address, "Registered on discovery network");
        Ok(parsed.address)
    }

    /// List agents, optionally filtered by capability.
    pub async fn discover(
        &self,
        capability: Option<&str>,
    ) -> Result<Vec<AgentProfile>, DiscoveryError> {
        let mut request = self.client.get(format!("{}/agents", self.base_url));
        if let Some(capability) = capability {
            request = request.query(&[("capability", capability)]);
        }

        let response = request
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| DiscoveryError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| DiscoveryError::Request(format!("invalid response: {e}")))
    }
}
