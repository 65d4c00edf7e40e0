//! Remote registry client.
//!
//! Wraps the two registry operations used by the batch processor
//! (create an entity, activate a batch) plus a liveness probe.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bulkload::registry::{RegistryApi, RegistryClient};
//!
//! let client = RegistryClient::new("https://registry.example.com");
//! let id = client.create(&record, "batch-1").await?;
//! let activated = client.activate("batch-1").await;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{RegistryError, RegistryResult};
use crate::models::EntityRecord;

/// Default timeout for entity creation.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for batch activation.
pub const DEFAULT_ACTIVATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the liveness probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the batch processor needs from the registry.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Create one entity tagged with `batch_id`. Returns the remote id.
    async fn create(&self, record: &EntityRecord, batch_id: &str) -> RegistryResult<i64>;

    /// Activate every entity created under `batch_id`.
    /// Any failure is reported as `false`.
    async fn activate(&self, batch_id: &str) -> bool;

    /// Whether the registry answers its listing endpoint.
    async fn ping(&self) -> bool;
}

/// Creation request body.
#[derive(Debug, Serialize)]
struct CreateEntityRequest<'a> {
    name: &'a str,
    address: &'a str,
    phone: Option<&'a str>,
    creation_batch_id: &'a str,
}

/// Creation response. Other fields are ignored.
#[derive(Debug, Deserialize)]
struct CreateEntityResponse {
    id: i64,
}

/// HTTP client for the registry.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    create_timeout: Duration,
    activate_timeout: Duration,
    health_timeout: Duration,
}

impl RegistryClient {
    /// Create a client with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            create_timeout: DEFAULT_CREATE_TIMEOUT,
            activate_timeout: DEFAULT_ACTIVATE_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.registry_url.clone()).with_timeouts(
            config.create_timeout,
            config.activate_timeout,
            config.health_timeout,
        )
    }

    /// Override the per-call timeouts
    pub fn with_timeouts(mut self, create: Duration, activate: Duration, health: Duration) -> Self {
        self.create_timeout = create;
        self.activate_timeout = activate;
        self.health_timeout = health;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RegistryApi for RegistryClient {
    async fn create(&self, record: &EntityRecord, batch_id: &str) -> RegistryResult<i64> {
        let payload = CreateEntityRequest {
            name: &record.name,
            address: &record.address,
            phone: record.phone.as_deref(),
            creation_batch_id: batch_id,
        };

        let response = self
            .http
            .post(format!("{}/entities/", self.base_url))
            .json(&payload)
            .timeout(self.create_timeout)
            .send()
            .await
            .map_err(|e| RegistryError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let created: CreateEntityResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        Ok(created.id)
    }

    async fn activate(&self, batch_id: &str) -> bool {
        let result = self
            .http
            .patch(format!("{}/entities/batch/{}/activate", self.base_url, batch_id))
            .timeout(self.activate_timeout)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(batch_id, status = %response.status(), "batch activation rejected");
                false
            }
            Err(e) => {
                tracing::warn!(batch_id, error = %e, "batch activation request failed");
                false
            }
        }
    }

    async fn ping(&self) -> bool {
        match self
            .http
            .get(format!("{}/entities/", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::debug!(error = %e, "registry liveness probe failed");
                false
            }
        }
    }
}
