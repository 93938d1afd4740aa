/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! HTTP change publisher notifying the asset service

use crate::domain::{NotificationConfig, PublishError};
use crate::ports::ChangePublisher;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Route of the asset-service update hook
pub const UPDATE_ROUTE: &str = "/api/v1/server/dora/dora_update_or_create/";

/// HTTP publisher that posts change callbacks to the asset service
pub struct HttpChangePublisher {
    client: Client,
    endpoint: String,
    authorization: String,
}

impl HttpChangePublisher {
    /// Create a new HTTP change publisher
    ///
    /// # Arguments
    /// * `config` - Asset-service endpoint and API key
    /// * `timeout` - HTTP request timeout
    pub fn new(config: &NotificationConfig, timeout: Duration) -> Result<Self, PublishError> {
        if config.endpoint.is_empty() {
            return Err(PublishError::NetworkFailed(
                "No endpoint URL provided".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                PublishError::NetworkFailed(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.endpoint.trim_end_matches('/'), UPDATE_ROUTE),
            authorization: format!("ApiKey {}:{}", config.user, config.api_key),
        })
    }

    fn create_payload(callback: &str) -> serde_json::Value {
        json!({ "callback": callback })
    }
}

#[async_trait]
impl ChangePublisher for HttpChangePublisher {
    async fn publish(&self, callback: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.authorization)
            .header("Content-Type", "application/json")
            .json(&Self::create_payload(callback))
            .send()
            .await
            .map_err(|e| PublishError::NetworkFailed(format!("Failed to send request: {e}")))?;

        // Only 200 counts, 201/204 mean the hook did not run
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        match status {
            200 => Ok(()),
            401 | 403 => Err(PublishError::AuthenticationFailed(format!(
                "HTTP {status}: {body}"
            ))),
            other => {
                log::debug!("op=notify callback={} status={} body={}", callback, other, body);
                Err(PublishError::Rejected(other))
            }
        }
    }
}
