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

use crate::domain::PublishError;
use async_trait::async_trait;
use std::path::PathBuf;

/// Secondary port - Change notification sink
///
/// This interface abstracts how change callbacks reach the asset service.
#[async_trait]
pub trait ChangePublisher: Send + Sync {
    /// Deliver one callback URL
    ///
    /// # Arguments
    /// * `callback` - URL of the changed entity, e.g. `{base}/blades/{serial}`
    ///
    /// # Returns
    /// * `Ok(())` - Endpoint accepted the callback
    /// * `Err(PublishError)` - Endpoint unreachable or rejected the callback
    async fn publish(&self, callback: &str) -> Result<(), PublishError>;
}

/// Secondary port - Storage of payloads that failed to parse
#[async_trait]
pub trait PayloadDumper: Send + Sync {
    /// Write a payload verbatim for later diagnosis
    ///
    /// # Arguments
    /// * `host` - BMC the payload came from
    /// * `payload` - Raw response body
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Location of the dump
    /// * `Err(PublishError)` - Dump could not be written
    async fn dump(&self, host: &str, payload: &[u8]) -> Result<PathBuf, PublishError>;
}
