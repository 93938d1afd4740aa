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

use crate::domain::{CollectError, CollectOutcome, CollectSummary};
use async_trait::async_trait;

/// Primary port - Inventory collection offered by the inventory domain
#[async_trait]
pub trait CollectingService: Send + Sync {
    /// Collect every given host, or every host with tcp/443 open when none are given
    ///
    /// # Arguments
    /// * `hosts` - BMC addresses; empty selects hosts from the latest scans
    ///
    /// # Returns
    /// * `Ok(CollectSummary)` - Counts of the completed pass; host failures are counted, not raised
    /// * `Err(CollectError)` - Candidate hosts could not be read from the repository
    async fn collect(&self, hosts: Vec<String>) -> Result<CollectSummary, CollectError>;

    /// Run the full workflow for a single BMC
    ///
    /// # Arguments
    /// * `host` - BMC address
    ///
    /// # Returns
    /// * `Ok(CollectOutcome)` - Device identity and the notifications it produced
    /// * `Err(CollectError)` - Detection, login, validation or persistence failed
    async fn collect_host(&self, host: &str) -> Result<CollectOutcome, CollectError>;
}
