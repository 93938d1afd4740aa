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

use crate::domain::{ScanError, ScanRequest, ScanSummary};
use async_trait::async_trait;

/// Primary port - Network discovery offered by the inventory domain
///
/// This is what the CLI uses to find BMC-indicative ports across the fleet.
#[async_trait]
pub trait ScanningService: Send + Sync {
    /// Probe every host of the selected subnets and record the results
    ///
    /// # Arguments
    /// * `request` - CIDRs and sites to scan
    ///
    /// # Returns
    /// * `Ok(ScanSummary)` - Counts of the completed pass
    /// * `Err(ScanError)` - Configuration or subnet source unusable; no probe was sent
    async fn scan(&self, request: ScanRequest) -> Result<ScanSummary, ScanError>;
}
