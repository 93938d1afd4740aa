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

//! Subnets from a Kea DHCPv4 configuration file

use crate::domain::parsers::parse_kea_subnets;
use crate::domain::{ScanError, SiteSubnet};
use crate::ports::SubnetSource;
use async_trait::async_trait;
use std::path::PathBuf;

pub struct KeaSubnetSource {
    path: PathBuf,
    domain_suffix: String,
}

impl KeaSubnetSource {
    /// # Arguments
    /// * `path` - Kea configuration file
    /// * `domain_suffix` - Domain-name suffix marking BMC subnets
    pub fn new(path: impl Into<PathBuf>, domain_suffix: &str) -> Self {
        Self {
            path: path.into(),
            domain_suffix: domain_suffix.to_string(),
        }
    }
}

#[async_trait]
impl SubnetSource for KeaSubnetSource {
    async fn load_subnets(&self) -> Result<Vec<SiteSubnet>, ScanError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ScanError::SubnetsUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let subnets = parse_kea_subnets(&content, &self.domain_suffix).map_err(|e| {
            ScanError::SubnetsUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        log::debug!(
            "op=load_subnets path={} subnets={}",
            self.path.display(),
            subnets.len()
        );
        Ok(subnets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn test_loads_subnets_from_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("kea-dhcp4.conf");
        file.write_str(
            r#"{"Dhcp4": {"subnet4": [
                {"subnet": "10.10.0.0/24", "option-data": [{"name": "domain-name", "data": "ams4.bmc.example.com"}]}
            ]}}"#,
        )
        .unwrap();

        let source = KeaSubnetSource::new(file.path(), "bmc.example.com");
        let subnets = source.load_subnets().await.unwrap();
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0].site, "ams4");
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let source = KeaSubnetSource::new("/nonexistent/kea-dhcp4.conf", "bmc.example.com");
        let err = source.load_subnets().await.unwrap_err();
        assert!(matches!(err, ScanError::SubnetsUnavailable(_)));
    }
}
