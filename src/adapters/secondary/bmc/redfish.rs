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

//! RedFish reader over `/redfish/v1/Systems`
//!
//! Used to enrich chassis blades whose BMC exposes RedFish. Only the
//! `ComputerSystem` resource is read, so inventory lists are not supported.

use super::client::{from_json, BmcClient};
use crate::domain::parsers::redfish::{Collection, ComputerSystem, Processor};
use crate::domain::parsers::validate_serial;
use crate::domain::{BmcError, Credentials, CpuSummary, Disk, LicenseInfo, Nic, Psu, Vendor};
use crate::ports::ServerReader;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

pub const ROOT: &str = "/redfish/v1/";
pub const SYSTEMS: &str = "/redfish/v1/Systems";

pub struct RedfishReader {
    client: BmcClient,
    credentials: Credentials,
    vendor: Vendor,
    system_path: OnceCell<String>,
    system: OnceCell<ComputerSystem>,
}

impl RedfishReader {
    /// # Arguments
    /// * `vendor` - Vendor reported for the device; RedFish itself is vendor neutral
    pub fn new(client: BmcClient, credentials: Credentials, vendor: Vendor) -> Self {
        Self {
            client,
            credentials,
            vendor,
            system_path: OnceCell::new(),
            system: OnceCell::new(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BmcError> {
        let request = self
            .client
            .get(path)
            .basic_auth(&self.credentials.user, Some(&self.credentials.pass));
        let body = self.client.send(request).await?;
        self.client.parse(path, &body, from_json).await
    }

    /// First member of a collection
    async fn first_member(&self, path: &str) -> Result<String, BmcError> {
        let collection: Collection = self.get(path).await?;
        collection
            .members
            .into_iter()
            .map(|m| m.id)
            .next()
            .ok_or_else(|| BmcError::UnableToReadData(format!("{path} has no members")))
    }

    async fn system_path(&self) -> Result<&String, BmcError> {
        self.system_path
            .get_or_try_init(|| self.first_member(SYSTEMS))
            .await
    }

    async fn system(&self) -> Result<&ComputerSystem, BmcError> {
        let path = self.system_path().await?;
        self.system.get_or_try_init(|| self.get(path)).await
    }
}

#[async_trait]
impl ServerReader for RedfishReader {
    /// Basic auth has no session; listing the systems validates the credentials
    async fn login(&mut self) -> Result<(), BmcError> {
        self.system_path().await?;
        log::debug!("op=login ip={} driver=redfish", self.client.host());
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), BmcError> {
        Ok(())
    }

    async fn serial(&self) -> Result<String, BmcError> {
        validate_serial(&self.system().await?.serial())
    }

    async fn model(&self) -> Result<String, BmcError> {
        Ok(self.system().await?.model.trim().to_string())
    }

    async fn name(&self) -> Result<String, BmcError> {
        Ok(self.system().await?.display_name())
    }

    async fn status(&self) -> Result<String, BmcError> {
        Ok(self.system().await?.status.health.trim().to_string())
    }

    async fn bmc_type(&self) -> Result<String, BmcError> {
        Err(BmcError::NotSupported("bmc_type"))
    }

    async fn bmc_version(&self) -> Result<String, BmcError> {
        Err(BmcError::NotSupported("bmc_version"))
    }

    async fn bios_version(&self) -> Result<String, BmcError> {
        Ok(self.system().await?.bios_version.trim().to_string())
    }

    async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
        Err(BmcError::NotSupported("nics"))
    }

    async fn disks(&self) -> Result<Vec<Disk>, BmcError> {
        Err(BmcError::NotSupported("disks"))
    }

    async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
        Err(BmcError::NotSupported("psus"))
    }

    async fn memory(&self) -> Result<i64, BmcError> {
        Ok(self.system().await?.memory_gb())
    }

    async fn cpu(&self) -> Result<CpuSummary, BmcError> {
        let system_path = self.system_path().await?;
        let processors = format!("{system_path}/Processors");
        let first = match self.first_member(&processors).await {
            Ok(path) => Some(self.get::<Processor>(&path).await?),
            Err(BmcError::PageNotFound(_)) | Err(BmcError::UnableToReadData(_)) => None,
            Err(e) => return Err(e),
        };
        Ok(self.system().await?.cpu(first.as_ref()))
    }

    async fn license(&self) -> Result<LicenseInfo, BmcError> {
        Err(BmcError::NotSupported("license"))
    }

    async fn power_kw(&self) -> Result<f64, BmcError> {
        Err(BmcError::NotSupported("power_kw"))
    }

    async fn temp_c(&self) -> Result<i64, BmcError> {
        Err(BmcError::NotSupported("temp_c"))
    }

    async fn power_state(&self) -> Result<String, BmcError> {
        Ok(self.system().await?.power_state())
    }

    async fn is_blade(&self) -> Result<bool, BmcError> {
        Err(BmcError::NotSupported("is_blade"))
    }

    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use httpmock::prelude::*;
    use serde_json::json;

    /// Basic credentials of `root:calvin`
    pub const ROOT_CALVIN: &str = "Basic cm9vdDpjYWx2aW4=";

    /// Mock a RedFish service with one system that accepts `root:calvin`
    pub async fn mock_redfish(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(GET).path(super::ROOT);
                then.status(200).json_body(json!({"RedfishVersion": "1.4.0"}));
            })
            .await;
        let members = [
            (
                "/redfish/v1/Systems",
                json!({"Members": [{"@odata.id": "/redfish/v1/Systems/System.Embedded.1"}]}),
            ),
            (
                "/redfish/v1/Systems/System.Embedded.1",
                json!({"SerialNumber": "8XKQ4M2", "Model": "PowerEdge M630", "Name": "System", "BiosVersion": "2.8.0",
                       "PowerState": "On", "Status": {"Health": "OK"},
                       "ProcessorSummary": {"Count": 2, "Model": "Intel(R) Xeon(R) CPU E5-2660 v3 @ 2.60GHz"},
                       "MemorySummary": {"TotalSystemMemoryGiB": 128}}),
            ),
            (
                "/redfish/v1/Systems/System.Embedded.1/Processors",
                json!({"Members": [{"@odata.id": "/redfish/v1/Systems/System.Embedded.1/Processors/CPU.Socket.1"}]}),
            ),
            (
                "/redfish/v1/Systems/System.Embedded.1/Processors/CPU.Socket.1",
                json!({"Model": "Intel(R) Xeon(R) CPU E5-2660 v3 @ 2.60GHz", "TotalCores": 10, "TotalThreads": 20}),
            ),
        ];
        for (path, body) in members {
            server
                .mock_async(|when, then| {
                    when.method(GET)
                        .path(path)
                        .header("Authorization", ROOT_CALVIN);
                    then.status(200).json_body(body);
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::mock_redfish;
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use httpmock::prelude::*;

    fn reader(server: &MockServer, pass: &str) -> RedfishReader {
        let client = BmcClient::new(&host_of(server), &http_config(), None).unwrap();
        RedfishReader::new(client, Credentials::new("root", pass), Vendor::Dell)
    }

    #[tokio::test]
    async fn test_computer_system() {
        let server = MockServer::start_async().await;
        mock_redfish(&server).await;
        let mut redfish = reader(&server, "calvin");
        redfish.login().await.unwrap();

        assert_eq!(redfish.serial().await.unwrap(), "8xkq4m2");
        assert_eq!(redfish.memory().await.unwrap(), 128);
        let cpu = redfish.cpu().await.unwrap();
        assert_eq!(cpu.sockets, 2);
        assert_eq!(cpu.cores, 10);
        assert_eq!(redfish.power_state().await.unwrap(), "on");
        assert_eq!(redfish.vendor(), Vendor::Dell);
        assert_eq!(redfish.license().await, Err(BmcError::NotSupported("license")));
    }

    #[tokio::test]
    async fn test_unauthorized_is_login_failed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(SYSTEMS);
                then.status(401);
            })
            .await;
        let mut redfish = reader(&server, "wrong");
        assert_eq!(redfish.login().await, Err(BmcError::LoginFailed));
    }

    #[tokio::test]
    async fn test_internal_error_is_surfaced() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(SYSTEMS);
                then.status(500);
            })
            .await;
        let mut redfish = reader(&server, "calvin");
        assert!(matches!(
            redfish.login().await,
            Err(BmcError::RedFishEndPoint500(_))
        ));
    }
}
