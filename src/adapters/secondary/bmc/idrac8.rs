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

//! Dell iDRAC 8 driver
//!
//! Login hands out `ST1`/`ST2` tokens; `ST2` rides along as a header on every
//! later request together with the session cookie.

use super::client::{from_json, BmcClient};
use crate::domain::parsers::idrac::{
    parse_inventory, parse_login, parse_power_monitor, parse_power_state, Inventory,
    LicenseResponse, MemoryResponse, ProcessorResponse, SessionTokens, TemperatureResponse,
};
use crate::domain::parsers::validate_serial;
use crate::domain::{BmcError, Credentials, CpuSummary, Disk, LicenseInfo, Nic, Psu, Vendor};
use crate::ports::ServerReader;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use tokio::sync::OnceCell;

pub const LOGIN: &str = "/data/login";
pub const LOGOUT: &str = "/data/logout";
pub const INVENTORY: &str = "/sysmgmt/2012/server/inventory/hardware";
pub const MEMORY: &str = "/sysmgmt/2012/server/memory";
pub const PROCESSOR: &str = "/sysmgmt/2012/server/processor";
pub const TEMPERATURE: &str = "/sysmgmt/2012/server/temperature";
pub const LICENSE: &str = "/sysmgmt/2012/server/license";
pub const POWER_MONITOR: &str = "/data?get=powermonitordata";
pub const POWER_STATE: &str = "/data?get=pwState";

pub struct IdracReader {
    client: BmcClient,
    credentials: Credentials,
    tokens: Option<SessionTokens>,
    inventory: OnceCell<Inventory>,
}

impl IdracReader {
    pub fn new(client: BmcClient, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            tokens: None,
            inventory: OnceCell::new(),
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(path);
        match self.tokens.as_ref() {
            Some(tokens) => request.header("ST2", &tokens.st2),
            None => request,
        }
    }

    async fn fetch<T, F>(&self, path: &str, parser: F) -> Result<T, BmcError>
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        let body = self.client.send(self.get(path)).await?;
        self.client.parse(path, &body, parser).await
    }

    async fn inventory(&self) -> Result<&Inventory, BmcError> {
        self.inventory
            .get_or_try_init(|| self.fetch(INVENTORY, parse_inventory))
            .await
    }
}

#[async_trait]
impl ServerReader for IdracReader {
    async fn login(&mut self) -> Result<(), BmcError> {
        let form = [
            ("user", self.credentials.user.as_str()),
            ("password", self.credentials.pass.as_str()),
        ];
        let body = self.client.send(self.client.post(LOGIN).form(&form)).await?;
        let response = self.client.parse(LOGIN, &body, parse_login).await?;
        if !response.succeeded() {
            return Err(BmcError::LoginFailed);
        }
        let tokens = response.tokens().ok_or_else(|| {
            BmcError::UnableToReadData(format!("no session tokens in {:?}", response.forward_url))
        })?;
        log::debug!("op=login ip={} vendor=Dell driver=idrac8", self.client.host());
        self.tokens = Some(tokens);
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), BmcError> {
        if self.tokens.is_none() {
            return Ok(());
        }
        let request = self.get(LOGOUT);
        self.tokens = None;
        self.client.send(request).await?;
        Ok(())
    }

    async fn serial(&self) -> Result<String, BmcError> {
        validate_serial(&self.inventory().await?.serial())
    }

    async fn model(&self) -> Result<String, BmcError> {
        Ok(self.inventory().await?.model())
    }

    async fn name(&self) -> Result<String, BmcError> {
        Ok(self.inventory().await?.name())
    }

    async fn status(&self) -> Result<String, BmcError> {
        Ok(self.inventory().await?.status())
    }

    async fn bmc_type(&self) -> Result<String, BmcError> {
        Ok("iDRAC8".to_string())
    }

    async fn bmc_version(&self) -> Result<String, BmcError> {
        Ok(self.inventory().await?.bmc_version())
    }

    async fn bios_version(&self) -> Result<String, BmcError> {
        Ok(self.inventory().await?.bios_version())
    }

    async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
        Ok(self.inventory().await?.nics())
    }

    async fn disks(&self) -> Result<Vec<Disk>, BmcError> {
        Ok(self.inventory().await?.disks())
    }

    async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
        let serial = self.serial().await?;
        Ok(self.inventory().await?.psus(&serial))
    }

    async fn memory(&self) -> Result<i64, BmcError> {
        let memory: MemoryResponse = self.fetch(MEMORY, from_json).await?;
        Ok(memory.gigabytes())
    }

    async fn cpu(&self) -> Result<CpuSummary, BmcError> {
        match self.fetch::<ProcessorResponse, _>(PROCESSOR, from_json).await {
            Ok(processors) => Ok(processors.summary()),
            Err(BmcError::PageNotFound(_)) => Ok(self.inventory().await?.cpu()),
            Err(e) => Err(e),
        }
    }

    async fn license(&self) -> Result<LicenseInfo, BmcError> {
        let license: LicenseResponse = self.fetch(LICENSE, from_json).await?;
        Ok(license.info())
    }

    async fn power_kw(&self) -> Result<f64, BmcError> {
        self.fetch(POWER_MONITOR, parse_power_monitor).await
    }

    async fn temp_c(&self) -> Result<i64, BmcError> {
        let temperature: TemperatureResponse = self.fetch(TEMPERATURE, from_json).await?;
        Ok(temperature.inlet())
    }

    async fn power_state(&self) -> Result<String, BmcError> {
        self.fetch(POWER_STATE, parse_power_state).await
    }

    async fn is_blade(&self) -> Result<bool, BmcError> {
        Ok(self.inventory().await?.is_blade())
    }

    fn vendor(&self) -> Vendor {
        Vendor::Dell
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::parsers::idrac::fixtures::{INVENTORY, LOGIN_OK};
    use httpmock::prelude::*;
    use serde_json::json;

    /// Mock an iDRAC that accepts `password`
    pub async fn mock_idrac(server: &MockServer, password: &str) {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(super::LOGIN)
                    .body_contains(format!("password={password}"));
                then.status(200).body(LOGIN_OK);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(super::INVENTORY).header("ST2", "5a7e6f1d22");
                then.status(200).body(INVENTORY);
            })
            .await;
        let endpoints = [
            (super::MEMORY, json!({"Memory": {"capacity": 131072}})),
            (
                super::PROCESSOR,
                json!({"Processor": {"CPU.Socket.1": {"brand": "Intel(R) Xeon(R) CPU E5-2660 v3 @ 2.60GHz", "core_count": 10, "hyperthreading": [{"capable": 1}]},
                                     "CPU.Socket.2": {"brand": "Intel(R) Xeon(R) CPU E5-2660 v3 @ 2.60GHz", "core_count": 10, "hyperthreading": [{"capable": 1}]}}}),
            ),
            (super::LICENSE, json!({"License": {"VCONSOLE": 1}})),
            (
                super::TEMPERATURE,
                json!({"Temperatures": {"iDRAC.Embedded.1#SystemBoardInletTemp": {"reading": 23.0}}}),
            ),
        ];
        for (path, body) in endpoints {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path).header("ST2", "5a7e6f1d22");
                    then.status(200).json_body(body);
                })
                .await;
        }
        server
            .mock_async(|when, then| {
                when.method(GET).path("/data").query_param("get", "powermonitordata");
                then.status(200).body(
                    "<root><powermonitordata><presentReading><reading><reading>182</reading></reading></presentReading></powermonitordata></root>",
                );
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/data").query_param("get", "pwState");
                then.status(200).body("<root><pwState>1</pwState></root>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(super::LOGOUT);
                then.status(200);
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::testing::mock_idrac;
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use crate::domain::parsers::idrac::fixtures::LOGIN_FAILED;
    use httpmock::prelude::*;

    fn reader(server: &MockServer, password: &str) -> IdracReader {
        let client = BmcClient::new(&host_of(server), &http_config(), None).unwrap();
        IdracReader::new(client, Credentials::new("root", password))
    }

    #[tokio::test]
    async fn test_rejected_login_sends_nothing_else() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST).path(LOGIN);
                then.status(200).body(LOGIN_FAILED);
            })
            .await;
        let inventory = server
            .mock_async(|when, then| {
                when.method(GET).path(INVENTORY);
                then.status(200);
            })
            .await;

        let mut idrac = reader(&server, "wrong");
        assert_eq!(idrac.login().await, Err(BmcError::LoginFailed));
        idrac.logout().await.unwrap();

        login.assert_hits_async(1).await;
        inventory.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_inventory_through_st2_header() {
        let server = MockServer::start_async().await;
        mock_idrac(&server, "calvin").await;
        let mut idrac = reader(&server, "calvin");
        idrac.login().await.unwrap();

        assert_eq!(idrac.serial().await.unwrap(), "8xkq4m2");
        assert!(idrac.is_blade().await.unwrap());
        assert_eq!(idrac.memory().await.unwrap(), 128);
        let cpu = idrac.cpu().await.unwrap();
        assert_eq!(cpu.sockets, 2);
        assert_eq!(cpu.threads, 20);
        assert_eq!(idrac.license().await.unwrap().name, "Enterprise");
        assert_eq!(idrac.temp_c().await.unwrap(), 23);
        assert!((idrac.power_kw().await.unwrap() - 0.182).abs() < 1e-9);
        assert_eq!(idrac.power_state().await.unwrap(), "on");

        let psus = idrac.psus().await.unwrap();
        assert_eq!(psus[0].serial, "8xkq4m2_2");
        idrac.logout().await.unwrap();
    }
}
