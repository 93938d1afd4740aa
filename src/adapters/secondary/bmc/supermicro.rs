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

//! Supermicro X10 driver
//!
//! Every read POSTs a request token to `/cgi/ipmi.cgi` and gets an `<IPMI>`
//! document back. The web UI exposes no disks, license or health rollup.

use super::client::BmcClient;
use crate::domain::parsers::supermicro::{
    self, node_serial, parse_ipmi, FruInfo, Ipmi, PlatformInfo, SmbiosInfo,
    LOGIN_SUCCESS_MARKER,
};
use crate::domain::{BmcError, Credentials, CpuSummary, Disk, LicenseInfo, Nic, Psu, Vendor};
use crate::ports::ServerReader;
use async_trait::async_trait;
use tokio::sync::OnceCell;

pub const LOGIN: &str = "/cgi/login.cgi";
pub const LOGOUT: &str = "/cgi/logout.cgi";
pub const IPMI: &str = "/cgi/ipmi.cgi";

pub struct SupermicroReader {
    client: BmcClient,
    credentials: Credentials,
    logged_in: bool,
    fru: OnceCell<FruInfo>,
    platform: OnceCell<PlatformInfo>,
    smbios: OnceCell<SmbiosInfo>,
}

/// Take one section out of a response, failing when the BMC left it out
fn section<T>(token: &str, value: Option<T>) -> Result<T, BmcError> {
    value.ok_or_else(|| BmcError::UnableToReadData(format!("{IPMI} {token} returned no data")))
}

impl SupermicroReader {
    pub fn new(client: BmcClient, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            logged_in: false,
            fru: OnceCell::new(),
            platform: OnceCell::new(),
            smbios: OnceCell::new(),
        }
    }

    async fn query(&self, token: &str) -> Result<Ipmi, BmcError> {
        let request = self
            .client
            .post(IPMI)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(token.to_string());
        let body = self.client.send(request).await?;
        self.client.parse(IPMI, &body, parse_ipmi).await
    }

    async fn fru(&self) -> Result<&FruInfo, BmcError> {
        self.fru
            .get_or_try_init(|| async {
                let token = supermicro::FRU_INFO;
                section(token, self.query(token).await?.fru)
            })
            .await
    }

    async fn platform(&self) -> Result<&PlatformInfo, BmcError> {
        self.platform
            .get_or_try_init(|| async {
                let token = supermicro::PLATFORM_INFO;
                section(token, self.query(token).await?.platform)
            })
            .await
    }

    async fn smbios(&self) -> Result<&SmbiosInfo, BmcError> {
        self.smbios
            .get_or_try_init(|| async {
                let token = supermicro::SMBIOS_INFO;
                section(token, self.query(token).await?.smbios)
            })
            .await
    }
}

#[async_trait]
impl ServerReader for SupermicroReader {
    async fn login(&mut self) -> Result<(), BmcError> {
        let form = [
            ("name", self.credentials.user.as_str()),
            ("pwd", self.credentials.pass.as_str()),
        ];
        let body = self.client.send(self.client.post(LOGIN).form(&form)).await?;
        if !body.contains(LOGIN_SUCCESS_MARKER) {
            return Err(BmcError::LoginFailed);
        }
        log::debug!("op=login ip={} vendor=Supermicro", self.client.host());
        self.logged_in = true;
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), BmcError> {
        if !self.logged_in {
            return Ok(());
        }
        self.logged_in = false;
        self.client.send(self.client.get(LOGOUT)).await?;
        Ok(())
    }

    async fn serial(&self) -> Result<String, BmcError> {
        node_serial(self.fru().await?)
    }

    async fn model(&self) -> Result<String, BmcError> {
        Ok(self.fru().await?.board.product_name.trim().to_string())
    }

    async fn name(&self) -> Result<String, BmcError> {
        let token = supermicro::CONFIG_INFO;
        let config = section(token, self.query(token).await?.config)?;
        Ok(config.hostname.name.trim().to_string())
    }

    async fn status(&self) -> Result<String, BmcError> {
        Err(BmcError::NotSupported("status"))
    }

    async fn bmc_type(&self) -> Result<String, BmcError> {
        Ok("Supermicro".to_string())
    }

    async fn bmc_version(&self) -> Result<String, BmcError> {
        let token = supermicro::GENERIC_INFO;
        let generic = section(token, self.query(token).await?.generic)?;
        Ok(generic.generic.version())
    }

    async fn bios_version(&self) -> Result<String, BmcError> {
        Ok(self.platform().await?.bios_version.trim().to_string())
    }

    async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
        Ok(self.platform().await?.nics())
    }

    async fn disks(&self) -> Result<Vec<Disk>, BmcError> {
        Err(BmcError::NotSupported("disks"))
    }

    async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
        let serial = self.serial().await?;
        let token = supermicro::PS_INFO;
        let supplies = section(token, self.query(token).await?.supplies)?;
        Ok(supplies.psus(&serial))
    }

    async fn memory(&self) -> Result<i64, BmcError> {
        Ok(self.smbios().await?.memory_gb())
    }

    async fn cpu(&self) -> Result<CpuSummary, BmcError> {
        Ok(self.smbios().await?.cpu())
    }

    async fn license(&self) -> Result<LicenseInfo, BmcError> {
        Err(BmcError::NotSupported("license"))
    }

    async fn power_kw(&self) -> Result<f64, BmcError> {
        let token = supermicro::NODE_INFO;
        Ok(section(token, self.query(token).await?.nodes)?.power_kw())
    }

    async fn temp_c(&self) -> Result<i64, BmcError> {
        let token = supermicro::NODE_INFO;
        Ok(section(token, self.query(token).await?.nodes)?.temp_c())
    }

    async fn power_state(&self) -> Result<String, BmcError> {
        let token = supermicro::POWER_INFO;
        let power = section(token, self.query(token).await?.power)?;
        Ok(power.power.status.trim().to_lowercase())
    }

    async fn is_blade(&self) -> Result<bool, BmcError> {
        Ok(false)
    }

    fn vendor(&self) -> Vendor {
        Vendor::Supermicro
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use crate::domain::parsers::supermicro::fixtures;
    use httpmock::prelude::*;

    fn reader(server: &MockServer, pass: &str) -> SupermicroReader {
        let client = BmcClient::new(&host_of(server), &http_config(), None).unwrap();
        SupermicroReader::new(client, Credentials::new("ADMIN", pass))
    }

    async fn mock_supermicro(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path(LOGIN).body_contains("pwd=ADMIN");
                then.status(200).body(format!(
                    "<html><script>self.location='{LOGIN_SUCCESS_MARKER}';</script></html>"
                ));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(LOGIN).body_contains("pwd=wrong");
                then.status(200).body("<html>Invalid Username or Password</html>");
            })
            .await;
        let sections = [
            (supermicro::FRU_INFO, fixtures::FRU),
            (supermicro::PLATFORM_INFO, fixtures::PLATFORM),
            (supermicro::GENERIC_INFO, fixtures::GENERIC),
            (supermicro::CONFIG_INFO, fixtures::CONFIG),
            (supermicro::SMBIOS_INFO, fixtures::SMBIOS),
            (supermicro::POWER_INFO, fixtures::POWER),
            (supermicro::NODE_INFO, fixtures::NODES),
            (supermicro::PS_INFO, fixtures::SUPPLIES),
        ];
        for (token, body) in sections {
            server
                .mock_async(|when, then| {
                    when.method(POST).path(IPMI).body(token);
                    then.status(200).body(body);
                })
                .await;
        }
    }

    #[tokio::test]
    async fn test_login_marker() {
        let server = MockServer::start_async().await;
        mock_supermicro(&server).await;

        let mut rejected = reader(&server, "wrong");
        assert_eq!(rejected.login().await, Err(BmcError::LoginFailed));

        let mut smc = reader(&server, "ADMIN");
        smc.login().await.unwrap();
    }

    #[tokio::test]
    async fn test_node_identity() {
        let server = MockServer::start_async().await;
        mock_supermicro(&server).await;
        let mut smc = reader(&server, "ADMIN");
        smc.login().await.unwrap();

        assert_eq!(smc.serial().await.unwrap(), "cf414af38n50003@vm158s009467");
        assert_eq!(smc.model().await.unwrap(), "X10DRT-PT");
        assert_eq!(smc.name().await.unwrap(), "node11");
        assert_eq!(smc.bmc_version().await.unwrap(), "3.25");
        assert_eq!(smc.bios_version().await.unwrap(), "2.0a");
        assert_eq!(smc.status().await, Err(BmcError::NotSupported("status")));
    }

    #[tokio::test]
    async fn test_inventory_and_telemetry() {
        let server = MockServer::start_async().await;
        mock_supermicro(&server).await;
        let mut smc = reader(&server, "ADMIN");
        smc.login().await.unwrap();

        assert_eq!(smc.memory().await.unwrap(), 32);
        assert_eq!(smc.cpu().await.unwrap().sockets, 2);
        assert_eq!(smc.nics().await.unwrap().len(), 2);
        assert_eq!(smc.power_state().await.unwrap(), "on");
        assert_eq!(smc.temp_c().await.unwrap(), 26);
        let psus = smc.psus().await.unwrap();
        assert_eq!(psus[1].serial, "cf414af38n50003@vm158s009467_2");
    }
}
