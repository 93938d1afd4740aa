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

//! Dell M1000e CMC driver

use super::client::BmcClient;
use super::enrich::BladeEnricher;
use crate::domain::parsers::cmc::{parse_blade_nics, parse_group_info, parse_temp_sensors, GroupInfo};
use crate::domain::parsers::{find_mac_address, validate_serial};
use crate::domain::{Blade, BmcError, Credentials, Fan, Nic, Psu, StorageBlade, Vendor};
use crate::ports::ChassisReader;
use async_trait::async_trait;
use tokio::sync::OnceCell;

pub const LOGIN: &str = "/cgi-bin/webcgi/login";
pub const LOGOUT: &str = "/cgi-bin/webcgi/logout";
/// Page the CMC lands on after a successful login
pub const INDEX: &str = "/cgi-bin/webcgi/index";
pub const GROUP_INFO: &str = "/json?method=groupinfo";
pub const TEMP_SENSORS: &str = "/json?method=temp-sensors";
pub const BLADES_WWN_INFO: &str = "/json?method=blades-wwn-info";
pub const CMC_STATUS: &str = "/cgi-bin/webcgi/cmc_status?cat=C01&tab=T11&id=P31";

pub struct M1000eReader {
    client: BmcClient,
    credentials: Credentials,
    enricher: BladeEnricher,
    logged_in: bool,
    group: OnceCell<GroupInfo>,
}

impl M1000eReader {
    pub fn new(client: BmcClient, credentials: Credentials, enricher: BladeEnricher) -> Self {
        Self {
            client,
            credentials,
            enricher,
            logged_in: false,
            group: OnceCell::new(),
        }
    }

    async fn group(&self) -> Result<&GroupInfo, BmcError> {
        self.group
            .get_or_try_init(|| self.client.get_parsed(GROUP_INFO, parse_group_info))
            .await
    }
}

#[async_trait]
impl ChassisReader for M1000eReader {
    async fn login(&mut self) -> Result<(), BmcError> {
        let form = [
            ("user", self.credentials.user.as_str()),
            ("password", self.credentials.pass.as_str()),
        ];
        let reply = self.client.fetch(self.client.post(LOGIN).form(&form)).await?;
        if !reply.url.contains(INDEX) {
            return Err(BmcError::LoginFailed);
        }
        log::debug!("op=login ip={} vendor=Dell driver=m1000e", self.client.host());
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
        validate_serial(&self.group().await?.serial())
    }

    async fn model(&self) -> Result<String, BmcError> {
        Ok(self.group().await?.model())
    }

    async fn name(&self) -> Result<String, BmcError> {
        Ok(self.group().await?.name())
    }

    async fn status(&self) -> Result<String, BmcError> {
        Ok(self.group().await?.status())
    }

    async fn fw_version(&self) -> Result<String, BmcError> {
        Ok(self.group().await?.fw_version())
    }

    /// MAC of the active CMC, scraped from its status page
    async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
        let serial = self.serial().await?;
        let page = self.client.send(self.client.get(CMC_STATUS)).await?;
        let Some(mac_address) = find_mac_address(&page) else {
            self.client.dump(&page).await;
            return Err(BmcError::UnableToReadData(format!(
                "no MAC address in {}",
                self.client.url(CMC_STATUS)
            )));
        };
        Ok(vec![Nic {
            mac_address,
            name: "CMC".to_string(),
            chassis_serial: serial,
            ..Default::default()
        }])
    }

    async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
        Ok(self.group().await?.psus())
    }

    async fn fans(&self) -> Result<Vec<Fan>, BmcError> {
        Ok(self.group().await?.fans())
    }

    async fn power_kw(&self) -> Result<f64, BmcError> {
        Ok(self.group().await?.power_kw())
    }

    async fn temp_c(&self) -> Result<i64, BmcError> {
        self.client.get_parsed(TEMP_SENSORS, parse_temp_sensors).await
    }

    async fn pass_thru(&self) -> Result<String, BmcError> {
        Ok(self.group().await?.pass_thru())
    }

    async fn power_supply_count(&self) -> Result<usize, BmcError> {
        Ok(self.group().await?.power_supply_count())
    }

    async fn is_psu_redundant(&self) -> Result<bool, BmcError> {
        Ok(self.group().await?.is_psu_redundant())
    }

    async fn psu_redundancy_mode(&self) -> Result<String, BmcError> {
        Ok(self.group().await?.psu_redundancy_mode())
    }

    async fn blades(&self) -> Result<Vec<Blade>, BmcError> {
        let mut blades = self.group().await?.blades();
        match self.client.get_parsed(BLADES_WWN_INFO, parse_blade_nics).await {
            Ok(mut nics) => {
                for blade in blades.iter_mut() {
                    if let Some(slot_nics) = nics.remove(&blade.blade_position) {
                        blade.nics = slot_nics;
                    }
                }
            }
            Err(e) => log::warn!("op=cmc_blade_nics ip={} error={}", self.client.host(), e),
        }
        Ok(self.enricher.enrich(Vendor::Dell, blades).await)
    }

    async fn storage_blades(&self) -> Result<Vec<StorageBlade>, BmcError> {
        Ok(self.group().await?.storage_blades())
    }

    fn vendor(&self) -> Vendor {
        Vendor::Dell
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use crate::domain::parsers::cmc::fixtures::{GROUP_INFO as GROUP_INFO_JSON, WWN_INFO};
    use httpmock::prelude::*;

    fn reader(server: &MockServer, pass: &str) -> M1000eReader {
        let client = BmcClient::new(&host_of(server), &http_config(), None).unwrap();
        let enricher =
            BladeEnricher::new(http_config(), Credentials::new("root", pass), false, None);
        M1000eReader::new(client, Credentials::new("root", pass), enricher)
    }

    async fn mock_cmc(server: &MockServer) {
        // Blade iDRACs stay unassigned so no enrichment leaves the mock
        let group_info = GROUP_INFO_JSON.replace("https://10.0.0.21:443", "https://0.0.0.0:443");
        server
            .mock_async(|when, then| {
                when.method(POST).path(LOGIN).body_contains("password=calvin");
                then.status(302).header("Location", INDEX);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(LOGIN).body_contains("password=wrong");
                then.status(200).body("<html>login failed</html>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(INDEX);
                then.status(200).body("<html>index</html>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/json").query_param("method", "groupinfo");
                then.status(200).body(&group_info);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/json").query_param("method", "blades-wwn-info");
                then.status(200).body(WWN_INFO);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/json").query_param("method", "temp-sensors");
                then.status(200)
                    .body(r#"{"1":{"TempCurrentValue":24,"Name":"Ambient Temp"}}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cgi-bin/webcgi/cmc_status");
                then.status(200).body(
                    "<tr><td>MAC Address</td><td>18:66:DA:5E:00:41</td></tr>",
                );
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(LOGOUT);
                then.status(200);
            })
            .await;
    }

    #[tokio::test]
    async fn test_login_lands_on_index() {
        let server = MockServer::start_async().await;
        mock_cmc(&server).await;

        let mut cmc = reader(&server, "calvin");
        cmc.login().await.unwrap();
        cmc.logout().await.unwrap();

        let mut rejected = reader(&server, "wrong");
        assert_eq!(rejected.login().await, Err(BmcError::LoginFailed));
    }

    #[tokio::test]
    async fn test_chassis_fields() {
        let server = MockServer::start_async().await;
        mock_cmc(&server).await;
        let mut cmc = reader(&server, "calvin");
        cmc.login().await.unwrap();

        assert_eq!(cmc.serial().await.unwrap(), "cx7k9q1");
        assert_eq!(cmc.temp_c().await.unwrap(), 24);
        let nics = cmc.nics().await.unwrap();
        assert_eq!(nics[0].mac_address, "18:66:da:5e:00:41");
        assert_eq!(nics[0].chassis_serial, "cx7k9q1");
        assert_eq!(cmc.storage_blades().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blades_carry_slot_nics() {
        let server = MockServer::start_async().await;
        mock_cmc(&server).await;
        let cmc = reader(&server, "calvin");

        let blades = cmc.blades().await.unwrap();
        assert_eq!(blades.len(), 1);
        assert_eq!(blades[0].serial, "8xkq4m2");
        assert_eq!(blades[0].nics.len(), 2);
        assert_eq!(blades[0].bmc_address, "unassigned");
        assert!(!blades[0].bmc_auth);
    }
}
