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

//! HP BladeSystem c7000 Onboard Administrator driver
//!
//! The OA needs no session: everything is read from `/xmldata?item=all`.

use super::client::BmcClient;
use super::detect::HP_XMLDATA;
use super::enrich::BladeEnricher;
use crate::domain::parsers::hp::{parse_xmldata, Infra2};
use crate::domain::parsers::validate_serial;
use crate::domain::{Blade, BmcError, Fan, Nic, Psu, StorageBlade, Vendor};
use crate::ports::ChassisReader;
use async_trait::async_trait;
use tokio::sync::OnceCell;

pub struct C7000Reader {
    client: BmcClient,
    enricher: BladeEnricher,
    infra2: OnceCell<Infra2>,
}

impl C7000Reader {
    pub fn new(client: BmcClient, enricher: BladeEnricher) -> Self {
        Self {
            client,
            enricher,
            infra2: OnceCell::new(),
        }
    }

    async fn infra2(&self) -> Result<&Infra2, BmcError> {
        self.infra2
            .get_or_try_init(|| async {
                let body = self.client.send(self.client.get(HP_XMLDATA)).await?;
                let rimp = self.client.parse(HP_XMLDATA, &body, parse_xmldata).await?;
                match rimp.infra2 {
                    Some(infra2) => Ok(infra2),
                    None => {
                        self.client.dump(&body).await;
                        Err(BmcError::UnableToReadData(format!(
                            "{} carries no INFRA2",
                            self.client.url(HP_XMLDATA)
                        )))
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl ChassisReader for C7000Reader {
    async fn login(&mut self) -> Result<(), BmcError> {
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), BmcError> {
        Ok(())
    }

    async fn serial(&self) -> Result<String, BmcError> {
        validate_serial(&self.infra2().await?.serial())
    }

    async fn model(&self) -> Result<String, BmcError> {
        Ok(self.infra2().await?.model())
    }

    async fn name(&self) -> Result<String, BmcError> {
        Ok(self.infra2().await?.name())
    }

    async fn status(&self) -> Result<String, BmcError> {
        Ok(self.infra2().await?.status())
    }

    async fn fw_version(&self) -> Result<String, BmcError> {
        Ok(self.infra2().await?.fw_version())
    }

    async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
        Ok(self.infra2().await?.nics())
    }

    async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
        Ok(self.infra2().await?.psus())
    }

    async fn fans(&self) -> Result<Vec<Fan>, BmcError> {
        Ok(self.infra2().await?.fans())
    }

    async fn power_kw(&self) -> Result<f64, BmcError> {
        Ok(self.infra2().await?.power_kw())
    }

    async fn temp_c(&self) -> Result<i64, BmcError> {
        Ok(self.infra2().await?.temp_c())
    }

    async fn pass_thru(&self) -> Result<String, BmcError> {
        Ok(self.infra2().await?.pass_thru())
    }

    async fn power_supply_count(&self) -> Result<usize, BmcError> {
        Ok(self.infra2().await?.power_supply_count())
    }

    async fn is_psu_redundant(&self) -> Result<bool, BmcError> {
        Ok(self.infra2().await?.is_psu_redundant())
    }

    async fn psu_redundancy_mode(&self) -> Result<String, BmcError> {
        Ok(self.infra2().await?.psu_redundancy_mode())
    }

    async fn blades(&self) -> Result<Vec<Blade>, BmcError> {
        let blades = self.infra2().await?.blades();
        Ok(self.enricher.enrich(Vendor::Hp, blades).await)
    }

    async fn storage_blades(&self) -> Result<Vec<StorageBlade>, BmcError> {
        Ok(self.infra2().await?.storage_blades())
    }

    fn vendor(&self) -> Vendor {
        Vendor::Hp
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use crate::adapters::secondary::bmc::ilo::testing::mock_ilo;
    use crate::domain::parsers::hp::fixtures::{BLADE_XML, ENCLOSURE_XML};
    use crate::domain::Credentials;
    use httpmock::prelude::*;

    fn reader(server: &MockServer) -> C7000Reader {
        let client = BmcClient::new(&host_of(server), &http_config(), None).unwrap();
        let enricher = BladeEnricher::new(
            http_config(),
            Credentials::new("inventory", "s3cret"),
            false,
            None,
        );
        C7000Reader::new(client, enricher)
    }

    async fn serve<'a>(server: &'a MockServer, body: &str) -> httpmock::Mock<'a> {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/xmldata").query_param("item", "all");
                then.status(200).body(body);
            })
            .await
    }

    #[tokio::test]
    async fn test_enclosure_read_once() {
        let server = MockServer::start_async().await;
        let xmldata = serve(&server, ENCLOSURE_XML).await;
        let mut chassis = reader(&server);
        chassis.login().await.unwrap();

        assert_eq!(chassis.serial().await.unwrap(), "gb8849ab12");
        assert_eq!(chassis.pass_thru().await.unwrap(), "10G");
        assert_eq!(chassis.power_supply_count().await.unwrap(), 2);
        assert_eq!(chassis.fans().await.unwrap().len(), 1);
        xmldata.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_unassigned_blade_not_enriched() {
        let server = MockServer::start_async().await;
        serve(&server, ENCLOSURE_XML).await;
        let chassis = reader(&server);

        let blades = chassis.blades().await.unwrap();
        assert_eq!(blades.len(), 1);
        assert_eq!(blades[0].bmc_address, "unassigned");
        assert!(!blades[0].bmc_auth);

        let storage = chassis.storage_blades().await.unwrap();
        assert_eq!(storage[0].blade_serial, "cz3512abcd");
    }

    #[tokio::test]
    async fn test_assigned_blade_enriched_through_ilo() {
        let blade_bmc = MockServer::start_async().await;
        mock_ilo(&blade_bmc, BLADE_XML, "s3cret").await;
        let enclosure = ENCLOSURE_XML.replace(
            "<MGMTIPADDR>0.0.0.0</MGMTIPADDR>",
            &format!("<MGMTIPADDR>{}</MGMTIPADDR>", host_of(&blade_bmc)),
        );

        let server = MockServer::start_async().await;
        serve(&server, &enclosure).await;
        let blades = reader(&server).blades().await.unwrap();

        assert!(blades[0].bmc_auth);
        assert_eq!(blades[0].memory_in_gb, 256);
        assert_eq!(blades[0].processor_count, 2);
        assert_eq!(blades[0].bmc_licence_type, "iLO Advanced");
        assert_eq!(blades[0].nics.len(), 2);
    }

    #[tokio::test]
    async fn test_xmldata_without_infra2() {
        let server = MockServer::start_async().await;
        serve(&server, BLADE_XML).await;
        assert!(matches!(
            reader(&server).serial().await,
            Err(BmcError::UnableToReadData(_))
        ));
    }
}
