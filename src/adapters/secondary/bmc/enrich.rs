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

//! Per-blade enrichment through the blade's own BMC
//!
//! Chassis controllers only know what the enclosure knows. CPU, memory and
//! license come from a server reader opened against each blade address.
//! Enrichment never opens a chassis reader, so it stops one level down.

use super::client::BmcClient;
use super::idrac8::IdracReader;
use super::ilo::IloReader;
use super::redfish::{self, RedfishReader};
use crate::domain::parsers::is_unassigned;
use crate::domain::{Blade, BmcError, Credentials, HttpConfig, Vendor};
use crate::ports::{PayloadDumper, ServerReader};
use std::future::Future;
use std::sync::Arc;

pub struct BladeEnricher {
    http: HttpConfig,
    credentials: Credentials,
    prefer_redfish: bool,
    dumper: Option<Arc<dyn PayloadDumper>>,
}

impl BladeEnricher {
    pub fn new(
        http: HttpConfig,
        credentials: Credentials,
        prefer_redfish: bool,
        dumper: Option<Arc<dyn PayloadDumper>>,
    ) -> Self {
        Self {
            http,
            credentials,
            prefer_redfish,
            dumper,
        }
    }

    /// Enrich every blade with an assigned BMC address
    ///
    /// Blades are visited in order with one blade session open at a time, so
    /// the collector pool width bounds the BMC sessions in flight. Failures
    /// are logged and leave the blade as the chassis reported it.
    pub async fn enrich(&self, vendor: Vendor, blades: Vec<Blade>) -> Vec<Blade> {
        in_turn(blades, move |blade| self.enrich_blade(vendor, blade)).await
    }

    async fn enrich_blade(&self, vendor: Vendor, mut blade: Blade) -> Blade {
        if is_unassigned(&blade.bmc_address) {
            log::debug!("op=enrich serial={} skipping unassigned blade", blade.serial);
            return blade;
        }

        let mut reader = match self.open(vendor, &blade.bmc_address).await {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!(
                    "op=enrich ip={} serial={} error={}",
                    blade.bmc_address,
                    blade.serial,
                    e
                );
                return blade;
            }
        };
        blade.bmc_auth = true;
        apply(reader.as_ref(), &mut blade).await;
        if let Err(e) = reader.logout().await {
            log::debug!("op=enrich ip={} logout error={}", blade.bmc_address, e);
        }
        blade
    }

    fn client(&self, address: &str) -> Result<BmcClient, BmcError> {
        BmcClient::new(address, &self.http, self.dumper.clone())
    }

    /// Log into the blade BMC, RedFish first when it answers
    async fn open(
        &self,
        vendor: Vendor,
        address: &str,
    ) -> Result<Box<dyn ServerReader>, BmcError> {
        if self.prefer_redfish {
            let client = self.client(address)?;
            if let Ok(200) = client.probe(redfish::ROOT).await {
                let mut reader = RedfishReader::new(client, self.credentials.clone(), vendor);
                match reader.login().await {
                    Ok(()) => return Ok(Box::new(reader)),
                    Err(BmcError::LoginFailed) => {
                        log::debug!(
                            "op=enrich ip={address} redfish login failed, using {vendor} reader"
                        );
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let mut reader: Box<dyn ServerReader> = match vendor {
            Vendor::Hp => Box::new(IloReader::new(
                self.client(address)?,
                self.credentials.clone(),
            )),
            Vendor::Dell => Box::new(IdracReader::new(
                self.client(address)?,
                self.credentials.clone(),
            )),
            Vendor::Supermicro => return Err(BmcError::NotSupported("supermicro blades")),
        };
        reader.login().await?;
        Ok(reader)
    }
}

async fn apply(reader: &dyn ServerReader, blade: &mut Blade) {
    let address = blade.bmc_address.clone();
    let skipped = |field: &str, e: BmcError| {
        log::debug!("op=enrich ip={address} field={field} error={e}");
    };

    match reader.cpu().await {
        Ok(cpu) => {
            blade.processor = cpu.name;
            blade.processor_count = cpu.sockets;
            blade.processor_core_count = cpu.cores;
            blade.processor_thread_count = cpu.threads;
        }
        Err(e) => skipped("cpu", e),
    }
    match reader.memory().await {
        Ok(memory) => blade.memory_in_gb = memory,
        Err(e) => skipped("memory", e),
    }
    match reader.license().await {
        Ok(license) => {
            blade.bmc_licence_type = license.name;
            blade.bmc_licence_status = license.status;
        }
        Err(e) => skipped("license", e),
    }
    if blade.nics.is_empty() {
        match reader.nics().await {
            Ok(nics) => blade.nics = nics,
            Err(e) => skipped("nics", e),
        }
    }
    match reader.disks().await {
        Ok(disks) => blade.disks = disks,
        Err(e) => skipped("disks", e),
    }
}

/// Run \`visit\` over each blade, awaiting one before starting the next
async fn in_turn<F, Fut>(blades: Vec<Blade>, mut visit: F) -> Vec<Blade>
where
    F: FnMut(Blade) -> Fut,
    Fut: Future<Output = Blade>,
{
    let mut visited = Vec::with_capacity(blades.len());
    for blade in blades {
        visited.push(visit(blade).await);
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use crate::adapters::secondary::bmc::idrac8::testing::mock_idrac;
    use crate::adapters::secondary::bmc::redfish::testing::mock_redfish;
    use httpmock::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn blade(address: &str) -> Blade {
        Blade {
            serial: "8xkq4m2".to_string(),
            bmc_address: address.to_string(),
            vendor: "Dell".to_string(),
            ..Default::default()
        }
    }

    fn enricher(prefer_redfish: bool) -> BladeEnricher {
        BladeEnricher::new(
            http_config(),
            Credentials::new("root", "calvin"),
            prefer_redfish,
            None,
        )
    }

    #[tokio::test]
    async fn test_unassigned_blade_is_untouched() {
        let blades = enricher(true)
            .enrich(Vendor::Dell, vec![blade("unassigned")])
            .await;
        assert!(!blades[0].bmc_auth);
        assert_eq!(blades[0].memory_in_gb, 0);
    }

    #[tokio::test]
    async fn test_vendor_reader_fills_cpu_memory_license() {
        let server = MockServer::start_async().await;
        mock_idrac(&server, "calvin").await;

        let blades = enricher(true)
            .enrich(Vendor::Dell, vec![blade(&host_of(&server))])
            .await;
        let enriched = &blades[0];
        assert!(enriched.bmc_auth);
        assert_eq!(enriched.memory_in_gb, 128);
        assert_eq!(enriched.processor_count, 2);
        assert_eq!(enriched.bmc_licence_type, "Enterprise");
        assert_eq!(enriched.nics.len(), 2);
    }

    #[tokio::test]
    async fn test_redfish_preferred_when_available() {
        let server = MockServer::start_async().await;
        mock_redfish(&server).await;
        let idrac_login = server
            .mock_async(|when, then| {
                when.method(POST).path("/data/login");
                then.status(200);
            })
            .await;

        let blades = enricher(true)
            .enrich(Vendor::Dell, vec![blade(&host_of(&server))])
            .await;
        assert_eq!(blades[0].memory_in_gb, 128);
        assert_eq!(blades[0].processor_thread_count, 20);
        // License is not exposed over RedFish
        assert!(blades[0].bmc_licence_type.is_empty());
        idrac_login.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_failures_leave_blade_as_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/data/login");
                then.status(500);
            })
            .await;

        let blades = enricher(false)
            .enrich(Vendor::Dell, vec![blade(&host_of(&server))])
            .await;
        assert!(!blades[0].bmc_auth);
        assert_eq!(blades[0].serial, "8xkq4m2");
    }

    #[tokio::test]
    async fn test_blades_visited_one_at_a_time() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let blades = (1..=4)
            .map(|position| Blade {
                blade_position: position,
                ..blade("10.0.0.21")
            })
            .collect();

        let visited = in_turn(blades, |blade| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                blade
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        let positions: Vec<i64> = visited.iter().map(|b| b.blade_position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_every_assigned_blade_gets_its_own_session() {
        let server = MockServer::start_async().await;
        mock_idrac(&server, "calvin").await;
        let address = host_of(&server);

        let blades = enricher(false)
            .enrich(
                Vendor::Dell,
                vec![blade(&address), blade("unassigned"), blade(&address)],
            )
            .await;
        let authed: Vec<bool> = blades.iter().map(|b| b.bmc_auth).collect();
        assert_eq!(authed, vec![true, false, true]);
        assert_eq!(blades[2].memory_in_gb, 128);
    }
}
