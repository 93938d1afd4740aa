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

use crate::domain::parsers::{expand_hosts, select_subnets};
use crate::domain::{
    ProbeState, Protocol, ScanError, ScanRequest, ScanSummary, ScannedPort, ScannerConfig,
    SiteSubnet, SCAN_PROFILES,
};
use crate::domain::services::run_pool;
use crate::ports::{InventoryRepository, PortProber, ScanningService, SubnetSource};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Subnet sources the scanner knows how to load
pub const SUBNET_SOURCES: [&str; 1] = ["kea"];

struct ProbeJob {
    ip: Ipv4Addr,
    protocol: Protocol,
    port: u16,
    cidr: String,
    site: String,
}

/// Domain service probing every BMC subnet and recording port states
pub struct ScanService {
    subnets: Arc<dyn SubnetSource>,
    prober: Arc<dyn PortProber>,
    repository: Arc<dyn InventoryRepository>,
    config: ScannerConfig,
    /// Hostname of this scanner
    scanned_by: String,
}

impl ScanService {
    /// Create a new scan service
    ///
    /// # Arguments
    /// * `subnets` - Source of the site subnets
    /// * `prober` - Port prober
    /// * `repository` - Inventory store receiving one row per probe
    /// * `config` - Scanner settings
    /// * `scanned_by` - Hostname recorded on every row
    pub fn new(
        subnets: Arc<dyn SubnetSource>,
        prober: Arc<dyn PortProber>,
        repository: Arc<dyn InventoryRepository>,
        config: ScannerConfig,
        scanned_by: String,
    ) -> Self {
        Self {
            subnets,
            prober,
            repository,
            config,
            scanned_by,
        }
    }

    fn jobs(&self, subnets: &[SiteSubnet]) -> (usize, Vec<ProbeJob>) {
        let mut hosts = 0;
        let mut jobs = Vec::new();
        for subnet in subnets {
            let addresses = match expand_hosts(&subnet.cidr) {
                Ok(addresses) => addresses,
                Err(e) => {
                    log::warn!("op=scan site={} cidr={} error={}", subnet.site, subnet.cidr, e);
                    continue;
                }
            };
            hosts += addresses.len();
            for ip in addresses {
                for (protocol, port) in SCAN_PROFILES {
                    jobs.push(ProbeJob {
                        ip,
                        protocol,
                        port,
                        cidr: subnet.cidr.clone(),
                        site: subnet.site.clone(),
                    });
                }
            }
        }
        (hosts, jobs)
    }
}

#[async_trait]
impl ScanningService for ScanService {
    async fn scan(&self, request: ScanRequest) -> Result<ScanSummary, ScanError> {
        if !SUBNET_SOURCES.contains(&self.config.subnet_source.as_str()) {
            return Err(ScanError::InvalidConfiguration(format!(
                "unknown subnet source '{}'",
                self.config.subnet_source
            )));
        }

        let subnets = select_subnets(
            self.subnets.load_subnets().await?,
            &request.cidrs,
            &request.sites,
        );
        let (hosts, jobs) = self.jobs(&subnets);
        let probes = jobs.len();
        log::info!(
            "op=scan subnets={} hosts={} probes={} concurrency={}",
            subnets.len(),
            hosts,
            probes,
            self.config.concurrency
        );

        let prober = Arc::clone(&self.prober);
        let repository = Arc::clone(&self.repository);
        let scanned_by = self.scanned_by.clone();
        let states = run_pool(self.config.concurrency, jobs, move |job: ProbeJob| {
            let prober = Arc::clone(&prober);
            let repository = Arc::clone(&repository);
            let scanned_by = scanned_by.clone();
            async move {
                let state = prober.probe(job.protocol.as_str(), job.ip, job.port).await;
                log::debug!(
                    "op=probe ip={} port={} protocol={} state={}",
                    job.ip,
                    job.port,
                    job.protocol,
                    state
                );
                let row = ScannedPort {
                    ip: job.ip.to_string(),
                    port: i64::from(job.port),
                    protocol: job.protocol.to_string(),
                    state: state.to_string(),
                    scanned_by,
                    cidr: job.cidr,
                    site: job.site,
                    ..Default::default()
                };
                if let Err(e) = repository.update_or_create(row.into()).await {
                    log::error!(
                        "op=scan ip={} port={} protocol={} error={}",
                        job.ip,
                        job.port,
                        job.protocol,
                        e
                    );
                }
                state
            }
        })
        .await;

        let summary = ScanSummary {
            subnets: subnets.len(),
            hosts,
            probes,
            open: states.iter().filter(|s| **s == ProbeState::Open).count(),
        };
        log::info!(
            "op=scan done subnets={} hosts={} probes={} open={}",
            summary.subnets,
            summary.hosts,
            summary.probes,
            summary.open
        );
        Ok(summary)
    }
}
