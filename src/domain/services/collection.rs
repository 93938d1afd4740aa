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

use crate::domain::parsers::{is_unassigned, normalize_bmc_address, validate_serial, ALL};
use crate::domain::services::pool::panic_message;
use crate::domain::services::{run_pool, Notifier};
use crate::domain::{
    diff_entities, Blade, BmcError, Chassis, CollectError, CollectOutcome, CollectSummary,
    CpuSummary, Discrete, Disk, Entity, EntityKind, Filter, Filters, HardwareType, InventoryConfig,
    LicenseInfo, Nic, Page, ProbeState, Psu, RepositoryError, ScannedPort, Vendor,
};
use crate::ports::{
    BmcConnector, ChassisReader, CollectingService, Connection, InventoryRepository, ServerReader,
};
use async_trait::async_trait;
use futures_util::FutureExt;
use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Reachability of a BMC from the latest scan
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Reachability {
    ssh: bool,
    web: bool,
    ipmi: bool,
}

/// Everything a server reader reports, before it becomes a Blade or Discrete
#[derive(Debug, Default)]
struct ServerFacts {
    serial: String,
    name: String,
    model: String,
    status: String,
    bmc_type: String,
    bmc_version: String,
    bios_version: String,
    nics: Vec<Nic>,
    disks: Vec<Disk>,
    psus: Vec<Psu>,
    memory_in_gb: i64,
    cpu: CpuSummary,
    license: LicenseInfo,
    power_kw: f64,
    temp_c: i64,
    power_state: String,
}

impl ServerFacts {
    fn into_blade(self, address: &str, vendor: Vendor, reach: Reachability) -> Blade {
        Blade {
            serial: self.serial,
            name: self.name,
            bios_version: self.bios_version,
            bmc_type: self.bmc_type,
            bmc_address: normalize_bmc_address(address),
            bmc_version: self.bmc_version,
            bmc_licence_type: self.license.name,
            bmc_licence_status: self.license.status,
            bmc_ssh_reachable: reach.ssh,
            bmc_web_reachable: reach.web,
            bmc_ipmi_reachable: reach.ipmi,
            bmc_auth: true,
            disks: self.disks,
            nics: self.nics,
            model: self.model,
            temp_c: self.temp_c,
            power_kw: self.power_kw,
            power_state: self.power_state,
            status: self.status,
            vendor: vendor.to_string(),
            processor: self.cpu.name,
            processor_count: self.cpu.sockets,
            processor_core_count: self.cpu.cores,
            processor_thread_count: self.cpu.threads,
            memory_in_gb: self.memory_in_gb,
            ..Default::default()
        }
    }

    fn into_discrete(self, address: &str, vendor: Vendor, reach: Reachability) -> Discrete {
        Discrete {
            serial: self.serial,
            name: self.name,
            bios_version: self.bios_version,
            bmc_type: self.bmc_type,
            bmc_address: normalize_bmc_address(address),
            bmc_version: self.bmc_version,
            bmc_licence_type: self.license.name,
            bmc_licence_status: self.license.status,
            bmc_ssh_reachable: reach.ssh,
            bmc_web_reachable: reach.web,
            bmc_ipmi_reachable: reach.ipmi,
            bmc_auth: true,
            disks: self.disks,
            nics: self.nics,
            psus: self.psus,
            model: self.model,
            temp_c: self.temp_c,
            power_kw: self.power_kw,
            power_state: self.power_state,
            status: self.status,
            vendor: vendor.to_string(),
            processor: self.cpu.name,
            processor_count: self.cpu.sockets,
            processor_core_count: self.cpu.cores,
            processor_thread_count: self.cpu.threads,
            memory_in_gb: self.memory_in_gb,
            ..Default::default()
        }
    }
}

/// Accept a value the driver could not provide, keeping the device
///
/// Missing pages, malformed fragments and unsupported capabilities leave the
/// field empty; anything else fails the device.
fn optional<T: Default>(
    result: Result<T, BmcError>,
    host: &str,
    field: &str,
) -> Result<T, BmcError> {
    match result {
        Ok(value) => Ok(value),
        Err(
            e @ (BmcError::PageNotFound(_)
            | BmcError::Parse { .. }
            | BmcError::NotSupported(_)
            | BmcError::UnexpectedStatus { .. }),
        ) => {
            log::debug!("op=collect ip={} field={} skipped: {}", host, field, e);
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

/// Domain service collecting BMC inventory into the repository
///
/// Each host is detected, logged into, read, validated, persisted and diffed
/// against its stored pre-image; changed devices are queued on the notifier.
#[derive(Clone)]
pub struct CollectionService {
    connector: Arc<dyn BmcConnector>,
    repository: Arc<dyn InventoryRepository>,
    notifier: Arc<Notifier>,
    config: Arc<InventoryConfig>,
}

impl CollectionService {
    /// Create a new collection service
    ///
    /// # Arguments
    /// * `connector` - Vendor detection and driver factory
    /// * `repository` - Inventory store
    /// * `notifier` - Queue for change callbacks
    /// * `config` - Runtime configuration
    pub fn new(
        connector: Arc<dyn BmcConnector>,
        repository: Arc<dyn InventoryRepository>,
        notifier: Arc<Notifier>,
        config: Arc<InventoryConfig>,
    ) -> Self {
        Self {
            connector,
            repository,
            notifier,
            config,
        }
    }

    /// Hosts with tcp/443 open in the selected sites
    async fn reachable_hosts(&self) -> Result<Vec<String>, RepositoryError> {
        let mut filters = Filters::new()
            .with(Filter::is_in("protocol", &["tcp"]))
            .with(Filter::is_in("port", &["443"]))
            .with(Filter::is_in("state", &[ProbeState::Open.as_str()]));
        if !self.config.site.iter().any(|s| s == ALL) {
            let sites: Vec<&str> = self.config.site.iter().map(String::as_str).collect();
            filters.push(Filter::is_in("site", &sites));
        }

        let rows = self
            .repository
            .get_all_by_filters(EntityKind::ScannedPort, Page::all(), &filters)
            .await?;
        let hosts: BTreeSet<String> = rows
            .into_iter()
            .filter_map(|row| ScannedPort::try_from(row).ok())
            .map(|port| port.ip)
            .collect();
        Ok(hosts.into_iter().collect())
    }

    async fn reachability(&self, address: &str) -> Result<Reachability, RepositoryError> {
        if is_unassigned(address) {
            return Ok(Reachability::default());
        }

        let filters = Filters::new().with(Filter::is_in("ip", &[address]));
        let rows = self
            .repository
            .get_all_by_filters(EntityKind::ScannedPort, Page::all(), &filters)
            .await?;

        let mut latest: HashMap<(String, i64), ScannedPort> = HashMap::new();
        for row in rows.into_iter().filter_map(|row| ScannedPort::try_from(row).ok()) {
            let key = (row.protocol.clone(), row.port);
            match latest.get(&key) {
                Some(seen) if seen.updated_at >= row.updated_at => {}
                _ => {
                    latest.insert(key, row);
                }
            }
        }

        let open = |protocol: &str, port: i64| {
            latest
                .get(&(protocol.to_string(), port))
                .is_some_and(|row| row.state == ProbeState::Open.as_str())
        };
        Ok(Reachability {
            ssh: open("tcp", 22),
            web: open("tcp", 443),
            ipmi: open("ipmi", 623),
        })
    }

    /// Build a driver and log in, retrying once with vendor defaults when enabled
    async fn open(
        &self,
        host: &str,
        vendor: Vendor,
        hardware_type: HardwareType,
    ) -> Result<Connection, BmcError> {
        let credentials = self.config.credentials(vendor, false);
        let mut connection = self
            .connector
            .connect(host, vendor, hardware_type, &credentials)?;
        match connection.login().await {
            Ok(()) => Ok(connection),
            Err(BmcError::LoginFailed) if self.config.collector.try_default_credentials => {
                log::info!(
                    "op=login ip={} vendor={} retrying with default credentials",
                    host,
                    vendor
                );
                let defaults = self.config.credentials(vendor, true);
                let mut connection = self
                    .connector
                    .connect(host, vendor, hardware_type, &defaults)?;
                connection.login().await?;
                Ok(connection)
            }
            Err(e) => Err(e),
        }
    }

    async fn server_facts(
        &self,
        host: &str,
        reader: &dyn ServerReader,
    ) -> Result<ServerFacts, BmcError> {
        let serial = validate_serial(&reader.serial().await?)?;
        let cpu = optional(reader.cpu().await, host, "cpu")?;
        let license = optional(reader.license().await, host, "license")?;

        Ok(ServerFacts {
            name: optional(reader.name().await, host, "name")?,
            model: optional(reader.model().await, host, "model")?,
            status: optional(reader.status().await, host, "status")?,
            bmc_type: optional(reader.bmc_type().await, host, "bmc_type")?,
            bmc_version: optional(reader.bmc_version().await, host, "bmc_version")?,
            bios_version: optional(reader.bios_version().await, host, "bios_version")?,
            nics: optional(reader.nics().await, host, "nics")?,
            disks: optional(reader.disks().await, host, "disks")?,
            psus: optional(reader.psus().await, host, "psus")?,
            memory_in_gb: optional(reader.memory().await, host, "memory")?,
            power_kw: optional(reader.power_kw().await, host, "power_kw")?,
            temp_c: optional(reader.temp_c().await, host, "temp_c")?,
            power_state: optional(reader.power_state().await, host, "power_state")?,
            serial,
            cpu,
            license,
        })
    }

    async fn server_snapshot(
        &self,
        host: &str,
        reader: &dyn ServerReader,
    ) -> Result<Entity, CollectError> {
        let facts = self.server_facts(host, reader).await?;
        let address = normalize_bmc_address(reader.address());
        let reach = self.reachability(&address).await?;
        if optional(reader.is_blade().await, host, "is_blade")? {
            Ok(facts.into_blade(&address, reader.vendor(), reach).into())
        } else {
            Ok(facts.into_discrete(&address, reader.vendor(), reach).into())
        }
    }

    async fn chassis_snapshot(
        &self,
        host: &str,
        reader: &dyn ChassisReader,
    ) -> Result<Chassis, CollectError> {
        let serial = validate_serial(&reader.serial().await?)?;
        let address = normalize_bmc_address(reader.address());
        let reach = self.reachability(&address).await?;

        let mut blades = Vec::new();
        for mut blade in optional(reader.blades().await, host, "blades")? {
            match validate_serial(&blade.serial) {
                Ok(valid) => blade.serial = valid,
                Err(e) => {
                    log::warn!(
                        "op=collect ip={} serial={} position={} skipping blade: {}",
                        host,
                        serial,
                        blade.blade_position,
                        e
                    );
                    continue;
                }
            }
            blade.bmc_address = normalize_bmc_address(&blade.bmc_address);
            let blade_reach = self.reachability(&blade.bmc_address).await?;
            blade.bmc_ssh_reachable = blade_reach.ssh;
            blade.bmc_web_reachable = blade_reach.web;
            blade.bmc_ipmi_reachable = blade_reach.ipmi;
            blade.chassis_serial = serial.clone();
            blades.push(blade);
        }

        let mut storage_blades = Vec::new();
        for mut storage in optional(reader.storage_blades().await, host, "storage_blades")? {
            match validate_serial(&storage.serial) {
                Ok(valid) => storage.serial = valid,
                Err(e) => {
                    log::warn!(
                        "op=collect ip={} serial={} position={} skipping storage blade: {}",
                        host,
                        serial,
                        storage.blade_position,
                        e
                    );
                    continue;
                }
            }
            storage.chassis_serial = serial.clone();
            storage_blades.push(storage);
        }

        Ok(Chassis {
            name: optional(reader.name().await, host, "name")?,
            bmc_address: address,
            bmc_ssh_reachable: reach.ssh,
            bmc_web_reachable: reach.web,
            bmc_ipmi_reachable: reach.ipmi,
            bmc_auth: true,
            blades,
            storage_blades,
            nics: optional(reader.nics().await, host, "nics")?,
            psus: optional(reader.psus().await, host, "psus")?,
            fans: optional(reader.fans().await, host, "fans")?,
            temp_c: optional(reader.temp_c().await, host, "temp_c")?,
            psu_redundancy_mode: optional(
                reader.psu_redundancy_mode().await,
                host,
                "psu_redundancy_mode",
            )?,
            is_psu_redundant: optional(
                reader.is_psu_redundant().await,
                host,
                "is_psu_redundant",
            )?,
            pass_thru: optional(reader.pass_thru().await, host, "pass_thru")?,
            status: optional(reader.status().await, host, "status")?,
            power_kw: optional(reader.power_kw().await, host, "power_kw")?,
            model: optional(reader.model().await, host, "model")?,
            vendor: reader.vendor().to_string(),
            fw_version: optional(reader.fw_version().await, host, "fw_version")?,
            serial,
            ..Default::default()
        })
    }

    /// Upsert one device and queue a callback when it is new or changed
    async fn persist(&self, host: &str, entity: Entity) -> Result<Option<String>, CollectError> {
        let kind = entity.kind();
        let serial = entity.key().join("/");
        let outcome = self.repository.update_or_create(entity).await?;

        let changed = match &outcome.before {
            None => {
                log::info!(
                    "op=persist ip={} kind={} serial={} created",
                    host,
                    kind.table(),
                    serial
                );
                true
            }
            Some(before) => {
                let changes = diff_entities(before, &outcome.after)?;
                for change in &changes {
                    log::info!(
                        "op=diff ip={} kind={} serial={} {}",
                        host,
                        kind.table(),
                        serial,
                        change
                    );
                }
                !changes.is_empty()
            }
        };
        if !changed {
            return Ok(None);
        }

        let callback = format!(
            "{}/{}/{}",
            self.config.url.trim_end_matches('/'),
            kind.route(),
            serial
        );
        self.notifier.publish(callback.clone());
        Ok(Some(callback))
    }

    async fn snapshot_and_persist(
        &self,
        host: &str,
        connection: &Connection,
    ) -> Result<(HardwareType, String, Vec<String>), CollectError> {
        let mut notifications = Vec::new();
        match connection {
            Connection::Server(reader) => {
                let entity = self.server_snapshot(host, reader.as_ref()).await?;
                let hardware_type = match entity.kind() {
                    EntityKind::Blade => HardwareType::Blade,
                    _ => HardwareType::Discrete,
                };
                let serial = entity.key().join("/");
                notifications.extend(self.persist(host, entity).await?);
                Ok((hardware_type, serial, notifications))
            }
            Connection::Chassis(reader) => {
                let mut chassis = self.chassis_snapshot(host, reader.as_ref()).await?;
                let blades = std::mem::take(&mut chassis.blades);
                let storage_blades = std::mem::take(&mut chassis.storage_blades);
                let serial = chassis.serial.clone();

                notifications.extend(self.persist(host, chassis.into()).await?);
                for blade in blades {
                    notifications.extend(self.persist(host, blade.into()).await?);
                }
                for storage in storage_blades {
                    notifications.extend(self.persist(host, storage.into()).await?);
                }
                Ok((HardwareType::Chassis, serial, notifications))
            }
        }
    }
}

#[async_trait]
impl CollectingService for CollectionService {
    async fn collect(&self, hosts: Vec<String>) -> Result<CollectSummary, CollectError> {
        let hosts = if hosts.is_empty() {
            self.reachable_hosts().await?
        } else {
            hosts
        };
        let total = hosts.len();
        log::info!(
            "op=collect hosts={} concurrency={}",
            total,
            self.config.collector.concurrency
        );

        let service = self.clone();
        let results = run_pool(self.config.collector.concurrency, hosts, move |host: String| {
            let service = service.clone();
            async move {
                match service.collect_host(&host).await {
                    Ok(outcome) => {
                        log::info!(
                            "op=collect ip={} vendor={} type={} serial={} changes={}",
                            outcome.host,
                            outcome.vendor,
                            outcome.hardware_type,
                            outcome.serial,
                            outcome.notifications.len()
                        );
                        Some(outcome.notifications.len())
                    }
                    Err(e) => {
                        log::warn!("op=collect ip={} error={}", host, e);
                        None
                    }
                }
            }
        })
        .await;

        let collected: Vec<usize> = results.into_iter().flatten().collect();
        Ok(CollectSummary {
            hosts: total,
            collected: collected.len(),
            failed: total - collected.len(),
            notifications: collected.iter().sum(),
        })
    }

    async fn collect_host(&self, host: &str) -> Result<CollectOutcome, CollectError> {
        let (vendor, detected) = match self.connector.detect(host).await {
            Ok(detected) => detected,
            Err(e) => {
                log::info!("op=detect ip={} error={}", host, e);
                return Err(e.into());
            }
        };
        log::debug!("op=detect ip={} vendor={} type={}", host, vendor, detected);

        let mut connection = self.open(host, vendor, detected).await?;
        let result = AssertUnwindSafe(self.snapshot_and_persist(host, &connection))
            .catch_unwind()
            .await;
        if let Err(e) = connection.logout().await {
            log::warn!("op=logout ip={} vendor={} error={}", host, vendor, e);
        }

        let (hardware_type, serial, notifications) = match result {
            Ok(result) => result?,
            Err(panic) => return Err(CollectError::Aborted(panic_message(&*panic))),
        };
        Ok(CollectOutcome {
            host: host.to_string(),
            vendor,
            hardware_type,
            serial,
            notifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteInventoryRepository;
    use crate::domain::{Credentials, Fan, StorageBlade};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Calls {
        logins: Arc<Mutex<Vec<Credentials>>>,
        logouts: Arc<AtomicUsize>,
    }

    impl Calls {
        fn login(&self, credentials: &Credentials, accepted: &str) -> Result<(), BmcError> {
            self.logins.lock().unwrap().push(credentials.clone());
            if credentials.pass == accepted {
                Ok(())
            } else {
                Err(BmcError::LoginFailed)
            }
        }

        fn logout(&self) -> Result<(), BmcError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeServer {
        address: String,
        blade: bool,
        power_kw: f64,
        credentials: Credentials,
        accepted: String,
        calls: Calls,
    }

    #[async_trait]
    impl ServerReader for FakeServer {
        async fn login(&mut self) -> Result<(), BmcError> {
            self.calls.login(&self.credentials, &self.accepted)
        }
        async fn logout(&mut self) -> Result<(), BmcError> {
            self.calls.logout()
        }
        async fn serial(&self) -> Result<String, BmcError> {
            Ok("CZJ1234567".into())
        }
        async fn model(&self) -> Result<String, BmcError> {
            Ok("ProLiant DL360 Gen9".into())
        }
        async fn name(&self) -> Result<String, BmcError> {
            Ok("node01.ams4".into())
        }
        async fn status(&self) -> Result<String, BmcError> {
            Ok("OK".into())
        }
        async fn bmc_type(&self) -> Result<String, BmcError> {
            Ok("ilo4".into())
        }
        async fn bmc_version(&self) -> Result<String, BmcError> {
            Ok("2.55".into())
        }
        async fn bios_version(&self) -> Result<String, BmcError> {
            Err(BmcError::PageNotFound("/json/bios".into()))
        }
        async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
            Ok(vec![Nic {
                mac_address: "ec:b1:d7:00:00:01".into(),
                name: "nic1".into(),
                speed: "10G".into(),
                ..Default::default()
            }])
        }
        async fn disks(&self) -> Result<Vec<Disk>, BmcError> {
            Err(BmcError::NotSupported("disks"))
        }
        async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
            Ok(Vec::new())
        }
        async fn memory(&self) -> Result<i64, BmcError> {
            Ok(256)
        }
        async fn cpu(&self) -> Result<CpuSummary, BmcError> {
            Ok(CpuSummary {
                name: "Intel(R) Xeon(R) CPU E5-2680 v4 @ 2.40GHz".into(),
                sockets: 2,
                cores: 14,
                threads: 28,
            })
        }
        async fn license(&self) -> Result<LicenseInfo, BmcError> {
            Ok(LicenseInfo {
                name: "iLO Advanced".into(),
                status: "Licensed".into(),
            })
        }
        async fn power_kw(&self) -> Result<f64, BmcError> {
            Ok(self.power_kw)
        }
        async fn temp_c(&self) -> Result<i64, BmcError> {
            Ok(21)
        }
        async fn power_state(&self) -> Result<String, BmcError> {
            Ok("on".into())
        }
        async fn is_blade(&self) -> Result<bool, BmcError> {
            Ok(self.blade)
        }
        fn vendor(&self) -> Vendor {
            Vendor::Hp
        }
        fn address(&self) -> &str {
            &self.address
        }
    }

    struct FakeChassis {
        address: String,
        calls: Calls,
    }

    #[async_trait]
    impl ChassisReader for FakeChassis {
        async fn login(&mut self) -> Result<(), BmcError> {
            Ok(())
        }
        async fn logout(&mut self) -> Result<(), BmcError> {
            self.calls.logout()
        }
        async fn serial(&self) -> Result<String, BmcError> {
            Ok("CZ3550FAKE".into())
        }
        async fn model(&self) -> Result<String, BmcError> {
            Ok("BladeSystem c7000 Enclosure G2".into())
        }
        async fn name(&self) -> Result<String, BmcError> {
            Ok("ams4-c7000-01".into())
        }
        async fn status(&self) -> Result<String, BmcError> {
            Ok("OK".into())
        }
        async fn fw_version(&self) -> Result<String, BmcError> {
            Ok("4.50".into())
        }
        async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
            Ok(vec![Nic {
                mac_address: "00:17:a4:77:00:01".into(),
                name: "OA1".into(),
                speed: "1G".into(),
                ..Default::default()
            }])
        }
        async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
            Ok(vec![Psu {
                serial: "cz3550fake_1".into(),
                position: 1,
                status: "OK".into(),
                ..Default::default()
            }])
        }
        async fn fans(&self) -> Result<Vec<Fan>, BmcError> {
            Ok(vec![Fan {
                serial: "cz3550fake_1".into(),
                position: 1,
                current_rpm: 6000,
                ..Default::default()
            }])
        }
        async fn power_kw(&self) -> Result<f64, BmcError> {
            Ok(3.2)
        }
        async fn temp_c(&self) -> Result<i64, BmcError> {
            Ok(22)
        }
        async fn pass_thru(&self) -> Result<String, BmcError> {
            Ok("10G".into())
        }
        async fn power_supply_count(&self) -> Result<usize, BmcError> {
            Ok(1)
        }
        async fn is_psu_redundant(&self) -> Result<bool, BmcError> {
            Ok(true)
        }
        async fn psu_redundancy_mode(&self) -> Result<String, BmcError> {
            Ok("AC_REDUNDANT".into())
        }
        async fn blades(&self) -> Result<Vec<Blade>, BmcError> {
            Ok(vec![
                Blade {
                    serial: "CZ0001".into(),
                    bmc_address: "0.0.0.0".into(),
                    blade_position: 1,
                    ..Default::default()
                },
                Blade {
                    serial: "[unknown]".into(),
                    bmc_address: "10.0.0.52".into(),
                    blade_position: 2,
                    ..Default::default()
                },
            ])
        }
        async fn storage_blades(&self) -> Result<Vec<StorageBlade>, BmcError> {
            Ok(vec![StorageBlade {
                serial: "sb0001".into(),
                blade_position: 3,
                blade_serial: "cz0001".into(),
                ..Default::default()
            }])
        }
        fn vendor(&self) -> Vendor {
            Vendor::Hp
        }
        fn address(&self) -> &str {
            &self.address
        }
    }

    struct FakeConnector {
        hardware_type: HardwareType,
        accepted: String,
        connects: AtomicUsize,
        calls: Calls,
    }

    impl FakeConnector {
        fn new(hardware_type: HardwareType, accepted: &str) -> Self {
            Self {
                hardware_type,
                accepted: accepted.to_string(),
                connects: AtomicUsize::new(0),
                calls: Calls::default(),
            }
        }
    }

    #[async_trait]
    impl BmcConnector for FakeConnector {
        async fn detect(&self, host: &str) -> Result<(Vendor, HardwareType), BmcError> {
            if host == "10.0.0.99" {
                return Err(BmcError::VendorUnknown(host.to_string()));
            }
            Ok((Vendor::Hp, self.hardware_type))
        }

        fn connect(
            &self,
            host: &str,
            _vendor: Vendor,
            hardware_type: HardwareType,
            credentials: &Credentials,
        ) -> Result<Connection, BmcError> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(match hardware_type {
                HardwareType::Chassis => Connection::Chassis(Box::new(FakeChassis {
                    address: host.to_string(),
                    calls: self.calls.clone(),
                })),
                _ => Connection::Server(Box::new(FakeServer {
                    address: host.to_string(),
                    blade: hardware_type == HardwareType::Blade,
                    power_kw: 0.2 + n as f64 / 10.0,
                    credentials: credentials.clone(),
                    accepted: self.accepted.clone(),
                    calls: self.calls.clone(),
                })),
            })
        }
    }

    fn config(try_default_credentials: bool) -> InventoryConfig {
        let mut config = InventoryConfig {
            url: "https://inventory.example.com/".into(),
            bmc_user: "inventory".into(),
            bmc_pass: "s3cret".into(),
            ..Default::default()
        };
        config.collector.try_default_credentials = try_default_credentials;
        config.collector.default.hp = Credentials::new("Administrator", "factory");
        config
    }

    fn service(
        connector: Arc<FakeConnector>,
        repository: Arc<SqliteInventoryRepository>,
        config: InventoryConfig,
    ) -> CollectionService {
        CollectionService::new(
            connector,
            repository,
            Arc::new(Notifier::disabled()),
            Arc::new(config),
        )
    }

    async fn scanned(
        repository: &SqliteInventoryRepository,
        ip: &str,
        protocol: &str,
        port: i64,
        state: &str,
    ) {
        repository
            .update_or_create(
                ScannedPort {
                    ip: ip.into(),
                    port,
                    protocol: protocol.into(),
                    state: state.into(),
                    scanned_by: "scanner01".into(),
                    cidr: "10.0.0.0/24".into(),
                    site: "ams4".into(),
                    ..Default::default()
                }
                .into(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_second_collection_of_unchanged_device_sends_no_notification() {
        let connector = Arc::new(FakeConnector::new(HardwareType::Discrete, "s3cret"));
        let repository = Arc::new(SqliteInventoryRepository::open_in_memory().unwrap());
        let collector = service(connector.clone(), repository.clone(), config(false));

        let first = collector.collect_host("10.0.0.5").await.unwrap();
        assert_eq!(first.serial, "czj1234567");
        assert_eq!(first.hardware_type, HardwareType::Discrete);
        assert_eq!(
            first.notifications,
            vec!["https://inventory.example.com/discretes/czj1234567"]
        );

        // power_kw differs between the two reads and is ignored
        let second = collector.collect_host("10.0.0.5").await.unwrap();
        assert!(second.notifications.is_empty());
        assert_eq!(connector.calls.logouts.load(Ordering::SeqCst), 2);

        let stored = repository
            .get_one(EntityKind::Discrete, &["czj1234567".to_string()])
            .await
            .unwrap();
        let Some(Entity::Discrete(discrete)) = stored else {
            panic!("discrete not stored");
        };
        assert!(discrete.bmc_auth);
        assert_eq!(discrete.memory_in_gb, 256);
        assert_eq!(discrete.bmc_licence_type, "iLO Advanced");
        assert!(discrete.bios_version.is_empty());
        assert_eq!(discrete.nics.len(), 1);
        assert_eq!(discrete.nics[0].discrete_serial, "czj1234567");
    }

    #[test]
    fn test_server_error_fails_the_device() {
        let missing: Result<i64, BmcError> = Err(BmcError::PageNotFound("/json/mem_info".into()));
        assert_eq!(optional(missing, "10.0.0.5", "memory"), Ok(0));

        let broken: Result<i64, BmcError> =
            Err(BmcError::RedFishEndPoint500("/redfish/v1/Systems/1".into()));
        assert_eq!(
            optional(broken, "10.0.0.5", "memory"),
            Err(BmcError::RedFishEndPoint500("/redfish/v1/Systems/1".into()))
        );
    }

    #[tokio::test]
    async fn test_chassis_skips_invalid_blade_serials() {
        let connector = Arc::new(FakeConnector::new(HardwareType::Chassis, "s3cret"));
        let repository = Arc::new(SqliteInventoryRepository::open_in_memory().unwrap());
        let collector = service(connector, repository.clone(), config(false));

        let outcome = collector.collect_host("10.0.0.10").await.unwrap();
        assert_eq!(outcome.serial, "cz3550fake");
        assert_eq!(outcome.notifications.len(), 3);

        let blades = repository
            .get_all_by_chassis(EntityKind::Blade, "cz3550fake")
            .await
            .unwrap();
        assert_eq!(blades.len(), 1);
        let Entity::Blade(blade) = &blades[0] else {
            panic!("expected a blade");
        };
        assert_eq!(blade.serial, "cz0001");
        assert_eq!(blade.bmc_address, "unassigned");
        assert!(!blade.bmc_web_reachable);
        assert!(!blade.bmc_ssh_reachable);
        assert!(!blade.bmc_ipmi_reachable);
        assert!(repository
            .get_one(EntityKind::Blade, &["[unknown]".to_string()])
            .await
            .unwrap()
            .is_none());

        let storage = repository
            .get_all_by_blade(EntityKind::StorageBlade, "cz0001")
            .await
            .unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_login_failure_retries_with_vendor_defaults() {
        let connector = Arc::new(FakeConnector::new(HardwareType::Blade, "factory"));
        let repository = Arc::new(SqliteInventoryRepository::open_in_memory().unwrap());
        let collector = service(connector.clone(), repository, config(true));

        let outcome = collector.collect_host("10.0.0.7").await.unwrap();
        assert_eq!(outcome.hardware_type, HardwareType::Blade);
        let logins = connector.calls.logins.lock().unwrap().clone();
        assert_eq!(
            logins,
            vec![
                Credentials::new("inventory", "s3cret"),
                Credentials::new("Administrator", "factory")
            ]
        );
    }

    #[tokio::test]
    async fn test_login_failure_without_defaults_skips_host() {
        let connector = Arc::new(FakeConnector::new(HardwareType::Blade, "factory"));
        let repository = Arc::new(SqliteInventoryRepository::open_in_memory().unwrap());
        let collector = service(connector.clone(), repository.clone(), config(false));

        let err = collector.collect_host("10.0.0.7").await.unwrap_err();
        assert_eq!(err, CollectError::Bmc(BmcError::LoginFailed));
        assert_eq!(connector.calls.logins.lock().unwrap().len(), 1);
        assert_eq!(
            repository.count(EntityKind::Blade, &Filters::new()).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_reachability_comes_from_scanned_ports() {
        let connector = Arc::new(FakeConnector::new(HardwareType::Discrete, "s3cret"));
        let repository = Arc::new(SqliteInventoryRepository::open_in_memory().unwrap());
        scanned(&repository, "10.0.0.5", "tcp", 22, "closed").await;
        scanned(&repository, "10.0.0.5", "tcp", 443, "open").await;
        scanned(&repository, "10.0.0.5", "ipmi", 623, "open").await;
        let collector = service(connector, repository.clone(), config(false));

        collector.collect_host("10.0.0.5").await.unwrap();
        let Some(Entity::Discrete(discrete)) = repository
            .get_one(EntityKind::Discrete, &["czj1234567".to_string()])
            .await
            .unwrap()
        else {
            panic!("discrete not stored");
        };
        assert!(!discrete.bmc_ssh_reachable);
        assert!(discrete.bmc_web_reachable);
        assert!(discrete.bmc_ipmi_reachable);
    }

    #[tokio::test]
    async fn test_collect_without_hosts_uses_open_https_ports() {
        let connector = Arc::new(FakeConnector::new(HardwareType::Discrete, "s3cret"));
        let repository = Arc::new(SqliteInventoryRepository::open_in_memory().unwrap());
        scanned(&repository, "10.0.0.5", "tcp", 443, "open").await;
        scanned(&repository, "10.0.0.6", "tcp", 443, "closed").await;
        scanned(&repository, "10.0.0.99", "tcp", 443, "open").await;
        let mut config = config(false);
        config.site = vec!["ams4".into()];
        let collector = service(connector, repository, config);

        let summary = collector.collect(Vec::new()).await.unwrap();
        assert_eq!(
            summary,
            CollectSummary {
                hosts: 2,
                collected: 1,
                failed: 1,
                notifications: 1
            }
        );
    }
}
