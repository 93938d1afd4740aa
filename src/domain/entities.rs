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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chassis enclosure hosting blades (root aggregate of a chassis collection)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Chassis {
    /// Chassis serial number (lowercase)
    pub serial: String,
    /// Chassis name as configured on the controller
    pub name: String,
    /// Address of the chassis controller
    pub bmc_address: String,
    /// Controller answers on tcp/22
    pub bmc_ssh_reachable: bool,
    /// Controller answers on tcp/443
    pub bmc_web_reachable: bool,
    /// Controller answers on udp/623
    pub bmc_ipmi_reachable: bool,
    /// Login with the configured credentials succeeded
    pub bmc_auth: bool,
    /// Server blades
    pub blades: Vec<Blade>,
    /// Storage blades
    pub storage_blades: Vec<StorageBlade>,
    /// Controller NICs
    pub nics: Vec<Nic>,
    /// Power supplies
    pub psus: Vec<Psu>,
    /// Fans
    pub fans: Vec<Fan>,
    /// Ambient temperature in Celsius
    pub temp_c: i64,
    /// PSU redundancy mode as reported by the controller
    pub psu_redundancy_mode: String,
    /// PSUs run in a redundant configuration
    pub is_psu_redundant: bool,
    /// Interconnect type, `1G` or `10G`
    pub pass_thru: String,
    /// Overall health
    pub status: String,
    /// Power draw in kW
    pub power_kw: f64,
    /// Product model
    pub model: String,
    /// Hardware vendor
    pub vendor: String,
    /// Controller firmware version
    pub fw_version: String,
    /// Last write to the repository
    pub updated_at: DateTime<Utc>,
}

/// Server module occupying one chassis slot
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Blade {
    pub serial: String,
    pub name: String,
    pub bios_version: String,
    pub bmc_type: String,
    pub bmc_address: String,
    pub bmc_version: String,
    pub bmc_licence_type: String,
    pub bmc_licence_status: String,
    pub bmc_ssh_reachable: bool,
    pub bmc_web_reachable: bool,
    pub bmc_ipmi_reachable: bool,
    pub bmc_auth: bool,
    pub disks: Vec<Disk>,
    pub nics: Vec<Nic>,
    /// Chassis slot number
    pub blade_position: i64,
    pub model: String,
    pub temp_c: i64,
    pub power_kw: f64,
    pub power_state: String,
    pub status: String,
    pub vendor: String,
    /// Back-reference to the owning chassis; empty when orphaned
    pub chassis_serial: String,
    pub processor: String,
    pub processor_count: i64,
    pub processor_core_count: i64,
    pub processor_thread_count: i64,
    pub memory_in_gb: i64,
    pub updated_at: DateTime<Utc>,
}

/// Storage module occupying one chassis slot
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageBlade {
    pub serial: String,
    pub fw_version: String,
    pub blade_position: i64,
    pub model: String,
    pub temp_c: i64,
    pub power_kw: f64,
    pub status: String,
    pub vendor: String,
    pub chassis_serial: String,
    /// Compute blade this storage blade is attached to
    pub blade_serial: String,
    pub updated_at: DateTime<Utc>,
}

/// Standalone server
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Discrete {
    pub serial: String,
    pub name: String,
    pub bios_version: String,
    pub bmc_type: String,
    pub bmc_address: String,
    pub bmc_version: String,
    pub bmc_licence_type: String,
    pub bmc_licence_status: String,
    pub bmc_ssh_reachable: bool,
    pub bmc_web_reachable: bool,
    pub bmc_ipmi_reachable: bool,
    pub bmc_auth: bool,
    pub disks: Vec<Disk>,
    pub nics: Vec<Nic>,
    pub psus: Vec<Psu>,
    pub model: String,
    pub temp_c: i64,
    pub power_kw: f64,
    pub power_state: String,
    pub status: String,
    pub vendor: String,
    pub processor: String,
    pub processor_count: i64,
    pub processor_core_count: i64,
    pub processor_thread_count: i64,
    pub memory_in_gb: i64,
    pub updated_at: DateTime<Utc>,
}

/// Network interface; exactly one owner serial is set
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Nic {
    pub mac_address: String,
    pub name: String,
    pub speed: String,
    pub blade_serial: String,
    pub discrete_serial: String,
    pub chassis_serial: String,
    pub updated_at: DateTime<Utc>,
}

/// Physical disk
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Disk {
    pub serial: String,
    pub status: String,
    pub disk_type: String,
    pub size: String,
    pub model: String,
    pub location: String,
    pub fw_version: String,
    pub blade_serial: String,
    pub discrete_serial: String,
    pub updated_at: DateTime<Utc>,
}

/// Power supply
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Psu {
    pub serial: String,
    pub capacity_kw: f64,
    pub power_kw: f64,
    pub status: String,
    pub part_number: String,
    pub position: i64,
    pub chassis_serial: String,
    pub discrete_serial: String,
    pub updated_at: DateTime<Utc>,
}

/// Chassis fan
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Fan {
    pub serial: String,
    pub status: String,
    pub position: i64,
    pub model: String,
    pub current_rpm: i64,
    pub power_kw: f64,
    pub chassis_serial: String,
    pub updated_at: DateTime<Utc>,
}

/// Result of one probe, keyed by `(ip, port, protocol, scanned_by)`
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ScannedPort {
    pub ip: String,
    pub port: i64,
    pub protocol: String,
    pub state: String,
    /// Hostname of the scanner that produced the row
    pub scanned_by: String,
    pub cidr: String,
    pub site: String,
    pub updated_at: DateTime<Utc>,
}

/// Subnet selected from the DHCP configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteSubnet {
    pub cidr: String,
    pub site: String,
}

/// Hardware vendors with a dedicated driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    #[serde(rename = "HP")]
    Hp,
    Dell,
    Supermicro,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Hp => "HP",
            Vendor::Dell => "Dell",
            Vendor::Supermicro => "Supermicro",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical form of the device behind a BMC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareType {
    Chassis,
    Blade,
    Discrete,
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareType::Chassis => write!(f, "chassis"),
            HardwareType::Blade => write!(f, "blade"),
            HardwareType::Discrete => write!(f, "discrete"),
        }
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Open,
    Closed,
    Unsupported,
}

impl ProbeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeState::Open => "open",
            ProbeState::Closed => "closed",
            ProbeState::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe protocols understood by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Ipmi,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Ipmi => "ipmi",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "ipmi" => Ok(Protocol::Ipmi),
            other => Err(format!("unsupported protocol: {other}")),
        }
    }
}

/// Fixed scan profiles: ssh, https and ipmi
pub const SCAN_PROFILES: [(Protocol, u16); 3] =
    [(Protocol::Tcp, 22), (Protocol::Tcp, 443), (Protocol::Ipmi, 623)];

/// CPU summary returned by server drivers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuSummary {
    pub name: String,
    pub sockets: i64,
    pub cores: i64,
    pub threads: i64,
}

/// BMC license summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseInfo {
    pub name: String,
    pub status: String,
}

/// Targets of a scan pass
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// CIDRs to scan, `all` selects every subnet of the selected sites
    pub cidrs: Vec<String>,
    /// Sites to scan, `all` selects every site
    pub sites: Vec<String>,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            cidrs: vec!["all".to_string()],
            sites: vec!["all".to_string()],
        }
    }
}

/// Result of a scan pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub subnets: usize,
    pub hosts: usize,
    pub probes: usize,
    pub open: usize,
}

/// Result of collecting one host
#[derive(Debug, Clone, PartialEq)]
pub struct CollectOutcome {
    pub host: String,
    pub vendor: Vendor,
    pub hardware_type: HardwareType,
    /// Serial of the root device (chassis or server)
    pub serial: String,
    /// Callback URLs of the devices that changed
    pub notifications: Vec<String>,
}

/// Result of a collection pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectSummary {
    pub hosts: usize,
    pub collected: usize,
    pub failed: usize,
    pub notifications: usize,
}

/// Every persisted entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Chassis,
    Blade,
    StorageBlade,
    Discrete,
    Nic,
    Disk,
    Psu,
    Fan,
    ScannedPort,
}

impl EntityKind {
    /// Route segment used in change callbacks
    pub fn route(&self) -> &'static str {
        match self {
            EntityKind::Chassis => "chassis",
            EntityKind::Blade => "blades",
            EntityKind::StorageBlade => "storage_blades",
            EntityKind::Discrete => "discretes",
            EntityKind::Nic => "nics",
            EntityKind::Disk => "disks",
            EntityKind::Psu => "psus",
            EntityKind::Fan => "fans",
            EntityKind::ScannedPort => "scanned_ports",
        }
    }
}

/// A stored entity of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Chassis(Chassis),
    Blade(Blade),
    StorageBlade(StorageBlade),
    Discrete(Discrete),
    Nic(Nic),
    Disk(Disk),
    Psu(Psu),
    Fan(Fan),
    ScannedPort(ScannedPort),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Chassis(_) => EntityKind::Chassis,
            Entity::Blade(_) => EntityKind::Blade,
            Entity::StorageBlade(_) => EntityKind::StorageBlade,
            Entity::Discrete(_) => EntityKind::Discrete,
            Entity::Nic(_) => EntityKind::Nic,
            Entity::Disk(_) => EntityKind::Disk,
            Entity::Psu(_) => EntityKind::Psu,
            Entity::Fan(_) => EntityKind::Fan,
            Entity::ScannedPort(_) => EntityKind::ScannedPort,
        }
    }
}

macro_rules! entity_conversions {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }

            impl TryFrom<Entity> for $variant {
                type Error = Entity;

                fn try_from(value: Entity) -> Result<Self, Self::Error> {
                    match value {
                        Entity::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

entity_conversions!(Chassis, Blade, StorageBlade, Discrete, Nic, Disk, Psu, Fan, ScannedPort);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_round_trip_through_enum() {
        let blade = Blade {
            serial: "cz3512xx".to_string(),
            ..Default::default()
        };
        let entity: Entity = blade.clone().into();
        assert_eq!(entity.kind(), EntityKind::Blade);
        assert_eq!(Blade::try_from(entity).unwrap(), blade);
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("ipmi".parse::<Protocol>().unwrap(), Protocol::Ipmi);
        assert!("udp".parse::<Protocol>().is_err());
    }
}
