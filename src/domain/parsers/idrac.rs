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

//! Dell iDRAC payloads: login and hardware inventory XML, sysmgmt JSON telemetry

use super::common::{
    bytes_to_human_readable, dedupe_nics, lenient_f64, lenient_i64, normalize_mac,
    parse_key_value, threads_from_cores, validate_serial, watts_to_kw,
};
use crate::domain::{CpuSummary, Disk, LicenseInfo, Nic, Psu};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Response of `POST /data/login`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginResponse {
    #[serde(rename = "authResult")]
    pub auth_result: String,
    #[serde(rename = "forwardUrl")]
    pub forward_url: String,
}

/// Session tokens carried by the login forward URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTokens {
    pub st1: String,
    pub st2: String,
}

pub fn parse_login(xml: &str) -> Result<LoginResponse, String> {
    quick_xml::de::from_str(xml).map_err(|e| e.to_string())
}

impl LoginResponse {
    /// `authResult` 0 is success, anything else a rejected login
    pub fn succeeded(&self) -> bool {
        self.auth_result.trim() == "0"
    }

    /// Extract `ST1` and `ST2` from `index.html?ST1=x,ST2=y`
    pub fn tokens(&self) -> Option<SessionTokens> {
        let (_, query) = self.forward_url.split_once('?')?;
        let mut tokens = SessionTokens::default();
        for pair in query.split(',') {
            match parse_key_value(pair, '=') {
                Ok((key, value)) if key == "ST1" => tokens.st1 = value,
                Ok((key, value)) if key == "ST2" => tokens.st2 = value,
                _ => {}
            }
        }
        if tokens.st2.is_empty() {
            None
        } else {
            Some(tokens)
        }
    }
}

/// `sysmgmt/2012/server/inventory/hardware`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Inventory {
    #[serde(rename = "Component")]
    pub components: Vec<Component>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Component {
    #[serde(rename = "@Classname")]
    pub classname: String,
    #[serde(rename = "@Key")]
    pub key: String,
    #[serde(rename = "PROPERTY")]
    pub properties: Vec<Property>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Property {
    #[serde(rename = "@NAME")]
    pub name: String,
    #[serde(rename = "VALUE")]
    pub value: String,
}

impl Component {
    /// Trimmed value of a property, empty when absent
    pub fn get(&self, name: &str) -> String {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.trim().to_string())
            .unwrap_or_default()
    }
}

pub fn parse_inventory(xml: &str) -> Result<Inventory, String> {
    let inventory: Inventory = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;
    if inventory.components.is_empty() {
        return Err("inventory carries no Component".to_string());
    }
    Ok(inventory)
}

/// DCIM primary status code to text
fn primary_status(code: &str) -> String {
    match code {
        "1" => "OK",
        "2" => "Degraded",
        "3" => "Error",
        _ => "Unknown",
    }
    .to_string()
}

/// Trailing slot number of an FQDD such as `PSU.Slot.2`
fn slot_of(fqdd: &str) -> i64 {
    fqdd.rsplit('.').next().map(lenient_i64).unwrap_or_default()
}

impl Inventory {
    pub fn components<'a>(&'a self, classname: &'a str) -> impl Iterator<Item = &'a Component> {
        self.components
            .iter()
            .filter(move |c| c.classname == classname)
    }

    fn system(&self) -> Option<&Component> {
        self.components("DCIM_SystemView").next()
    }

    fn system_value(&self, name: &str) -> String {
        self.system().map(|c| c.get(name)).unwrap_or_default()
    }

    pub fn serial(&self) -> String {
        self.system_value("ServiceTag").to_lowercase()
    }

    pub fn model(&self) -> String {
        self.system_value("Model")
    }

    pub fn name(&self) -> String {
        self.system_value("HostName")
    }

    pub fn bios_version(&self) -> String {
        self.system_value("BIOSVersionString")
    }

    pub fn status(&self) -> String {
        primary_status(&self.system_value("PrimaryStatus"))
    }

    pub fn bmc_version(&self) -> String {
        self.components("DCIM_iDRACCardView")
            .next()
            .map(|c| c.get("FirmwareVersion"))
            .unwrap_or_default()
    }

    /// Blade servers report a `PowerEdge M` model
    pub fn is_blade(&self) -> bool {
        self.model().starts_with("PowerEdge M")
    }

    pub fn nics(&self) -> Vec<Nic> {
        let nics = self
            .components("DCIM_NICView")
            .map(|c| {
                let mac = c.get("PermanentMACAddress");
                let mac = if mac.is_empty() {
                    c.get("CurrentMACAddress")
                } else {
                    mac
                };
                Nic {
                    mac_address: normalize_mac(&mac),
                    name: c.key.trim().to_string(),
                    speed: c.get("LinkSpeed"),
                    ..Default::default()
                }
            })
            .collect();
        dedupe_nics(nics)
    }

    pub fn disks(&self) -> Vec<Disk> {
        self.components("DCIM_PhysicalDiskView")
            .filter_map(|c| {
                let media = match c.get("MediaType").as_str() {
                    "1" => "SSD",
                    _ => "HDD",
                };
                let size = c
                    .get("SizeInBytes")
                    .parse::<u64>()
                    .map(bytes_to_human_readable)
                    .unwrap_or_default();
                Some(Disk {
                    serial: validate_serial(&c.get("SerialNumber")).ok()?,
                    status: primary_status(&c.get("PrimaryStatus")),
                    disk_type: media.to_string(),
                    size,
                    model: c.get("Model"),
                    location: c.key.trim().to_string(),
                    fw_version: c.get("Revision"),
                    ..Default::default()
                })
            })
            .collect()
    }

    pub fn psus(&self, parent_serial: &str) -> Vec<Psu> {
        self.components("DCIM_PowerSupplyView")
            .map(|c| {
                let position = slot_of(&c.key);
                Psu {
                    serial: validate_serial(&c.get("SerialNumber"))
                        .unwrap_or_else(|_| format!("{parent_serial}_{position}")),
                    capacity_kw: watts_to_kw(lenient_f64(&c.get("TotalOutputPower"))),
                    status: primary_status(&c.get("PrimaryStatus")),
                    part_number: c.get("PartNumber"),
                    position,
                    ..Default::default()
                }
            })
            .collect()
    }

    /// CPU summary from `DCIM_CPUView`, used when the processor endpoint is absent
    pub fn cpu(&self) -> CpuSummary {
        let cpus: Vec<&Component> = self.components("DCIM_CPUView").collect();
        let Some(first) = cpus.first() else {
            return CpuSummary::default();
        };
        CpuSummary {
            name: first.get("Model"),
            sockets: cpus.len() as i64,
            cores: lenient_i64(&first.get("NumberOfProcessorCores")),
            threads: lenient_i64(&first.get("NumberOfEnabledThreads")),
        }
    }
}

/// `sysmgmt/2012/server/memory`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemoryResponse {
    #[serde(rename = "Memory")]
    pub memory: MemoryCapacity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemoryCapacity {
    /// MB
    pub capacity: i64,
}

impl MemoryResponse {
    pub fn gigabytes(&self) -> i64 {
        self.memory.capacity / 1024
    }
}

/// `sysmgmt/2012/server/processor`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProcessorResponse {
    #[serde(rename = "Processor")]
    pub processors: BTreeMap<String, DellProcessor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DellProcessor {
    pub brand: String,
    pub core_count: i64,
    pub hyperthreading: Vec<HyperThreading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HyperThreading {
    pub capable: Value,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().unwrap_or(0) != 0,
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

impl ProcessorResponse {
    pub fn summary(&self) -> CpuSummary {
        let Some(first) = self.processors.values().next() else {
            return CpuSummary::default();
        };
        let hyperthreading = first.hyperthreading.iter().any(|ht| truthy(&ht.capable));
        CpuSummary {
            name: first.brand.trim().to_string(),
            sockets: self.processors.len() as i64,
            cores: first.core_count,
            threads: threads_from_cores(first.core_count, hyperthreading),
        }
    }
}

/// `sysmgmt/2012/server/temperature`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemperatureResponse {
    #[serde(rename = "Temperatures")]
    pub temperatures: BTreeMap<String, Reading>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Reading {
    pub reading: f64,
}

impl TemperatureResponse {
    /// System board inlet reading
    pub fn inlet(&self) -> i64 {
        self.temperatures
            .iter()
            .find(|(name, _)| name.contains("SystemBoardInletTemp"))
            .map(|(_, r)| r.reading as i64)
            .unwrap_or_default()
    }
}

/// `sysmgmt/2012/server/license`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LicenseResponse {
    #[serde(rename = "License")]
    pub license: BTreeMap<String, Value>,
}

impl LicenseResponse {
    /// Virtual console entitlement implies an Enterprise license
    pub fn info(&self) -> LicenseInfo {
        if self.license.get("VCONSOLE").map(truthy).unwrap_or(false) {
            LicenseInfo {
                name: "Enterprise".to_string(),
                status: "Licensed".to_string(),
            }
        } else {
            LicenseInfo {
                name: "-".to_string(),
                status: "Unlicensed".to_string(),
            }
        }
    }
}

/// `data?get=powermonitordata`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerMonitorRoot {
    #[serde(rename = "powermonitordata")]
    pub data: PowerMonitorData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerMonitorData {
    #[serde(rename = "presentReading")]
    pub present: PresentReading,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PresentReading {
    pub reading: InnerReading,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InnerReading {
    /// Watts
    pub reading: String,
}

/// Present draw in kW
pub fn parse_power_monitor(xml: &str) -> Result<f64, String> {
    let root: PowerMonitorRoot = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;
    Ok(watts_to_kw(lenient_f64(&root.data.present.reading.reading)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PowerStateRoot {
    #[serde(rename = "pwState")]
    state: String,
}

/// `data?get=pwState`: `1` on, `0` off
pub fn parse_power_state(xml: &str) -> Result<String, String> {
    let root: PowerStateRoot = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;
    match root.state.trim() {
        "1" => Ok("on".to_string()),
        "0" => Ok("off".to_string()),
        other => Err(format!("unexpected pwState {other:?}")),
    }
}
