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

//! Dell M1000e CMC payloads
//!
//! The CMC mixes strings and numbers for the same keys across firmware
//! releases, so values are read through [`Value`] accessors.

use super::common::{
    dedupe_nics, lenient_f64, lenient_i64, normalize_bmc_address, normalize_mac,
    validate_serial, watts_to_kw,
};
use crate::domain::{Blade, Fan, Nic, Psu, StorageBlade, Vendor};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or_default(),
        Some(Value::String(s)) => lenient_f64(s),
        _ => 0.0,
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        other => number(other) != 0.0,
    }
}

/// CMC health code as a status word
fn health(code: &str) -> String {
    match code {
        "1" | "OK" => "OK",
        "2" | "3" => "Degraded",
        _ => "Critical",
    }
    .to_string()
}

/// Blade health, empty when the firmware does not report one
fn blade_health(blade: &Value) -> String {
    match text(blade.get("bladeHealth")).as_str() {
        "" => String::new(),
        code => health(code),
    }
}

/// Host part of an `https://10.0.0.5:443` style URL
fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    normalize_bmc_address(host)
}

/// `json?method=groupinfo` health blob of the local chassis
#[derive(Debug, Default, Clone)]
pub struct GroupInfo {
    chassis: Map<String, Value>,
    blades: Map<String, Value>,
    psus: Map<String, Value>,
    fans: Map<String, Value>,
    ioms: Map<String, Value>,
}

/// Parse `json?method=groupinfo`
///
/// # Arguments
/// * `json` - Raw response body
///
/// # Returns
/// * `Ok(GroupInfo)` - Health blob of the chassis
/// * `Err(String)` - Body is not JSON or carries no health blob
pub fn parse_group_info(json: &str) -> Result<GroupInfo, String> {
    let root: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let blob = root
        .get("0")
        .and_then(|member| member.get("ChassisGroupMemberHealthBlob"))
        .and_then(Value::as_object)
        .ok_or_else(|| "groupinfo carries no ChassisGroupMemberHealthBlob".to_string())?;

    let section = |name: &str| {
        blob.get(name)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    };

    Ok(GroupInfo {
        chassis: section("chassis_status"),
        blades: section("blades_status"),
        psus: section("psu_status"),
        fans: section("fans_status"),
        ioms: section("iom_status"),
    })
}

impl GroupInfo {
    pub fn serial(&self) -> String {
        text(self.chassis.get("RO_chassis_service_tag")).to_lowercase()
    }

    pub fn model(&self) -> String {
        text(self.chassis.get("RO_chassis_productname"))
    }

    pub fn name(&self) -> String {
        text(self.chassis.get("CHASSIS_name"))
    }

    pub fn fw_version(&self) -> String {
        text(self.chassis.get("RO_cmc_fw_version_string"))
    }

    pub fn status(&self) -> String {
        match text(self.chassis.get("CHASSIS_health")).as_str() {
            "" => "OK".to_string(),
            code => health(code),
        }
    }

    pub fn power_kw(&self) -> f64 {
        watts_to_kw(number(self.psus.get("acPower")))
    }

    pub fn is_psu_redundant(&self) -> bool {
        flag(self.psus.get("psuRedundancy"))
    }

    pub fn psu_redundancy_mode(&self) -> String {
        text(self.psus.get("psuRedundancyPolicy"))
    }

    pub fn power_supply_count(&self) -> usize {
        lenient_i64(&text(self.psus.get("psuCount"))).max(0) as usize
    }

    /// `10G` if any IO module is a 10G module, otherwise `1G`
    pub fn pass_thru(&self) -> String {
        let ten_gig = self
            .ioms
            .values()
            .any(|iom| text(iom.get("iomName")).contains("10G"));
        let speed = if ten_gig { "10G" } else { "1G" };
        speed.to_string()
    }

    fn numbered<'a>(section: &'a Map<String, Value>) -> impl Iterator<Item = (i64, &'a Value)> {
        section
            .iter()
            .filter_map(|(key, value)| key.parse::<i64>().ok().map(|n| (n, value)))
            .filter(|(_, value)| value.is_object())
    }

    pub fn psus(&self) -> Vec<Psu> {
        let chassis_serial = self.serial();
        Self::numbered(&self.psus)
            .filter(|(_, psu)| flag(psu.get("psuPresent")))
            .map(|(position, psu)| Psu {
                serial: validate_serial(&text(psu.get("psuSerialNum")))
                    .unwrap_or_else(|_| format!("{chassis_serial}_{position}")),
                capacity_kw: watts_to_kw(number(psu.get("psuCapacity"))),
                power_kw: watts_to_kw(number(psu.get("psuAcWatts"))),
                status: if flag(psu.get("psuActiveError")) {
                    "Error".to_string()
                } else {
                    "OK".to_string()
                },
                part_number: text(psu.get("psuPartNum")),
                position,
                chassis_serial: chassis_serial.clone(),
                ..Default::default()
            })
            .collect()
    }

    pub fn fans(&self) -> Vec<Fan> {
        let chassis_serial = self.serial();
        Self::numbered(&self.fans)
            .filter(|(_, fan)| flag(fan.get("FanPresent")))
            .map(|(position, fan)| Fan {
                serial: format!("{chassis_serial}_{position}"),
                status: match text(fan.get("FanActiveError")).as_str() {
                    "" | "No Errors" => "OK".to_string(),
                    other => other.to_string(),
                },
                position,
                current_rpm: number(fan.get("FanRPMTach1")) as i64,
                chassis_serial: chassis_serial.clone(),
                ..Default::default()
            })
            .collect()
    }

    fn present_blades(&self, storage: bool) -> impl Iterator<Item = (i64, &Value)> {
        Self::numbered(&self.blades).filter(move |(_, blade)| {
            flag(blade.get("bladePresent")) && flag(blade.get("isStorageBlade")) == storage
        })
    }

    fn blade_serial(blade: &Value) -> String {
        let tag = text(blade.get("bladeSvcTag"));
        if tag.is_empty() {
            text(blade.get("bladeSerialNum"))
        } else {
            tag
        }
    }

    fn position(slot: i64, blade: &Value) -> i64 {
        let master = number(blade.get("bladeMasterSlot")) as i64;
        if master > 0 {
            master
        } else {
            slot
        }
    }

    /// Present compute blades with a valid serial
    pub fn blades(&self) -> Vec<Blade> {
        let chassis_serial = self.serial();
        self.present_blades(false)
            .filter_map(|(slot, blade)| {
                let serial = match validate_serial(&Self::blade_serial(blade)) {
                    Ok(serial) => serial,
                    Err(e) => {
                        log::warn!("op=cmc_blades chassis={chassis_serial} slot={slot} skipping blade: {e}");
                        return None;
                    }
                };
                Some(Blade {
                    serial,
                    name: text(blade.get("bladeName")),
                    bios_version: text(blade.get("bladeBIOSver")),
                    bmc_type: "iDRAC".to_string(),
                    bmc_address: host_of(&text(blade.get("idracURL"))),
                    blade_position: Self::position(slot, blade),
                    model: text(blade.get("bladeModel")),
                    temp_c: number(blade.get("bladeTemperature")) as i64,
                    power_kw: watts_to_kw(number(blade.get("actualPwrConsump"))),
                    power_state: if flag(blade.get("bladePowerStatus")) {
                        "on".to_string()
                    } else {
                        "off".to_string()
                    },
                    status: blade_health(blade),
                    vendor: Vendor::Dell.to_string(),
                    chassis_serial: chassis_serial.clone(),
                    ..Default::default()
                })
            })
            .collect()
    }

    pub fn storage_blades(&self) -> Vec<StorageBlade> {
        let chassis_serial = self.serial();
        self.present_blades(true)
            .filter_map(|(slot, blade)| {
                Some(StorageBlade {
                    serial: validate_serial(&Self::blade_serial(blade)).ok()?,
                    fw_version: text(blade.get("bladeBIOSver")),
                    blade_position: Self::position(slot, blade),
                    model: text(blade.get("bladeModel")),
                    temp_c: number(blade.get("bladeTemperature")) as i64,
                    power_kw: watts_to_kw(number(blade.get("actualPwrConsump"))),
                    status: blade_health(blade),
                    vendor: Vendor::Dell.to_string(),
                    chassis_serial: chassis_serial.clone(),
                    ..Default::default()
                })
            })
            .collect()
    }
}

/// Ambient reading from `json?method=temp-sensors`
pub fn parse_temp_sensors(json: &str) -> Result<i64, String> {
    let root: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let reading = root
        .as_object()
        .into_iter()
        .flat_map(|sensors| sensors.values())
        .find_map(|sensor| sensor.get("TempCurrentValue"))
        .map(|v| number(Some(v)) as i64)
        .unwrap_or_default();
    Ok(reading)
}

/// Blade NICs by chassis slot from `json?method=blades-wwn-info`
pub fn parse_blade_nics(json: &str) -> Result<BTreeMap<i64, Vec<Nic>>, String> {
    let root: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let slots = root
        .pointer("/slot_mac_wwn/slot_mac_wwn_list")
        .and_then(Value::as_object)
        .ok_or_else(|| "blades-wwn-info carries no slot_mac_wwn_list".to_string())?;

    let mut nics = BTreeMap::new();
    for (slot, entry) in slots {
        let Ok(slot) = slot.parse::<i64>() else {
            continue;
        };
        let Some(single) = entry.get("is_not_double_height") else {
            continue;
        };
        if !flag(single.get("isInstalled")) {
            continue;
        }
        let macs: Vec<String> = match single.get("portPMAC") {
            Some(Value::Array(values)) => values.iter().map(|v| text(Some(v))).collect(),
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        let slot_nics = macs
            .iter()
            .enumerate()
            .map(|(i, mac)| Nic {
                mac_address: normalize_mac(mac),
                name: format!("port{}", i + 1),
                ..Default::default()
            })
            .collect();
        nics.insert(slot, dedupe_nics(slot_nics));
    }
    Ok(nics)
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_group_info_chassis_fields() {
        let info = parse_group_info(GROUP_INFO).unwrap();
        assert_eq!(info.serial(), "cx7k9q1");
        assert_eq!(info.model(), "PowerEdge M1000e");
        assert_eq!(info.name(), "cmc-ams4-01");
        assert_eq!(info.fw_version(), "6.10");
        assert_eq!(info.status(), "OK");
        assert!((info.power_kw() - 1.843).abs() < 1e-9);
        assert!(info.is_psu_redundant());
        assert_eq!(info.power_supply_count(), 2);
        assert_eq!(info.pass_thru(), "10G");
    }

    #[test]
    fn test_group_info_blades() {
        let info = parse_group_info(GROUP_INFO).unwrap();
        let blades = info.blades();
        assert_eq!(blades.len(), 1);
        assert_eq!(blades[0].serial, "8xkq4m2");
        assert_eq!(blades[0].bmc_address, "10.0.0.21");
        assert_eq!(blades[0].chassis_serial, "cx7k9q1");
        assert_eq!(blades[0].power_state, "on");
        assert_eq!(blades[0].status, "OK");

        let storage = info.storage_blades();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage[0].serial, "9trw3p1");
        assert_eq!(storage[0].blade_position, 2);
        assert_eq!(storage[0].status, "Degraded");
    }

    #[test]
    fn test_group_info_psus_and_fans() {
        let info = parse_group_info(GROUP_INFO).unwrap();
        let psus = info.psus();
        assert_eq!(psus.len(), 2);
        assert_eq!(psus[0].serial, "cx7k9q1_1");
        assert!((psus[0].capacity_kw - 2.7).abs() < 1e-9);

        let fans = info.fans();
        assert_eq!(fans[0].status, "OK");
        assert_eq!(fans[0].current_rpm, 5400);
    }

    #[test]
    fn test_blade_without_health_leaves_status_empty() {
        let info = parse_group_info(
            r#"{"0":{"ChassisGroupMemberHealthBlob":{
                "chassis_status":{"RO_chassis_service_tag":"CX7K9Q1"},
                "blades_status":{"1":{"bladePresent":1,"isStorageBlade":0,"bladeSvcTag":"8XKQ4M2"}}
            }}}"#,
        )
        .unwrap();
        let blades = info.blades();
        assert_eq!(blades[0].serial, "8xkq4m2");
        assert!(blades[0].status.is_empty());
        assert_eq!(info.status(), "OK");
    }

    #[test]
    fn test_missing_blob_is_error() {
        assert!(parse_group_info(r#"{"0":{}}"#).is_err());
    }

    #[test]
    fn test_blade_nics() {
        let nics = parse_blade_nics(WWN_INFO).unwrap();
        assert_eq!(nics.len(), 1);
        assert_eq!(nics[&1][1].mac_address, "24:6e:96:00:aa:02");
    }

    #[test]
    fn test_temp_sensors() {
        assert_eq!(
            parse_temp_sensors(r#"{"1":{"TempCurrentValue":24,"Name":"Ambient Temp"}}"#).unwrap(),
            24
        );
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://10.0.0.21:443"), "10.0.0.21");
        assert_eq!(host_of(""), "unassigned");
    }
}
