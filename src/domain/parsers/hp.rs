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

//! HP payloads: `/xmldata?item=all` (BladeSystem and iLO) and the iLO JSON API

use super::common::{
    bmc_type_from_product, dedupe_nics, lenient_f64, lenient_i64, normalize_bmc_address,
    normalize_mac, strip_op_status, validate_serial, watts_to_kw,
};
use crate::domain::{
    Blade, CpuSummary, Disk, Fan, HardwareType, LicenseInfo, Nic, Psu, StorageBlade, Vendor,
};
use serde::Deserialize;

/// Root of `/xmldata?item=all`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Rimp {
    #[serde(rename = "HSI")]
    pub hsi: Option<Hsi>,
    #[serde(rename = "MP")]
    pub mp: Option<Mp>,
    #[serde(rename = "BLADESYSTEM")]
    pub blade_system: Option<BladeSystem>,
    #[serde(rename = "INFRA2")]
    pub infra2: Option<Infra2>,
}

/// Host system information
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Hsi {
    #[serde(rename = "SBSN")]
    pub serial: String,
    #[serde(rename = "SPN")]
    pub product_name: String,
    #[serde(rename = "NICS")]
    pub nics: Option<HsiNics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HsiNics {
    #[serde(rename = "NIC")]
    pub nics: Vec<HsiNic>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HsiNic {
    #[serde(rename = "PORT")]
    pub port: String,
    #[serde(rename = "DESCRIPTION")]
    pub description: String,
    #[serde(rename = "MACADDR")]
    pub mac_address: String,
    #[serde(rename = "STATUS")]
    pub status: String,
}

/// Management processor
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Mp {
    #[serde(rename = "PN")]
    pub product_name: String,
    #[serde(rename = "FWRI")]
    pub fw_version: String,
}

/// Present when the server sits in a BladeSystem enclosure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BladeSystem {
    #[serde(rename = "BAY")]
    pub bay: String,
}

/// BladeSystem Onboard Administrator view of the enclosure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Infra2 {
    #[serde(rename = "ENCL")]
    pub name: String,
    #[serde(rename = "ENCL_SN")]
    pub serial: String,
    #[serde(rename = "PN")]
    pub product_name: String,
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "TEMPS")]
    pub temps: Option<Temps>,
    #[serde(rename = "POWER")]
    pub power: Option<EnclosurePower>,
    #[serde(rename = "FANS")]
    pub fans: Option<Fans>,
    #[serde(rename = "BLADES")]
    pub blades: Option<Blades>,
    #[serde(rename = "SWITCHES")]
    pub switches: Option<Switches>,
    #[serde(rename = "MANAGERS")]
    pub managers: Option<Managers>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Bay {
    #[serde(rename = "CONNECTION")]
    pub connection: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Temps {
    #[serde(rename = "TEMP")]
    pub temps: Vec<Temp>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Temp {
    #[serde(rename = "DESC")]
    pub description: String,
    #[serde(rename = "C")]
    pub celsius: String,
}

impl Temps {
    /// Ambient sensor if present, otherwise the first sensor
    fn ambient(&self) -> i64 {
        self.temps
            .iter()
            .find(|t| t.description.eq_ignore_ascii_case("AMBIENT"))
            .or_else(|| self.temps.first())
            .map(|t| lenient_i64(&t.celsius))
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnclosurePower {
    #[serde(rename = "POWER_CONSUMED")]
    pub consumed: String,
    #[serde(rename = "REDUNDANCY")]
    pub redundancy: String,
    #[serde(rename = "REDUNDANCY_MODE")]
    pub redundancy_mode: String,
    #[serde(rename = "POWERSUPPLY")]
    pub supplies: Vec<PowerSupply>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerSupply {
    #[serde(rename = "BAY")]
    pub bay: Bay,
    #[serde(rename = "SN")]
    pub serial: String,
    #[serde(rename = "PN")]
    pub part_number: String,
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "ACTUALOUTPUT")]
    pub actual_output: String,
    #[serde(rename = "CAPACITY")]
    pub capacity: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Fans {
    #[serde(rename = "FAN")]
    pub fans: Vec<EnclosureFan>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnclosureFan {
    #[serde(rename = "BAY")]
    pub bay: Bay,
    #[serde(rename = "PN")]
    pub part_number: String,
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "RPM_CUR")]
    pub rpm: String,
    #[serde(rename = "PWR_USED")]
    pub power_used: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Blades {
    #[serde(rename = "BLADE")]
    pub blades: Vec<EnclosureBlade>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnclosureBlade {
    #[serde(rename = "BAY")]
    pub bay: Bay,
    #[serde(rename = "MGMTIPADDR")]
    pub bmc_address: String,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "SPN")]
    pub product_name: String,
    #[serde(rename = "BSN")]
    pub serial: String,
    #[serde(rename = "TYPE")]
    pub kind: String,
    #[serde(rename = "STATUS")]
    pub status: String,
    #[serde(rename = "POWER")]
    pub power: BladePower,
    #[serde(rename = "TEMPS")]
    pub temps: Option<Temps>,
    #[serde(rename = "BLADEROMVER")]
    pub rom_version: String,
    #[serde(rename = "MGMTPN")]
    pub bmc_product_name: String,
    #[serde(rename = "MGMTFWVERSION")]
    pub bmc_fw_version: String,
    #[serde(rename = "ASSOCIATEDBLADE")]
    pub associated_blade: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BladePower {
    #[serde(rename = "POWERSTATE")]
    pub state: String,
    #[serde(rename = "POWER_CONSUMED")]
    pub consumed: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Switches {
    #[serde(rename = "SWITCH")]
    pub switches: Vec<Switch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Switch {
    #[serde(rename = "SPN")]
    pub product_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Managers {
    #[serde(rename = "MANAGER")]
    pub managers: Vec<Manager>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Manager {
    #[serde(rename = "BAY")]
    pub bay: Bay,
    #[serde(rename = "ROLE")]
    pub role: String,
    #[serde(rename = "MACADDR")]
    pub mac_address: String,
    #[serde(rename = "FWRI")]
    pub fw_version: String,
}

/// Parse `/xmldata?item=all`
///
/// # Arguments
/// * `xml` - Raw response body
///
/// # Returns
/// * `Ok(Rimp)` - Parsed document
/// * `Err(String)` - Body is not an HP xmldata document
pub fn parse_xmldata(xml: &str) -> Result<Rimp, String> {
    let rimp: Rimp = quick_xml::de::from_str(xml).map_err(|e| e.to_string())?;
    if rimp.hsi.is_none() && rimp.mp.is_none() && rimp.infra2.is_none() {
        return Err("xmldata carries neither HSI, MP nor INFRA2".to_string());
    }
    Ok(rimp)
}

impl Rimp {
    /// Classify the device behind the xmldata endpoint
    pub fn hardware_type(&self) -> Option<HardwareType> {
        if self.infra2.is_some() {
            Some(HardwareType::Chassis)
        } else if self.blade_system.is_some() {
            Some(HardwareType::Blade)
        } else if self.mp.is_some() {
            Some(HardwareType::Discrete)
        } else {
            None
        }
    }

    pub fn serial(&self) -> String {
        self.hsi
            .as_ref()
            .map(|h| h.serial.trim().to_lowercase())
            .unwrap_or_default()
    }

    pub fn model(&self) -> String {
        self.hsi
            .as_ref()
            .map(|h| h.product_name.trim().to_string())
            .unwrap_or_default()
    }

    pub fn bmc_type(&self) -> String {
        self.mp
            .as_ref()
            .map(|mp| bmc_type_from_product(&mp.product_name))
            .unwrap_or_default()
    }

    pub fn bmc_version(&self) -> String {
        self.mp
            .as_ref()
            .map(|mp| mp.fw_version.trim().to_string())
            .unwrap_or_default()
    }

    /// Host NICs, the iLO port excluded
    pub fn nics(&self) -> Vec<Nic> {
        let nics = self
            .hsi
            .as_ref()
            .and_then(|h| h.nics.as_ref())
            .map(|n| {
                n.nics
                    .iter()
                    .filter(|nic| !nic.description.starts_with("iLO"))
                    .map(|nic| Nic {
                        mac_address: normalize_mac(&nic.mac_address),
                        name: nic.description.trim().to_string(),
                        ..Default::default()
                    })
                    .collect()
            })
            .unwrap_or_default();
        dedupe_nics(nics)
    }

    pub fn is_blade(&self) -> bool {
        self.blade_system.is_some()
    }
}

impl Infra2 {
    pub fn serial(&self) -> String {
        self.serial.trim().to_lowercase()
    }

    pub fn model(&self) -> String {
        self.product_name.trim().to_string()
    }

    pub fn name(&self) -> String {
        self.name.trim().to_string()
    }

    pub fn status(&self) -> String {
        self.status.trim().to_string()
    }

    fn active_manager(&self) -> Option<&Manager> {
        let managers = self.managers.as_ref()?;
        managers
            .managers
            .iter()
            .find(|m| m.role.eq_ignore_ascii_case("ACTIVE"))
            .or_else(|| managers.managers.first())
    }

    pub fn fw_version(&self) -> String {
        self.active_manager()
            .map(|m| m.fw_version.trim().to_string())
            .unwrap_or_default()
    }

    /// Onboard Administrator NIC of the active manager
    pub fn nics(&self) -> Vec<Nic> {
        let chassis_serial = self.serial();
        let nics = self
            .active_manager()
            .map(|m| Nic {
                mac_address: normalize_mac(&m.mac_address),
                name: "OA1".to_string(),
                chassis_serial,
                ..Default::default()
            })
            .into_iter()
            .collect();
        dedupe_nics(nics)
    }

    pub fn power_kw(&self) -> f64 {
        self.power
            .as_ref()
            .map(|p| watts_to_kw(lenient_f64(&p.consumed)))
            .unwrap_or_default()
    }

    pub fn temp_c(&self) -> i64 {
        self.temps.as_ref().map(Temps::ambient).unwrap_or_default()
    }

    pub fn psu_redundancy_mode(&self) -> String {
        self.power
            .as_ref()
            .map(|p| p.redundancy_mode.trim().to_string())
            .unwrap_or_default()
    }

    pub fn is_psu_redundant(&self) -> bool {
        self.power
            .as_ref()
            .map(|p| p.redundancy.trim().eq_ignore_ascii_case("REDUNDANT"))
            .unwrap_or(false)
    }

    /// `10G` if any interconnect is a 10G module, otherwise `1G`
    pub fn pass_thru(&self) -> String {
        let ten_gig = self
            .switches
            .as_ref()
            .map(|s| s.switches.iter().any(|sw| sw.product_name.contains("10G")))
            .unwrap_or(false);
        let speed = if ten_gig { "10G" } else { "1G" };
        speed.to_string()
    }

    pub fn power_supply_count(&self) -> usize {
        self.power.as_ref().map(|p| p.supplies.len()).unwrap_or(0)
    }

    pub fn psus(&self) -> Vec<Psu> {
        let chassis_serial = self.serial();
        let Some(power) = self.power.as_ref() else {
            return Vec::new();
        };
        power
            .supplies
            .iter()
            .map(|ps| {
                let position = lenient_i64(&ps.bay.connection);
                let serial = validate_serial(&ps.serial)
                    .unwrap_or_else(|_| format!("{chassis_serial}_{position}"));
                Psu {
                    serial,
                    capacity_kw: watts_to_kw(lenient_f64(&ps.capacity)),
                    power_kw: watts_to_kw(lenient_f64(&ps.actual_output)),
                    status: ps.status.trim().to_string(),
                    part_number: ps.part_number.trim().to_string(),
                    position,
                    chassis_serial: chassis_serial.clone(),
                    ..Default::default()
                }
            })
            .collect()
    }

    pub fn fans(&self) -> Vec<Fan> {
        let chassis_serial = self.serial();
        let Some(fans) = self.fans.as_ref() else {
            return Vec::new();
        };
        fans.fans
            .iter()
            .map(|fan| {
                let position = lenient_i64(&fan.bay.connection);
                Fan {
                    serial: format!("{chassis_serial}_{position}"),
                    status: fan.status.trim().to_string(),
                    position,
                    model: fan.part_number.trim().to_string(),
                    current_rpm: lenient_i64(&fan.rpm),
                    power_kw: watts_to_kw(lenient_f64(&fan.power_used)),
                    chassis_serial: chassis_serial.clone(),
                    ..Default::default()
                }
            })
            .collect()
    }

    fn blades_of_type<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a EnclosureBlade> {
        self.blades
            .iter()
            .flat_map(|b| b.blades.iter())
            .filter(move |b| b.kind.trim().eq_ignore_ascii_case(kind))
    }

    /// Server blades with a valid serial; blades with placeholder serials are skipped
    pub fn blades(&self) -> Vec<Blade> {
        let chassis_serial = self.serial();
        self.blades_of_type("SERVER")
            .filter_map(|b| {
                let serial = match validate_serial(&b.serial) {
                    Ok(serial) => serial,
                    Err(e) => {
                        log::warn!(
                            "op=hp_blades chassis={chassis_serial} bay={} skipping blade: {e}",
                            b.bay.connection
                        );
                        return None;
                    }
                };
                Some(Blade {
                    serial,
                    name: b.name.trim().to_string(),
                    bios_version: b.rom_version.trim().to_string(),
                    bmc_type: bmc_type_from_product(&b.bmc_product_name),
                    bmc_address: normalize_bmc_address(&b.bmc_address),
                    bmc_version: b.bmc_fw_version.trim().to_string(),
                    blade_position: lenient_i64(&b.bay.connection),
                    model: b.product_name.trim().to_string(),
                    temp_c: b.temps.as_ref().map(Temps::ambient).unwrap_or_default(),
                    power_kw: watts_to_kw(lenient_f64(&b.power.consumed)),
                    power_state: b.power.state.trim().to_string(),
                    status: b.status.trim().to_string(),
                    vendor: Vendor::Hp.to_string(),
                    chassis_serial: chassis_serial.clone(),
                    ..Default::default()
                })
            })
            .collect()
    }

    /// Storage blades, associated to the server blade in their `ASSOCIATEDBLADE` bay
    pub fn storage_blades(&self) -> Vec<StorageBlade> {
        let chassis_serial = self.serial();
        let servers = self.blades();
        self.blades_of_type("STORAGE")
            .filter_map(|b| {
                let serial = validate_serial(&b.serial).ok()?;
                let associated = lenient_i64(&b.associated_blade);
                let blade_serial = servers
                    .iter()
                    .find(|s| associated > 0 && s.blade_position == associated)
                    .map(|s| s.serial.clone())
                    .unwrap_or_default();
                Some(StorageBlade {
                    serial,
                    fw_version: b.rom_version.trim().to_string(),
                    blade_position: lenient_i64(&b.bay.connection),
                    model: b.product_name.trim().to_string(),
                    temp_c: b.temps.as_ref().map(Temps::ambient).unwrap_or_default(),
                    power_kw: watts_to_kw(lenient_f64(&b.power.consumed)),
                    status: b.status.trim().to_string(),
                    vendor: Vendor::Hp.to_string(),
                    chassis_serial: chassis_serial.clone(),
                    blade_serial,
                    ..Default::default()
                })
            })
            .collect()
    }
}

/// `json/overview`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Overview {
    pub server_name: String,
    pub product_name: String,
    pub serial_num: String,
    pub system_rom: String,
    pub ilo_fw_version: String,
    pub system_health: String,
    pub power: String,
}

impl Overview {
    pub fn status(&self) -> String {
        strip_op_status(&self.system_health)
    }
}

/// `json/mem_info`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemInfo {
    /// Total memory in MB
    pub mem_total_mem_size: i64,
}

impl MemInfo {
    pub fn gigabytes(&self) -> i64 {
        self.mem_total_mem_size / 1024
    }
}

/// `json/proc_info`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProcInfo {
    pub processors: Vec<Processor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Processor {
    pub proc_name: String,
    pub proc_num_cores: i64,
    pub proc_num_threads: i64,
}

impl ProcInfo {
    pub fn summary(&self) -> CpuSummary {
        let Some(first) = self.processors.first() else {
            return CpuSummary::default();
        };
        CpuSummary {
            name: first.proc_name.trim().to_string(),
            sockets: self.processors.len() as i64,
            cores: first.proc_num_cores,
            threads: first.proc_num_threads,
        }
    }
}

/// `json/power_summary`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerSummary {
    /// Average draw in watts
    pub last_avg_pwr_accum: f64,
}

/// `json/health_temperature`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HealthTemperature {
    pub temperature: Vec<TemperatureSensor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemperatureSensor {
    pub location: String,
    pub currentreading: i64,
}

impl HealthTemperature {
    pub fn ambient(&self) -> i64 {
        self.temperature
            .iter()
            .find(|t| t.location == "Ambient")
            .map(|t| t.currentreading)
            .unwrap_or_default()
    }
}

/// `json/license`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct License {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<License> for LicenseInfo {
    fn from(license: License) -> Self {
        LicenseInfo {
            name: license.name,
            status: license.kind,
        }
    }
}

/// `json/power_supplies`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerSupplies {
    pub supplies: Vec<IloPowerSupply>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IloPowerSupply {
    pub ps_bay: i64,
    pub ps_serial_num: String,
    pub ps_model: String,
    pub ps_condition: String,
    pub ps_max_cap_watts: f64,
    pub ps_output_watts: f64,
}

impl PowerSupplies {
    pub fn psus(&self, parent_serial: &str) -> Vec<Psu> {
        self.supplies
            .iter()
            .map(|ps| Psu {
                serial: validate_serial(&ps.ps_serial_num)
                    .unwrap_or_else(|_| format!("{parent_serial}_{}", ps.ps_bay)),
                capacity_kw: watts_to_kw(ps.ps_max_cap_watts),
                power_kw: watts_to_kw(ps.ps_output_watts),
                status: ps.ps_condition.trim().to_string(),
                part_number: ps.ps_model.trim().to_string(),
                position: ps.ps_bay,
                ..Default::default()
            })
            .collect()
    }
}

/// `json/health_phy_drives`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HealthPhyDrives {
    pub phy_dev_arrays: Vec<PhysicalDriveArray>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PhysicalDriveArray {
    pub physical_drives: Vec<PhysicalDrive>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PhysicalDrive {
    pub serial_no: String,
    pub status: String,
    pub drive_media_type: String,
    pub capacity: String,
    pub model: String,
    pub location: String,
    pub fw_version: String,
}

impl HealthPhyDrives {
    pub fn disks(&self) -> Vec<Disk> {
        self.phy_dev_arrays
            .iter()
            .flat_map(|a| a.physical_drives.iter())
            .filter_map(|d| {
                Some(Disk {
                    serial: validate_serial(&d.serial_no).ok()?,
                    status: strip_op_status(&d.status),
                    disk_type: d.drive_media_type.trim().to_string(),
                    size: d.capacity.trim().to_string(),
                    model: d.model.trim().to_string(),
                    location: d.location.trim().to_string(),
                    fw_version: d.fw_version.trim().to_string(),
                    ..Default::default()
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const ENCLOSURE_XML: &str = r#"<?xml version="1.0"?>
<RIMP>
  <MP><PN>BladeSystem c7000 Onboard Administrator</PN><FWRI>4.70</FWRI></MP>
  <INFRA2>
    <ENCL>spare-enc-01</ENCL>
    <ENCL_SN>GB8849AB12</ENCL_SN>
    <PN>BladeSystem c7000 Enclosure G2</PN>
    <STATUS>OK</STATUS>
    <TEMPS><TEMP><DESC>AMBIENT</DESC><C>21</C></TEMP></TEMPS>
    <POWER>
      <POWER_CONSUMED>2730</POWER_CONSUMED>
      <REDUNDANCY>REDUNDANT</REDUNDANCY>
      <REDUNDANCY_MODE>AC_REDUNDANT</REDUNDANCY_MODE>
      <POWERSUPPLY><BAY><CONNECTION>1</CONNECTION></BAY><SN>5BGXF0AHL4B0YM</SN><PN>588603-B21</PN><STATUS>OK</STATUS><ACTUALOUTPUT>450</ACTUALOUTPUT><CAPACITY>2450</CAPACITY></POWERSUPPLY>
      <POWERSUPPLY><BAY><CONNECTION>2</CONNECTION></BAY><SN></SN><PN>588603-B21</PN><STATUS>OK</STATUS><ACTUALOUTPUT>440</ACTUALOUTPUT><CAPACITY>2450</CAPACITY></POWERSUPPLY>
    </POWER>
    <FANS>
      <FAN><BAY><CONNECTION>1</CONNECTION></BAY><PN>412140-B21</PN><STATUS>OK</STATUS><RPM_CUR>6900</RPM_CUR><PWR_USED>20</PWR_USED></FAN>
    </FANS>
    <BLADES>
      <BLADE><BAY><CONNECTION>1</CONNECTION></BAY><MGMTIPADDR>0.0.0.0</MGMTIPADDR><NAME>node01</NAME><SPN>ProLiant BL460c Gen9</SPN><BSN>CZ3512ABCD</BSN><TYPE>SERVER</TYPE><STATUS>OK</STATUS><POWER><POWERSTATE>ON</POWERSTATE><POWER_CONSUMED>210</POWER_CONSUMED></POWER><TEMPS><TEMP><C>19</C></TEMP></TEMPS><BLADEROMVER>I36 05/21/2018</BLADEROMVER><MGMTPN>iLO4</MGMTPN><MGMTFWVERSION>2.55</MGMTFWVERSION></BLADE>
      <BLADE><BAY><CONNECTION>2</CONNECTION></BAY><MGMTIPADDR>10.0.0.12</MGMTIPADDR><NAME>storage</NAME><SPN>D2200sb Storage Blade</SPN><BSN>SGH123XYZ</BSN><TYPE>STORAGE</TYPE><STATUS>OK</STATUS><ASSOCIATEDBLADE>1</ASSOCIATEDBLADE></BLADE>
      <BLADE><BAY><CONNECTION>3</CONNECTION></BAY><BSN>[Unknown]</BSN><TYPE>SERVER</TYPE></BLADE>
    </BLADES>
    <SWITCHES><SWITCH><SPN>HP VC Flex-10 Enet Module</SPN></SWITCH></SWITCHES>
    <MANAGERS>
      <MANAGER><BAY><CONNECTION>1</CONNECTION></BAY><ROLE>ACTIVE</ROLE><MACADDR>00:17:A4:77:00:0E</MACADDR><FWRI>4.70</FWRI></MANAGER>
      <MANAGER><BAY><CONNECTION>2</CONNECTION></BAY><ROLE>STANDBY</ROLE><MACADDR>00:17:A4:77:00:10</MACADDR><FWRI>4.70</FWRI></MANAGER>
    </MANAGERS>
  </INFRA2>
</RIMP>"#;

    pub const BLADE_XML: &str = r#"<?xml version="1.0"?>
<RIMP>
  <HSI>
    <SBSN>CZ3512ABCD </SBSN>
    <SPN>ProLiant BL460c Gen9</SPN>
    <NICS>
      <NIC><PORT>1</PORT><DESCRIPTION>iLO 4</DESCRIPTION><MACADDR>9c:b6:54:01:02:03</MACADDR><STATUS>OK</STATUS></NIC>
      <NIC><PORT>1</PORT><DESCRIPTION>FlexFabric 10Gb 2-port 536FLB Adapter</DESCRIPTION><MACADDR>5C:B9:01:AA:BB:01</MACADDR><STATUS>OK</STATUS></NIC>
      <NIC><PORT>2</PORT><DESCRIPTION>FlexFabric 10Gb 2-port 536FLB Adapter</DESCRIPTION><MACADDR>5C:B9:01:AA:BB:02</MACADDR><STATUS>OK</STATUS></NIC>
    </NICS>
  </HSI>
  <MP><PN>Integrated Lights-Out 4 (iLO 4)</PN><FWRI>2.55</FWRI></MP>
  <BLADESYSTEM><BAY>1</BAY></BLADESYSTEM>
</RIMP>"#;

    pub const DISCRETE_XML: &str = r#"<?xml version="1.0"?>
<RIMP>
  <HSI><SBSN>MXQ1234567</SBSN><SPN>ProLiant DL360 Gen10</SPN></HSI>
  <MP><PN>Integrated Lights-Out 5 (iLO 5)</PN><FWRI>2.30</FWRI></MP>
</RIMP>"#;
}
