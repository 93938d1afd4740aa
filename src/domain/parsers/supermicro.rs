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

//! Supermicro `/cgi/ipmi.cgi` XML responses
//!
//! Every request token answers with an `<IPMI>` document carrying one of the
//! sections below, so a single [`Ipmi`] type covers them all.

use super::common::{
    dedupe_nics, lenient_f64, lenient_i64, normalize_mac, parse_size_to_bytes, validate_serial,
    watts_to_kw,
};
use crate::domain::{BmcError, CpuSummary, Nic, Psu};
use serde::Deserialize;

/// Request tokens understood by `/cgi/ipmi.cgi`
pub const FRU_INFO: &str = "FRU_INFO.XML=(0,0)";
pub const PLATFORM_INFO: &str = "Get_PlatformInfo.XML=(0,0)";
pub const GENERIC_INFO: &str = "GENERIC_INFO.XML=(0,0)";
pub const CONFIG_INFO: &str = "CONFIG_INFO.XML=(0,0)";
pub const SMBIOS_INFO: &str = "SMBIOS_INFO.XML=(0,0)";
pub const POWER_INFO: &str = "POWER_INFO.XML=(0,0)";
pub const NODE_INFO: &str = "Get_NodeInfoReadings.XML=(0,0)";
pub const PS_INFO: &str = "Get_PSInfoReadings.XML=(0,0)";

/// Marker in the login response body of a successful login
pub const LOGIN_SUCCESS_MARKER: &str = "../cgi/url_redirect.cgi?url_name=mainmenu";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Ipmi {
    #[serde(rename = "FRU_INFO")]
    pub fru: Option<FruInfo>,
    #[serde(rename = "PLATFORM_INFO")]
    pub platform: Option<PlatformInfo>,
    #[serde(rename = "GENERIC_INFO")]
    pub generic: Option<GenericInfo>,
    #[serde(rename = "CONFIG_INFO")]
    pub config: Option<ConfigInfo>,
    #[serde(rename = "SMBIOS_INFO")]
    pub smbios: Option<SmbiosInfo>,
    #[serde(rename = "POWER_INFO")]
    pub power: Option<PowerInfo>,
    #[serde(rename = "NodeInfo")]
    pub nodes: Option<NodeInfo>,
    #[serde(rename = "PSInfo")]
    pub supplies: Option<PsInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FruInfo {
    #[serde(rename = "CHASSIS")]
    pub chassis: SerialEntry,
    #[serde(rename = "BOARD")]
    pub board: BoardEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SerialEntry {
    #[serde(rename = "@SERIAL_NUM")]
    pub serial: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BoardEntry {
    #[serde(rename = "@SERIAL_NUM")]
    pub serial: String,
    #[serde(rename = "@PROD_NAME")]
    pub product_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlatformInfo {
    #[serde(rename = "@BIOS_VERSION")]
    pub bios_version: String,
    #[serde(rename = "@MB_MAC_ADDR1")]
    pub mac1: String,
    #[serde(rename = "@MB_MAC_ADDR2")]
    pub mac2: String,
    #[serde(rename = "@MB_MAC_ADDR3")]
    pub mac3: String,
    #[serde(rename = "@MB_MAC_ADDR4")]
    pub mac4: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenericInfo {
    #[serde(rename = "GENERIC")]
    pub generic: Generic,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Generic {
    #[serde(rename = "@BMC_MAC")]
    pub bmc_mac: String,
    #[serde(rename = "@IPMIFW_VERSION")]
    pub fw_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigInfo {
    #[serde(rename = "HOSTNAME")]
    pub hostname: Hostname,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Hostname {
    #[serde(rename = "@NAME")]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmbiosInfo {
    #[serde(rename = "CPU")]
    pub cpus: Vec<SmbiosCpu>,
    #[serde(rename = "DIMM")]
    pub dimms: Vec<SmbiosDimm>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmbiosCpu {
    #[serde(rename = "@TYPE")]
    pub kind: String,
    #[serde(rename = "@CORE")]
    pub cores: String,
    #[serde(rename = "@THREAD")]
    pub threads: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SmbiosDimm {
    #[serde(rename = "@SIZE")]
    pub size: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerInfo {
    #[serde(rename = "POWER")]
    pub power: PowerStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PowerStatus {
    #[serde(rename = "@STATUS")]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    #[serde(rename = "Node")]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Node {
    #[serde(rename = "@Present")]
    pub present: String,
    /// Watts
    #[serde(rename = "@Power")]
    pub power: String,
    #[serde(rename = "@InletTemp")]
    pub inlet_temp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PsInfo {
    #[serde(rename = "PSItem")]
    pub items: Vec<PsItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PsItem {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@serialNo")]
    pub serial: String,
    #[serde(rename = "@a_b_PS_Status_I2C")]
    pub status: String,
    #[serde(rename = "@acInVoltage")]
    pub ac_in_voltage: String,
    #[serde(rename = "@acInCurrent")]
    pub ac_in_current: String,
}

/// Parse any `/cgi/ipmi.cgi` response
///
/// # Arguments
/// * `xml` - Raw response body
///
/// # Returns
/// * `Ok(Ipmi)` - Parsed document, sections absent from the response are `None`
/// * `Err(String)` - Body is not an IPMI document
pub fn parse_ipmi(xml: &str) -> Result<Ipmi, String> {
    quick_xml::de::from_str(xml).map_err(|e| e.to_string())
}

/// Serial of a Supermicro node: `chassis_serial@board_serial`, lowercased
pub fn node_serial(fru: &FruInfo) -> Result<String, BmcError> {
    let chassis = fru.chassis.serial.trim();
    let board = fru.board.serial.trim();
    if chassis.is_empty() || board.is_empty() {
        return Err(BmcError::InvalidSerial(format!("{chassis}@{board}")));
    }
    validate_serial(&format!("{chassis}@{board}"))
}

impl PlatformInfo {
    pub fn nics(&self) -> Vec<Nic> {
        let nics = [&self.mac1, &self.mac2, &self.mac3, &self.mac4]
            .iter()
            .enumerate()
            .filter(|(_, mac)| !mac.trim().is_empty())
            .map(|(i, mac)| Nic {
                mac_address: normalize_mac(mac),
                name: format!("eth{i}"),
                ..Default::default()
            })
            .collect();
        dedupe_nics(nics)
    }
}

impl Generic {
    /// `0325` style firmware revision as `3.25`
    pub fn version(&self) -> String {
        let raw = self.fw_version.trim();
        if raw.len() == 4 && raw.chars().all(|c| c.is_ascii_digit()) {
            format!("{}.{}", lenient_i64(&raw[..2]), &raw[2..])
        } else {
            raw.to_string()
        }
    }
}

impl SmbiosInfo {
    pub fn cpu(&self) -> CpuSummary {
        let Some(first) = self.cpus.first() else {
            return CpuSummary::default();
        };
        CpuSummary {
            name: first.kind.trim().to_string(),
            sockets: self.cpus.len() as i64,
            cores: lenient_i64(&first.cores),
            threads: lenient_i64(&first.threads),
        }
    }

    pub fn memory_gb(&self) -> i64 {
        let bytes: u64 = self
            .dimms
            .iter()
            .filter_map(|d| parse_size_to_bytes(&d.size).ok())
            .sum();
        (bytes / (1024 * 1024 * 1024)) as i64
    }
}

impl NodeInfo {
    fn node(&self) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.present.trim() == "1")
            .or_else(|| self.nodes.first())
    }

    pub fn power_kw(&self) -> f64 {
        self.node()
            .map(|n| watts_to_kw(lenient_f64(&n.power)))
            .unwrap_or_default()
    }

    pub fn temp_c(&self) -> i64 {
        self.node()
            .map(|n| lenient_i64(&n.inlet_temp))
            .unwrap_or_default()
    }
}

impl PsInfo {
    pub fn psus(&self, parent_serial: &str) -> Vec<Psu> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, ps)| {
                let position = i as i64 + 1;
                Psu {
                    serial: validate_serial(&ps.serial)
                        .unwrap_or_else(|_| format!("{parent_serial}_{position}")),
                    power_kw: watts_to_kw(
                        lenient_f64(&ps.ac_in_voltage) * lenient_f64(&ps.ac_in_current),
                    ),
                    status: if ps.status.trim() == "1" {
                        "OK".to_string()
                    } else {
                        "Error".to_string()
                    },
                    part_number: ps.name.trim().to_string(),
                    position,
                    ..Default::default()
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const FRU: &str = r#"<?xml version="1.0"?>
<IPMI>
  <FRU_INFO RES="1">
    <DEVICE ID="0"/>
    <CHASSIS TYPE="17" PART_NUM="CSE-217BHQ+-R2K22BP2" SERIAL_NUM="CF414AF38N50003"/>
    <BOARD LAN="0" PROD_NAME="X10DRT-PT" SERIAL_NUM="VM158S009467" MFC_NAME="Supermicro"/>
    <PRODUCT LAN="0" PART_NUM="SYS-2028TP-DC0FR" SERIAL_NUM="A12345"/>
  </FRU_INFO>
</IPMI>"#;

    pub const PLATFORM: &str = r#"<?xml version="1.0"?><IPMI><PLATFORM_INFO MB_MAC_NUM="2" MB_MAC_ADDR1="0C:C4:7A:B8:22:60" MB_MAC_ADDR2="0C:C4:7A:B8:22:61" BIOS_VERSION="2.0a" BIOS_BUILD_DATE="06/16/2016"/></IPMI>"#;

    pub const GENERIC: &str = r#"<?xml version="1.0"?><IPMI><GENERIC_INFO><GENERIC BMC_IP="010.193.171.016" BMC_MAC="0c:c4:7a:b8:22:64" WEB_VERSION="1.1" IPMIFW_VERSION="0325"/></GENERIC_INFO></IPMI>"#;

    pub const CONFIG: &str = r#"<?xml version="1.0"?><IPMI><CONFIG_INFO><HOSTNAME NAME="node11"/></CONFIG_INFO></IPMI>"#;

    pub const SMBIOS: &str = r#"<?xml version="1.0"?>
<IPMI><SMBIOS_INFO>
  <CPU TYPE="Intel(R) Xeon(R) CPU E5-2630 v4 @ 2.20GHz" SPEED="2200 MHz" CORE="10" THREAD="20"/>
  <CPU TYPE="Intel(R) Xeon(R) CPU E5-2630 v4 @ 2.20GHz" SPEED="2200 MHz" CORE="10" THREAD="20"/>
  <DIMM LOCATION="P1-DIMMA1" SIZE="16384 MB"/>
  <DIMM LOCATION="P2-DIMME1" SIZE="16384 MB"/>
</SMBIOS_INFO></IPMI>"#;

    pub const POWER: &str =
        r#"<?xml version="1.0"?><IPMI><POWER_INFO><POWER STATUS="ON"/></POWER_INFO></IPMI>"#;

    pub const NODES: &str = r#"<?xml version="1.0"?><IPMI><NodeInfo><Node ID="0" Present="1" Power="245" InletTemp="26"/></NodeInfo></IPMI>"#;

    pub const SUPPLIES: &str = r#"<?xml version="1.0"?><IPMI><PSInfo>
  <PSItem name="PWS-2K04A-1R" serialNo="P2K4ACH49MT0587" a_b_PS_Status_I2C="1" acInVoltage="230" acInCurrent="2"/>
  <PSItem name="PWS-2K04A-1R" serialNo="" a_b_PS_Status_I2C="0" acInVoltage="0" acInCurrent="0"/>
</PSInfo></IPMI>"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_node_serial_joins_chassis_and_board() {
        let ipmi = parse_ipmi(FRU).unwrap();
        let fru = ipmi.fru.unwrap();
        assert_eq!(node_serial(&fru).unwrap(), "cf414af38n50003@vm158s009467");
        assert_eq!(fru.board.product_name, "X10DRT-PT");
    }

    #[test]
    fn test_node_serial_requires_both_parts() {
        let fru = FruInfo::default();
        assert!(matches!(node_serial(&fru), Err(BmcError::InvalidSerial(_))));
    }

    #[test]
    fn test_platform_and_generic() {
        let platform = parse_ipmi(PLATFORM).unwrap().platform.unwrap();
        assert_eq!(platform.bios_version, "2.0a");
        let nics = platform.nics();
        assert_eq!(nics.len(), 2);
        assert_eq!(nics[1].mac_address, "0c:c4:7a:b8:22:61");

        let generic = parse_ipmi(GENERIC).unwrap().generic.unwrap();
        assert_eq!(generic.generic.version(), "3.25");

        let config = parse_ipmi(CONFIG).unwrap().config.unwrap();
        assert_eq!(config.hostname.name, "node11");
    }

    #[test]
    fn test_smbios_summary() {
        let smbios = parse_ipmi(SMBIOS).unwrap().smbios.unwrap();
        let cpu = smbios.cpu();
        assert_eq!(cpu.sockets, 2);
        assert_eq!(cpu.cores, 10);
        assert_eq!(cpu.threads, 20);
        assert_eq!(smbios.memory_gb(), 32);
    }

    #[test]
    fn test_power_and_supplies() {
        let nodes = parse_ipmi(NODES).unwrap().nodes.unwrap();
        assert!((nodes.power_kw() - 0.245).abs() < 1e-9);
        assert_eq!(nodes.temp_c(), 26);

        let power = parse_ipmi(POWER).unwrap().power.unwrap();
        assert_eq!(power.power.status, "ON");

        let psus = parse_ipmi(SUPPLIES).unwrap().supplies.unwrap().psus("srv");
        assert_eq!(psus[0].serial, "p2k4ach49mt0587");
        assert_eq!(psus[1].serial, "srv_2");
        assert_eq!(psus[1].status, "Error");
        assert!((psus[0].power_kw - 0.46).abs() < 1e-9);
    }
}
