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

//! Common normalization helpers shared by every vendor parser

use crate::domain::{BmcError, Nic};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    pub static ref STORAGE_SIZE_RE: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)\s*(B|K|M|G|T)(?:I?B)?").unwrap();
    pub static ref MAC_ADDRESS_RE: Regex =
        Regex::new(r"(?i)\b([0-9a-f]{2}(?:[:-][0-9a-f]{2}){5})\b").unwrap();
}

/// BMC address placeholder for devices without a management IP
pub const UNASSIGNED: &str = "unassigned";

/// Serials reported by BMCs for empty or unreadable slots
pub const SERIAL_SENTINELS: [&str; 4] = ["", "[unknown]", "0000000000", "_"];

/// Lowercase a serial and reject the known placeholders
///
/// # Arguments
/// * `raw` - Serial as reported by the BMC
///
/// # Returns
/// * `Ok(String)` - Trimmed, lowercased serial
/// * `Err(BmcError::InvalidSerial)` - Serial is a placeholder
pub fn validate_serial(raw: &str) -> Result<String, BmcError> {
    let serial = raw.trim().to_lowercase();
    if SERIAL_SENTINELS.contains(&serial.as_str()) {
        return Err(BmcError::InvalidSerial(raw.to_string()));
    }
    Ok(serial)
}

/// Lowercase a MAC address and use `:` separators
pub fn normalize_mac(raw: &str) -> String {
    raw.trim().to_lowercase().replace('-', ":")
}

/// Map empty or placeholder management addresses to [`UNASSIGNED`]
pub fn normalize_bmc_address(raw: &str) -> String {
    match raw.trim() {
        "" | "0.0.0.0" | "[]" => UNASSIGNED.to_string(),
        address => address.to_string(),
    }
}

pub fn is_unassigned(address: &str) -> bool {
    normalize_bmc_address(address) == UNASSIGNED
}

/// Short BMC type for an HP management processor product name
///
/// # Arguments
/// * `product` - Product string, e.g. "Integrated Lights-Out 4 (iLO 4)"
///
/// # Returns
/// * `ilo2` to `ilo5` for known generations, otherwise the raw string
pub fn bmc_type_from_product(product: &str) -> String {
    match product.trim() {
        "Integrated Lights-Out 2 (iLO 2)" | "iLO2" => "ilo2".to_string(),
        "Integrated Lights-Out 3 (iLO 3)" | "iLO3" => "ilo3".to_string(),
        "Integrated Lights-Out 4 (iLO 4)" | "iLO4" => "ilo4".to_string(),
        "Integrated Lights-Out 5 (iLO 5)" | "iLO5" => "ilo5".to_string(),
        other => other.to_string(),
    }
}

/// Strip the `OP_STATUS_` prefix iLO puts on health values
pub fn strip_op_status(raw: &str) -> String {
    raw.trim()
        .strip_prefix("OP_STATUS_")
        .unwrap_or(raw.trim())
        .to_string()
}

/// Drop NICs without a MAC and keep the first occurrence of every MAC
pub fn dedupe_nics(nics: Vec<Nic>) -> Vec<Nic> {
    let mut seen = HashSet::new();
    nics.into_iter()
        .filter_map(|mut nic| {
            nic.mac_address = normalize_mac(&nic.mac_address);
            if nic.mac_address.is_empty() || !seen.insert(nic.mac_address.clone()) {
                None
            } else {
                Some(nic)
            }
        })
        .collect()
}

/// Threads per package when the vendor only reports a hyper-threading flag
pub fn threads_from_cores(cores: i64, hyperthreading: bool) -> i64 {
    if hyperthreading {
        cores * 2
    } else {
        cores
    }
}

pub fn watts_to_kw(watts: f64) -> f64 {
    watts / 1000.0
}

/// Parse a numeric BMC field, `0.0` when absent or garbage
pub fn lenient_f64(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches(|c: char| c.is_alphabetic() || c == ' ')
        .trim()
        .parse()
        .unwrap_or(0.0)
}

/// Parse an integral BMC field, accepting `21.0` style values
pub fn lenient_i64(raw: &str) -> i64 {
    lenient_f64(raw) as i64
}

/// Parse a size string (e.g., "16384 MB", "1.2 TB") to bytes
///
/// # Arguments
/// * `size_str` - Size string to parse
///
/// # Returns
/// * `Ok(u64)` - Size in bytes
/// * `Err(String)` - Parse error description
pub fn parse_size_to_bytes(size_str: &str) -> Result<u64, String> {
    if size_str.trim().is_empty() {
        return Ok(0);
    }

    let size_str = size_str.replace(' ', "").to_uppercase();

    if let Some(captures) = STORAGE_SIZE_RE.captures(&size_str) {
        let number: f64 = captures[1]
            .parse()
            .map_err(|_| format!("Invalid number in size: {}", &captures[1]))?;
        let multiplier = match &captures[2] {
            "B" => 1,
            "K" => 1024,
            "M" => 1024 * 1024,
            "G" => 1024 * 1024 * 1024,
            "T" => 1024_u64.pow(4),
            unit => return Err(format!("Unknown unit: {unit}")),
        };
        Ok((number * multiplier as f64) as u64)
    } else {
        Err(format!("Unable to parse size: {size_str}"))
    }
}

/// Convert bytes to human-readable format, e.g. "1.1 TB"
pub fn bytes_to_human_readable(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Parse a key-value pair such as `ST2=abc`
///
/// # Arguments
/// * `line` - Text to split
/// * `separator` - Separator character
///
/// # Returns
/// * `Ok((String, String))` - Trimmed key and value
/// * `Err(String)` - Separator missing
pub fn parse_key_value(line: &str, separator: char) -> Result<(String, String), String> {
    if let Some(pos) = line.find(separator) {
        let key = line[..pos].trim().to_string();
        let value = line[pos + 1..].trim().to_string();
        Ok((key, value))
    } else {
        Err(format!("No separator '{separator}' found in: {line}"))
    }
}

/// First MAC address found in free text (HTML pages)
pub fn find_mac_address(text: &str) -> Option<String> {
    MAC_ADDRESS_RE
        .captures(text)
        .map(|captures| normalize_mac(&captures[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_serial() {
        assert_eq!(validate_serial(" CZ3512ABCD ").unwrap(), "cz3512abcd");
        for sentinel in ["", "[unknown]", "0000000000", "_", "[UNKNOWN]"] {
            assert!(matches!(
                validate_serial(sentinel),
                Err(BmcError::InvalidSerial(_))
            ));
        }
    }

    #[test]
    fn test_normalize_bmc_address() {
        assert_eq!(normalize_bmc_address("0.0.0.0"), UNASSIGNED);
        assert_eq!(normalize_bmc_address(""), UNASSIGNED);
        assert_eq!(normalize_bmc_address("[]"), UNASSIGNED);
        assert_eq!(normalize_bmc_address("10.1.2.3"), "10.1.2.3");
        assert!(is_unassigned("0.0.0.0"));
    }

    #[test]
    fn test_bmc_type_lookup() {
        assert_eq!(bmc_type_from_product("Integrated Lights-Out 4 (iLO 4)"), "ilo4");
        assert_eq!(bmc_type_from_product("iLO3"), "ilo3");
        assert_eq!(bmc_type_from_product("iDRAC8"), "iDRAC8");
    }

    #[test]
    fn test_strip_op_status() {
        assert_eq!(strip_op_status("OP_STATUS_OK"), "OK");
        assert_eq!(strip_op_status("Degraded"), "Degraded");
    }

    #[test]
    fn test_dedupe_nics() {
        let nics = vec![
            Nic {
                mac_address: "AA-BB-CC-DD-EE-FF".into(),
                name: "first".into(),
                ..Default::default()
            },
            Nic {
                mac_address: "aa:bb:cc:dd:ee:ff".into(),
                name: "second".into(),
                ..Default::default()
            },
            Nic::default(),
        ];
        let nics = dedupe_nics(nics);
        assert_eq!(nics.len(), 1);
        assert_eq!(nics[0].mac_address, "aa:bb:cc:dd:ee:ff");
        assert_eq!(nics[0].name, "first");
    }

    #[test]
    fn test_parse_size_to_bytes() {
        assert_eq!(parse_size_to_bytes("16384 MB").unwrap(), 16 * 1024 * 1024 * 1024);
        assert_eq!(parse_size_to_bytes("16GB").unwrap(), 16 * 1024 * 1024 * 1024);
        assert_eq!(parse_size_to_bytes("").unwrap(), 0);
        assert!(parse_size_to_bytes("lots").is_err());
    }

    #[test]
    fn test_find_mac_address() {
        let html = r#"<td class="data">MAC Address</td><td>00:17:A4:77:00:0E</td>"#;
        assert_eq!(find_mac_address(html).unwrap(), "00:17:a4:77:00:0e");
        assert!(find_mac_address("<html></html>").is_none());
    }

    #[test]
    fn test_lenient_numbers() {
        assert_eq!(lenient_f64("2730"), 2730.0);
        assert_eq!(lenient_f64("450 Watts"), 450.0);
        assert_eq!(lenient_f64("N/A"), 0.0);
        assert_eq!(lenient_i64("21.0"), 21);
        assert_eq!(lenient_i64(""), 0);
    }

    #[test]
    fn test_threads_from_cores() {
        assert_eq!(threads_from_cores(8, true), 16);
        assert_eq!(threads_from_cores(8, false), 8);
    }
}
