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

//! Subnet parsing: Kea DHCPv4 configuration and CIDR expansion

use crate::domain::SiteSubnet;
use ipnetwork::Ipv4Network;
use serde::Deserialize;
use std::net::Ipv4Addr;

/// Selector matching every site or every subnet
pub const ALL: &str = "all";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeaConfig {
    #[serde(rename = "Dhcp4")]
    dhcp4: Dhcp4,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Dhcp4 {
    subnet4: Vec<Subnet4>,
    #[serde(rename = "shared-networks")]
    shared_networks: Vec<SharedNetwork>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SharedNetwork {
    subnet4: Vec<Subnet4>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Subnet4 {
    subnet: String,
    #[serde(rename = "option-data")]
    option_data: Vec<OptionData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OptionData {
    name: String,
    data: String,
}

/// Drop `#` and `//` comment lines, which Kea accepts but JSON does not
fn strip_comments(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.starts_with('#') && !trimmed.starts_with("//")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a Kea DHCPv4 configuration into BMC subnets
///
/// Only subnets with a `domain-name` option ending in `.{suffix}` are kept; the
/// label in front of the suffix is the site.
///
/// # Arguments
/// * `content` - Raw configuration file
/// * `suffix` - Domain-name suffix of BMC subnets
///
/// # Returns
/// * `Ok(Vec<SiteSubnet>)` - Selected subnets in file order
/// * `Err(String)` - Malformed configuration
pub fn parse_kea_subnets(content: &str, suffix: &str) -> Result<Vec<SiteSubnet>, String> {
    let config: KeaConfig =
        serde_json::from_str(&strip_comments(content)).map_err(|e| e.to_string())?;
    let suffix = suffix.trim_start_matches('.');

    let subnets = config
        .dhcp4
        .subnet4
        .iter()
        .chain(
            config
                .dhcp4
                .shared_networks
                .iter()
                .flat_map(|n| n.subnet4.iter()),
        )
        .filter_map(|subnet| {
            let domain = subnet
                .option_data
                .iter()
                .find(|o| o.name == "domain-name")?
                .data
                .trim();
            let site = if suffix.is_empty() {
                domain.split('.').next()?
            } else {
                domain.strip_suffix(suffix)?.strip_suffix('.')?.rsplit('.').next()?
            };
            if site.is_empty() {
                return None;
            }
            Some(SiteSubnet {
                cidr: subnet.subnet.trim().to_string(),
                site: site.to_string(),
            })
        })
        .collect();
    Ok(subnets)
}

fn selects(selectors: &[String], value: &str) -> bool {
    selectors.is_empty() || selectors.iter().any(|s| s == ALL || s == value)
}

/// Keep subnets matching the requested CIDRs and sites; `all` or an empty list matches everything
pub fn select_subnets(
    subnets: Vec<SiteSubnet>,
    cidrs: &[String],
    sites: &[String],
) -> Vec<SiteSubnet> {
    subnets
        .into_iter()
        .filter(|s| selects(cidrs, &s.cidr) && selects(sites, &s.site))
        .collect()
}

/// Expand a CIDR into host addresses
///
/// Network and broadcast addresses are excluded; a /32 yields its single
/// address and a /31 both addresses.
///
/// # Arguments
/// * `cidr` - IPv4 network, e.g. `192.168.0.0/30`
///
/// # Returns
/// * `Ok(Vec<Ipv4Addr>)` - Hosts in ascending order
/// * `Err(String)` - Not an IPv4 CIDR
pub fn expand_hosts(cidr: &str) -> Result<Vec<Ipv4Addr>, String> {
    let network: Ipv4Network = cidr.trim().parse().map_err(|e| format!("{cidr}: {e}"))?;
    let hosts = match network.prefix() {
        31 | 32 => network.iter().collect(),
        _ => {
            let net = network.network();
            let broadcast = network.broadcast();
            network
                .iter()
                .filter(|ip| *ip != net && *ip != broadcast)
                .collect()
        }
    };
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEA: &str = r#"{
    # managed by config management
    "Dhcp4": {
        "subnet4": [
            {"subnet": "10.10.0.0/24", "option-data": [{"name": "domain-name", "data": "ams4.bmc.example.com"}]},
            {"subnet": "10.20.0.0/24", "option-data": [{"name": "domain-name", "data": "lhr1.bmc.example.com"}]},
            {"subnet": "10.30.0.0/24", "option-data": [{"name": "domain-name", "data": "ams4.prod.example.com"}]},
            {"subnet": "10.40.0.0/24", "option-data": [{"name": "routers", "data": "10.40.0.1"}]}
        ],
        "shared-networks": [
            {"name": "edge", "subnet4": [
                {"subnet": "10.50.0.0/28", "option-data": [{"name": "domain-name", "data": "sin2.bmc.example.com"}]}
            ]}
        ]
    }
}"#;

    #[test]
    fn test_parse_kea_subnets_by_suffix() {
        let subnets = parse_kea_subnets(KEA, "bmc.example.com").unwrap();
        assert_eq!(
            subnets,
            vec![
                SiteSubnet {
                    cidr: "10.10.0.0/24".into(),
                    site: "ams4".into()
                },
                SiteSubnet {
                    cidr: "10.20.0.0/24".into(),
                    site: "lhr1".into()
                },
                SiteSubnet {
                    cidr: "10.50.0.0/28".into(),
                    site: "sin2".into()
                },
            ]
        );
    }

    #[test]
    fn test_select_subnets() {
        let subnets = parse_kea_subnets(KEA, "bmc.example.com").unwrap();
        let ams = select_subnets(subnets.clone(), &[ALL.to_string()], &["ams4".to_string()]);
        assert_eq!(ams.len(), 1);
        assert_eq!(ams[0].cidr, "10.10.0.0/24");

        let by_cidr = select_subnets(subnets.clone(), &["10.20.0.0/24".to_string()], &[]);
        assert_eq!(by_cidr[0].site, "lhr1");

        assert_eq!(select_subnets(subnets, &[], &[ALL.to_string()]).len(), 3);
    }

    #[test]
    fn test_expand_hosts_excludes_network_and_broadcast() {
        let hosts = expand_hosts("192.168.0.0/30").unwrap();
        assert_eq!(
            hosts,
            vec![Ipv4Addr::new(192, 168, 0, 1), Ipv4Addr::new(192, 168, 0, 2)]
        );
        assert_eq!(expand_hosts("10.0.0.0/24").unwrap().len(), 254);
    }

    #[test]
    fn test_expand_small_prefixes() {
        assert_eq!(
            expand_hosts("10.0.0.7/32").unwrap(),
            vec![Ipv4Addr::new(10, 0, 0, 7)]
        );
        assert_eq!(expand_hosts("10.0.0.6/31").unwrap().len(), 2);
        assert!(expand_hosts("not-a-cidr").is_err());
    }

    #[test]
    fn test_expansion_is_deterministic() {
        assert_eq!(
            expand_hosts("172.16.4.0/29").unwrap(),
            expand_hosts("172.16.4.0/29").unwrap()
        );
    }
}
