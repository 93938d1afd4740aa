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

//! Runtime configuration loaded from `bmc-inventory.toml`

use crate::domain::{ConfigError, Vendor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Name of the configuration file looked up in the search paths
pub const CONFIG_FILE_NAME: &str = "bmc-inventory.toml";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InventoryConfig {
    /// Sites to scan and collect, `all` selects every site
    pub site: Vec<String>,
    /// Base URL used to build change callbacks
    pub url: String,
    /// BMC username
    pub bmc_user: String,
    /// BMC password
    pub bmc_pass: String,
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub scanner: ScannerConfig,
    pub collector: CollectorConfig,
    pub notification: NotificationConfig,
    pub dump: DumpConfig,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            site: vec!["all".to_string()],
            url: String::new(),
            bmc_user: String::new(),
            bmc_pass: String::new(),
            database: DatabaseConfig::default(),
            http: HttpConfig::default(),
            scanner: ScannerConfig::default(),
            collector: CollectorConfig::default(),
            notification: NotificationConfig::default(),
            dump: DumpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: String,
}

/// Timeouts shared by every BMC client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Total request timeout in seconds
    pub timeout: u64,
    /// TCP + TLS connect timeout in seconds
    pub connect_timeout: u64,
    /// Timeout of each vendor detection request in seconds
    pub detect_timeout: u64,
    /// `https` in production; tests point drivers at plain HTTP mocks
    pub scheme: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: 60,
            connect_timeout: 30,
            detect_timeout: 30,
            scheme: "https".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Worker pool width
    pub concurrency: usize,
    /// Where subnets come from; only `kea` is supported
    pub subnet_source: String,
    /// Path to the Kea DHCPv4 configuration
    pub kea_config: String,
    /// Domain-name suffix identifying BMC subnets, e.g. `bmc.example.com`
    pub kea_domain_name_suffix: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            concurrency: 100,
            subnet_source: "kea".to_string(),
            kea_config: "/etc/kea/kea-dhcp4.conf".to_string(),
            kea_domain_name_suffix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    pub fn new(user: &str, pass: &str) -> Self {
        Self {
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }
}

/// Factory credentials per vendor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefaultCredentials {
    pub hp: Credentials,
    pub dell: Credentials,
    pub supermicro: Credentials,
}

impl Default for DefaultCredentials {
    fn default() -> Self {
        Self {
            hp: Credentials::new("Administrator", ""),
            dell: Credentials::new("root", "calvin"),
            supermicro: Credentials::new("ADMIN", "ADMIN"),
        }
    }
}

impl DefaultCredentials {
    pub fn for_vendor(&self, vendor: Vendor) -> &Credentials {
        match vendor {
            Vendor::Hp => &self.hp,
            Vendor::Dell => &self.dell,
            Vendor::Supermicro => &self.supermicro,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// Worker pool width
    pub concurrency: usize,
    /// Retry once with factory credentials after a rejected login
    pub try_default_credentials: bool,
    /// Enrich blades through RedFish when the blade BMC exposes it
    pub prefer_redfish: bool,
    pub default: DefaultCredentials,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            try_default_credentials: false,
            prefer_redfish: true,
            default: DefaultCredentials::default(),
        }
    }
}

/// Asset service receiving change callbacks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user: String,
    pub api_key: String,
}

/// Invalid payload dumps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DumpConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "/tmp/bmc-inventory".to_string(),
        }
    }
}

impl InventoryConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Credentials for a vendor: the configured pair, or the factory pair when `use_default` is set
    pub fn credentials(&self, vendor: Vendor, use_default: bool) -> Credentials {
        if use_default {
            self.collector.default.for_vendor(vendor).clone()
        } else {
            Credentials::new(&self.bmc_user, &self.bmc_pass)
        }
    }

    /// Report every required option left unset
    ///
    /// # Returns
    /// * `Ok(())` - Configuration is usable
    /// * `Err(ConfigError::MissingOptions)` - Names of the missing options
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.database.path.trim().is_empty() {
            missing.push("database.path".to_string());
        }
        if self.bmc_user.is_empty() {
            missing.push("bmc_user".to_string());
        }
        if self.bmc_pass.is_empty() {
            missing.push("bmc_pass".to_string());
        }
        if self.site.iter().all(|s| s.trim().is_empty()) {
            missing.push("site".to_string());
        }
        if self.scanner.concurrency == 0 {
            missing.push("scanner.concurrency".to_string());
        }
        if self.collector.concurrency == 0 {
            missing.push("collector.concurrency".to_string());
        }
        if self.notification.enabled && self.notification.endpoint.is_empty() {
            missing.push("notification.endpoint".to_string());
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingOptions(missing))
        }
    }
}
