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

use crate::domain::{
    Blade, BmcError, CpuSummary, Credentials, Disk, Fan, HardwareType, LicenseInfo, Nic, Psu,
    StorageBlade, Vendor,
};
use async_trait::async_trait;

/// Secondary port - Read access to a server BMC (blade or discrete)
///
/// Data methods may fetch lazily and cache; every serial and MAC is lowercase.
#[async_trait]
pub trait ServerReader: Send + Sync {
    /// Open a session with the credentials the reader was built with
    ///
    /// # Returns
    /// * `Ok(())` - Session established
    /// * `Err(BmcError::LoginFailed)` - Credentials rejected
    /// * `Err(BmcError)` - Transport or protocol failure
    async fn login(&mut self) -> Result<(), BmcError>;

    /// Close the session; safe to call when no session is open
    async fn logout(&mut self) -> Result<(), BmcError>;

    async fn serial(&self) -> Result<String, BmcError>;
    async fn model(&self) -> Result<String, BmcError>;
    async fn name(&self) -> Result<String, BmcError>;
    async fn status(&self) -> Result<String, BmcError>;
    async fn bmc_type(&self) -> Result<String, BmcError>;
    async fn bmc_version(&self) -> Result<String, BmcError>;
    async fn bios_version(&self) -> Result<String, BmcError>;

    async fn nics(&self) -> Result<Vec<Nic>, BmcError>;
    async fn disks(&self) -> Result<Vec<Disk>, BmcError>;
    async fn psus(&self) -> Result<Vec<Psu>, BmcError>;
    /// Installed memory in GB
    async fn memory(&self) -> Result<i64, BmcError>;
    async fn cpu(&self) -> Result<CpuSummary, BmcError>;
    async fn license(&self) -> Result<LicenseInfo, BmcError>;

    /// Present draw in kW
    async fn power_kw(&self) -> Result<f64, BmcError>;
    /// Ambient or inlet temperature in Celsius
    async fn temp_c(&self) -> Result<i64, BmcError>;
    async fn power_state(&self) -> Result<String, BmcError>;

    /// Whether the server sits in a chassis
    async fn is_blade(&self) -> Result<bool, BmcError>;
    fn vendor(&self) -> Vendor;
    /// Address of the BMC
    fn address(&self) -> &str;
}

/// Secondary port - Read access to a chassis controller
#[async_trait]
pub trait ChassisReader: Send + Sync {
    /// Open a session; controllers without sessions succeed immediately
    async fn login(&mut self) -> Result<(), BmcError>;
    async fn logout(&mut self) -> Result<(), BmcError>;

    async fn serial(&self) -> Result<String, BmcError>;
    async fn model(&self) -> Result<String, BmcError>;
    async fn name(&self) -> Result<String, BmcError>;
    async fn status(&self) -> Result<String, BmcError>;
    async fn fw_version(&self) -> Result<String, BmcError>;

    async fn nics(&self) -> Result<Vec<Nic>, BmcError>;
    async fn psus(&self) -> Result<Vec<Psu>, BmcError>;
    async fn fans(&self) -> Result<Vec<Fan>, BmcError>;
    async fn power_kw(&self) -> Result<f64, BmcError>;
    async fn temp_c(&self) -> Result<i64, BmcError>;
    /// Interconnect type, `1G` or `10G`
    async fn pass_thru(&self) -> Result<String, BmcError>;
    async fn power_supply_count(&self) -> Result<usize, BmcError>;
    async fn is_psu_redundant(&self) -> Result<bool, BmcError>;
    async fn psu_redundancy_mode(&self) -> Result<String, BmcError>;

    /// Present server blades with valid serials, enriched through their own BMC
    /// where it is reachable
    async fn blades(&self) -> Result<Vec<Blade>, BmcError>;
    async fn storage_blades(&self) -> Result<Vec<StorageBlade>, BmcError>;

    fn vendor(&self) -> Vendor;
    fn address(&self) -> &str;
}

/// An open driver of either family
pub enum Connection {
    Server(Box<dyn ServerReader>),
    Chassis(Box<dyn ChassisReader>),
}

impl Connection {
    pub async fn login(&mut self) -> Result<(), BmcError> {
        match self {
            Connection::Server(reader) => reader.login().await,
            Connection::Chassis(reader) => reader.login().await,
        }
    }

    pub async fn logout(&mut self) -> Result<(), BmcError> {
        match self {
            Connection::Server(reader) => reader.logout().await,
            Connection::Chassis(reader) => reader.logout().await,
        }
    }

    pub fn vendor(&self) -> Vendor {
        match self {
            Connection::Server(reader) => reader.vendor(),
            Connection::Chassis(reader) => reader.vendor(),
        }
    }
}

/// Secondary port - Vendor detection and driver construction
#[async_trait]
pub trait BmcConnector: Send + Sync {
    /// Identify the vendor and hardware type behind a BMC address
    ///
    /// # Arguments
    /// * `host` - BMC address
    ///
    /// # Returns
    /// * `Ok((Vendor, HardwareType))` - First matching fingerprint
    /// * `Err(BmcError::VendorUnknown)` - No fingerprint matched
    async fn detect(&self, host: &str) -> Result<(Vendor, HardwareType), BmcError>;

    /// Build a driver for a detected BMC; no request is sent until `login`
    ///
    /// # Arguments
    /// * `host` - BMC address
    /// * `vendor` - Detected vendor
    /// * `hardware_type` - Detected hardware type
    /// * `credentials` - Login credentials
    ///
    /// # Returns
    /// * `Ok(Connection)` - Driver ready to log in
    /// * `Err(BmcError)` - No driver for the combination
    fn connect(
        &self,
        host: &str,
        vendor: Vendor,
        hardware_type: HardwareType,
        credentials: &Credentials,
    ) -> Result<Connection, BmcError>;
}
