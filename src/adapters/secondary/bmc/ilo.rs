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

//! HP iLO driver for blades and discretes
//!
//! Static identity comes from `/xmldata?item=all`, everything else from the
//! iLO JSON API behind a `sessionKey` session.

use super::client::{from_json, BmcClient};
use super::detect::HP_XMLDATA;
use crate::domain::parsers::hp::{
    parse_xmldata, HealthPhyDrives, HealthTemperature, License, MemInfo, Overview, PowerSummary,
    PowerSupplies, ProcInfo, Rimp,
};
use crate::domain::parsers::{validate_serial, watts_to_kw};
use crate::domain::{BmcError, Credentials, CpuSummary, Disk, LicenseInfo, Nic, Psu, Vendor};
use crate::ports::ServerReader;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

pub const LOGIN_SESSION: &str = "/json/login_session";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginSession {
    session_key: String,
}

pub struct IloReader {
    client: BmcClient,
    credentials: Credentials,
    session: Option<String>,
    xmldata: OnceCell<Rimp>,
    overview: OnceCell<Overview>,
}

impl IloReader {
    pub fn new(client: BmcClient, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
            session: None,
            xmldata: OnceCell::new(),
            overview: OnceCell::new(),
        }
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.as_ref() {
            Some(key) => request.header("Cookie", format!("sessionKey={key}")),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BmcError> {
        let body = self
            .client
            .send(self.with_session(self.client.get(path)))
            .await?;
        self.client.parse(path, &body, from_json).await
    }

    async fn rimp(&self) -> Result<&Rimp, BmcError> {
        self.xmldata
            .get_or_try_init(|| self.client.get_parsed(HP_XMLDATA, parse_xmldata))
            .await
    }

    async fn overview(&self) -> Result<&Overview, BmcError> {
        self.overview
            .get_or_try_init(|| self.get_json("/json/overview"))
            .await
    }
}

#[async_trait]
impl ServerReader for IloReader {
    async fn login(&mut self) -> Result<(), BmcError> {
        let payload = json!({
            "method": "login",
            "user_login": self.credentials.user,
            "password": self.credentials.pass,
        });
        let body = self
            .client
            .send(self.client.post(LOGIN_SESSION).json(&payload))
            .await?;
        let session: LoginSession = self.client.parse(LOGIN_SESSION, &body, from_json).await?;
        if session.session_key.is_empty() {
            return Err(BmcError::LoginFailed);
        }
        log::debug!("op=login ip={} vendor=HP driver=ilo", self.client.host());
        self.session = Some(session.session_key);
        Ok(())
    }

    async fn logout(&mut self) -> Result<(), BmcError> {
        let Some(key) = self.session.take() else {
            return Ok(());
        };
        let payload = json!({ "method": "logout", "session_key": key });
        let request = self.client.post(LOGIN_SESSION).json(&payload);
        let request = request.header("Cookie", format!("sessionKey={key}"));
        self.client.send(request).await?;
        Ok(())
    }

    async fn serial(&self) -> Result<String, BmcError> {
        validate_serial(&self.rimp().await?.serial())
    }

    async fn model(&self) -> Result<String, BmcError> {
        Ok(self.rimp().await?.model())
    }

    async fn name(&self) -> Result<String, BmcError> {
        Ok(self.overview().await?.server_name.trim().to_string())
    }

    async fn status(&self) -> Result<String, BmcError> {
        Ok(self.overview().await?.status())
    }

    async fn bmc_type(&self) -> Result<String, BmcError> {
        Ok(self.rimp().await?.bmc_type())
    }

    async fn bmc_version(&self) -> Result<String, BmcError> {
        Ok(self.rimp().await?.bmc_version())
    }

    async fn bios_version(&self) -> Result<String, BmcError> {
        Ok(self.overview().await?.system_rom.trim().to_string())
    }

    async fn nics(&self) -> Result<Vec<Nic>, BmcError> {
        Ok(self.rimp().await?.nics())
    }

    async fn disks(&self) -> Result<Vec<Disk>, BmcError> {
        let drives: HealthPhyDrives = self.get_json("/json/health_phy_drives").await?;
        Ok(drives.disks())
    }

    async fn psus(&self) -> Result<Vec<Psu>, BmcError> {
        let serial = self.serial().await?;
        let supplies: PowerSupplies = self.get_json("/json/power_supplies").await?;
        Ok(supplies.psus(&serial))
    }

    async fn memory(&self) -> Result<i64, BmcError> {
        let memory: MemInfo = self.get_json("/json/mem_info").await?;
        Ok(memory.gigabytes())
    }

    async fn cpu(&self) -> Result<CpuSummary, BmcError> {
        let processors: ProcInfo = self.get_json("/json/proc_info").await?;
        Ok(processors.summary())
    }

    async fn license(&self) -> Result<LicenseInfo, BmcError> {
        let license: License = self.get_json("/json/license").await?;
        Ok(license.into())
    }

    async fn power_kw(&self) -> Result<f64, BmcError> {
        let power: PowerSummary = self.get_json("/json/power_summary").await?;
        Ok(watts_to_kw(power.last_avg_pwr_accum))
    }

    async fn temp_c(&self) -> Result<i64, BmcError> {
        let temperature: HealthTemperature = self.get_json("/json/health_temperature").await?;
        Ok(temperature.ambient())
    }

    async fn power_state(&self) -> Result<String, BmcError> {
        Ok(self.overview().await?.power.trim().to_lowercase())
    }

    async fn is_blade(&self) -> Result<bool, BmcError> {
        Ok(self.rimp().await?.is_blade())
    }

    fn vendor(&self) -> Vendor {
        Vendor::Hp
    }

    fn address(&self) -> &str {
        self.client.host()
    }
}
