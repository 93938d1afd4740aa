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

//! BMC drivers over HTTPS
//!
//! One driver per controller family, all built on [`client::BmcClient`]:
//!
//! | Vendor | Hardware | Driver |
//! |---|---|---|
//! | HP | Chassis | [`C7000Reader`] |
//! | HP | Blade, Discrete | [`IloReader`] |
//! | Dell | Chassis | [`M1000eReader`] |
//! | Dell | Blade, Discrete | [`IdracReader`] |
//! | Supermicro | Discrete | [`SupermicroReader`] |

pub mod c7000;
pub mod client;
pub mod detect;
pub mod enrich;
pub mod idrac8;
pub mod ilo;
pub mod m1000e;
pub mod redfish;
pub mod supermicro;

pub use c7000::C7000Reader;
pub use client::BmcClient;
pub use enrich::BladeEnricher;
pub use idrac8::IdracReader;
pub use ilo::IloReader;
pub use m1000e::M1000eReader;
pub use redfish::RedfishReader;
pub use supermicro::SupermicroReader;

use crate::domain::{BmcError, Credentials, HardwareType, HttpConfig, Vendor};
use crate::ports::{BmcConnector, Connection, PayloadDumper};
use async_trait::async_trait;
use std::sync::Arc;

/// Detects vendors and builds the matching driver
pub struct HttpBmcConnector {
    http: HttpConfig,
    prefer_redfish: bool,
    dumper: Option<Arc<dyn PayloadDumper>>,
}

impl HttpBmcConnector {
    /// # Arguments
    /// * `http` - Scheme and timeouts shared by every driver
    /// * `prefer_redfish` - Enrich chassis blades over RedFish when available
    pub fn new(http: HttpConfig, prefer_redfish: bool) -> Self {
        Self {
            http,
            prefer_redfish,
            dumper: None,
        }
    }

    /// Dump payloads that fail to parse
    pub fn with_dumper(mut self, dumper: Arc<dyn PayloadDumper>) -> Self {
        self.dumper = Some(dumper);
        self
    }

    fn client(&self, host: &str) -> Result<BmcClient, BmcError> {
        BmcClient::new(host, &self.http, self.dumper.clone())
    }

    fn enricher(&self, credentials: &Credentials) -> BladeEnricher {
        BladeEnricher::new(
            self.http.clone(),
            credentials.clone(),
            self.prefer_redfish,
            self.dumper.clone(),
        )
    }
}

#[async_trait]
impl BmcConnector for HttpBmcConnector {
    async fn detect(&self, host: &str) -> Result<(Vendor, HardwareType), BmcError> {
        let client = BmcClient::with_timeout(host, &self.http, self.http.detect_timeout(), None)?;
        detect::detect(&client).await
    }

    fn connect(
        &self,
        host: &str,
        vendor: Vendor,
        hardware_type: HardwareType,
        credentials: &Credentials,
    ) -> Result<Connection, BmcError> {
        let client = self.client(host)?;
        let credentials = credentials.clone();
        let connection = match (vendor, hardware_type) {
            (Vendor::Hp, HardwareType::Chassis) => Connection::Chassis(Box::new(
                C7000Reader::new(client, self.enricher(&credentials)),
            )),
            (Vendor::Hp, _) => Connection::Server(Box::new(IloReader::new(client, credentials))),
            (Vendor::Dell, HardwareType::Chassis) => {
                let enricher = self.enricher(&credentials);
                Connection::Chassis(Box::new(M1000eReader::new(client, credentials, enricher)))
            }
            (Vendor::Dell, _) => Connection::Server(Box::new(IdracReader::new(client, credentials))),
            (Vendor::Supermicro, HardwareType::Chassis) => {
                return Err(BmcError::NotSupported("supermicro chassis"))
            }
            (Vendor::Supermicro, _) => {
                Connection::Server(Box::new(SupermicroReader::new(client, credentials)))
            }
        };
        Ok(connection)
    }
}
