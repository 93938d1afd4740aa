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

//! Dependency injection container for the inventory services

use crate::adapters::{
    FileSystemDumper, HttpBmcConnector, HttpChangePublisher, KeaSubnetSource, NetworkProber,
    SqliteInventoryRepository,
};
use crate::domain::{CollectionService, InventoryConfig, Notifier, ScanService};
use crate::ports::{
    BmcConnector, CollectingService, InventoryRepository, PayloadDumper, PortProber,
    ScanningService, SubnetSource,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the dependency injection container
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Deadline of each port probe
    pub probe_timeout: Duration,
    /// Hostname recorded on scanned ports; the local hostname when unset
    pub scanned_by: Option<String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(1),
            scanned_by: None,
        }
    }
}

/// Dependency injection container
pub struct ServiceContainer {
    config: ContainerConfig,
    inventory: Arc<InventoryConfig>,
}

impl ServiceContainer {
    /// Create a new service container
    ///
    /// # Arguments
    /// * `inventory` - Validated runtime configuration
    /// * `config` - Container settings
    pub fn new(inventory: InventoryConfig, config: ContainerConfig) -> Self {
        Self {
            config,
            inventory: Arc::new(inventory),
        }
    }

    pub fn inventory_config(&self) -> &InventoryConfig {
        &self.inventory
    }

    /// Hostname recorded on every scanned port
    pub fn scanned_by(&self) -> String {
        if let Some(name) = self.config.scanned_by.as_ref() {
            return name.clone();
        }
        hostname::get()
            .ok()
            .and_then(|name| name.into_string().ok())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Open the SQLite repository at `database.path`
    pub fn create_repository(&self) -> Result<Arc<dyn InventoryRepository>, Box<dyn Error>> {
        let repository = SqliteInventoryRepository::open(&self.inventory.database.path)?;
        Ok(Arc::new(repository))
    }

    pub fn create_prober(&self) -> Arc<dyn PortProber> {
        Arc::new(NetworkProber::new(self.config.probe_timeout))
    }

    pub fn create_subnet_source(&self) -> Arc<dyn SubnetSource> {
        let scanner = &self.inventory.scanner;
        Arc::new(KeaSubnetSource::new(
            &scanner.kea_config,
            &scanner.kea_domain_name_suffix,
        ))
    }

    /// Dumper for unparsable payloads, when `dump.enabled` is set
    pub fn create_payload_dumper(&self) -> Option<Arc<dyn PayloadDumper>> {
        if !self.inventory.dump.enabled {
            return None;
        }
        let dumper: Arc<dyn PayloadDumper> =
            Arc::new(FileSystemDumper::new(&self.inventory.dump.path));
        Some(dumper)
    }

    pub fn create_connector(&self) -> Arc<dyn BmcConnector> {
        let connector = HttpBmcConnector::new(
            self.inventory.http.clone(),
            self.inventory.collector.prefer_redfish,
        );
        match self.create_payload_dumper() {
            Some(dumper) => Arc::new(connector.with_dumper(dumper)),
            None => Arc::new(connector),
        }
    }

    /// Start the change notifier; must be called inside a tokio runtime
    pub fn create_notifier(&self) -> Result<Arc<Notifier>, Box<dyn Error>> {
        let notification = &self.inventory.notification;
        if !notification.enabled {
            log::info!("op=notifier notifications disabled");
            return Ok(Arc::new(Notifier::disabled()));
        }
        let publisher = HttpChangePublisher::new(notification, self.inventory.http.timeout())?;
        Ok(Arc::new(Notifier::start(Arc::new(publisher))))
    }

    /// Create the scanning service
    pub fn create_scanning_service(
        &self,
        repository: Arc<dyn InventoryRepository>,
    ) -> Arc<dyn ScanningService> {
        Arc::new(ScanService::new(
            self.create_subnet_source(),
            self.create_prober(),
            repository,
            self.inventory.scanner.clone(),
            self.scanned_by(),
        ))
    }

    /// Create the collecting service
    pub fn create_collecting_service(
        &self,
        repository: Arc<dyn InventoryRepository>,
        notifier: Arc<Notifier>,
    ) -> Arc<dyn CollectingService> {
        Arc::new(CollectionService::new(
            self.create_connector(),
            repository,
            notifier,
            self.inventory.clone(),
        ))
    }
}

/// Builder pattern for container configuration
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
        }
    }

    /// Set the probe deadline
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Override the hostname recorded on scanned ports
    pub fn scanned_by(mut self, name: &str) -> Self {
        self.config.scanned_by = Some(name.to_string());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ContainerConfig {
        self.config
    }
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
