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

//! BMC Inventory Library
//!
//! Discovers baseboard management controllers on the subnets handed out by a
//! Kea DHCP server, identifies the vendor behind each one, reads chassis and
//! server inventory over the vendor's web interface and keeps it in SQLite.
//! Every created or changed entity is announced to a callback endpoint.
//!
//! # Architecture
//!
//! - **Domain**: Entities, payload parsers, change detection and the scan/collect services
//! - **Ports**: Interfaces for probing, BMC access, persistence and publishing
//! - **Adapters**: Vendor drivers, SQLite, Kea, TCP/UDP probes and HTTP callbacks
//!
//! # Usage
//!
//! ```rust,no_run
//! use bmc_inventory::{
//!     ConfigurationProvider, ContainerConfig, ServiceContainer, TomlConfigurationProvider,
//! };
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TomlConfigurationProvider::new(None).load().await?;
//!     config.validate()?;
//!
//!     let container = ServiceContainer::new(config, ContainerConfig::default());
//!     let repository = container.create_repository()?;
//!     let notifier = container.create_notifier()?;
//!
//!     let collector = container.create_collecting_service(repository, notifier.clone());
//!     let summary = collector.collect(Vec::new()).await?;
//!     notifier.close().await;
//!
//!     println!("collected {} of {} hosts", summary.collected, summary.hosts);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod container;
pub mod domain;
pub mod ports;

pub use adapters::{
    FileSystemDumper, HttpBmcConnector, HttpChangePublisher, KeaSubnetSource, NetworkProber,
    SqliteInventoryRepository, TomlConfigurationProvider,
};
pub use container::{ContainerConfig, ContainerConfigBuilder, ServiceContainer};
pub use domain::{
    BmcError, CollectError, CollectSummary, ConfigError, EntityKind, HardwareType,
    InventoryConfig, PublishError, RepositoryError, ScanError, ScanRequest, ScanSummary, Vendor,
};
pub use ports::{
    BmcConnector, ChangePublisher, CollectingService, ConfigurationProvider, InventoryRepository,
    PayloadDumper, PortProber, ScanningService, SubnetSource,
};
