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

use bmc_inventory::{
    CollectingService, ConfigError, ConfigurationProvider, ContainerConfig, InventoryConfig,
    ScanRequest, ScanningService, ServiceContainer, TomlConfigurationProvider,
};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "bmc_inventory", version, about = "Discover BMCs and keep their inventory")]
struct Opt {
    /// Configuration file; defaults to bmc-inventory.toml in /etc/bmc-toolbox or ~/.bmc-toolbox
    #[arg(long, global = true, env = "BMC_INVENTORY_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the configured subnets for BMC ports
    Scan {
        /// Sites to scan; overrides the configured site list
        #[arg(long = "site")]
        sites: Vec<String>,

        /// Subnets to scan, `all` for every subnet of the selected sites
        #[arg(long = "cidr", default_value = "all")]
        cidrs: Vec<String>,
    },
    /// Read inventory from BMCs found by the last scan, or from the given addresses
    Collect {
        /// BMC addresses to collect instead of the scanned ones
        ips: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Secrets are masked before the configuration is printed
fn redacted(config: &InventoryConfig) -> InventoryConfig {
    let mut config = config.clone();
    let mask = |value: &mut String| {
        if !value.is_empty() {
            *value = "********".to_string();
        }
    };
    mask(&mut config.bmc_pass);
    mask(&mut config.notification.api_key);
    mask(&mut config.collector.default.hp.pass);
    mask(&mut config.collector.default.dell.pass);
    mask(&mut config.collector.default.supermicro.pass);
    config
}

async fn run(opt: Opt, config: InventoryConfig, source: String) -> Result<(), Box<dyn Error>> {
    match opt.command {
        Command::Config => {
            println!("# source: {source}");
            print!("{}", toml::to_string_pretty(&redacted(&config))?);
        }
        Command::Scan { sites, cidrs } => {
            let sites = if sites.is_empty() {
                config.site.clone()
            } else {
                sites
            };
            let container = ServiceContainer::new(config, ContainerConfig::default());
            let repository = container.create_repository()?;
            let scanner = container.create_scanning_service(repository);

            let summary = scanner.scan(ScanRequest { cidrs, sites }).await?;
            println!(
                "Scanned {} subnets, {} hosts: {} of {} probes open",
                summary.subnets, summary.hosts, summary.open, summary.probes
            );
        }
        Command::Collect { ips } => {
            let container = ServiceContainer::new(config, ContainerConfig::default());
            let repository = container.create_repository()?;
            let notifier = container.create_notifier()?;
            let collector = container.create_collecting_service(repository, notifier.clone());

            let result = collector.collect(ips).await;
            notifier.close().await;
            let summary = result?;
            println!(
                "Collected {} of {} hosts ({} failed), {} notifications",
                summary.collected, summary.hosts, summary.failed, summary.notifications
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    let opt = Opt::parse();
    init_logging(opt.verbose);

    let provider = TomlConfigurationProvider::new(opt.config.clone());
    let config = match provider.load().await {
        Ok(config) => config,
        Err(e @ ConfigError::NotFound(_)) => {
            log::error!("op=config {e}");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = config.validate() {
        log::error!("op=config source={} {e}", provider.source());
        return Ok(ExitCode::FAILURE);
    }

    run(opt, config, provider.source()).await?;
    Ok(ExitCode::SUCCESS)
}
