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

//! TOML configuration file provider

use crate::domain::{ConfigError, InventoryConfig, CONFIG_FILE_NAME};
use crate::ports::ConfigurationProvider;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Directories searched for `bmc-inventory.toml`, in order
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/bmc-toolbox").join(CONFIG_FILE_NAME)];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(Path::new(&home).join(".bmc-toolbox").join(CONFIG_FILE_NAME));
    }
    paths
}

/// Configuration provider reading the first existing TOML file
pub struct TomlConfigurationProvider {
    candidates: Vec<PathBuf>,
}

impl TomlConfigurationProvider {
    /// Provider for an explicit file, or the default search paths when `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        let candidates = match path {
            Some(path) => vec![path],
            None => default_search_paths(),
        };
        Self { candidates }
    }

    fn locate(&self) -> Option<&PathBuf> {
        self.candidates.iter().find(|p| p.is_file())
    }
}

#[async_trait]
impl ConfigurationProvider for TomlConfigurationProvider {
    async fn load(&self) -> Result<InventoryConfig, ConfigError> {
        let path = self.locate().ok_or_else(|| {
            ConfigError::NotFound(
                self.candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect(),
            )
        })?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        log::debug!("op=config path={}", path.display());
        InventoryConfig::from_toml_str(&content)
    }

    fn source(&self) -> String {
        match self.locate() {
            Some(path) => path.display().to_string(),
            None => "defaults".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn test_loads_explicit_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child(CONFIG_FILE_NAME);
        file.write_str(
            r#"
site = ["ams4"]
bmc_user = "inventory"
bmc_pass = "s3cret"

[database]
path = "/var/lib/bmc-inventory/inventory.db"
"#,
        )
        .unwrap();

        let provider = TomlConfigurationProvider::new(Some(file.path().to_path_buf()));
        let config = provider.load().await.unwrap();
        assert_eq!(config.site, vec!["ams4".to_string()]);
        assert_eq!(config.scanner.concurrency, 100);
        assert!(config.validate().is_ok());
        assert_eq!(provider.source(), file.path().display().to_string());
    }

    #[tokio::test]
    async fn test_missing_file_lists_candidates() {
        let provider = TomlConfigurationProvider::new(Some(PathBuf::from("/nonexistent/x.toml")));
        let err = provider.load().await.unwrap_err();
        assert_eq!(err, ConfigError::NotFound(vec!["/nonexistent/x.toml".to_string()]));
        assert_eq!(provider.source(), "defaults");
    }

    #[tokio::test]
    async fn test_malformed_file_is_a_parse_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child(CONFIG_FILE_NAME);
        file.write_str("site = [").unwrap();

        let provider = TomlConfigurationProvider::new(Some(file.path().to_path_buf()));
        assert!(matches!(provider.load().await, Err(ConfigError::Parse(_))));
    }
}
