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

//! File-based payload dumper for responses that failed to parse

use crate::domain::PublishError;
use crate::ports::PayloadDumper;
use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs;

/// Writes raw BMC payloads to `{root}/{host}/{timestamp}`
pub struct FileSystemDumper {
    root: PathBuf,
}

impl FileSystemDumper {
    /// Create a new file system dumper
    ///
    /// # Arguments
    /// * `root` - Directory receiving one sub-directory per host
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PayloadDumper for FileSystemDumper {
    async fn dump(&self, host: &str, payload: &[u8]) -> Result<PathBuf, PublishError> {
        let dir = self.root.join(host.replace(['/', ':'], "_"));
        fs::create_dir_all(&dir).await.map_err(|e| {
            PublishError::SerializationFailed(format!("Failed to create directory: {}", e))
        })?;

        let path = dir.join(Utc::now().format("%Y%m%dT%H%M%S%.6f").to_string());
        fs::write(&path, payload).await.map_err(|e| {
            PublishError::SerializationFailed(format!("Failed to write dump file: {}", e))
        })?;

        log::info!("op=dump ip={} path={}", host, path.display());
        Ok(path)
    }
}
