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

//! RedFish `ComputerSystem` resources

use crate::domain::CpuSummary;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Collection {
    #[serde(rename = "Members")]
    pub members: Vec<ODataRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ODataRef {
    #[serde(rename = "@odata.id")]
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ComputerSystem {
    pub serial_number: String,
    pub model: String,
    pub host_name: String,
    pub name: String,
    pub bios_version: String,
    pub power_state: String,
    pub status: Status,
    pub processor_summary: ProcessorSummary,
    pub memory_summary: MemorySummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Status {
    pub health: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProcessorSummary {
    pub count: i64,
    pub model: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MemorySummary {
    #[serde(rename = "TotalSystemMemoryGiB")]
    pub total_gib: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Processor {
    pub model: String,
    pub total_cores: i64,
    pub total_threads: i64,
}

impl ComputerSystem {
    pub fn serial(&self) -> String {
        self.serial_number.trim().to_lowercase()
    }

    /// Host name when configured, otherwise the resource name
    pub fn display_name(&self) -> String {
        if self.host_name.trim().is_empty() {
            self.name.trim().to_string()
        } else {
            self.host_name.trim().to_string()
        }
    }

    pub fn power_state(&self) -> String {
        self.power_state.trim().to_lowercase()
    }

    pub fn memory_gb(&self) -> i64 {
        self.memory_summary.total_gib.round() as i64
    }

    /// CPU summary; per-package counts come from the first processor resource
    pub fn cpu(&self, first: Option<&Processor>) -> CpuSummary {
        CpuSummary {
            name: first
                .map(|p| p.model.trim().to_string())
                .unwrap_or_else(|| self.processor_summary.model.trim().to_string()),
            sockets: self.processor_summary.count,
            cores: first.map(|p| p.total_cores).unwrap_or_default(),
            threads: first.map(|p| p.total_threads).unwrap_or_default(),
        }
    }
}
