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

//! Pure parsing functions for converting BMC payloads to domain objects
//!
//! These functions are pure (no side effects) and can be easily tested in isolation.
//! They take a response body and return domain objects or parsing errors; the
//! drivers in `adapters::secondary::bmc` own the transport.

pub mod cmc;
pub mod common;
pub mod hp;
pub mod idrac;
pub mod network;
pub mod redfish;
pub mod supermicro;

pub use common::*;
pub use network::{expand_hosts, parse_kea_subnets, select_subnets, ALL};
