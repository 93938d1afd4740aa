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

use crate::domain::ProbeState;
use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Secondary port - Liveness probe of a single (host, port, protocol) tuple
///
/// Implementations never fail: refused connections, timeouts and socket errors
/// all map to a [`ProbeState`].
#[async_trait]
pub trait PortProber: Send + Sync {
    /// Probe one port
    ///
    /// # Arguments
    /// * `protocol` - `tcp` or `ipmi`; anything else is unsupported
    /// * `host` - Target address
    /// * `port` - Target port
    ///
    /// # Returns
    /// * `ProbeState` - open, closed or unsupported
    async fn probe(&self, protocol: &str, host: Ipv4Addr, port: u16) -> ProbeState;
}
