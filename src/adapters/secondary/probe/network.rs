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

//! TCP and IPMI port probes

use crate::domain::{ProbeState, Protocol};
use crate::ports::PortProber;
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

/// RMCP presence ping (ASF class, message type 0x80)
pub const RMCP_PING: [u8; 12] = [
    0x06, 0x00, 0xFF, 0x06, 0x00, 0x00, 0x11, 0xBE, 0x80, 0x18, 0x00, 0x00,
];

/// Prober using plain sockets with a fixed per-probe deadline
pub struct NetworkProber {
    deadline: Duration,
}

impl NetworkProber {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    async fn probe_tcp(&self, addr: SocketAddr) -> ProbeState {
        match timeout(self.deadline, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => ProbeState::Open,
            Ok(Err(_)) | Err(_) => ProbeState::Closed,
        }
    }

    async fn probe_ipmi(&self, addr: SocketAddr) -> ProbeState {
        let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                log::debug!("op=probe ip={} bind failed: {}", addr.ip(), e);
                return ProbeState::Closed;
            }
        };
        if let Err(e) = socket.send_to(&RMCP_PING, addr).await {
            log::debug!("op=probe ip={} send failed: {}", addr.ip(), e);
            return ProbeState::Closed;
        }

        let mut buf = [0u8; 64];
        match timeout(self.deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, _))) if n > 0 => ProbeState::Open,
            Ok(Ok(_)) => ProbeState::Closed,
            // ICMP errors and the like still mean something answered
            Ok(Err(_)) => ProbeState::Open,
            Err(_) => ProbeState::Closed,
        }
    }
}

impl Default for NetworkProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PortProber for NetworkProber {
    async fn probe(&self, protocol: &str, host: Ipv4Addr, port: u16) -> ProbeState {
        let addr = SocketAddr::from((host, port));
        match protocol.parse::<Protocol>() {
            Ok(Protocol::Tcp) => self.probe_tcp(addr).await,
            Ok(Protocol::Ipmi) => self.probe_ipmi(addr).await,
            Err(_) => ProbeState::Unsupported,
        }
    }
}
