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

//! Vendor fingerprinting

use super::client::BmcClient;
use crate::domain::parsers::hp::parse_xmldata;
use crate::domain::{BmcError, HardwareType, Vendor};

pub const HP_XMLDATA: &str = "/xmldata?item=all";
pub const IDRAC_LOGIN: &str = "/data/login";
pub const CMC_LOGIN: &str = "/cgi-bin/webcgi/login";
pub const SUPERMICRO_LOGIN: &str = "/cgi/login.cgi";

/// Identify the vendor and hardware type behind a BMC
///
/// Fingerprints are tried in order and the first match wins: HP xmldata,
/// the iDRAC login page, the CMC login page, then the Supermicro login page.
/// Transport failures on one fingerprint move on to the next.
///
/// # Returns
/// * `Ok((Vendor, HardwareType))` - First matching fingerprint
/// * `Err(BmcError::VendorUnknown)` - Nothing matched
pub async fn detect(client: &BmcClient) -> Result<(Vendor, HardwareType), BmcError> {
    let host = client.host();

    match client.send(client.get(HP_XMLDATA)).await {
        Ok(body) => {
            if let Some(hardware_type) = parse_xmldata(&body)
                .ok()
                .and_then(|rimp| rimp.hardware_type())
            {
                return Ok((Vendor::Hp, hardware_type));
            }
        }
        Err(e) => log::debug!("op=detect ip={host} probe=hp error={e}"),
    }

    let fingerprints = [
        (IDRAC_LOGIN, Vendor::Dell, HardwareType::Blade),
        (CMC_LOGIN, Vendor::Dell, HardwareType::Chassis),
        (SUPERMICRO_LOGIN, Vendor::Supermicro, HardwareType::Discrete),
    ];
    for (path, vendor, hardware_type) in fingerprints {
        match client.probe(path).await {
            Ok(200) => return Ok((vendor, hardware_type)),
            Ok(status) => log::debug!("op=detect ip={host} path={path} status={status}"),
            Err(e) => log::debug!("op=detect ip={host} path={path} error={e}"),
        }
    }

    Err(BmcError::VendorUnknown(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::secondary::bmc::client::testing::*;
    use crate::domain::parsers::hp::fixtures::{BLADE_XML, DISCRETE_XML, ENCLOSURE_XML};
    use httpmock::prelude::*;

    async fn detect_with(server: &MockServer) -> Result<(Vendor, HardwareType), BmcError> {
        let client = BmcClient::new(&host_of(server), &http_config(), None).unwrap();
        detect(&client).await
    }

    async fn serve_xmldata(server: &MockServer, body: &str) {
        server
            .mock_async(|when, then| {
                when.method(GET).path("/xmldata").query_param("item", "all");
                then.status(200).body(body);
            })
            .await;
    }

    #[tokio::test]
    async fn test_infra2_is_hp_chassis() {
        let server = MockServer::start_async().await;
        serve_xmldata(&server, ENCLOSURE_XML).await;
        assert_eq!(
            detect_with(&server).await.unwrap(),
            (Vendor::Hp, HardwareType::Chassis)
        );
    }

    #[tokio::test]
    async fn test_hp_blade_and_discrete() {
        let server = MockServer::start_async().await;
        serve_xmldata(&server, BLADE_XML).await;
        assert_eq!(
            detect_with(&server).await.unwrap(),
            (Vendor::Hp, HardwareType::Blade)
        );

        let server = MockServer::start_async().await;
        serve_xmldata(&server, DISCRETE_XML).await;
        assert_eq!(
            detect_with(&server).await.unwrap(),
            (Vendor::Hp, HardwareType::Discrete)
        );
    }

    #[tokio::test]
    async fn test_only_supermicro_login_answers() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(SUPERMICRO_LOGIN);
                then.status(200).body("<html>login</html>");
            })
            .await;
        assert_eq!(
            detect_with(&server).await.unwrap(),
            (Vendor::Supermicro, HardwareType::Discrete)
        );
    }

    #[tokio::test]
    async fn test_cmc_login_is_dell_chassis() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(CMC_LOGIN);
                then.status(200);
            })
            .await;
        assert_eq!(
            detect_with(&server).await.unwrap(),
            (Vendor::Dell, HardwareType::Chassis)
        );
    }

    #[tokio::test]
    async fn test_nothing_matches() {
        let server = MockServer::start_async().await;
        assert!(matches!(
            detect_with(&server).await,
            Err(BmcError::VendorUnknown(_))
        ));
    }
}
