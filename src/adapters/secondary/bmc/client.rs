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

//! Shared HTTP transport of the BMC drivers

use crate::domain::{BmcError, HttpConfig};
use crate::ports::PayloadDumper;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// A response whose status has already been checked
#[derive(Debug, Clone)]
pub struct Reply {
    /// Final URL after redirects
    pub url: String,
    pub body: String,
}

/// HTTP client bound to one BMC
///
/// TLS verification is disabled and idle connections are never reused. Each
/// driver owns its client, so the cookie jar is local to one session.
pub struct BmcClient {
    client: Client,
    base: String,
    host: String,
    dumper: Option<Arc<dyn PayloadDumper>>,
}

impl BmcClient {
    /// Create a client with the total timeout from `http`
    ///
    /// # Arguments
    /// * `host` - BMC address
    /// * `http` - Scheme and timeouts
    /// * `dumper` - Where to write payloads that fail to parse
    pub fn new(
        host: &str,
        http: &HttpConfig,
        dumper: Option<Arc<dyn PayloadDumper>>,
    ) -> Result<Self, BmcError> {
        Self::with_timeout(host, http, http.timeout(), dumper)
    }

    /// Create a client with an explicit total timeout
    pub fn with_timeout(
        host: &str,
        http: &HttpConfig,
        timeout: Duration,
        dumper: Option<Arc<dyn PayloadDumper>>,
    ) -> Result<Self, BmcError> {
        let base = format!("{}://{}", http.scheme, host);
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .connect_timeout(http.connect_timeout())
            .pool_max_idle_per_host(0)
            .cookie_store(true)
            .build()
            .map_err(|e| BmcError::Transport {
                url: base.clone(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base,
            host: host.to_string(),
            dumper,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Absolute URL of a path on the BMC
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    /// Send a request and read the whole body
    ///
    /// # Returns
    /// * `Ok(Reply)` - 2xx response
    /// * `Err(BmcError::PageNotFound)` - 404
    /// * `Err(BmcError::LoginFailed)` - 401 or 403
    /// * `Err(BmcError::RedFishEndPoint500)` - 500
    /// * `Err(BmcError)` - Any other status or a transport failure
    pub async fn fetch(&self, request: RequestBuilder) -> Result<Reply, BmcError> {
        let (status, url, body) = self.exchange(request).await?;
        check_status(status, &url)?;
        Ok(Reply { url, body })
    }

    /// Send a request and return the body of a successful response
    pub async fn send(&self, request: RequestBuilder) -> Result<String, BmcError> {
        Ok(self.fetch(request).await?.body)
    }

    /// Status of a GET without interpreting it; used for fingerprinting
    pub async fn probe(&self, path: &str) -> Result<u16, BmcError> {
        let (status, _, _) = self.exchange(self.get(path)).await?;
        Ok(status.as_u16())
    }

    async fn exchange(
        &self,
        request: RequestBuilder,
    ) -> Result<(StatusCode, String, String), BmcError> {
        let request = request.build().map_err(|e| BmcError::Transport {
            url: self.base.clone(),
            message: e.to_string(),
        })?;
        let url = request.url().to_string();
        log::debug!("op=http host={} method={} url={}", self.host, request.method(), url);

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| BmcError::Transport {
                url: url.clone(),
                message: e.to_string(),
            })?;
        let status = response.status();
        let final_url = response.url().to_string();
        // Drain the body so the connection is released before the next request
        let body = response.text().await.map_err(|e| BmcError::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok((status, final_url, body))
    }

    /// Run a parser over a payload, dumping the payload when it is rejected
    ///
    /// # Arguments
    /// * `path` - Endpoint the payload came from, for error context
    /// * `body` - Raw payload
    /// * `parser` - Pure parsing function
    pub async fn parse<T, F>(&self, path: &str, body: &str, parser: F) -> Result<T, BmcError>
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        match parser(body) {
            Ok(value) => Ok(value),
            Err(message) => {
                self.dump(body).await;
                Err(BmcError::Parse {
                    url: self.url(path),
                    message,
                })
            }
        }
    }

    /// GET a path and parse its body
    pub async fn get_parsed<T, F>(&self, path: &str, parser: F) -> Result<T, BmcError>
    where
        F: FnOnce(&str) -> Result<T, String>,
    {
        let body = self.send(self.get(path)).await?;
        self.parse(path, &body, parser).await
    }

    /// Write a payload through the configured dumper, if any
    pub async fn dump(&self, body: &str) {
        let Some(dumper) = self.dumper.as_ref() else {
            return;
        };
        match dumper.dump(&self.host, body.as_bytes()).await {
            Ok(path) => log::info!("op=dump ip={} path={}", self.host, path.display()),
            Err(e) => log::warn!("op=dump ip={} error={}", self.host, e),
        }
    }
}

fn check_status(status: StatusCode, url: &str) -> Result<(), BmcError> {
    match status.as_u16() {
        200..=299 => Ok(()),
        401 | 403 => Err(BmcError::LoginFailed),
        404 => Err(BmcError::PageNotFound(url.to_string())),
        500 => Err(BmcError::RedFishEndPoint500(url.to_string())),
        other => Err(BmcError::UnexpectedStatus {
            url: url.to_string(),
            status: other,
        }),
    }
}

/// Parse JSON into a serde type, for use with [`BmcClient::parse`]
pub fn from_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, String> {
    serde_json::from_str(body).map_err(|e| e.to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::adapters::FileSystemDumper;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start_async().await;
        let routes = [("/missing", 404), ("/denied", 401), ("/broken", 500), ("/teapot", 418)];
        for (path, status) in routes {
            server
                .mock_async(|when, then| {
                    when.method(GET).path(path);
                    then.status(status);
                })
                .await;
        }
        let client = BmcClient::new(&host_of(&server), &http_config(), None).unwrap();

        assert!(matches!(
            client.send(client.get("/missing")).await,
            Err(BmcError::PageNotFound(_))
        ));
        assert_eq!(
            client.send(client.get("/denied")).await,
            Err(BmcError::LoginFailed)
        );
        assert!(matches!(
            client.send(client.get("/broken")).await,
            Err(BmcError::RedFishEndPoint500(_))
        ));
        assert!(matches!(
            client.send(client.get("/teapot")).await,
            Err(BmcError::UnexpectedStatus { status: 418, .. })
        ));
        assert_eq!(client.probe("/missing").await.unwrap(), 404);
    }

    #[tokio::test]
    async fn test_unparsable_payload_is_dumped() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/json/overview");
                then.status(200).body("<html>not json</html>");
            })
            .await;
        let root = tempfile::tempdir().unwrap();
        let dumper: Arc<dyn PayloadDumper> = Arc::new(FileSystemDumper::new(root.path()));
        let client = BmcClient::new(&host_of(&server), &http_config(), Some(dumper)).unwrap();

        let result: Result<serde_json::Value, _> =
            client.get_parsed("/json/overview", from_json).await;
        assert!(matches!(result, Err(BmcError::Parse { .. })));

        let host_dir = std::fs::read_dir(root.path()).unwrap().next().unwrap().unwrap();
        let dumped = std::fs::read_dir(host_dir.path()).unwrap().next().unwrap().unwrap();
        assert_eq!(
            std::fs::read_to_string(dumped.path()).unwrap(),
            "<html>not json</html>"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let client = BmcClient::new("127.0.0.1:9", &http_config(), None).unwrap();
        assert!(matches!(
            client.send(client.get("/")).await,
            Err(BmcError::Transport { .. })
        ));
    }
}
