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

use thiserror::Error;

/// Errors raised while talking to a BMC
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BmcError {
    /// None of the vendor fingerprints matched
    #[error("unable to identify the BMC vendor of {0}")]
    VendorUnknown(String),
    /// Credentials were rejected
    #[error("login failed")]
    LoginFailed,
    /// Endpoint answered 404
    #[error("page not found: {0}")]
    PageNotFound(String),
    /// Payload parsed but carried no usable root
    #[error("unable to read data: {0}")]
    UnableToReadData(String),
    /// Serial missing or a known placeholder
    #[error("invalid serial: {0:?}")]
    InvalidSerial(String),
    /// BMC answered 500
    #[error("endpoint returned an internal error: {0}")]
    RedFishEndPoint500(String),
    /// Malformed payload
    #[error("failed to parse payload from {url}: {message}")]
    Parse { url: String, message: String },
    /// Connection, TLS or timeout failure
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    /// Any other non-success status
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { url: String, status: u16 },
    /// The driver does not expose this capability
    #[error("{0} is not supported by this driver")]
    NotSupported(&'static str),
}

/// Errors raised by the inventory repository
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(String),
    /// Filter or lookup referenced a column the entity does not have
    #[error("unknown field '{field}' for {table}")]
    UnknownField { table: String, field: String },
    /// Entity could not be mapped to or from a row
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Entity failed validation before the write
    #[error("invalid entity: {0}")]
    InvalidEntity(String),
}

/// Errors raised while parsing query filters and pagination
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    #[error("unsupported pagination parameter: {0}")]
    UnsupportedPagination(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Errors specific to a scan pass
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScanError {
    /// Scanner settings are unusable
    #[error("invalid scanner configuration: {0}")]
    InvalidConfiguration(String),
    /// DHCP configuration could not be loaded
    #[error("failed to load subnets: {0}")]
    SubnetsUnavailable(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors specific to a collection pass or a single host
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollectError {
    #[error(transparent)]
    Bmc(#[from] BmcError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    /// Worker panicked while holding the host
    #[error("collection aborted: {0}")]
    Aborted(String),
}

/// Errors specific to publishing change notifications
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PublishError {
    /// Network/HTTP operation failed
    #[error("Network operation failed: {0}")]
    NetworkFailed(String),
    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    /// Endpoint answered with something other than 200
    #[error("Endpoint rejected callback with HTTP {0}")]
    Rejected(u16),
    /// Serialization or file output failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

/// Errors raised while loading configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// No configuration file in any search path
    #[error("no configuration file found in {0:?}")]
    NotFound(Vec<String>),
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// Required options are unset
    #[error("missing required options: {}", .0.join(", "))]
    MissingOptions(Vec<String>),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_options_lists_every_key() {
        let err = ConfigError::MissingOptions(vec!["bmc_user".into(), "site".into()]);
        assert_eq!(err.to_string(), "missing required options: bmc_user, site");
    }

    #[test]
    fn test_repository_error_wraps_into_collect_error() {
        let err: CollectError = RepositoryError::Database("locked".into()).into();
        assert_eq!(err.to_string(), "database error: locked");
    }
}
