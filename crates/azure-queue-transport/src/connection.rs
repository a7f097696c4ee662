//! DSN and storage connection-string handling.
//!
//! A transport is configured with a DSN in one of two shapes:
//!
//! - `azurequeue-connection-string://<connection string>`: everything after
//!   the prefix is used verbatim as the storage connection string.
//! - `<scheme>://<account name>:<account key>@<host>`: the percent-decoded
//!   credentials are substituted into the default HTTPS connection string.
//!
//! The resulting connection string is then parsed into a
//! [`StorageConnectionString`] to locate the queue endpoint.

use crate::error::ConfigurationError;
use std::collections::HashMap;
use std::fmt;
use url::Url;

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

/// DSN prefix selecting raw connection-string mode
pub const CONNECTION_STRING_SCHEME: &str = "azurequeue-connection-string://";

/// Default DNS suffix for public Azure storage endpoints
pub const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

// Well-known storage emulator account
const DEV_STORAGE_ACCOUNT: &str = "devstoreaccount1";
const DEV_STORAGE_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_STORAGE_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

// ============================================================================
// Connection Descriptor
// ============================================================================

/// Credentials derived once from the DSN
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// Connection string passed through verbatim
    ConnectionString(String),
    /// Account credentials taken from the DSN user-info
    AccountKey {
        account_name: String,
        account_key: String,
    },
}

impl ConnectionDescriptor {
    /// Derive the descriptor from a DSN
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidDsn`] if the DSN is not a URL, or
    /// if it lacks an account name or key.
    pub fn parse(dsn: &str) -> Result<Self, ConfigurationError> {
        if let Some(raw) = dsn.strip_prefix(CONNECTION_STRING_SCHEME) {
            if raw.is_empty() {
                return Err(ConfigurationError::InvalidDsn {
                    message: "connection string after scheme is empty".to_string(),
                });
            }
            return Ok(Self::ConnectionString(raw.to_string()));
        }

        let url = Url::parse(dsn).map_err(|e| ConfigurationError::InvalidDsn {
            message: format!("not a valid URL: {}", e),
        })?;

        let account_name = percent_decode(url.username(), "account name")?;
        let account_key = percent_decode(url.password().unwrap_or_default(), "account key")?;

        if account_name.is_empty() {
            return Err(ConfigurationError::InvalidDsn {
                message: "account name missing from DSN user-info".to_string(),
            });
        }
        if account_key.is_empty() {
            return Err(ConfigurationError::InvalidDsn {
                message: "account key missing from DSN password".to_string(),
            });
        }

        Ok(Self::AccountKey {
            account_name,
            account_key,
        })
    }

    /// The storage connection string this descriptor stands for
    pub fn connection_string(&self) -> String {
        match self {
            Self::ConnectionString(raw) => raw.clone(),
            Self::AccountKey {
                account_name,
                account_key,
            } => format!(
                "DefaultEndpointsProtocol=https;AccountName={};AccountKey={}",
                account_name, account_key
            ),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionString(_) => f
                .debug_tuple("ConnectionString")
                .field(&"<redacted>")
                .finish(),
            Self::AccountKey { account_name, .. } => f
                .debug_struct("AccountKey")
                .field("account_name", account_name)
                .field("account_key", &"<redacted>")
                .finish(),
        }
    }
}

fn percent_decode(value: &str, what: &str) -> Result<String, ConfigurationError> {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| ConfigurationError::InvalidDsn {
            message: format!("{} is not valid percent-encoded UTF-8: {}", what, e),
        })
}

// ============================================================================
// Storage Connection String
// ============================================================================

/// Parsed `Key=Value;` storage connection string
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub protocol: String,
    pub endpoint_suffix: String,
    pub queue_endpoint: Option<String>,
}

impl StorageConnectionString {
    /// Parse a connection string
    ///
    /// Keys are matched case-insensitively. `UseDevelopmentStorage=true`
    /// selects the local storage emulator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidConnectionString`] for segments
    /// without `=`, or when the account name or key is missing.
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let mut settings = HashMap::new();
        let segments = raw.split(';').map(str::trim).filter(|s| !s.is_empty());
        for (index, segment) in segments.enumerate() {
            // Segments may hold secrets, so errors only report the position
            let (key, value) =
                segment
                    .split_once('=')
                    .ok_or_else(|| ConfigurationError::InvalidConnectionString {
                        message: format!("segment {} is not a Key=Value pair", index + 1),
                    })?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Ok(Self::development_storage());
        }

        let account_name = settings.remove("accountname").unwrap_or_default();
        let account_key = settings.remove("accountkey").unwrap_or_default();
        if account_name.is_empty() {
            return Err(ConfigurationError::InvalidConnectionString {
                message: "AccountName is required".to_string(),
            });
        }
        if account_key.is_empty() {
            return Err(ConfigurationError::InvalidConnectionString {
                message: "AccountKey is required".to_string(),
            });
        }

        Ok(Self {
            account_name,
            account_key,
            protocol: settings
                .remove("defaultendpointsprotocol")
                .unwrap_or_else(|| "https".to_string()),
            endpoint_suffix: settings
                .remove("endpointsuffix")
                .unwrap_or_else(|| DEFAULT_ENDPOINT_SUFFIX.to_string()),
            queue_endpoint: settings.remove("queueendpoint"),
        })
    }

    /// Settings for the local storage emulator
    pub fn development_storage() -> Self {
        Self {
            account_name: DEV_STORAGE_ACCOUNT.to_string(),
            account_key: DEV_STORAGE_KEY.to_string(),
            protocol: "http".to_string(),
            endpoint_suffix: DEFAULT_ENDPOINT_SUFFIX.to_string(),
            queue_endpoint: Some(DEV_STORAGE_QUEUE_ENDPOINT.to_string()),
        }
    }

    /// Base URL of the queue service, without a trailing slash
    pub fn queue_endpoint(&self) -> Result<Url, ConfigurationError> {
        let endpoint = match &self.queue_endpoint {
            Some(explicit) => explicit.trim_end_matches('/').to_string(),
            None => format!(
                "{}://{}.queue.{}",
                self.protocol, self.account_name, self.endpoint_suffix
            ),
        };

        Url::parse(&endpoint).map_err(|e| ConfigurationError::InvalidConnectionString {
            message: format!("queue endpoint '{}' is not a valid URL: {}", endpoint, e),
        })
    }
}

impl fmt::Debug for StorageConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("protocol", &self.protocol)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .field("queue_endpoint", &self.queue_endpoint)
            .finish()
    }
}
