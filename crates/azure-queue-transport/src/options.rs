//! Transport options and layered settings loading.

use crate::error::ConfigurationError;
use crate::message::QueueName;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;

/// Maximum messages Azure returns from one get-messages call
pub const MAX_RESULTS_LIMIT: u32 = 32;

/// Maximum visibility timeout Azure accepts (seven days)
pub const MAX_VISIBILITY_TIMEOUT: u32 = 7 * 24 * 60 * 60;

/// Prefix for environment variables read by [`TransportSettings::load`]
pub const ENV_PREFIX: &str = "AZURE_QUEUE";

// ============================================================================
// Transport Options
// ============================================================================

/// Options recognised by the transport
///
/// Every field has a default, so an empty configuration deserializes. The
/// queue name is only enforced when an operation needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    /// Target queue
    pub queue_name: Option<String>,
    /// Seconds a received message stays hidden from other consumers (1 to 7 days)
    pub visibility_timeout: Option<u32>,
    /// Maximum messages per receive call
    pub results_limit: u32,
    /// Seconds before an unconsumed message expires; `-1` never expires
    pub time_to_live: Option<i64>,
    /// Send the body as plain JSON instead of the envelope
    pub body_only: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            queue_name: None,
            visibility_timeout: None,
            results_limit: 1,
            time_to_live: None,
            body_only: false,
        }
    }
}

impl TransportOptions {
    /// Create options for a queue with all other values defaulted
    pub fn for_queue(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: Some(queue_name.into()),
            ..Self::default()
        }
    }

    /// Set the visibility timeout in seconds
    pub fn with_visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = Some(seconds);
        self
    }

    /// Set the results limit
    pub fn with_results_limit(mut self, limit: u32) -> Self {
        self.results_limit = limit;
        self
    }

    /// Set the time-to-live in seconds
    pub fn with_time_to_live(mut self, seconds: i64) -> Self {
        self.time_to_live = Some(seconds);
        self
    }

    /// Select body-only encoding
    pub fn with_body_only(mut self, body_only: bool) -> Self {
        self.body_only = body_only;
        self
    }

    /// Check every option value
    ///
    /// An unset or empty queue name passes here; [`Self::queue_name`]
    /// reports it when an operation runs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Invalid`] naming the first bad option.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(name) = self.queue_name.as_deref().filter(|n| !n.is_empty()) {
            QueueName::new(name.to_string())?;
        }

        validate_results_limit(self.results_limit)?;

        if let Some(timeout) = self.visibility_timeout {
            validate_visibility_timeout(timeout)?;
        }

        if let Some(ttl) = self.time_to_live {
            if ttl != -1 && ttl < 1 {
                return Err(ConfigurationError::Invalid {
                    key: "time_to_live".to_string(),
                    message: format!("must be -1 or at least 1 second, got {}", ttl),
                });
            }
        }

        Ok(())
    }

    /// The configured queue name
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Missing`] when the name is unset or
    /// empty, and [`ConfigurationError::Invalid`] when it is malformed.
    pub fn queue_name(&self) -> Result<QueueName, ConfigurationError> {
        match self.queue_name.as_deref() {
            Some(name) if !name.is_empty() => QueueName::new(name.to_string()),
            _ => Err(ConfigurationError::Missing {
                key: "queue_name".to_string(),
            }),
        }
    }
}

fn validate_results_limit(limit: u32) -> Result<(), ConfigurationError> {
    if limit == 0 || limit > MAX_RESULTS_LIMIT {
        return Err(ConfigurationError::Invalid {
            key: "results_limit".to_string(),
            message: format!("must be 1-{}, got {}", MAX_RESULTS_LIMIT, limit),
        });
    }
    Ok(())
}

fn validate_visibility_timeout(seconds: u32) -> Result<(), ConfigurationError> {
    // Get Messages rejects 0 with a 400
    if seconds == 0 || seconds > MAX_VISIBILITY_TIMEOUT {
        return Err(ConfigurationError::Invalid {
            key: "visibility_timeout".to_string(),
            message: format!("must be 1-{} seconds, got {}", MAX_VISIBILITY_TIMEOUT, seconds),
        });
    }
    Ok(())
}

// ============================================================================
// Receive Options
// ============================================================================

/// Per-call overrides for [`QueueTransport::receive`](crate::QueueTransport::receive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// Overrides `results_limit`
    pub limit: Option<u32>,
    /// Overrides `visibility_timeout`
    pub visibility_timeout: Option<u32>,
}

impl ReceiveOptions {
    /// Create new receive options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of messages to receive
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set visibility timeout in seconds
    pub fn with_visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = Some(seconds);
        self
    }

    /// Resolve the overrides against the transport options
    pub(crate) fn resolve(
        &self,
        options: &TransportOptions,
    ) -> Result<(u32, Option<u32>), ConfigurationError> {
        let limit = self.limit.unwrap_or(options.results_limit);
        validate_results_limit(limit)?;

        let visibility_timeout = self.visibility_timeout.or(options.visibility_timeout);
        if let Some(timeout) = visibility_timeout {
            validate_visibility_timeout(timeout)?;
        }

        Ok((limit, visibility_timeout))
    }
}

// ============================================================================
// Settings Loading
// ============================================================================

/// Values that take precedence over every settings source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub dsn: Option<String>,
    pub queue_name: Option<String>,
    pub body_only: Option<bool>,
}

/// DSN plus options, as loaded from files and the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    pub dsn: String,
    #[serde(flatten)]
    pub options: TransportOptions,
}

impl TransportSettings {
    /// Load settings
    ///
    /// Sources, later ones overriding earlier ones:
    ///  1. `file`, when given; format is taken from the extension
    ///  2. environment variables prefixed `AZURE_QUEUE__`, for example
    ///     `AZURE_QUEUE__QUEUE_NAME=orders`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Loading`] when a source cannot be read
    /// or a value has the wrong type (including a missing `dsn`), and
    /// [`ConfigurationError::Invalid`] when an option fails validation.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_overrides(file, &SettingsOverrides::default())
    }

    /// Load settings as [`Self::load`] does, then apply `overrides`
    pub fn load_with_overrides(
        file: Option<&Path>,
        overrides: &SettingsOverrides,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .try_parsing(true),
        );

        if let Some(dsn) = &overrides.dsn {
            builder = builder.set_override("dsn", dsn.as_str())?;
        }
        if let Some(queue_name) = &overrides.queue_name {
            builder = builder.set_override("queue_name", queue_name.as_str())?;
        }
        if let Some(body_only) = overrides.body_only {
            builder = builder.set_override("body_only", body_only)?;
        }

        let settings: Self = builder.build()?.try_deserialize()?;

        settings.options.validate()?;
        Ok(settings)
    }
}
