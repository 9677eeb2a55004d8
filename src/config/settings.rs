//! Configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MultiError, ValidationError};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default interval between plan activity polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default number of consecutive transient failures tolerated while tracking.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Settings of the API client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API host, e.g. `https://ece.example.com:12443`.
    #[serde(default)]
    pub host: String,

    /// API key. Takes precedence over user and password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// User for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password for basic authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Default region for new resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Change tracking settings.
    #[serde(default)]
    pub track: TrackSettings,
}

/// Change tracking settings as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSettings {
    /// Seconds between polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Consecutive transient failures tolerated per resource.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Overall tracking timeout in seconds. Unset means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Change tracking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackConfig {
    /// Interval between plan activity polls.
    pub poll_interval: Duration,
    /// Consecutive transient failures tolerated per resource.
    pub max_retries: u32,
    /// Overall tracking limit.
    pub timeout: Option<Duration>,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

const fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: None,
            user: None,
            password: None,
            region: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            insecure: false,
            track: TrackSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for `host` authenticated with an API key.
    #[must_use]
    pub fn with_api_key(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Returns true if some form of credentials is present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.api_key) || (present(&self.user) && present(&self.password))
    }

    /// Checks that the client can be built from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingApi`] when the host or credentials
    /// are missing.
    pub fn validate(&self) -> Result<(), MultiError<ValidationError>> {
        let mut errors = MultiError::new();
        if self.host.trim().is_empty() || !self.has_credentials() {
            errors.push(ValidationError::MissingApi);
        }
        errors.into_result()
    }
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_secs: None,
        }
    }
}

impl From<TrackSettings> for TrackConfig {
    fn from(settings: TrackSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.poll_interval_secs),
            max_retries: settings.max_retries,
            timeout: settings.timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        TrackSettings::default().into()
    }
}

impl TrackConfig {
    /// Sets the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the overall timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api() {
        let errors = ClientConfig::default().validate().unwrap_err();
        assert_eq!(errors.as_slice(), &[ValidationError::MissingApi]);

        let config = ClientConfig {
            host: String::from("https://ece.local:12443"),
            user: Some(String::from("admin")),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_basic_auth_is_enough() {
        let config = ClientConfig {
            host: String::from("https://ece.local:12443"),
            user: Some(String::from("admin")),
            password: Some(String::from("secret")),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_track_defaults() {
        let config = TrackConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_retries, 3);
        assert!(config.timeout.is_none());
    }
}
