//! Configuration loading.
//!
//! Sources are applied in order, later ones winning: the YAML file, the
//! `.env` file, `ECECTL_*` environment variables, then command line flags
//! (applied by the caller).

use crate::error::{ConfigError, EceError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::settings::ClientConfig;

/// Directory under the home directory holding the configuration file.
pub const CONFIG_DIR: &str = ".ecectl";

/// Default configuration file name.
pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory searched for `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file yields the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or if an
    /// environment override is malformed.
    pub fn load(&self, path: Option<&Path>) -> Result<ClientConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => self.load_file(&path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    ClientConfig::default()
                }
            },
        };

        self.load_dotenv()?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ClientConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(EceError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EceError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ClientConfig> {
        serde_yaml::from_str(content).map_err(|e| {
            EceError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                EceError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Returns `~/.ecectl/config.yaml`, if a home directory is known.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Applies `ECECTL_*` overrides, reading variables through `lookup`.
///
/// # Errors
///
/// Returns an error if `ECECTL_TIMEOUT` is not a number.
pub fn apply_env_overrides<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("ECECTL_HOST") {
        debug!("Overriding host from environment");
        config.host = host;
    }
    if let Some(key) = lookup("ECECTL_API_KEY") {
        debug!("Overriding api_key from environment");
        config.api_key = Some(key);
    }
    if let Some(user) = lookup("ECECTL_USER") {
        config.user = Some(user);
    }
    if let Some(password) = lookup("ECECTL_PASSWORD") {
        config.password = Some(password);
    }
    if let Some(region) = lookup("ECECTL_REGION") {
        config.region = Some(region);
    }
    if let Some(timeout) = lookup("ECECTL_TIMEOUT") {
        config.timeout_secs = timeout.trim().parse().map_err(|e| {
            EceError::Config(ConfigError::InvalidValue {
                field: String::from("ECECTL_TIMEOUT"),
                message: format!("{e}"),
            })
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let yaml = r"
host: https://ece.local:12443
api_key: secret
region: ece-region
track:
  poll_interval_secs: 5
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(config.host, "https://ece.local:12443");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.track.poll_interval_secs, 5);
        assert_eq!(config.track.max_retries, 3);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: https://ece.local\nuser: admin\npassword: pw").unwrap();

        let config = ConfigParser::new().load_file(file.path()).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigParser::new()
            .load_file(dir.path().join("nope.yaml"))
            .unwrap_err();
        assert!(matches!(err, EceError::Config(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ECECTL_HOST", "https://other:12443"),
            ("ECECTL_API_KEY", "from-env"),
            ("ECECTL_TIMEOUT", "90"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::with_api_key("https://ece.local", "from-file");
        apply_env_overrides(&mut config, |name| vars.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.host, "https://other:12443");
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.timeout_secs, 90);
    }

    #[test]
    fn test_invalid_timeout_override() {
        let mut config = ClientConfig::default();
        let err = apply_env_overrides(&mut config, |name| {
            (name == "ECECTL_TIMEOUT").then(|| String::from("soon"))
        })
        .unwrap_err();
        assert!(matches!(err, EceError::Config(ConfigError::InvalidValue { .. })));
    }
}
