//! Configuration for sesrelay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Locations searched by [`Config::load`] when no explicit path is given
const DEFAULT_PATHS: [&str; 2] = ["./sesrelay.toml", "/etc/sesrelay/config.toml"];

/// Prefix for layered environment variables, e.g. `SESRELAY__SES__REGION`
const ENV_PREFIX: &str = "SESRELAY";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Relay policy configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// SES backend configuration
    #[serde(default)]
    pub ses: SesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How sender and recipients reach the send capability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendMode {
    /// Pass sender and recipients as structured request fields
    #[default]
    Structured,
    /// Rewrite the `From:`/`To:` header lines and send the raw bytes only
    HeaderRewrite,
}

/// Relay policy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Regex the envelope sender must match
    pub allow_from: Option<String>,

    /// Regex excluding matching recipients
    pub deny_to: Option<String>,

    /// SES configuration set attached to every send
    pub configuration_set: Option<String>,

    /// Send mode
    #[serde(default)]
    pub mode: SendMode,

    /// Substitute sender
    pub from_override: Option<String>,

    /// Substitute single recipient
    pub to_override: Option<String>,
}

/// SES backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SesConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint (VPC endpoints, testing)
    pub endpoint: Option<String>,

    /// Access key ID
    pub access_key_id: Option<String>,

    /// Secret access key
    pub secret_access_key: Option<String>,

    /// Session token for temporary credentials
    pub session_token: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for SesConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            timeout_ms: default_timeout(),
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_timeout() -> u64 {
    10_000
}

/// Resolved AWS credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl SesConfig {
    /// Endpoint URL requests are sent to
    pub fn endpoint_url(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://email.{}.amazonaws.com/", self.region))
    }

    /// Returns the configured credentials, or an error if the key pair is incomplete
    pub fn credentials(&self) -> crate::Result<Credentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: self.session_token.clone(),
            }),
            _ => Err(crate::Error::Config(
                "SES credentials missing: set ses.access_key_id and ses.secret_access_key \
                 or AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY"
                    .to_string(),
            )),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from file and environment
    ///
    /// The file is either `path` or the first existing default location.
    /// `SESRELAY__<SECTION>__<KEY>` variables override file values, then the
    /// legacy `FROM`/`TO` and `AWS_*` variables are applied.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(crate::Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                builder = builder.add_source(::config::File::from(path));
            }
            None => {
                for candidate in DEFAULT_PATHS {
                    let candidate = PathBuf::from(candidate);
                    if candidate.exists() {
                        debug!(path = %candidate.display(), "Using config file");
                        builder = builder.add_source(::config::File::from(candidate));
                        break;
                    }
                }
            }
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply the legacy environment variables through `lookup`
    ///
    /// `FROM` and `TO` replace the configured overrides. `AWS_*` variables
    /// only fill in credentials the config left unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(from) = lookup("FROM") {
            self.relay.from_override = Some(from);
        }
        if let Some(to) = lookup("TO") {
            self.relay.to_override = Some(to);
        }

        let ses = &mut self.ses;
        if ses.access_key_id.is_none() {
            ses.access_key_id = lookup("AWS_ACCESS_KEY_ID");
        }
        if ses.secret_access_key.is_none() {
            ses.secret_access_key = lookup("AWS_SECRET_ACCESS_KEY");
        }
        if ses.session_token.is_none() {
            ses.session_token = lookup("AWS_SESSION_TOKEN");
        }
        if let Some(region) = lookup("AWS_REGION") {
            if ses.region == default_region() {
                ses.region = region;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay.mode, SendMode::Structured);
        assert!(config.relay.allow_from.is_none());
        assert_eq!(config.ses.region, "us-east-1");
        assert_eq!(config.ses.timeout_ms, 10_000);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[relay]
allow_from = '@example\.com$'
deny_to = 'blocked\.com$'
configuration_set = "relay"
mode = "header_rewrite"
from_override = "noreply@example.com"

[ses]
region = "eu-west-1"
access_key_id = "AKIDEXAMPLE"
secret_access_key = "secret"

[logging]
level = "debug"
format = "text"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.relay.allow_from.as_deref(), Some(r"@example\.com$"));
        assert_eq!(config.relay.deny_to.as_deref(), Some(r"blocked\.com$"));
        assert_eq!(config.relay.configuration_set.as_deref(), Some("relay"));
        assert_eq!(config.relay.mode, SendMode::HeaderRewrite);
        assert_eq!(
            config.relay.from_override.as_deref(),
            Some("noreply@example.com")
        );
        assert!(config.relay.to_override.is_none());
        assert_eq!(config.ses.region, "eu-west-1");
        assert_eq!(config.ses.timeout_ms, 10_000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.relay.mode, SendMode::Structured);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_endpoint_url() {
        let mut ses = SesConfig {
            region: "eu-central-1".to_string(),
            ..Default::default()
        };
        assert_eq!(ses.endpoint_url(), "https://email.eu-central-1.amazonaws.com/");

        ses.endpoint = Some("http://localhost:4566/".to_string());
        assert_eq!(ses.endpoint_url(), "http://localhost:4566/");
    }

    #[test]
    fn test_credentials() {
        let mut ses = SesConfig::default();
        assert!(matches!(ses.credentials(), Err(crate::Error::Config(_))));

        ses.access_key_id = Some("AKIDEXAMPLE".to_string());
        assert!(ses.credentials().is_err());

        ses.secret_access_key = Some("wJalrXUtnFEMI".to_string());
        let credentials = ses.credentials().unwrap();
        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert!(credentials.session_token.is_none());
        assert!(!format!("{:?}", credentials).contains("wJalrXUtnFEMI"));
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = [
            ("FROM", "override@example.com"),
            ("TO", "sink@example.com"),
            ("AWS_ACCESS_KEY_ID", "AKIDENV"),
            ("AWS_SECRET_ACCESS_KEY", "envsecret"),
            ("AWS_REGION", "ap-southeast-2"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.ses.access_key_id = Some("AKIDFILE".to_string());
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.relay.from_override.as_deref(),
            Some("override@example.com")
        );
        assert_eq!(config.relay.to_override.as_deref(), Some("sink@example.com"));
        assert_eq!(config.ses.access_key_id.as_deref(), Some("AKIDFILE"));
        assert_eq!(config.ses.secret_access_key.as_deref(), Some("envsecret"));
        assert!(config.ses.session_token.is_none());
        assert_eq!(config.ses.region, "ap-southeast-2");
    }

    #[test]
    fn test_apply_env_without_variables_keeps_config() {
        let mut config = Config::default();
        config.relay.from_override = Some("file@example.com".to_string());
        config.apply_env(|_| None);

        assert_eq!(
            config.relay.from_override.as_deref(),
            Some("file@example.com")
        );
        assert!(config.relay.to_override.is_none());
    }

    #[test]
    fn test_load_layers_environment_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sesrelay.toml");
        std::fs::write(
            &path,
            r#"
[relay]
configuration_set = "fileset"
deny_to = 'blocked\.com$'

[ses]
region = "eu-west-1"
timeout_ms = 500
"#,
        )
        .unwrap();

        std::env::set_var("SESRELAY__RELAY__CONFIGURATION_SET", "envset");
        std::env::set_var("SESRELAY__SES__TIMEOUT_MS", "7");
        let result = Config::load(Some(&path));
        std::env::remove_var("SESRELAY__RELAY__CONFIGURATION_SET");
        std::env::remove_var("SESRELAY__SES__TIMEOUT_MS");

        let config = result.unwrap();
        assert_eq!(config.relay.configuration_set.as_deref(), Some("envset"));
        assert_eq!(config.relay.deny_to.as_deref(), Some(r"blocked\.com$"));
        assert_eq!(config.ses.timeout_ms, 7);
        assert_eq!(config.ses.region, "eu-west-1");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = Config::load(Some(Path::new("/nonexistent/sesrelay.toml")));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}
