//! Configuration Management
//!
//! Settings come from an optional JSON/YAML file and are overridden by
//! environment variables. Everything is validated once, before the run
//! starts; a missing required option is fatal.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::audit::DEFAULT_REPORT_PREFIX;

/// Default SMTP port when none is configured
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Configuration problems detected at startup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

/// Transport security for the SMTP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain connection
    #[default]
    None,
    /// Upgrade with STARTTLS
    StartTls,
    /// TLS from the first byte
    Tls,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "off" | "false" => Ok(Self::None),
            "starttls" => Ok(Self::StartTls),
            "tls" | "ssl" => Ok(Self::Tls),
            other => Err(format!("unknown TLS mode '{}'", other)),
        }
    }
}

/// Settings as read from file and environment, not yet validated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub tmp_dir: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub report_prefix: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<String>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub smtp_tls: Option<String>,
    #[serde(default)]
    pub smtp_from: Option<String>,
    /// Comma-separated recipient addresses
    #[serde(default)]
    pub smtp_to: Option<String>,
}

impl RawConfig {
    /// Default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcp-inventory").join("config.json"))
    }

    /// Load the config file.
    ///
    /// An explicit path must exist and parse. The default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::parse(&path, &content)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        if is_yaml {
            serde_yaml::from_str(content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            serde_json::from_str(content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        }
    }

    /// Override fields with the process environment
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Override fields with variables from `lookup`; empty values are ignored
    pub fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let fields: [(&str, &mut Option<String>); 10] = [
            ("TMP_DIR", &mut self.tmp_dir),
            ("GCP_BUCKET", &mut self.bucket),
            ("REPORT_PREFIX", &mut self.report_prefix),
            ("SMTP_HOST", &mut self.smtp_host),
            ("SMTP_PORT", &mut self.smtp_port),
            ("SMTP_USER", &mut self.smtp_user),
            ("SMTP_PASSWORD", &mut self.smtp_password),
            ("SMTP_TLS", &mut self.smtp_tls),
            ("SMTP_FROM", &mut self.smtp_from),
            ("SMTP_TO", &mut self.smtp_to),
        ];

        for (name, field) in fields {
            if let Some(value) = get(name) {
                *field = Some(value);
            }
        }

        self
    }

    /// Validate into a [`Config`].
    ///
    /// Delivery settings are only required when `deliver` is set. Every
    /// missing option is reported at once.
    pub fn resolve(self, deliver: bool) -> std::result::Result<Config, ConfigError> {
        let mut missing: Vec<&'static str> = Vec::new();

        let tmp_dir = non_empty(self.tmp_dir);
        if tmp_dir.is_none() {
            missing.push("TMP_DIR");
        }

        let delivery = if deliver {
            let bucket = non_empty(self.bucket);
            let host = non_empty(self.smtp_host);
            let from = non_empty(self.smtp_from);
            let to: Vec<String> = self
                .smtp_to
                .as_deref()
                .map(split_recipients)
                .unwrap_or_default();

            for (name, present) in [
                ("GCP_BUCKET", bucket.is_some()),
                ("SMTP_HOST", host.is_some()),
                ("SMTP_FROM", from.is_some()),
                ("SMTP_TO", !to.is_empty()),
            ] {
                if !present {
                    missing.push(name);
                }
            }

            let port = match non_empty(self.smtp_port) {
                Some(port) => port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                    option: "SMTP_PORT",
                    reason: format!("'{}': {}", port, e),
                })?,
                None => DEFAULT_SMTP_PORT,
            };

            let tls = match non_empty(self.smtp_tls) {
                Some(tls) => tls.parse::<TlsMode>().map_err(|reason| ConfigError::Invalid {
                    option: "SMTP_TLS",
                    reason,
                })?,
                None => TlsMode::default(),
            };

            let credentials = match (non_empty(self.smtp_user), self.smtp_password) {
                (Some(user), Some(password)) => Some(SmtpCredentials { user, password }),
                (None, None) => None,
                (Some(_), None) => {
                    return Err(ConfigError::Invalid {
                        option: "SMTP_PASSWORD",
                        reason: "SMTP_USER is set without a password".to_string(),
                    })
                }
                (None, Some(_)) => {
                    return Err(ConfigError::Invalid {
                        option: "SMTP_USER",
                        reason: "SMTP_PASSWORD is set without a user".to_string(),
                    })
                }
            };

            match (bucket, host, from) {
                (Some(bucket), Some(host), Some(from)) if !to.is_empty() => Some(DeliveryConfig {
                    bucket,
                    smtp: SmtpConfig {
                        host,
                        port,
                        credentials,
                        tls,
                        from,
                        to,
                    },
                }),
                _ => None,
            }
        } else {
            None
        };

        match tmp_dir {
            Some(tmp_dir) if missing.is_empty() => Ok(Config {
                tmp_dir: PathBuf::from(tmp_dir),
                report_prefix: non_empty(self.report_prefix)
                    .unwrap_or_else(|| DEFAULT_REPORT_PREFIX.to_string()),
                delivery,
            }),
            _ => Err(ConfigError::Missing(missing)),
        }
    }
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub tmp_dir: PathBuf,
    pub report_prefix: String,
    /// `None` when delivery is disabled
    pub delivery: Option<DeliveryConfig>,
}

impl Config {
    /// Load file, apply environment, validate
    pub fn load(path: Option<&Path>, deliver: bool) -> Result<Self> {
        let config = RawConfig::load(path)?.with_env().resolve(deliver)?;
        Ok(config)
    }
}

/// Where the finished report goes
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub bucket: String,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Option<SmtpCredentials>,
    pub tls: TlsMode,
    pub from: String,
    pub to: Vec<String>,
}

#[derive(Clone)]
pub struct SmtpCredentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
