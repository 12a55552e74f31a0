//! Configuration loading and validation for the sitewatch server

use crate::types::{Contact, MailerKind, Quotas, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV: &str = "SITEWATCH_CONFIG";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub quotas: QuotaSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub broadcast: BroadcastSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.server.validate()?;
        self.monitor.validate()?;
        self.quotas.validate()?;
        self.notifications.validate()?;
        self.broadcast.validate()?;

        if let Some(contact) = self
            .contacts
            .iter()
            .find(|c| c.owner_id.trim().is_empty() || !validator::validate_email(c.email.as_str()))
        {
            let mut errors = ValidationErrors::new();
            let mut error = ValidationError::new("contact_invalid");
            error.add_param("owner_id".into(), &contact.owner_id);
            errors.add("contacts", error);
            return Err(errors);
        }
        Ok(())
    }
}

/// HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ServerSettings {
    #[validate(custom = "validate_listen_addr")]
    pub listen_addr: String,

    pub metrics_enabled: bool,
}

/// Sweep and probe settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MonitorSettings {
    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_sweep_interval")]
    pub sweep_interval: Duration,

    #[validate(range(min = 1, max = 100))]
    pub chunk_size: usize,

    #[serde(with = "humantime_serde")]
    #[validate(custom = "validate_probe_timeout")]
    pub probe_timeout: Duration,

    #[validate(range(min = 1, max = 1048576))]
    pub max_response_len: usize,

    pub run_on_startup: bool,
}

/// Per-owner limits
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QuotaSettings {
    #[validate(range(min = 1, max = 10000))]
    pub max_websites_per_owner: usize,

    #[validate(range(min = 1, max = 1000))]
    pub max_routes_per_website: usize,
}

/// Alert email settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NotificationSettings {
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,

    #[validate(email)]
    pub from: String,

    #[validate(custom = "validate_mailer")]
    pub mailer: MailerKind,
}

/// Live status channel settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BroadcastSettings {
    #[validate(range(min = 1, max = 65536))]
    pub channel_capacity: usize,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

// Default implementations

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            metrics_enabled: true,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30 * 60),
            chunk_size: 5,
            probe_timeout: Duration::from_secs(10),
            max_response_len: 4096,
            run_on_startup: false,
        }
    }
}

impl Default for QuotaSettings {
    fn default() -> Self {
        let quotas = Quotas::default();
        Self {
            max_websites_per_owner: quotas.max_websites_per_owner,
            max_routes_per_website: quotas.max_routes_per_website,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(24 * 60 * 60),
            from: "alerts@sitewatch.local".to_string(),
            mailer: MailerKind::Log,
        }
    }
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self { channel_capacity: 64 }
    }
}

// Custom validators

fn validate_listen_addr(addr: &str) -> Result<(), ValidationError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("listen_addr_empty"));
    }

    // host:port, host may be a name
    match trimmed.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(ValidationError::new("listen_addr_invalid_format")),
    }
}

fn validate_sweep_interval(interval: &Duration) -> Result<(), ValidationError> {
    if *interval < Duration::from_secs(1) || *interval > Duration::from_secs(24 * 60 * 60) {
        return Err(ValidationError::new("sweep_interval_out_of_range"));
    }
    Ok(())
}

fn validate_probe_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if !(100..=120_000).contains(&millis) {
        return Err(ValidationError::new("probe_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_mailer(mailer: &MailerKind) -> Result<(), ValidationError> {
    match mailer {
        MailerKind::Log => Ok(()),
        MailerKind::Webhook { url } => match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
            _ => Err(ValidationError::new("mailer_url_invalid")),
        },
    }
}

// Configuration loading implementation

impl Config {
    /// Load configuration from `SITEWATCH_CONFIG` or the default search paths
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path));
            }
            tracing::info!("Loading configuration from: {}", path.display());
            return Self::load_from_file(&path);
        }

        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/sitewatch/sitewatch.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./sitewatch.yaml"));

        paths.into_iter().find(|p| p.is_file())
    }

    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/sitewatch/sitewatch.yaml"))
    }

    /// Convert to the internal ServerConfig
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.server.listen_addr.clone(),
            sweep_interval: self.monitor.sweep_interval,
            chunk_size: self.monitor.chunk_size,
            probe_timeout: self.monitor.probe_timeout,
            max_response_len: self.monitor.max_response_len,
            run_on_startup: self.monitor.run_on_startup,
            quotas: Quotas {
                max_websites_per_owner: self.quotas.max_websites_per_owner,
                max_routes_per_website: self.quotas.max_routes_per_website,
            },
            notification_cooldown: self.notifications.cooldown,
            mail_from: self.notifications.from.clone(),
            mailer: self.notifications.mailer.clone(),
            broadcast_capacity: self.broadcast.channel_capacity,
            metrics_enabled: self.server.metrics_enabled,
            contacts: self.contacts.clone(),
        }
    }
}
