// src/config/mod.rs - Configuration loading for the chat watch

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use url::Url;

use crate::types::{KeywordEntry, DEFAULT_PREFIX_COLOR};

pub const DEFAULT_CONFIG_PATH: &str = "config/chatwatch.yaml";
pub const CONFIG_PATH_ENV: &str = "CHATWATCH_CONFIG";
pub const WEBHOOK_URL_ENV: &str = "CHATWATCH_WEBHOOK_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid TOML: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("could not encode TOML: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

/// Everything the watch reads at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfiguration {
    /// Append matched messages to the category log files
    pub create_server_logs: bool,
    /// Forward matches to the webhook
    pub send_logs_to_webhook: bool,
    pub webhook_url: String,

    pub log_directory: PathBuf,
    pub general_log_name: String,
    pub obscene_log_name: String,

    /// Messages starting with this are commands and never inspected
    pub command_prefix: String,

    pub max_concurrent_notifications: usize,
    pub notification_queue_size: usize,

    /// Checked after the obscene list, in order
    pub general_keywords: Vec<KeywordEntry>,
    /// Always checked first, in order
    pub obscene_keywords: Vec<KeywordEntry>,
}

impl Default for WatchConfiguration {
    fn default() -> Self {
        Self {
            create_server_logs: true,
            send_logs_to_webhook: false,
            webhook_url: String::new(),
            log_directory: PathBuf::from("logs/chatwatch"),
            general_log_name: "chatwatch-general.log".to_string(),
            obscene_log_name: "chatwatch-obscene.log".to_string(),
            command_prefix: "/".to_string(),
            max_concurrent_notifications: 4,
            notification_queue_size: 256,
            general_keywords: Vec::new(),
            obscene_keywords: Vec::new(),
        }
    }
}

impl WatchConfiguration {
    /// Default document written on first start, with one illustrative entry
    pub fn with_sample_entry() -> Self {
        let mut config = Self::default();
        config.general_keywords.push(KeywordEntry {
            trigger: "placekeywordhere".to_string(),
            exact_match: false,
            auto_reply: true,
            reply_message: "This is a test message including a <a href=\"https://example.com\">Link</a>!"
                .to_string(),
            prefix: "Info:".to_string(),
            prefix_color: DEFAULT_PREFIX_COLOR.to_string(),
            cooldown_seconds: 300,
        });
        config
    }

    /// Webhook target when notifications are switched on and a URL is set
    pub fn webhook_target(&self) -> Option<&str> {
        if self.send_logs_to_webhook && !self.webhook_url.trim().is_empty() {
            Some(self.webhook_url.trim())
        } else {
            None
        }
    }

    /// Problems worth reporting; none of them stop the watch from running
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (list, entries) in [("general", &self.general_keywords), ("obscene", &self.obscene_keywords)] {
            for (index, entry) in entries.iter().enumerate() {
                if entry.is_blank() {
                    problems.push(format!("{} keyword #{} has an empty trigger", list, index + 1));
                }
                if entry.auto_reply && entry.reply_message.is_empty() {
                    problems.push(format!(
                        "{} keyword '{}' has auto_reply enabled but no reply_message",
                        list, entry.trigger
                    ));
                }
            }
        }

        if self.send_logs_to_webhook {
            if self.webhook_url.trim().is_empty() {
                problems.push("send_logs_to_webhook is enabled but webhook_url is empty".to_string());
            } else if let Err(e) = Url::parse(self.webhook_url.trim()) {
                problems.push(format!("webhook_url is not a valid URL: {}", e));
            }
        }

        if self.command_prefix.is_empty() {
            problems.push("command_prefix is empty".to_string());
        }

        problems
    }

    /// Disable notifications whose URL cannot be parsed
    fn sanitize(&mut self) {
        if self.send_logs_to_webhook && !self.webhook_url.trim().is_empty() {
            if let Err(e) = Url::parse(self.webhook_url.trim()) {
                warn!("Disabling webhook notifications, invalid URL '{}': {}", self.webhook_url, e);
                self.send_logs_to_webhook = false;
            }
        }
    }

    /// Apply overrides from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(WEBHOOK_URL_ENV) {
            if !url.trim().is_empty() {
                info!("Using webhook URL from {}", WEBHOOK_URL_ENV);
                self.webhook_url = url.trim().to_string();
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }

    fn decode(self, content: &str) -> Result<WatchConfiguration, ConfigError> {
        Ok(match self {
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
            ConfigFormat::Toml => toml::from_str(content)?,
        })
    }

    fn encode(self, config: &WatchConfiguration) -> Result<String, ConfigError> {
        Ok(match self {
            ConfigFormat::Yaml => serde_yaml::to_string(config)?,
            ConfigFormat::Json => serde_json::to_string_pretty(config)?,
            ConfigFormat::Toml => toml::to_string_pretty(config)?,
        })
    }
}

/// Reads the configuration document once at startup
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config_path: PathBuf,
}

impl ConfigurationManager {
    pub fn new<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Path from `CHATWATCH_CONFIG`, falling back to the default location
    pub fn from_env() -> Self {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the configuration, never failing.
    ///
    /// A missing file is replaced by the default document. A file that
    /// cannot be read or parsed is left untouched and defaults are used.
    pub async fn load_or_create(&self) -> WatchConfiguration {
        let mut config = match self.load().await {
            Ok(config) => {
                info!("Loaded configuration from {}", self.config_path.display());
                config
            }
            Err(ConfigError::NotFound(_)) => {
                let config = WatchConfiguration::with_sample_entry();
                match self.save(&config).await {
                    Ok(()) => info!("Created default configuration: {}", self.config_path.display()),
                    Err(e) => warn!("Could not write default configuration: {}", e),
                }
                config
            }
            Err(e) => {
                error!("Failed to load configuration, using defaults: {}", e);
                WatchConfiguration::with_sample_entry()
            }
        };

        config.apply_env_overrides();
        for problem in config.validate() {
            warn!("Configuration: {}", problem);
        }
        config.sanitize();

        debug!(
            "{} general and {} obscene keywords configured",
            config.general_keywords.len(),
            config.obscene_keywords.len()
        );
        config
    }

    pub async fn load(&self) -> Result<WatchConfiguration, ConfigError> {
        let format = ConfigFormat::from_path(&self.config_path)?;
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let content = fs::read_to_string(&self.config_path)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.config_path.clone(),
                source,
            })?;
        format.decode(&content)
    }

    pub async fn save(&self, config: &WatchConfiguration) -> Result<(), ConfigError> {
        let format = ConfigFormat::from_path(&self.config_path)?;
        let content = format.encode(config)?;

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        fs::write(&self.config_path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: self.config_path.clone(),
                source,
            })
    }
}
