//! Configuration management for pulsed.
//!
//! Loads settings from /etc/pulse/config.toml (or an explicit path) and
//! falls back to defaults. A handful of environment variables override the
//! file so containers can be configured without one.

use anyhow::{Context, Result};
use pulse_shared::thresholds::{MetricKind, Threshold, ThresholdSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/pulse/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/pulse/config.toml";

/// Shipped webhook secret; running with it is flagged during setup checks.
pub const DEFAULT_WEBHOOK_SECRET: &str = "pulse-webhook";

/// Placeholder host left in sample configs; treated as unconfigured.
pub const PLACEHOLDER_HOST: &str = "your-environment";

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used in the webhook config template
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            public_url: None,
        }
    }
}

/// APM provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Tenant base URL; empty means demo mode
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub api_token: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Services analyzed per cycle
    #[serde(default = "default_service_limit")]
    pub service_limit: usize,

    /// Budget for one whole live aggregation
    #[serde(default = "default_aggregation_timeout")]
    pub aggregation_timeout_secs: u64,

    /// Retry attempts per provider request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_service_limit() -> usize {
    10
}

fn default_aggregation_timeout() -> u64 {
    60
}

fn default_max_attempts() -> usize {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_token: String::new(),
            timeout_secs: default_request_timeout(),
            service_limit: default_service_limit(),
            aggregation_timeout_secs: default_aggregation_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ProviderConfig {
    /// True when no real tenant is configured.
    pub fn is_demo(&self) -> bool {
        let url = self.url.trim();
        url.is_empty() || url.contains(PLACEHOLDER_HOST)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn aggregation_timeout(&self) -> Duration {
        Duration::from_secs(self.aggregation_timeout_secs)
    }
}

/// Inbound webhook settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret expected in the x-pulse-token header
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Ring buffer capacity
    #[serde(default = "default_max_events")]
    pub max_stored_events: usize,
}

fn default_secret() -> String {
    DEFAULT_WEBHOOK_SECRET.to_string()
}

fn default_max_events() -> usize {
    100
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            max_stored_events: default_max_events(),
        }
    }
}

/// Threshold overrides; any kind left out keeps its default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default)]
    pub cpu: Option<Threshold>,
    #[serde(default)]
    pub memory: Option<Threshold>,
    #[serde(default)]
    pub response_time: Option<Threshold>,
    #[serde(default)]
    pub error_rate: Option<Threshold>,
    #[serde(default)]
    pub disk_usage: Option<Threshold>,
}

impl ThresholdsConfig {
    /// Defaults with overrides applied. Built once at startup.
    pub fn build(&self) -> ThresholdSet {
        let overrides = [
            (MetricKind::Cpu, self.cpu),
            (MetricKind::Memory, self.memory),
            (MetricKind::ResponseTime, self.response_time),
            (MetricKind::ErrorRate, self.error_rate),
            (MetricKind::DiskUsage, self.disk_usage),
        ];
        overrides
            .into_iter()
            .fold(ThresholdSet::default(), |set, (kind, t)| match t {
                Some(t) => set.with(kind, t),
                None => set,
            })
    }
}

/// Periodic job intervals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u64,
}

fn default_health_interval() -> u64 {
    120
}

fn default_analysis_interval() -> u64 {
    900
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            analysis_interval_secs: default_analysis_interval(),
        }
    }
}

/// Chat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Exchanges remembered per session
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Load config and apply environment overrides. An explicit path must
    /// load; the implicit paths fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => Self::load_from_path(Path::new(CONFIG_PATH))
                .or_else(|_| Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH)))
                .unwrap_or_else(|e| {
                    warn!("Config not found, using defaults: {}", e);
                    Config::default()
                }),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply DYNATRACE_URL, DYNATRACE_API_TOKEN, WEBHOOK_SECRET and PORT.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DYNATRACE_URL") {
            self.provider.url = url;
        }
        if let Some(token) = lookup("DYNATRACE_API_TOKEN") {
            self.provider.api_token = token;
        }
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            self.webhook.secret = secret;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn thresholds(&self) -> ThresholdSet {
        self.thresholds.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.provider.service_limit, 10);
        assert_eq!(config.webhook.max_stored_events, 100);
        assert_eq!(config.schedule.health_interval_secs, 120);
        assert_eq!(config.schedule.analysis_interval_secs, 900);
        assert_eq!(config.chat.history_limit, 10);
        assert!(config.provider.is_demo());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
[provider]
url = "https://abc123.live.dynatrace.com"
api_token = "dt0c01.secret"
service_limit = 4

[thresholds.cpu]
warning = 60.0
critical = 75.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.service_limit, 4);
        // Defaults for missing fields
        assert_eq!(config.provider.timeout_secs, 30);
        assert!(!config.provider.is_demo());

        let set = config.thresholds();
        assert_eq!(
            set.classify(MetricKind::Cpu, 70.0).unwrap(),
            pulse_shared::Status::Warning
        );
        assert_eq!(set.get(MetricKind::Memory).unwrap(), Threshold::new(80.0, 90.0));
    }

    #[test]
    fn test_placeholder_url_is_demo() {
        let mut config = Config::default();
        config.provider.url = "https://your-environment.live.dynatrace.com".to_string();
        assert!(config.provider.is_demo());
        config.provider.url = "   ".to_string();
        assert!(config.provider.is_demo());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DYNATRACE_URL", "https://tenant.example.com"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("PORT", "8088"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.provider.url, "https://tenant.example.com");
        assert_eq!(config.webhook.secret, "s3cret");
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.provider.api_token, "");
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        config.apply_env(|k| (k == "PORT").then(|| "eighty".to_string()));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[webhook]\nmax_stored_events = 5").unwrap();
        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.webhook.max_stored_events, 5);
        assert_eq!(config.webhook.secret, "pulse-webhook");
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(Config::load_from_path(Path::new("/nonexistent/pulse.toml")).is_err());
    }

    #[test]
    fn test_explicit_path_must_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[provider\nurl = ").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("loading config from"));

        assert!(Config::load(Some(Path::new("/nonexistent/pulse.toml"))).is_err());
    }

    #[test]
    fn test_explicit_path_is_used() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chat]\nhistory_limit = 4").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.chat.history_limit, 4);
    }
}
