//! `config.yaml` loading, environment overrides, and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::duration::serde_duration;
use crate::error::{ConfigError, ConfigResult};

/// Locations searched, in order, when no explicit path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "config.yaml",
    "config/config.yaml",
    "/etc/catapult/config.yaml",
];

const LOG_LEVELS: &[&str] = &["debug", "info", "warning", "error", "critical"];

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catapult: CatapultConfig,
    pub jira: JiraConfig,
    pub argocd: ArgoCdConfig,
    pub firehydrant: FireHydrantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatapultConfig {
    pub server: ServerConfig,
    pub event_loop: EventLoopConfig,
    pub app_name: String,
    pub app_description: String,
    pub app_version: String,
}

impl Default for CatapultConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            event_loop: EventLoopConfig::default(),
            app_name: "Catapult API".to_string(),
            app_description: "A base HTTP API with Prometheus metrics".to_string(),
            app_version: "1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub reload: bool,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            reload: false,
            log_level: "info".to_string(),
        }
    }
}

/// Background event loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLoopConfig {
    #[serde(with = "serde_duration")]
    pub check_interval: Duration,
    pub enabled: bool,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(15),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    #[serde(with = "serde_duration")]
    pub timeout: Duration,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            username: None,
            api_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArgoCdConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    #[serde(with = "serde_duration")]
    pub timeout: Duration,
    pub verify_ssl: bool,
}

impl Default for ArgoCdConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            username: None,
            password: None,
            token: None,
            timeout: Duration::from_secs(30),
            verify_ssl: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FireHydrantConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    #[serde(with = "serde_duration")]
    pub timeout: Duration,
}

impl Default for FireHydrantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> ConfigResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// An example configuration with placeholder credentials.
    pub fn example() -> Self {
        Self {
            catapult: CatapultConfig::default(),
            jira: JiraConfig {
                base_url: Some("https://yourcompany.atlassian.net".to_string()),
                username: Some("your-email@company.com".to_string()),
                api_token: Some("your-jira-api-token".to_string()),
                ..JiraConfig::default()
            },
            argocd: ArgoCdConfig {
                base_url: Some("https://argocd.yourcompany.com".to_string()),
                username: Some("admin".to_string()),
                password: Some("your-argocd-password".to_string()),
                token: Some("your-argocd-token".to_string()),
                ..ArgoCdConfig::default()
            },
            firehydrant: FireHydrantConfig {
                base_url: Some("https://api.firehydrant.io".to_string()),
                api_token: Some("your-firehydrant-token".to_string()),
                ..FireHydrantConfig::default()
            },
        }
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = &mut self.catapult.server;
        if let Some(v) = lookup("CATAPULT_SERVER_HOST") {
            server.host = v;
        }
        if let Some(v) = lookup("CATAPULT_SERVER_PORT") {
            server.port = v.trim().parse().map_err(|e| ConfigError::Override {
                var: "CATAPULT_SERVER_PORT".to_string(),
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup("CATAPULT_LOG_LEVEL") {
            server.log_level = v;
        }

        if let Some(v) = lookup("JIRA_ENABLED") {
            self.jira.enabled = parse_flag(&v);
        }
        override_opt(&lookup, "JIRA_BASE_URL", &mut self.jira.base_url);
        override_opt(&lookup, "JIRA_USERNAME", &mut self.jira.username);
        override_opt(&lookup, "JIRA_API_TOKEN", &mut self.jira.api_token);

        if let Some(v) = lookup("ARGOCD_ENABLED") {
            self.argocd.enabled = parse_flag(&v);
        }
        override_opt(&lookup, "ARGOCD_BASE_URL", &mut self.argocd.base_url);
        override_opt(&lookup, "ARGOCD_USERNAME", &mut self.argocd.username);
        override_opt(&lookup, "ARGOCD_PASSWORD", &mut self.argocd.password);
        override_opt(&lookup, "ARGOCD_TOKEN", &mut self.argocd.token);

        if let Some(v) = lookup("FIREHYDRANT_ENABLED") {
            self.firehydrant.enabled = parse_flag(&v);
        }
        override_opt(&lookup, "FIREHYDRANT_BASE_URL", &mut self.firehydrant.base_url);
        override_opt(&lookup, "FIREHYDRANT_API_TOKEN", &mut self.firehydrant.api_token);

        Ok(())
    }

    /// Validate the configuration and normalise the log level.
    pub fn validate(&mut self) -> ConfigResult<()> {
        let level = self.catapult.server.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {LOG_LEVELS:?}, got {:?}",
                self.catapult.server.log_level
            )));
        }
        self.catapult.server.log_level = level;

        if self.catapult.event_loop.check_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "event_loop.check_interval must be a positive duration".to_string(),
            ));
        }

        let jira = &self.jira;
        check_timeout("jira", jira.timeout)?;
        if jira.enabled {
            require("Jira", "base_url", &jira.base_url)?;
            require("Jira", "username", &jira.username)?;
            require("Jira", "api_token", &jira.api_token)?;
        }

        let argocd = &self.argocd;
        check_timeout("argocd", argocd.timeout)?;
        if argocd.enabled {
            require("ArgoCD", "base_url", &argocd.base_url)?;
        }

        let firehydrant = &self.firehydrant;
        check_timeout("firehydrant", firehydrant.timeout)?;
        if firehydrant.enabled {
            require("FireHydrant", "base_url", &firehydrant.base_url)?;
            require("FireHydrant", "api_token", &firehydrant.api_token)?;
        }

        Ok(())
    }
}

/// Load configuration using the process environment for overrides.
pub fn load_config(path: Option<&Path>) -> ConfigResult<AppConfig> {
    load_config_with(path, |var| std::env::var(var).ok())
}

/// Load configuration with an explicit override lookup.
///
/// With `path = None`, the first existing entry of `DEFAULT_CONFIG_PATHS`
/// is used; if none exists, the defaults are used.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> ConfigResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.to_path_buf()));
            }
            Some(p.to_path_buf())
        }
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists()),
    };

    let mut config = match &resolved {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                path: p.clone(),
                source,
            })?;
            info!(path = %p.display(), "loading configuration");
            AppConfig::from_yaml(&content)?
        }
        None => {
            debug!("no configuration file found, using defaults");
            AppConfig::default()
        }
    };

    config.apply_env_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}

/// Write an example configuration file.
pub fn write_default_config(path: &Path) -> ConfigResult<()> {
    let content = AppConfig::example().to_yaml_string()?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn override_opt<F>(lookup: &F, var: &str, slot: &mut Option<String>)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(var) {
        *slot = Some(v);
    }
}

fn require(service: &str, field: &str, value: &Option<String>) -> ConfigResult<()> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::Invalid(format!(
            "{field} is required when {service} is enabled"
        ))),
    }
}

fn check_timeout(service: &str, timeout: Duration) -> ConfigResult<()> {
    if timeout.is_zero() {
        return Err(ConfigError::Invalid(format!(
            "{service}.timeout must be a positive duration"
        )));
    }
    Ok(())
}
