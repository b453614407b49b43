//! catapult-core — configuration shared by every Catapult subsystem.
//!
//! The configuration is a single YAML document with one section for the
//! service itself and one per external integration:
//!
//! ```text
//! catapult:      server + event loop + app metadata
//! jira:          Jira REST API settings
//! argocd:        ArgoCD API settings
//! firehydrant:   FireHydrant API settings
//! ```
//!
//! Values are read from the file (or defaults), then overridden by
//! environment variables, then validated. Validation failures are fatal
//! at startup.

pub mod config;
pub mod duration;
pub mod error;

pub use config::{
    AppConfig, ArgoCdConfig, CatapultConfig, EventLoopConfig, FireHydrantConfig, JiraConfig,
    ServerConfig, load_config, load_config_with, write_default_config,
};
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
