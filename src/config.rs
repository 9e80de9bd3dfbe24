//! Configuration file.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app::{AppKind, AppOptions};
use crate::calendar::DEFAULT_QUARTER_HEIGHT;
use crate::error::{ConfigError, Result};
use crate::model::{DutyPerson, User};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub apps: Vec<AppConfig>,
    pub users: Vec<User>,
    pub duty_persons: Vec<DutyPerson>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            apps: vec![AppConfig {
                kind: AppKind::Lyra,
                options: AppOptions::default(),
            }],
            users: Vec::new(),
            duty_persons: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        content.parse()
    }

    /// Load `path` if given, otherwise `daybook.toml` in the working
    /// directory if present, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        let fallback = PathBuf::from("daybook.toml");
        if fallback.exists() {
            tracing::info!("Loading config from: {}", fallback.display());
            return Self::from_file(fallback);
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.server.quarter_height == 0 {
            return Err(ConfigError::Invalid("quarter_height must be > 0".into()).into());
        }
        if self.apps.is_empty() {
            return Err(ConfigError::MissingField("apps".into()).into());
        }

        let mut usernames = HashSet::new();
        for user in &self.users {
            if !usernames.insert(user.username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "user `{}` defined twice",
                    user.username
                ))
                .into());
            }
        }

        let mut ids = HashSet::new();
        for person in &self.duty_persons {
            if !usernames.contains(person.username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duty person {} refers to unknown user `{}`",
                    person.id, person.username
                ))
                .into());
            }
            if !ids.insert(person.id) {
                return Err(
                    ConfigError::Invalid(format!("duty person {} defined twice", person.id)).into(),
                );
            }
        }

        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = crate::error::Error;

    fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Pixel height of a quarter hour in the week and day grids.
    pub quarter_height: u32,
    /// Directory holding the template tree; the built-in list when unset.
    pub templates_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            quarter_height: DEFAULT_QUARTER_HEIGHT,
            templates_dir: None,
        }
    }
}

/// One mounted application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub kind: AppKind,
    #[serde(flatten)]
    pub options: AppOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mount_one_calendar() {
        let config = Config::default();
        assert_eq!(config.apps.len(), 1);
        assert_eq!(config.apps[0].kind, AppKind::Lyra);
        assert_eq!(config.server.quarter_height, 15);
    }

    #[test]
    fn parses_apps_users_and_duty_persons() {
        let config: Config = r#"
            [server]
            address = "0.0.0.0:9000"
            quarter_height = 12

            [[apps]]
            kind = "drive"
            namespace = "vans"
            description = "Van pool"

            [apps.extra_context]
            site = "HQ"

            [[apps]]
            kind = "duty"

            [[users]]
            username = "alice"
            full_name = "Alice Smith"
            permissions = ["add_reservation"]

            [[duty_persons]]
            id = 1
            username = "alice"
            phone = "555-0100"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.server.address.port(), 9000);
        assert_eq!(config.apps[0].options.namespace.as_deref(), Some("vans"));
        assert_eq!(config.apps[0].options.extra_context["site"], "HQ");
        assert_eq!(config.apps[1].kind, AppKind::Duty);
        assert!(config.users[0].has_perm("add_reservation"));
        assert_eq!(config.duty_persons[0].phone, "555-0100");
    }

    #[test]
    fn rejects_unknown_duty_person_user() {
        let result: Result<Config> = r#"
            [[duty_persons]]
            id = 1
            username = "ghost"
            phone = "1"
        "#
        .parse();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_quarter_height() {
        let result: Result<Config> = "[server]\nquarter_height = 0\n".parse();
        assert!(result.is_err());
    }
}
