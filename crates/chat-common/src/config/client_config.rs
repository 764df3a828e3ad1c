//! Client configuration structs
//!
//! Loads configuration from environment variables and an optional `.env` file.

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub reconnect: ReconnectSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Chat server the client connects to
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Page origin, e.g. `https://chat.example.com`
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_room")]
    pub room: String,
    /// Appended as `?token=` when present
    #[serde(default)]
    pub token: Option<String>,
}

/// Reconnection policy, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-client".to_string()
}

fn default_origin() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_room() -> String {
    "general".to_string()
}

fn default_base_ms() -> u64 {
    1000
}

fn default_max_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that cannot be used
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that cannot be used
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = match lookup("APP_ENV") {
            Some(value) => Environment::parse(&value)
                .ok_or(ConfigError::InvalidValue("APP_ENV", value))?,
            None => Environment::default(),
        };

        let room = lookup("CHAT_ROOM").unwrap_or_else(default_room);
        if room.trim().is_empty() {
            return Err(ConfigError::InvalidValue("CHAT_ROOM", room));
        }

        let reconnect = ReconnectSettings {
            base_ms: parse_var(&lookup, "RECONNECT_BASE_MS")?.unwrap_or_else(default_base_ms),
            max_ms: parse_var(&lookup, "RECONNECT_MAX_MS")?.unwrap_or_else(default_max_ms),
            max_attempts: parse_var(&lookup, "RECONNECT_MAX_ATTEMPTS")?
                .unwrap_or_else(default_max_attempts),
        };
        if reconnect.base_ms > reconnect.max_ms {
            return Err(ConfigError::InvalidValue(
                "RECONNECT_BASE_MS",
                format!(
                    "{} exceeds RECONNECT_MAX_MS ({})",
                    reconnect.base_ms, reconnect.max_ms
                ),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            server: ServerSettings {
                origin: lookup("CHAT_ORIGIN").unwrap_or_else(default_origin),
                room,
                token: lookup("CHAT_TOKEN").filter(|t| !t.is_empty()),
            },
            reconnect,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, value))
        })
        .transpose()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.app.name, "chat-client");
        assert!(config.app.env.is_development());
        assert_eq!(config.server.origin, "http://127.0.0.1:8000");
        assert_eq!(config.server.room, "general");
        assert_eq!(config.server.token, None);
        assert_eq!(config.reconnect, ReconnectSettings::default());
        assert_eq!(config.reconnect.base_ms, 1000);
        assert_eq!(config.reconnect.max_ms, 10_000);
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("APP_ENV", "Production"),
            ("CHAT_ORIGIN", "https://chat.example.com"),
            ("CHAT_ROOM", "lobby"),
            ("CHAT_TOKEN", "abc"),
            ("RECONNECT_BASE_MS", "250"),
            ("RECONNECT_MAX_MS", "2000"),
            ("RECONNECT_MAX_ATTEMPTS", "0"),
        ])
        .unwrap();

        assert!(config.app.env.is_production());
        assert_eq!(config.server.origin, "https://chat.example.com");
        assert_eq!(config.server.room, "lobby");
        assert_eq!(config.server.token.as_deref(), Some("abc"));
        assert_eq!(config.reconnect.base_ms, 250);
        assert_eq!(config.reconnect.max_ms, 2000);
        assert_eq!(config.reconnect.max_attempts, 0);
    }

    #[test]
    fn test_empty_token_is_ignored() {
        let config = load(&[("CHAT_TOKEN", "")]).unwrap();
        assert_eq!(config.server.token, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            load(&[("RECONNECT_MAX_ATTEMPTS", "many")]),
            Err(ConfigError::InvalidValue("RECONNECT_MAX_ATTEMPTS", _))
        ));
        assert!(matches!(
            load(&[("APP_ENV", "qa")]),
            Err(ConfigError::InvalidValue("APP_ENV", _))
        ));
        assert!(matches!(
            load(&[("CHAT_ROOM", "  ")]),
            Err(ConfigError::InvalidValue("CHAT_ROOM", _))
        ));
    }

    #[test]
    fn test_base_above_cap_is_rejected() {
        let err = load(&[("RECONNECT_BASE_MS", "5000"), ("RECONNECT_MAX_MS", "1000")])
            .unwrap_err();
        assert!(err.to_string().contains("exceeds RECONNECT_MAX_MS"));
    }
}
