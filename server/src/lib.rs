//! Highrise server: axum REST API over the engine, a Telegram notifier,
//! the hourly cooldown sweep, and admin broadcasts.
//!
//! The engine never reads the clock; this crate is where `Utc::now()`
//! happens and gets passed down.

use serde::Deserialize;
use std::path::PathBuf;

pub mod api;
pub mod broadcast;
pub mod notify;
pub mod sweep;

/// Server configuration, loaded from a YAML file.
///
/// The bonus-game cooldown is deliberately absent here: it is a fixed
/// constant in `highrise-types` and cannot be reconfigured.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Port the REST API listens on.
    pub port: u16,
    /// Path to the SQLite database file (created if missing).
    pub database_path: PathBuf,
    /// Telegram bot token; omit to run without notifications.
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    /// Link embedded in availability notifications.
    pub frontend_url: String,
    /// Tracing filter directive, e.g. `info` or `highrise=debug,info`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_yaml() {
        let raw = "\
port: 3000
database_path: ./data/highrise.db
telegram_bot_token: \"123:abc\"
frontend_url: https://game.example.com
log_level: debug
";
        let config: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_path, PathBuf::from("./data/highrise.db"));
        assert_eq!(config.telegram_bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_config_defaults() {
        let raw = "\
port: 3000
database_path: ./highrise.db
frontend_url: https://game.example.com
";
        let config: Config = serde_yaml::from_str(raw).unwrap();
        assert_eq!(config.telegram_bot_token, None);
        assert_eq!(config.log_level, "info");
    }
}
