use thiserror::Error;

use crate::FIVE_MINUTES;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for environment variable {0}")]
    Invalid(&'static str),
}

/// Configuration surface of the client, read from the environment (a local
/// `.env` file is honoured through dotenv).
#[derive(Debug, Clone)]
pub struct Settings {
    pub username: String,
    pub password: String,
    /// Usage cache TTL in seconds.
    pub cache_ttl: u64,
    /// Browser executable override for the browser driver. Useful when the
    /// browser is not in PATH.
    pub browser_exec_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let username = dotenv::var("BCH_USER").map_err(|_| SettingsError::Missing("BCH_USER"))?;
        let password = dotenv::var("BCH_PASS").map_err(|_| SettingsError::Missing("BCH_PASS"))?;

        let cache_ttl = match dotenv::var("BCH_CACHE_TTL") {
            Ok(value) => value
                .parse::<u64>()
                .map_err(|_| SettingsError::Invalid("BCH_CACHE_TTL"))?,
            Err(_) => FIVE_MINUTES,
        };

        Ok(Settings {
            username,
            password,
            cache_ttl,
            browser_exec_path: dotenv::var("BCH_BROWSER_EXEC_PATH").ok(),
        })
    }
}
