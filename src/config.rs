//! Environment-based configuration, loaded once at startup.
//!
//! Grounded in `examples/original_source/config/config.go` and
//! `store/store.go`, which pull `DB_URL`, `REDIS_URL`, `GOOGLE_API_KEY`
//! and a server address straight out of the environment with no
//! intermediate file format. `SERVER_ADDR` in the Go source is split
//! here into `PORT` per spec.md §6, defaulting to `8080`.

use crate::error::AppError;

/// Process-wide configuration, resolved once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the HTTP surface binds to.
    pub port: u16,

    /// PostgreSQL DSN for the Prefix Store.
    pub db_url: String,

    /// Redis connection URL for the Cache.
    pub redis_url: String,

    /// Safe Browsing API key, appended to every upstream request.
    pub google_api_key: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails fast with `ConfigError` if `DB_URL`, `REDIS_URL`, or
    /// `GOOGLE_API_KEY` is unset — these have no safe default.
    pub fn from_env() -> Result<Self, AppError> {
        let port = match std::env::var("PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| AppError::ConfigError(format!("PORT is not a valid port: {v}")))?,
            Err(_) => 8080,
        };

        let db_url = std::env::var("DB_URL")
            .map_err(|_| AppError::ConfigError("DB_URL is required".to_string()))?;

        let redis_url = std::env::var("REDIS_URL")
            .map_err(|_| AppError::ConfigError("REDIS_URL is required".to_string()))?;

        let google_api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| AppError::ConfigError("GOOGLE_API_KEY is required".to_string()))?;

        Ok(Self {
            port,
            db_url,
            redis_url,
            google_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_db_url_is_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DB_URL");
        std::env::remove_var("REDIS_URL");
        std::env::remove_var("GOOGLE_API_KEY");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn defaults_port_to_8080() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("PORT");
        std::env::set_var("DB_URL", "postgres://localhost/test");
        std::env::set_var("REDIS_URL", "redis://localhost");
        std::env::set_var("GOOGLE_API_KEY", "key");

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8080);

        std::env::remove_var("DB_URL");
        std::env::remove_var("REDIS_URL");
        std::env::remove_var("GOOGLE_API_KEY");
    }
}
