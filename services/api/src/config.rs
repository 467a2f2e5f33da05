//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use tracing::Level;

/// Upper bound for `SESSION_TTL_DAYS` (ten years).
const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` keeps all data in process memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: String,
    pub openai_api_base: Option<String>,
    pub wizard_model: String,
    pub preview_model: String,
    pub voice_input: bool,
    pub stt_model: String,
    pub stt_language: String,
    /// Origin the widget script is served from, used in the embed snippet.
    pub public_origin: String,
    pub cors_origin: HeaderValue,
    pub session_ttl_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Generative Endpoint ---
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let openai_api_base = lookup("OPENAI_API_BASE").filter(|base| !base.trim().is_empty());
        let wizard_model = var_or("WIZARD_MODEL", "gpt-4o-mini");
        let preview_model = var_or("PREVIEW_MODEL", "gpt-4o-mini");

        // --- Dictation ---
        let voice_input_str = var_or("VOICE_INPUT", "true");
        let voice_input = voice_input_str.parse::<bool>().map_err(|_| {
            ConfigError::InvalidValue(
                "VOICE_INPUT".to_string(),
                format!("'{}' is not true or false", voice_input_str),
            )
        })?;
        let stt_model = var_or("STT_MODEL", "whisper-1");
        let stt_language = var_or("STT_LANGUAGE", "ru");

        // --- Web Settings ---
        let public_origin = var_or("PUBLIC_ORIGIN", "http://localhost:3000");
        let cors_origin_str = var_or("CORS_ORIGIN", "http://localhost:5173");
        let cors_origin = cors_origin_str.parse::<HeaderValue>().map_err(|e| {
            ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
        })?;

        let ttl_str = var_or("SESSION_TTL_DAYS", "30");
        let session_ttl_days = ttl_str
            .parse::<i64>()
            .ok()
            .filter(|days| (1..=MAX_SESSION_TTL_DAYS).contains(days))
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "SESSION_TTL_DAYS".to_string(),
                    format!(
                        "'{}' is not a number of days between 1 and {}",
                        ttl_str, MAX_SESSION_TTL_DAYS
                    ),
                )
            })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_api_base,
            wizard_model,
            preview_model,
            voice_input,
            stt_model,
            stt_language,
            public_origin,
            cors_origin,
            session_ttl_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert!(config.database_url.is_none());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.wizard_model, "gpt-4o-mini");
        assert!(config.voice_input);
        assert_eq!(config.stt_language, "ru");
        assert_eq!(config.session_ttl_days, 30);
    }

    #[test]
    fn missing_api_key_is_reported() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::MissingVar(var)) if var == "OPENAI_API_KEY"
        ));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = load(&[("OPENAI_API_KEY", "k"), ("SESSION_TTL_DAYS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "SESSION_TTL_DAYS"));

        let err = load(&[("OPENAI_API_KEY", "k"), ("BIND_ADDRESS", "nowhere")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "BIND_ADDRESS"));

        let err = load(&[("OPENAI_API_KEY", "k"), ("VOICE_INPUT", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var, _) if var == "VOICE_INPUT"));
    }

    #[test]
    fn session_ttl_is_bounded() {
        let config = load(&[("OPENAI_API_KEY", "k"), ("SESSION_TTL_DAYS", "3650")]).unwrap();
        assert_eq!(config.session_ttl_days, MAX_SESSION_TTL_DAYS);

        for days in ["3651", "200000000000000", "-1"] {
            let err = load(&[("OPENAI_API_KEY", "k"), ("SESSION_TTL_DAYS", days)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue(ref var, _) if var == "SESSION_TTL_DAYS"),
                "{days}"
            );
        }
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let config = load(&[("OPENAI_API_KEY", "k"), ("DATABASE_URL", " ")]).unwrap();
        assert!(config.database_url.is_none());
    }
}
