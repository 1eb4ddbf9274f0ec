use crate::services::oauth::OAuthSettings;
use crate::time_utils::AppTimezone;
use base64::{engine::general_purpose, Engine as _};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const MIN_SESSION_KEY_BYTES: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub session_key: Vec<u8>,
    pub bind_addr: String,
    pub timezone: AppTimezone,
    pub oauth: OAuthSettings,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database_url = require("DATABASE_URL")?;

        let session_key = general_purpose::STANDARD
            .decode(require("SESSION_KEY")?.trim())
            .map_err(|_| ConfigError::Invalid {
                name: "SESSION_KEY",
                reason: "must be base64".to_string(),
            })?;
        if session_key.len() < MIN_SESSION_KEY_BYTES {
            return Err(ConfigError::Invalid {
                name: "SESSION_KEY",
                reason: format!("must decode to at least {MIN_SESSION_KEY_BYTES} bytes"),
            });
        }

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| {
            let port = get("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let timezone = match get("APP_TIMEZONE") {
            Some(raw) => raw.parse::<AppTimezone>().map_err(|e| ConfigError::Invalid {
                name: "APP_TIMEZONE",
                reason: e.to_string(),
            })?,
            None => AppTimezone::utc(),
        };

        let oauth = OAuthSettings {
            client_id: require("OAUTH_CLIENT_ID")?,
            client_secret: require("OAUTH_CLIENT_SECRET")?,
            redirect_url: require("OAUTH_REDIRECT_URL")?,
            auth_url: get("OAUTH_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.to_string()),
            token_url: get("OAUTH_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            userinfo_url: get("OAUTH_USERINFO_URL")
                .unwrap_or_else(|| GOOGLE_USERINFO_URL.to_string()),
        };

        let secure_cookies = ["PRODUCTION", "RAILWAY_ENVIRONMENT", "RENDER", "FLY_APP_NAME"]
            .iter()
            .any(|key| lookup(key).is_some());

        Ok(Self {
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 10)?,
            session_key,
            bind_addr,
            timezone,
            oauth,
            rate_limit_max_requests: parse_or(
                "RATE_LIMIT_MAX_REQUESTS",
                get("RATE_LIMIT_MAX_REQUESTS"),
                60,
            )?,
            rate_limit_window_secs: parse_or(
                "RATE_LIMIT_WINDOW_SECS",
                get("RATE_LIMIT_WINDOW_SECS"),
                60,
            )?,
            secure_cookies,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("{value:?} is not a number"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/sicksquares".to_string()),
            ("SESSION_KEY", general_purpose::STANDARD.encode([7u8; 32])),
            ("OAUTH_CLIENT_ID", "client".to_string()),
            ("OAUTH_CLIENT_SECRET", "secret".to_string()),
            ("OAUTH_REDIRECT_URL", "http://localhost:3000/auth/callback".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.timezone, AppTimezone::utc());
        assert_eq!(config.oauth.token_url, GOOGLE_TOKEN_URL);
        assert_eq!(config.rate_limit_max_requests, 60);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn test_overrides() {
        let mut env = base_env();
        env.insert("PORT", "8080".to_string());
        env.insert("APP_TIMEZONE", "Europe/Berlin".to_string());
        env.insert("DB_MAX_CONNECTIONS", "4".to_string());
        env.insert("RENDER", "true".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(
            config.timezone,
            AppTimezone::Named(chrono_tz::Europe::Berlin)
        );
        assert_eq!(config.db_max_connections, 4);
        assert!(config.secure_cookies);
    }

    #[test]
    fn test_missing_and_invalid_values() {
        let mut env = base_env();
        env.remove("DATABASE_URL");
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing("DATABASE_URL"));

        let mut env = base_env();
        env.insert("SESSION_KEY", general_purpose::STANDARD.encode([1u8; 8]));
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "SESSION_KEY", .. })
        ));

        let mut env = base_env();
        env.insert("APP_TIMEZONE", "Nowhere/Land".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "APP_TIMEZONE", .. })
        ));

        let mut env = base_env();
        env.insert("APP_TIMEZONE", "UTC+é5".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "APP_TIMEZONE", .. })
        ));

        let mut env = base_env();
        env.insert("RATE_LIMIT_WINDOW_SECS", "soon".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Invalid { name: "RATE_LIMIT_WINDOW_SECS", .. })
        ));
    }
}
