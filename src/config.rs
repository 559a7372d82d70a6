use std::{env, fmt::Display, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub image_host: ImageHostConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_allowed_origin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Endpoint returning the claims of a bearer token, `email` included.
    pub userinfo_url: String,
}

#[derive(Debug, Clone)]
pub struct ImageHostConfig {
    pub upload_url: String,
    pub api_key: Option<String>,
}

/// Reads the configuration from the process environment (`.env` included, see
/// [`crate::bootstrap::init_env`]).
pub fn load() -> Result<Config> {
    Ok(Config {
        server: ServerConfig {
            port: try_load("PORT", "5000")?,
            cors_allowed_origin: optional("CORS_ALLOWED_ORIGIN"),
        },
        database: DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "10")?,
        },
        identity: IdentityConfig {
            userinfo_url: try_load(
                "IDENTITY_USERINFO_URL",
                "http://localhost:9099/userinfo",
            )?,
        },
        image_host: ImageHostConfig {
            upload_url: try_load("IMAGE_HOST_UPLOAD_URL", "https://api.imgbb.com/1/upload")?,
            api_key: optional("IMAGE_HOST_API_KEY"),
        },
    })
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("Environment variable {key} is misconfigured: {e}")
    })
}
