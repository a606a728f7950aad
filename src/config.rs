use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Debug,
    Release,
}

impl RunMode {
    pub fn is_debug(self) -> bool {
        self == RunMode::Debug
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Token lifetime used when a login does not ask for one.
    pub default_ttl_seconds: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("default_ttl_seconds", &self.default_ttl_seconds)
            .finish()
    }
}

/// Length bounds for registration and password changes.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    pub username_min_len: usize,
    pub username_max_len: usize,
    pub password_min_len: usize,
    pub password_max_len: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            username_min_len: 5,
            username_max_len: 30,
            password_min_len: 8,
            password_max_len: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub run_mode: RunMode,
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub format: FormatConfig,
    pub page_size: i64,
    pub image_url_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10),
            acquire_timeout_secs: parse_env("DATABASE_ACQUIRE_TIMEOUT_SECS", 5),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "vid-backend".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "vid-users".into()),
            default_ttl_seconds: parse_env("JWT_EXPIRE", 7 * 24 * 60 * 60),
        };

        let defaults = FormatConfig::default();
        let format = FormatConfig {
            username_min_len: parse_env("USERNAME_MIN_LEN", defaults.username_min_len),
            username_max_len: parse_env("USERNAME_MAX_LEN", defaults.username_max_len),
            password_min_len: parse_env("PASSWORD_MIN_LEN", defaults.password_min_len),
            password_max_len: parse_env("PASSWORD_MAX_LEN", defaults.password_max_len),
        };

        let run_mode = match std::env::var("RUN_MODE").as_deref() {
            Ok("debug") => RunMode::Debug,
            _ => RunMode::Release,
        };

        let config = Self {
            run_mode,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("APP_PORT", 8080),
            database,
            jwt,
            format,
            page_size: parse_env("PAGE_SIZE", 20),
            image_url_prefix: std::env::var("IMAGE_URL_PREFIX")
                .unwrap_or_else(|_| "http://localhost:8080/raw/image/".into()),
        };
        config.check()?;
        Ok(config)
    }

    /// Rejects combinations that would make the service unusable.
    pub fn check(&self) -> anyhow::Result<()> {
        if self.jwt.secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.jwt.default_ttl_seconds <= 0 {
            anyhow::bail!("JWT_EXPIRE must be a positive number of seconds");
        }
        if self.format.username_min_len > self.format.username_max_len
            || self.format.password_min_len > self.format.password_max_len
        {
            anyhow::bail!("format length bounds are inverted");
        }
        if self.page_size <= 0 {
            anyhow::bail!("PAGE_SIZE must be positive");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .context("invalid APP_HOST/APP_PORT")
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
