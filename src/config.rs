//! Runtime configuration read from the process environment (and `.env`).

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use axum_extra::extract::cookie::SameSite;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid password hash parameters: {0}")]
    PasswordHash(String),
}

/// How the browser client reaches the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployProfile {
    /// Client is served from this process; cookies stay `SameSite=Lax`, no CORS.
    SameOrigin,
    /// Client lives on another origin; cookies are `SameSite=None; Secure` and
    /// CORS allows the configured origins with credentials.
    CrossOrigin,
}

impl FromStr for DeployProfile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "same-origin" | "same_origin" => Ok(DeployProfile::SameOrigin),
            "cross-origin" | "cross_origin" => Ok(DeployProfile::CrossOrigin),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Postgres,
}

impl FromStr for SessionBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(SessionBackend::Memory),
            "postgres" | "postgresql" => Ok(SessionBackend::Postgres),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "pretty" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Attributes of the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookieConfig {
    pub secure: bool,
    pub same_site: SameSite,
    pub ttl: Duration,
}

impl CookieConfig {
    /// Cookie attributes for a deployment profile. `secure` is only honoured
    /// for same-origin; cross-origin cookies must be `Secure`.
    pub fn for_profile(profile: DeployProfile, secure: bool, ttl: Duration) -> Self {
        match profile {
            // Browsers drop SameSite=None cookies that are not Secure.
            DeployProfile::CrossOrigin => CookieConfig {
                secure: true,
                same_site: SameSite::None,
                ttl,
            },
            DeployProfile::SameOrigin => CookieConfig {
                secure,
                same_site: SameSite::Lax,
                ttl,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_attempts: usize,
    pub window: Duration,
    pub trust_proxy: bool,
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub profile: DeployProfile,
    pub cookie: CookieConfig,
    pub cors_origins: Vec<String>,
    pub session_backend: SessionBackend,
    pub rate_limit: RateLimitConfig,
    pub static_dir: PathBuf,
    pub hash: HashConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("postgres://") || lower.starts_with("postgresql://")) {
            return Err(ConfigError::Invalid { key: "DATABASE_URL", value: url });
        }

        let ttl_hours: u64 = parse_or("SESSION_TTL_HOURS", 24)?;
        if ttl_hours == 0 {
            return Err(ConfigError::Invalid { key: "SESSION_TTL_HOURS", value: "0".into() });
        }
        let ttl = Duration::from_secs(ttl_hours * 60 * 60);

        let profile = parse_or("DEPLOY_PROFILE", DeployProfile::SameOrigin)?;
        let production = env::var("APP_ENV").map(|v| v == "production").unwrap_or(false);
        let secure = parse_or("COOKIE_SECURE", production)?;
        let cookie = CookieConfig::for_profile(profile, secure, ttl);

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect();

        let max_attempts: usize = parse_or("AUTH_RATE_LIMIT_MAX", 100)?;
        let window_secs: u64 = parse_or("AUTH_RATE_LIMIT_WINDOW_SECS", 15 * 60)?;

        let defaults = HashConfig::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000)?,
            database: DatabaseConfig {
                url,
                max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            profile,
            cookie,
            cors_origins,
            session_backend: parse_or("SESSION_STORE", SessionBackend::Memory)?,
            rate_limit: RateLimitConfig {
                max_attempts,
                window: Duration::from_secs(window_secs),
                trust_proxy: parse_or("TRUST_PROXY", false)?,
            },
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("public")),
            hash: HashConfig {
                memory_kib: parse_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib)?,
                iterations: parse_or("PASSWORD_HASH_ITERATIONS", defaults.iterations)?,
                parallelism: parse_or("PASSWORD_HASH_PARALLELISM", defaults.parallelism)?,
            },
            log_format: parse_or("LOG_FORMAT", LogFormat::Compact)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        _ => Ok(default),
    }
}
