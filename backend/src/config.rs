use anyhow::{anyhow, bail};
use chrono::Duration;
use std::{env, str::FromStr};

use crate::utils::cookies::{CookieOptions, SameSite};

const DEFAULT_ACCESS_TTL_HOURS: i64 = 24;
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;
const DEFAULT_PAIRING_TOLERANCE_SECONDS: i64 = 60;
const DEFAULT_WEBHOOK_TIMEOUT_SECONDS: u64 = 5;
/// Token expiry is `now + ttl`; longer lifetimes would overflow timestamps.
const MAX_TOKEN_TTL_DAYS: i64 = 365 * 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_hours: i64,
    pub refresh_token_ttl_days: i64,
    pub pairing_tolerance_seconds: i64,
    pub server_host: String,
    pub server_port: u16,
    pub webhook_url: Option<String>,
    pub webhook_timeout_seconds: u64,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub trust_proxy_headers: bool,
    /// `None` keeps the argon2 default cost.
    pub fingerprint_memory_kib: Option<u32>,
    pub fingerprint_iterations: Option<u32>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL must be set"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET must be set to a non-empty value"))?;

        let config = Config {
            database_url,
            jwt_secret,
            access_token_ttl_hours: parse_var("ACCESS_TOKEN_TTL_HOURS")?
                .unwrap_or(DEFAULT_ACCESS_TTL_HOURS),
            refresh_token_ttl_days: parse_var("REFRESH_TOKEN_TTL_DAYS")?
                .unwrap_or(DEFAULT_REFRESH_TTL_DAYS),
            pairing_tolerance_seconds: parse_var("PAIRING_TOLERANCE_SECONDS")?
                .unwrap_or(DEFAULT_PAIRING_TOLERANCE_SECONDS),
            server_host: env::var("SRV_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_var("SRV_PORT")?.unwrap_or(8080),
            webhook_url: env::var("WEB_HOOK").ok().filter(|url| !url.trim().is_empty()),
            webhook_timeout_seconds: parse_var("WEB_HOOK_TIMEOUT_SECONDS")?
                .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECONDS),
            cookie_secure: parse_var("COOKIE_SECURE")?.unwrap_or(false),
            cookie_same_site: parse_var("COOKIE_SAME_SITE")?.unwrap_or(SameSite::Lax),
            trust_proxy_headers: parse_var("TRUST_PROXY_HEADERS")?.unwrap_or(false),
            fingerprint_memory_kib: parse_var("FINGERPRINT_MEMORY_KIB")?,
            fingerprint_iterations: parse_var("FINGERPRINT_ITERATIONS")?,
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.access_token_ttl_hours <= 0 || self.refresh_token_ttl_days <= 0 {
            bail!("token TTLs must be positive");
        }
        let access_ttl = bounded_ttl(
            "ACCESS_TOKEN_TTL_HOURS",
            Duration::try_hours(self.access_token_ttl_hours),
        )?;
        let refresh_ttl = bounded_ttl(
            "REFRESH_TOKEN_TTL_DAYS",
            Duration::try_days(self.refresh_token_ttl_days),
        )?;
        if access_ttl > refresh_ttl {
            bail!(
                "access token TTL ({}h) must not exceed refresh token TTL ({}d)",
                self.access_token_ttl_hours,
                self.refresh_token_ttl_days
            );
        }
        if self.pairing_tolerance_seconds < 0 {
            bail!("PAIRING_TOLERANCE_SECONDS must not be negative");
        }
        if Duration::try_seconds(self.pairing_tolerance_seconds).is_none() {
            bail!("PAIRING_TOLERANCE_SECONDS is out of range");
        }
        Ok(())
    }

    /// Falls back to the default when the configured value is out of range;
    /// `validate` rejects such values at load time.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::try_hours(self.access_token_ttl_hours)
            .filter(|ttl| ttl.num_days() <= MAX_TOKEN_TTL_DAYS)
            .unwrap_or(Duration::hours(DEFAULT_ACCESS_TTL_HOURS))
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::try_days(self.refresh_token_ttl_days)
            .filter(|ttl| ttl.num_days() <= MAX_TOKEN_TTL_DAYS)
            .unwrap_or(Duration::days(DEFAULT_REFRESH_TTL_DAYS))
    }

    pub fn pairing_tolerance(&self) -> Duration {
        Duration::try_seconds(self.pairing_tolerance_seconds)
            .unwrap_or(Duration::seconds(DEFAULT_PAIRING_TOLERANCE_SECONDS))
    }

    pub fn cookie_options(&self) -> CookieOptions {
        CookieOptions {
            secure: self.cookie_secure,
            same_site: self.cookie_same_site,
        }
    }
}

fn bounded_ttl(name: &str, ttl: Option<Duration>) -> anyhow::Result<Duration> {
    match ttl {
        Some(ttl) if ttl.num_days() <= MAX_TOKEN_TTL_DAYS => Ok(ttl),
        _ => bail!("{} is out of range (at most {} days)", name, MAX_TOKEN_TTL_DAYS),
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {} value {:?}: {}", name, raw, e)),
        _ => Ok(None),
    }
}
