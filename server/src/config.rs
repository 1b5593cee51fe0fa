use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow};
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Duration;

const COOKIE_KEY_LEN: usize = 64;

#[derive(Clone)]
pub struct AppConfig {
    pub cookie_key: Option<Key>,
    pub cors_allowed_origins: Vec<String>,
    pub admin_role: String,
    pub default_role: String,
    pub session_ttl: Duration,
    pub permission_fetch_timeout: StdDuration,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let cookie_key = match lookup("COOKIE_SECRET_BASE64") {
            Some(secret) => Some(decode_cookie_key(&secret)?),
            None => None,
        };

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect::<Vec<_>>();

        let admin_role = role_or(lookup("ADMIN_ROLE"), "admin");
        let default_role = role_or(lookup("DEFAULT_ROLE"), "user");

        let ttl_days: i64 = parse_or(lookup("SESSION_TTL_DAYS"), 30, "SESSION_TTL_DAYS")?;
        if ttl_days <= 0 {
            return Err(anyhow!("SESSION_TTL_DAYS must be positive"));
        }
        let timeout_ms: u64 = parse_or(
            lookup("PERMISSION_FETCH_TIMEOUT_MS"),
            10_000,
            "PERMISSION_FETCH_TIMEOUT_MS",
        )?;

        Ok(Self {
            cookie_key,
            cors_allowed_origins,
            admin_role,
            default_role,
            session_ttl: Duration::days(ttl_days),
            permission_fetch_timeout: StdDuration::from_millis(timeout_ms),
        })
    }

    /// Cookie key, required by the HTTP server only.
    pub fn require_cookie_key(&self) -> Result<Key> {
        self.cookie_key
            .clone()
            .context("COOKIE_SECRET_BASE64 missing")
    }
}

fn decode_cookie_key(secret: &str) -> Result<Key> {
    let bytes = STANDARD
        .decode(secret.trim())
        .context("invalid COOKIE_SECRET_BASE64")?;
    if bytes.len() < COOKIE_KEY_LEN {
        return Err(anyhow!(
            "COOKIE_SECRET_BASE64 must decode to at least {COOKIE_KEY_LEN} bytes"
        ));
    }
    Ok(Key::from(&bytes[..COOKIE_KEY_LEN]))
}

fn role_or(value: Option<String>, fallback: &str) -> String {
    value
        .map(|role| role.trim().to_string())
        .filter(|role| !role.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, fallback: T, key: &str) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{key} is not a valid number: {raw:?}")),
        None => Ok(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = config(&[]).unwrap();
        assert_eq!(config.admin_role, "admin");
        assert_eq!(config.default_role, "user");
        assert_eq!(config.session_ttl, Duration::days(30));
        assert_eq!(config.permission_fetch_timeout, StdDuration::from_secs(10));
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:5173"]);
        assert!(config.require_cookie_key().is_err());
    }

    #[test]
    fn short_cookie_secret_is_rejected() {
        let secret = STANDARD.encode([1u8; 32]);
        assert!(config(&[("COOKIE_SECRET_BASE64", secret.as_str())]).is_err());
    }

    #[test]
    fn long_cookie_secret_is_accepted() {
        let secret = STANDARD.encode([1u8; 64]);
        let config = config(&[("COOKIE_SECRET_BASE64", secret.as_str())]).unwrap();
        assert!(config.require_cookie_key().is_ok());
    }

    #[test]
    fn origins_and_roles_are_trimmed() {
        let config = config(&[
            ("CORS_ALLOWED_ORIGINS", " https://a.test , ,https://b.test"),
            ("ADMIN_ROLE", " owner "),
            ("DEFAULT_ROLE", "   "),
        ])
        .unwrap();
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.test", "https://b.test"]
        );
        assert_eq!(config.admin_role, "owner");
        assert_eq!(config.default_role, "user");
    }

    #[test]
    fn bad_numbers_fail_loudly() {
        assert!(config(&[("PERMISSION_FETCH_TIMEOUT_MS", "soon")]).is_err());
        assert!(config(&[("SESSION_TTL_DAYS", "0")]).is_err());
    }
}
