//! Client configuration.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};

pub const ENV_BASE_URL: &str = "NOCOBASE_BASE_URL";
pub const ENV_API_KEY: &str = "NOCOBASE_API_KEY";
pub const ENV_ROLE: &str = "NOCOBASE_ROLE";
pub const ENV_TIMEOUT_SECS: &str = "NOCOBASE_TIMEOUT_SECS";

const DEFAULT_ROLE: &str = "root";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://nocobase.example.org/api`.
    pub base_url: String,
    pub api_key: String,
    /// Sent as `X-Role`.
    pub role: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            role: DEFAULT_ROLE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{ENV_BASE_URL} not set"))?;
        let api_key = lookup(ENV_API_KEY)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{ENV_API_KEY} not set"))?;

        let mut config = Self::new(base_url, api_key);
        if let Some(role) = lookup(ENV_ROLE).filter(|v| !v.is_empty()) {
            config.role = role;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("role", &self.role)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://localhost:13000/api/"),
            (ENV_API_KEY, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:13000/api");
        assert_eq!(config.role, "root");
        assert_eq!(config.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://x/api"),
            (ENV_API_KEY, "k"),
            (ENV_ROLE, "admin"),
            (ENV_TIMEOUT_SECS, "30"),
        ]))
        .unwrap();
        assert_eq!(config.role, "admin");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_and_bad_values() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_KEY, "k")])).unwrap_err();
        assert!(err.to_string().contains(ENV_BASE_URL));
        assert!(ClientConfig::from_lookup(lookup(&[(ENV_BASE_URL, "http://x"), (ENV_API_KEY, " ")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://x"),
            (ENV_API_KEY, "k"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]))
        .is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let shown = format!("{:?}", ClientConfig::new("http://x", "top-secret"));
        assert!(!shown.contains("top-secret"));
    }
}
