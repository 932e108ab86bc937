//! Cloud API credentials from the process environment.

use std::fmt;

use crate::error::{ConfigError, ConfigResult};

pub const ENV_CLIENT_ID: &str = "VERDA_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "VERDA_CLIENT_SECRET";
pub const ENV_BASE_URL: &str = "VERDA_BASE_URL";
pub const ENV_DEBUG: &str = "VERDA_DEBUG";

/// Default API endpoint when `VERDA_BASE_URL` is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.verda.com/v1";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub debug: bool,
}

impl Credentials {
    /// Read credentials from the environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let client_id = get(ENV_CLIENT_ID).ok_or(ConfigError::MissingEnv(ENV_CLIENT_ID))?;
        let client_secret =
            get(ENV_CLIENT_SECRET).ok_or(ConfigError::MissingEnv(ENV_CLIENT_SECRET))?;
        let base_url = get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let debug = get(ENV_DEBUG)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        Ok(Self {
            client_id,
            client_secret,
            base_url,
            debug,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("debug", &self.debug)
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_for_optional_vars() {
        let creds = Credentials::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
        ]))
        .unwrap();
        assert_eq!(creds.base_url, DEFAULT_BASE_URL);
        assert!(!creds.debug);
    }

    #[test]
    fn optional_vars_are_read() {
        let creds = Credentials::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_BASE_URL, "http://localhost:8080"),
            (ENV_DEBUG, "TRUE"),
        ]))
        .unwrap();
        assert_eq!(creds.base_url, "http://localhost:8080");
        assert!(creds.debug);
    }

    #[test]
    fn missing_required_vars() {
        let err = Credentials::from_lookup(lookup(&[(ENV_CLIENT_SECRET, "secret")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ENV_CLIENT_ID)));

        let err = Credentials::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, ""),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ENV_CLIENT_SECRET)));
    }

    #[test]
    fn debug_output_hides_secret() {
        let creds = Credentials::from_lookup(lookup(&[
            (ENV_CLIENT_ID, "id"),
            (ENV_CLIENT_SECRET, "hunter2"),
        ]))
        .unwrap();
        let printed = format!("{creds:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }
}
