use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Public CSV export of the crowd-sourced report sheet.
pub const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/1Nlyf8Yz_9Fst8rEmQc2IMc-DWLF1fpmBTB7n4FlZwxs/export?format=csv&gid=0";

/// Editable view of the same sheet, linked from the error banner and intro text.
pub const SHEET_EDIT_URL: &str = "https://docs.google.com/spreadsheets/d/1Nlyf8Yz_9Fst8rEmQc2IMc-DWLF1fpmBTB7n4FlZwxs/edit?gid=1695573594#gid=1695573594";

pub const DEFAULT_IP_URL: &str = "https://api64.ipify.org?format=json";

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration shared by both binaries
///
/// Every field can be overridden from the environment:
///
/// | variable                 | field          |
/// |--------------------------|----------------|
/// | `CSRD_SHEET_URL`         | `sheet_url`    |
/// | `CSRD_IP_URL`            | `ip_url`       |
/// | `CSRD_WEBHOOK_URL`       | `webhook_url`  |
/// | `CSRD_BIND`              | `bind`         |
/// | `CSRD_HTTP_TIMEOUT_SECS` | `http_timeout` |
///
/// An unset or empty `CSRD_WEBHOOK_URL` disables click logging.
#[derive(Clone, Debug)]
pub struct Config {
    pub sheet_url: String,
    pub ip_url: String,
    pub webhook_url: Option<String>,
    pub bind: String,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_url: DEFAULT_SHEET_URL.to_string(),
            ip_url: DEFAULT_IP_URL.to_string(),
            webhook_url: None,
            bind: DEFAULT_BIND.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Builds the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty("CSRD_SHEET_URL") {
            config.sheet_url = url;
        }
        if let Some(url) = non_empty("CSRD_IP_URL") {
            config.ip_url = url;
        }
        config.webhook_url = non_empty("CSRD_WEBHOOK_URL");
        if let Some(bind) = non_empty("CSRD_BIND") {
            config.bind = bind;
        }
        if let Some(raw) = non_empty("CSRD_HTTP_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    key: "CSRD_HTTP_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.http_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.sheet_url, DEFAULT_SHEET_URL);
        assert_eq!(config.ip_url, DEFAULT_IP_URL);
        assert!(config.webhook_url.is_none());
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup_from(&[
            ("CSRD_WEBHOOK_URL", "http://hook.local/x"),
            ("CSRD_BIND", "0.0.0.0:8080"),
            ("CSRD_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.webhook_url.as_deref(), Some("http://hook.local/x"));
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_webhook_disables_logging() {
        let config = Config::from_lookup(lookup_from(&[("CSRD_WEBHOOK_URL", "  ")])).unwrap();
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("CSRD_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("CSRD_HTTP_TIMEOUT_SECS"));
    }
}
