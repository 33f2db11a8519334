//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::state::LikeScope;

/// Default npm registry search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "http://registry.npmjs.com/-/v1/search";

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Port the `/api/messages` endpoint listens on.
    pub port: u16,
    /// Package search endpoint queried by the extension engine.
    pub search_endpoint: String,
    /// Transport timeout for search requests.
    pub search_timeout: Duration,
    /// URL opened by the `google` message command.
    pub google_url: String,
    /// URL opened by the `openWebUrl` extension command.
    pub web_url: String,
    /// How like counters are shared between conversations.
    pub like_scope: LikeScope,
    /// Actually launch a browser for navigation side effects (otherwise log only).
    pub open_urls: bool,
    /// Directory of `<id>.json` card templates overriding the built-ins.
    pub template_dir: Option<PathBuf>,
    /// Bearer token attached to outbound connector calls.
    pub connector_token: Option<SecretString>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            port: 3978,
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            search_timeout: Duration::from_secs(10),
            google_url: "https://google.com/".to_string(),
            web_url: "https://google.pt?query=test".to_string(),
            like_scope: LikeScope::Conversation,
            open_urls: false,
            template_dir: None,
            connector_token: None,
        }
    }
}

impl BotConfig {
    /// Build configuration from `BOT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("BOT_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "BOT_PORT".into(),
                message: format!("expected a port number, got {raw:?}"),
            })?,
            None => defaults.port,
        };

        let search_timeout = match lookup("BOT_SEARCH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "BOT_SEARCH_TIMEOUT_SECS".into(),
                    message: format!("expected seconds, got {raw:?}"),
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.search_timeout,
        };

        let like_scope = match lookup("BOT_LIKE_SCOPE") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "BOT_LIKE_SCOPE".into(),
                    message,
                })?,
            None => defaults.like_scope,
        };

        let open_urls = lookup("BOT_OPEN_URLS")
            .map(|raw| matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.open_urls);

        Ok(Self {
            port,
            search_endpoint: lookup("BOT_SEARCH_ENDPOINT").unwrap_or(defaults.search_endpoint),
            search_timeout,
            google_url: lookup("BOT_GOOGLE_URL").unwrap_or(defaults.google_url),
            web_url: lookup("BOT_WEB_URL").unwrap_or(defaults.web_url),
            like_scope,
            open_urls,
            template_dir: lookup("BOT_TEMPLATE_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            connector_token: lookup("BOT_CONNECTOR_TOKEN")
                .filter(|s| !s.is_empty())
                .map(SecretString::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = BotConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3978);
        assert_eq!(config.search_endpoint, DEFAULT_SEARCH_ENDPOINT);
        assert_eq!(config.like_scope, LikeScope::Conversation);
        assert!(!config.open_urls);
        assert!(config.template_dir.is_none());
        assert!(config.connector_token.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_PORT", "8080"),
            ("BOT_LIKE_SCOPE", "global"),
            ("BOT_OPEN_URLS", "true"),
            ("BOT_SEARCH_TIMEOUT_SECS", "3"),
            ("BOT_TEMPLATE_DIR", "/etc/card-bot/templates"),
            ("BOT_CONNECTOR_TOKEN", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.like_scope, LikeScope::Global);
        assert!(config.open_urls);
        assert_eq!(config.search_timeout, Duration::from_secs(3));
        assert_eq!(
            config.template_dir,
            Some(PathBuf::from("/etc/card-bot/templates"))
        );
        assert!(config.connector_token.is_some());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = BotConfig::from_lookup(lookup_from(&[("BOT_PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOT_PORT"));
    }

    #[test]
    fn invalid_like_scope_is_rejected() {
        let err = BotConfig::from_lookup(lookup_from(&[("BOT_LIKE_SCOPE", "per-user")])).unwrap_err();
        assert!(err.to_string().contains("BOT_LIKE_SCOPE"));
    }
}
