//! Client configuration.
//!
//! [`ClientConfig::default`] targets the production endpoints. [`fetch_config`]
//! applies overrides from environment variables:
//! - `KRAKEN_WEBSOCKET_URL`: public WebSocket endpoint
//! - `KRAKEN_AUTH_WEBSOCKET_URL`: authenticated WebSocket endpoint
//! - `KRAKEN_API_KEY` / `KRAKEN_API_SECRET`: credentials for the token
//!   issuer; optional, but when one is set both must be present.

use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::FeedError;

/// Public market-data endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://ws.kraken.com";

/// Default endpoint for private channels and order requests.
pub const DEFAULT_AUTH_WEBSOCKET_URL: &str = "wss://ws-auth.kraken.com";

/// Session and endpoint settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub websocket_url: String,
    pub auth_websocket_url: String,
    /// Bound on a single dial attempt.
    pub dial_timeout: Duration,
    /// How often a ping is sent.
    pub ping_interval: Duration,
    /// Reconnect when no frame at all arrives for this long.
    pub heartbeat_timeout: Duration,
    /// Delay before the first reconnect attempt; doubles per failed attempt.
    pub reconnect_backoff: Duration,
    pub max_backoff: Duration,
    /// Failed reconnect attempts before the session gives up.
    pub max_reconnect_attempts: u32,
    /// Capacity of the event stream returned by `listen`.
    pub update_buffer: usize,
    /// How long delivery to a full event stream may block before the event
    /// is dropped.
    pub send_timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            websocket_url: DEFAULT_WEBSOCKET_URL.to_string(),
            auth_websocket_url: DEFAULT_AUTH_WEBSOCKET_URL.to_string(),
            dial_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            reconnect_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_reconnect_attempts: 10,
            update_buffer: 1024,
            send_timeout: Duration::from_secs(5),
            credentials: None,
        }
    }
}

/// REST API key pair used to obtain WebSocket tokens.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Loads the configuration from environment variables on top of the
/// defaults.
///
/// # Errors
///
/// Returns [`FeedError::Config`] if only one of the two credential
/// variables is set.
pub fn fetch_config() -> crate::Result<ClientConfig> {
    let mut config = ClientConfig::default();

    if let Some(url) = env_value("KRAKEN_WEBSOCKET_URL") {
        config.websocket_url = url;
    }
    if let Some(url) = env_value("KRAKEN_AUTH_WEBSOCKET_URL") {
        config.auth_websocket_url = url;
    }

    config.credentials = credentials_from_env()?;
    Ok(config)
}

fn credentials_from_env() -> crate::Result<Option<Credentials>> {
    let key = env_value("KRAKEN_API_KEY");
    let secret = env_value("KRAKEN_API_SECRET");
    match (key, secret) {
        (None, None) => Ok(None),
        (Some(api_key), Some(api_secret)) => Ok(Some(Credentials {
            api_key,
            api_secret: Zeroizing::new(api_secret),
        })),
        (key, _) => {
            let (present, absent) = if key.is_some() {
                ("KRAKEN_API_KEY", "KRAKEN_API_SECRET")
            } else {
                ("KRAKEN_API_SECRET", "KRAKEN_API_KEY")
            };
            Err(FeedError::Config(format!(
                "{present} is set without {absent}; credentials need both"
            )))
        }
    }
}

/// Unset and empty variables both read as `None`.
fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes the tests in this module; they share the process
    /// environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "KRAKEN_WEBSOCKET_URL",
        "KRAKEN_AUTH_WEBSOCKET_URL",
        "KRAKEN_API_KEY",
        "KRAKEN_API_SECRET",
    ];

    /// Runs `f` with exactly `vars` set among the `KRAKEN_*` variables,
    /// putting the previous environment back afterwards.
    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let saved: Vec<_> = VARS.iter().map(|name| (*name, std::env::var(name).ok())).collect();

        // SAFETY: callers hold ENV_LOCK.
        unsafe {
            VARS.iter().for_each(|name| std::env::remove_var(name));
            vars.iter().for_each(|(name, value)| std::env::set_var(name, value));
        }

        f();

        // SAFETY: still under ENV_LOCK.
        unsafe {
            for (name, previous) in saved {
                if let Some(value) = previous {
                    std::env::set_var(name, value);
                } else {
                    std::env::remove_var(name);
                }
            }
        }
    }

    #[test]
    fn unset_environment_gives_defaults() {
        with_env(&[], || {
            let config = tokio_test::assert_ok!(fetch_config());
            assert_eq!(config.websocket_url, DEFAULT_WEBSOCKET_URL);
            assert_eq!(config.auth_websocket_url, DEFAULT_AUTH_WEBSOCKET_URL);
            assert_eq!(config.heartbeat_timeout, Duration::from_secs(30));
            assert_eq!(config.max_reconnect_attempts, 10);
            assert!(config.credentials.is_none());
        });
    }

    #[test]
    fn credential_pair_is_loaded() {
        with_env(
            &[("KRAKEN_API_KEY", "test-key"), ("KRAKEN_API_SECRET", "test-secret")],
            || {
                let config = fetch_config().unwrap();
                let credentials = config.credentials.unwrap();
                assert_eq!(credentials.api_key, "test-key");
                assert_eq!(credentials.api_secret.as_str(), "test-secret");
            },
        );
    }

    #[test]
    fn custom_urls() {
        with_env(
            &[
                ("KRAKEN_WEBSOCKET_URL", "wss://custom.example.com"),
                ("KRAKEN_AUTH_WEBSOCKET_URL", "wss://auth.example.com"),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.websocket_url, "wss://custom.example.com");
                assert_eq!(config.auth_websocket_url, "wss://auth.example.com");
            },
        );
    }

    #[test]
    fn key_alone_is_a_config_error() {
        with_env(&[("KRAKEN_API_KEY", "key-only")], || {
            let err = fetch_config().unwrap_err();
            assert!(matches!(err, FeedError::Config(_)));
            assert!(err.to_string().contains("without KRAKEN_API_SECRET"));
        });
    }

    #[test]
    fn secret_alone_is_a_config_error() {
        with_env(&[("KRAKEN_API_SECRET", "secret-only")], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("without KRAKEN_API_KEY"));
        });
    }

    #[test]
    fn blank_variables_are_ignored() {
        with_env(
            &[
                ("KRAKEN_API_KEY", ""),
                ("KRAKEN_API_SECRET", ""),
                ("KRAKEN_WEBSOCKET_URL", ""),
            ],
            || {
                let config = fetch_config().expect("blank vars are not an error");
                assert_eq!(config.websocket_url, DEFAULT_WEBSOCKET_URL);
                assert!(config.credentials.is_none());
            },
        );
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let credentials = Credentials {
            api_key: "key".into(),
            api_secret: Zeroizing::new("hunter2".into()),
        };
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }
}
