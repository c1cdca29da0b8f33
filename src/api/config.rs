//! Purpose: Network selection (mainnet or testnet) and relay endpoints for `PubkyClient`.
//! Exports: `NetworkConfig`, env var names.
//! Invariants: Environment overrides apply on top of the selected network's defaults.
//! Invariants: URLs are validated when a client is built, not here.
use std::time::Duration;

pub const ENV_PKARR_RELAYS: &str = "PUBKY_PKARR_RELAYS";
pub const ENV_HTTP_RELAY: &str = "PUBKY_HTTP_RELAY";

const MAINNET_RELAYS: &[&str] = &["https://pkarr.pubky.app", "https://pkarr.pubky.org"];
const MAINNET_HTTP_RELAY: &str = "https://httprelay.pubky.app/link/";
const TESTNET_RELAYS: &[&str] = &["http://localhost:15411"];
const TESTNET_HTTP_RELAY: &str = "http://localhost:15412/link/";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_SIZE: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub relays: Vec<String>,
    pub http_relay: String,
    pub request_timeout: Duration,
    pub cache_size: usize,
    pub testnet: bool,
}

impl NetworkConfig {
    pub fn mainnet() -> Self {
        Self {
            relays: MAINNET_RELAYS.iter().map(|relay| relay.to_string()).collect(),
            http_relay: MAINNET_HTTP_RELAY.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_size: DEFAULT_CACHE_SIZE,
            testnet: false,
        }
    }

    pub fn testnet() -> Self {
        Self {
            relays: TESTNET_RELAYS.iter().map(|relay| relay.to_string()).collect(),
            http_relay: TESTNET_HTTP_RELAY.to_string(),
            testnet: true,
            ..Self::mainnet()
        }
    }

    /// Defaults for the selected network with `PUBKY_*` overrides from the process environment.
    pub fn from_env(testnet: bool) -> Self {
        Self::with_overrides(testnet, |name| std::env::var(name).ok())
    }

    pub(crate) fn with_overrides<F>(testnet: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if testnet {
            Self::testnet()
        } else {
            Self::mainnet()
        };
        if let Some(relays) = lookup(ENV_PKARR_RELAYS) {
            let parsed: Vec<String> = relays
                .split(',')
                .map(str::trim)
                .filter(|relay| !relay.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                config.relays = parsed;
            }
        }
        if let Some(http_relay) = lookup(ENV_HTTP_RELAY) {
            let trimmed = http_relay.trim();
            if !trimmed.is_empty() {
                config.http_relay = trimmed.to_string();
            }
        }
        config
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::mainnet()
    }
}
