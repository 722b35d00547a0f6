use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppCore;

pub(crate) const CONFIG_FILE_NAME: &str = "chat_config.json";

const DEFAULT_API_BASE_URL: &str = "https://api.sraws.com/api";
const DEFAULT_STREAM_URL: &str = "wss://api.sraws.com/socket.io/?EIO=4&transport=websocket";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_POLL_RETRY_BASE_MS: u64 = 1_000;
const DEFAULT_STREAM_RECONNECT_BASE_MS: u64 = 500;
const DEFAULT_STREAM_RECONNECT_MAX_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub(crate) api_base_url: Option<String>,
    pub(crate) stream_url: Option<String>,
    pub(crate) disable_network: Option<bool>,
    pub(crate) log_to_file: Option<bool>,
    pub(crate) poll_interval_secs: Option<u64>,
    // Tests use sub-second cadences; takes precedence over `poll_interval_secs`.
    pub(crate) poll_interval_ms: Option<u64>,
    pub(crate) poll_retry_base_ms: Option<u64>,
    pub(crate) stream_reconnect_base_ms: Option<u64>,
    pub(crate) stream_reconnect_max_ms: Option<u64>,
    pub(crate) request_timeout_secs: Option<u64>,
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    serde_json::from_slice::<AppConfig>(&bytes).unwrap_or_else(|e| {
        tracing::warn!(%e, path = %path.display(), "invalid config; using defaults");
        AppConfig::default()
    })
}

pub(crate) fn default_app_config_json() -> String {
    let defaults = AppConfig {
        api_base_url: Some(DEFAULT_API_BASE_URL.to_string()),
        stream_url: Some(DEFAULT_STREAM_URL.to_string()),
        disable_network: Some(false),
        log_to_file: Some(false),
        poll_interval_secs: Some(DEFAULT_POLL_INTERVAL_SECS),
        poll_interval_ms: None,
        poll_retry_base_ms: Some(DEFAULT_POLL_RETRY_BASE_MS),
        stream_reconnect_base_ms: Some(DEFAULT_STREAM_RECONNECT_BASE_MS),
        stream_reconnect_max_ms: Some(DEFAULT_STREAM_RECONNECT_MAX_MS),
        request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
    };
    serde_json::to_string_pretty(&defaults).unwrap_or_else(|_| "{}".to_string())
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

impl AppConfig {
    pub(crate) fn api_base_url(&self) -> String {
        env_override("COMMUNITY_CHAT_API_URL")
            .or_else(|| non_empty(&self.api_base_url))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub(crate) fn stream_url(&self) -> String {
        env_override("COMMUNITY_CHAT_STREAM_URL")
            .or_else(|| non_empty(&self.stream_url))
            .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string())
    }

    pub(crate) fn network_enabled(&self) -> bool {
        // Used to keep Rust tests deterministic and offline.
        if let Some(disable) = self.disable_network {
            return !disable;
        }
        env_override("COMMUNITY_CHAT_DISABLE_NETWORK").as_deref() != Some("1")
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        if let Some(ms) = self.poll_interval_ms.filter(|ms| *ms > 0) {
            return Duration::from_millis(ms);
        }
        Duration::from_secs(
            self.poll_interval_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    pub(crate) fn poll_retry_base(&self) -> Duration {
        Duration::from_millis(
            self.poll_retry_base_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_POLL_RETRY_BASE_MS),
        )
    }

    pub(crate) fn stream_reconnect_base(&self) -> Duration {
        Duration::from_millis(
            self.stream_reconnect_base_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_STREAM_RECONNECT_BASE_MS),
        )
    }

    pub(crate) fn stream_reconnect_max(&self) -> Duration {
        Duration::from_millis(
            self.stream_reconnect_max_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_STREAM_RECONNECT_MAX_MS),
        )
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

impl AppCore {
    pub(super) fn network_enabled(&self) -> bool {
        self.config.network_enabled()
    }
}
