use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bot::provider::{
    DEFAULT_BASE_URL, DEFAULT_CHANNEL_CAPACITY, DEFAULT_NUM_TRIES, DEFAULT_TIMEOUT_SECS,
    RetryPolicy, StreamRequestOptions,
};
use crate::bot::report::TracingReporter;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    #[default]
    Rustls,
    NativeTls,
}

/// Bot client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the bot endpoints, the bot name is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Attempts per request (0 falls back to the default)
    #[serde(default = "default_num_tries")]
    pub num_tries: usize,

    /// Delay between attempts in milliseconds
    #[serde(default = "default_retry_sleep_ms")]
    pub retry_sleep_ms: u64,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Capacity of the response channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub tls_backend: TlsBackend,

    /// HTTP proxy URL (optional)
    /// Supported formats: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    /// Proxy authentication username (optional)
    #[serde(default)]
    pub proxy_username: Option<String>,

    /// Proxy authentication password (optional)
    #[serde(default)]
    pub proxy_password: Option<String>,

    /// Config file path (runtime metadata, not written to JSON)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_num_tries() -> usize {
    DEFAULT_NUM_TRIES
}

fn default_retry_sleep_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            num_tries: default_num_tries(),
            retry_sleep_ms: default_retry_sleep_ms(),
            timeout_secs: default_timeout_secs(),
            channel_capacity: default_channel_capacity(),
            tls_backend: TlsBackend::default(),
            proxy_url: None,
            proxy_username: None,
            proxy_password: None,
            config_path: None,
        }
    }
}

impl Config {
    /// Get default config file path
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // Config file doesn't exist, return default config
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get config file path (if available)
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Retry policy described by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.num_tries, Duration::from_millis(self.retry_sleep_ms))
    }

    /// Request options described by this configuration
    pub fn stream_options(&self) -> StreamRequestOptions {
        let mut options = StreamRequestOptions::default()
            .with_base_url(self.base_url.clone())
            .with_retry(self.retry_policy())
            .with_channel_capacity(self.channel_capacity)
            .with_reporter(Arc::new(TracingReporter));
        options.api_key = self.api_key.clone();
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "https://api.poe.com/bot/");
        assert_eq!(config.num_tries, 2);
        assert_eq!(config.retry_sleep_ms, 500);
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.channel_capacity, 64);
        assert_eq!(config.tls_backend, TlsBackend::Rustls);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_camel_case_fields() {
        let json = r#"{
            "baseUrl": "http://localhost:9000/bot",
            "apiKey": "secret",
            "numTries": 4,
            "retrySleepMs": 50,
            "tlsBackend": "native-tls",
            "proxyUrl": "socks5://127.0.0.1:1080"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_url, "http://localhost:9000/bot");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.tls_backend, TlsBackend::NativeTls);
        assert_eq!(config.proxy_url.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(4, Duration::from_millis(50))
        );
    }

    #[test]
    fn test_stream_options() {
        let config = Config {
            api_key: Some("k".to_string()),
            num_tries: 0,
            channel_capacity: 8,
            ..Default::default()
        };
        let options = config.stream_options();
        assert_eq!(options.api_key.as_deref(), Some("k"));
        assert_eq!(options.retry.num_tries, 2);
        assert_eq!(options.channel_capacity, 8);
        assert_eq!(options.base_url, "https://api.poe.com/bot/");
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::env::temp_dir().join("botstream-missing-config-7f3a.json");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.num_tries, 2);
        assert_eq!(config.config_path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("botstream-config-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, r#"{"numTries": 3, "timeoutSecs": 30}"#).unwrap();

        let config = Config::load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.num_tries, 3);
        assert_eq!(config.timeout_secs, 30);
    }
}
