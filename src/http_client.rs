//! HTTP Client builder module
//!
//! Builds the reqwest client used for bot requests, with optional proxy

use reqwest::{Client, Proxy};
use std::time::Duration;

use crate::model::config::{Config, TlsBackend};

/// User agent sent with every bot request
const USER_AGENT: &str = concat!("botstream/", env!("CARGO_PKG_VERSION"));

/// Connection establishment timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy URL, supports http/https/socks5
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Proxy described by the config, credentials only when both are set
    pub fn from_config(config: &Config) -> Option<Self> {
        let url = config.proxy_url.as_ref()?;
        let proxy = Self::new(url);
        match (&config.proxy_username, &config.proxy_password) {
            (Some(username), Some(password)) => Some(proxy.with_auth(username, password)),
            _ => Some(proxy),
        }
    }
}

/// Build HTTP Client
///
/// # Arguments
/// * `proxy` - Optional proxy configuration
/// * `timeout_secs` - Whole-request timeout in seconds, streaming included
/// * `tls_backend` - TLS implementation
pub fn build_client(
    proxy: Option<&ProxyConfig>,
    timeout_secs: u64,
    tls_backend: TlsBackend,
) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(timeout_secs));

    if tls_backend == TlsBackend::Rustls {
        builder = builder.use_rustls_tls();
    }

    if let Some(proxy_config) = proxy {
        let mut proxy = Proxy::all(&proxy_config.url)?;

        if let (Some(username), Some(password)) = (&proxy_config.username, &proxy_config.password) {
            proxy = proxy.basic_auth(username, password);
        }

        builder = builder.proxy(proxy);
        tracing::debug!("HTTP Client using proxy: {}", proxy_config.url);
    }

    Ok(builder.build()?)
}

/// Build the client described by a config
pub fn build_client_from_config(config: &Config) -> anyhow::Result<Client> {
    let proxy = ProxyConfig::from_config(config);
    build_client(proxy.as_ref(), config.timeout_secs, config.tls_backend)
}
