// ── Session configuration ──
//
// Describes how to reach one controller. Carries credential data and
// connection tuning; never touches disk.

use std::time::Duration;

use vantage_api::{Credentials, TlsMode};

/// Configuration for a [`Vantage`](crate::Vantage) session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hostname or IP address of the controller.
    pub host: String,
    /// Login credentials, if the controller requires them.
    pub credentials: Option<Credentials>,
    /// TLS verification mode; `None` disables TLS and dials the
    /// plaintext fallback ports (2001/3001).
    pub tls: Option<TlsMode>,
    /// Override the config service port (default 2010/2001).
    pub config_port: Option<u16>,
    /// Override the command service port (default 3010/3001).
    pub command_port: Option<u16>,
    /// TCP connect + TLS handshake timeout.
    pub conn_timeout: Duration,
    /// Config-channel response frame timeout.
    pub read_timeout: Duration,
    /// Command-channel response line timeout.
    pub response_timeout: Duration,
    /// Objects per config-channel filter page.
    pub page_size: u32,
    /// Concurrent per-object state fetches during initialize.
    pub state_fetch_concurrency: usize,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            credentials: None,
            tls: Some(TlsMode::default()),
            config_port: None,
            command_port: None,
            conn_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(5),
            page_size: 50,
            state_fetch_concurrency: 20,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Disable TLS and use the plaintext fallback ports.
    pub fn without_tls(mut self) -> Self {
        self.tls = None;
        self
    }
}
