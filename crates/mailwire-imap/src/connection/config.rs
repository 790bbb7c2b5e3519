//! Connection and session configuration.

use std::time::Duration;

/// Transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext. Only for local testing.
    None,
    /// Plaintext, upgraded with STARTTLS before login.
    StartTls,
    /// TLS from the first byte.
    #[default]
    Implicit,
}

impl Security {
    /// Port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname, also used for TLS server-name checks.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
    /// Limit on establishing the transport and reading the greeting.
    pub connect_timeout: Duration,
    /// Limit on writing one command.
    pub send_timeout: Duration,
    /// Limit on waiting for one response line.
    pub receive_timeout: Duration,
    /// How long one IDLE runs before it is re-issued.
    pub idle_timeout: Duration,
    /// Longest accepted response line, literals excluded.
    pub max_line_length: usize,
    /// Largest accepted literal.
    pub max_literal_size: u64,
    /// Issue NAMESPACE and ID after login when advertised.
    pub request_namespace_and_id: bool,
    /// Field/value pairs sent with ID.
    pub client_id: Vec<(String, String)>,
}

impl Config {
    /// Default configuration for `host` with implicit TLS.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    send_timeout: Duration,
    receive_timeout: Duration,
    idle_timeout: Duration,
    max_line_length: usize,
    max_literal_size: u64,
    request_namespace_and_id: bool,
    client_id: Vec<(String, String)>,
}

impl ConfigBuilder {
    /// Starts from the defaults.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            connect_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(60),
            receive_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(29 * 60),
            max_line_length: 1024 * 1024,
            max_literal_size: 50 * 1024 * 1024,
            request_namespace_and_id: true,
            client_id: vec![
                ("name".to_string(), env!("CARGO_PKG_NAME").to_string()),
                ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
            ],
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the send timeout.
    #[must_use]
    pub const fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sets the receive timeout.
    #[must_use]
    pub const fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Sets the IDLE re-issue period.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the longest accepted response line.
    #[must_use]
    pub const fn max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Sets the largest accepted literal.
    #[must_use]
    pub const fn max_literal_size(mut self, limit: u64) -> Self {
        self.max_literal_size = limit;
        self
    }

    /// Enables or disables post-login NAMESPACE/ID.
    #[must_use]
    pub const fn request_namespace_and_id(mut self, enabled: bool) -> Self {
        self.request_namespace_and_id = enabled;
        self
    }

    /// Replaces the ID field/value pairs.
    #[must_use]
    pub fn client_id(mut self, fields: Vec<(String, String)>) -> Self {
        self.client_id = fields;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            send_timeout: self.send_timeout,
            receive_timeout: self.receive_timeout,
            idle_timeout: self.idle_timeout,
            max_line_length: self.max_line_length,
            max_literal_size: self.max_literal_size,
            request_namespace_and_id: self.request_namespace_and_id,
            client_id: self.client_id,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn defaults() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.receive_timeout, Duration::from_secs(60));
        assert_eq!(config.idle_timeout, Duration::from_secs(1740));
        assert_eq!(config.max_line_length, 1_048_576);
        assert!(config.request_namespace_and_id);
        assert_eq!(config.client_id[0].0, "name");
    }

    #[test]
    fn builder_overrides() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .receive_timeout(Duration::from_secs(5))
            .max_literal_size(10)
            .request_namespace_and_id(false)
            .build();
        assert_eq!(config.port, 143);
        assert_eq!(config.receive_timeout, Duration::from_secs(5));
        assert_eq!(config.max_literal_size, 10);
        assert!(!config.request_namespace_and_id);
    }
}
