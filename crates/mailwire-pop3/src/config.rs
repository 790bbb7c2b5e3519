//! POP3 connection configuration.

use std::time::Duration;

/// Transport security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// Plaintext. Only for local testing.
    None,
    /// Plaintext, upgraded with STLS before login.
    Stls,
    /// TLS from the first byte.
    #[default]
    Implicit,
}

impl Security {
    /// Port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::Stls => 110,
            Self::Implicit => 995,
        }
    }
}

/// POP3 connection configuration.
#[derive(Debug, Clone)]
pub struct Pop3Config {
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
    /// Longest accepted line, CRLF included.
    pub max_line_length: usize,
}

impl Pop3Config {
    /// Default configuration for `host` with implicit TLS.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Pop3ConfigBuilder::new(host).build()
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> Pop3ConfigBuilder {
        Pop3ConfigBuilder::new(host)
    }
}

/// Builder for [`Pop3Config`].
#[derive(Debug, Clone)]
pub struct Pop3ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    connect_timeout: Duration,
    send_timeout: Duration,
    receive_timeout: Duration,
    max_line_length: usize,
}

impl Pop3ConfigBuilder {
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
            max_line_length: 1024 * 1024,
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

    /// Sets the longest accepted line.
    #[must_use]
    pub const fn max_line_length(mut self, limit: usize) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Pop3Config {
        Pop3Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            connect_timeout: self.connect_timeout,
            send_timeout: self.send_timeout,
            receive_timeout: self.receive_timeout,
            max_line_length: self.max_line_length,
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
    fn ports_follow_security() {
        assert_eq!(Pop3Config::new("pop.example.com").port, 995);
        let config = Pop3Config::builder("pop.example.com")
            .security(Security::Stls)
            .build();
        assert_eq!(config.port, 110);
        let config = Pop3Config::builder("localhost")
            .security(Security::None)
            .port(1110)
            .build();
        assert_eq!(config.port, 1110);
    }
}
