// MIT License
// Rust translation of lib/radiora2.js

/// Configuration for connecting to a RadioRA2 main repeater.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Controller hostname or IP address
    pub host: String,
    /// Controller telnet port (default: 23)
    pub port: u16,
    /// Integration account username (default: lutron)
    pub username: String,
    /// Integration account password (default: integration)
    pub password: String,
    /// Fixed delay between reconnection attempts in milliseconds
    /// (default: 1000). There is no backoff and no retry cap.
    pub reconnect_delay_ms: u64,
    /// How long `query_output` waits for its `~OUTPUT` reply before the
    /// pending entry is dropped (default: 5000)
    pub query_timeout_ms: u64,
    /// Capacity of the broadcast event channel (default: 256)
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.50".to_string(),
            port: 23,
            username: "lutron".to_string(),
            password: "integration".to_string(),
            reconnect_delay_ms: 1000,
            query_timeout_ms: 5000,
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for SessionConfig.
#[derive(Debug, Clone, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.config.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_ms = ms;
        self
    }

    pub fn query_timeout_ms(mut self, ms: u64) -> Self {
        self.config.query_timeout_ms = ms;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 23);
        assert_eq!(config.reconnect_delay_ms, 1000);
        assert_eq!(config.query_timeout_ms, 5000);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::builder()
            .host("10.0.0.8")
            .port(2323)
            .username("admin")
            .password("hunter2")
            .reconnect_delay_ms(250)
            .build();

        assert_eq!(config.host, "10.0.0.8");
        assert_eq!(config.port, 2323);
        assert_eq!(config.username, "admin");
        assert_eq!(config.password, "hunter2");
        assert_eq!(config.reconnect_delay_ms, 250);
        // Untouched fields keep their defaults
        assert_eq!(config.query_timeout_ms, 5000);
    }
}
