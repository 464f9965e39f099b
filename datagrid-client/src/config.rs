//! Client configuration.

use std::net::SocketAddr;
use std::time::Duration;

use datagrid_core::{GridError, Result};

/// Retry behavior for operations that fail with a retriable transport error.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts per operation, including the first.
    pub max_attempts: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for the backoff.
    pub max_backoff: Duration,
    /// Backoff multiplier applied per retry.
    pub multiplier: f64,
    /// Random jitter factor in `[0, 1)` applied to each backoff.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

/// Configuration for a [`GridClient`](crate::GridClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    addresses: Vec<SocketAddr>,
    connect_timeout: Duration,
    request_timeout: Duration,
    heartbeat_interval: Duration,
    retry: RetryPolicy,
}

impl ClientConfig {
    /// Starts building a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Cluster node addresses, sorted.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Timeout for establishing a TCP connection.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Timeout for a single request/response round trip.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Interval between heartbeat probes on idle connections.
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Retry policy for retriable failures of idempotent operations.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    addresses: Vec<SocketAddr>,
    parse_error: Option<String>,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    heartbeat_interval: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl ClientConfigBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cluster node address in `host:port` form.
    pub fn address(mut self, addr: &str) -> Self {
        match addr.parse::<SocketAddr>() {
            Ok(a) => self.addresses.push(a),
            Err(e) => {
                self.parse_error
                    .get_or_insert_with(|| format!("invalid address '{}': {}", addr, e));
            }
        }
        self
    }

    /// Adds an already-parsed cluster node address.
    pub fn socket_address(mut self, addr: SocketAddr) -> Self {
        self.addresses.push(addr);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<ClientConfig> {
        if let Some(err) = self.parse_error {
            return Err(GridError::InvalidArgument(err));
        }
        if self.addresses.is_empty() {
            return Err(GridError::InvalidArgument(
                "at least one cluster address is required".to_string(),
            ));
        }

        let mut addresses = self.addresses;
        addresses.sort();
        addresses.dedup();

        Ok(ClientConfig {
            addresses,
            connect_timeout: self.connect_timeout.unwrap_or(Duration::from_secs(5)),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
            heartbeat_interval: self.heartbeat_interval.unwrap_or(Duration::from_secs(10)),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder()
            .address("127.0.0.1:10800")
            .build()
            .unwrap();
        assert_eq!(config.addresses().len(), 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry().max_attempts, 3);
    }

    #[test]
    fn test_empty_addresses_rejected() {
        assert!(ClientConfig::builder().build().is_err());
    }

    #[test]
    fn test_invalid_address_rejected() {
        let result = ClientConfig::builder().address("not-an-address").build();
        assert!(matches!(result, Err(GridError::InvalidArgument(_))));
    }

    #[test]
    fn test_addresses_sorted_and_deduped() {
        let config = ClientConfig::builder()
            .address("127.0.0.1:10801")
            .address("127.0.0.1:10800")
            .address("127.0.0.1:10801")
            .build()
            .unwrap();
        assert_eq!(config.addresses().len(), 2);
        assert!(config.addresses()[0] < config.addresses()[1]);
    }
}
