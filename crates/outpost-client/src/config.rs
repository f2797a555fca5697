//! Client runtime configuration.

use std::time::Duration;

use tracing::warn;

/// Everything the client runtime needs to reach and stay on a server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` of the server's WebSocket listener.
    pub server_addr: String,
    pub username: String,
    pub credential: String,
    /// Delay before the first reconnect attempt. Doubles per failure.
    pub initial_backoff: Duration,
    /// Upper bound on the doubled delay, before jitter.
    pub max_backoff: Duration,
    /// Random extra delay (0–max) added to every backoff step.
    pub backoff_jitter: Duration,
    /// Consecutive failed dials before giving up. 0 = retry forever.
    pub max_attempts: u32,
    /// How often to send `Ping│`.
    pub health_interval: Duration,
    /// Close and redial after this long without any inbound record.
    pub liveness_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:25555".to_string(),
            username: String::new(),
            credential: String::new(),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_jitter: Duration::from_millis(250),
            max_attempts: 0,
            health_interval: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(15),
        }
    }
}

impl ClientConfig {
    /// A config for `username` on `server_addr` with default timings.
    pub fn new(
        server_addr: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            server_addr: server_addr.into(),
            username: username.into(),
            credential: credential.into(),
            ..Default::default()
        }
    }

    /// Fixes out-of-range timings so the config is safe to use.
    ///
    /// Called by [`OutpostClient::spawn`](crate::OutpostClient::spawn). Rules:
    /// - `health_interval` is at least 1 ms.
    /// - `max_backoff` is at least `initial_backoff`.
    /// - `liveness_timeout` is at least `health_interval`.
    pub fn validated(mut self) -> Self {
        if self.health_interval.is_zero() {
            warn!("health_interval is zero, using 1 ms");
            self.health_interval = Duration::from_millis(1);
        }
        if self.max_backoff < self.initial_backoff {
            self.max_backoff = self.initial_backoff;
        }
        if self.liveness_timeout < self.health_interval {
            warn!(
                liveness = ?self.liveness_timeout,
                interval = ?self.health_interval,
                "liveness_timeout shorter than health_interval, raising it"
            );
            self.liveness_timeout = self.health_interval;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_raises_liveness_to_interval() {
        let config = ClientConfig {
            health_interval: Duration::from_secs(10),
            liveness_timeout: Duration::from_secs(1),
            ..Default::default()
        }
        .validated();
        assert_eq!(config.liveness_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validated_max_backoff_not_below_initial() {
        let config = ClientConfig {
            initial_backoff: Duration::from_secs(4),
            max_backoff: Duration::from_secs(1),
            ..Default::default()
        }
        .validated();
        assert_eq!(config.max_backoff, Duration::from_secs(4));
    }
}
