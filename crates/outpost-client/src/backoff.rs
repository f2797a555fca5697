//! Exponential reconnect backoff with random jitter.

use std::time::Duration;

use rand::Rng;

/// Delay schedule for redialing a server.
///
/// Each failed attempt doubles the base delay up to a cap; a random
/// jitter is added on top.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    /// `max_attempts` of 0 never gives up.
    pub fn new(initial: Duration, max: Duration, jitter: Duration, max_attempts: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            jitter,
            max_attempts,
            attempt: 0,
        }
    }

    /// Failed attempts since the last [`reset`](Self::reset).
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Records a failure and returns how long to wait before the next
    /// attempt, or `None` once `max_attempts` failures have been seen.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.max_attempts > 0 && self.attempt >= self.max_attempts {
            return None;
        }

        let doublings = (self.attempt - 1).min(16);
        let base = self.initial.saturating_mul(1 << doublings).min(self.max);

        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        Some(base + jitter)
    }

    /// Back to the initial delay, after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(max_attempts: u32) -> Backoff {
        Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(350),
            Duration::ZERO,
            max_attempts,
        )
    }

    #[test]
    fn test_next_delay_doubles_then_caps() {
        let mut backoff = no_jitter(0);
        let delays: Vec<_> = (0..4).filter_map(|_| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(350),
                Duration::from_millis(350),
            ]
        );
    }

    #[test]
    fn test_next_delay_gives_up_after_max_attempts() {
        let mut backoff = no_jitter(3);
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_next_delay_jitter_within_bound() {
        let mut backoff = Backoff::new(
            Duration::from_millis(100),
            Duration::from_millis(100),
            Duration::from_millis(50),
            0,
        );
        for _ in 0..50 {
            let delay = backoff.next_delay().unwrap();
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut backoff = no_jitter(0);
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }
}
