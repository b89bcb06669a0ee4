use std::time::Duration;

/// Exponential reconnect delay: `first_ms`, multiplied by `factor` after
/// every failed attempt, capped at `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            first_ms: 500,
            max_ms: 30_000,
            factor: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn is_valid(&self) -> bool {
        self.first_ms > 0 && self.first_ms <= self.max_ms && self.factor >= 1.0
    }
}

/// Running delay state for one agent's connection loop.
#[derive(Debug)]
pub(crate) struct Backoff {
    config: BackoffConfig,
    current_ms: u64,
}

impl Backoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            current_ms: config.first_ms,
            config,
        }
    }

    /// Delay before the next attempt; grows the following one.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current_ms.min(self.config.max_ms);
        let grown = (self.current_ms as f64 * self.config.factor).round() as u64;
        self.current_ms = grown.clamp(self.config.first_ms, self.config.max_ms);
        Duration::from_millis(delay)
    }

    pub(crate) fn reset(&mut self) {
        self.current_ms = self.config.first_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_up_to_max_and_resets() {
        let mut b = Backoff::new(BackoffConfig {
            first_ms: 100,
            max_ms: 1000,
            factor: 2.0,
        });
        let delays: Vec<u64> = (0..6).map(|_| b.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, [100, 200, 400, 800, 1000, 1000]);

        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn validation() {
        assert!(BackoffConfig::default().is_valid());
        assert!(
            !BackoffConfig {
                first_ms: 10,
                max_ms: 5,
                factor: 2.0
            }
            .is_valid()
        );
        assert!(
            !BackoffConfig {
                first_ms: 10,
                max_ms: 50,
                factor: 0.5
            }
            .is_valid()
        );
    }
}
