use std::time::Duration;

// ============================================================================
// Bounded Exponential Backoff
// ============================================================================
//
// Tracks consecutive failed cycles. The first failure costs nothing (the next
// tick retries); from the second consecutive failure on, the pause doubles
// from the base interval up to `max_delay`. One success resets the streak.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Delay after the second consecutive failure.
    pub base: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, failures: 0 }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        if self.failures > 0 {
            tracing::info!(failures = self.failures, "Recovered after failed cycles");
        }
        self.failures = 0;
    }

    /// Registers one more failed cycle and returns how long to hold off
    /// before the next attempt.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current_delay()
    }

    /// base × multiplier^(failures − 2), zero for a single failure.
    pub fn current_delay(&self) -> Duration {
        if self.failures <= 1 {
            return Duration::ZERO;
        }

        let exponent = (self.failures - 2).min(63) as i32;
        let millis = (self.config.base.as_millis() as f64) * self.config.multiplier.powi(exponent);
        let capped = millis.min(self.config.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}
