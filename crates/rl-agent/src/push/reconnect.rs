//! Reconnect scheduling for the device channel
//!
//! Delays follow `initial * multiplier^n` capped at `max`, with optional
//! jitter. With the defaults that is 2, 4, 8, 16, 32, 60, 60, ... seconds.
//! The delay returns to `initial` as soon as a session authenticates.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use rl_core::config::BackoffConfig;

/// Exponential backoff with jitter for reconnection attempts
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Delay returned by the next call
    current: Duration,
    /// First delay, restored by `reset`
    initial: Duration,
    /// Maximum delay
    max: Duration,
    /// Multiplier
    multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    jitter: f64,
}

impl ExponentialBackoff {
    /// Create a new backoff from configuration
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial, config.max, config.multiplier, config.jitter)
    }

    /// Create a new backoff with custom parameters.
    ///
    /// A multiplier below 1.0 (or NaN) is treated as 1.0 and a non-finite
    /// jitter as 0.0, so delays never shrink and never panic.
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            multiplier: multiplier.max(1.0),
            jitter: if jitter.is_finite() {
                jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Get the next delay and advance the backoff
    pub fn next_delay(&mut self) -> Duration {
        let delay = std::cmp::min(self.current, self.max);

        let next = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max);
        self.current = std::cmp::min(next, self.max);

        if self.jitter == 0.0 {
            return delay;
        }
        let jitter_amount = delay.as_secs_f64() * self.jitter * rand::random::<f64>();
        delay + Duration::from_secs_f64(jitter_amount)
    }

    /// Reset the backoff to its initial delay
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Decides when the next connection attempt happens.
///
/// Owns the cancellation token of the push loop; once cancelled, no further
/// attempt is scheduled.
pub struct ReconnectScheduler {
    backoff: ExponentialBackoff,
    cancel: CancellationToken,
    failures: u32,
}

impl ReconnectScheduler {
    pub fn new(backoff: ExponentialBackoff, cancel: CancellationToken) -> Self {
        Self {
            backoff,
            cancel,
            failures: 0,
        }
    }

    /// Create a scheduler from configuration
    pub fn from_config(config: &BackoffConfig, cancel: CancellationToken) -> Self {
        Self::new(ExponentialBackoff::from_config(config), cancel)
    }

    /// Token observed by the connection this scheduler drives
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop scheduling attempts
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A session authenticated: the next failure starts from the initial delay
    pub fn reset(&mut self) {
        if self.failures > 0 {
            tracing::debug!("Reconnect backoff reset after {} failure(s)", self.failures);
        }
        self.failures = 0;
        self.backoff.reset();
    }

    /// Consecutive failed attempts since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Sleep until the next attempt.
    ///
    /// Returns false if the scheduler was cancelled before or during the
    /// wait, in which case the caller must stop.
    pub async fn wait(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let delay = self.backoff.next_delay();
        self.failures += 1;
        tracing::info!(
            "Reconnecting in {:?} (attempt {})",
            delay,
            self.failures + 1
        );

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn default_backoff() -> ExponentialBackoff {
        ExponentialBackoff::from_config(&BackoffConfig::default())
    }

    #[test]
    fn test_backoff_sequence() {
        let mut backoff = default_backoff();
        let delays: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = default_backoff();
        backoff.next_delay();
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(60), 2.0, 0.5);
        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_secs(10));
        assert!(delay <= Duration::from_secs(15));
    }

    #[test]
    fn test_degenerate_parameters_do_not_panic() {
        let initial = Duration::from_secs(1);
        let max = Duration::from_secs(8);

        let mut shrinking = ExponentialBackoff::new(initial, max, -3.0, 0.0);
        assert_eq!(shrinking.next_delay(), initial);
        assert_eq!(shrinking.next_delay(), initial);

        let mut nan = ExponentialBackoff::new(initial, max, f64::NAN, f64::NAN);
        assert_eq!(nan.next_delay(), initial);
        assert_eq!(nan.next_delay(), initial);

        let mut infinite = ExponentialBackoff::new(initial, max, f64::INFINITY, 0.0);
        assert_eq!(infinite.next_delay(), initial);
        assert_eq!(infinite.next_delay(), max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_for_backoff() {
        let mut scheduler = ReconnectScheduler::new(default_backoff(), CancellationToken::new());

        let start = Instant::now();
        assert!(scheduler.wait().await);
        assert_eq!(start.elapsed().as_secs(), 2);
        assert_eq!(scheduler.failures(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_times_and_reset_after_success() {
        let mut scheduler = ReconnectScheduler::new(default_backoff(), CancellationToken::new());
        let start = Instant::now();

        // Three failed attempts, then one that authenticates, then another drop
        let outcomes = [false, false, false, true, false];
        let mut attempt_times = Vec::new();

        for authenticated in outcomes {
            if !attempt_times.is_empty() {
                assert!(scheduler.wait().await);
            }
            attempt_times.push(start.elapsed().as_secs());
            if authenticated {
                scheduler.reset();
            }
        }
        assert!(scheduler.wait().await);
        attempt_times.push(start.elapsed().as_secs());

        // Gaps: 2, 4, 8, then 2 after the reset, then 4
        assert_eq!(attempt_times, vec![0, 2, 6, 14, 16, 20]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_scheduling() {
        let cancel = CancellationToken::new();
        let mut scheduler = ReconnectScheduler::new(default_backoff(), cancel.clone());

        cancel.cancel();
        assert!(!scheduler.wait().await);
        assert!(scheduler.is_cancelled());
        assert_eq!(scheduler.failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let cancel = CancellationToken::new();
        let mut scheduler = ReconnectScheduler::new(default_backoff(), cancel.clone());

        // Burn through to a long delay
        for _ in 0..5 {
            scheduler.backoff.next_delay();
        }

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        });

        let start = Instant::now();
        assert!(!scheduler.wait().await);
        assert_eq!(start.elapsed().as_secs(), 1);
        canceller.await.unwrap();
    }
}
