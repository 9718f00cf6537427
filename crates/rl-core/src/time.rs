//! Wall-clock helpers
//!
//! Assertion timestamps and lock transitions are Unix milliseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch; 0 if the clock reads earlier than that
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Milliseconds since `since`, or 0 if `since` is in the future
pub fn elapsed_millis(since: u64) -> u64 {
    current_time_millis().saturating_sub(since)
}

/// Whether two timestamps are at most `window` apart, in either direction
pub fn within_window(a: u64, b: u64, window: Duration) -> bool {
    u128::from(a.abs_diff(b)) <= window.as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_since_future_is_zero() {
        assert_eq!(elapsed_millis(current_time_millis() + 60_000), 0);
    }

    #[test]
    fn test_within_window_is_symmetric_and_inclusive() {
        let window = Duration::from_secs(60);
        assert!(within_window(100_000, 160_000, window));
        assert!(within_window(160_000, 100_000, window));
        assert!(!within_window(100_000, 160_001, window));
        assert!(!within_window(160_001, 100_000, window));
    }
}
