//! Linear retry backoff.

use std::time::Duration;

/// Delay inserted before retry attempt `attempt` (1-indexed).
///
/// Grows linearly with the attempt number: the first retry waits one
/// step, the second two, and so on. The gateway is expected to answer
/// quickly, so the delay stays bounded and predictable rather than
/// exponential.
pub fn retry_delay(attempt: u32, step_ms: u64) -> Duration {
    Duration::from_millis(step_ms.saturating_mul(u64::from(attempt)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_growth() {
        assert_eq!(retry_delay(1, 100), Duration::from_millis(100));
        assert_eq!(retry_delay(2, 100), Duration::from_millis(200));
        assert_eq!(retry_delay(5, 100), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempt_is_no_delay() {
        assert_eq!(retry_delay(0, 100), Duration::from_millis(0));
    }
}
