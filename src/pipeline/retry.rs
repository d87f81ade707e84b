use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Equal jitter: sleep somewhere in `[delay / 2, delay]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            factor: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            factor,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0 = the wait after the first failure).
    pub fn backoff(&self, retry: u32) -> Duration {
        let millis = self.base_delay.as_millis() as f64 * self.factor.powi(retry as i32);
        let capped = millis.min(self.max_delay.as_millis() as f64).max(0.0);
        let delay = Duration::from_millis(capped as u64);

        if self.jitter && !delay.is_zero() {
            let half = delay / 2;
            let spread = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
            half + Duration::from_millis(spread)
        } else {
            delay
        }
    }
}

/// Run `op` until it succeeds, fails with an error `is_retryable` rejects,
/// or the policy runs out of attempts. Returns the last result together
/// with the number of attempts made.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    operation: &str,
    is_retryable: R,
    mut op: F,
) -> (Result<T, E>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.backoff(attempt - 1);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    ?delay,
                    error = %e,
                    "Retryable failure, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(4),
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(200));
        assert_eq!(policy.backoff(1), Duration::from_millis(400));
        assert_eq!(policy.backoff(2), Duration::from_millis(800));
        assert_eq!(policy.backoff(10), Duration::from_secs(5));
    }

    #[test]
    fn test_jittered_backoff_stays_in_range() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.backoff(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_new_never_allows_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, 2.0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = retry_with_backoff(&fast(3), "test", |_: &String| true, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("flaky".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_stops_when_exhausted() {
        let (result, attempts) =
            retry_with_backoff(&fast(3), "test", |_: &String| true, |_| async {
                Err::<(), _>("down".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_permanent_errors() {
        let (result, attempts) =
            retry_with_backoff(&fast(5), "test", |_: &String| false, |_| async {
                Err::<(), _>("bad input".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}
