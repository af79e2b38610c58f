use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Outcome of one transport attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Success(T),
    /// Transient fault; another attempt may succeed.
    Retryable(E),
    /// Permanent fault; stop immediately.
    Terminal(E),
}

#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, last: E },
    Terminal(E),
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_backoff: Duration) -> Self {
        Self {
            retries,
            base_backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << exp)
    }
}

/// Drive `call` through `Attempt{n} -> Success | Retryable -> Attempt{n+1} | Terminal`.
///
/// `call` receives the 1-based attempt number.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, E>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;
    loop {
        match call(attempt).await {
            Attempt::Success(value) => return Ok(value),
            Attempt::Terminal(err) => return Err(RetryError::Terminal(err)),
            Attempt::Retryable(err) => {
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let delay = policy.backoff(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tokio::time::Instant;

    use super::*;

    #[test]
    fn test_backoff_is_exponential() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let calls = Cell::new(0u32);
        let start = Instant::now();

        let result: Result<&str, RetryError<String>> = with_retry(&policy, |n| {
            calls.set(n);
            async move {
                if n < 3 {
                    Attempt::Retryable(format!("timeout #{}", n))
                } else {
                    Attempt::Success("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 3);
        // 1s + 2s of backoff
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reports_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let result: Result<(), RetryError<String>> =
            with_retry(&policy, |_| async { Attempt::Retryable("refused".to_string()) }).await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "refused");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_terminal_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let calls = Cell::new(0u32);
        let result: Result<(), RetryError<String>> = with_retry(&policy, |n| {
            calls.set(n);
            async { Attempt::Terminal("400".to_string()) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Terminal(ref e)) if e == "400"));
        assert_eq!(calls.get(), 1);
    }
}
