//! Conflict-only retry for optimistic-concurrency writes.

use crate::types::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Bounded exponential retry schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub steps: u32,
    /// Delay before the second attempt.
    pub duration: Duration,
    /// Multiplier applied to the delay after each retry.
    pub factor: f64,
    /// Fraction of the delay added as random jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            steps: 5,
            duration: Duration::from_millis(10),
            factor: 1.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        delay + delay.mul_f64(extra)
    }
}

/// Run `op` until it succeeds, fails with a non-conflict error, or the
/// policy's steps are used up. On exhaustion the last conflict is returned.
pub async fn retry_on_conflict<F, Fut, T>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = policy.duration;
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < policy.steps => {
                tracing::debug!("status_conflict_retry: attempt={}, error={}", attempt, err);
                tokio::time::sleep(policy.jittered(delay)).await;
                delay = delay.mul_f64(policy.factor.max(1.0));
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_conflicts_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_on_conflict(&RetryPolicy::default(), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::conflict("stale"))
            } else {
                Ok("written")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "written");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicts_exhaust_steps() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_on_conflict(&RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::conflict("stale"))
        })
        .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_on_conflict(&RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::store("connection refused"))
        })
        .await;

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let d = policy.jittered(Duration::from_millis(10));
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(11));
        }
    }
}
