//! Retry policy for store operations.
//!
//! The decision itself is pure: given the number of the attempt that just
//! failed and the classification of its error, either retry after an
//! exponential delay or give up. [`retry`] drives an async operation with
//! a policy and performs the sleeps.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::error::{Classify, ErrorKind};

/// Outcome of consulting a [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Exponential backoff (multiplier 2, no jitter) over transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    retry_unavailable: bool,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            retry_unavailable: false,
        }
    }

    /// Also retry [`ErrorKind::Unavailable`] failures.
    pub fn retrying_unavailable(mut self) -> Self {
        self.retry_unavailable = true;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        match kind {
            ErrorKind::Transient => true,
            ErrorKind::Unavailable => self.retry_unavailable,
            ErrorKind::Validation | ErrorKind::Fatal => false,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Decide what to do after attempt number `attempt` (1-indexed) failed
    /// with an error of kind `kind`.
    ///
    /// Gives up once the retries already spent (`attempt - 1`) reach
    /// `max_retries`, so an operation is tried at most `max_retries + 1` times.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if !self.is_retryable(kind) {
            return RetryDecision::GiveUp;
        }
        let spent = attempt.saturating_sub(1);
        if spent >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_for(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Why [`retry`] stopped without a result.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Retryable failures exhausted the policy.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
    /// A non-retryable failure; returned immediately.
    #[error("{0}")]
    Fatal(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Fatal(e) => e,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            Self::Exhausted { last, .. } => last,
            Self::Fatal(e) => e,
        }
    }
}

/// Run `op` until it succeeds or `policy` gives up.
///
/// `label` names the operation in log output.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let kind = err.kind();
        match policy.decide(attempt, kind) {
            RetryDecision::Retry(delay) => {
                tracing::debug!(
                    op = label,
                    attempt,
                    kind = %kind,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp if policy.is_retryable(kind) => {
                tracing::warn!(op = label, attempts = attempt, error = %err, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            RetryDecision::GiveUp => return Err(RetryError::Fatal(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FakeError(ErrorKind);

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake {}", self.0)
        }
    }

    impl Classify for FakeError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(
            policy.decide(1, ErrorKind::Transient),
            RetryDecision::Retry(Duration::from_secs_f64(1.0))
        );
        assert_eq!(
            policy.decide(2, ErrorKind::Transient),
            RetryDecision::Retry(Duration::from_secs_f64(2.0))
        );
        assert_eq!(
            policy.decide(3, ErrorKind::Transient),
            RetryDecision::Retry(Duration::from_secs_f64(4.0))
        );
        assert_eq!(policy.decide(4, ErrorKind::Transient), RetryDecision::GiveUp);
    }

    #[test]
    fn test_non_transient_gives_up_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(1, ErrorKind::Validation), RetryDecision::GiveUp);
        assert_eq!(policy.decide(1, ErrorKind::Fatal), RetryDecision::GiveUp);
        assert_eq!(policy.decide(1, ErrorKind::Unavailable), RetryDecision::GiveUp);
    }

    #[test]
    fn test_unavailable_retryable_when_enabled() {
        let policy = RetryPolicy::default().retrying_unavailable();
        assert!(matches!(
            policy.decide(1, ErrorKind::Unavailable),
            RetryDecision::Retry(_)
        ));
    }

    #[test]
    fn test_zero_retries_gives_up_on_first_failure() {
        let policy = RetryPolicy::new(0, Duration::from_millis(500));
        assert_eq!(policy.decide(1, ErrorKind::Transient), RetryDecision::GiveUp);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = &AtomicU32::new(0);

        let result: Result<u32, RetryError<FakeError>> = retry(&policy, "test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(FakeError(ErrorKind::Transient))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_after_max_retries() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = &AtomicU32::new(0);

        let result: Result<(), RetryError<FakeError>> = retry(&policy, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FakeError(ErrorKind::Transient))
        })
        .await;

        match result {
            Err(RetryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 4),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_fatal() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = &AtomicU32::new(0);

        let result: Result<(), RetryError<FakeError>> = retry(&policy, "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FakeError(ErrorKind::Fatal))
        })
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retry_error_messages() {
        let exhausted = RetryError::Exhausted {
            attempts: 4,
            last: FakeError(ErrorKind::Transient),
        };
        let fatal = RetryError::Fatal(FakeError(ErrorKind::Fatal));

        assert_eq!(
            exhausted.to_string(),
            format!("gave up after 4 attempts: {}", FakeError(ErrorKind::Transient))
        );
        assert_eq!(fatal.to_string(), FakeError(ErrorKind::Fatal).to_string());

        let boxed: Box<dyn std::error::Error> = Box::new(fatal);
        assert!(boxed.source().is_none());
    }
}
