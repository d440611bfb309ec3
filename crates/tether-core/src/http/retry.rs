//! Bounded retry with optional exponential backoff
//!
//! Attempts are strictly sequential. With `retries = n` at most `n + 1`
//! attempts run and the last outcome is returned.

use std::fmt;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use serde::{Deserialize, Serialize};

/// Delay schedule between attempts
///
/// The default retries immediately. Setting `base_delay_ms` switches to
/// exponential backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry (0 = retry immediately)
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Randomize delays by +/-50%
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 0,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting
    pub fn immediate() -> Self {
        Self::default()
    }

    /// Exponential backoff starting at `base_delay_ms`, with jitter
    pub fn exponential(base_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            jitter: true,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn is_immediate(&self) -> bool {
        self.base_delay_ms == 0
    }

    /// Validate the policy values
    pub fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!("Retry multiplier must be >= 1.0, got {}", self.multiplier));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("Retry base delay must be <= max delay".to_string());
        }
        Ok(())
    }

    /// Create an exponential backoff instance
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.base_delay_ms);
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            randomization_factor: if self.jitter { 0.5 } else { 0.0 },
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Decision on whether to run another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    NoRetry,
}

/// Errors that may end the retry loop early
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Tracks the retry budget of one request
#[derive(Debug)]
pub struct RetryHandler {
    retries: u32,
    used: u32,
    backoff: Option<ExponentialBackoff>,
}

impl RetryHandler {
    pub fn new(retries: u32, policy: &RetryPolicy) -> Self {
        Self {
            retries,
            used: 0,
            backoff: (!policy.is_immediate()).then(|| policy.create_backoff()),
        }
    }

    /// Decide what to do after a failed attempt
    pub fn should_retry<E: Retryable>(&mut self, error: &E) -> RetryDecision {
        if self.used >= self.retries || !error.is_retryable() {
            return RetryDecision::NoRetry;
        }
        self.used += 1;

        let delay = match self.backoff.as_mut() {
            Some(backoff) => backoff.next_backoff().unwrap_or(backoff.max_interval),
            None => Duration::ZERO,
        };
        RetryDecision::Retry { delay }
    }

    /// Retries consumed so far
    pub fn retries_used(&self) -> u32 {
        self.used
    }
}

/// Run `request_fn` until it succeeds or the retry budget is spent
///
/// `request_fn` receives the zero-based attempt number.
pub async fn execute_with_retry<F, Fut, T, E>(
    mut request_fn: F,
    retries: u32,
    policy: &RetryPolicy,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let mut handler = RetryHandler::new(retries, policy);

    loop {
        let error = match request_fn(handler.retries_used()).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match handler.should_retry(&error) {
            RetryDecision::Retry { delay } => {
                log::warn!(
                    "Request failed (attempt {}), retrying after {:?}: {}",
                    handler.retries_used(),
                    delay,
                    error
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            RetryDecision::NoRetry => {
                log::error!(
                    "Request failed after {} attempts, not retrying: {}",
                    handler.retries_used() + 1,
                    error
                );
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    struct Failure(u32, bool);

    impl fmt::Display for Failure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "failure #{}", self.0)
        }
    }

    impl Retryable for Failure {
        fn is_retryable(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn test_default_policy_is_immediate() {
        let policy = RetryPolicy::default();
        assert!(policy.is_immediate());
        assert!(!policy.jitter);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_handler_budget() {
        let mut handler = RetryHandler::new(2, &RetryPolicy::immediate());
        let error = Failure(0, true);

        assert_eq!(
            handler.should_retry(&error),
            RetryDecision::Retry { delay: Duration::ZERO }
        );
        assert!(matches!(handler.should_retry(&error), RetryDecision::Retry { .. }));
        assert_eq!(handler.should_retry(&error), RetryDecision::NoRetry);
        assert_eq!(handler.retries_used(), 2);
    }

    #[test]
    fn test_non_retryable_stops() {
        let mut handler = RetryHandler::new(5, &RetryPolicy::immediate());
        assert_eq!(handler.should_retry(&Failure(0, false)), RetryDecision::NoRetry);
    }

    #[test]
    fn test_exponential_backoff_grows() {
        let policy = RetryPolicy::exponential(100).with_jitter(false);
        let mut handler = RetryHandler::new(3, &policy);
        let error = Failure(0, true);

        let delays: Vec<Duration> = (0..3)
            .filter_map(|_| match handler.should_retry(&error) {
                RetryDecision::Retry { delay } => Some(delay),
                RetryDecision::NoRetry => None,
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[test]
    fn test_backoff_capped_at_max() {
        let policy = RetryPolicy::exponential(100)
            .with_jitter(false)
            .with_max_delay(150);
        let mut handler = RetryHandler::new(3, &policy);
        let error = Failure(0, true);

        handler.should_retry(&error);
        assert_eq!(
            handler.should_retry(&error),
            RetryDecision::Retry { delay: Duration::from_millis(150) }
        );
    }

    #[test]
    fn test_invalid_policies() {
        assert!(RetryPolicy::default().with_multiplier(0.5).validate().is_err());
        assert!(RetryPolicy::exponential(5_000).with_max_delay(10).validate().is_err());
    }

    #[tokio::test]
    async fn test_returns_last_error_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = execute_with_retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Failure(attempt, true)) }
            },
            3,
            &RetryPolicy::immediate(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result, Err(Failure(3, true)));
    }

    #[tokio::test]
    async fn test_zero_retries_is_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Failure> = execute_with_retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Failure(attempt, true)) }
            },
            0,
            &RetryPolicy::immediate(),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Err(Failure(0, true)));
    }

    #[tokio::test]
    async fn test_stops_on_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, Failure> = execute_with_retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 1 {
                        Err(Failure(attempt, true))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            5,
            &RetryPolicy::immediate(),
        )
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
