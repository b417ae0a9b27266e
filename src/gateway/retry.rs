use std::future::Future;
use std::time::Duration;

use crate::core::DteError;

/// How a failed gateway call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network-level trouble, worth retrying with backoff.
    Transient,
    /// The response arrived but could not be decoded. Retried once, in
    /// case a flaky intermediary mangled the body, then surfaced.
    ProtocolOnce,
    /// Rejections and everything else; retrying would not change the
    /// answer.
    Terminal,
}

pub fn classify(error: &DteError) -> ErrorClass {
    match error {
        DteError::GatewayTransient(_) => ErrorClass::Transient,
        DteError::GatewayProtocol(_) => ErrorClass::ProtocolOnce,
        _ => ErrorClass::Terminal,
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` failures (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }

    /// Runs `op` until it succeeds, fails terminally, or the attempt
    /// budget runs out.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, DteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DteError>>,
    {
        let mut protocol_retries = 0u32;
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let retry = match classify(&error) {
                        ErrorClass::Terminal => false,
                        ErrorClass::Transient => attempt < self.max_attempts,
                        ErrorClass::ProtocolOnce => {
                            protocol_retries += 1;
                            protocol_retries <= 1 && attempt < self.max_attempts
                        }
                    };
                    if !retry {
                        return Err(error);
                    }
                    let delay = self.delay_for(attempt);
                    tracing::debug!(attempt, ?delay, %error, "retrying gateway call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2,
        }
    }

    #[test]
    fn classification() {
        assert_eq!(
            classify(&DteError::GatewayTransient("timeout".into())),
            ErrorClass::Transient
        );
        assert_eq!(
            classify(&DteError::GatewayProtocol("garbage".into())),
            ErrorClass::ProtocolOnce
        );
        assert_eq!(
            classify(&DteError::GatewayRejected("no".into())),
            ErrorClass::Terminal
        );
    }

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_to_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DteError::GatewayTransient("flaky".into()))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DteError::GatewayRejected("bad rut".into())) }
            })
            .await;
        assert!(matches!(result, Err(DteError::GatewayRejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn protocol_errors_retry_exactly_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DteError::GatewayProtocol("mangled".into())) }
            })
            .await;
        assert!(matches!(result, Err(DteError::GatewayProtocol(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn attempt_budget_is_respected() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast_policy()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DteError::GatewayTransient("down".into())) }
            })
            .await;
        assert!(matches!(result, Err(DteError::GatewayTransient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
