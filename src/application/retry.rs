// Retry executor - Bounded exponential backoff around fallible operations
use futures::future::BoxFuture;
use rand::Rng;
use rand::rngs::StdRng;
use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Upper bound of the jitter fraction added on top of a computed delay.
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryPolicyError {
    #[error("retry policy needs at least one attempt")]
    NoAttempts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryPolicy {
    /// Broker connection: 1s, 2s, 4s, 8s between five attempts.
    pub const CONNECT: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        jitter: true,
    };

    /// Single telemetry publish.
    pub const PUBLISH: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(10),
        jitter: true,
    };

    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::NoAttempts);
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Delay after failed attempt `attempt` (0-based), before jitter:
    /// `min(base * 2^attempt, max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Runs an operation until it succeeds or the policy's attempts run out.
///
/// Attempts are strictly sequential. The executor owns its jitter source so
/// tests can seed it. `execute` suspends cooperatively between attempts;
/// `execute_blocking` parks the calling thread. Both share the same delay
/// computation.
pub struct RetryExecutor {
    rng: StdRng,
}

impl RetryExecutor {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Realized delay after failed attempt `attempt`, including jitter.
    /// Always within `[backoff, backoff * 1.1)`.
    pub fn delay_for(&mut self, policy: &RetryPolicy, attempt: u32) -> Duration {
        let delay = policy.backoff(attempt);
        if policy.jitter {
            let fraction = self.rng.random_range(0.0..JITTER_FRACTION);
            delay + delay.mul_f64(fraction)
        } else {
            delay
        }
    }

    /// Run `op` against `target`, yielding to the runtime between attempts.
    ///
    /// On exhaustion the last error is returned as-is; no delay follows the
    /// final attempt.
    pub async fn execute<C, T, E, F>(
        &mut self,
        operation: &str,
        policy: &RetryPolicy,
        target: &mut C,
        mut op: F,
    ) -> Result<T, E>
    where
        C: ?Sized,
        E: Display,
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(target).await {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(operation, policy, attempt, &err) {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(err),
                },
            }
            attempt += 1;
        }
    }

    /// Blocking twin of [`RetryExecutor::execute`].
    pub fn execute_blocking<T, E, F>(
        &mut self,
        operation: &str,
        policy: &RetryPolicy,
        mut op: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => match self.next_delay(operation, policy, attempt, &err) {
                    Some(delay) => std::thread::sleep(delay),
                    None => return Err(err),
                },
            }
            attempt += 1;
        }
    }

    fn next_delay(
        &mut self,
        operation: &str,
        policy: &RetryPolicy,
        attempt: u32,
        err: &dyn Display,
    ) -> Option<Duration> {
        if attempt + 1 >= policy.max_attempts {
            tracing::error!(
                operation,
                attempts = policy.max_attempts,
                error = %err,
                "retry_exhausted"
            );
            return None;
        }

        let delay = self.delay_for(policy, attempt);
        tracing::warn!(
            operation,
            attempt = attempt + 1,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retry_attempt"
        );
        Some(delay)
    }
}
