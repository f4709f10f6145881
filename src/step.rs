//! Step trait and the retry/poll combinator.
//!
//! A `Step` is one named unit of a test run. It receives the previous step's
//! payload and the run [`Session`], and returns the payload for the next step.
//! Steps are composed into runs using HList-based sequences.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::outcome::{Failure, Outcome};
use crate::session::Session;

/// A single named step of a test run.
///
/// Implementations must not panic on expected faults: anything that can go
/// wrong is reported as `Err(Failure)`, which stops the run.
#[async_trait::async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in the run report and logs.
    fn name(&self) -> String;

    /// Run the step on the previous step's payload.
    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value>;
}

#[async_trait::async_trait]
impl<S> Step for Box<S>
where
    S: Step + ?Sized,
{
    fn name(&self) -> String {
        (**self).name()
    }

    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value> {
        (**self).execute(session, input).await
    }
}

/// Retry policy for [`Poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds.
    pub period_ms: u64,
}

impl RetryPolicy {
    /// Create a retry policy with the given attempt budget and period.
    pub const fn new(max_attempts: u32, period: Duration) -> Self {
        Self {
            max_attempts,
            period_ms: period.as_millis() as u64,
        }
    }

    /// Number of attempts that will actually be made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Check whether another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }

    /// Delay between attempts.
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// Wraps a step with bounded retry-with-delay semantics.
///
/// Every attempt receives a clone of the same input; side effects of a failed
/// attempt are not undone before the next one.
#[derive(Debug, Clone)]
pub struct Poll<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Step> Poll<S> {
    /// Wrap `inner` with the given policy.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Get the retry policy.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

/// Retry `step` every `period` until it succeeds, at most `max_retries` times.
pub fn poll<S: Step>(step: S, period: Duration, max_retries: u32) -> Poll<S> {
    Poll::new(step, RetryPolicy::new(max_retries, period))
}

#[async_trait::async_trait]
impl<S: Step> Step for Poll<S> {
    fn name(&self) -> String {
        self.inner.name()
    }

    async fn execute(&self, session: &mut Session, input: Value) -> Outcome<Value> {
        let name = self.inner.name();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let reason = match self.inner.execute(session, input.clone()).await {
                Ok(value) => return Ok(value),
                Err(reason) => reason,
            };

            if !self.policy.should_retry(attempt) {
                return Err(Failure::Exhausted(format!(
                    "test '{name}' didn't succeed after {} retries (last error: {reason})",
                    self.policy.attempts()
                )));
            }

            tracing::warn!(
                step = %name,
                attempt,
                retries_left = self.policy.attempts() - attempt,
                period_ms = self.policy.period_ms,
                %reason,
                "poll.retry"
            );
            tokio::time::sleep(self.policy.period()).await;
        }
    }
}
