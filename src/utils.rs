use std::time::Duration;

use tracing::warn;

use crate::core::{PersistError, Result};

/// Exponential-backoff policy for [`retry`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Re-attempts after the initial call.
    pub retries: usize,
    /// Delay before the first re-attempt.
    pub delay: Duration,
    /// Multiplier applied to the delay after each re-attempt.
    pub backoff: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 60,
            delay: Duration::from_secs(1),
            backoff: 1.05,
        }
    }
}

/// Call `operation`, retrying failures that `recoverable` accepts.
///
/// The persistence layer itself never retries; callers wrap transient
/// operations with this instead, keeping failure semantics exact. A
/// failure `recoverable` rejects propagates immediately. When every
/// attempt fails, the first failure is returned — the later ones are
/// symptoms of the same outage. `sleep` is injectable so tests can
/// observe the wait sequence without waiting.
pub fn retry<T, F, R, S>(
    policy: RetryPolicy,
    recoverable: R,
    mut sleep: S,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Result<T>,
    R: Fn(&PersistError) -> bool,
    S: FnMut(Duration),
{
    let first = match operation() {
        Ok(value) => return Ok(value),
        Err(err) if recoverable(&err) => err,
        Err(err) => return Err(err),
    };
    warn!(error = %first, "operation failed, retrying");

    let mut wait = policy.delay;
    for _ in 0..policy.retries {
        warn!(wait_seconds = wait.as_secs_f64(), "retrying");
        sleep(wait);
        wait = wait.mul_f64(policy.backoff);
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if recoverable(&err) => {
                warn!(error = %err, "retry failed");
            }
            Err(err) => return Err(err),
        }
    }
    Err(first)
}
