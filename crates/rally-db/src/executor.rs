use std::time::Duration;

use tracing::warn;

use crate::error::DbError;

/// Bounded retry with exponential backoff for statements that fail on a
/// transient condition (writer lock held elsewhere). Non-transient errors
/// are returned immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Delay before re-running attempt `attempt` (zero-based):
    /// `min(base * 2^attempt, cap)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Run `f` up to `policy.max_attempts` times, sleeping with exponential
/// backoff between transient failures. The last transient failure is
/// reported as `DbError::Exhausted` with the attempt count.
pub fn retry<T, F>(policy: &RetryPolicy, op: &str, mut f: F) -> Result<T, DbError>
where
    F: FnMut() -> Result<T, DbError>,
{
    let mut attempt = 0;
    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                let attempts = attempt + 1;
                if attempts >= policy.max_attempts {
                    warn!("{op}: attempt {attempts} failed ({err}), giving up");
                    return Err(err.into_exhausted(attempts));
                }
                let delay = policy.backoff(attempt);
                warn!("{op}: attempt {attempts} failed ({err}), retrying in {delay:?}");
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(2),
            max_delay: Duration::from_millis(10),
        }
    }

    fn busy() -> DbError {
        DbError::from(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(5),
            Some("database is locked".to_string()),
        ))
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(2000));
        assert_eq!(policy.backoff(30), Duration::from_millis(2000));
    }

    #[test]
    fn succeeds_on_third_attempt() {
        let mut calls = 0;
        let result = retry(&fast_policy(), "test", || {
            calls += 1;
            if calls < 3 { Err(busy()) } else { Ok(calls) }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn exhausts_after_max_attempts_with_growing_delays() {
        let mut calls = 0;
        let started = Instant::now();
        let result: Result<(), _> = retry(&fast_policy(), "test", || {
            calls += 1;
            Err(busy())
        });
        assert_eq!(calls, 3);
        // two sleeps: 2ms + 4ms
        assert!(started.elapsed() >= Duration::from_millis(6));
        match result {
            Err(DbError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = retry(&fast_policy(), "test", || {
            calls += 1;
            Err(DbError::from(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(2067),
                Some("UNIQUE constraint failed: users.wallet_address".to_string()),
            )))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(DbError::UniqueViolation { .. })));
    }
}
