//! Bounded polling with exponential backoff.
//!
//! Used to confirm asynchronous actions (stopping an instance). The wait is
//! capped by an explicit attempt count so a stuck resource turns into a
//! failure instead of hanging the command.

use backon::{BackoffBuilder, ExponentialBuilder};
use cloudsweep_common::defaults::{
    DEFAULT_CONFIRM_INITIAL_DELAY_MS, DEFAULT_CONFIRM_MAX_ATTEMPTS, DEFAULT_CONFIRM_MAX_DELAY_MS,
};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration for polling with exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Delay after the first unsuccessful check
    pub initial_delay: Duration,
    /// Cap for exponential growth
    pub max_delay: Duration,
    /// Total number of checks before giving up
    pub max_attempts: u32,
    /// Randomize delays
    pub jitter: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_CONFIRM_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_CONFIRM_MAX_DELAY_MS),
            max_attempts: DEFAULT_CONFIRM_MAX_ATTEMPTS,
            jitter: true,
        }
    }
}

impl WaitConfig {
    /// No sleeping between checks
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_attempts,
            jitter: false,
        }
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts as usize);
        if self.jitter {
            builder = builder.with_jitter();
        }
        builder.build()
    }
}

/// Result of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check<T> {
    Ready(T),
    NotYet,
}

/// Why a wait ended without the resource becoming ready
#[derive(Debug, Error, PartialEq)]
pub enum WaitError<E> {
    #[error("gave up after {attempts} checks")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Check(E),
}

/// Poll `check` until it reports ready, fails, or the attempt budget runs out.
///
/// There is no sleep after the last attempt.
pub async fn wait_for_resource<T, E, F, Fut>(
    config: &WaitConfig,
    mut check: F,
    resource_name: &str,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Check<T>, E>>,
{
    let mut delays = config.delays();
    let mut attempts = 0u32;

    while attempts < config.max_attempts {
        attempts += 1;

        match check().await.map_err(WaitError::Check)? {
            Check::Ready(value) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(value);
            }
            Check::NotYet if attempts < config.max_attempts => {
                let delay = delays.next().unwrap_or(config.max_delay);
                debug!(
                    resource = %resource_name,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Resource not ready, retrying"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Check::NotYet => {}
        }
    }

    Err(WaitError::Exhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn ready_on_third_check() {
        let calls = Cell::new(0);
        let result: Result<&str, WaitError<String>> = wait_for_resource(
            &WaitConfig::immediate(5),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Ok(if n == 3 { Check::Ready("stopped") } else { Check::NotYet }) }
            },
            "i-1",
        )
        .await;

        assert_eq!(result, Ok("stopped"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn budget_caps_the_number_of_checks() {
        let calls = Cell::new(0);
        let result: Result<(), WaitError<String>> = wait_for_resource(
            &WaitConfig::immediate(4),
            || {
                calls.set(calls.get() + 1);
                async { Ok(Check::NotYet) }
            },
            "i-1",
        )
        .await;

        assert_eq!(result, Err(WaitError::Exhausted { attempts: 4 }));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn check_error_stops_waiting() {
        let calls = Cell::new(0);
        let result: Result<(), WaitError<&str>> = wait_for_resource(
            &WaitConfig::immediate(10),
            || {
                calls.set(calls.get() + 1);
                async { Err("terminated") }
            },
            "i-1",
        )
        .await;

        assert_eq!(result, Err(WaitError::Check("terminated")));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_checks() {
        let config = WaitConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            max_attempts: 3,
            jitter: false,
        };
        let start = tokio::time::Instant::now();
        let result: Result<(), WaitError<String>> =
            wait_for_resource(&config, || async { Ok(Check::NotYet) }, "i-1").await;

        assert!(matches!(result, Err(WaitError::Exhausted { attempts: 3 })));
        // 1s + 2s, nothing after the final check
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn default_budget() {
        let config = WaitConfig::default();
        assert_eq!(config.max_attempts, 40);
        assert!(config.initial_delay <= config.max_delay);
    }
}
