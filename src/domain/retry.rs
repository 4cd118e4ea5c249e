//! Bounded retry with a fixed delay between attempts.

use std::time::Duration;

use tracing::{error, warn};

use crate::domain::error::AgentError;
use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn fetch() -> Self {
        Self::new(3, Duration::from_secs(5))
    }

    pub fn store() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    pub fn notify() -> Self {
        Self::new(3, Duration::from_secs(5))
    }

    /// Run `attempt` until it succeeds or the attempts are used up, sleeping
    /// `delay` between failures. Returns the last error.
    pub fn run<T, F>(
        &self,
        clock: &dyn Clock,
        operation: &str,
        mut attempt: F,
    ) -> Result<T, AgentError>
    where
        F: FnMut() -> Result<T, AgentError>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt() {
                Ok(value) => return Ok(value),
                Err(err) if tries < self.max_attempts => {
                    warn!(
                        operation,
                        attempt = tries,
                        max_attempts = self.max_attempts,
                        %err,
                        "attempt failed, retrying"
                    );
                    clock.sleep(self.delay);
                }
                Err(err) => {
                    error!(
                        operation,
                        attempts = tries,
                        %err,
                        "giving up after final attempt"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Like [`run`](Self::run), but degrades to `fallback()` once attempts run out.
    pub fn run_or_else<T, F, G>(
        &self,
        clock: &dyn Clock,
        operation: &str,
        attempt: F,
        fallback: G,
    ) -> T
    where
        F: FnMut() -> Result<T, AgentError>,
        G: FnOnce() -> T,
    {
        self.run(clock, operation, attempt).unwrap_or_else(|_| fallback())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::cell::Cell;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Clock for CountingClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn failure() -> AgentError {
        AgentError::MarketData {
            reason: "timeout".into(),
        }
    }

    #[test]
    fn succeeds_first_time_without_sleeping() {
        let clock = CountingClock::default();
        let result = RetryPolicy::store().run(&clock, "store", || Ok::<_, AgentError>(7));
        assert_eq!(result.unwrap(), 7);
        assert!(clock.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn retries_then_succeeds() {
        let clock = CountingClock::default();
        let calls = Cell::new(0);
        let result = RetryPolicy::store().run(&clock, "store", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(failure()) } else { Ok("done") }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let clock = CountingClock::default();
        let calls = Cell::new(0);
        let result: Result<(), _> = RetryPolicy::fetch().run(&clock, "fetch", || {
            calls.set(calls.get() + 1);
            Err(failure())
        });
        assert!(matches!(result, Err(AgentError::MarketData { .. })));
        assert_eq!(calls.get(), 3);
        assert_eq!(clock.sleeps.lock().unwrap().len(), 2);
    }

    #[test]
    fn fallback_after_exhaustion() {
        let clock = CountingClock::default();
        let value = RetryPolicy::new(2, Duration::ZERO).run_or_else(
            &clock,
            "fetch",
            || Err(failure()),
            || f64::NAN,
        );
        assert!(value.is_nan());
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
