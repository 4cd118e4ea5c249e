//! Timeframes and wake-up alignment.
//!
//! Cycles wake on epoch-aligned timeframe boundaries (the top of the minute
//! for `1m`). The time a cycle spent working is taken off the next sleep.

use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeframe {
    label: String,
    seconds: u64,
}

impl Timeframe {
    pub fn new(label: &str, seconds: u64) -> Self {
        Self {
            label: label.to_string(),
            seconds: seconds.max(1),
        }
    }

    /// Resolve a label such as `5m`; unknown labels use `fallback_seconds`.
    pub fn parse(label: &str, fallback_seconds: u64) -> Self {
        let seconds = Self::known_seconds(label).unwrap_or(fallback_seconds);
        Self::new(label, seconds)
    }

    pub fn known_seconds(label: &str) -> Option<u64> {
        match label {
            "1m" => Some(60),
            "5m" => Some(300),
            "15m" => Some(900),
            "30m" => Some(1800),
            "1h" => Some(3600),
            "1d" => Some(86_400),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }

    /// `n` whole timeframes.
    pub fn multiple(&self, n: u32) -> Duration {
        Duration::from_secs(self.seconds.saturating_mul(u64::from(n)))
    }
}

/// Time from `now` until the next boundary strictly after it.
pub fn until_boundary(now: DateTime<Utc>, timeframe: &Timeframe) -> Duration {
    let step = i64::try_from(timeframe.seconds().saturating_mul(1000)).unwrap_or(i64::MAX);
    let millis = now.timestamp_millis();
    let next = millis - millis.rem_euclid(step) + step;
    Duration::from_millis(u64::try_from(next - millis).unwrap_or(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepPlan {
    pub sleep: Duration,
    /// Processing took longer than a whole timeframe.
    pub overrun: bool,
}

/// Sleep after a cycle that began at `started_at` and took `processing`, so
/// that the next wake lands on the boundary that followed `started_at`. A
/// cycle that already crossed that boundary proceeds without sleeping.
pub fn plan_sleep(
    started_at: DateTime<Utc>,
    processing: Duration,
    timeframe: &Timeframe,
) -> SleepPlan {
    let wait = until_boundary(started_at, timeframe);
    SleepPlan {
        sleep: wait.saturating_sub(processing),
        overrun: processing > timeframe.duration(),
    }
}
