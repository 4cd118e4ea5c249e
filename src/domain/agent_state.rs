//! Run state shared between the trading loop and command intake.
//!
//! Run state, primary position and the stop deadline live behind one mutex
//! and change only through the transition methods below. Transitions that
//! close a long position hand the closed position back so the caller can
//! record the liquidation.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::position::PositionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused { resume_at: DateTime<Utc> },
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentState {
    pub run: RunState,
    pub position: PositionState,
    pub stop_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PauseOutcome {
    Paused {
        resume_at: DateTime<Utc>,
        closed: Option<PositionState>,
    },
    RefusedWhileStopped,
}

impl AgentState {
    pub fn new(stop_at: Option<DateTime<Utc>>) -> Self {
        Self {
            run: RunState::Running,
            position: PositionState::Flat,
            stop_at,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run == RunState::Running
    }

    fn take_long(&mut self) -> Option<PositionState> {
        let previous = std::mem::take(&mut self.position);
        previous.is_long().then_some(previous)
    }

    /// Running or paused past the stop deadline becomes stopped. A pause that
    /// outlives the deadline never resumes.
    pub fn check_deadline(&mut self, now: DateTime<Utc>) -> Option<Option<PositionState>> {
        match self.stop_at {
            Some(deadline) if self.run != RunState::Stopped && now >= deadline => {
                self.run = RunState::Stopped;
                Some(self.take_long())
            }
            _ => None,
        }
    }

    /// A due pause becomes running again with a fresh flat position.
    pub fn resume_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.run {
            RunState::Paused { resume_at } if now >= resume_at => {
                self.run = RunState::Running;
                self.position = PositionState::Flat;
                true
            }
            _ => false,
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>, duration: Duration) -> PauseOutcome {
        if self.run == RunState::Stopped {
            return PauseOutcome::RefusedWhileStopped;
        }
        let resume_at = offset(now, duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.run = RunState::Paused { resume_at };
        PauseOutcome::Paused {
            resume_at,
            closed: self.take_long(),
        }
    }

    pub fn stop(&mut self) -> Option<PositionState> {
        self.run = RunState::Stopped;
        self.take_long()
    }

    /// Paused or stopped becomes running with a fresh flat position. The
    /// deadline is pushed out by `stop_after` from `now` when one is set,
    /// otherwise a deadline already passed is dropped. Returns false when
    /// already running.
    pub fn start(&mut self, now: DateTime<Utc>, stop_after: Option<Duration>) -> bool {
        if self.is_running() {
            return false;
        }
        self.run = RunState::Running;
        self.position = PositionState::Flat;
        self.stop_at = match stop_after {
            Some(after) => offset(now, after),
            None => self.stop_at.filter(|deadline| *deadline > now),
        };
        true
    }

    pub fn status_text(&self, now: DateTime<Utc>) -> String {
        let run = match self.run {
            RunState::Running => "active".to_string(),
            RunState::Paused { resume_at } => {
                let remaining = (resume_at - now).num_seconds().max(0);
                format!("paused for {remaining} seconds")
            }
            RunState::Stopped => "stopped".to_string(),
        };
        match self.stop_at {
            Some(deadline) => {
                format!("{run} (stop at {})", deadline.format("%Y-%m-%d %H:%M:%S"))
            }
            None => run,
        }
    }
}

fn offset(at: DateTime<Utc>, by: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
}

/// Cloneable handle to the one [`AgentState`].
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<AgentState>>,
}

impl SharedState {
    pub fn new(state: AgentState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AgentState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> AgentState {
        *self.lock()
    }

    /// Apply `f` under the lock.
    pub fn transition<R>(&self, f: impl FnOnce(&mut AgentState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Commit a position change decided from an earlier snapshot. Fails if
    /// the agent stopped running or the position moved in the meantime.
    pub fn compare_and_set_position(
        &self,
        expected: PositionState,
        next: PositionState,
    ) -> bool {
        let mut state = self.lock();
        if state.is_running() && state.position == expected {
            state.position = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: u32) -> DateTime<Utc> {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        base + chrono::Duration::seconds(secs.into())
    }

    fn long_state() -> AgentState {
        AgentState {
            run: RunState::Running,
            position: PositionState::Long { entry_price: 100.0 },
            stop_at: None,
        }
    }

    #[test]
    fn starts_running_and_flat() {
        let state = AgentState::new(None);
        assert!(state.is_running());
        assert_eq!(state.position, PositionState::Flat);
    }

    #[test]
    fn deadline_stops_and_hands_back_long() {
        let mut state = long_state();
        state.stop_at = Some(t(60));
        assert_eq!(state.check_deadline(t(59)), None);
        assert_eq!(
            state.check_deadline(t(60)),
            Some(Some(PositionState::Long { entry_price: 100.0 }))
        );
        assert_eq!(state.run, RunState::Stopped);
        assert_eq!(state.position, PositionState::Flat);
        // already stopped: no second transition
        assert_eq!(state.check_deadline(t(120)), None);
    }

    #[test]
    fn deadline_while_flat_closes_nothing() {
        let mut state = AgentState::new(Some(t(0)));
        assert_eq!(state.check_deadline(t(1)), Some(None));
    }

    #[test]
    fn deadline_during_pause_stops_instead_of_resuming() {
        let mut state = long_state();
        state.stop_at = Some(t(120));
        state.pause(t(0), Duration::from_secs(180));
        assert_eq!(state.check_deadline(t(180)), Some(None));
        assert_eq!(state.run, RunState::Stopped);
        assert!(!state.resume_if_due(t(180)));
    }

    #[test]
    fn pause_liquidates_and_resumes_flat() {
        let mut state = long_state();
        let outcome = state.pause(t(0), Duration::from_secs(180));
        assert_eq!(
            outcome,
            PauseOutcome::Paused {
                resume_at: t(180),
                closed: Some(PositionState::Long { entry_price: 100.0 }),
            }
        );
        assert!(!state.resume_if_due(t(179)));
        assert!(state.resume_if_due(t(180)));
        assert!(state.is_running());
        assert_eq!(state.position, PositionState::Flat);
    }

    #[test]
    fn pause_refused_while_stopped() {
        let mut state = AgentState::new(None);
        state.stop();
        assert_eq!(
            state.pause(t(0), Duration::from_secs(60)),
            PauseOutcome::RefusedWhileStopped
        );
        assert_eq!(state.run, RunState::Stopped);
    }

    #[test]
    fn start_restarts_and_recomputes_deadline() {
        let mut state = long_state();
        assert_eq!(
            state.stop(),
            Some(PositionState::Long { entry_price: 100.0 })
        );
        assert!(state.start(t(30), Some(Duration::from_secs(600))));
        assert!(state.is_running());
        assert_eq!(state.stop_at, Some(t(630)));
        assert!(!state.start(t(31), None));
    }

    #[test]
    fn start_resumes_from_pause_early() {
        let mut state = AgentState::new(None);
        state.pause(t(0), Duration::from_secs(600));
        assert!(state.start(t(10), None));
        assert_eq!(state.run, RunState::Running);
        assert_eq!(state.stop_at, None);
    }

    #[test]
    fn start_after_deadline_clears_it() {
        let mut state = AgentState::new(Some(t(60)));
        assert_eq!(state.check_deadline(t(60)), Some(None));
        assert!(state.start(t(90), None));
        assert_eq!(state.stop_at, None);
        assert_eq!(state.check_deadline(t(120)), None);
    }

    #[test]
    fn status_texts() {
        let mut state = AgentState::new(None);
        assert_eq!(state.status_text(t(0)), "active");
        state.pause(t(0), Duration::from_secs(120));
        assert_eq!(state.status_text(t(20)), "paused for 100 seconds");
        state.stop();
        state.stop_at = Some(t(0));
        assert_eq!(state.status_text(t(20)), "stopped (stop at 2024-05-01 10:00:00)");
    }

    #[test]
    fn compare_and_set_rejects_stale_position() {
        let shared = SharedState::new(AgentState::new(None));
        let long = PositionState::Long { entry_price: 5.0 };
        assert!(shared.compare_and_set_position(PositionState::Flat, long));
        assert!(!shared.compare_and_set_position(PositionState::Flat, long));
        assert_eq!(shared.snapshot().position, long);
    }

    #[test]
    fn compare_and_set_rejects_after_pause() {
        let shared = SharedState::new(AgentState::new(None));
        let other = shared.clone();
        std::thread::spawn(move || {
            other.transition(|s| s.pause(t(0), Duration::from_secs(60)));
        })
        .join()
        .unwrap();
        assert!(!shared.compare_and_set_position(
            PositionState::Flat,
            PositionState::Long { entry_price: 1.0 }
        ));
    }
}
