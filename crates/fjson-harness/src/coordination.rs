//! The harness's own coordination primitives.
//!
//! Everything here is correctly synchronized — these are exempt from the
//! no-locking rule that governs the shared containers under test:
//! - [`Rendezvous`]: one-shot counted barrier with a timeout on every wait;
//! - [`StopSignal`]: single-writer-many-reader flag that transitions
//!   false→true exactly once;
//! - [`ErrorLog`]: append-only failure records, read only after workers have
//!   terminated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fjson_error::{FjsonError, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::scenario::WorkerRole;

/// One-shot barrier requiring a fixed quota of participants.
///
/// Once the quota arrives the barrier stays released; later waits return
/// immediately. A participant whose wait expires gets
/// [`FjsonError::BarrierTimeout`].
#[derive(Debug)]
pub struct Rendezvous {
    quota: usize,
    state: Mutex<RendezvousState>,
    cond: Condvar,
}

#[derive(Debug)]
struct RendezvousState {
    arrived: usize,
    released: bool,
}

impl Rendezvous {
    /// Panics when `quota` is zero.
    #[must_use]
    pub fn new(quota: usize) -> Self {
        assert!(quota > 0, "rendezvous quota must be > 0");
        Self {
            quota,
            state: Mutex::new(RendezvousState {
                arrived: 0,
                released: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Register and block until the quota arrives or `timeout` expires.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        state.arrived += 1;
        if state.arrived >= self.quota {
            state.released = true;
            self.cond.notify_all();
            return Ok(());
        }
        while !state.released {
            if self.cond.wait_until(&mut state, deadline).timed_out() && !state.released {
                return Err(FjsonError::BarrierTimeout {
                    waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    arrived: state.arrived,
                    quota: self.quota,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

/// Set-once stop flag observed at loop granularity by worker roles.
#[derive(Debug, Default)]
pub struct StopSignal {
    raised: AtomicBool,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set-if-not-set. Returns true for the single caller that performed
    /// the false→true transition.
    pub fn raise(&self) -> bool {
        self.raised
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// One captured worker failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedFailure {
    pub role: WorkerRole,
    pub detail: String,
}

/// Append-only ordered failure log.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<LoggedFailure>>,
}

impl ErrorLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, role: WorkerRole, detail: impl Into<String>) {
        self.entries.lock().push(LoggedFailure {
            role,
            detail: detail.into(),
        });
    }

    #[must_use]
    pub fn entries(&self) -> Vec<LoggedFailure> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use fjson_error::FjsonError;

    use super::{ErrorLog, Rendezvous, StopSignal};
    use crate::scenario::WorkerRole;

    #[test]
    fn rendezvous_releases_all_participants_at_quota() {
        let rendezvous = Arc::new(Rendezvous::new(3));
        let mut workers = Vec::new();
        for _ in 0..2 {
            let participant = Arc::clone(&rendezvous);
            workers.push(thread::spawn(move || {
                participant.wait(Duration::from_secs(5)).is_ok()
            }));
        }
        rendezvous
            .wait(Duration::from_secs(5))
            .expect("third participant completes the quota");
        for worker in workers {
            assert!(worker.join().unwrap());
        }
        assert!(rendezvous.is_released());
    }

    #[test]
    fn rendezvous_times_out_below_quota() {
        let rendezvous = Rendezvous::new(2);
        let error = rendezvous
            .wait(Duration::from_millis(50))
            .expect_err("quota of 2 cannot be met by one participant");
        match error {
            FjsonError::BarrierTimeout {
                arrived, quota, ..
            } => {
                assert_eq!(arrived, 1);
                assert_eq!(quota, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!rendezvous.is_released());
    }

    #[test]
    fn rendezvous_stays_released_for_late_arrivals() {
        let rendezvous = Rendezvous::new(1);
        rendezvous.wait(Duration::from_millis(10)).unwrap();
        // Already released: no blocking, no timeout.
        rendezvous.wait(Duration::from_millis(1)).unwrap();
    }

    #[test]
    fn stop_signal_transitions_exactly_once() {
        let stop = StopSignal::new();
        assert!(!stop.is_raised());
        assert!(stop.raise());
        assert!(!stop.raise());
        assert!(stop.is_raised());
    }

    #[test]
    fn stop_signal_single_winner_under_contention() {
        let stop = Arc::new(StopSignal::new());
        let wins = Arc::new(AtomicUsize::new(0));
        let mut racers = Vec::new();
        for _ in 0..8 {
            let stop = Arc::clone(&stop);
            let wins = Arc::clone(&wins);
            racers.push(thread::spawn(move || {
                if stop.raise() {
                    wins.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for racer in racers {
            racer.join().unwrap();
        }
        assert_eq!(wins.load(Ordering::Relaxed), 1);
        assert!(stop.is_raised());
    }

    #[test]
    fn error_log_preserves_append_order() {
        let log = ErrorLog::new();
        assert!(log.is_empty());
        log.record(WorkerRole::Mutator, "first");
        log.record(WorkerRole::EncoderDriver, "second");
        let entries = log.entries();
        assert_eq!(log.len(), 2);
        assert_eq!(entries[0].role, WorkerRole::Mutator);
        assert_eq!(entries[0].detail, "first");
        assert_eq!(entries[1].role, WorkerRole::EncoderDriver);
    }
}
