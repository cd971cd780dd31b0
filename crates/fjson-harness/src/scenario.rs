//! The mutation-vs-encode concurrency scenario.
//!
//! Three parties register on a rendezvous barrier so neither worker can race
//! ahead of the other's startup:
//! - the *mutator* churns the shared containers in a tight loop — append
//!   always, remove on a stride, insert into a bounded key space (keeping
//!   the map's shard tables resizing), delete a lagging key on another
//!   stride — until the stop signal is observed;
//! - the *encoder-driver* encodes the sequence, the map, and a fresh
//!   composite wrapper referencing both, over and over for a fixed wall
//!   clock budget, discarding the output, then raises the stop signal;
//! - the *controller* joins the encoder-driver under a generous timeout
//!   (missing it is a hang, a failure distinct from any logged error),
//!   gives the mutator a short wind-down window, and judges the error log.
//!
//! Worker failures are panics caught at the worker boundary: they are
//! recorded in the error log and raise the stop signal immediately so the
//! other role does not spin on a doomed run. No synchronization is ever
//! added around the container accesses themselves.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use fjson_encode::{JsonValue, SharedMap, SharedSeq, encode};
use fjson_error::FjsonError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coordination::{ErrorLog, LoggedFailure, Rendezvous, StopSignal};
use crate::verdict::FailureKind;

/// Parties participating in a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    Mutator,
    EncoderDriver,
    Controller,
}

impl WorkerRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mutator => "mutator",
            Self::EncoderDriver => "encoder_driver",
            Self::Controller => "controller",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scenario lifecycle states, recorded for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioPhase {
    Init,
    BarrierWait,
    Running,
    Stopping,
    Joined,
}

impl ScenarioPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::BarrierWait => "barrier_wait",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Joined => "joined",
        }
    }
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deterministic fault injection: the named role panics at the given loop
/// iteration, simulating a worker exception (e.g. an out-of-range key
/// deletion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInjection {
    pub role: WorkerRole,
    pub at_iteration: u64,
}

/// Tunable scenario parameters.
///
/// The mutation strides are stress parameters, not semantics: the defaults
/// (remove every 3rd append, delete every 5th insert, 512-key space with a
/// 255-key lag) reproduce the reference workload's frequent-net-growth /
/// periodic-shrink mix.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Initial element count for both containers.
    pub seed_len: usize,
    /// Modulus bounding the map key space.
    pub key_space: u64,
    /// Remove the newest sequence element when `i % pop_stride == 0`.
    pub pop_stride: u64,
    /// Delete a lagging map key when `i % delete_stride == 0`.
    pub delete_stride: u64,
    /// Offset of the deletion target behind the insertion cursor.
    pub delete_lag: u64,
    /// Wall-clock budget of the encoder-driver loop.
    pub encode_budget: Duration,
    /// Timeout for every rendezvous wait.
    pub barrier_timeout: Duration,
    /// Controller's timeout on encoder-driver termination.
    pub join_timeout: Duration,
    /// Grace window for the mutator after the stop signal.
    pub mutator_wind_down: Duration,
    /// Optional injected worker fault.
    pub fault: Option<FaultInjection>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed_len: 256,
            key_space: 512,
            pop_stride: 3,
            delete_stride: 5,
            delete_lag: 255,
            encode_budget: Duration::from_millis(750),
            barrier_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(10),
            mutator_wind_down: Duration::from_millis(250),
            fault: None,
        }
    }
}

/// A scenario-level failure with its taxonomy class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFailure {
    pub kind: FailureKind,
    pub detail: String,
}

/// Structured result of one in-process scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub passed: bool,
    pub failure: Option<ScenarioFailure>,
    pub final_phase: ScenarioPhase,
    pub mutator_iterations: u64,
    pub encode_calls: u64,
    pub encode_elapsed_micros: u64,
    pub stop_raised: bool,
    pub logged_errors: Vec<LoggedFailure>,
    pub summary: String,
}

impl ScenarioReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Execute the mutation-vs-encode scenario in the current process.
///
/// Crash containment is the launcher's job: callers wanting a crash to be
/// observable as an exit code run this inside a launched child entry.
#[must_use]
pub fn run_mutation_encode_scenario(config: &ScenarioConfig) -> ScenarioReport {
    assert!(config.key_space > 0, "key_space must be > 0");
    assert!(config.pop_stride > 0, "pop_stride must be > 0");
    assert!(config.delete_stride > 0, "delete_stride must be > 0");

    let seq = Arc::new(SharedSeq::seeded(config.seed_len));
    let map = Arc::new(SharedMap::seeded(config.seed_len));
    let rendezvous = Arc::new(Rendezvous::new(3));
    let stop = Arc::new(StopSignal::new());
    let log = Arc::new(ErrorLog::new());
    let mutator_iterations = Arc::new(AtomicU64::new(0));
    let encode_calls = Arc::new(AtomicU64::new(0));
    let encode_elapsed_micros = Arc::new(AtomicU64::new(0));

    let mut phase = ScenarioPhase::Init;
    info!(
        phase = phase.as_str(),
        seed_len = config.seed_len,
        budget_ms = u64::try_from(config.encode_budget.as_millis()).unwrap_or(u64::MAX),
        "mutation-encode scenario starting"
    );

    let (mutator_done_tx, mutator_done) = mpsc::channel();
    let (encoder_done_tx, encoder_done) = mpsc::channel();

    let mutator_handle = {
        let worker_seq = Arc::clone(&seq);
        let worker_map = Arc::clone(&map);
        let worker_rendezvous = Arc::clone(&rendezvous);
        let worker_stop = Arc::clone(&stop);
        let worker_log = Arc::clone(&log);
        let worker_iterations = Arc::clone(&mutator_iterations);
        let worker_config = config.clone();
        match thread::Builder::new().name("mutator".to_owned()).spawn(move || {
            run_worker(
                WorkerRole::Mutator,
                &worker_stop,
                &worker_log,
                &mutator_done_tx,
                || {
                    mutator_loop(
                        &worker_seq,
                        &worker_map,
                        &worker_rendezvous,
                        &worker_stop,
                        &worker_iterations,
                        &worker_config,
                    )
                },
            );
        }) {
            Ok(handle) => handle,
            Err(error) => return spawn_failure_report(WorkerRole::Mutator, &error),
        }
    };

    let encoder_handle = {
        let worker_seq = Arc::clone(&seq);
        let worker_map = Arc::clone(&map);
        let worker_rendezvous = Arc::clone(&rendezvous);
        let worker_stop = Arc::clone(&stop);
        let worker_log = Arc::clone(&log);
        let worker_calls = Arc::clone(&encode_calls);
        let worker_elapsed = Arc::clone(&encode_elapsed_micros);
        let worker_config = config.clone();
        match thread::Builder::new()
            .name("encoder-driver".to_owned())
            .spawn(move || {
                run_worker(
                    WorkerRole::EncoderDriver,
                    &worker_stop,
                    &worker_log,
                    &encoder_done_tx,
                    || {
                        encoder_loop(
                            &worker_seq,
                            &worker_map,
                            &worker_rendezvous,
                            &worker_stop,
                            &worker_calls,
                            &worker_elapsed,
                            &worker_config,
                        )
                    },
                );
            }) {
            Ok(handle) => handle,
            Err(error) => {
                stop.raise();
                return spawn_failure_report(WorkerRole::EncoderDriver, &error);
            }
        }
    };

    phase = ScenarioPhase::BarrierWait;
    debug!(phase = phase.as_str(), "controller registering on rendezvous");
    let mut failure: Option<ScenarioFailure> = None;
    let mut encoder_joined = false;

    if let Err(error) = rendezvous.wait(config.barrier_timeout) {
        warn!(%error, "controller barrier wait failed");
        stop.raise();
        failure = Some(ScenarioFailure {
            kind: FailureKind::Hang,
            detail: error.to_string(),
        });
    } else {
        phase = ScenarioPhase::Running;
        debug!(phase = phase.as_str(), "rendezvous released; workers running");
        match encoder_done.recv_timeout(config.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                encoder_joined = true;
            }
            Err(RecvTimeoutError::Timeout) => {
                stop.raise();
                let hang = FjsonError::WorkerHang {
                    role: WorkerRole::EncoderDriver.as_str().to_owned(),
                    timeout_ms: u64::try_from(config.join_timeout.as_millis()).unwrap_or(u64::MAX),
                };
                warn!(%hang, "encoder-driver join timed out");
                failure = Some(ScenarioFailure {
                    kind: FailureKind::Hang,
                    detail: hang.to_string(),
                });
            }
        }
        phase = ScenarioPhase::Stopping;
        stop.raise();
        debug!(phase = phase.as_str(), "stop signal raised; draining workers");
    }

    if !encoder_joined {
        // Grace window: the barrier-failure and hang paths both leave the
        // encoder a moment to observe the stop signal and wind down.
        encoder_joined = matches!(
            encoder_done.recv_timeout(config.mutator_wind_down),
            Ok(()) | Err(RecvTimeoutError::Disconnected)
        );
    }

    let mutator_joined = match mutator_done.recv_timeout(config.mutator_wind_down) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => {
            let hang = FjsonError::WorkerHang {
                role: WorkerRole::Mutator.as_str().to_owned(),
                timeout_ms: u64::try_from(config.mutator_wind_down.as_millis())
                    .unwrap_or(u64::MAX),
            };
            warn!(%hang, "mutator wind-down timed out");
            if failure.is_none() {
                failure = Some(ScenarioFailure {
                    kind: FailureKind::Hang,
                    detail: hang.to_string(),
                });
            }
            false
        }
    };

    // A handle is only joined once its completion message arrived, so these
    // never block; a genuinely stuck worker stays detached.
    if encoder_joined {
        let _ = encoder_handle.join();
    }
    if mutator_joined {
        let _ = mutator_handle.join();
    }
    phase = ScenarioPhase::Joined;

    let logged_errors = log.entries();
    if failure.is_none() && !logged_errors.is_empty() {
        let detail = logged_errors
            .iter()
            .map(|entry| format!("[{}] {}", entry.role, entry.detail))
            .collect::<Vec<_>>()
            .join("\n");
        failure = Some(ScenarioFailure {
            kind: FailureKind::LoggedError,
            detail,
        });
    }

    let passed = failure.is_none();
    let mutator_iterations = mutator_iterations.load(Ordering::Relaxed);
    let encode_calls = encode_calls.load(Ordering::Relaxed);
    let summary = format!(
        "verdict={} phase={} mutator_iterations={} encode_calls={} logged_errors={}",
        if passed { "pass" } else { "FAIL" },
        phase,
        mutator_iterations,
        encode_calls,
        logged_errors.len(),
    );
    info!(%summary, "mutation-encode scenario complete");

    ScenarioReport {
        passed,
        failure,
        final_phase: phase,
        mutator_iterations,
        encode_calls,
        encode_elapsed_micros: encode_elapsed_micros.load(Ordering::Relaxed),
        stop_raised: stop.is_raised(),
        logged_errors,
        summary,
    }
}

fn mutator_loop(
    seq: &SharedSeq,
    map: &SharedMap,
    rendezvous: &Rendezvous,
    stop: &StopSignal,
    iterations: &AtomicU64,
    config: &ScenarioConfig,
) -> fjson_error::Result<()> {
    rendezvous.wait(config.barrier_timeout)?;
    let mut i: u64 = 0;
    while !stop.is_raised() {
        if let Some(fault) = config.fault {
            if fault.role == WorkerRole::Mutator && fault.at_iteration == i {
                panic!("injected fault: out-of-range key deletion at iteration {i}");
            }
        }
        seq.push(i64::try_from(i).unwrap_or(i64::MAX));
        if i % config.pop_stride == 0 {
            seq.pop();
        }
        let key = (i % config.key_space).to_string();
        map.insert(key, i64::try_from(i).unwrap_or(i64::MAX));
        if i % config.delete_stride == 0 {
            let lagging = ((i + config.delete_lag) % config.key_space).to_string();
            map.remove(&lagging);
        }
        i += 1;
        iterations.store(i, Ordering::Relaxed);
    }
    Ok(())
}

fn encoder_loop(
    seq: &SharedSeq,
    map: &SharedMap,
    rendezvous: &Rendezvous,
    stop: &StopSignal,
    calls: &AtomicU64,
    elapsed_micros: &AtomicU64,
    config: &ScenarioConfig,
) -> fjson_error::Result<()> {
    rendezvous.wait(config.barrier_timeout)?;
    let started = Instant::now();
    let deadline = started + config.encode_budget;
    let mut iteration: u64 = 0;
    while Instant::now() < deadline {
        // Fail-fast: a mutator failure raises the stop signal mid-budget.
        if stop.is_raised() {
            break;
        }
        if let Some(fault) = config.fault {
            if fault.role == WorkerRole::EncoderDriver && fault.at_iteration == iteration {
                panic!("injected fault: encoder failure at iteration {iteration}");
            }
        }
        let _ = encode(&JsonValue::Seq(seq));
        let _ = encode(&JsonValue::Map(map));
        let _ = encode(&JsonValue::Composite { seq, map });
        calls.fetch_add(3, Ordering::Relaxed);
        iteration += 1;
    }
    elapsed_micros.store(
        u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        Ordering::Relaxed,
    );
    stop.raise();
    Ok(())
}

fn run_worker(
    role: WorkerRole,
    stop: &StopSignal,
    log: &ErrorLog,
    done: &mpsc::Sender<()>,
    body: impl FnOnce() -> fjson_error::Result<()>,
) {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => {
            debug!(role = role.as_str(), "worker completed");
        }
        Ok(Err(error)) => {
            warn!(role = role.as_str(), %error, "worker failed");
            log.record(role, error.to_string());
            stop.raise();
        }
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            warn!(role = role.as_str(), detail = %detail, "worker panicked");
            log.record(role, detail);
            stop.raise();
        }
    }
    let _ = done.send(());
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}

fn spawn_failure_report(role: WorkerRole, error: &std::io::Error) -> ScenarioReport {
    let detail = format!("failed to spawn {role} thread: {error}");
    warn!(%detail, "scenario aborted before start");
    ScenarioReport {
        passed: false,
        failure: Some(ScenarioFailure {
            kind: FailureKind::Crash,
            detail: detail.clone(),
        }),
        final_phase: ScenarioPhase::Init,
        mutator_iterations: 0,
        encode_calls: 0,
        encode_elapsed_micros: 0,
        stop_raised: false,
        logged_errors: Vec::new(),
        summary: detail,
    }
}
