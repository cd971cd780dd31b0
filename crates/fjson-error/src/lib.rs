//! Shared error type for the FrankenJSON verification workspace.
//!
//! One enum covers both the subject encoder and the harness. Structured
//! variants with named fields; worker-local failures inside a scenario are
//! *not* errors — they are captured in the scenario's error log and surfaced
//! through reports, so the variants here cover only conditions that prevent
//! the harness from observing a verdict at all.

use thiserror::Error;

/// Primary error type for FrankenJSON harness operations.
#[derive(Error, Debug)]
pub enum FjsonError {
    /// File or pipe I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The scenario child process could not be spawned.
    #[error("failed to spawn scenario process: {detail}")]
    Spawn { detail: String },

    /// The current executable path could not be resolved for self-exec.
    #[error("cannot resolve current executable: {detail}")]
    SelfExecUnavailable { detail: String },

    /// A rendezvous participant timed out before the quota arrived.
    #[error("rendezvous timed out after {waited_ms} ms ({arrived}/{quota} arrived)")]
    BarrierTimeout {
        waited_ms: u64,
        arrived: usize,
        quota: usize,
    },

    /// A worker role failed to terminate within its timeout.
    #[error("worker '{role}' did not terminate within {timeout_ms} ms")]
    WorkerHang { role: String, timeout_ms: u64 },
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, FjsonError>;
