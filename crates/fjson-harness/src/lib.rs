//! FrankenJSON concurrency verification harness.
//!
//! This crate is intentionally not "just tests": it contains reusable
//! verification tooling that drives the subject encoder (`fjson-encode`)
//! under adversarial thread interleavings and judges the result.
//!
//! Two cooperating roles, composed by a process-level launcher:
//! - [`launcher`] starts each scenario in a brand-new process so a crash in
//!   the subject surfaces as an exit code, never as damage to the runner;
//! - [`scenario`] runs the in-process race: a mutator thread churning shared
//!   containers against an encoder-driver thread traversing them, started
//!   together by a rendezvous barrier and stopped by a one-shot signal;
//! - [`probe`] checks that loading the subject does not silently disable
//!   parallel execution;
//! - [`verdict`] folds a launched process's outcome into pass/crash/hang.
//!
//! The harness synchronizes only its own coordination primitives
//! ([`coordination`]); the shared containers under test are accessed with no
//! caller-side locking — that unsynchronized access is the condition being
//! verified, not a defect.

pub mod coordination;
pub mod launcher;
pub mod probe;
pub mod scenario;
pub mod verdict;
