//! FrankenJSON subject encoder.
//!
//! This crate is the *subject* of the concurrency verification harness in
//! `fjson-harness`: shared containers whose mutation and traversal APIs take
//! `&self` (no caller-side locking), plus an `encode` operation that must be
//! safe to call while another thread mutates the argument's structure.
//!
//! The contract under test:
//! - traversal may observe any transient *contents*, but never a torn or
//!   half-updated container node (structural validity);
//! - `encode` must not panic, corrupt unrelated memory, or hang, no matter
//!   how the scheduler interleaves it with concurrent `push`/`pop`/
//!   `insert`/`remove` calls;
//! - initializing the engine must not silently disable parallel mode.

pub mod encode;
pub mod engine;
pub mod shared;

pub use encode::{JsonValue, encode};
pub use engine::EngineMode;
pub use shared::{SharedMap, SharedSeq};
