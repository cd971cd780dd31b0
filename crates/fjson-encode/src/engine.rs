//! Engine runtime mode and one-time initialization.
//!
//! The encoder runs in one of two modes:
//! - [`EngineMode::Parallel`] — lock-free traversal of shared containers is
//!   available and threads encode truly in parallel;
//! - [`EngineMode::Serial`] — a one-way fallback for builds that cannot
//!   guarantee safe concurrent traversal.
//!
//! Invariant verified by the harness's capability probe: [`initialize`]
//! never engages the serial fallback.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, warn};

static SERIAL_FALLBACK: AtomicBool = AtomicBool::new(false);
static ESCAPE_TABLE: OnceLock<EscapeTable> = OnceLock::new();

/// Current execution mode of the encoder engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineMode {
    /// Concurrent encoding with no global exclusivity lock.
    Parallel,
    /// Single-thread-at-a-time fallback.
    Serial,
}

impl EngineMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Serial => "serial",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte-classification table for the string fast path.
///
/// `plain[b]` is true when byte `b` may be copied into a JSON string
/// verbatim (printable ASCII, not `"` or `\`).
pub(crate) struct EscapeTable {
    plain: [bool; 256],
}

impl EscapeTable {
    fn build() -> Self {
        let mut plain = [false; 256];
        for byte in 0x20..=0x7e_u8 {
            plain[usize::from(byte)] = byte != b'"' && byte != b'\\';
        }
        Self { plain }
    }

    pub(crate) fn is_plain(&self, byte: u8) -> bool {
        self.plain[usize::from(byte)]
    }
}

pub(crate) fn escape_table() -> &'static EscapeTable {
    ESCAPE_TABLE.get_or_init(|| {
        debug!("engine escape table built");
        EscapeTable::build()
    })
}

/// Perform one-time engine setup.
///
/// Idempotent. Must not change the engine mode: a host that was in parallel
/// mode before initialization stays in parallel mode afterward.
pub fn initialize() {
    let _ = escape_table();
}

/// Whether the host offers genuine thread parallelism.
///
/// Read-only capability query; scenarios that require parallel execution
/// are inert when this is false.
#[must_use]
pub fn parallelism_supported() -> bool {
    thread::available_parallelism().map_or(false, |n| n.get() >= 2)
}

/// Current engine mode.
#[must_use]
pub fn mode() -> EngineMode {
    if SERIAL_FALLBACK.load(Ordering::Acquire) {
        EngineMode::Serial
    } else {
        EngineMode::Parallel
    }
}

/// Permanently switch this process to single-thread-at-a-time encoding.
///
/// One-way. Exists for builds that cannot guarantee safe concurrent
/// traversal; the capability probe treats an unexpected switch as a failure.
pub fn engage_serial_fallback() {
    if !SERIAL_FALLBACK.swap(true, Ordering::AcqRel) {
        warn!("engine serial fallback engaged; parallel encoding disabled");
    }
}
