//! Process launcher: one fresh child process per scenario.
//!
//! The launcher re-executes the current test binary against a single named
//! child entry, so a fault in the subject encoder terminates the child, not
//! the runner. A nonzero exit status is reported as data in
//! [`LaunchOutcome`], never raised as an error; only conditions that prevent
//! observing an outcome at all (spawn failure, pipe I/O) are errors.

use std::env;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use fjson_error::{FjsonError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Environment marker distinguishing child scenario runs from normal test
/// invocations. Child entries no-op unless this is set.
pub const CHILD_MARKER_ENV: &str = "FJSON_HARNESS_CHILD";

/// Poll interval for the child-exit wait loop.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Captured result of one child process run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchOutcome {
    /// Child exit code; `-1` when the child was killed by a signal or by
    /// the launcher's deadline.
    pub exit_code: i32,
    /// True when the child missed the launch deadline and was killed.
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl LaunchOutcome {
    /// Clean exit: terminated on its own with status zero.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// One-line diagnostic for failure reports.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        format!(
            "exit_code={} timed_out={} stderr_bytes={}",
            self.exit_code,
            self.timed_out,
            self.stderr.len()
        )
    }
}

/// What to launch: a named child entry plus environment overrides.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Exact libtest entry name in the current binary.
    pub entry: String,
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
    /// Hard deadline after which the child is killed and the outcome is
    /// marked timed out.
    pub deadline: Duration,
}

impl LaunchRequest {
    #[must_use]
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            env: Vec::new(),
            deadline: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

/// Seam for launching scenario processes; tests substitute fakes.
pub trait ScenarioProcessRunner {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome>;
}

/// Default runner: re-executes the current executable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfExecRunner;

impl ScenarioProcessRunner for SelfExecRunner {
    fn launch(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
        let exe = env::current_exe().map_err(|error| FjsonError::SelfExecUnavailable {
            detail: error.to_string(),
        })?;
        debug!(entry = %request.entry, exe = %exe.display(), "launching scenario child");

        let mut command = Command::new(exe);
        command
            .arg(&request.entry)
            .arg("--exact")
            .arg("--test-threads")
            .arg("1")
            .arg("--nocapture")
            .env(CHILD_MARKER_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|error| FjsonError::Spawn {
            detail: error.to_string(),
        })?;
        let stdout_capture = child.stdout.take().map(capture_stream);
        let stderr_capture = child.stderr.take().map(capture_stream);

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break Some(status);
            }
            if started.elapsed() >= request.deadline {
                warn!(
                    entry = %request.entry,
                    deadline_ms = u64::try_from(request.deadline.as_millis()).unwrap_or(u64::MAX),
                    "scenario child missed deadline; killing"
                );
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            thread::sleep(WAIT_POLL);
        };

        let stdout = stdout_capture.map(join_capture).unwrap_or_default();
        let stderr = stderr_capture.map(join_capture).unwrap_or_default();

        Ok(match status {
            Some(status) => LaunchOutcome {
                exit_code: status.code().unwrap_or(-1),
                timed_out: false,
                stdout,
                stderr,
            },
            None => LaunchOutcome {
                exit_code: -1,
                timed_out: true,
                stdout,
                stderr,
            },
        })
    }
}

/// True when this process is a launched child entry.
#[must_use]
pub fn running_as_child() -> bool {
    env::var_os(CHILD_MARKER_ENV).is_some()
}

fn capture_stream(stream: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut stream = stream;
        let mut captured = String::new();
        let _ = stream.read_to_string(&mut captured);
        captured
    })
}

fn join_capture(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{LaunchOutcome, LaunchRequest};

    #[test]
    fn request_builder_defaults() {
        let request = LaunchRequest::new("child_entry")
            .with_env("SCENARIO_VARIANT", "fault")
            .with_deadline(Duration::from_secs(5));
        assert_eq!(request.entry, "child_entry");
        assert_eq!(request.env.len(), 1);
        assert_eq!(request.deadline, Duration::from_secs(5));
        assert_eq!(LaunchRequest::new("x").deadline, Duration::from_secs(30));
    }

    #[test]
    fn success_requires_zero_exit_and_no_timeout() {
        let clean = LaunchOutcome {
            exit_code: 0,
            timed_out: false,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(clean.success());

        let crashed = LaunchOutcome {
            exit_code: 101,
            ..clean.clone()
        };
        assert!(!crashed.success());

        let hung = LaunchOutcome {
            exit_code: 0,
            timed_out: true,
            ..clean
        };
        assert!(!hung.success());
    }

    #[test]
    fn diagnostic_is_single_line() {
        let outcome = LaunchOutcome {
            exit_code: -1,
            timed_out: true,
            stdout: String::new(),
            stderr: "thread panicked".to_owned(),
        };
        let line = outcome.diagnostic();
        assert!(!line.contains('\n'));
        assert!(line.contains("timed_out=true"));
    }
}
