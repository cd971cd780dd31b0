//! Verdict derivation from launched-process outcomes.
//!
//! Failure taxonomy:
//! - *crash* — the child terminated abnormally (nonzero exit, signal);
//! - *hang* — a worker or the child itself missed its timeout;
//! - *logged error* — a worker caught a failure in-process and recorded it
//!   (the child then exits nonzero, so at the process boundary it reports
//!   as a crash carrying the log text on stderr).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::launcher::LaunchOutcome;

/// Failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Crash,
    Hang,
    LoggedError,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::Hang => "hang",
            Self::LoggedError => "logged_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal judgment for one scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail { kind: FailureKind, detail: String },
}

impl Verdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail { kind, detail } => write!(f, "fail({kind}): {detail}"),
        }
    }
}

/// Fold a child process outcome into a verdict.
///
/// Exit status zero is the sole pass condition at this boundary: a child
/// whose in-process error log was non-empty has already turned that into a
/// nonzero exit before terminating.
#[must_use]
pub fn verdict_from_outcome(outcome: &LaunchOutcome) -> Verdict {
    if outcome.timed_out {
        return Verdict::Fail {
            kind: FailureKind::Hang,
            detail: format!(
                "scenario process missed its deadline and was killed ({})",
                outcome.diagnostic()
            ),
        };
    }
    if outcome.exit_code != 0 {
        return Verdict::Fail {
            kind: FailureKind::Crash,
            detail: format!(
                "scenario process exited abnormally ({}): {}",
                outcome.diagnostic(),
                outcome.stderr.trim()
            ),
        };
    }
    Verdict::Pass
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{FailureKind, Verdict, verdict_from_outcome};
    use crate::launcher::LaunchOutcome;

    fn outcome(exit_code: i32, timed_out: bool) -> LaunchOutcome {
        LaunchOutcome {
            exit_code,
            timed_out,
            stdout: String::new(),
            stderr: "assertion failed: report.passed".to_owned(),
        }
    }

    #[test]
    fn zero_exit_passes() {
        assert_eq!(verdict_from_outcome(&outcome(0, false)), Verdict::Pass);
    }

    #[test]
    fn nonzero_exit_is_crash_with_stderr_detail() {
        match verdict_from_outcome(&outcome(101, false)) {
            Verdict::Fail { kind, detail } => {
                assert_eq!(kind, FailureKind::Crash);
                assert!(detail.contains("assertion failed"));
            }
            Verdict::Pass => panic!("nonzero exit must not pass"),
        }
    }

    #[test]
    fn timeout_is_hang_even_with_zero_exit() {
        match verdict_from_outcome(&outcome(0, true)) {
            Verdict::Fail { kind, .. } => assert_eq!(kind, FailureKind::Hang),
            Verdict::Pass => panic!("timed-out child must not pass"),
        }
    }

    #[test]
    fn failure_kind_serde_names_are_stable() {
        let json = serde_json::to_string(&FailureKind::LoggedError).expect("serialize");
        assert_eq!(json, "\"logged_error\"");
        assert_eq!(FailureKind::Hang.to_string(), "hang");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]
        #[test]
        fn verdict_is_total_and_consistent(exit_code in any::<i32>(), timed_out in any::<bool>()) {
            let verdict = verdict_from_outcome(&outcome(exit_code, timed_out));
            let expect_pass = exit_code == 0 && !timed_out;
            prop_assert_eq!(verdict.passed(), expect_pass);
        }
    }
}
