use std::{fmt, process::ExitStatus};

/// How a child process terminated, as observed by its immediate parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// The child exited normally with this code.
    Exited(i32),
    /// The child was killed by this signal.
    Signaled(i32),
    /// Waiting for the child failed, so how it ended is not known.
    Unknown,
}

impl ExitOutcome {
    /// Whether the child exited normally with code 0.
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Exited(0))
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Exited(code),
            (None, Some(signal)) => ExitOutcome::Signaled(signal),
            // Stopped or continued children are never reaped by `wait`.
            (None, None) => ExitOutcome::Signaled(0),
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exited with exitcode = {code}"),
            ExitOutcome::Signaled(signal) => write!(f, "killed with signal {signal}"),
            ExitOutcome::Unknown => write!(f, "exit status unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;

    use super::*;

    #[test]
    fn raw_wait_statuses_are_split_by_termination_kind() {
        // Exit code lives in the high byte, a terminating signal in the low bits.
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(0)),
            ExitOutcome::Exited(0)
        );
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(1 << 8)),
            ExitOutcome::Exited(1)
        );
        assert_eq!(
            ExitOutcome::from(ExitStatus::from_raw(9)),
            ExitOutcome::Signaled(9)
        );
    }

    #[test]
    fn only_a_zero_exit_is_success() {
        assert!(ExitOutcome::Exited(0).is_success());
        assert!(!ExitOutcome::Exited(1).is_success());
        assert!(!ExitOutcome::Signaled(15).is_success());
        assert!(!ExitOutcome::Unknown.is_success());
    }
}
