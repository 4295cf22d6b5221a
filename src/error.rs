use std::{
    error::Error,
    fmt, io,
    path::{Path, PathBuf},
};

use crate::status::ExitOutcome;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, OrchestraErr>;

/// Why a single row of a multiplication never made it into the result.
#[derive(Debug)]
pub enum RowFailure {
    /// The row worker terminated with a non-zero status or by a signal.
    Exited(ExitOutcome),
    /// The row worker exited cleanly without writing anything.
    NoData,
    /// The row worker's output could not be decoded.
    Malformed(io::Error),
    /// Sending the row task to the worker failed.
    Channel(io::Error),
    /// Another worker already delivered this row.
    Duplicate,
    /// No worker delivered this row.
    Missing,
    /// The in-process row computation panicked.
    Panicked(String),
}

/// Every failure the orchestration can run into.
#[derive(Debug)]
pub enum OrchestraErr {
    /// Creating a process or one of its pipes failed.
    Spawn { what: String, source: io::Error },
    /// A matrix file is missing or unreadable.
    MatrixFile { path: PathBuf, source: io::Error },
    /// A matrix file holds something that is not an integer.
    MatrixParse {
        path: Option<PathBuf>,
        line: usize,
        token: String,
    },
    /// Two operands of one multiplication disagree on their dimension.
    DimensionMismatch { expected: usize, got: usize },
    /// One row of a multiplication failed, so the whole multiplication did.
    Row { row: usize, reason: RowFailure },
    /// A job frame was malformed, truncated, or the channel ended without the
    /// end of session marker.
    Protocol(io::Error),
    /// Writing a job to a worker failed, the workers no longer share a job set.
    Broadcast { worker: usize, source: io::Error },
    /// The session was cancelled before it could finish.
    Cancelled,
    /// An underlying I/O error not covered by the above variants.
    Io(io::Error),
}

impl OrchestraErr {
    pub(crate) fn spawn(what: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            what: what.into(),
            source,
        }
    }

    pub(crate) fn matrix_file(path: &Path, source: io::Error) -> Self {
        Self::MatrixFile {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn row(row: usize, reason: RowFailure) -> Self {
        Self::Row { row, reason }
    }
}

impl fmt::Display for RowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowFailure::Exited(outcome) => write!(f, "row worker {outcome}"),
            RowFailure::NoData => write!(f, "row worker gave up without sending its row"),
            RowFailure::Malformed(e) => write!(f, "malformed row result: {e}"),
            RowFailure::Channel(e) => write!(f, "row channel failed: {e}"),
            RowFailure::Duplicate => write!(f, "row delivered more than once"),
            RowFailure::Missing => write!(f, "row never delivered"),
            RowFailure::Panicked(msg) => write!(f, "row computation panicked: {msg}"),
        }
    }
}

impl fmt::Display for OrchestraErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { what, source } => write!(f, "failed to spawn {what}: {source}"),
            Self::MatrixFile { path, source } => {
                write!(f, "cannot open file {}: {source}", path.display())
            }
            Self::MatrixParse { path, line, token } => match path {
                Some(path) => write!(
                    f,
                    "{}:{line}: {token:?} is not an integer",
                    path.display()
                ),
                None => write!(f, "line {line}: {token:?} is not an integer"),
            },
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
            Self::Row { row, reason } => write!(f, "row {row} failed: {reason}"),
            Self::Protocol(e) => write!(f, "job stream protocol error: {e}"),
            Self::Broadcast { worker, source } => {
                write!(f, "broadcast to worker {worker} failed: {source}")
            }
            Self::Cancelled => write!(f, "session cancelled"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for OrchestraErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. }
            | Self::MatrixFile { source, .. }
            | Self::Broadcast { source, .. } => Some(source),
            Self::Protocol(e) | Self::Io(e) => Some(e),
            Self::Row {
                reason: RowFailure::Malformed(e) | RowFailure::Channel(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OrchestraErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
