use std::{fs::File, io, path::PathBuf, process::Stdio};

use async_trait::async_trait;
use comms::row::{RowResult, RowTask};
use log::{debug, warn};
use tokio::{process::Command, task::JoinSet};

use super::RowBackend;
use crate::{
    error::{OrchestraErr, Result, RowFailure},
    matrix::Matrix,
    status::ExitOutcome,
};

/// Runs every row in its own `row-worker` process.
///
/// Each child gets a private stdin/stdout pipe pair. It reads exactly one
/// `RowTask` and answers with exactly one `RowResult`.
pub struct ProcessRows {
    program: PathBuf,
    stderr: Option<File>,
}

impl ProcessRows {
    /// Creates a new `ProcessRows` re-executing `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            stderr: None,
        }
    }

    /// Re-executes the currently running binary.
    pub fn current_exe() -> io::Result<Self> {
        std::env::current_exe().map(Self::new)
    }

    /// Routes the row workers' stderr into `file` instead of inheriting it.
    pub fn with_stderr(mut self, file: File) -> Self {
        self.stderr = Some(file);
        self
    }

    fn command(&self, dim: usize) -> io::Result<Command> {
        let stderr = match &self.stderr {
            Some(file) => Stdio::from(file.try_clone()?),
            None => Stdio::inherit(),
        };

        let mut cmd = Command::new(&self.program);
        cmd.arg("row-worker")
            .arg("--dim")
            .arg(dim.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true);

        Ok(cmd)
    }
}

#[async_trait]
impl RowBackend for ProcessRows {
    async fn compute_rows(&self, left: &Matrix, weight: &Matrix) -> Result<Vec<RowResult>> {
        let dim = left.dim();
        let mut children = JoinSet::new();

        // Dropping `children` on any early return kills every row worker still running.
        for row in 0..dim {
            let what = format!("row worker {row}");
            let mut child = self
                .command(dim)
                .and_then(|mut cmd| cmd.spawn())
                .map_err(|e| OrchestraErr::spawn(what, e))?;

            let pid = child.id().unwrap_or_default();
            let task = RowTask {
                row,
                left_row: left.row(row).to_vec(),
                weight: weight.as_slice().to_vec(),
            };
            let stdin = child.stdin.take();

            children.spawn(async move {
                let sent = match stdin {
                    Some(mut stdin) => task.write_to(&mut stdin).await,
                    None => Err(io::Error::other("row worker stdin is not piped")),
                };

                // The child's stdin is closed by now, so it cannot block on more input.
                let output = child.wait_with_output().await;
                (row, pid, sent, output)
            });
        }

        let mut rows = Vec::with_capacity(dim);

        while let Some(joined) = children.join_next().await {
            let (row, pid, sent, output) =
                joined.map_err(|e| OrchestraErr::Io(io::Error::other(e)))?;

            let output = output.map_err(|e| OrchestraErr::row(row, RowFailure::Channel(e)))?;
            let outcome = ExitOutcome::from(output.status);

            if !outcome.is_success() {
                warn!(row = row, pid = pid; "row worker {outcome}");
                return Err(OrchestraErr::row(row, RowFailure::Exited(outcome)));
            }

            sent.map_err(|e| OrchestraErr::row(row, RowFailure::Channel(e)))?;

            let result = RowResult::decode(&output.stdout, dim)
                .map_err(|e| OrchestraErr::row(row, RowFailure::Malformed(e)))?
                .ok_or_else(|| OrchestraErr::row(row, RowFailure::NoData))?;

            debug!(row = row, pid = pid; "row collected");
            rows.push(result);
        }

        Ok(rows)
    }
}
