use std::{
    io,
    path::{Path, PathBuf},
    process::Stdio,
};

use comms::{OnoSender, msg::Msg, report::WorkerReport};
use log::warn;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, ChildStdin, Command},
};

use crate::{
    config::SessionConfig,
    error::{OrchestraErr, Result},
    logs::LogPaths,
    status::ExitOutcome,
};

/// The coordinator's record of one matrix worker process.
pub struct WorkerHandle {
    index: usize,
    pid: u32,
    weight: PathBuf,
    tx: Option<OnoSender<ChildStdin>>,
    child: Child,
}

/// What is known about a matrix worker once it terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub index: usize,
    pub pid: u32,
    pub weight: PathBuf,
    pub exit: ExitOutcome,
    pub report: Option<WorkerReport>,
    pub logs: LogPaths,
}

impl WorkerOutcome {
    /// Whether the worker exited with status 0.
    pub fn is_success(&self) -> bool {
        self.exit.is_success()
    }
}

impl WorkerHandle {
    /// Starts the matrix worker bound to `weight`.
    ///
    /// The child's stdin becomes its private job channel and its stdout carries
    /// its report. Its stderr is captured and ends up in its `.err` log.
    pub(super) fn spawn(
        index: usize,
        config: &SessionConfig,
        left: &Path,
        weight: &Path,
    ) -> Result<Self> {
        let what = format!("matrix worker for {}", weight.display());
        let spec = config.worker_spec(left, weight);

        let mut child = Command::new(config.program())
            .args(spec.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OrchestraErr::spawn(what.clone(), e))?;

        let pid = child
            .id()
            .ok_or_else(|| OrchestraErr::spawn(what.clone(), io::Error::other("no pid")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OrchestraErr::spawn(what, io::Error::other("stdin not piped")))?;

        Ok(Self {
            index,
            pid,
            weight: weight.to_path_buf(),
            tx: Some(comms::sender(stdin)),
            child,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn weight(&self) -> &Path {
        &self.weight
    }

    /// Whether the job channel is still open.
    pub fn is_attached(&self) -> bool {
        self.tx.is_some()
    }

    /// Sends `msg` through the job channel, does nothing once detached.
    pub(super) async fn send(&mut self, msg: &Msg<'_>) -> io::Result<()> {
        match &mut self.tx {
            Some(tx) => tx.send(msg).await,
            None => Ok(()),
        }
    }

    /// Closes the job channel so the worker sees the end of its input.
    pub(super) async fn close(&mut self) -> io::Result<()> {
        match self.tx.take() {
            Some(tx) => tx.close().await,
            None => Ok(()),
        }
    }

    /// Drops the job channel without flushing it.
    pub(super) fn detach(&mut self) {
        self.tx = None;
    }

    /// Waits for the worker to terminate, collecting everything it reported.
    ///
    /// Whatever the worker wrote to stderr is appended to its `.err` log. Trouble
    /// reading its pipes or reaping it is logged and folded into the outcome, so
    /// one worker never keeps the others from being reported.
    pub(super) async fn finish(&mut self, log_dir: &Path) -> WorkerOutcome {
        self.detach();
        let logs = LogPaths::for_pid(log_dir, self.pid);

        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();
        let (stdout, stderr) = tokio::join!(read_all(stdout), read_all(stderr));

        let stdout = stdout.unwrap_or_else(|e| {
            warn!(worker = self.index, pid = self.pid; "cannot read report: {e}");
            Vec::new()
        });

        match stderr {
            Ok(bytes) if !bytes.is_empty() => {
                if let Err(e) = logs.append_err_bytes(&bytes) {
                    warn!(worker = self.index, pid = self.pid; "cannot keep stderr: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(worker = self.index, pid = self.pid; "cannot read stderr: {e}"),
        }

        let exit = match self.child.wait().await {
            Ok(status) => status.into(),
            Err(e) => {
                warn!(worker = self.index, pid = self.pid; "cannot reap worker: {e}");
                ExitOutcome::Unknown
            }
        };

        let report = match WorkerReport::from_output(&stdout) {
            Ok(Some(report)) if !report.is_complete() => {
                warn!(
                    worker = self.index, pid = self.pid;
                    "report of {} jobs holds {} values", report.jobs, report.results.len()
                );
                None
            }
            Ok(report) => report,
            Err(e) => {
                warn!(worker = self.index, pid = self.pid; "unreadable report: {e}");
                None
            }
        };

        WorkerOutcome {
            index: self.index,
            pid: self.pid,
            weight: self.weight.clone(),
            exit,
            report,
            logs,
        }
    }

    /// Kills the worker unless it already terminated, then reaps it.
    pub(super) async fn kill(&mut self) -> io::Result<ExitOutcome> {
        self.detach();
        if let Some(status) = self.child.try_wait()? {
            return Ok(status.into());
        }

        self.child.kill().await?;
        Ok(self.child.wait().await?.into())
    }
}

async fn read_all<R>(pipe: Option<R>) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
