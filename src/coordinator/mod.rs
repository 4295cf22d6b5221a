//! The session coordinator: spawns one matrix worker per weight matrix,
//! broadcasts every job to all of them, then reports each one as it terminates.

mod handle;

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use comms::msg::Msg;
use futures::{StreamExt, future::join_all, stream::FuturesUnordered};
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

pub use handle::{WorkerHandle, WorkerOutcome};

use crate::{
    config::SessionConfig,
    error::{OrchestraErr, Result},
    matrix::Matrix,
    status::ExitOutcome,
};

const FIRST_PROMPT: &str = "Enter file path of a matrix:";
const PROMPT: &str = "Enter file path of a matrix (Ctrl+D to exit):";

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Spawning,
    Broadcasting,
    Draining,
    Reporting,
    Done,
    Aborted,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// One entry per worker, in the order they terminated.
    pub outcomes: Vec<WorkerOutcome>,
    /// Jobs broadcast after the initial left matrix.
    pub jobs: usize,
    /// Wall time of the session minus the time spent waiting for input.
    pub runtime: Duration,
}

impl SessionSummary {
    /// Whether every worker exited with status 0.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(WorkerOutcome::is_success)
    }
}

/// Drives a whole session of matrix workers sharing one job stream.
pub struct SessionCoordinator {
    config: SessionConfig,
    state: SessionState,
    handles: Vec<WorkerHandle>,
    started: Instant,
    input_time: Duration,
}

impl SessionCoordinator {
    /// Spawns one matrix worker per weight matrix, all starting from `left`.
    ///
    /// # Errors
    /// `Spawn` if any worker cannot be started, in which case the ones already
    /// running are killed.
    pub fn spawn(config: SessionConfig, left: &Path, weights: &[PathBuf]) -> Result<Self> {
        let started = Instant::now();
        let mut handles = Vec::with_capacity(weights.len());

        for (index, weight) in weights.iter().enumerate() {
            // Dropping `handles` on failure kills every worker spawned so far.
            let handle = WorkerHandle::spawn(index, &config, left, weight)?;
            info!(worker = index, pid = handle.pid(); "spawned worker for {}", weight.display());
            handles.push(handle);
        }

        Ok(Self {
            config,
            state: SessionState::Spawning,
            handles,
            started,
            input_time: Duration::ZERO,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handles(&self) -> &[WorkerHandle] {
        &self.handles
    }

    /// Forwards every non blank line of `input` as a job to every attached
    /// worker, then sends them all the end of session marker.
    ///
    /// # Returns
    /// The amount of jobs broadcast.
    ///
    /// # Errors
    /// `Broadcast` if a write fails for any reason other than the worker having
    /// already left, since the workers would no longer share one job sequence.
    pub async fn broadcast<I, O>(&mut self, mut input: I, output: &mut O) -> Result<usize>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        self.state = SessionState::Broadcasting;

        let mut line = String::new();
        let mut jobs = 0;
        let mut prompt = FIRST_PROMPT;

        loop {
            if self.config.prompt() {
                output.write_all(format!("{prompt}\n").as_bytes()).await?;
                output.flush().await?;
                prompt = PROMPT;
            }

            line.clear();
            let waiting = Instant::now();
            let read = input.read_line(&mut line).await?;
            self.input_time += waiting.elapsed();

            if read == 0 {
                break;
            }

            let path = line.trim();
            if path.is_empty() {
                continue;
            }

            self.send_all(&Msg::Job(Path::new(path))).await?;
            jobs += 1;
            debug!(job = jobs; "broadcast {path}");
        }

        self.send_all(&Msg::EndOfSession).await?;
        for handle in &mut self.handles {
            if let Err(e) = handle.close().await {
                warn!(worker = handle.index(); "closing job channel failed: {e}");
            }
        }

        info!(jobs = jobs; "end of session sent");
        Ok(jobs)
    }

    /// Writes `msg` to every attached worker concurrently.
    async fn send_all(&mut self, msg: &Msg<'_>) -> Result<()> {
        let sent = join_all(self.handles.iter_mut().map(|handle| async move {
            let res = handle.send(msg).await;
            (handle, res)
        }))
        .await;

        for (handle, res) in sent {
            match res {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    warn!(worker = handle.index(), pid = handle.pid(); "worker left the session");
                    handle.detach();
                }
                Err(source) => {
                    return Err(OrchestraErr::Broadcast {
                        worker: handle.index(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Waits for every worker, reporting each one as soon as it terminates.
    ///
    /// A failed worker is reported like any other and never keeps the rest
    /// from being reported. Only a failure to write `output` ends the drain.
    pub async fn drain<O>(&mut self, output: &mut O) -> Result<Vec<WorkerOutcome>>
    where
        O: AsyncWrite + Unpin,
    {
        self.state = SessionState::Draining;

        let log_dir = self.config.log_dir().to_path_buf();
        let keep_logs = self.config.keep_logs();

        let mut pending: FuturesUnordered<_> = self
            .handles
            .iter_mut()
            .map(|handle| handle.finish(&log_dir))
            .collect();

        let mut outcomes = Vec::with_capacity(pending.len());

        while let Some(outcome) = pending.next().await {
            self.state = SessionState::Reporting;

            report(&outcome, output, keep_logs).await?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    /// Kills and reaps every worker still running.
    pub async fn abort(&mut self) {
        self.state = SessionState::Aborted;

        for handle in &mut self.handles {
            match handle.kill().await {
                Ok(exit) => debug!(worker = handle.index(); "worker {exit}"),
                Err(e) => error!(worker = handle.index(); "failed to kill worker: {e}"),
            }
        }
    }

    /// Runs the session to completion, or aborts it on the first unrecoverable
    /// failure or once `cancel` fires.
    pub async fn run<I, O>(
        mut self,
        input: I,
        mut output: O,
        cancel: CancellationToken,
    ) -> Result<SessionSummary>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let res = tokio::select! {
            res = self.session(input, &mut output) => res,
            _ = cancel.cancelled() => Err(OrchestraErr::Cancelled),
        };

        match res {
            Ok(summary) => {
                self.state = SessionState::Done;
                Ok(summary)
            }
            Err(e) => {
                warn!("aborting session: {e}");
                self.abort().await;
                Err(e)
            }
        }
    }

    async fn session<I, O>(&mut self, input: I, output: &mut O) -> Result<SessionSummary>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let jobs = self.broadcast(input, output).await?;
        let outcomes = self.drain(output).await?;
        let runtime = self.started.elapsed().saturating_sub(self.input_time);

        output
            .write_all(format!("\nRuntime: {:.6} secs\n", runtime.as_secs_f64()).as_bytes())
            .await?;
        output.flush().await?;

        Ok(SessionSummary {
            outcomes,
            jobs,
            runtime,
        })
    }
}

/// Closes the worker's logs, prints them along with its exit and results, and
/// deletes them unless they should be kept.
///
/// Only a failure to write `output` is an error, trouble with the log files is
/// logged and skipped.
async fn report<O>(outcome: &WorkerOutcome, output: &mut O, keep_logs: bool) -> Result<()>
where
    O: AsyncWrite + Unpin,
{
    let WorkerOutcome {
        index,
        pid,
        weight,
        exit,
        report,
        logs,
    } = outcome;

    let closed = logs
        .append_out(format_args!(
            "Finished child {pid} pid of parent {}",
            std::process::id()
        ))
        .and_then(|()| match exit {
            ExitOutcome::Exited(0) => logs.append_out(exit),
            _ => logs.append_err(exit),
        });
    if let Err(e) = closed {
        warn!(pid = *pid; "cannot append to worker logs: {e}");
    }

    let (out, err) = logs.read().await.unwrap_or_else(|e| {
        warn!(pid = *pid; "cannot read worker logs: {e}");
        Default::default()
    });

    let mut text = format!(
        "Worker {} (pid {pid}, W = {}) {exit}\n",
        index + 1,
        weight.display()
    );
    text.push_str(&format!("--- {}\n{out}", logs.out.display()));
    text.push_str(&format!("--- {}\n{err}", logs.err.display()));

    if let Some(report) = report {
        text.push_str(&format!("{} result blocks:\n", report.jobs));
        for block in report.blocks() {
            match Matrix::from_vec(report.dim, block.to_vec()) {
                Ok(block) => text.push_str(&format!("{block}\n")),
                Err(e) => text.push_str(&format!("unreadable block: {e}\n")),
            }
        }
    }

    output.write_all(text.as_bytes()).await?;
    output.flush().await?;

    if !keep_logs {
        if let Err(e) = logs.remove().await {
            warn!(pid = *pid; "cannot delete worker logs: {e}");
        }
    }

    Ok(())
}
