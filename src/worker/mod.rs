//! The matrix worker: one weight matrix, one result buffer, one job stream.

mod serve;

use std::path::Path;

use comms::{OnoReceiver, msg::Msg, report::WorkerReport};
use log::{debug, info};
use tokio::io::AsyncRead;

pub use serve::serve;

use crate::{
    buffer::ResultBuffer,
    config::WorkerSpec,
    error::{OrchestraErr, Result},
    logs::WorkerLogs,
    matrix::Matrix,
    rows::RowDispatcher,
};

/// Multiplies every left matrix it is sent by the weight matrix it was bound to.
pub struct MatrixWorker {
    spec: WorkerSpec,
    weight: Matrix,
    dispatcher: RowDispatcher,
    buffer: ResultBuffer,
    logs: Option<WorkerLogs>,
}

impl MatrixWorker {
    /// Binds the weight matrix and computes the first block from the initial
    /// left matrix.
    ///
    /// # Args
    /// * `spec` - The matrices and dimension of this worker.
    /// * `dispatcher` - How every product is split into rows.
    ///
    /// # Returns
    /// A worker whose buffer holds exactly one block.
    ///
    /// # Errors
    /// If either matrix cannot be loaded or the first multiplication fails.
    pub async fn bootstrap(spec: WorkerSpec, dispatcher: RowDispatcher) -> Result<Self> {
        let dim = spec.dim.get();
        let weight = Matrix::load(dim, &spec.weight).await?;
        let left = Matrix::load(dim, &spec.left).await?;

        let mut buffer = ResultBuffer::new(dim);
        buffer.push(dispatcher.multiply(&left, &weight).await?)?;

        info!(dim = dim; "bound weight {}", spec.weight.display());

        Ok(Self {
            spec,
            weight,
            dispatcher,
            buffer,
            logs: None,
        })
    }

    /// Writes a progress line per job into `logs`.
    pub fn with_logs(mut self, logs: WorkerLogs) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Runs the session loop until the end of session marker arrives.
    ///
    /// Jobs run one at a time, in the order they were received.
    ///
    /// # Returns
    /// The amount of jobs served during the session.
    ///
    /// # Errors
    /// `Protocol` if a frame is malformed or the stream ends without the marker,
    /// or whatever made a job fail. Either way the session is over.
    pub async fn run<R>(&mut self, mut rx: OnoReceiver<R>) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let mut rx_buf = Vec::with_capacity(256);
        let mut jobs = 0;

        loop {
            let path = match rx.recv_into(&mut rx_buf).await.map_err(OrchestraErr::Protocol)? {
                Msg::Job(path) => path.to_path_buf(),
                Msg::EndOfSession => break,
            };

            jobs += 1;
            debug!(job = jobs; "received {}", path.display());
            self.job(&path).await?;
        }

        info!(jobs = jobs; "end of session");
        Ok(jobs)
    }

    async fn job(&mut self, path: &Path) -> Result<()> {
        let left = Matrix::load(self.spec.dim.get(), path).await?;
        let block = self.dispatcher.multiply(&left, &self.weight).await?;
        self.buffer.push(block)?;

        let blocks = self.buffer.len();
        if let Some(logs) = &mut self.logs {
            logs.progress(format_args!("Job {blocks}: A = {}", path.display()))?;
        }

        Ok(())
    }

    pub fn buffer(&self) -> &ResultBuffer {
        &self.buffer
    }

    /// Returns the report the coordinator receives when this worker terminates.
    pub fn report(&self, pid: u32) -> WorkerReport {
        WorkerReport {
            pid,
            left: self.spec.left.clone(),
            weight: self.spec.weight.clone(),
            dim: self.buffer.dim(),
            jobs: self.buffer.len(),
            results: self.buffer.flatten(),
        }
    }

    /// Writes the human readable summary of every block into the `.out` log.
    fn summarize(&mut self) -> Result<()> {
        let Some(logs) = &mut self.logs else {
            return Ok(());
        };

        logs.progress(format_args!("A = {}", self.spec.left.display()))?;
        logs.progress(format_args!("W = {}", self.spec.weight.display()))?;
        logs.progress("R = [")?;
        for block in self.buffer.blocks() {
            for r in 0..block.dim() {
                let row: Vec<String> = block.row(r).iter().map(i64::to_string).collect();
                logs.progress(row.join(" "))?;
            }
        }
        logs.progress("]")?;

        Ok(())
    }
}
