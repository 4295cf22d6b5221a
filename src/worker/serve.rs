use std::os::unix::process::parent_id;

use log::{error, info};
use tokio::io::{self, AsyncWriteExt};

use super::MatrixWorker;
use crate::{config::WorkerSpec, error::Result, logs::WorkerLogs, rows};

/// Runs this process as a matrix worker.
///
/// Jobs arrive on stdin. Diagnostics and progress go to the per-pid logs in the
/// spec's log directory, and stdout carries nothing but the final report line.
///
/// # Errors
/// Any failure from bootstrap to the end of session. Failures after the logs
/// were opened are also logged into the `.err` log.
pub async fn serve(spec: WorkerSpec) -> Result<()> {
    let pid = std::process::id();
    let mut logs = WorkerLogs::open(&spec.log_dir, pid)?;
    logs.init_logger()?;

    logs.progress(format_args!(
        "Starting command for {}: child {pid} pid of parent {}",
        spec.weight.display(),
        parent_id()
    ))?;

    let res = session(spec, logs, pid).await;
    if let Err(e) = &res {
        error!("{e}");
    }

    res
}

async fn session(spec: WorkerSpec, logs: WorkerLogs, pid: u32) -> Result<()> {
    let backend = rows::backend(spec.backend, Some(logs.err_sink()?))?;
    let dispatcher = rows::RowDispatcher::new(backend);

    let mut worker = MatrixWorker::bootstrap(spec, dispatcher)
        .await?
        .with_logs(logs);

    let rx = comms::receiver(io::stdin());
    worker.run(rx).await?;
    worker.summarize()?;

    let mut stdout = io::stdout();
    stdout.write_all(&worker.report(pid).to_line()?).await?;
    stdout.flush().await?;

    info!(blocks = worker.buffer().len(); "report sent");
    Ok(())
}
