use std::{
    io::IsTerminal,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, error, info};
use tokio::{io, signal};
use tokio_util::sync::CancellationToken;

use matrix_orchestration::{
    BackendKind, Matrix, RowDispatcher, SessionConfig, SessionCoordinator, WorkerSpec,
    matrix::DEFAULT_DIM, row_worker, rows, worker,
};

#[derive(Parser, Debug)]
#[command(name = "matrixmult", version)]
#[command(about = "Multiplies integer matrices across pools of worker processes")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Args, Debug, Clone, Copy)]
struct Compute {
    /// Dimension of every matrix
    #[arg(long, env = "MATRIX_DIM", default_value_t = DEFAULT_DIM)]
    dim: NonZeroUsize,

    /// Where the row workers of a multiplication run
    #[arg(long, value_enum, env = "MATRIX_BACKEND", default_value_t = BackendKind::Process)]
    backend: BackendKind,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Runs one worker per weight matrix, reading further left matrix paths from stdin
    Session {
        #[command(flatten)]
        compute: Compute,

        /// Directory holding the `<pid>.out` and `<pid>.err` worker logs
        #[arg(long, env = "MATRIX_LOG_DIR", default_value = ".")]
        log_dir: PathBuf,

        /// Keep the worker logs after they were reported
        #[arg(long, env = "MATRIX_KEEP_LOGS")]
        keep_logs: bool,

        /// The initial left matrix
        left: PathBuf,

        /// One weight matrix per worker
        #[arg(required = true)]
        weights: Vec<PathBuf>,
    },

    /// Multiplies one left matrix by each weight matrix and prints the products
    Multiply {
        #[command(flatten)]
        compute: Compute,

        left: PathBuf,

        #[arg(required = true)]
        weights: Vec<PathBuf>,
    },

    #[command(hide = true)]
    MatrixWorker {
        #[command(flatten)]
        compute: Compute,

        #[arg(long)]
        log_dir: PathBuf,

        left: PathBuf,

        weight: PathBuf,
    },

    #[command(hide = true)]
    RowWorker {
        #[arg(long)]
        dim: NonZeroUsize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Cmd::Session {
            compute,
            log_dir,
            keep_logs,
            left,
            weights,
        } => {
            env_logger::init();
            match session(compute, log_dir, keep_logs, &left, &weights).await {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    // A blocking read of stdin would otherwise keep the runtime from shutting down.
                    std::process::exit(1);
                }
            }
        }
        Cmd::Multiply {
            compute,
            left,
            weights,
        } => {
            env_logger::init();
            match multiply(compute, &left, &weights).await {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    ExitCode::FAILURE
                }
            }
        }
        Cmd::MatrixWorker {
            compute,
            log_dir,
            left,
            weight,
        } => {
            let spec = WorkerSpec {
                left,
                weight,
                dim: compute.dim,
                backend: compute.backend,
                log_dir,
            };

            match worker::serve(spec).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    // Once the logger is up the failure is already in the `.err` log.
                    if log::max_level() == LevelFilter::Off {
                        eprintln!("error: {e}");
                    }
                    ExitCode::FAILURE
                }
            }
        }
        Cmd::RowWorker { dim } => {
            env_logger::init();
            match row_worker::run(dim.get(), &mut io::stdin(), &mut io::stdout()).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("row worker {}: {e}", std::process::id());
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn session(
    compute: Compute,
    log_dir: PathBuf,
    keep_logs: bool,
    left: &Path,
    weights: &[PathBuf],
) -> anyhow::Result<ExitCode> {
    let program = std::env::current_exe().context("cannot locate the running executable")?;

    let config = SessionConfig::new(program, compute.dim)
        .with_backend(compute.backend)
        .with_log_dir(log_dir)
        .with_keep_logs(keep_logs)
        .with_prompt(std::io::stdin().is_terminal());

    let coordinator = SessionCoordinator::spawn(config, left, weights)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if signal::ctrl_c().await.is_ok() {
                info!("received SIGINT");
                cancel.cancel();
            }
        }
    });

    let input = io::BufReader::new(io::stdin());
    let summary = coordinator.run(input, io::stdout(), cancel).await?;

    info!(
        jobs = summary.jobs,
        workers = summary.outcomes.len();
        "session finished"
    );

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn multiply(compute: Compute, left: &Path, weights: &[PathBuf]) -> anyhow::Result<ExitCode> {
    let dim = compute.dim.get();
    let dispatcher = RowDispatcher::new(rows::backend(compute.backend, None)?);
    let left_matrix = Matrix::load(dim, left).await?;

    let started = Instant::now();
    let mut failed = false;

    for weight in weights {
        let product = match Matrix::load(dim, weight).await {
            Ok(weight) => dispatcher.multiply(&left_matrix, &weight).await,
            Err(e) => Err(e),
        };

        match product {
            Ok(product) => println!(
                "A = {}\nW = {}\nR = {product}",
                left.display(),
                weight.display()
            ),
            Err(e) => {
                eprintln!("error: {e}");
                failed = true;
            }
        }
    }

    println!("Runtime {:.4} seconds", started.elapsed().as_secs_f64());

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
