use std::{
    ffi::OsString,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use clap::ValueEnum;

/// Where the row workers of a multiplication run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// One `row-worker` process per row.
    #[default]
    Process,
    /// One rayon task per row inside the matrix worker.
    Thread,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Process => "process",
            BackendKind::Thread => "thread",
        }
    }
}

/// Immutable settings of one coordinator session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    program: PathBuf,
    dim: NonZeroUsize,
    backend: BackendKind,
    log_dir: PathBuf,
    keep_logs: bool,
    prompt: bool,
}

impl SessionConfig {
    /// Creates a new session configuration.
    ///
    /// # Args
    /// * `program` - The executable re-run as `matrix-worker` for every weight.
    /// * `dim` - The dimension of every matrix in the session.
    ///
    /// # Returns
    /// A `SessionConfig` with the process backend, logs in the current directory
    /// deleted after reporting, and no prompt.
    pub fn new(program: impl Into<PathBuf>, dim: NonZeroUsize) -> Self {
        Self {
            program: program.into(),
            dim,
            backend: BackendKind::default(),
            log_dir: PathBuf::from("."),
            keep_logs: false,
            prompt: false,
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn with_keep_logs(mut self, keep_logs: bool) -> Self {
        self.keep_logs = keep_logs;
        self
    }

    /// Prints a prompt before every read of a job path.
    pub fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn dim(&self) -> usize {
        self.dim.get()
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn keep_logs(&self) -> bool {
        self.keep_logs
    }

    pub fn prompt(&self) -> bool {
        self.prompt
    }

    /// Returns the spec of the worker bound to `weight`.
    pub fn worker_spec(&self, left: &Path, weight: &Path) -> WorkerSpec {
        WorkerSpec {
            left: left.to_path_buf(),
            weight: weight.to_path_buf(),
            dim: self.dim,
            backend: self.backend,
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Everything a matrix worker needs to know before its session loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub left: PathBuf,
    pub weight: PathBuf,
    pub dim: NonZeroUsize,
    pub backend: BackendKind,
    pub log_dir: PathBuf,
}

impl WorkerSpec {
    /// Renders the command line that re-executes the binary as this worker.
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "matrix-worker".into(),
            "--dim".into(),
            self.dim.to_string().into(),
            "--backend".into(),
            self.backend.as_str().into(),
            "--log-dir".into(),
            self.log_dir.clone().into_os_string(),
            self.left.clone().into_os_string(),
            self.weight.clone().into_os_string(),
        ]
    }
}
