//! Per-worker log files named after the worker's process id.

use std::{
    fmt::Display,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use env_logger::{Env, Target};

/// Where the logs of the worker with a given pid live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub out: PathBuf,
    pub err: PathBuf,
}

impl LogPaths {
    /// Returns `<dir>/<pid>.out` and `<dir>/<pid>.err`.
    pub fn for_pid(dir: &Path, pid: u32) -> Self {
        Self {
            out: dir.join(format!("{pid}.out")),
            err: dir.join(format!("{pid}.err")),
        }
    }

    /// Appends one line to the `.out` log.
    pub fn append_out(&self, line: impl Display) -> io::Result<()> {
        append_line(&self.out, line)
    }

    /// Appends one line to the `.err` log.
    pub fn append_err(&self, line: impl Display) -> io::Result<()> {
        append_line(&self.err, line)
    }

    /// Appends raw bytes to the `.err` log as they were written.
    pub fn append_err_bytes(&self, bytes: &[u8]) -> io::Result<()> {
        open_append(&self.err)?.write_all(bytes)
    }

    /// Reads both logs back, a missing log reads as empty.
    pub async fn read(&self) -> io::Result<(String, String)> {
        Ok((read_or_empty(&self.out).await?, read_or_empty(&self.err).await?))
    }

    /// Deletes both logs, ignoring logs that were never created.
    pub async fn remove(&self) -> io::Result<()> {
        for path in [&self.out, &self.err] {
            match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

/// The open log files of a running matrix worker.
#[derive(Debug)]
pub struct WorkerLogs {
    paths: LogPaths,
    out: File,
    err: File,
}

impl WorkerLogs {
    /// Opens (creating if needed) both logs of `pid` in append mode.
    pub fn open(dir: &Path, pid: u32) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let paths = LogPaths::for_pid(dir, pid);

        Ok(Self {
            out: open_append(&paths.out)?,
            err: open_append(&paths.err)?,
            paths,
        })
    }

    pub fn paths(&self) -> &LogPaths {
        &self.paths
    }

    /// Routes this process' `log` output into the `.err` log, `info` unless
    /// `RUST_LOG` says otherwise.
    pub fn init_logger(&self) -> io::Result<()> {
        let target = Target::Pipe(Box::new(self.err.try_clone()?));

        env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .target(target)
            .try_init()
            .map_err(io::Error::other)
    }

    /// Writes one progress line to the `.out` log.
    pub fn progress(&mut self, line: impl Display) -> io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    /// Returns a handle to the `.err` log to hand to child processes as stderr.
    pub fn err_sink(&self) -> io::Result<File> {
        self.err.try_clone()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn append_line(path: &Path, line: impl Display) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).create(true).open(path)?;
    writeln!(file, "{line}")
}

async fn read_or_empty(path: &Path) -> io::Result<String> {
    match tokio::fs::read_to_string(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        res => res,
    }
}
