use std::{io, path::PathBuf};

/// The final state of a matrix worker, written once to its stdout when the
/// session ends and read back by the coordinator after the worker exits.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkerReport {
    pub pid: u32,
    pub left: PathBuf,
    pub weight: PathBuf,
    pub dim: usize,
    pub jobs: usize,
    /// Every result block, flattened in append order.
    pub results: Vec<i64>,
}

impl WorkerReport {
    /// Encodes the report as a single JSON line.
    pub fn to_line(&self) -> io::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Decodes the report out of a worker's captured stdout.
    ///
    /// # Returns
    /// `None` if the worker wrote nothing, which happens when it failed before the
    /// session ended.
    pub fn from_output(output: &[u8]) -> io::Result<Option<Self>> {
        let trimmed = output.trim_ascii();

        if trimmed.is_empty() {
            return Ok(None);
        }

        let report = serde_json::from_slice(trimmed)?;
        Ok(Some(report))
    }

    /// Whether the results hold exactly `jobs` blocks of `dim * dim` values.
    pub fn is_complete(&self) -> bool {
        self.results.len() == self.jobs * self.dim * self.dim
    }

    /// Iterates over the result blocks, each one `dim * dim` values long.
    pub fn blocks(&self) -> impl Iterator<Item = &[i64]> {
        self.results.chunks((self.dim * self.dim).max(1))
    }
}
