//! Fan-out of one multiplication into one unit of work per row, and the fan-in
//! that puts the product back together.

mod process;
mod threads;

use std::{fs::File, io};

use async_trait::async_trait;
use comms::row::RowResult;
use log::debug;

pub use process::ProcessRows;
pub use threads::ThreadRows;

use crate::{
    config::BackendKind,
    error::{OrchestraErr, Result, RowFailure},
    matrix::Matrix,
};

/// Runs one row worker per row of a multiplication and collects what they send.
///
/// Results may come back in any order, each one tagged with the row it computed.
/// An implementation either returns every row or fails, it never returns a
/// partial set of rows on success.
#[async_trait]
pub trait RowBackend: Send + Sync {
    async fn compute_rows(&self, left: &Matrix, weight: &Matrix) -> Result<Vec<RowResult>>;
}

/// Multiplies matrices by fanning rows out to a `RowBackend`.
pub struct RowDispatcher {
    backend: Box<dyn RowBackend>,
}

impl RowDispatcher {
    /// Creates a new `RowDispatcher`.
    ///
    /// # Args
    /// * `backend` - Where the row workers run.
    pub fn new(backend: Box<dyn RowBackend>) -> Self {
        Self { backend }
    }

    /// Computes `left × weight`.
    ///
    /// # Errors
    /// `DimensionMismatch` if the operands differ in size, or whatever row failure
    /// stopped the fan-out. No partial product is ever returned.
    pub async fn multiply(&self, left: &Matrix, weight: &Matrix) -> Result<Matrix> {
        if left.dim() != weight.dim() {
            return Err(OrchestraErr::DimensionMismatch {
                expected: left.dim(),
                got: weight.dim(),
            });
        }

        let rows = self.backend.compute_rows(left, weight).await?;
        debug!(rows = rows.len(); "all row workers reported");

        assemble(left.dim(), rows)
    }
}

/// Builds the backend selected by `kind`.
///
/// # Args
/// * `kind` - Where the row workers run.
/// * `stderr` - Where row worker processes write their diagnostics, inherited if `None`.
///
/// # Errors
/// If the path of the running executable cannot be resolved.
pub fn backend(kind: BackendKind, stderr: Option<File>) -> io::Result<Box<dyn RowBackend>> {
    Ok(match kind {
        BackendKind::Process => {
            let rows = ProcessRows::current_exe()?;
            match stderr {
                Some(file) => Box::new(rows.with_stderr(file)),
                None => Box::new(rows),
            }
        }
        BackendKind::Thread => Box::new(ThreadRows::new()),
    })
}

/// Places every row at the index its worker transmitted.
///
/// # Errors
/// A `Row` error if a row index is out of range, delivered twice, carries the
/// wrong amount of values, or was never delivered.
pub fn assemble<I>(dim: usize, rows: I) -> Result<Matrix>
where
    I: IntoIterator<Item = RowResult>,
{
    let mut slots: Vec<Option<Vec<i64>>> = vec![None; dim];

    for RowResult { row, values } in rows {
        let Some(slot) = slots.get_mut(row) else {
            let e = io::Error::new(
                io::ErrorKind::InvalidData,
                format!("row index {row} is outside of 0..{dim}"),
            );
            return Err(OrchestraErr::row(row, RowFailure::Malformed(e)));
        };

        if values.len() != dim {
            let e = io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {dim} values, got {}", values.len()),
            );
            return Err(OrchestraErr::row(row, RowFailure::Malformed(e)));
        }

        if slot.replace(values).is_some() {
            return Err(OrchestraErr::row(row, RowFailure::Duplicate));
        }
    }

    let mut data = Vec::with_capacity(dim * dim);
    for (row, slot) in slots.into_iter().enumerate() {
        let values = slot.ok_or_else(|| OrchestraErr::row(row, RowFailure::Missing))?;
        data.extend(values);
    }

    Matrix::from_vec(dim, data)
}

#[cfg(test)]
mod tests {
    use rand::seq::SliceRandom;

    use super::*;

    fn sample(dim: usize, seed: i64) -> Matrix {
        let data = (0..(dim * dim) as i64).map(|v| (v * 7 + seed) % 11 - 5).collect();
        Matrix::from_vec(dim, data).unwrap()
    }

    fn rows_of(product: &Matrix) -> Vec<RowResult> {
        (0..product.dim())
            .map(|row| RowResult {
                row,
                values: product.row(row).to_vec(),
            })
            .collect()
    }

    fn permutations(items: Vec<RowResult>) -> Vec<Vec<RowResult>> {
        if items.len() <= 1 {
            return vec![items];
        }

        let mut all = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, head.clone());
                all.push(tail);
            }
        }
        all
    }

    /// Hands rows back in a fixed order without running anything.
    struct Replay(Vec<RowResult>);

    #[async_trait]
    impl RowBackend for Replay {
        async fn compute_rows(&self, _: &Matrix, _: &Matrix) -> Result<Vec<RowResult>> {
            Ok(self.0.clone())
        }
    }

    /// Fails the way a row worker killed mid-flight does.
    struct Killed;

    #[async_trait]
    impl RowBackend for Killed {
        async fn compute_rows(&self, _: &Matrix, _: &Matrix) -> Result<Vec<RowResult>> {
            Err(OrchestraErr::row(
                3,
                RowFailure::Exited(crate::status::ExitOutcome::Signaled(9)),
            ))
        }
    }

    #[test]
    fn every_completion_order_assembles_the_same_product() {
        let (left, weight) = (sample(4, 1), sample(4, 2));
        let expected = left.multiply(&weight).unwrap();

        for order in permutations(rows_of(&expected)) {
            assert_eq!(assemble(4, order).unwrap(), expected);
        }
    }

    #[test]
    fn shuffled_rows_of_a_full_size_product_assemble() {
        let (left, weight) = (sample(8, 3), sample(8, 4));
        let expected = left.multiply(&weight).unwrap();

        let mut rows = rows_of(&expected);
        for _ in 0..32 {
            rows.shuffle(&mut rand::rng());
            assert_eq!(assemble(8, rows.clone()).unwrap(), expected);
        }
    }

    #[test]
    fn missing_row_yields_no_matrix() {
        let mut rows = rows_of(&Matrix::identity(3));
        rows.remove(1);

        let err = assemble(3, rows).unwrap_err();
        assert!(matches!(
            err,
            OrchestraErr::Row {
                row: 1,
                reason: RowFailure::Missing
            }
        ));
    }

    #[test]
    fn duplicated_row_yields_no_matrix() {
        let mut rows = rows_of(&Matrix::identity(3));
        rows[2].row = 0;

        let err = assemble(3, rows).unwrap_err();
        assert!(matches!(
            err,
            OrchestraErr::Row {
                row: 0,
                reason: RowFailure::Duplicate
            }
        ));
    }

    #[test]
    fn out_of_range_row_yields_no_matrix() {
        let mut rows = rows_of(&Matrix::identity(3));
        rows[0].row = 3;

        assert!(assemble(3, rows).is_err());
    }

    #[tokio::test]
    async fn dispatcher_uses_transmitted_indices_not_arrival_order() {
        let (left, weight) = (sample(4, 5), sample(4, 6));
        let expected = left.multiply(&weight).unwrap();

        let mut reversed = rows_of(&expected);
        reversed.reverse();

        let dispatcher = RowDispatcher::new(Box::new(Replay(reversed)));
        assert_eq!(dispatcher.multiply(&left, &weight).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn failed_row_fails_the_whole_multiplication() {
        let dispatcher = RowDispatcher::new(Box::new(Killed));
        let res = dispatcher
            .multiply(&Matrix::identity(8), &Matrix::identity(8))
            .await;

        assert!(matches!(res, Err(OrchestraErr::Row { row: 3, .. })));
    }

    #[tokio::test]
    async fn operands_of_different_sizes_are_rejected_before_fan_out() {
        let dispatcher = RowDispatcher::new(Box::new(Killed));
        let res = dispatcher
            .multiply(&Matrix::identity(2), &Matrix::identity(3))
            .await;

        assert!(matches!(res, Err(OrchestraErr::DimensionMismatch { .. })));
    }
}
