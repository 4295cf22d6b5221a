use std::panic::{self, AssertUnwindSafe};

use async_trait::async_trait;
use comms::row::RowResult;
use parking_lot::Mutex;
use tokio::task;

use super::RowBackend;
use crate::{
    error::{OrchestraErr, Result, RowFailure},
    matrix::Matrix,
};

/// Runs every row as a rayon task inside the current process.
///
/// Rows push into one shared accumulator guarded by a mutex. The whole fan-out
/// runs on tokio's blocking pool so the runtime is never stalled.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRows;

impl ThreadRows {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RowBackend for ThreadRows {
    async fn compute_rows(&self, left: &Matrix, weight: &Matrix) -> Result<Vec<RowResult>> {
        let (left, weight) = (left.clone(), weight.clone());

        task::spawn_blocking(move || fan_out(&left, &weight))
            .await
            .map_err(|e| OrchestraErr::Io(std::io::Error::other(e)))?
    }
}

fn fan_out(left: &Matrix, weight: &Matrix) -> Result<Vec<RowResult>> {
    let dim = left.dim();
    let rows = Mutex::new(Vec::with_capacity(dim));
    let panics = Mutex::new(Vec::new());

    rayon::scope(|s| {
        for row in 0..dim {
            let (rows, panics) = (&rows, &panics);

            s.spawn(move |_| {
                match panic::catch_unwind(AssertUnwindSafe(|| left.row_product(weight, row))) {
                    Ok(values) => rows.lock().push(RowResult { row, values }),
                    Err(payload) => panics.lock().push((row, panic_message(payload))),
                }
            });
        }
    });

    if let Some((row, msg)) = panics.into_inner().into_iter().min_by_key(|(row, _)| *row) {
        return Err(OrchestraErr::row(row, RowFailure::Panicked(msg)));
    }

    Ok(rows.into_inner())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .unwrap_or_else(|| "unknown panic".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::RowDispatcher;

    fn sample(dim: usize) -> Matrix {
        let data = (0..(dim * dim) as i64).map(|v| v % 5 - 2).collect();
        Matrix::from_vec(dim, data).unwrap()
    }

    #[tokio::test]
    async fn one_result_per_row_each_tagged_with_its_index() {
        let (left, weight) = (sample(6), Matrix::identity(6));
        let mut rows = ThreadRows.compute_rows(&left, &weight).await.unwrap();
        rows.sort_by_key(|r| r.row);

        let indices: Vec<usize> = rows.iter().map(|r| r.row).collect();
        assert_eq!(indices, (0..6).collect::<Vec<_>>());
        for r in rows {
            assert_eq!(r.values, left.row(r.row));
        }
    }

    #[tokio::test]
    async fn dispatch_matches_the_single_threaded_product() {
        let (left, weight) = (sample(8), sample(8));
        let dispatcher = RowDispatcher::new(Box::new(ThreadRows::new()));

        assert_eq!(
            dispatcher.multiply(&left, &weight).await.unwrap(),
            left.multiply(&weight).unwrap()
        );
    }

    #[test]
    fn panic_payloads_keep_their_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(3)), "unknown panic");
    }
}
