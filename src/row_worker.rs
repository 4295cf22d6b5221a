use comms::row::{RowResult, RowTask};
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    error::{OrchestraErr, Result},
    matrix::{Matrix, row_times},
};

/// Serves exactly one row: reads a `RowTask`, answers with its `RowResult`.
///
/// # Errors
/// `Protocol` if the task is truncated, `Io` if the result cannot be written.
pub async fn run<R, W>(dim: usize, rx: &mut R, tx: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let task = RowTask::read_from(rx, dim)
        .await
        .map_err(OrchestraErr::Protocol)?;

    let weight = Matrix::from_vec(dim, task.weight)?;
    let values = row_times(&task.left_row, &weight);
    debug!(row = task.row; "row computed");

    RowResult {
        row: task.row,
        values,
    }
    .write_to(tx)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn answers_with_the_row_it_was_given() {
        let (mut task_tx, mut task_rx) = tokio::io::duplex(1024);
        let (mut result_tx, mut result_rx) = tokio::io::duplex(1024);

        let weight = Matrix::from_vec(2, vec![5, 6, 7, 8]).unwrap();
        RowTask {
            row: 1,
            left_row: vec![3, 4],
            weight: weight.as_slice().to_vec(),
        }
        .write_to(&mut task_tx)
        .await
        .unwrap();
        task_tx.shutdown().await.unwrap();

        run(2, &mut task_rx, &mut result_tx).await.unwrap();
        drop(result_tx);

        let mut bytes = Vec::new();
        result_rx.read_to_end(&mut bytes).await.unwrap();

        let result = RowResult::decode(&bytes, 2).unwrap().unwrap();
        assert_eq!(result.row, 1);
        assert_eq!(result.values, vec![43, 50]);
    }

    #[tokio::test]
    async fn truncated_task_writes_nothing() {
        let (mut task_tx, mut task_rx) = tokio::io::duplex(64);
        let (mut result_tx, mut result_rx) = tokio::io::duplex(64);

        task_tx.write_all(&[0; 8]).await.unwrap();
        drop(task_tx);

        let err = run(2, &mut task_rx, &mut result_tx).await.unwrap_err();
        assert!(matches!(err, OrchestraErr::Protocol(_)));
        drop(result_tx);

        let mut bytes = Vec::new();
        result_rx.read_to_end(&mut bytes).await.unwrap();
        assert!(RowResult::decode(&bytes, 2).unwrap().is_none());
    }
}
