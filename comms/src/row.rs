//! Fixed-size messages exchanged between a row dispatcher and its row workers.
//!
//! Both ends live on the same host, so words travel in native byte order and no
//! length header is needed: the dimension is known to both sides up front.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

type Word = i64;
const WORD_SIZE: usize = size_of::<Word>();

/// The work handed to a single row worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowTask {
    pub row: usize,
    pub left_row: Vec<i64>,
    pub weight: Vec<i64>,
}

/// The product row a row worker sends back, tagged with the row it computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    pub row: usize,
    pub values: Vec<i64>,
}

impl RowTask {
    /// The amount of words in a task for the given dimension.
    pub fn words(dim: usize) -> usize {
        1 + dim + dim * dim
    }

    /// Writes the task into `tx` and flushes it.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, tx: &mut W) -> io::Result<()> {
        let mut words = Vec::with_capacity(1 + self.left_row.len() + self.weight.len());
        words.push(self.row as Word);
        words.extend_from_slice(&self.left_row);
        words.extend_from_slice(&self.weight);

        tx.write_all(bytemuck::cast_slice(words.as_slice())).await?;
        tx.flush().await
    }

    /// Reads exactly one task for a `dim` sized matrix from `rx`.
    ///
    /// # Errors
    /// `UnexpectedEof` if the stream ends before the whole task arrived.
    pub async fn read_from<R: AsyncRead + Unpin>(rx: &mut R, dim: usize) -> io::Result<Self> {
        let mut words = vec![0 as Word; Self::words(dim)];
        rx.read_exact(bytemuck::cast_slice_mut(words.as_mut_slice())).await?;

        let row = index(words[0], dim)?;
        let left_row = words[1..=dim].to_vec();
        let weight = words[1 + dim..].to_vec();

        Ok(Self {
            row,
            left_row,
            weight,
        })
    }
}

impl RowResult {
    /// The amount of words in a result for the given dimension.
    pub fn words(dim: usize) -> usize {
        1 + dim
    }

    /// Writes the result into `tx` and flushes it.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, tx: &mut W) -> io::Result<()> {
        let mut words = Vec::with_capacity(1 + self.values.len());
        words.push(self.row as Word);
        words.extend_from_slice(&self.values);

        tx.write_all(bytemuck::cast_slice(words.as_slice())).await?;
        tx.flush().await
    }

    /// Decodes everything a row worker wrote to its channel.
    ///
    /// # Returns
    /// `None` if the worker wrote nothing at all, the decoded result otherwise.
    ///
    /// # Errors
    /// `UnexpectedEof` if the output is shorter than a result, `InvalidData` if
    /// it is longer or names a row outside of `0..dim`.
    pub fn decode(bytes: &[u8], dim: usize) -> io::Result<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }

        let expected = Self::words(dim) * WORD_SIZE;

        if bytes.len() < expected {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("truncated row result, got {} of {expected} bytes", bytes.len()),
            ));
        }

        if bytes.len() > expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("oversized row result, got {} of {expected} bytes", bytes.len()),
            ));
        }

        let mut words = vec![0 as Word; Self::words(dim)];
        bytemuck::cast_slice_mut::<Word, u8>(words.as_mut_slice()).copy_from_slice(bytes);

        let row = index(words[0], dim)?;
        words.remove(0);

        Ok(Some(Self { row, values: words }))
    }
}

fn index(word: Word, dim: usize) -> io::Result<usize> {
    usize::try_from(word)
        .ok()
        .filter(|&row| row < dim)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("row index {word} is outside of 0..{dim}"),
            )
        })
}
