use crate::{
    error::{OrchestraErr, Result},
    matrix::Matrix,
};

/// The ordered, append-only record of every product a matrix worker computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultBuffer {
    dim: usize,
    blocks: Vec<Matrix>,
}

impl ResultBuffer {
    /// Creates an empty buffer for `dim × dim` result blocks.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            blocks: Vec::new(),
        }
    }

    /// Appends the next result block.
    ///
    /// # Errors
    /// `DimensionMismatch` if the block's dimension differs from the buffer's.
    pub fn push(&mut self, block: Matrix) -> Result<()> {
        if block.dim() != self.dim {
            return Err(OrchestraErr::DimensionMismatch {
                expected: self.dim,
                got: block.dim(),
            });
        }

        self.blocks.push(block);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Matrix] {
        &self.blocks
    }

    /// Returns every block's values concatenated in append order.
    pub fn flatten(&self) -> Vec<i64> {
        self.blocks
            .iter()
            .flat_map(|block| block.as_slice().iter().copied())
            .collect()
    }
}
