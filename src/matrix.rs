use std::{fmt, num::NonZeroUsize, path::Path};

use crate::error::{OrchestraErr, Result};

/// The dimension used when none is configured.
pub const DEFAULT_DIM: NonZeroUsize = NonZeroUsize::new(8).unwrap();

/// A square, row-major grid of integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    dim: usize,
    data: Vec<i64>,
}

impl Matrix {
    /// Creates a `dim × dim` matrix filled with zeros.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0; dim * dim],
        }
    }

    /// Creates the `dim × dim` identity matrix.
    pub fn identity(dim: usize) -> Self {
        let mut matrix = Self::zeros(dim);
        for i in 0..dim {
            matrix.data[i * dim + i] = 1;
        }
        matrix
    }

    /// Wraps row-major `data` as a `dim × dim` matrix.
    ///
    /// # Errors
    /// `DimensionMismatch` if `data` does not hold exactly `dim * dim` values.
    pub fn from_vec(dim: usize, data: Vec<i64>) -> Result<Self> {
        if data.len() != dim * dim {
            return Err(OrchestraErr::DimensionMismatch {
                expected: dim * dim,
                got: data.len(),
            });
        }

        Ok(Self { dim, data })
    }

    /// Parses the textual matrix format.
    ///
    /// Line `i` holds row `i` as whitespace separated integers. Missing values and
    /// missing lines are zeros, anything past `dim` lines or `dim` values on a line
    /// is ignored.
    pub fn parse(dim: usize, text: &str) -> Result<Self> {
        let mut matrix = Self::zeros(dim);

        for (i, line) in text.lines().take(dim).enumerate() {
            for (j, token) in line.split_whitespace().take(dim).enumerate() {
                matrix.data[i * dim + j] =
                    token.parse().map_err(|_| OrchestraErr::MatrixParse {
                        path: None,
                        line: i + 1,
                        token: token.to_string(),
                    })?;
            }
        }

        Ok(matrix)
    }

    /// Reads and parses the matrix stored at `path`.
    pub async fn load(dim: usize, path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OrchestraErr::matrix_file(path, e))?;

        Self::parse(dim, &text).map_err(|e| match e {
            OrchestraErr::MatrixParse { line, token, .. } => OrchestraErr::MatrixParse {
                path: Some(path.to_path_buf()),
                line,
                token,
            },
            other => other,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the row-major values.
    pub fn as_slice(&self) -> &[i64] {
        &self.data
    }

    /// Returns row `r`.
    ///
    /// # Panics
    /// If `r` is not below the dimension.
    pub fn row(&self, r: usize) -> &[i64] {
        &self.data[r * self.dim..(r + 1) * self.dim]
    }

    /// Computes row `r` of `self × weight`.
    pub fn row_product(&self, weight: &Matrix, r: usize) -> Vec<i64> {
        row_times(self.row(r), weight)
    }

    /// Computes `self × weight` in a single thread.
    pub fn multiply(&self, weight: &Matrix) -> Result<Matrix> {
        if self.dim != weight.dim {
            return Err(OrchestraErr::DimensionMismatch {
                expected: self.dim,
                got: weight.dim,
            });
        }

        let data = (0..self.dim)
            .flat_map(|r| self.row_product(weight, r))
            .collect();

        Ok(Self {
            dim: self.dim,
            data,
        })
    }
}

/// Computes `left_row × weight`, the dot product of one row against every column.
pub fn row_times(left_row: &[i64], weight: &Matrix) -> Vec<i64> {
    let dim = weight.dim;

    (0..dim)
        .map(|col| {
            left_row
                .iter()
                .enumerate()
                .map(|(k, &l)| l * weight.data[k * dim + col])
                .sum()
        })
        .collect()
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for r in 0..self.dim {
            for value in self.row(r) {
                write!(f, " {value}")?;
            }
            writeln!(f)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(dim: usize) -> Matrix {
        Matrix::from_vec(dim, (1..=(dim * dim) as i64).collect()).unwrap()
    }

    #[test]
    fn short_row_is_zero_filled() {
        let m = Matrix::parse(4, "1 2\n3 4 5 6\n").unwrap();
        assert_eq!(m.row(0), &[1, 2, 0, 0]);
        assert_eq!(m.row(1), &[3, 4, 5, 6]);
        assert_eq!(m.row(2), &[0, 0, 0, 0]);
    }

    #[test]
    fn extra_lines_and_values_are_ignored() {
        let m = Matrix::parse(2, "1 2 9\n3 4\n5 6\n").unwrap();
        assert_eq!(m.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn tabs_and_negative_values_parse() {
        let m = Matrix::parse(2, "-1\t2\n  3   -4").unwrap();
        assert_eq!(m.as_slice(), &[-1, 2, 3, -4]);
    }

    #[test]
    fn non_integer_token_reports_its_line() {
        let err = Matrix::parse(2, "1 2\n3 x\n").unwrap_err();
        assert!(matches!(
            err,
            OrchestraErr::MatrixParse { line: 2, ref token, .. } if token == "x"
        ));
    }

    #[test]
    fn identity_leaves_left_operand_unchanged() {
        let left = sequential(8);
        assert_eq!(left.multiply(&Matrix::identity(8)).unwrap(), left);
    }

    #[test]
    fn row_product_matches_hand_computed_values() {
        // [1 2] [5 6]   [19 22]
        // [3 4] [7 8] = [43 50]
        let left = sequential(2);
        let weight = Matrix::from_vec(2, vec![5, 6, 7, 8]).unwrap();

        assert_eq!(left.row_product(&weight, 0), vec![19, 22]);
        assert_eq!(left.row_product(&weight, 1), vec![43, 50]);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let err = Matrix::zeros(2).multiply(&Matrix::zeros(3)).unwrap_err();
        assert!(matches!(
            err,
            OrchestraErr::DimensionMismatch {
                expected: 2,
                got: 3
            }
        ));
    }

    #[tokio::test]
    async fn missing_file_names_the_path() {
        let err = Matrix::load(8, Path::new("/nonexistent/w.txt"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/w.txt"));
    }

    #[test]
    fn display_prints_one_line_per_row() {
        let shown = sequential(2).to_string();
        assert_eq!(shown, "[\n 1 2\n 3 4\n]");
    }
}
