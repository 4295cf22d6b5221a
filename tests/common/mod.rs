#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Writes `rows` in the textual matrix format and returns the file's path.
pub fn write_matrix(dir: &Path, name: &str, rows: &[&[i64]]) -> PathBuf {
    let text: String = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row.iter().map(i64::to_string).collect();
            values.join(" ") + "\n"
        })
        .collect();

    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Writes the `dim × dim` matrix holding `1..=dim²` in row-major order.
pub fn write_sequential(dir: &Path, name: &str, dim: usize) -> PathBuf {
    let rows: Vec<Vec<i64>> = (0..dim)
        .map(|r| (1..=dim as i64).map(|c| (r * dim) as i64 + c).collect())
        .collect();
    let rows: Vec<&[i64]> = rows.iter().map(Vec::as_slice).collect();
    write_matrix(dir, name, &rows)
}

/// Writes the `dim × dim` identity matrix.
pub fn write_identity(dir: &Path, name: &str, dim: usize) -> PathBuf {
    let rows: Vec<Vec<i64>> = (0..dim)
        .map(|r| (0..dim).map(|c| i64::from(r == c)).collect())
        .collect();
    let rows: Vec<&[i64]> = rows.iter().map(Vec::as_slice).collect();
    write_matrix(dir, name, &rows)
}
