//! Errors raised by the training building blocks (frames, split, metrics).
//!
//! Task bodies return `anyhow::Result`, so these convert with `?` and the
//! executor records the message as `TaskError::Body`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrainingError {
    #[error("column '{column}' not found")]
    MissingColumn { column: String },

    #[error("column '{column}' appears more than once")]
    DuplicateColumn { column: String },

    #[error("row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("column '{column}' row {row} is not numeric: {value}")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("shape mismatch: {left_rows}x{left_cols} vs {right_rows}x{right_cols}")]
    ShapeMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("cannot split {rows} rows with test_size {test_size}: one side would be empty")]
    EmptySplit { rows: usize, test_size: f64 },

    #[error("no rows to evaluate")]
    NoRows,

    #[error("record {row} is not a JSON object")]
    NotARecord { row: usize },
}
