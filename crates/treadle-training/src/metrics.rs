//! Regression metrics for multi-output predictions.

use serde::{Deserialize, Serialize};

use crate::{Frame, TrainingError};

/// Output of the `evaluate` task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Coefficient of determination, averaged over target columns.
    pub r2_score: f64,
    /// Mean squared error, averaged over target columns.
    pub mse_score: f64,
    /// Largest `prediction - target` over every cell.
    pub pos_max_err: f64,
    /// Smallest `prediction - target` over every cell.
    pub neg_max_err: f64,
}

pub fn evaluate(target: &Frame, prediction: &Frame) -> Result<Metrics, TrainingError> {
    let y = target.to_matrix()?;
    let y_hat = prediction.to_matrix()?;
    evaluate_matrix(&y, &y_hat)
}

pub fn evaluate_matrix(y: &[Vec<f64>], y_hat: &[Vec<f64>]) -> Result<Metrics, TrainingError> {
    let rows = y.len();
    let cols = y.first().map_or(0, Vec::len);
    let pred_cols = y_hat.first().map_or(0, Vec::len);
    if rows != y_hat.len() || cols != pred_cols {
        return Err(TrainingError::ShapeMismatch {
            left_rows: rows,
            left_cols: cols,
            right_rows: y_hat.len(),
            right_cols: pred_cols,
        });
    }
    if rows == 0 || cols == 0 {
        return Err(TrainingError::NoRows);
    }
    for matrix in [y, y_hat] {
        if let Some((row, values)) = matrix.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(TrainingError::RaggedRow {
                row,
                expected: cols,
                actual: values.len(),
            });
        }
    }

    let mut r2_total = 0.0;
    let mut mse_total = 0.0;
    for c in 0..cols {
        let mean = y.iter().map(|r| r[c]).sum::<f64>() / rows as f64;
        let ss_res: f64 = y.iter().zip(y_hat).map(|(t, p)| (t[c] - p[c]).powi(2)).sum();
        let ss_tot: f64 = y.iter().map(|t| (t[c] - mean).powi(2)).sum();

        mse_total += ss_res / rows as f64;
        // constant target column: perfect is 1, anything else 0
        r2_total += if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };
    }

    let errors = y
        .iter()
        .zip(y_hat)
        .flat_map(|(t, p)| t.iter().zip(p).map(|(t, p)| p - t));
    let (pos_max_err, neg_max_err) = errors.fold((f64::MIN, f64::MAX), |(hi, lo), e| {
        (hi.max(e), lo.min(e))
    });

    Ok(Metrics {
        r2_score: r2_total / cols as f64,
        mse_score: mse_total / cols as f64,
        pos_max_err,
        neg_max_err,
    })
}
