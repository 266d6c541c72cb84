//! Deterministic train/test split.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::{Frame, TrainingError};

pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// The four outputs of `data_preprocess`; field names are the task's
/// declared output fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub train_feature: Frame,
    pub test_feature: Frame,
    pub train_target: Frame,
    pub test_target: Frame,
}

/// Shuffle row indices with a seeded `StdRng`; the first `ceil(n * test_size)`
/// go to the test side, the rest to the train side. Same seed, same split.
pub fn train_test_split(
    features: &Frame,
    targets: &Frame,
    test_size: f64,
    seed: u64,
) -> Result<Split, TrainingError> {
    let n = features.len();
    if targets.len() != n {
        return Err(TrainingError::ShapeMismatch {
            left_rows: n,
            left_cols: features.width(),
            right_rows: targets.len(),
            right_cols: targets.width(),
        });
    }

    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(TrainingError::EmptySplit { rows: n, test_size });
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test, train) = indices.split_at(n_test);

    Ok(Split {
        train_feature: features.take(train),
        test_feature: features.take(test),
        train_target: targets.take(train),
        test_target: targets.take(test),
    })
}
