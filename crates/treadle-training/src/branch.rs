//! The routing rule of the `branching` task.

use treadle_core::BranchResult;

use crate::Metrics;
use crate::pipeline::{COLLECT_METRIC, FAILURE, SAVE, SEND_RESULT};

pub const DEFAULT_MSE_THRESHOLD: f64 = 50.0;

/// `mse_score > threshold` routes to save/send_result/collect_metric,
/// anything else to `failure`.
///
/// The comparison is kept exactly as the production pipeline has it, even
/// though a high error reading as the success path looks inverted. Confirm
/// intent before changing it.
pub fn decide(metrics: &Metrics, threshold: f64) -> BranchResult {
    if metrics.mse_score > threshold {
        BranchResult::new([SAVE, SEND_RESULT, COLLECT_METRIC])
    } else {
        BranchResult::one(FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn metrics(mse_score: f64) -> Metrics {
        Metrics {
            r2_score: 0.5,
            mse_score,
            pos_max_err: 1.0,
            neg_max_err: -1.0,
        }
    }

    // Under scrutiny: large error selects the save path. Kept literal.
    #[rstest]
    #[case::above(60.0, true)]
    #[case::below(10.0, false)]
    #[case::at_threshold_is_not_above(50.0, false)]
    #[case::perfect_model(0.0, false)]
    fn literal_greater_than_comparison(#[case] mse: f64, #[case] save_path: bool) {
        let result = decide(&metrics(mse), DEFAULT_MSE_THRESHOLD);

        assert_eq!(result.contains(SAVE), save_path);
        assert_eq!(result.contains(SEND_RESULT), save_path);
        assert_eq!(result.contains(COLLECT_METRIC), save_path);
        assert_eq!(result.contains(FAILURE), !save_path);
    }

    #[test]
    fn threshold_is_configurable() {
        assert!(decide(&metrics(10.0), 5.0).contains(SAVE));
    }

    #[test]
    fn failure_path_serializes_as_a_list() {
        let v = serde_json::to_value(decide(&metrics(0.0), 50.0)).unwrap();
        assert_eq!(v, serde_json::json!(["failure"]));
    }
}
