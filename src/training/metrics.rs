use ndarray::Array2;
use serde::Serialize;

/// Classification quality over one evaluation pass. Precision, recall and F1
/// are support-weighted averages over the classes present in the targets;
/// a class with no predictions contributes zero precision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
    /// Rows are true classes, columns are predicted classes.
    pub confusion: Array2<usize>,
}

impl ClassificationMetrics {
    pub fn compute(targets: &[usize], predictions: &[usize], classes: usize) -> Self {
        let mut confusion = Array2::<usize>::zeros((classes, classes));
        for (&t, &p) in targets.iter().zip(predictions) {
            if t < classes && p < classes {
                confusion[[t, p]] += 1;
            }
        }

        let support: usize = confusion.sum();
        if support == 0 {
            return Self {
                accuracy: 0.0,
                precision: 0.0,
                recall: 0.0,
                f1: 0.0,
                support,
                confusion,
            };
        }

        let correct: usize = (0..classes).map(|c| confusion[[c, c]]).sum();
        let mut precision = 0.0f64;
        let mut recall = 0.0f64;
        let mut f1 = 0.0f64;
        for class in 0..classes {
            let actual: usize = confusion.row(class).sum();
            if actual == 0 {
                continue;
            }
            let predicted: usize = confusion.column(class).sum();
            let tp = confusion[[class, class]] as f64;
            let p = ratio(tp, predicted as f64);
            let r = ratio(tp, actual as f64);
            let weight = actual as f64 / support as f64;
            precision += weight * p;
            recall += weight * r;
            f1 += weight * ratio(2.0 * p * r, p + r);
        }

        Self {
            accuracy: correct as f32 / support as f32,
            precision: precision as f32,
            recall: recall as f32,
            f1: f1 as f32,
            support,
            confusion,
        }
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_predictions_score_one() {
        let targets = [0, 1, 2, 2, 1];
        let metrics = ClassificationMetrics::compute(&targets, &targets, 3);
        assert_eq!(metrics.accuracy, 1.0);
        assert_abs_diff_eq!(metrics.f1, 1.0, epsilon = 1e-6);
        assert_eq!(metrics.confusion[[2, 2]], 2);
    }

    #[test]
    fn weighted_scores_follow_support() {
        // class 0: 3 samples, all right; class 1: 1 sample, predicted as 0
        let targets = [0, 0, 0, 1];
        let predictions = [0, 0, 0, 0];
        let metrics = ClassificationMetrics::compute(&targets, &predictions, 2);

        assert_abs_diff_eq!(metrics.accuracy, 0.75, epsilon = 1e-6);
        assert_abs_diff_eq!(metrics.recall, 0.75, epsilon = 1e-6);
        // class 0 precision 0.75, class 1 precision 0 (never predicted)
        assert_abs_diff_eq!(metrics.precision, 0.5625, epsilon = 1e-6);
        // class 0 f1 = 2*0.75/(1.75)
        assert_abs_diff_eq!(metrics.f1, 0.75 * (1.5 / 1.75), epsilon = 1e-6);
        assert_eq!(metrics.confusion[[1, 0]], 1);
    }

    #[test]
    fn empty_evaluation_is_zero() {
        let metrics = ClassificationMetrics::compute(&[], &[], 8);
        assert_eq!(metrics.support, 0);
        assert_eq!(metrics.f1, 0.0);
        assert_eq!(metrics.confusion.dim(), (8, 8));
    }
}
