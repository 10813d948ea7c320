use serde::{Deserialize, Serialize};

/// Confusion matrix; rows are true classes, columns predicted classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub num_classes: usize,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        ConfusionMatrix { num_classes, matrix: vec![vec![0; num_classes]; num_classes] }
    }

    /// Labels outside `0..num_classes` are ignored.
    pub fn from_predictions(predictions: &[usize], ground_truth: &[usize], num_classes: usize) -> Self {
        assert_eq!(predictions.len(), ground_truth.len(), "predictions and ground truth must have same length");
        let mut cm = ConfusionMatrix::new(num_classes);
        for (&pred, &truth) in predictions.iter().zip(ground_truth) {
            if pred < num_classes && truth < num_classes {
                cm.matrix[truth][pred] += 1;
            }
        }
        cm
    }

    /// Binary matrix from positive-class scores: predicted 1 iff `score > threshold`.
    pub fn from_scores(scores: &[f64], ground_truth: &[usize], threshold: f64) -> Self {
        let predictions: Vec<usize> = scores.iter().map(|&s| usize::from(s > threshold)).collect();
        ConfusionMatrix::from_predictions(&predictions, ground_truth, 2)
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.num_classes).map(|i| self.matrix[i][i]).sum();
        correct as f64 / total as f64
    }

    /// Each row divided by its sum; empty rows stay all zero.
    pub fn normalize_rows(&self) -> Vec<Vec<f64>> {
        self.matrix.iter()
            .map(|row| {
                let sum: usize = row.iter().sum();
                row.iter()
                    .map(|&v| if sum == 0 { 0.0 } else { v as f64 / sum as f64 })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_land_in_truth_rows() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 1, 2], &[0, 1, 2, 2], 3);
        assert_eq!(cm.matrix[0][0], 1);
        assert_eq!(cm.matrix[1][1], 1);
        assert_eq!(cm.matrix[2][1], 1);
        assert_eq!(cm.matrix[2][2], 1);
        assert_eq!(cm.total(), 4);
        assert!((cm.accuracy() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn scores_threshold_is_strict() {
        let cm = ConfusionMatrix::from_scores(&[0.5, 0.51, 0.2, 0.9], &[0, 1, 1, 0], 0.5);
        assert_eq!(cm.matrix, vec![vec![1, 1], vec![1, 1]]);
    }

    #[test]
    fn normalized_rows_sum_to_one() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1], &[0, 0, 0, 1], 3);
        let norm = cm.normalize_rows();
        assert!((norm[0][0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((norm[0].iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(norm[2], vec![0.0, 0.0, 0.0]);
    }
}
