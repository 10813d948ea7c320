//! Threshold sweeps for binary scores: ROC and precision-recall.

/// A sampled curve; `x` and `y` have equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Score threshold at each point (`+inf` for the prepended origin).
    pub thresholds: Vec<f64>,
}

/// Cumulative (false positives, true positives, threshold) at each distinct
/// score, scanning from the highest score down.
fn binary_clf_counts(labels: &[usize], scores: &[f64]) -> Vec<(f64, f64, f64)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut out = Vec::new();
    let (mut fp, mut tp) = (0.0, 0.0);
    for (pos, &i) in order.iter().enumerate() {
        if labels[i] == 1 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_run = order.get(pos + 1).map_or(true, |&next| scores[next] != scores[i]);
        if last_of_run {
            out.push((fp, tp, scores[i]));
        }
    }
    out
}

fn class_totals(labels: &[usize]) -> (usize, usize) {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    (positives, labels.len() - positives)
}

/// Receiver operating characteristic: `x` = false positive rate,
/// `y` = true positive rate, starting at (0, 0).
///
/// Label 1 is the positive class. Returns `None` when either class is absent.
pub fn roc_curve(labels: &[usize], scores: &[f64]) -> Option<Curve> {
    assert_eq!(labels.len(), scores.len(), "labels and scores must have equal length");
    let (positives, negatives) = class_totals(labels);
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut curve = Curve { x: vec![0.0], y: vec![0.0], thresholds: vec![f64::INFINITY] };
    for (fp, tp, threshold) in binary_clf_counts(labels, scores) {
        curve.x.push(fp / negatives as f64);
        curve.y.push(tp / positives as f64);
        curve.thresholds.push(threshold);
    }
    Some(curve)
}

/// Precision-recall curve: `x` = recall, `y` = precision, ordered by
/// decreasing recall and ending at (0, 1).
///
/// Points past full recall are dropped. Returns `None` without positives.
pub fn precision_recall_curve(labels: &[usize], scores: &[f64]) -> Option<Curve> {
    assert_eq!(labels.len(), scores.len(), "labels and scores must have equal length");
    let (positives, _) = class_totals(labels);
    if positives == 0 {
        return None;
    }

    let counts = binary_clf_counts(labels, scores);
    let last = counts.iter().position(|&(_, tp, _)| tp as usize == positives).unwrap_or(counts.len() - 1);

    let mut curve = Curve { x: Vec::new(), y: Vec::new(), thresholds: Vec::new() };
    for &(fp, tp, threshold) in counts[..=last].iter().rev() {
        curve.x.push(tp / positives as f64);
        curve.y.push(if tp + fp > 0.0 { tp / (tp + fp) } else { 1.0 });
        curve.thresholds.push(threshold);
    }
    curve.x.push(0.0);
    curve.y.push(1.0);
    curve.thresholds.push(f64::INFINITY);
    Some(curve)
}

/// Area under a piecewise-linear curve (trapezoidal rule).
///
/// `x` must be monotonic, in either direction; the result is non-negative.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "x and y must have equal length");
    let area: f64 = x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum();
    area.abs()
}
