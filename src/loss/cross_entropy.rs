use crate::activation::activation::softmax;

/// Categorical cross-entropy over raw logits with an integer class target.
///
/// Softmax is applied inside the loss, so the network's head stays linear.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// L = -log(softmax(logits)[target] + eps)
    pub fn loss(logits: &[f64], target: usize) -> f64 {
        let probs = softmax(logits);
        -(probs[target] + EPS).ln()
    }

    /// Gradient with respect to the logits:
    ///   ∂L/∂z_i = softmax(z)_i - 1[i == target]
    pub fn derivative(logits: &[f64], target: usize) -> Vec<f64> {
        let mut grad = softmax(logits);
        grad[target] -= 1.0;
        grad
    }
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
