//! Evaluation metrics for binary and multi-class classifiers.

pub mod confusion;
pub mod curves;

pub use confusion::ConfusionMatrix;
pub use curves::{auc, precision_recall_curve, roc_curve, Curve};
