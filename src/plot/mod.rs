pub mod canvas;
pub mod charts;

pub use charts::{
    plot_test_metrics, plot_training_loss, render_confusion_matrix, render_loss_curves, render_pr, render_roc,
    save_png, TestMetrics,
};
