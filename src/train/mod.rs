pub mod epoch_stats;
pub mod loop_fn;
pub mod trainer;

pub use epoch_stats::EpochStats;
pub use loop_fn::{evaluate, train_one_epoch, EpochResult, EvalOutput};
pub use trainer::{evaluate_checkpoint, fit, TestOptions, TestReport, TrainSummary};
