pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod checkpoint;
pub mod metrics;
pub mod plot;
pub mod config;
pub mod train;
pub mod error;

// Convenience re-exports
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::network::Network;
pub use network::spec::{ModelKind, NetworkSpec};
pub use loss::cross_entropy::CrossEntropyLoss;
pub use optim::{get_params_groups, LrScheduler, OptimizerKind, WarmupCosine};
pub use data::{ImageTransform, LetterboxGeometry, Mode, NormalizationStats, ResizeStrategy, ChannelPolicy};
pub use config::RunConfig;
pub use train::{evaluate_checkpoint, fit};
pub use error::{Error, Result};
