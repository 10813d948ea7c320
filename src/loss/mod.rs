pub mod cross_entropy;

pub use cross_entropy::{argmax, CrossEntropyLoss};
