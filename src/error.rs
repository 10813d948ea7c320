use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by dataset scanning, transforms, checkpoints and training.
#[derive(Debug, Error)]
pub enum Error {
    /// `root/<split>` does not exist.
    #[error("dataset split not found: {}", path.display())]
    SplitNotFound { split: String, path: PathBuf },

    /// The split exists but contains no image with a supported extension.
    #[error("number of {split} images must be greater than 0 (scanned {})", path.display())]
    EmptyDataset { split: String, path: PathBuf },

    /// The decoded image has a channel layout the transform was not built for.
    /// `path` is `None` when the image was handed over already decoded.
    #[error("{} has unsupported mode {found} (expected {expected} channel(s))", image_label(path.as_deref()))]
    UnsupportedImageMode {
        path: Option<PathBuf>,
        found: String,
        expected: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to scan dataset: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    pub fn shape_mismatch(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        Error::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

fn image_label(path: Option<&Path>) -> String {
    match path {
        Some(path) => format!("image {}", path.display()),
        None => "decoded image".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_mode_message_names_the_source() {
        let with_path = Error::UnsupportedImageMode { path: Some("a/cat.png".into()), found: "RGBA".into(), expected: 3 };
        assert_eq!(with_path.to_string(), "image a/cat.png has unsupported mode RGBA (expected 3 channel(s))");
        let decoded = Error::UnsupportedImageMode { path: None, found: "L".into(), expected: 3 };
        assert_eq!(decoded.to_string(), "decoded image has unsupported mode L (expected 3 channel(s))");
    }
}
