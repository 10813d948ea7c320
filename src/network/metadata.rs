use serde::{Deserialize, Serialize};

use crate::data::stats::NormalizationStats;
use crate::data::transform::ResizeStrategy;
use crate::error::{Error, Result};
use crate::network::spec::ModelKind;

/// How the flattened network input was produced from an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InputType {
    /// Grayscale image letterboxed or cropped to `size × size`.
    ImageGrayscale { size: u32 },
    /// RGB image letterboxed or cropped to `size × size`, channel-major.
    ImageRgb { size: u32 },
}

impl InputType {
    pub fn from_channels(channels: usize, size: u32) -> Result<InputType> {
        match channels {
            1 => Ok(InputType::ImageGrayscale { size }),
            3 => Ok(InputType::ImageRgb { size }),
            n => Err(Error::invalid_config(format!("channels must be 1 or 3 (got {})", n))),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            InputType::ImageGrayscale { .. } => 1,
            InputType::ImageRgb { .. } => 3,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            InputType::ImageGrayscale { size } | InputType::ImageRgb { size } => *size,
        }
    }

    /// Length of the flattened `C × size × size` input.
    pub fn input_size(&self) -> usize {
        self.channels() * (self.size() as usize).pow(2)
    }
}

/// Annotations stored next to the weights in a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model: ModelKind,
    pub input_type: InputType,
    #[serde(default)]
    pub strategy: ResizeStrategy,
    /// Training-split statistics every later transform must reuse.
    pub normalization: NormalizationStats,
    /// Class names in id order, as read from the training split.
    pub output_labels: Vec<String>,
    /// 1-based epoch the weights were saved after.
    pub epoch: usize,
    #[serde(default)]
    pub val_accuracy: Option<f64>,
}

impl ModelMetadata {
    /// Checks that the stored statistics and input type describe the same input.
    pub fn validate(&self) -> Result<()> {
        if self.input_type.size() == 0 {
            return Err(Error::invalid_config("metadata input size must be positive"));
        }
        if self.normalization.channels() != self.input_type.channels() {
            return Err(Error::invalid_config(format!(
                "metadata normalization has {} channel(s) but the input type has {}",
                self.normalization.channels(),
                self.input_type.channels()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(stats_channels: usize) -> ModelMetadata {
        ModelMetadata {
            model: ModelKind::MlpTiny,
            input_type: InputType::ImageRgb { size: 8 },
            strategy: ResizeStrategy::Letterbox,
            normalization: NormalizationStats::uniform(stats_channels, 0.5, 0.5).unwrap(),
            output_labels: vec!["cat".into(), "dog".into()],
            epoch: 1,
            val_accuracy: None,
        }
    }

    #[test]
    fn matching_channels_validate() {
        metadata(3).validate().unwrap();
    }

    #[test]
    fn channel_count_mismatch_is_rejected() {
        let err = metadata(1).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(ref msg) if msg.contains("1 channel(s)")), "{err}");
    }
}
