use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::transform::{ChannelPolicy, ResizeStrategy};
use crate::error::{Error, Result};
use crate::network::spec::ModelKind;
use crate::optim::OptimizerKind;

/// Every hyperparameter of a training run.
///
/// Missing JSON fields take the defaults below, so a config file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub num_classes: usize,
    pub epochs: usize,
    pub batch_size: usize,
    /// Worker threads for decoding, augmentation and gradients; 0 = one per core.
    pub num_workers: usize,
    pub lr: f64,
    pub weight_decay: f64,
    /// Dataset root holding `train/` and `val/`.
    pub data_path: PathBuf,
    pub weights_dir: PathBuf,
    pub results_dir: PathBuf,
    pub model_config: ModelKind,
    /// Initial weights; entries whose name contains `head` are dropped.
    pub pretrained: Option<PathBuf>,
    /// Train only the classifier head.
    pub freeze_layers: bool,
    pub device: String,
    pub warmup: bool,
    pub warmup_epochs: usize,
    pub image_size: u32,
    pub channels: usize,
    pub strategy: ResizeStrategy,
    pub channel_policy: ChannelPolicy,
    pub optimizer: OptimizerKind,
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_classes: 2,
            epochs: 100,
            batch_size: 16,
            num_workers: 8,
            lr: 5e-4,
            weight_decay: 5e-2,
            data_path: PathBuf::from("dataset/Task3clsAug"),
            weights_dir: PathBuf::from("weights"),
            results_dir: PathBuf::from("results"),
            model_config: ModelKind::MlpBase,
            pretrained: None,
            freeze_layers: false,
            device: "cpu".to_string(),
            warmup: true,
            warmup_epochs: 5,
            image_size: 224,
            channels: 3,
            strategy: ResizeStrategy::Letterbox,
            channel_policy: ChannelPolicy::Strict,
            optimizer: OptimizerKind::AdamW,
            seed: 0,
        }
    }
}

impl RunConfig {
    /// Rejects values no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.num_classes < 2 {
            return Err(Error::invalid_config(format!("num_classes must be at least 2 (got {})", self.num_classes)));
        }
        if self.epochs == 0 {
            return Err(Error::invalid_config("epochs must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_config("batch_size must be at least 1"));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::invalid_config(format!("lr must be positive (got {})", self.lr)));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(Error::invalid_config(format!("weight_decay must be non-negative (got {})", self.weight_decay)));
        }
        if self.image_size == 0 {
            return Err(Error::invalid_config("image_size must be positive"));
        }
        if !matches!(self.channels, 1 | 3) {
            return Err(Error::invalid_config(format!("channels must be 1 or 3 (got {})", self.channels)));
        }
        if self.warmup && self.warmup_epochs >= self.epochs {
            return Err(Error::invalid_config(format!(
                "warmup_epochs ({}) must be smaller than epochs ({})", self.warmup_epochs, self.epochs
            )));
        }
        Ok(())
    }

    /// Where the effective config of this run is written.
    pub fn output_path(&self) -> PathBuf {
        self.results_dir.join(format!("{}_config.json", self.model_config.name()))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<RunConfig> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}
