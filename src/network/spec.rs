use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{Error, Result};
use crate::layers::dense::Layer;
use crate::network::network::Network;

/// Name given to the classifier layer. Checkpoint filtering and
/// `--freeze-layers` both key on it.
pub const HEAD_NAME: &str = "head";

/// Named architecture presets, selected with `--model-config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// One hidden layer of 16 units.
    MlpTiny,
    /// One hidden layer of 64 units.
    MlpSmall,
    /// Two hidden layers (128, 64) with GELU.
    MlpBase,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::MlpTiny => "mlp-tiny",
            ModelKind::MlpSmall => "mlp-small",
            ModelKind::MlpBase => "mlp-base",
        }
    }

    fn hidden(&self) -> Vec<usize> {
        match self {
            ModelKind::MlpTiny => vec![16],
            ModelKind::MlpSmall => vec![64],
            ModelKind::MlpBase => vec![128, 64],
        }
    }

    fn activation(&self) -> ActivationFunction {
        match self {
            ModelKind::MlpBase => ActivationFunction::Gelu,
            _ => ActivationFunction::ReLU,
        }
    }
}

/// A fully serializable description of a classifier architecture.
///
/// Hidden layers are named `layers.0`, `layers.1`, ... and the final
/// classifier is named `head`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    /// Flattened input length (`channels * image_size * image_size`).
    pub input_size: usize,
    pub hidden: Vec<usize>,
    pub num_classes: usize,
    pub activation: ActivationFunction,
}

impl NetworkSpec {
    pub fn for_model(kind: ModelKind, input_size: usize, num_classes: usize) -> Result<NetworkSpec> {
        if input_size == 0 {
            return Err(Error::invalid_config("model input size must be positive"));
        }
        if num_classes < 2 {
            return Err(Error::invalid_config(format!(
                "num_classes must be at least 2 (got {})", num_classes
            )));
        }
        Ok(NetworkSpec {
            name: kind.name().to_string(),
            input_size,
            hidden: kind.hidden(),
            num_classes,
            activation: kind.activation(),
        })
    }

    /// Instantiates the network with He-initialised weights drawn from `rng`.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Network {
        let mut layers = Vec::with_capacity(self.hidden.len() + 1);
        let mut fan_in = self.input_size;
        for (i, &size) in self.hidden.iter().enumerate() {
            layers.push(Layer::new(format!("layers.{}", i), size, fan_in, self.activation, rng));
            fan_in = size;
        }
        layers.push(Layer::new(HEAD_NAME, self.num_classes, fan_in, ActivationFunction::Identity, rng));
        Network::new(layers)
    }
}
