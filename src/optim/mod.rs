pub mod adamw;
pub mod param_groups;
pub mod scheduler;
pub mod sgd;

use std::collections::HashMap;

use serde::{Serialize, Deserialize};

use crate::network::network::{Gradients, Network};

pub use adamw::AdamW;
pub use param_groups::{get_params_groups, NamedParameters, ParamGroup, ParamInfo};
pub use scheduler::{LrScheduler, WarmupCosine};
pub use sgd::Sgd;

/// Applies one parameter update given averaged gradients and the learning
/// rate scheduled for this step.
pub trait Optimizer {
    fn step(&mut self, network: &mut Network, grads: &Gradients, lr: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerKind {
    #[serde(rename = "adamw")]
    #[value(name = "adamw")]
    AdamW,
    Sgd,
}

impl OptimizerKind {
    pub fn build(&self, groups: &[ParamGroup]) -> Box<dyn Optimizer + Send> {
        match self {
            OptimizerKind::AdamW => Box::new(AdamW::new(groups)),
            OptimizerKind::Sgd => Box::new(Sgd::new(groups)),
        }
    }
}

/// Parameter name → weight decay, for every parameter in some group.
/// Parameters missing from the map are never updated.
pub(crate) fn decay_table(groups: &[ParamGroup]) -> HashMap<String, f64> {
    groups.iter()
        .flat_map(|g| g.params.iter().map(move |name| (name.clone(), g.weight_decay)))
        .collect()
}

/// Visits every (name, parameter slice, gradient slice) of the network.
pub(crate) fn for_each_param<F>(network: &mut Network, grads: &Gradients, mut f: F)
where
    F: FnMut(&str, &mut [f64], &[f64]),
{
    for (layer, g) in network.layers.iter_mut().zip(&grads.layers) {
        let weight_name = layer.weight_name();
        let bias_name = layer.bias_name();
        f(&weight_name, &mut layer.weights.data, &g.weights.data);
        f(&bias_name, &mut layer.biases, &g.biases);
    }
}
