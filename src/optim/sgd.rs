use std::collections::HashMap;

use crate::network::network::{Gradients, Network};
use crate::optim::{decay_table, for_each_param, Optimizer, ParamGroup};

/// Plain SGD with per-group L2 weight decay: `p -= lr * (g + wd * p)`.
pub struct Sgd {
    decay: HashMap<String, f64>,
}

impl Sgd {
    pub fn new(groups: &[ParamGroup]) -> Sgd {
        Sgd { decay: decay_table(groups) }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, network: &mut Network, grads: &Gradients, lr: f64) {
        for_each_param(network, grads, |name, param, grad| {
            let Some(&wd) = self.decay.get(name) else { return };
            for (p, g) in param.iter_mut().zip(grad) {
                *p -= lr * (g + wd * *p);
            }
        });
    }
}
