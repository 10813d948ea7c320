use std::collections::HashMap;

use crate::network::network::{Gradients, Network};
use crate::optim::{decay_table, for_each_param, Optimizer, ParamGroup};

/// Adam with decoupled weight decay (Loshchilov & Hutter).
///
/// Each step: `p *= 1 - lr * wd`, then the bias-corrected Adam update.
/// Moment buffers are created lazily per parameter name.
pub struct AdamW {
    decay: HashMap<String, f64>,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: i32,
    moments: HashMap<String, (Vec<f64>, Vec<f64>)>,
}

impl AdamW {
    pub fn new(groups: &[ParamGroup]) -> AdamW {
        AdamW {
            decay: decay_table(groups),
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            moments: HashMap::new(),
        }
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, network: &mut Network, grads: &Gradients, lr: f64) {
        self.t += 1;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);
        let bias1 = 1.0 - b1.powi(self.t);
        let bias2 = 1.0 - b2.powi(self.t);
        let decay = &self.decay;
        let moments = &mut self.moments;

        for_each_param(network, grads, |name, param, grad| {
            let Some(&wd) = decay.get(name) else { return };
            let (m, v) = moments
                .entry(name.to_string())
                .or_insert_with(|| (vec![0.0; param.len()], vec![0.0; param.len()]));

            for i in 0..param.len() {
                let g = grad[i];
                param[i] *= 1.0 - lr * wd;
                m[i] = b1 * m[i] + (1.0 - b1) * g;
                v[i] = b2 * v[i] + (1.0 - b2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                param[i] -= lr * m_hat / (v_hat.sqrt() + eps);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::spec::{ModelKind, NetworkSpec};
    use crate::optim::get_params_groups;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn frozen_parameters_are_not_updated() {
        let spec = NetworkSpec::for_model(ModelKind::MlpTiny, 3, 2).unwrap();
        let mut net = spec.build(&mut ChaCha8Rng::seed_from_u64(1));
        net.freeze_except("head");
        let before = net.clone();

        let mut grads = Gradients::zeros_like(&net);
        for g in &mut grads.layers {
            g.weights.data.iter_mut().for_each(|x| *x = 1.0);
            g.biases.iter_mut().for_each(|x| *x = 1.0);
        }

        let groups = get_params_groups(&net, 0.01);
        let mut opt = AdamW::new(&groups);
        opt.step(&mut net, &grads, 1e-2);

        assert_eq!(net.layers[0].weights, before.layers[0].weights);
        assert_eq!(net.layers[0].biases, before.layers[0].biases);
        assert_ne!(net.layers[1].weights, before.layers[1].weights);
        // First Adam step moves each parameter by ~lr against the gradient sign.
        let delta = before.layers[1].biases[0] - net.layers[1].biases[0];
        assert!((delta - 1e-2).abs() < 1e-6);
    }
}
