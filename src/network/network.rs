use serde::{Serialize, Deserialize};

use crate::layers::dense::{Layer, LayerGrads, LayerTrace};
use crate::optim::param_groups::{NamedParameters, ParamInfo};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub layers: Vec<Layer>,
}

/// Per-layer parameter gradients, aligned with `Network::layers`.
#[derive(Debug, Clone)]
pub struct Gradients {
    pub layers: Vec<LayerGrads>,
}

impl Gradients {
    pub fn zeros_like(network: &Network) -> Gradients {
        Gradients { layers: network.layers.iter().map(LayerGrads::zeros_like).collect() }
    }

    pub fn add_assign(&mut self, other: &Gradients) {
        for (a, b) in self.layers.iter_mut().zip(&other.layers) {
            a.add_assign(b);
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.layers.iter_mut().for_each(|g| g.scale(factor));
    }
}

impl Network {
    pub fn new(layers: Vec<Layer>) -> Network {
        Network { layers }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map(|l| l.input_size()).unwrap_or(0)
    }

    pub fn num_classes(&self) -> usize {
        self.layers.last().map(|l| l.size).unwrap_or(0)
    }

    /// Inference pass; returns the head's logits.
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current).post;
        }
        current
    }

    /// Training pass; keeps every layer's pre/post activations for `backward`.
    pub fn forward_trace(&self, input: &[f64]) -> Vec<LayerTrace> {
        let mut traces: Vec<LayerTrace> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let trace = match traces.last() {
                Some(prev) => layer.forward(&prev.post),
                None => layer.forward(input),
            };
            traces.push(trace);
        }
        traces
    }

    /// Backpropagates ∂L/∂logits through every layer for one sample.
    pub fn backward(&self, input: &[f64], traces: &[LayerTrace], output_grad: &[f64]) -> Gradients {
        let mut layers: Vec<LayerGrads> = Vec::with_capacity(self.layers.len());
        let mut upstream = output_grad.to_vec();
        for i in (0..self.layers.len()).rev() {
            let layer_input = if i == 0 { input } else { traces[i - 1].post.as_slice() };
            let (grads, input_grad) = self.layers[i].backward(&traces[i], layer_input, &upstream);
            layers.push(grads);
            upstream = input_grad;
        }
        layers.reverse();
        Gradients { layers }
    }

    /// Freezes every parameter whose name does not contain `keep`.
    /// Returns the names that remain trainable.
    pub fn freeze_except(&mut self, keep: &str) -> Vec<String> {
        let mut trainable = Vec::new();
        for layer in &mut self.layers {
            let weight = layer.weight_name();
            let bias = layer.bias_name();
            layer.weight_trainable = weight.contains(keep);
            layer.bias_trainable = bias.contains(keep);
            if layer.weight_trainable {
                trainable.push(weight);
            }
            if layer.bias_trainable {
                trainable.push(bias);
            }
        }
        trainable
    }
}

impl NamedParameters for Network {
    fn named_parameters(&self) -> Vec<ParamInfo> {
        self.layers.iter()
            .flat_map(|layer| {
                [
                    ParamInfo {
                        name: layer.weight_name(),
                        shape: layer.weights.shape().to_vec(),
                        requires_grad: layer.weight_trainable,
                    },
                    ParamInfo {
                        name: layer.bias_name(),
                        shape: vec![layer.biases.len()],
                        requires_grad: layer.bias_trainable,
                    },
                ]
            })
            .collect()
    }
}
