use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{activation::activation::ActivationFunction, math::matrix::Matrix};

/// Fully connected layer: `a = σ(x · W + b)`.
///
/// `weights` has shape `(input_size, size)` and `biases` has length `size`.
/// Parameters are exposed as `<name>.weight` and `<name>.bias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub size: usize,
    pub weights: Matrix,
    pub biases: Vec<f64>,
    pub activator: ActivationFunction,
    #[serde(default = "trainable")]
    pub weight_trainable: bool,
    #[serde(default = "trainable")]
    pub bias_trainable: bool,
}

fn trainable() -> bool {
    true
}

/// Values cached by a training forward pass, needed for backprop.
#[derive(Debug, Clone)]
pub struct LayerTrace {
    /// Pre-activation `z = xW + b`.
    pub pre: Vec<f64>,
    /// Post-activation `a = σ(z)`.
    pub post: Vec<f64>,
}

/// Gradients of one layer's parameters.
#[derive(Debug, Clone)]
pub struct LayerGrads {
    pub weights: Matrix,
    pub biases: Vec<f64>,
}

impl LayerGrads {
    pub fn zeros_like(layer: &Layer) -> LayerGrads {
        LayerGrads {
            weights: Matrix::zeros(layer.weights.rows, layer.weights.cols),
            biases: vec![0.0; layer.biases.len()],
        }
    }

    pub fn add_assign(&mut self, other: &LayerGrads) {
        self.weights.add_assign(&other.weights);
        for (a, b) in self.biases.iter_mut().zip(&other.biases) {
            *a += b;
        }
    }

    pub fn scale(&mut self, factor: f64) {
        self.weights.scale(factor);
        self.biases.iter_mut().for_each(|b| *b *= factor);
    }
}

impl Layer {
    /// He-initialised weights, zero biases.
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        rng: &mut R,
    ) -> Layer {
        Layer {
            name: name.into(),
            size,
            weights: Matrix::he(input_size, size, rng),
            biases: vec![0.0; size],
            activator: activation,
            weight_trainable: true,
            bias_trainable: true,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn weight_name(&self) -> String {
        format!("{}.weight", self.name)
    }

    pub fn bias_name(&self) -> String {
        format!("{}.bias", self.name)
    }

    pub fn forward(&self, input: &[f64]) -> LayerTrace {
        let mut pre = self.weights.vec_mul(input);
        for (z, b) in pre.iter_mut().zip(&self.biases) {
            *z += b;
        }
        let post = pre.iter().map(|&z| self.activator.function(z)).collect();
        LayerTrace { pre, post }
    }

    /// Backward step for one sample.
    ///
    /// `upstream` is ∂L/∂a for this layer's output and `input` is the value
    /// that was fed into the layer. Returns the parameter gradients and
    /// ∂L/∂x for the previous layer.
    pub fn backward(&self, trace: &LayerTrace, input: &[f64], upstream: &[f64]) -> (LayerGrads, Vec<f64>) {
        // δ = ∂L/∂a ⊙ σ'(z)
        let delta: Vec<f64> = upstream.iter()
            .zip(&trace.pre)
            .map(|(g, &z)| g * self.activator.derivative(z))
            .collect();

        let mut weights = Matrix::zeros(self.weights.rows, self.weights.cols);
        weights.add_outer(input, &delta);
        let input_grad = self.weights.mul_vec(&delta);

        (LayerGrads { weights, biases: delta }, input_grad)
    }
}
