use rayon::prelude::*;
use tracing::debug;

use crate::activation::activation::softmax;
use crate::data::loader::DataLoader;
use crate::error::{Error, Result};
use crate::loss::cross_entropy::{argmax, CrossEntropyLoss};
use crate::network::network::{Gradients, Network};
use crate::optim::scheduler::LrScheduler;
use crate::optim::Optimizer;

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// Mean loss and accuracy of one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochResult {
    pub loss: f64,
    pub accuracy: f64,
    /// Learning rate used by the pass's last optimizer step.
    pub lr: f64,
}

/// Samples per parallel gradient task.
const GRAD_CHUNK: usize = 4;

/// Per-batch accumulator: summed gradients, summed loss, correct count.
struct BatchSums {
    grads: Gradients,
    loss: f64,
    correct: usize,
}

fn check_label(label: usize, num_classes: usize) -> Result<()> {
    if label >= num_classes {
        return Err(Error::invalid_config(format!(
            "label {} is out of range for a {}-class head", label, num_classes
        )));
    }
    Ok(())
}

/// Runs one epoch of mini-batch training.
///
/// Per-sample gradients are computed in parallel on the loader's pool in
/// fixed-size chunks, averaged over the batch and applied with the
/// scheduler's current rate.
/// The scheduler advances once per optimizer step.
pub fn train_one_epoch(
    network: &mut Network,
    optimizer: &mut dyn Optimizer,
    loader: &DataLoader,
    scheduler: &mut LrScheduler,
    epoch: usize,
) -> Result<EpochResult> {
    let num_classes = network.num_classes();
    let mut total_loss = 0.0;
    let mut total_correct = 0usize;
    let mut seen = 0usize;
    let mut lr = scheduler.lr();

    for batch in loader.batches(epoch) {
        let batch = batch?;
        if batch.is_empty() {
            continue;
        }
        for &label in &batch.labels {
            check_label(label, num_classes)?;
        }

        let net: &Network = network;
        let partials: Vec<BatchSums> = loader.pool().install(|| {
            batch.inputs
                .par_chunks(GRAD_CHUNK)
                .zip(batch.labels.par_chunks(GRAD_CHUNK))
                .map(|(inputs, labels)| {
                    let mut acc = BatchSums { grads: Gradients::zeros_like(net), loss: 0.0, correct: 0 };
                    for (input, &label) in inputs.iter().zip(labels) {
                        let traces = net.forward_trace(input);
                        let logits = traces.last().map(|t| t.post.as_slice()).unwrap_or(&[]);
                        acc.loss += CrossEntropyLoss::loss(logits, label);
                        if argmax(logits) == label {
                            acc.correct += 1;
                        }
                        let output_grad = CrossEntropyLoss::derivative(logits, label);
                        acc.grads.add_assign(&net.backward(input, &traces, &output_grad));
                    }
                    acc
                })
                .collect()
        });
        // Summed in chunk order so the result does not depend on the thread count.
        let sums = partials.into_iter().reduce(|mut a, b| {
            a.grads.add_assign(&b.grads);
            a.loss += b.loss;
            a.correct += b.correct;
            a
        });
        let Some(mut sums) = sums else { continue };

        sums.grads.scale(1.0 / batch.len() as f64);
        lr = scheduler.lr();
        optimizer.step(network, &sums.grads, lr);
        scheduler.step();

        total_loss += sums.loss;
        total_correct += sums.correct;
        seen += batch.len();
        debug!(step = scheduler.current_step(), lr, batch_loss = sums.loss / batch.len() as f64, "optimizer step");
    }

    let n = seen.max(1) as f64;
    Ok(EpochResult { loss: total_loss / n, accuracy: total_correct as f64 / n, lr })
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Loss, accuracy and per-sample class probabilities over a whole loader.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutput {
    pub loss: f64,
    pub accuracy: f64,
    /// Softmax output per sample, in loader order.
    pub probs: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
}

impl EvalOutput {
    pub fn predictions(&self) -> Vec<usize> {
        self.probs.iter().map(|p| argmax(p)).collect()
    }

    /// Probability of class `class` for every sample.
    pub fn class_scores(&self, class: usize) -> Vec<f64> {
        self.probs.iter().map(|p| p.get(class).copied().unwrap_or(0.0)).collect()
    }
}

/// Forward-only pass; the network is not modified.
pub fn evaluate(network: &Network, loader: &DataLoader, epoch: usize) -> Result<EvalOutput> {
    let num_classes = network.num_classes();
    let mut out = EvalOutput { loss: 0.0, accuracy: 0.0, probs: Vec::new(), labels: Vec::new() };
    let mut correct = 0usize;

    for batch in loader.batches(epoch) {
        let batch = batch?;
        for &label in &batch.labels {
            check_label(label, num_classes)?;
        }
        let logits: Vec<Vec<f64>> = loader.pool().install(|| {
            batch.inputs.par_iter().map(|x| network.forward(x)).collect()
        });
        for (z, &label) in logits.iter().zip(&batch.labels) {
            out.loss += CrossEntropyLoss::loss(z, label);
            if argmax(z) == label {
                correct += 1;
            }
            out.probs.push(softmax(z));
        }
        out.labels.extend_from_slice(&batch.labels);
    }

    let n = out.labels.len().max(1) as f64;
    out.loss /= n;
    out.accuracy = correct as f64 / n;
    Ok(out)
}
