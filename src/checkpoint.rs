//! Flat `name → tensor` weight files and non-strict loading.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::network::metadata::ModelMetadata;
use crate::network::network::Network;

/// One parameter tensor: its shape and row-major values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// Parameter name → tensor, ordered by name.
pub type StateDict = BTreeMap<String, TensorData>;

/// Snapshot of every parameter of `network`, trainable or not.
pub fn state_dict(network: &Network) -> StateDict {
    let mut dict = StateDict::new();
    for layer in &network.layers {
        dict.insert(layer.weight_name(), TensorData {
            shape: layer.weights.shape().to_vec(),
            data: layer.weights.data.clone(),
        });
        dict.insert(layer.bias_name(), TensorData {
            shape: vec![layer.biases.len()],
            data: layer.biases.clone(),
        });
    }
    dict
}

/// Removes every entry whose name contains `pattern`; returns the removed names.
pub fn drop_keys_containing(dict: &mut StateDict, pattern: &str) -> Vec<String> {
    let dropped: Vec<String> = dict.keys().filter(|k| k.contains(pattern)).cloned().collect();
    for key in &dropped {
        dict.remove(key);
    }
    dropped
}

/// Outcome of a non-strict load. Nothing in here is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Network parameters absent from the file (left untouched).
    pub missing_keys: Vec<String>,
    /// File entries with no matching network parameter (ignored).
    pub unexpected_keys: Vec<String>,
    /// Names present on both sides whose shapes differ (left untouched).
    pub mismatched_keys: Vec<String>,
}

impl LoadReport {
    pub fn is_exact(&self) -> bool {
        self.missing_keys.is_empty() && self.unexpected_keys.is_empty() && self.mismatched_keys.is_empty()
    }
}

/// Copies every matching, same-shaped tensor of `dict` into `network`.
pub fn load_into(network: &mut Network, dict: &StateDict) -> LoadReport {
    let mut report = LoadReport::default();
    let mut seen: Vec<String> = Vec::new();

    for layer in &mut network.layers {
        let weight_name = layer.weight_name();
        let bias_name = layer.bias_name();

        match dict.get(&weight_name) {
            None => report.missing_keys.push(weight_name.clone()),
            Some(t) if t.shape.as_slice() != layer.weights.shape() || t.data.len() != layer.weights.data.len() => {
                report.mismatched_keys.push(weight_name.clone())
            }
            Some(t) => layer.weights.data.copy_from_slice(&t.data),
        }
        match dict.get(&bias_name) {
            None => report.missing_keys.push(bias_name.clone()),
            Some(t) if t.shape != [layer.biases.len()] || t.data.len() != layer.biases.len() => {
                report.mismatched_keys.push(bias_name.clone())
            }
            Some(t) => layer.biases.copy_from_slice(&t.data),
        }
        seen.push(weight_name);
        seen.push(bias_name);
    }

    report.unexpected_keys = dict.keys().filter(|k| !seen.contains(k)).cloned().collect();
    report
}

/// What a checkpoint file holds: weights plus, when written by `fit`, the
/// metadata needed to rebuild the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub metadata: Option<ModelMetadata>,
    pub state_dict: StateDict,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CheckpointFile {
    Full(Checkpoint),
    Bare(StateDict),
}

impl Checkpoint {
    pub fn new(network: &Network, metadata: Option<ModelMetadata>) -> Self {
        Checkpoint { metadata, state_dict: state_dict(network) }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        info!(path = %path.display(), tensors = self.state_dict.len(), "saved checkpoint");
        Ok(())
    }

    /// Reads either a full checkpoint or a bare state dict.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        let file = std::fs::File::open(path)?;
        let parsed: CheckpointFile = serde_json::from_reader(std::io::BufReader::new(file))?;
        let checkpoint = match parsed {
            CheckpointFile::Full(c) => c,
            CheckpointFile::Bare(state_dict) => Checkpoint { metadata: None, state_dict },
        };
        for (name, t) in &checkpoint.state_dict {
            let expected: usize = t.shape.iter().product();
            if expected != t.data.len() {
                return Err(Error::shape_mismatch(name.clone(), &t.shape, &[t.data.len()]));
            }
        }
        Ok(checkpoint)
    }
}

/// Loads pretrained weights for fine-tuning: entries containing `drop_pattern`
/// (typically the classifier head) are discarded first, then the rest is
/// loaded non-strictly and the report logged.
pub fn load_pretrained(network: &mut Network, path: &Path, drop_pattern: Option<&str>) -> Result<LoadReport> {
    let mut dict = Checkpoint::load_json(path)?.state_dict;
    if let Some(pattern) = drop_pattern {
        for key in drop_keys_containing(&mut dict, pattern) {
            info!("delete:{}", key);
        }
    }
    let report = load_into(network, &dict);
    if report.is_exact() {
        info!(path = %path.display(), "loaded pretrained weights");
    } else {
        warn!(
            missing = ?report.missing_keys,
            unexpected = ?report.unexpected_keys,
            mismatched = ?report.mismatched_keys,
            "non-strict load of pretrained weights"
        );
    }
    Ok(report)
}
