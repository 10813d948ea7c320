use serde::{Serialize, Deserialize};
use tracing::debug;

/// Name, shape and trainability of one model parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub shape: Vec<usize>,
    pub requires_grad: bool,
}

/// Anything that can enumerate its parameters by name.
pub trait NamedParameters {
    fn named_parameters(&self) -> Vec<ParamInfo>;
}

/// A set of parameters sharing one weight-decay coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub params: Vec<String>,
    pub weight_decay: f64,
}

/// Splits trainable parameters into `[decay, no_decay]`.
///
/// 1-D tensors and anything named `*.bias` go to `no_decay` (coefficient 0);
/// every other trainable tensor gets `weight_decay`. Frozen parameters
/// appear in neither group.
pub fn get_params_groups<M: NamedParameters + ?Sized>(model: &M, weight_decay: f64) -> Vec<ParamGroup> {
    let mut decay = ParamGroup { params: Vec::new(), weight_decay };
    let mut no_decay = ParamGroup { params: Vec::new(), weight_decay: 0.0 };

    for param in model.named_parameters() {
        if !param.requires_grad {
            continue;
        }
        if param.shape.len() == 1 || param.name.ends_with(".bias") {
            no_decay.params.push(param.name);
        } else {
            decay.params.push(param.name);
        }
    }

    debug!(decay = ?decay.params, no_decay = ?no_decay.params, "parameter groups");
    vec![decay, no_decay]
}
