//! Optimizer hyper-parameter sets sent with a training request.
//!
//! Plain immutable data carriers; the optimizer math itself runs server
//! side.

use crate::proto;

/// Adam hyper-parameters with the conventional defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Adam {
    pub learning_rate: f32,
    pub beta_1: f32,
    pub beta_2: f32,
    pub epsilon: f32,
    pub weight_decay: f32,
    pub amsgrad: bool,
}

impl Default for Adam {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
            amsgrad: false,
        }
    }
}

/// Plain/momentum SGD hyper-parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Sgd {
    pub learning_rate: f32,
    pub momentum: f32,
    pub dampening: f32,
    pub weight_decay: f32,
    pub nesterov: bool,
}

impl Default for Sgd {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            momentum: 0.0,
            dampening: 0.0,
            weight_decay: 0.0,
            nesterov: false,
        }
    }
}

/// The optimizer choice attached to a training request.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimizer {
    Adam(Adam),
    Sgd(Sgd),
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::Adam(Adam::default())
    }
}

impl Optimizer {
    /// Override the learning rate, keeping the other hyper-parameters.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        match &mut self {
            Self::Adam(adam) => adam.learning_rate = learning_rate,
            Self::Sgd(sgd) => sgd.learning_rate = learning_rate,
        }
        self
    }

    /// Map into the wire-level oneof.
    #[must_use]
    pub fn to_proto(&self) -> proto::train_config::Optimizer {
        match self {
            Self::Adam(adam) => proto::train_config::Optimizer::Adam(proto::Adam {
                learning_rate: adam.learning_rate,
                beta_1: adam.beta_1,
                beta_2: adam.beta_2,
                epsilon: adam.epsilon,
                weight_decay: adam.weight_decay,
                amsgrad: adam.amsgrad,
            }),
            Self::Sgd(sgd) => proto::train_config::Optimizer::Sgd(proto::Sgd {
                learning_rate: sgd.learning_rate,
                momentum: sgd.momentum,
                dampening: sgd.dampening,
                weight_decay: sgd.weight_decay,
                nesterov: sgd.nesterov,
            }),
        }
    }
}
