use serde::{Deserialize, Serialize};

/// The activation function applied to a neuron's weighted input sum.
///
/// Every neuron in a layer shares the layer's kind, fixed at
/// construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ActivationKind {
    Relu,
    Sigmoid,
    Identity,
}

impl ActivationKind {
    /// Applies the forward activation function to a pre-activation sum.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::Sigmoid => sigmoid(x),
            ActivationKind::Identity => x,
        }
    }

    /// Evaluates the activation derivative used by backpropagation.
    ///
    /// The ReLU derivative is undefined at zero, so the sigmoid function
    /// stands in for it everywhere. The sigmoid derivative is expressed
    /// in terms of an already-activated value: `a * (1 - a)`.
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            ActivationKind::Relu => sigmoid(x),
            ActivationKind::Sigmoid => x * (1.0 - x),
            ActivationKind::Identity => 1.0,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
