pub use self::activation::ActivationKind;
pub use self::dataset::{
    DatasetEntry, NetworkDataset, NetworkTester, NetworkTrainer, TestingStrategy,
};
pub use self::gradient_descent::activation_cost;
pub use self::layer::{Layer, LayerKind};
pub use self::network::{FeedForwardNetwork, Network, NetworkError};
pub use self::neuron::{
    ActivationState, Connection, ConnectionId, Neuron, NeuronGraph, NeuronId,
};

mod activation;
mod dataset;
mod gradient_descent;
mod layer;
mod network;
mod neuron;
