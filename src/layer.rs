use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::ActivationKind;
use crate::network::NetworkError;
use crate::neuron::{NeuronGraph, NeuronId};

/// The role a layer plays in the network.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum LayerKind {
    Input,
    Hidden,
    Output,
}

/// An ordered collection of neurons sharing one activation function.
///
/// The layer holds ids into the network's neuron graph; insertion order
/// is significant for pairing neurons with dataset values.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Layer {
    kind: LayerKind,
    activation: ActivationKind,
    neurons: Vec<NeuronId>,
}

impl Layer {
    pub fn new(kind: LayerKind, activation: ActivationKind) -> Self {
        Self {
            kind,
            activation,
            neurons: Vec::new(),
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    pub fn neurons(&self) -> &[NeuronId] {
        &self.neurons
    }

    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    /// Appends a neuron to the layer after checking that it is valid.
    pub fn register(&mut self, graph: &NeuronGraph, id: NeuronId) -> Result<(), NetworkError> {
        if !graph.is_valid_neuron(id) {
            return Err(NetworkError::ArgumentMismatch(
                "cannot register an invalid neuron in a layer",
            ));
        }

        self.neurons.push(id);
        Ok(())
    }

    /// Removes a neuron from the layer. No-op if it is not present.
    pub fn remove(&mut self, id: NeuronId) {
        self.neurons.retain(|&neuron| neuron != id);
    }

    /// Fully connects this layer to `to_layer`: one connection from
    /// every neuron here to every neuron there, with fresh random
    /// weights. Both layers must be individually valid.
    pub fn connect_all(
        &self,
        to_layer: &Layer,
        graph: &mut NeuronGraph,
        rng: &mut (impl Rng + ?Sized),
    ) -> Result<(), NetworkError> {
        if !self.is_valid(graph) {
            return Err(NetworkError::InvalidStructure(
                "cannot connect from an invalid layer",
            ));
        }
        if !to_layer.is_valid(graph) {
            return Err(NetworkError::InvalidStructure(
                "cannot connect to an invalid layer",
            ));
        }

        for &from in &self.neurons {
            for &to in &to_layer.neurons {
                graph.connect(from, to, None, rng)?;
            }
        }

        Ok(())
    }

    /// Randomizes the incoming weights of every neuron, and the bias of
    /// every neuron except when this is the input layer. Input neurons
    /// keep a fixed bias of zero.
    pub fn randomize_all(&self, graph: &mut NeuronGraph, rng: &mut (impl Rng + ?Sized)) {
        for &neuron in &self.neurons {
            graph.randomize_weights(neuron, rng);

            if self.kind != LayerKind::Input {
                graph.randomize_bias(neuron, rng);
            }
        }
    }

    /// A layer is valid when it holds at least one neuron and every
    /// neuron in it is individually valid.
    pub fn is_valid(&self, graph: &NeuronGraph) -> bool {
        !self.neurons.is_empty()
            && self
                .neurons
                .iter()
                .all(|&neuron| graph.is_valid_neuron(neuron))
    }
}
