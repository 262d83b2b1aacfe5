use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::ActivationKind;
use crate::network::NetworkError;

/// Index of a neuron in a [`NeuronGraph`] arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct NeuronId(pub(crate) usize);

/// Index of a connection in a [`NeuronGraph`] arena.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub struct ConnectionId(pub(crate) usize);

/// How a neuron's activation level is produced.
///
/// Input-layer neurons are pinned to dataset values with `Fixed`; every
/// other neuron derives its activation from its incoming connections on
/// demand.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum ActivationState {
    Fixed(f64),
    Derived,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Neuron {
    pub(crate) state: ActivationState,
    pub(crate) bias: f64,
    pub(crate) kind: ActivationKind,
    pub(crate) incoming: Vec<ConnectionId>,
    pub(crate) outgoing: Vec<ConnectionId>,
}

impl Neuron {
    pub(crate) fn new(kind: ActivationKind) -> Self {
        Self {
            state: ActivationState::Derived,
            bias: 0.0,
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    /// Connections for which this neuron is the destination.
    pub fn incoming(&self) -> &[ConnectionId] {
        &self.incoming
    }

    /// Connections for which this neuron is the source.
    pub fn outgoing(&self) -> &[ConnectionId] {
        &self.outgoing
    }
}

/// A directed weighted edge between two neurons.
///
/// Connections do not own their endpoints; they refer back into the
/// graph's neuron arena by index.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Connection {
    pub(crate) from: NeuronId,
    pub(crate) to: NeuronId,
    pub(crate) weight: f64,
}

impl Connection {
    pub fn from(&self) -> NeuronId {
        self.from
    }

    pub fn to(&self) -> NeuronId {
        self.to
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Sentinel weight stored when an invalid connection is cleared.
const CLEARED_WEIGHT: f64 = -1.0;

/// An arena of neurons and the connections between them.
///
/// All cross-references are indices into the two vectors, so cloning the
/// graph is a deep copy and no reference cycles exist.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NeuronGraph {
    neurons: Vec<Neuron>,
    connections: Vec<Connection>,
}

impl NeuronGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neurons.get(id.0)
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.0)
    }

    pub fn neurons(&self) -> impl Iterator<Item = (NeuronId, &Neuron)> {
        self.neurons
            .iter()
            .enumerate()
            .map(|(index, neuron)| (NeuronId(index), neuron))
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> {
        self.connections
            .iter()
            .enumerate()
            .map(|(index, connection)| (ConnectionId(index), connection))
    }

    /// Adds a new unconnected neuron and returns its id.
    pub fn add_neuron(&mut self, kind: ActivationKind) -> NeuronId {
        self.neurons.push(Neuron::new(kind));
        NeuronId(self.neurons.len() - 1)
    }

    /// Creates a connection between two neurons, registering it in the
    /// source's outgoing edges and the destination's incoming edges.
    ///
    /// An explicit weight must lie in `[0, 1]`; when `None`, the weight
    /// is drawn uniformly from `[0, 1]`.
    pub fn connect(
        &mut self,
        from: NeuronId,
        to: NeuronId,
        weight: Option<f64>,
        rng: &mut (impl Rng + ?Sized),
    ) -> Result<ConnectionId, NetworkError> {
        if !self.is_valid_neuron(from) || !self.is_valid_neuron(to) {
            return Err(NetworkError::InvalidStructure(
                "connections require two valid endpoint neurons",
            ));
        }

        let weight = match weight {
            Some(weight) => {
                if !(0.0..=1.0).contains(&weight) {
                    return Err(NetworkError::ArgumentMismatch(
                        "explicit connection weights must lie in [0, 1]",
                    ));
                }
                weight
            }
            None => weight_distribution().sample(rng),
        };

        self.connections.push(Connection { from, to, weight });
        let id = ConnectionId(self.connections.len() - 1);

        self.neurons[from.0].outgoing.push(id);
        self.neurons[to.0].incoming.push(id);

        Ok(id)
    }

    /// A neuron is valid when each of its incoming edges ends at it and
    /// starts at an existing neuron, and each outgoing edge starts at it
    /// and ends at an existing neuron.
    pub fn is_valid_neuron(&self, id: NeuronId) -> bool {
        let Some(neuron) = self.neurons.get(id.0) else {
            return false;
        };

        neuron.incoming.iter().all(|&edge| {
            self.connections
                .get(edge.0)
                .map_or(false, |c| c.to == id && c.from.0 < self.neurons.len())
        }) && neuron.outgoing.iter().all(|&edge| {
            self.connections
                .get(edge.0)
                .map_or(false, |c| c.from == id && c.to.0 < self.neurons.len())
        })
    }

    /// A connection is valid when both endpoints are valid neurons and
    /// its weight lies in `[0, 1]`. When `clear_if_invalid` is set, an
    /// invalid connection is detached from its endpoints and its weight
    /// replaced with an out-of-range sentinel.
    ///
    /// Note that the weight bound applies at creation and randomization
    /// time only; training updates may legally push weights outside the
    /// bound and are never re-validated.
    pub fn is_valid_connection(&mut self, id: ConnectionId, clear_if_invalid: bool) -> bool {
        let valid = match self.connections.get(id.0) {
            Some(connection) => {
                self.is_valid_neuron(connection.from)
                    && self.is_valid_neuron(connection.to)
                    && (0.0..=1.0).contains(&connection.weight)
            }
            None => false,
        };

        if !valid && clear_if_invalid {
            if let Some(connection) = self.connections.get(id.0) {
                let (from, to) = (connection.from, connection.to);
                if let Some(neuron) = self.neurons.get_mut(from.0) {
                    neuron.outgoing.retain(|&edge| edge != id);
                }
                if let Some(neuron) = self.neurons.get_mut(to.0) {
                    neuron.incoming.retain(|&edge| edge != id);
                }
                self.connections[id.0].weight = CLEARED_WEIGHT;
            }
        }

        valid
    }

    /// Returns the neuron's activation level: its pinned value for
    /// input neurons, or the derived activation otherwise.
    ///
    /// Derivation recurses through incoming connections, so reading an
    /// output neuron evaluates the whole upstream network on demand.
    pub fn activation_level(&self, id: NeuronId) -> Result<f64, NetworkError> {
        let neuron = self.neurons.get(id.0).ok_or(NetworkError::InvalidStructure(
            "activation level requested for a neuron that is not in the graph",
        ))?;

        match neuron.state {
            ActivationState::Fixed(value) => Ok(value),
            ActivationState::Derived => self.compute_activation(id, true),
        }
    }

    /// Computes the weighted sum of incoming activations plus bias,
    /// optionally passing it through the activation function.
    ///
    /// The raw sum (`apply_activation = false`) is the pre-activation
    /// value `z` that backpropagation evaluates derivatives at.
    pub fn compute_activation(
        &self,
        id: NeuronId,
        apply_activation: bool,
    ) -> Result<f64, NetworkError> {
        if !self.is_valid_neuron(id) {
            return Err(NetworkError::InvalidStructure(
                "cannot compute the activation of an invalid neuron",
            ));
        }

        let neuron = &self.neurons[id.0];

        let mut z = neuron.bias;
        for &edge in &neuron.incoming {
            let connection = &self.connections[edge.0];
            z += connection.weight * self.activation_level(connection.from)?;
        }

        if apply_activation {
            Ok(neuron.kind.apply(z))
        } else {
            Ok(z)
        }
    }

    /// Pins the neuron's activation to a fixed value. Used exclusively
    /// to apply dataset inputs to input-layer neurons.
    pub fn set_override(&mut self, id: NeuronId, value: f64) -> Result<(), NetworkError> {
        let neuron = self.neurons.get_mut(id.0).ok_or(NetworkError::InvalidStructure(
            "cannot set an override on a neuron that is not in the graph",
        ))?;
        neuron.state = ActivationState::Fixed(value);
        Ok(())
    }

    /// Re-randomizes every incoming connection weight uniformly in `[0, 1]`.
    pub fn randomize_weights(&mut self, id: NeuronId, rng: &mut (impl Rng + ?Sized)) {
        let Some(neuron) = self.neurons.get(id.0) else {
            return;
        };

        let distribution = weight_distribution();
        for edge in neuron.incoming.clone() {
            self.connections[edge.0].weight = distribution.sample(rng);
        }
    }

    /// Sets the neuron's bias uniformly in `[0, 1]`.
    ///
    /// Must not be called for input-layer neurons, which keep a fixed
    /// bias of zero; the layer enforces that.
    pub fn randomize_bias(&mut self, id: NeuronId, rng: &mut (impl Rng + ?Sized)) {
        if let Some(neuron) = self.neurons.get_mut(id.0) {
            neuron.bias = weight_distribution().sample(rng);
        }
    }

    pub(crate) fn set_weight(&mut self, id: ConnectionId, weight: f64) {
        self.connections[id.0].weight = weight;
    }

    pub(crate) fn set_bias(&mut self, id: NeuronId, bias: f64) {
        self.neurons[id.0].bias = bias;
    }
}

fn weight_distribution() -> Uniform<f64> {
    Uniform::new_inclusive(0.0, 1.0)
}
