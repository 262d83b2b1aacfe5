use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activation::ActivationKind;
use crate::dataset::{NetworkDataset, NetworkTester, NetworkTrainer, TestingStrategy};
use crate::layer::{Layer, LayerKind};
use crate::neuron::{ConnectionId, NeuronGraph, NeuronId};

#[derive(Debug, Eq, PartialEq)]
pub enum NetworkError {
    /// The neuron graph or layer structure is inconsistent.
    InvalidStructure(&'static str),
    /// An argument does not match the network's shape, or required data
    /// is missing or degenerate.
    ArgumentMismatch(&'static str),
    /// The requested operation has no supported implementation.
    Unsupported(&'static str),
}

/// The contract every network topology fulfils: structural validity,
/// wiring, training, testing, and progress reset. `FeedForwardNetwork`
/// is the only implementation; the trait is the seam future topologies
/// plug into without touching the training logic.
pub trait Network {
    fn is_valid(&self) -> bool;
    fn generate_layer_connections(&mut self, rng: &mut (impl Rng + ?Sized))
        -> Result<(), NetworkError>;
    fn validate_dataset(&self, dataset: &NetworkDataset) -> Result<(), NetworkError>;
    fn train(&mut self, trainer: &mut NetworkTrainer) -> Result<(), NetworkError>;
    fn test(&mut self, tester: &NetworkTester) -> Result<f64, NetworkError>;
    fn reset_progress(&mut self, rng: &mut (impl Rng + ?Sized)) -> Result<(), NetworkError>;
}

/// A fully-connected feed-forward network: one input layer, zero or
/// more hidden layers, one output layer, trained by per-example
/// gradient descent.
///
/// Neurons and connections live in an arena owned by the network, so
/// `Clone` is a deep copy that shares no state with the original.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FeedForwardNetwork {
    graph: NeuronGraph,
    layers: Vec<Layer>,
    learning_rate: f64,
}

impl FeedForwardNetwork {
    /// Builds an unwired network from layer sizes: an identity-activated
    /// input layer, hidden layers as `(neuron_count, activation)` pairs,
    /// and an output layer. Call [`Network::generate_layer_connections`]
    /// once before training.
    pub fn new(
        input_neurons: usize,
        hidden_layers: &[(usize, ActivationKind)],
        output_neurons: usize,
        output_activation: ActivationKind,
    ) -> Result<Self, NetworkError> {
        if input_neurons == 0 || output_neurons == 0 {
            return Err(NetworkError::ArgumentMismatch(
                "input and output layers require at least one neuron",
            ));
        }
        if hidden_layers.iter().any(|&(count, _)| count == 0) {
            return Err(NetworkError::ArgumentMismatch(
                "hidden layers require at least one neuron",
            ));
        }

        let mut graph = NeuronGraph::new();

        // Input and output first, hidden layers after; sorted_layers()
        // restores the forward order.
        let mut layers = Vec::with_capacity(hidden_layers.len() + 2);
        layers.push(build_layer(
            &mut graph,
            LayerKind::Input,
            ActivationKind::Identity,
            input_neurons,
        )?);
        layers.push(build_layer(
            &mut graph,
            LayerKind::Output,
            output_activation,
            output_neurons,
        )?);
        for &(count, activation) in hidden_layers {
            layers.push(build_layer(&mut graph, LayerKind::Hidden, activation, count)?);
        }

        let network = Self {
            graph,
            layers,
            learning_rate: 0.01,
        };

        if !network.is_valid() {
            return Err(NetworkError::InvalidStructure(
                "could not assemble a valid feed-forward network from the supplied layers",
            ));
        }

        Ok(network)
    }

    /// Convenience constructor for `count` hidden layers of
    /// `neurons_per_layer` neurons sharing one activation function.
    pub fn with_uniform_hidden_layers(
        input_neurons: usize,
        output_neurons: usize,
        output_activation: ActivationKind,
        count: usize,
        neurons_per_layer: usize,
        hidden_activation: ActivationKind,
    ) -> Result<Self, NetworkError> {
        let hidden_layers = vec![(neurons_per_layer, hidden_activation); count];
        Self::new(
            input_neurons,
            &hidden_layers,
            output_neurons,
            output_activation,
        )
    }

    /// The learning rate multiplier applied to every gradient step.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Sets the learning rate; negative values clamp to zero.
    pub fn set_learning_rate(&mut self, rate: f64) {
        self.learning_rate = rate.max(0.0);
    }

    pub fn graph(&self) -> &NeuronGraph {
        &self.graph
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layers in canonical forward order: input first, hidden layers in
    /// their original relative order, output last. This ordering drives
    /// connection generation and, reversed, backpropagation.
    pub fn sorted_layers(&self) -> Vec<&Layer> {
        let mut sorted: Vec<&Layer> = self.layers.iter().collect();
        sorted.sort_by_key(|layer| match layer.kind() {
            LayerKind::Input => 0,
            LayerKind::Hidden => 1,
            LayerKind::Output => 2,
        });
        sorted
    }

    pub(crate) fn graph_mut(&mut self) -> &mut NeuronGraph {
        &mut self.graph
    }

    fn layer_of_kind(&self, kind: LayerKind) -> Result<&Layer, NetworkError> {
        self.layers
            .iter()
            .find(|layer| layer.kind() == kind)
            .ok_or(NetworkError::InvalidStructure(
                "the network is missing a required layer",
            ))
    }

    pub fn input_layer(&self) -> Result<&Layer, NetworkError> {
        self.layer_of_kind(LayerKind::Input)
    }

    pub fn output_layer(&self) -> Result<&Layer, NetworkError> {
        self.layer_of_kind(LayerKind::Output)
    }

    /// Pins each input neuron's activation to the corresponding value.
    pub fn apply_inputs(&mut self, inputs: &[f64]) -> Result<(), NetworkError> {
        let neurons: Vec<NeuronId> = {
            let input_layer = self.input_layer()?;
            if inputs.len() != input_layer.len() {
                return Err(NetworkError::ArgumentMismatch(
                    "the number of supplied inputs does not equal the number of input neurons",
                ));
            }
            input_layer.neurons().to_vec()
        };

        for (&neuron, &value) in neurons.iter().zip(inputs) {
            self.graph.set_override(neuron, value)?;
        }

        Ok(())
    }

    /// Reads each output neuron's activation level in registration
    /// order, lazily evaluating the whole network.
    pub fn output_activation_levels(&self) -> Result<Vec<f64>, NetworkError> {
        self.output_layer()?
            .neurons()
            .iter()
            .map(|&neuron| self.graph.activation_level(neuron))
            .collect()
    }

    /// Looks up the connection between two neurons, if one exists.
    pub fn connection_between(&self, from: NeuronId, to: NeuronId) -> Option<ConnectionId> {
        let neuron = self.graph.neuron(from)?;
        neuron.outgoing().iter().copied().find(|&edge| {
            self.graph
                .connection(edge)
                .map_or(false, |connection| connection.to() == to)
        })
    }

    /// Overwrites a connection weight directly. Raw parameter access for
    /// restoring a learned model; no bound is applied, mirroring the
    /// unconstrained weights gradient descent produces.
    pub fn set_weight(&mut self, id: ConnectionId, weight: f64) {
        self.graph.set_weight(id, weight);
    }

    /// Overwrites a neuron bias directly.
    pub fn set_bias(&mut self, id: NeuronId, bias: f64) {
        self.graph.set_bias(id, bias);
    }
}

impl Network for FeedForwardNetwork {
    /// A network is valid when it has exactly one input and one output
    /// layer and every layer is individually valid.
    fn is_valid(&self) -> bool {
        let inputs = self
            .layers
            .iter()
            .filter(|layer| layer.kind() == LayerKind::Input)
            .count();
        let outputs = self
            .layers
            .iter()
            .filter(|layer| layer.kind() == LayerKind::Output)
            .count();

        inputs == 1
            && outputs == 1
            && self.layers.iter().all(|layer| layer.is_valid(&self.graph))
    }

    /// Walks the sorted layers and fully connects each consecutive
    /// pair, producing one chain: input, hidden layers, output.
    fn generate_layer_connections(
        &mut self,
        rng: &mut (impl Rng + ?Sized),
    ) -> Result<(), NetworkError> {
        if !self.is_valid() {
            return Err(NetworkError::InvalidStructure(
                "cannot generate layer connections on an invalid network",
            ));
        }

        let sorted: Vec<Layer> = self.sorted_layers().into_iter().cloned().collect();

        for pair in sorted.windows(2) {
            pair[0].connect_all(&pair[1], &mut self.graph, rng)?;
        }

        info!(
            layers = self.layers.len(),
            neurons = self.graph.neuron_count(),
            connections = self.graph.connection_count(),
            "Generated layer connections."
        );

        Ok(())
    }

    /// Checks that every dataset entry's input and output counts match
    /// the input and output layer sizes. Whole-dataset check; an empty
    /// dataset is rejected outright.
    fn validate_dataset(&self, dataset: &NetworkDataset) -> Result<(), NetworkError> {
        if dataset.entries().is_empty() {
            return Err(NetworkError::ArgumentMismatch(
                "cannot train or test a network against an empty dataset",
            ));
        }

        let input_count = self.input_layer()?.len();
        let output_count = self.output_layer()?.len();

        for entry in dataset.entries() {
            if entry.inputs.len() != input_count {
                return Err(NetworkError::ArgumentMismatch(
                    "a dataset entry's input count does not equal the number of input neurons",
                ));
            }
            if entry.outputs.len() != output_count {
                return Err(NetworkError::ArgumentMismatch(
                    "a dataset entry's output count does not equal the number of output neurons",
                ));
            }
        }

        Ok(())
    }

    fn train(&mut self, trainer: &mut NetworkTrainer) -> Result<(), NetworkError> {
        self.train_network(trainer)
    }

    /// Runs every dataset entry through the network and scores it with
    /// the tester's strategy, returning the percentage correct.
    fn test(&mut self, tester: &NetworkTester) -> Result<f64, NetworkError> {
        if !self.is_valid() {
            return Err(NetworkError::InvalidStructure(
                "cannot test an invalid network",
            ));
        }

        self.validate_dataset(tester.dataset())?;

        let mut correct = 0usize;

        for entry in tester.dataset().entries() {
            self.apply_inputs(&entry.inputs)?;
            let actual = self.output_activation_levels()?;
            let expected = &entry.outputs;

            let entry_correct = match tester.strategy() {
                TestingStrategy::HighestValue => {
                    index_of_max(&actual) == index_of_max(expected)
                }
                TestingStrategy::FaultTolerance => {
                    let half_tolerance = tester.fault_tolerance() / 2.0;
                    expected.iter().zip(&actual).all(|(&expected, &actual)| {
                        expected < actual + half_tolerance && expected > actual - half_tolerance
                    })
                }
            };

            if entry_correct {
                correct += 1;
            }
        }

        let percentage = 100.0 * correct as f64 / tester.dataset().entries().len() as f64;
        debug!(correct, total = tester.dataset().entries().len(), percentage, "Tested network.");

        Ok(percentage)
    }

    /// Re-randomizes every weight and bias, discarding learned
    /// progress. Input-layer biases stay fixed at zero.
    fn reset_progress(&mut self, rng: &mut (impl Rng + ?Sized)) -> Result<(), NetworkError> {
        if !self.is_valid() {
            return Err(NetworkError::InvalidStructure(
                "cannot reset an invalid network",
            ));
        }

        let layers = self.layers.clone();
        for layer in &layers {
            layer.randomize_all(&mut self.graph, rng);
        }

        Ok(())
    }
}

fn build_layer(
    graph: &mut NeuronGraph,
    kind: LayerKind,
    activation: ActivationKind,
    neurons: usize,
) -> Result<Layer, NetworkError> {
    let mut layer = Layer::new(kind, activation);
    for _ in 0..neurons {
        let id = graph.add_neuron(activation);
        layer.register(graph, id)?;
    }
    Ok(layer)
}

/// Index of the largest value, resolving ties in favor of the first
/// maximum found.
fn index_of_max(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::dataset::DatasetEntry;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5EED)
    }

    /// A 1-in, `outputs`-out identity network wired with weight 1 on the
    /// first output and 0 elsewhere, so output activations are fully
    /// controlled by the applied input.
    fn passthrough_network(outputs: usize) -> FeedForwardNetwork {
        let mut network =
            FeedForwardNetwork::new(1, &[], outputs, ActivationKind::Identity).unwrap();
        network.generate_layer_connections(&mut rng()).unwrap();

        let input = network.input_layer().unwrap().neurons()[0];
        let output_neurons = network.output_layer().unwrap().neurons().to_vec();
        for (position, &neuron) in output_neurons.iter().enumerate() {
            let edge = network.connection_between(input, neuron).unwrap();
            network.set_weight(edge, if position == 0 { 1.0 } else { 0.0 });
            network.set_bias(neuron, 0.0);
        }

        network
    }

    #[test]
    fn constructor_rejects_empty_layers() {
        assert!(FeedForwardNetwork::new(0, &[], 1, ActivationKind::Relu).is_err());
        assert!(FeedForwardNetwork::new(1, &[], 0, ActivationKind::Relu).is_err());
        assert!(
            FeedForwardNetwork::new(1, &[(0, ActivationKind::Sigmoid)], 1, ActivationKind::Relu)
                .is_err()
        );
    }

    #[test]
    fn sorted_layers_run_input_to_output() {
        let network = FeedForwardNetwork::with_uniform_hidden_layers(
            2,
            3,
            ActivationKind::Relu,
            2,
            4,
            ActivationKind::Sigmoid,
        )
        .unwrap();

        let kinds: Vec<LayerKind> = network
            .sorted_layers()
            .iter()
            .map(|layer| layer.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                LayerKind::Input,
                LayerKind::Hidden,
                LayerKind::Hidden,
                LayerKind::Output
            ]
        );
    }

    #[test]
    fn generated_connections_chain_consecutive_layers() {
        let mut network = FeedForwardNetwork::with_uniform_hidden_layers(
            4,
            5,
            ActivationKind::Relu,
            1,
            2,
            ActivationKind::Relu,
        )
        .unwrap();
        network.generate_layer_connections(&mut rng()).unwrap();

        // 4x2 + 2x5 connections in total.
        assert_eq!(network.graph().connection_count(), 18);

        let sorted = network.sorted_layers();
        for pair in sorted.windows(2) {
            for &neuron in pair[0].neurons() {
                assert_eq!(
                    network.graph().neuron(neuron).unwrap().outgoing().len(),
                    pair[1].len()
                );
            }
            for &neuron in pair[1].neurons() {
                assert_eq!(
                    network.graph().neuron(neuron).unwrap().incoming().len(),
                    pair[0].len()
                );
            }
        }
    }

    #[test]
    fn apply_inputs_requires_matching_arity() {
        let mut network = FeedForwardNetwork::new(2, &[], 1, ActivationKind::Sigmoid).unwrap();
        assert_eq!(
            network.apply_inputs(&[1.0]),
            Err(NetworkError::ArgumentMismatch(
                "the number of supplied inputs does not equal the number of input neurons",
            ))
        );
        assert!(network.apply_inputs(&[1.0, 0.0]).is_ok());
    }

    #[test]
    fn validate_dataset_rejects_mismatches_and_empty_data() {
        let network = FeedForwardNetwork::new(2, &[], 1, ActivationKind::Sigmoid).unwrap();

        let empty = NetworkDataset::default();
        assert!(network.validate_dataset(&empty).is_err());

        let mut mismatched = NetworkDataset::default();
        mismatched.push(DatasetEntry::new(vec![1.0], vec![0.0]));
        assert!(network.validate_dataset(&mismatched).is_err());

        let mut matched = NetworkDataset::default();
        matched.push(DatasetEntry::new(vec![1.0, 0.0], vec![0.0]));
        assert!(network.validate_dataset(&matched).is_ok());
    }

    #[test]
    fn removing_every_neuron_invalidates_the_network() {
        let mut network = FeedForwardNetwork::new(2, &[], 1, ActivationKind::Sigmoid).unwrap();
        assert!(network.is_valid());

        let neurons = network.output_layer().unwrap().neurons().to_vec();
        let output = network
            .layers
            .iter_mut()
            .find(|layer| layer.kind() == LayerKind::Output)
            .unwrap();
        for neuron in neurons {
            output.remove(neuron);
        }

        assert!(!network.is_valid());
        assert!(network
            .generate_layer_connections(&mut rng())
            .is_err());
    }

    #[test]
    fn reset_progress_keeps_input_bias_zero_and_weights_bounded() {
        let mut network = FeedForwardNetwork::with_uniform_hidden_layers(
            3,
            2,
            ActivationKind::Sigmoid,
            1,
            4,
            ActivationKind::Relu,
        )
        .unwrap();
        let mut rng = rng();
        network.generate_layer_connections(&mut rng).unwrap();
        network.reset_progress(&mut rng).unwrap();

        for &neuron in network.input_layer().unwrap().neurons() {
            assert_eq!(network.graph().neuron(neuron).unwrap().bias(), 0.0);
        }

        for index in 0..network.graph().connection_count() {
            let weight = network
                .graph()
                .connection(crate::neuron::ConnectionId(index))
                .unwrap()
                .weight();
            assert!((0.0..=1.0).contains(&weight));
        }
    }

    #[test]
    fn learning_rate_clamps_negative_values() {
        let mut network = FeedForwardNetwork::new(1, &[], 1, ActivationKind::Identity).unwrap();
        network.set_learning_rate(-0.5);
        assert_eq!(network.learning_rate(), 0.0);
        network.set_learning_rate(0.25);
        assert_eq!(network.learning_rate(), 0.25);
    }

    #[test]
    fn highest_value_scores_argmax_positions() {
        let mut network = passthrough_network(3);

        // Output 0 mirrors the input; outputs 1 and 2 are always zero.
        let mut tester = NetworkTester::default();
        tester.dataset_mut().push(DatasetEntry::new(
            vec![0.9],
            vec![1.0, 0.0, 0.0],
        ));
        tester.dataset_mut().push(DatasetEntry::new(
            vec![0.9],
            vec![0.0, 1.0, 0.0],
        ));

        let percentage = network.test(&tester).unwrap();
        assert_eq!(percentage, 50.0);
    }

    #[test]
    fn fault_tolerance_boundary_is_strictly_open() {
        // Binary-exact values so the boundary case is observable: a
        // difference of exactly half the tolerance must not count.
        let mut network = passthrough_network(1);

        let mut tester = NetworkTester::default();
        tester.set_strategy(TestingStrategy::FaultTolerance);
        tester.set_fault_tolerance(0.25);

        // actual = 0.5, expected = 0.625: off by exactly tolerance / 2.
        tester
            .dataset_mut()
            .push(DatasetEntry::new(vec![0.5], vec![0.625]));
        assert_eq!(network.test(&tester).unwrap(), 0.0);

        // A difference strictly inside the window does count.
        let mut tester = NetworkTester::default();
        tester.set_strategy(TestingStrategy::FaultTolerance);
        tester.set_fault_tolerance(0.25);
        tester
            .dataset_mut()
            .push(DatasetEntry::new(vec![0.5], vec![0.609375]));
        assert_eq!(network.test(&tester).unwrap(), 100.0);
    }

    #[test]
    fn clone_is_a_deep_copy() {
        let mut network = FeedForwardNetwork::new(1, &[], 1, ActivationKind::Identity).unwrap();
        let mut rng = rng();
        network.generate_layer_connections(&mut rng).unwrap();

        let mut copy = network.clone();
        copy.reset_progress(&mut rng).unwrap();
        // Mutating the copy's weights must leave the original untouched.
        let input = network.input_layer().unwrap().neurons()[0];
        let output = network.output_layer().unwrap().neurons()[0];
        let edge = network.connection_between(input, output).unwrap();

        let original_weight = network.graph().connection(edge).unwrap().weight();
        copy.set_weight(edge, original_weight + 1.0);
        assert_eq!(
            network.graph().connection(edge).unwrap().weight(),
            original_weight
        );
    }

    #[test]
    fn index_of_max_prefers_the_first_maximum() {
        assert_eq!(index_of_max(&[0.1, 0.9, 0.2]), Some(1));
        assert_eq!(index_of_max(&[0.9, 0.1, 0.9]), Some(0));
        assert_eq!(index_of_max(&[]), None);
    }
}
