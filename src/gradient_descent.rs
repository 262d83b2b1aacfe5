use std::collections::HashMap;

use tracing::{debug, trace};

use crate::dataset::NetworkTrainer;
use crate::layer::{Layer, LayerKind};
use crate::network::{FeedForwardNetwork, Network, NetworkError};
use crate::neuron::NeuronId;

/// Scratch space for one backward pass: the cost derivatives with
/// respect to every neuron's activation and bias and every connection's
/// weight, indexed by arena position.
///
/// Keeping the gradients here keeps the forward-pass data (weights,
/// biases) separate from transient training state; the workspace is
/// reset at the start of every backward pass.
#[derive(Clone, Debug, Default)]
pub struct GradientWorkspace {
    d_cost_wrt_activation: Vec<f64>,
    d_cost_wrt_bias: Vec<f64>,
    d_cost_wrt_weight: Vec<f64>,
}

impl GradientWorkspace {
    fn reset(&mut self, neurons: usize, connections: usize) {
        self.d_cost_wrt_activation.clear();
        self.d_cost_wrt_activation.resize(neurons, 0.0);
        self.d_cost_wrt_bias.clear();
        self.d_cost_wrt_bias.resize(neurons, 0.0);
        self.d_cost_wrt_weight.clear();
        self.d_cost_wrt_weight.resize(connections, 0.0);
    }

    pub fn d_cost_wrt_activation(&self, neuron: NeuronId) -> f64 {
        self.d_cost_wrt_activation[neuron.0]
    }

    pub fn d_cost_wrt_bias(&self, neuron: NeuronId) -> f64 {
        self.d_cost_wrt_bias[neuron.0]
    }

    pub fn d_cost_wrt_weight(&self, connection: crate::neuron::ConnectionId) -> f64 {
        self.d_cost_wrt_weight[connection.0]
    }
}

/// The squared difference between an actual and an expected output
/// activation. Unscaled: no 1/2 factor.
pub fn activation_cost(actual: f64, expected: f64) -> f64 {
    (actual - expected).powi(2)
}

impl FeedForwardNetwork {
    /// Trains the network on every dataset entry, in dataset order, for
    /// the trainer's number of epochs. Each entry gets a forward pass,
    /// a backward pass, and an immediate weight/bias update; gradients
    /// are never batched across entries. The average per-output cost of
    /// each entry is recorded in the trainer's cost trace.
    pub(crate) fn train_network(
        &mut self,
        trainer: &mut NetworkTrainer,
    ) -> Result<(), NetworkError> {
        if !self.is_valid() {
            return Err(NetworkError::InvalidStructure(
                "cannot train an invalid network",
            ));
        }

        self.validate_dataset(trainer.dataset())?;
        trainer.reset_costs();

        let output_neurons = self.output_layer()?.neurons().to_vec();
        let mut workspace = GradientWorkspace::default();

        for epoch in 0..trainer.epochs() {
            let mut epoch_costs = Vec::with_capacity(trainer.dataset().len());

            for entry in trainer.dataset().entries() {
                self.apply_inputs(&entry.inputs)?;

                // Pair each output neuron with its expected activation,
                // in registration order.
                let mut expected = HashMap::with_capacity(output_neurons.len());
                let mut entry_cost = 0.0;
                for (&neuron, &expected_activation) in output_neurons.iter().zip(&entry.outputs) {
                    expected.insert(neuron, expected_activation);
                    let actual = self.graph().activation_level(neuron)?;
                    entry_cost += activation_cost(actual, expected_activation);
                }
                epoch_costs.push(entry_cost / output_neurons.len() as f64);

                self.generate_network_derivatives(&expected, &mut workspace)?;
                self.apply_gradients(&workspace);
            }

            let mean_cost = epoch_costs.iter().sum::<f64>() / epoch_costs.len() as f64;
            debug!(epoch, mean_cost, "Finished training epoch.");

            trainer.push_epoch_costs(epoch_costs);
        }

        Ok(())
    }

    /// Backpropagation: walks the layers in reverse sorted order and
    /// fills the workspace with the cost derivative of every bias and
    /// weight, applying the chain rule neuron by neuron.
    ///
    /// Every output-layer neuron must appear in `expected`. Hidden and
    /// input neurons read the activation derivative accumulated by the
    /// downstream layer, which the reverse walk has already visited.
    pub(crate) fn generate_network_derivatives(
        &self,
        expected: &HashMap<NeuronId, f64>,
        workspace: &mut GradientWorkspace,
    ) -> Result<(), NetworkError> {
        let output_layer = self.output_layer()?;
        if !output_layer
            .neurons()
            .iter()
            .all(|neuron| expected.contains_key(neuron))
        {
            return Err(NetworkError::ArgumentMismatch(
                "every output neuron must have an expected activation to backpropagate",
            ));
        }

        workspace.reset(self.graph().neuron_count(), self.graph().connection_count());

        let sorted: Vec<&Layer> = self.sorted_layers();

        for layer in sorted.into_iter().rev() {
            let is_output = layer.kind() == LayerKind::Output;

            for &id in layer.neurons() {
                let a = self.graph().activation_level(id)?;
                let z = self.graph().compute_activation(id, false)?;

                let d_cost_wrt_activation = if is_output {
                    2.0 * (a - expected[&id])
                } else {
                    workspace.d_cost_wrt_activation[id.0]
                };
                let d_activation_wrt_z = self
                    .graph()
                    .neuron(id)
                    .ok_or(NetworkError::InvalidStructure(
                        "a layer references a neuron that is not in the graph",
                    ))?
                    .kind()
                    .derivative(z);
                let d_cost_wrt_bias = d_activation_wrt_z * d_cost_wrt_activation;

                workspace.d_cost_wrt_activation[id.0] = d_cost_wrt_activation;
                workspace.d_cost_wrt_bias[id.0] = d_cost_wrt_bias;

                let incoming = self
                    .graph()
                    .neuron(id)
                    .map(|neuron| neuron.incoming().to_vec())
                    .unwrap_or_default();

                for edge in incoming {
                    let connection = self.graph().connection(edge).ok_or(
                        NetworkError::InvalidStructure(
                            "a neuron references a connection that is not in the graph",
                        ),
                    )?;
                    let from = connection.from();
                    let weight = connection.weight();

                    let upstream_activation = self.graph().activation_level(from)?;
                    workspace.d_cost_wrt_weight[edge.0] =
                        upstream_activation * d_activation_wrt_z * d_cost_wrt_activation;

                    // Sum rule: the upstream neuron feeds every neuron in
                    // this layer, so its activation derivative accumulates
                    // one term per downstream consumer.
                    workspace.d_cost_wrt_activation[from.0] +=
                        weight * d_activation_wrt_z * d_cost_wrt_activation;
                }

                trace!(
                    neuron = id.0,
                    d_cost_wrt_activation,
                    d_cost_wrt_bias,
                    "Computed neuron derivatives."
                );
            }
        }

        Ok(())
    }

    /// Applies the computed gradients: one learning-rate-scaled step
    /// against every bias and weight, walking the layers in sorted
    /// order. Every connection is visited exactly once, as an outgoing
    /// edge of its source neuron.
    pub(crate) fn apply_gradients(&mut self, workspace: &GradientWorkspace) {
        let rate = self.learning_rate();
        let sorted: Vec<Vec<NeuronId>> = self
            .sorted_layers()
            .into_iter()
            .map(|layer| layer.neurons().to_vec())
            .collect();

        for layer in sorted {
            for id in layer {
                let graph = self.graph_mut();

                let bias = graph.neuron(id).map(|neuron| neuron.bias()).unwrap_or(0.0);
                graph.set_bias(id, bias - rate * workspace.d_cost_wrt_bias[id.0]);

                let outgoing = graph
                    .neuron(id)
                    .map(|neuron| neuron.outgoing().to_vec())
                    .unwrap_or_default();
                for edge in outgoing {
                    let weight = graph
                        .connection(edge)
                        .map(|connection| connection.weight())
                        .unwrap_or(0.0);
                    graph.set_weight(edge, weight - rate * workspace.d_cost_wrt_weight[edge.0]);
                }
            }
        }
    }
}
