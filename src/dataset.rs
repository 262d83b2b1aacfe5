use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One input/output vector pair for a single pass of the network.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DatasetEntry {
    pub name: Option<String>,
    pub inputs: Vec<f64>,
    pub outputs: Vec<f64>,
}

impl DatasetEntry {
    pub fn new(inputs: Vec<f64>, outputs: Vec<f64>) -> Self {
        Self {
            name: None,
            inputs,
            outputs,
        }
    }

    pub fn named(name: impl Into<String>, inputs: Vec<f64>, outputs: Vec<f64>) -> Self {
        Self {
            name: Some(name.into()),
            inputs,
            outputs,
        }
    }

    /// Whether the entry carries exactly the given number of inputs and
    /// outputs.
    pub fn is_valid(&self, inputs: usize, outputs: usize) -> bool {
        self.inputs.len() == inputs && self.outputs.len() == outputs
    }
}

/// An ordered collection of dataset entries used to train or test a
/// network. Entry order is significant: training walks it as-is and any
/// shuffling is the caller's responsibility beforehand.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct NetworkDataset {
    entries: Vec<DatasetEntry>,
}

impl NetworkDataset {
    pub fn new(entries: Vec<DatasetEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: DatasetEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A dataset is valid when every entry has the same input count and
    /// the same output count. An empty dataset is invalid.
    pub fn is_valid(&self) -> bool {
        match self.entries.first() {
            Some(first) => self.is_valid_for(first.inputs.len(), first.outputs.len()),
            None => false,
        }
    }

    /// Whether every entry has exactly the given input and output counts.
    pub fn is_valid_for(&self, inputs: usize, outputs: usize) -> bool {
        !self.entries.is_empty()
            && self
                .entries
                .iter()
                .all(|entry| entry.is_valid(inputs, outputs))
    }

    /// Shuffles the entry order in place.
    pub fn shuffle(&mut self, rng: &mut (impl Rng + ?Sized)) {
        self.entries.shuffle(rng);
    }
}

/// Training configuration: the dataset to learn and how many epochs to
/// run it for. After training, `costs_per_epoch` holds the average
/// per-example cost recorded at each epoch, for convergence monitoring.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NetworkTrainer {
    dataset: NetworkDataset,
    epochs: usize,
    costs_per_epoch: Vec<Vec<f64>>,
}

impl NetworkTrainer {
    /// Creates a trainer. An epoch count of zero clamps to one.
    pub fn new(dataset: NetworkDataset, epochs: usize) -> Self {
        Self {
            dataset,
            epochs: epochs.max(1),
            costs_per_epoch: Vec::new(),
        }
    }

    pub fn dataset(&self) -> &NetworkDataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut NetworkDataset {
        &mut self.dataset
    }

    pub fn epochs(&self) -> usize {
        self.epochs.max(1)
    }

    pub fn set_epochs(&mut self, epochs: usize) {
        self.epochs = epochs.max(1);
    }

    /// Per-example average costs, one bucket per epoch in order.
    pub fn costs_per_epoch(&self) -> &[Vec<f64>] {
        &self.costs_per_epoch
    }

    pub fn reset_costs(&mut self) {
        self.costs_per_epoch.clear();
    }

    pub(crate) fn push_epoch_costs(&mut self, costs: Vec<f64>) {
        self.costs_per_epoch.push(costs);
    }
}

/// How a tester decides whether one forward pass was correct.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum TestingStrategy {
    /// Correct when the largest actual output sits at the same position
    /// as the largest expected output.
    HighestValue,
    /// Correct when every output lies strictly within half the fault
    /// tolerance of its expected value.
    FaultTolerance,
}

/// Testing configuration: the dataset to score and the strategy to
/// score it with.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NetworkTester {
    dataset: NetworkDataset,
    strategy: TestingStrategy,
    fault_tolerance: f64,
}

impl Default for NetworkTester {
    fn default() -> Self {
        Self {
            dataset: NetworkDataset::default(),
            strategy: TestingStrategy::HighestValue,
            fault_tolerance: 0.1,
        }
    }
}

impl NetworkTester {
    pub fn new(dataset: NetworkDataset, strategy: TestingStrategy) -> Self {
        Self {
            dataset,
            strategy,
            ..Self::default()
        }
    }

    pub fn dataset(&self) -> &NetworkDataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut NetworkDataset {
        &mut self.dataset
    }

    pub fn strategy(&self) -> TestingStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: TestingStrategy) {
        self.strategy = strategy;
    }

    /// The full width of the acceptance window used by
    /// [`TestingStrategy::FaultTolerance`].
    pub fn fault_tolerance(&self) -> f64 {
        self.fault_tolerance
    }

    pub fn set_fault_tolerance(&mut self, fault_tolerance: f64) {
        self.fault_tolerance = fault_tolerance;
    }
}
