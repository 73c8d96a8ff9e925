//! Network structure and forward propagation.

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Errors produced when building, loading or saving a network
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
    #[error("Malformed network data: {0}")]
    MalformedNetworkData(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Squashing function applied to every non-input neuron
#[inline]
pub fn activation(x: f32) -> f32 {
    x.tanh()
}

/// A single neuron
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    /// Activation from the last forward pass
    pub potential: f32,
    /// Persistent additive offset
    pub bias: f32,
}

impl Neuron {
    fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            potential: 0.0,
            bias: rng.gen_range(-0.5..0.5),
        }
    }
}

/// An ordered group of neurons
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub neurons: Vec<Neuron>,
}

impl Layer {
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    /// Recompute this layer's potentials from the previous layer
    fn feed_forward(&mut self, previous: &Layer, weights: &Array2<f32>) {
        for (j, neuron) in self.neurons.iter_mut().enumerate() {
            let value: f32 = weights
                .row(j)
                .iter()
                .zip(&previous.neurons)
                .map(|(w, source)| w * source.potential)
                .sum();
            neuron.potential = activation(value + neuron.bias);
        }
    }
}

/// Connection weights between every pair of adjacent layers.
///
/// Transition `i` is a `(|layer i+1|, |layer i|)` matrix, so entry `[i][j][k]`
/// is the weight from neuron `k` in layer `i` to neuron `j` in layer `i + 1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WeightData", into = "WeightData")]
pub struct WeightTable {
    transitions: Vec<Array2<f32>>,
}

/// Jagged on-disk form of the weight table
#[derive(Serialize, Deserialize)]
struct WeightData {
    weights: Vec<Vec<Vec<f32>>>,
}

impl TryFrom<WeightData> for WeightTable {
    type Error = NetworkError;

    fn try_from(data: WeightData) -> Result<Self, Self::Error> {
        let mut transitions = Vec::with_capacity(data.weights.len());

        for (i, rows) in data.weights.into_iter().enumerate() {
            let dest = rows.len();
            let source = rows.first().map(Vec::len).unwrap_or(0);
            if let Some(j) = rows.iter().position(|row| row.len() != source) {
                return Err(NetworkError::MalformedNetworkData(format!(
                    "transition {} row {} has {} weights, expected {}",
                    i,
                    j,
                    rows[j].len(),
                    source
                )));
            }

            let flat: Vec<f32> = rows.into_iter().flatten().collect();
            let matrix = Array2::from_shape_vec((dest, source), flat)
                .map_err(|e| NetworkError::MalformedNetworkData(e.to_string()))?;
            transitions.push(matrix);
        }

        Ok(Self { transitions })
    }
}

impl From<WeightTable> for WeightData {
    fn from(table: WeightTable) -> Self {
        let weights = table
            .transitions
            .iter()
            .map(|m| m.rows().into_iter().map(|row| row.to_vec()).collect())
            .collect();
        Self { weights }
    }
}

impl WeightTable {
    fn new<R: Rng + ?Sized>(layers: &[Layer], rng: &mut R) -> Self {
        let transitions = layers
            .windows(2)
            .map(|pair| {
                Array2::from_shape_fn((pair[1].len(), pair[0].len()), |_| {
                    rng.gen_range(-0.5..0.5)
                })
            })
            .collect();
        Self { transitions }
    }

    /// Number of layer transitions
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Weight matrix of one transition, shaped `(dest, source)`
    pub fn transition(&self, index: usize) -> Option<&Array2<f32>> {
        self.transitions.get(index)
    }

    pub fn transitions(&self) -> &[Array2<f32>] {
        &self.transitions
    }

    pub(crate) fn transitions_mut(&mut self) -> &mut [Array2<f32>] {
        &mut self.transitions
    }

    /// Weight from `source` in layer `transition` to `dest` in the next layer
    pub fn get(&self, transition: usize, source: usize, dest: usize) -> Option<f32> {
        self.transitions
            .get(transition)?
            .get((dest, source))
            .copied()
    }

    /// Total number of weights across all transitions
    pub fn weight_count(&self) -> usize {
        self.transitions.iter().map(|m| m.len()).sum()
    }
}

/// Fixed-topology feedforward network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkData")]
pub struct Network {
    pub layers: Vec<Layer>,
    pub weights: WeightTable,
}

/// Unchecked form used while deserializing
#[derive(Deserialize)]
struct NetworkData {
    layers: Vec<Layer>,
    weights: WeightTable,
}

impl TryFrom<NetworkData> for Network {
    type Error = NetworkError;

    fn try_from(data: NetworkData) -> Result<Self, Self::Error> {
        let network = Network {
            layers: data.layers,
            weights: data.weights,
        };
        network.validate()?;
        Ok(network)
    }
}

impl Network {
    /// Create a randomly initialized network with one layer per entry
    pub fn new<R: Rng + ?Sized>(layer_sizes: &[usize], rng: &mut R) -> Result<Self, NetworkError> {
        check_topology(layer_sizes)?;

        let layers: Vec<Layer> = layer_sizes
            .iter()
            .map(|&size| Layer {
                neurons: (0..size).map(|_| Neuron::new(rng)).collect(),
            })
            .collect();
        let weights = WeightTable::new(&layers, rng);

        Ok(Self { layers, weights })
    }

    /// Create a network drawing from the thread-local RNG
    pub fn new_random(layer_sizes: &[usize]) -> Result<Self, NetworkError> {
        Self::new(layer_sizes, &mut rand::thread_rng())
    }

    /// Run a forward pass and return the output layer potentials.
    ///
    /// Inputs beyond the input layer are ignored; input neurons without a
    /// matching entry keep their previous potential.
    pub fn evaluate(&mut self, inputs: &[f32]) -> Vec<f32> {
        for (neuron, &input) in self.layers[0].neurons.iter_mut().zip(inputs) {
            neuron.potential = input;
        }

        for i in 1..self.layers.len() {
            let (before, after) = self.layers.split_at_mut(i);
            after[0].feed_forward(&before[i - 1], &self.weights.transitions[i - 1]);
        }

        self.outputs()
    }

    /// Output layer potentials from the last forward pass
    pub fn outputs(&self) -> Vec<f32> {
        self.layers
            .last()
            .map(|layer| layer.neurons.iter().map(|n| n.potential).collect())
            .unwrap_or_default()
    }

    /// Weight from `source` in layer `transition` to `dest` in the next layer
    pub fn weight(&self, transition: usize, source: usize, dest: usize) -> Option<f32> {
        self.weights.get(transition, source, dest)
    }

    /// Overwrite one weight; returns false when the address is out of range
    pub fn set_weight(&mut self, transition: usize, source: usize, dest: usize, value: f32) -> bool {
        match self
            .weights
            .transitions
            .get_mut(transition)
            .and_then(|m| m.get_mut((dest, source)))
        {
            Some(w) => {
                *w = value;
                true
            }
            None => false,
        }
    }

    pub fn layer_sizes(&self) -> Vec<usize> {
        self.layers.iter().map(Layer::len).collect()
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.layers.first().map(Layer::len).unwrap_or(0)
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.layers.last().map(Layer::len).unwrap_or(0)
    }

    /// Get total number of parameters (weights + biases)
    pub fn parameter_count(&self) -> usize {
        let biases: usize = self.layers.iter().map(Layer::len).sum();
        biases + self.weights.weight_count()
    }

    /// Check if network is valid (no NaN/Inf)
    pub fn is_valid(&self) -> bool {
        let biases_ok = self
            .layers
            .iter()
            .flat_map(|l| &l.neurons)
            .all(|n| n.bias.is_finite() && n.potential.is_finite());
        let weights_ok = self
            .weights
            .transitions
            .iter()
            .all(|m| m.iter().all(|w| w.is_finite()));
        biases_ok && weights_ok
    }

    /// Check that the weight table matches the layer sizes
    pub fn validate(&self) -> Result<(), NetworkError> {
        let sizes = self.layer_sizes();
        check_topology(&sizes)
            .map_err(|e| NetworkError::MalformedNetworkData(e.to_string()))?;

        if self.weights.len() != sizes.len() - 1 {
            return Err(NetworkError::MalformedNetworkData(format!(
                "{} layers need {} weight transitions, found {}",
                sizes.len(),
                sizes.len() - 1,
                self.weights.len()
            )));
        }

        for (i, matrix) in self.weights.transitions.iter().enumerate() {
            let expected = (sizes[i + 1], sizes[i]);
            if matrix.dim() != expected {
                return Err(NetworkError::MalformedNetworkData(format!(
                    "transition {} has shape {:?}, expected {:?}",
                    i,
                    matrix.dim(),
                    expected
                )));
            }
        }

        Ok(())
    }
}

pub(crate) fn check_topology(layer_sizes: &[usize]) -> Result<(), NetworkError> {
    if layer_sizes.len() < 2 {
        return Err(NetworkError::InvalidTopology(format!(
            "need at least 2 layers, got {}",
            layer_sizes.len()
        )));
    }
    if let Some(i) = layer_sizes.iter().position(|&s| s == 0) {
        return Err(NetworkError::InvalidTopology(format!("layer {} is empty", i)));
    }
    Ok(())
}
