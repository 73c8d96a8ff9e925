//! Neural network module for agent brains.
//!
//! Fixed-topology feedforward networks with:
//! - Dense per-transition weight matrices
//! - tanh activation
//! - Per-parameter random mutation

mod network;
mod mutations;

pub use network::{activation, Layer, Network, NetworkError, Neuron, WeightTable};
pub(crate) use network::check_topology;
pub use mutations::MutationConfig;
