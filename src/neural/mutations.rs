//! Parameter mutation for cloned networks.

use super::network::Network;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for mutation operations
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Percent probability (0-100) that each parameter is perturbed
    pub chance: f32,
    /// Half-width of the uniform perturbation
    pub amount: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            chance: 10.0,
            amount: 0.1,
        }
    }
}

/// Perturb one parameter in place if the roll passes
#[inline]
fn perturb<R: Rng + ?Sized>(value: &mut f32, percent_chance: f32, amount: f32, rng: &mut R) {
    let roll: f32 = rng.gen_range(0.0..100.0);
    if percent_chance > 0.0 && roll <= percent_chance {
        *value += rng.gen_range(-1.0f32..=1.0) * amount;
    }
}

impl Network {
    /// Independently perturb every bias and weight.
    ///
    /// Each parameter mutates with probability `percent_chance` percent by a
    /// uniform delta in `[-amount, amount]`. Biases are visited first, layer
    /// by layer, then weights in `[transition][dest][source]` order.
    pub fn mutate<R: Rng + ?Sized>(&mut self, percent_chance: f32, amount: f32, rng: &mut R) {
        let amount = amount.abs();

        for layer in &mut self.layers {
            for neuron in &mut layer.neurons {
                perturb(&mut neuron.bias, percent_chance, amount, rng);
            }
        }

        for matrix in self.weights.transitions_mut() {
            for w in matrix.iter_mut() {
                perturb(w, percent_chance, amount, rng);
            }
        }
    }

    /// Apply a mutation according to config
    pub fn mutate_with<R: Rng + ?Sized>(&mut self, config: &MutationConfig, rng: &mut R) {
        self.mutate(config.chance, config.amount, rng);
    }
}
