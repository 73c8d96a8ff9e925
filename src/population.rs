//! Agents and the generational selection cycle.

use crate::config::Config;
use crate::neural::{check_topology, MutationConfig, Network, NetworkError};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Stable identifier handed to the environment for each agent
pub type AgentId = u64;

/// Lifecycle of an agent within one trial
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Running,
    Finished,
}

/// One network under evaluation
#[derive(Clone, Debug)]
pub struct Agent {
    pub id: AgentId,
    pub network: Network,
    pub fitness: f32,
    pub state: AgentState,
    /// Time spent in the current trial
    pub run_time: f32,
    /// Generation this agent was created in
    pub born: u32,
}

impl Agent {
    fn new(id: AgentId, network: Network, born: u32) -> Self {
        Self {
            id,
            network,
            fitness: 0.0,
            state: AgentState::Running,
            run_time: 0.0,
            born,
        }
    }

    /// Reset per-trial state, keeping the network
    pub fn restart(&mut self) {
        self.fitness = 0.0;
        self.run_time = 0.0;
        self.state = AgentState::Running;
    }

    /// Add to the fitness accumulator; ignored once the trial has finished
    pub fn reward(&mut self, amount: f32) {
        if self.is_running() {
            self.fitness += amount;
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == AgentState::Running
    }
}

/// Outcome of one generation's selection step
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: u32,
    /// Agents that finished their trial
    pub finished: usize,
    /// Agents carried into the next generation
    pub promoted: usize,
    /// Ids of agents removed permanently
    pub discarded: Vec<AgentId>,
    pub best_fitness: Option<f32>,
    pub mean_fitness: Option<f32>,
    pub worst_fitness: Option<f32>,
}

/// Cutoff below which ranked agents are discarded.
///
/// `round(count * percentile + 0.49)` with ties to even, clamped to `count`.
pub fn cutoff_index(count: usize, percentile: f32) -> usize {
    let raw = (count as f32 * percentile + 0.49).round_ties_even();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(count)
    }
}

/// Agents split into the ones still running and the ones done with their trial
pub struct Population {
    active: Vec<Agent>,
    finished: Vec<Agent>,

    /// Target number of agents per generation
    pub size: usize,
    pub promotion_percentile: f32,
    pub mutation: MutationConfig,
    /// Topology for freshly created networks
    layer_sizes: Vec<usize>,

    generation: u32,
    next_agent_id: AgentId,

    rng: ChaCha8Rng,
    seed: u64,
}

impl Population {
    /// Create an empty population from config
    pub fn new(config: &Config) -> Result<Self, NetworkError> {
        let seed = rand::thread_rng().gen();
        Self::new_with_seed(config, seed)
    }

    /// Create an empty population with a specific seed for reproducibility
    pub fn new_with_seed(config: &Config, seed: u64) -> Result<Self, NetworkError> {
        check_topology(&config.network.layer_sizes)?;

        Ok(Self {
            active: Vec::with_capacity(config.population.size),
            finished: Vec::with_capacity(config.population.size),
            size: config.population.size,
            promotion_percentile: config.population.promotion_percentile,
            mutation: config.mutation.clone(),
            layer_sizes: config.network.layer_sizes.clone(),
            generation: 0,
            next_agent_id: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed generations
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn active(&self) -> &[Agent] {
        &self.active
    }

    pub fn finished(&self) -> &[Agent] {
        &self.finished
    }

    pub fn active_ids(&self) -> Vec<AgentId> {
        self.active.iter().map(|a| a.id).collect()
    }

    /// Total agents in either collection
    pub fn len(&self) -> usize {
        self.active.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.active
            .iter()
            .chain(&self.finished)
            .find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.active
            .iter_mut()
            .chain(self.finished.iter_mut())
            .find(|a| a.id == id)
    }

    pub(crate) fn active_mut(&mut self) -> &mut [Agent] {
        &mut self.active
    }

    /// Restart surviving agents and refill to the target size.
    ///
    /// Returns the ids of newly created agents. Survivors are used as clone
    /// sources in round-robin order; each clone is mutated once.
    pub fn start_generation(&mut self) -> Vec<AgentId> {
        for agent in &mut self.active {
            agent.restart();
        }

        let sources = self.active.len();
        let mut source_index = 0;
        let mut created = Vec::new();

        while self.active.len() < self.size {
            let network = if sources > 0 {
                let mut child = self.active[source_index].network.clone();
                source_index = (source_index + 1) % sources;
                child.mutate_with(&self.mutation, &mut self.rng);
                child
            } else {
                self.fresh_network()
            };

            let id = self.next_agent_id;
            self.next_agent_id += 1;
            self.active.push(Agent::new(id, network, self.generation));
            created.push(id);
        }

        log::debug!(
            "Generation {} started: {} agents ({} new, {} sources)",
            self.generation,
            self.active.len(),
            created.len(),
            sources
        );

        created
    }

    fn fresh_network(&mut self) -> Network {
        match Network::new(&self.layer_sizes, &mut self.rng) {
            Ok(net) => net,
            // Topology was checked when it was adopted
            Err(e) => unreachable!("stored topology rejected: {}", e),
        }
    }

    /// Move an agent from active to finished.
    ///
    /// Returns false if the agent is not active (already finished or unknown).
    pub fn finish(&mut self, id: AgentId) -> bool {
        match self.active.iter().position(|a| a.id == id) {
            Some(index) => {
                let mut agent = self.active.remove(index);
                agent.state = AgentState::Finished;
                self.finished.push(agent);
                true
            }
            None => false,
        }
    }

    /// Highest-fitness agent among those that finished this generation
    pub fn best_finished(&self) -> Option<&Agent> {
        // max_by returns the last maximum, matching the end of an ascending sort
        self.finished
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// Rank finished agents, discard the bottom percentile, promote the rest.
    ///
    /// Does not restart anything; call [`Population::start_generation`] next.
    pub fn end_generation(&mut self) -> GenerationReport {
        let finished_count = self.finished.len();
        let mut report = GenerationReport {
            generation: self.generation,
            finished: finished_count,
            ..Default::default()
        };
        self.generation += 1;

        if finished_count == 0 {
            return report;
        }

        self.finished.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));

        let total: f32 = self.finished.iter().map(|a| a.fitness).sum();
        report.worst_fitness = self.finished.first().map(|a| a.fitness);
        report.best_fitness = self.finished.last().map(|a| a.fitness);
        report.mean_fitness = Some(total / finished_count as f32);

        let cutoff = cutoff_index(finished_count, self.promotion_percentile);
        let promoted = self.finished.split_off(cutoff);
        report.discarded = self.finished.drain(..).map(|a| a.id).collect();
        report.promoted = promoted.len();
        self.active.extend(promoted);

        report
    }

    /// Replace every agent with unmutated copies of `network`.
    ///
    /// The network's topology becomes the topology for fresh agents. Returns
    /// the ids of the removed agents.
    pub fn reseed_from(&mut self, network: &Network) -> Result<Vec<AgentId>, NetworkError> {
        network.validate()?;

        let removed: Vec<AgentId> = self
            .active
            .drain(..)
            .chain(self.finished.drain(..))
            .map(|a| a.id)
            .collect();

        self.layer_sizes = network.layer_sizes();
        for _ in 0..self.size {
            let id = self.next_agent_id;
            self.next_agent_id += 1;
            self.active.push(Agent::new(id, network.clone(), self.generation));
        }

        Ok(removed)
    }
}
