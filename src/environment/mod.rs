//! Host-side simulation interface.
//!
//! The trainer never inspects what an agent does in the world. Everything it
//! needs goes through [`Environment`]: filling the input vector, applying the
//! output vector, rewards, and end-of-trial fitness.

pub mod corridor;

pub use corridor::{Corridor, FitnessGate};

use crate::population::AgentId;

/// Result of applying one tick of network output
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Step {
    /// Fitness earned during this tick
    pub reward: f32,
    /// The environment ended this agent's trial
    pub terminal: bool,
}

/// Why a trial ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialEnd {
    /// The trial duration elapsed
    Timeout,
    /// The environment reported a terminal step (collision, goal, ...)
    Terminated,
}

/// Environment-specific agent adapter
pub trait Environment {
    /// Inputs the environment writes; `None` if it adapts to any size
    fn input_size(&self) -> Option<usize> {
        None
    }

    /// Outputs the environment reads; `None` if it adapts to any size
    fn output_size(&self) -> Option<usize> {
        None
    }

    /// Put an agent back at the start of a trial
    fn restart_agent(&mut self, agent: AgentId);

    /// Fill `inputs` with what the agent observes this tick
    fn sense(&mut self, agent: AgentId, inputs: &mut Vec<f32>);

    /// Apply network outputs and advance the agent by `dt`
    fn act(&mut self, agent: AgentId, outputs: &[f32], dt: f32) -> Step;

    /// Fitness contribution computed when a trial ends
    fn trial_end_fitness(&mut self, agent: AgentId, end: TrialEnd) -> f32;

    /// Called once when an agent is removed from the population
    fn discard_agent(&mut self, _agent: AgentId) {}

    /// Called before every generation restart
    fn on_generation_restart(&mut self) {}
}
