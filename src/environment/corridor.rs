//! Reference environment: point masses racing down a walled corridor.
//!
//! Agents start at the origin and push themselves around a plane with four
//! outputs (`+x`, `+z`, `-x`, `-z`). Gates placed along `+x` award fitness the
//! first time each agent crosses them in a generation. Touching a wall ends
//! the trial. At the end of a trial the agent's `x` coordinate is its final
//! fitness contribution.

use super::{Environment, Step, TrialEnd};
use crate::config::CorridorConfig;
use crate::population::AgentId;
use std::collections::{HashMap, HashSet};

/// Number of inputs the corridor writes
pub const CORRIDOR_INPUTS: usize = 6;
/// Number of outputs the corridor reads
pub const CORRIDOR_OUTPUTS: usize = 4;

/// Kinematic state of one agent
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Body {
    pub x: f32,
    pub z: f32,
    pub vx: f32,
    pub vz: f32,
}

/// Awards fitness once per agent per generation
#[derive(Clone, Debug)]
pub struct FitnessGate {
    /// Position along the corridor
    pub x: f32,
    pub value: f32,
    already_triggered: HashSet<AgentId>,
}

impl FitnessGate {
    pub fn new(x: f32, value: f32) -> Self {
        Self {
            x,
            value,
            already_triggered: HashSet::new(),
        }
    }

    /// Reward for `agent` if it is past the gate and has not been paid yet
    pub fn trigger(&mut self, agent: AgentId, body: &Body) -> f32 {
        if body.x >= self.x && self.already_triggered.insert(agent) {
            self.value
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.already_triggered.clear();
    }

    pub fn triggered_count(&self) -> usize {
        self.already_triggered.len()
    }
}

/// Walled corridor environment
pub struct Corridor {
    pub config: CorridorConfig,
    pub gates: Vec<FitnessGate>,
    bodies: HashMap<AgentId, Body>,
}

impl Corridor {
    pub fn new(config: CorridorConfig) -> Self {
        let gates = (1..=config.gate_count)
            .map(|i| FitnessGate::new(i as f32 * config.gate_spacing, config.gate_value))
            .collect();

        Self {
            config,
            gates,
            bodies: HashMap::new(),
        }
    }

    pub fn body(&self, agent: AgentId) -> Option<&Body> {
        self.bodies.get(&agent)
    }

    /// Number of agents with a body in the world
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }
}

impl Environment for Corridor {
    fn input_size(&self) -> Option<usize> {
        Some(CORRIDOR_INPUTS)
    }

    fn output_size(&self) -> Option<usize> {
        Some(CORRIDOR_OUTPUTS)
    }

    fn restart_agent(&mut self, agent: AgentId) {
        self.bodies.insert(agent, Body::default());
    }

    fn sense(&mut self, agent: AgentId, inputs: &mut Vec<f32>) {
        let body = self.bodies.get(&agent).copied().unwrap_or_default();
        let hw = self.config.half_width;
        let length = self.config.gate_spacing * self.config.gate_count.max(1) as f32;

        inputs.clear();
        inputs.extend_from_slice(&[
            body.x / length,
            body.z / hw,
            body.vx,
            body.vz,
            (hw - body.z) / hw,
            (hw + body.z) / hw,
        ]);
    }

    fn act(&mut self, agent: AgentId, outputs: &[f32], dt: f32) -> Step {
        let output = |i: usize| outputs.get(i).copied().unwrap_or(0.0);
        let cfg = &self.config;
        let body = self.bodies.entry(agent).or_default();

        let fx = cfg.max_force * (output(0) - output(2));
        let fz = cfg.max_force * (output(1) - output(3));

        body.vx += fx / cfg.mass * dt;
        body.vz += fz / cfg.mass * dt;
        let damping = (1.0 - cfg.drag * dt).max(0.0);
        body.vx *= damping;
        body.vz *= damping;
        body.x += body.vx * dt;
        body.z += body.vz * dt;

        let body = *body;
        let reward: f32 = self
            .gates
            .iter_mut()
            .map(|gate| gate.trigger(agent, &body))
            .sum();

        Step {
            reward,
            terminal: body.z.abs() > cfg.half_width,
        }
    }

    fn trial_end_fitness(&mut self, agent: AgentId, _end: TrialEnd) -> f32 {
        self.bodies.get(&agent).map(|b| b.x).unwrap_or(0.0)
    }

    fn discard_agent(&mut self, agent: AgentId) {
        self.bodies.remove(&agent);
    }

    fn on_generation_restart(&mut self) {
        for gate in &mut self.gates {
            gate.reset();
        }
        log::debug!(
            "Reset {} fitness gate{}",
            self.gates.len(),
            if self.gates.len() != 1 { "s" } else { "" }
        );
    }
}
