//! # evonet
//!
//! Generational neuroevolution of fixed-topology feedforward networks.
//!
//! ## Features
//!
//! - **Simple networks**: dense layers, tanh activation, per-neuron biases
//! - **Mutation-only search**: clones of the best agents get random nudges
//! - **Percentile selection**: the bottom of each generation is discarded
//! - **Pluggable worlds**: anything implementing [`Environment`] can host agents
//! - **Reproducible**: seeded random number generation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evonet::{Config, Corridor, Trainer};
//!
//! let config = Config::default();
//! let env = Corridor::new(config.corridor.clone());
//! let mut trainer = Trainer::new_with_seed(&config, env, 42).unwrap();
//!
//! // Run ten generations
//! trainer.run(10).unwrap();
//!
//! if let Some(stats) = trainer.history.latest() {
//!     println!("{}", stats.summary());
//! }
//! ```
//!
//! ## Networks
//!
//! ```rust
//! use evonet::neural::Network;
//!
//! let mut net = Network::new_random(&[3, 2, 1]).unwrap();
//! let out = net.evaluate(&[1.0, 1.0, 1.0]);
//! assert!(out[0] > -1.0 && out[0] < 1.0);
//! ```
//!
//! ## Saving
//!
//! ```rust,no_run
//! use evonet::checkpoint::NetworkFile;
//! use evonet::neural::Network;
//!
//! let net = Network::new_random(&[6, 6, 4]).unwrap();
//! NetworkFile::save(&net, "best.json").unwrap();
//! let loaded = NetworkFile::load("best.json").unwrap();
//! ```

pub mod checkpoint;
pub mod config;
pub mod environment;
pub mod neural;
pub mod population;
pub mod stats;
pub mod trainer;

// Re-export main types
pub use config::Config;
pub use environment::{Corridor, Environment};
pub use population::{Agent, Population};
pub use trainer::{Trainer, TrainingError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Train on the corridor for a few generations and time it
pub fn benchmark(generations: u32, population: usize) -> Result<BenchmarkResult, TrainingError> {
    use std::time::Instant;

    let mut config = Config::default();
    config.population.size = population;

    let env = Corridor::new(config.corridor.clone());
    let mut trainer = Trainer::new_with_seed(&config, env, 42)?;

    let start = Instant::now();
    trainer.run(generations)?;
    let elapsed = start.elapsed();

    Ok(BenchmarkResult {
        generations,
        population,
        elapsed_secs: elapsed.as_secs_f64(),
        generations_per_second: generations as f64 / elapsed.as_secs_f64(),
        best_fitness: trainer.history.best_ever().map(|s| s.best_fitness).unwrap_or(0.0),
    })
}

/// Benchmark result
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub generations: u32,
    pub population: usize,
    pub elapsed_secs: f64,
    pub generations_per_second: f64,
    pub best_fitness: f32,
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Benchmark Results ===")?;
        writeln!(f, "Generations: {}", self.generations)?;
        writeln!(f, "Population: {}", self.population)?;
        writeln!(f, "Time: {:.3}s", self.elapsed_secs)?;
        writeln!(f, "Speed: {:.2} generations/s", self.generations_per_second)?;
        writeln!(f, "Best fitness: {:.2}", self.best_fitness)?;
        Ok(())
    }
}
