//! Configuration system for evonet training runs.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::environment::TrialEnd;
use crate::neural::MutationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub mutation: MutationConfig,
    #[serde(default)]
    pub trial: TrialConfig,
    #[serde(default)]
    pub corridor: CorridorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Population and selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents running each generation
    pub size: usize,
    /// Fraction of finished agents (ranked by fitness) discarded each generation
    pub promotion_percentile: f32,
}

/// Network topology configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Neurons per layer, input layer first
    pub layer_sizes: Vec<usize>,
}

/// Whether a trial that ends early still earns the end-of-trial fitness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessPolicy {
    /// Only a timeout awards end-of-trial fitness
    #[default]
    TimeoutOnly,
    /// Timeouts and environment terminations both award it
    AnyTermination,
}

impl FitnessPolicy {
    /// Whether a trial ending this way earns the end-of-trial fitness
    pub fn awards(self, end: TrialEnd) -> bool {
        match self {
            Self::TimeoutOnly => end == TrialEnd::Timeout,
            Self::AnyTermination => true,
        }
    }
}

/// Trial timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    /// Trial length in time units
    pub duration: f32,
    /// Time step used by the built-in driver loop
    pub tick: f32,
    /// Start the next generation as soon as every agent has finished
    pub auto_restart: bool,
    #[serde(default)]
    pub fitness_policy: FitnessPolicy,
}

/// Reference corridor environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorridorConfig {
    /// Force scale applied to network outputs
    pub max_force: f32,
    /// Distance from the center line to each wall
    pub half_width: f32,
    /// Distance between fitness gates along +x
    pub gate_spacing: f32,
    /// Number of fitness gates
    pub gate_count: usize,
    /// Fitness awarded for crossing a gate
    pub gate_value: f32,
    /// Agent mass
    pub mass: f32,
    /// Linear velocity damping per time unit
    pub drag: f32,
}

/// Logging and archive configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Generations between archived best networks (0 disables)
    pub archive_interval: u32,
    /// Maximum archived networks to keep
    pub max_archived: usize,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: 10,
            promotion_percentile: 0.8,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            layer_sizes: vec![6, 6, 4],
        }
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            duration: 20.0,
            tick: 0.02,
            auto_restart: false,
            fitness_policy: FitnessPolicy::TimeoutOnly,
        }
    }
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            max_force: 5.0,
            half_width: 4.0,
            gate_spacing: 5.0,
            gate_count: 8,
            gate_value: 100.0,
            mass: 1.0,
            drag: 0.1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            archive_interval: 10,
            max_archived: 10,
            log_level: "info".to_string(),
        }
    }
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("population size must be > 0")]
    EmptyPopulation,
    #[error("promotion_percentile must be within [0, 1], got {0}")]
    Percentile(f32),
    #[error("mutation chance must be within [0, 100], got {0}")]
    MutationChance(f32),
    #[error("mutation amount must be finite and >= 0, got {0}")]
    MutationAmount(f32),
    #[error("trial {field} must be positive, got {value}")]
    Timing { field: &'static str, value: f32 },
    #[error("network needs at least 2 layers, all non-empty: {0:?}")]
    Topology(Vec<usize>),
    #[error("corridor setting {0} must be positive")]
    Corridor(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        let p = self.population.promotion_percentile;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::Percentile(p));
        }
        if !(0.0..=100.0).contains(&self.mutation.chance) {
            return Err(ConfigError::MutationChance(self.mutation.chance));
        }
        if !self.mutation.amount.is_finite() || self.mutation.amount < 0.0 {
            return Err(ConfigError::MutationAmount(self.mutation.amount));
        }
        if !(self.trial.duration > 0.0) {
            return Err(ConfigError::Timing {
                field: "duration",
                value: self.trial.duration,
            });
        }
        if !(self.trial.tick > 0.0) {
            return Err(ConfigError::Timing {
                field: "tick",
                value: self.trial.tick,
            });
        }
        let sizes = &self.network.layer_sizes;
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(ConfigError::Topology(sizes.clone()));
        }
        if !(self.corridor.half_width > 0.0) {
            return Err(ConfigError::Corridor("half_width"));
        }
        if !(self.corridor.mass > 0.0) {
            return Err(ConfigError::Corridor("mass"));
        }
        if !(self.corridor.gate_spacing > 0.0) {
            return Err(ConfigError::Corridor("gate_spacing"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.trial.fitness_policy = FitnessPolicy::AnyTermination;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let loaded: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, loaded);
        assert!(yaml.contains("any_termination"));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "population:\n  size: 4\n  promotion_percentile: 0.5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.population.size, 4);
        assert_eq!(config.mutation, MutationConfig::default());
        assert_eq!(config.network.layer_sizes, vec![6, 6, 4]);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = Config::default();
        config.population.promotion_percentile = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Percentile(_))));

        let mut config = Config::default();
        config.mutation.chance = 101.0;
        assert!(matches!(config.validate(), Err(ConfigError::MutationChance(_))));

        let mut config = Config::default();
        config.mutation.amount = -0.1;
        assert!(matches!(config.validate(), Err(ConfigError::MutationAmount(_))));

        let mut config = Config::default();
        config.network.layer_sizes = vec![4];
        assert!(matches!(config.validate(), Err(ConfigError::Topology(_))));

        let mut config = Config::default();
        config.trial.duration = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Timing { .. })));
    }

    #[test]
    fn test_fitness_policy_awards() {
        assert!(FitnessPolicy::TimeoutOnly.awards(TrialEnd::Timeout));
        assert!(!FitnessPolicy::TimeoutOnly.awards(TrialEnd::Terminated));
        assert!(FitnessPolicy::AnyTermination.awards(TrialEnd::Terminated));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = Config::default();
        config.population.size = 32;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.population.size, 32);
    }
}
