//! Tick-driven training loop tying a population to an environment.

use crate::checkpoint::{BestNetworkArchive, NetworkFile};
use crate::config::{Config, ConfigError, TrialConfig};
use crate::environment::{Environment, TrialEnd};
use crate::neural::{Network, NetworkError};
use crate::population::{AgentId, Population};
use crate::stats::{GenerationStats, StatsHistory};
use std::path::{Path, PathBuf};

/// Errors surfaced by the trainer
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("No agents have finished a trial yet; the save will run when this generation ends")]
    EmptyPopulationSave,
    #[error("Tick length must be positive, got {0}")]
    InvalidTick(f32),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What happened during one tick
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Agents whose trial ended this tick, in evaluation order
    pub ended: Vec<(AgentId, TrialEnd)>,
    /// Set when the tick also closed a generation (auto restart)
    pub generation: Option<GenerationStats>,
}

/// Drives trials, selection and persistence for one environment
pub struct Trainer<E: Environment> {
    pub population: Population,
    pub environment: E,
    pub history: StatsHistory,
    pub trial: TrialConfig,

    archive: Option<BestNetworkArchive>,
    pending_save: Option<PathBuf>,
    generation_time: f32,
    started: bool,
    inputs: Vec<f32>,
}

impl<E: Environment> Trainer<E> {
    /// Create a trainer with a random seed
    pub fn new(config: &Config, environment: E) -> Result<Self, TrainingError> {
        config.validate()?;
        let population = Population::new(config)?;
        Ok(Self::with_population(config, population, environment))
    }

    /// Create a trainer with a specific seed for reproducibility
    pub fn new_with_seed(config: &Config, environment: E, seed: u64) -> Result<Self, TrainingError> {
        config.validate()?;
        let population = Population::new_with_seed(config, seed)?;
        Ok(Self::with_population(config, population, environment))
    }

    fn with_population(config: &Config, population: Population, environment: E) -> Self {
        let trainer = Self {
            population,
            environment,
            history: StatsHistory::new(),
            trial: config.trial.clone(),
            archive: None,
            pending_save: None,
            generation_time: 0.0,
            started: false,
            inputs: Vec::new(),
        };
        trainer.check_io_sizes(&config.network.layer_sizes);
        trainer
    }

    /// Archive the best network every few generations
    pub fn set_archive(&mut self, archive: BestNetworkArchive) {
        self.archive = Some(archive);
    }

    fn check_io_sizes(&self, layer_sizes: &[usize]) {
        let (Some(&inputs), Some(&outputs)) = (layer_sizes.first(), layer_sizes.last()) else {
            return;
        };
        if let Some(expected) = self.environment.input_size() {
            if expected != inputs {
                log::warn!("Environment writes {} inputs but networks take {}", expected, inputs);
            }
        }
        if let Some(expected) = self.environment.output_size() {
            if expected != outputs {
                log::warn!("Environment reads {} outputs but networks produce {}", expected, outputs);
            }
        }
    }

    /// Restart survivors, refill the population and reset agents in the environment
    pub fn start(&mut self) {
        let created = self.population.start_generation();
        for id in self.population.active_ids() {
            self.environment.restart_agent(id);
        }
        self.generation_time = 0.0;
        self.started = true;

        log::info!(
            "Generation {} running: {} agents ({} new)",
            self.population.generation(),
            self.population.active().len(),
            created.len()
        );
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Save still waiting for a generation to end
    pub fn pending_save(&self) -> Option<&Path> {
        self.pending_save.as_deref()
    }

    pub fn cancel_save(&mut self) {
        self.pending_save = None;
    }

    /// Advance every running agent by `dt`.
    ///
    /// Agents whose trial ends are moved to the finished set after all agents
    /// have been stepped. With auto restart on, an emptied active set closes
    /// the generation and starts the next one within the same call.
    pub fn tick(&mut self, dt: f32) -> Result<TickReport, TrainingError> {
        if !(dt > 0.0) {
            return Err(TrainingError::InvalidTick(dt));
        }
        if !self.started {
            self.start();
        }

        self.generation_time += dt;
        let duration = self.trial.duration;
        let policy = self.trial.fitness_policy;
        let mut report = TickReport::default();

        let Self {
            population,
            environment,
            inputs,
            ..
        } = self;

        for agent in population.active_mut() {
            environment.sense(agent.id, inputs);
            let outputs = agent.network.evaluate(inputs);
            let step = environment.act(agent.id, &outputs, dt);
            agent.reward(step.reward);
            agent.run_time += dt;

            let end = if step.terminal {
                Some(TrialEnd::Terminated)
            } else if agent.run_time > duration {
                Some(TrialEnd::Timeout)
            } else {
                None
            };

            if let Some(end) = end {
                if policy.awards(end) {
                    let bonus = environment.trial_end_fitness(agent.id, end);
                    agent.reward(bonus);
                }
                report.ended.push((agent.id, end));
            }
        }

        for &(id, end) in &report.ended {
            if population.finish(id) {
                if let Some(agent) = population.agent(id) {
                    log::debug!("Agent {} finished ({:?}) with fitness {:.3}", id, end, agent.fitness);
                }
            }
        }

        if self.trial.auto_restart && self.population.active().is_empty() {
            report.generation = Some(self.restart()?);
        }

        Ok(report)
    }

    /// Close the current generation and start the next one.
    ///
    /// Runs a queued save first. Agents still running are kept as survivors.
    /// A failed save or archive write is returned after the next generation
    /// has started; the failed save request is dropped.
    pub fn restart(&mut self) -> Result<GenerationStats, TrainingError> {
        let generation = self.population.generation();
        let saved = self.save_generation_best(generation);

        let report = self.population.end_generation();
        for &id in &report.discarded {
            self.environment.discard_agent(id);
        }

        let stats = GenerationStats::from_report(&report, self.generation_time);
        log::info!("{}", stats.summary());
        self.history.record(stats.clone());

        self.environment.on_generation_restart();
        self.start();

        saved?;
        Ok(stats)
    }

    fn save_generation_best(&mut self, generation: u32) -> Result<(), TrainingError> {
        let Some(best) = self.population.best_finished() else {
            if let Some(path) = self.pending_save.as_ref() {
                log::warn!("No agent finished generation {}; save to {:?} deferred", generation, path);
            }
            return Ok(());
        };

        if let Some(path) = self.pending_save.take() {
            if let Err(e) = NetworkFile::save(&best.network, &path) {
                log::error!("Failed to save network to {:?}: {}", path, e);
                return Err(e.into());
            }
            log::info!("Saved network with fitness {:.3} to {:?}", best.fitness, path);
        }
        if let Some(archive) = self.archive.as_mut() {
            if archive.should_save(generation) {
                let path = archive.save(generation, &best.network)?;
                log::info!("Archived best network: {:?}", path);
            }
        }
        Ok(())
    }

    /// Tick until every agent has finished, then restart
    pub fn run_generation(&mut self, dt: f32) -> Result<GenerationStats, TrainingError> {
        loop {
            let report = self.tick(dt)?;
            if let Some(stats) = report.generation {
                return Ok(stats);
            }
            if self.population.active().is_empty() {
                return self.restart();
            }
        }
    }

    /// Run several generations with the configured tick
    pub fn run(&mut self, generations: u32) -> Result<(), TrainingError> {
        let dt = self.trial.tick;
        for _ in 0..generations {
            self.run_generation(dt)?;
        }
        Ok(())
    }

    /// Save the best agent of this generation when the generation ends.
    ///
    /// Returns [`TrainingError::EmptyPopulationSave`] if nobody has finished
    /// yet; the request stays queued either way.
    pub fn request_save<P: Into<PathBuf>>(&mut self, path: P) -> Result<(), TrainingError> {
        let path = path.into();
        let empty = self.population.finished().is_empty();
        if empty {
            log::info!("No agents have finished yet; saving to {:?} when this generation ends", path);
        }
        self.pending_save = Some(path);
        if empty {
            return Err(TrainingError::EmptyPopulationSave);
        }
        Ok(())
    }

    /// Save the best finished agent right now
    pub fn save_best<P: AsRef<Path>>(&self, path: P) -> Result<f32, TrainingError> {
        let best = self
            .population
            .best_finished()
            .ok_or(TrainingError::EmptyPopulationSave)?;
        NetworkFile::save(&best.network, path.as_ref())?;
        log::info!("Saved network with fitness {:.3} to {:?}", best.fitness, path.as_ref());
        Ok(best.fitness)
    }

    /// Replace the population with copies of a saved network.
    ///
    /// Nothing changes if the file cannot be read or is malformed.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), TrainingError> {
        let network = NetworkFile::load(path.as_ref())?;
        self.adopt(&network)?;
        log::info!("Loaded network from {:?}", path.as_ref());
        Ok(())
    }

    /// Replace the population with copies of `network`
    pub fn adopt(&mut self, network: &Network) -> Result<(), TrainingError> {
        let removed = self.population.reseed_from(network)?;
        for id in removed {
            self.environment.discard_agent(id);
        }
        self.check_io_sizes(&network.layer_sizes());

        self.environment.on_generation_restart();
        self.start();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitnessPolicy;
    use crate::environment::Step;
    use std::collections::HashMap;

    /// Rewards agent `id` with `id` per tick; optionally terminates odd ids
    #[derive(Default)]
    struct ScriptedEnv {
        terminate_odd: bool,
        restarts: usize,
        discarded: Vec<AgentId>,
        resets: HashMap<AgentId, usize>,
    }

    impl Environment for ScriptedEnv {
        fn restart_agent(&mut self, agent: AgentId) {
            *self.resets.entry(agent).or_insert(0) += 1;
        }

        fn sense(&mut self, _agent: AgentId, inputs: &mut Vec<f32>) {
            inputs.clear();
            inputs.extend_from_slice(&[1.0, 1.0, 1.0]);
        }

        fn act(&mut self, agent: AgentId, outputs: &[f32], _dt: f32) -> Step {
            assert_eq!(outputs.len(), 1);
            Step {
                reward: agent as f32,
                terminal: self.terminate_odd && agent % 2 == 1,
            }
        }

        fn trial_end_fitness(&mut self, _agent: AgentId, _end: TrialEnd) -> f32 {
            1000.0
        }

        fn discard_agent(&mut self, agent: AgentId) {
            self.discarded.push(agent);
        }

        fn on_generation_restart(&mut self) {
            self.restarts += 1;
        }
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.population.size = 4;
        config.population.promotion_percentile = 0.5;
        config.network.layer_sizes = vec![3, 2, 1];
        config.trial.duration = 1.0;
        config.trial.tick = 0.25;
        config
    }

    #[test]
    fn test_tick_until_timeout() {
        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 1).unwrap();

        for _ in 0..4 {
            let report = trainer.tick(0.25).unwrap();
            assert!(report.ended.is_empty());
        }
        let report = trainer.tick(0.25).unwrap();
        assert_eq!(report.ended.len(), 4);
        assert!(report.ended.iter().all(|(_, end)| *end == TrialEnd::Timeout));
        assert!(trainer.population.active().is_empty());

        // 5 ticks of reward plus the timeout bonus
        for agent in trainer.population.finished() {
            assert_eq!(agent.fitness, agent.id as f32 * 5.0 + 1000.0);
        }
    }

    #[test]
    fn test_rejects_bad_tick() {
        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 1).unwrap();
        assert!(matches!(trainer.tick(0.0), Err(TrainingError::InvalidTick(_))));
    }

    #[test]
    fn test_generation_cycle() {
        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 2).unwrap();
        let stats = trainer.run_generation(0.25).unwrap();

        assert_eq!(stats.generation, 0);
        assert_eq!(stats.finished, 4);
        assert_eq!(stats.promoted, 2);
        assert_eq!(stats.discarded, 2);
        assert_eq!(stats.best_fitness, 3.0 * 5.0 + 1000.0);

        // Lowest ids earned least and were discarded
        assert_eq!(trainer.environment.discarded, vec![0, 1]);
        assert_eq!(trainer.environment.restarts, 1);
        assert_eq!(trainer.population.active_ids(), vec![2, 3, 4, 5]);
        assert_eq!(trainer.environment.resets[&2], 2);
        assert_eq!(trainer.environment.resets[&4], 1);
        assert_eq!(trainer.history.snapshots.len(), 1);
    }

    #[test]
    fn test_failed_save_still_advances_generation() {
        let dir = tempfile::tempdir().unwrap();
        let unwritable = dir.path().join("missing").join("best.json");

        let mut config = test_config();
        config.trial.auto_restart = true;
        let mut trainer = Trainer::new_with_seed(&config, ScriptedEnv::default(), 3).unwrap();
        trainer.start();
        assert!(trainer.request_save(&unwritable).is_err());

        let mut errors = 0;
        for _ in 0..20 {
            if trainer.tick(0.25).is_err() {
                errors += 1;
            }
        }

        assert_eq!(errors, 1);
        assert!(trainer.pending_save().is_none());
        assert!(!unwritable.exists());
        assert_eq!(trainer.population.generation(), 4);
        assert_eq!(trainer.population.active().len(), 4);
    }

    #[test]
    fn test_cancel_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 4).unwrap();

        assert!(trainer.request_save(&path).is_err());
        assert_eq!(trainer.pending_save(), Some(path.as_path()));
        trainer.cancel_save();
        assert!(trainer.pending_save().is_none());

        trainer.run_generation(0.25).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_auto_restart_from_tick() {
        let mut config = test_config();
        config.trial.auto_restart = true;
        let mut trainer = Trainer::new_with_seed(&config, ScriptedEnv::default(), 3).unwrap();

        let mut closed = None;
        for _ in 0..5 {
            closed = trainer.tick(0.25).unwrap().generation;
        }
        assert!(closed.is_some());
        assert_eq!(trainer.population.generation(), 1);
        assert_eq!(trainer.population.active().len(), 4);
    }

    #[test]
    fn test_fitness_policy() {
        let mut config = test_config();
        let env = ScriptedEnv {
            terminate_odd: true,
            ..ScriptedEnv::default()
        };
        let mut trainer = Trainer::new_with_seed(&config, env, 4).unwrap();
        let report = trainer.tick(0.25).unwrap();
        assert_eq!(report.ended, vec![(1, TrialEnd::Terminated), (3, TrialEnd::Terminated)]);
        assert_eq!(trainer.population.agent(1).unwrap().fitness, 1.0);

        config.trial.fitness_policy = FitnessPolicy::AnyTermination;
        let env = ScriptedEnv {
            terminate_odd: true,
            ..ScriptedEnv::default()
        };
        let mut trainer = Trainer::new_with_seed(&config, env, 4).unwrap();
        trainer.tick(0.25).unwrap();
        assert_eq!(trainer.population.agent(1).unwrap().fitness, 1001.0);
    }

    #[test]
    fn test_manual_restart_keeps_running_agents() {
        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 5).unwrap();
        trainer.tick(0.25).unwrap();

        let stats = trainer.restart().unwrap();
        assert_eq!(stats.finished, 0);
        assert_eq!(trainer.population.active_ids(), vec![0, 1, 2, 3]);
        assert!(trainer.population.active().iter().all(|a| a.fitness == 0.0));
    }

    #[test]
    fn test_deferred_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 6).unwrap();
        trainer.start();

        assert!(matches!(
            trainer.request_save(&path),
            Err(TrainingError::EmptyPopulationSave)
        ));
        assert!(matches!(
            trainer.save_best(&path),
            Err(TrainingError::EmptyPopulationSave)
        ));
        assert_eq!(trainer.pending_save(), Some(path.as_path()));

        let best_network = {
            while !trainer.population.active().is_empty() {
                trainer.tick(0.25).unwrap();
            }
            trainer.population.best_finished().unwrap().network.clone()
        };
        trainer.restart().unwrap();

        assert!(trainer.pending_save().is_none());
        let saved = NetworkFile::load(&path).unwrap();
        assert_eq!(saved, best_network);
    }

    #[test]
    fn test_load_reseeds_population() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.bin");
        let template = Network::new_random(&[3, 5, 1]).unwrap();
        NetworkFile::save(&template, &path).unwrap();

        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 7).unwrap();
        trainer.start();
        trainer.load(&path).unwrap();

        assert_eq!(trainer.environment.discarded, vec![0, 1, 2, 3]);
        assert_eq!(trainer.population.active().len(), 4);
        assert!(trainer.population.active().iter().all(|a| a.network == template));
    }

    #[test]
    fn test_failed_load_leaves_population() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"layers\": []}").unwrap();

        let mut trainer = Trainer::new_with_seed(&test_config(), ScriptedEnv::default(), 8).unwrap();
        trainer.start();
        let before = trainer.population.active_ids();

        assert!(matches!(
            trainer.load(&path),
            Err(TrainingError::Network(NetworkError::MalformedNetworkData(_)))
        ));
        assert_eq!(trainer.population.active_ids(), before);
        assert!(trainer.environment.discarded.is_empty());
    }
}
