//! Integration tests for evonet

use evonet::checkpoint::NetworkFile;
use evonet::environment::{Step, TrialEnd};
use evonet::neural::Network;
use evonet::population::{cutoff_index, AgentId};
use evonet::{Config, Corridor, Environment, Population, Trainer};

/// Fitness is the first network output summed over the trial
struct OutputFollower;

impl Environment for OutputFollower {
    fn restart_agent(&mut self, _agent: AgentId) {}

    fn sense(&mut self, _agent: AgentId, inputs: &mut Vec<f32>) {
        inputs.clear();
        inputs.extend_from_slice(&[1.0, 1.0, 1.0]);
    }

    fn act(&mut self, _agent: AgentId, outputs: &[f32], _dt: f32) -> Step {
        Step {
            reward: outputs[0],
            terminal: false,
        }
    }

    fn trial_end_fitness(&mut self, _agent: AgentId, _end: TrialEnd) -> f32 {
        0.0
    }
}

fn small_config() -> Config {
    let mut config = Config::default();
    config.population.size = 12;
    config.population.promotion_percentile = 0.75;
    config.network.layer_sizes = vec![3, 4, 1];
    config.mutation.chance = 50.0;
    config.mutation.amount = 0.3;
    config.trial.duration = 0.5;
    config.trial.tick = 0.1;
    config
}

#[test]
fn test_full_training_cycle() {
    let config = small_config();
    let mut trainer = Trainer::new_with_seed(&config, OutputFollower, 12345).unwrap();

    trainer.run(30).unwrap();

    assert_eq!(trainer.population.generation(), 30);
    assert_eq!(trainer.history.snapshots.len(), 30);
    assert_eq!(trainer.population.active().len(), 12);

    for agent in trainer.population.active() {
        assert!(agent.network.is_valid());
        assert_eq!(agent.network.layer_sizes(), vec![3, 4, 1]);
    }

    // Elitism with a fixed input never loses the best network
    let best = trainer.history.best_series();
    for pair in best.windows(2) {
        assert!(pair[1].1 >= pair[0].1 - 1e-4, "best fitness regressed: {:?}", pair);
    }
    assert!(best.last().unwrap().1 > best[0].1);
}

#[test]
fn test_selection_scenario() {
    let mut config = small_config();
    config.population.size = 4;
    config.population.promotion_percentile = 0.5;

    let mut population = Population::new_with_seed(&config, 1).unwrap();
    population.start_generation();
    let ids = population.active_ids();
    for (i, &id) in ids.iter().enumerate() {
        population.agent_mut(id).unwrap().reward((i + 1) as f32);
        population.finish(id);
    }

    assert_eq!(cutoff_index(4, 0.5), 2);
    let report = population.end_generation();
    assert_eq!(report.discarded, ids[..2].to_vec());

    let created = population.start_generation();
    assert_eq!(created.len(), 2);
    assert_eq!(population.active().len(), 4);
}

#[test]
fn test_network_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = [0.3f32, -0.2, 0.9];

    for name in ["net.json", "net.bin", "SavedNeuralNet.txt"] {
        let path = dir.path().join(name);
        let mut net = Network::new_random(&[3, 5, 5, 2]).unwrap();
        let expected = net.evaluate(&inputs);

        NetworkFile::save(&net, &path).expect("Failed to save network");
        let mut loaded = NetworkFile::load(&path).expect("Failed to load network");

        let outputs = loaded.evaluate(&inputs);
        for (a, b) in outputs.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}

#[test]
fn test_save_and_resume_training() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best.json");
    let config = small_config();

    let mut trainer = Trainer::new_with_seed(&config, OutputFollower, 777).unwrap();
    trainer.run(5).unwrap();
    let _ = trainer.request_save(&path);
    trainer.run(1).unwrap();
    assert!(path.exists());

    let mut resumed = Trainer::new_with_seed(&config, OutputFollower, 778).unwrap();
    resumed.load(&path).unwrap();
    let saved = NetworkFile::load(&path).unwrap();
    assert!(resumed.population.active().iter().all(|a| a.network == saved));

    resumed.run(2).unwrap();
    assert_eq!(resumed.population.generation(), 2);
}

#[test]
fn test_corridor_training_runs() {
    let mut config = Config::default();
    config.population.size = 8;
    config.trial.duration = 2.0;
    config.trial.tick = 0.05;
    config.trial.auto_restart = true;

    let env = Corridor::new(config.corridor.clone());
    let mut trainer = Trainer::new_with_seed(&config, env, 4242).unwrap();

    let mut generations = 0;
    for _ in 0..200 {
        if trainer.tick(config.trial.tick).unwrap().generation.is_some() {
            generations += 1;
        }
    }

    assert!(generations >= 4, "only {} generations closed", generations);
    // Discarded agents no longer have bodies
    assert!(trainer.environment.body_count() <= config.population.size);
}

#[test]
fn test_invalid_topology_is_rejected() {
    let mut config = small_config();
    config.network.layer_sizes = vec![3, 0, 1];
    assert!(Trainer::new_with_seed(&config, OutputFollower, 1).is_err());
}
