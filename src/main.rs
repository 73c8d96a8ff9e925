//! evonet - CLI Entry Point
//!
//! Trains networks on the corridor environment and inspects saved networks.

use clap::{Parser, Subcommand};
use evonet::checkpoint::{BestNetworkArchive, NetworkFile};
use evonet::{benchmark, Config, Corridor, Trainer, TrainingError};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "evonet")]
#[command(version)]
#[command(about = "Evolve feedforward networks with a generational genetic algorithm")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a population on the corridor
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of generations to run
        #[arg(short, long, default_value = "50")]
        generations: u32,

        /// Output directory for archived networks and stats
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Start from a saved network instead of random ones
        #[arg(long)]
        load: Option<PathBuf>,

        /// Save the best network of the final generation here (.json or .bin)
        #[arg(long)]
        save_best: Option<PathBuf>,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Print the shape of a saved network
    Inspect {
        /// Network file
        network: PathBuf,
    },

    /// Evaluate a saved network on one input vector
    Eval {
        /// Network file
        network: PathBuf,

        /// Comma separated inputs
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        inputs: Vec<f32>,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of generations
        #[arg(short, long, default_value = "5")]
        generations: u32,

        /// Population size
        #[arg(short, long, default_value = "50")]
        population: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Pick up the configured level for `run`; RUST_LOG still wins
    let default_level = match &cli.command {
        Commands::Run { config, .. } if config.exists() => Config::from_file(config)
            .map(|c| c.logging.log_level)
            .unwrap_or_else(|_| "info".to_string()),
        _ => "info".to_string(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.command {
        Commands::Run {
            config,
            generations,
            output,
            load,
            save_best,
            seed,
            quiet,
        } => run_training(config, generations, output, load, save_best, seed, quiet),

        Commands::Init { output } => generate_config(output),

        Commands::Inspect { network } => inspect_network(network),

        Commands::Eval { network, inputs } => eval_network(network, inputs),

        Commands::Benchmark {
            generations,
            population,
        } => run_benchmark(generations, population),
    }
}

fn run_training(
    config_path: PathBuf,
    generations: u32,
    output: PathBuf,
    load: Option<PathBuf>,
    save_best: Option<PathBuf>,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let config = if config_path.exists() {
        println!("Loading config from: {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        println!("Using default configuration");
        Config::default()
    };

    std::fs::create_dir_all(&output)?;

    let env = Corridor::new(config.corridor.clone());
    let mut trainer = match seed {
        Some(s) => {
            println!("Using seed: {}", s);
            Trainer::new_with_seed(&config, env, s)?
        }
        None => Trainer::new(&config, env)?,
    };

    trainer.set_archive(BestNetworkArchive::new(
        output.join("best"),
        config.logging.archive_interval,
        config.logging.max_archived,
    )?);

    if let Some(path) = &load {
        println!("Loading network: {:?}", path);
        trainer.load(path)?;
    }

    println!("Starting training");
    println!("  Population: {}", config.population.size);
    println!("  Layers: {:?}", trainer.population.layer_sizes());
    if seed.is_none() {
        println!("  Seed: {}", trainer.population.seed());
    }
    println!("  Generations: {}", generations);
    println!();

    let start = Instant::now();
    let dt = config.trial.tick;

    for i in 0..generations {
        // Queue the save before the last generation closes
        if i + 1 == generations {
            if let Some(path) = &save_best {
                match trainer.request_save(path.clone()) {
                    Ok(()) | Err(TrainingError::EmptyPopulationSave) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let stats = trainer.run_generation(dt)?;
        if !quiet {
            println!("{}", stats.summary());
        }
    }

    let elapsed = start.elapsed();

    println!();
    println!("=== Training Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Generations: {}", trainer.population.generation());
    if let Some(best) = trainer.history.best_ever() {
        println!("Best fitness: {:.2} (generation {})", best.best_fitness, best.generation);
    }
    if let Some(path) = &save_best {
        if trainer.pending_save().is_none() {
            println!("Best network: {:?}", path);
        } else {
            println!("No agent finished; nothing saved to {:?}", path);
        }
    }

    let stats_path = output.join("stats_history.json");
    trainer.history.save(&stats_path)?;
    println!("Stats history: {:?}", stats_path);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn inspect_network(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Network ===");
    println!("File: {:?}", path);
    println!();

    let network = NetworkFile::load(&path)?;

    println!("Layers: {:?}", network.layer_sizes());
    println!("Inputs: {}", network.input_size());
    println!("Outputs: {}", network.output_size());
    println!("Parameters: {}", network.parameter_count());
    println!("Valid: {}", network.is_valid());

    for (i, matrix) in network.weights.transitions().iter().enumerate() {
        let (rows, cols) = matrix.dim();
        let mean_abs = matrix.iter().map(|w| w.abs()).sum::<f32>() / matrix.len().max(1) as f32;
        println!("  Transition {}: {}x{} weights, mean |w| {:.4}", i, rows, cols, mean_abs);
    }

    Ok(())
}

fn eval_network(path: PathBuf, inputs: Vec<f32>) -> Result<(), Box<dyn std::error::Error>> {
    let mut network = NetworkFile::load(&path)?;

    if inputs.len() < network.input_size() {
        eprintln!(
            "Warning: {} inputs given, network expects {}",
            inputs.len(),
            network.input_size()
        );
    }

    let outputs = network.evaluate(&inputs);
    let formatted: Vec<String> = outputs.iter().map(|o| format!("{:.6}", o)).collect();
    println!("{}", formatted.join(","));

    Ok(())
}

fn run_benchmark(generations: u32, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== evonet Benchmark ===");
    println!("Generations: {}", generations);
    println!("Population: {}", population);
    println!();

    let result = benchmark(generations, population)?;
    println!("{}", result);

    Ok(())
}
