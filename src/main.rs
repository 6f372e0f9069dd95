use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flappy_neat::app;
use flappy_neat::config::Config;
use flappy_neat::evolution::Population;
use flappy_neat::render::NullRenderer;
use flappy_neat::replay::Replay;
use flappy_neat::session::Session;
use flappy_neat::snapshot::{self, FileSnapshot};
use flappy_neat::trainer::Trainer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// Headless replays of a bird that never crashes stop here.
const HEADLESS_REPLAY_TICKS: u64 = 100_000;

#[derive(Parser, Debug)]
#[command(name = "flappy-neat")]
#[command(about = "Evolve neural controllers that fly through pipes")]
struct Cli {
    /// JSON config file; missing keys keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the config seed
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Draw lines from each bird to the gap it is steering for
    #[arg(long, global = true)]
    lines: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evolve a population, snapshotting a strong genome along the way
    Train {
        #[arg(long)]
        generations: Option<u32>,
        #[arg(long)]
        population: Option<usize>,
        /// Where the snapshot genome is written
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Run without a window as fast as possible
        #[arg(long)]
        headless: bool,
    },
    /// Fly a previously saved genome
    Replay {
        #[arg(long)]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        headless: bool,
        /// Stop after this many ticks even if the bird is still flying
        #[arg(long)]
        max_ticks: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    let seed = cli.seed.or(config.seed).unwrap_or_else(rand::random);
    if cli.lines {
        config.game.draw_target_lines = true;
    }

    match cli.command {
        Commands::Train {
            generations,
            population,
            snapshot: snapshot_path,
            headless,
        } => {
            if let Some(generations) = generations {
                config.neat.generations = generations;
            }
            if let Some(population) = population {
                config.neat.population_size = population;
            }
            if let Some(path) = snapshot_path {
                config.game.snapshot_path = path;
            }
            config.validate().context("invalid settings")?;

            info!(
                seed,
                population = config.neat.population_size,
                generations = config.neat.generations,
                snapshot = %config.game.snapshot_path.display(),
                "starting training"
            );
            let sink = FileSnapshot::new(config.game.snapshot_path.clone());
            let population = Population::new(config.neat.clone(), seed);
            let mut trainer = Trainer::new(Session::new(config), population, Box::new(sink), seed);

            if headless {
                if let Some(champion) = trainer.run_headless(&mut NullRenderer) {
                    println!("{}", serde_json::to_string_pretty(champion)?);
                }
                Ok(())
            } else {
                app::run(trainer, "Flappy Bird (NEAT)")
            }
        }
        Commands::Replay {
            snapshot: path,
            headless,
            max_ticks,
        } => {
            let path = path.unwrap_or_else(|| config.game.snapshot_path.clone());
            let genome = snapshot::load(&path)
                .with_context(|| format!("loading genome from {}", path.display()))?;
            info!(genome = genome.id, fitness = genome.fitness, seed, "replaying");

            let max_ticks = if headless {
                Some(max_ticks.unwrap_or(HEADLESS_REPLAY_TICKS))
            } else {
                max_ticks
            };
            let mut replay = Replay::new(Session::new(config), genome, seed, max_ticks);
            if headless {
                let score = replay.run_headless(&mut NullRenderer);
                println!("score: {score}");
                Ok(())
            } else {
                app::run(replay, "Flappy Bird (replay)")
            }
        }
    }
}
