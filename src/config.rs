use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const WINDOW_WIDTH: u32 = 600;
pub const WINDOW_HEIGHT: u32 = 800;
pub const FLOOR_Y: f64 = 730.0;

/// Controllers see `(y, distance to gap top, distance to gap bottom)`.
pub const CONTROLLER_INPUTS: usize = 3;
pub const CONTROLLER_OUTPUTS: usize = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Trial rules and bookkeeping constants.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Pacing of the windowed loop. Headless runs ignore it.
    pub ticks_per_second: u32,
    pub fitness_per_tick: f64,
    pub collision_penalty: f64,
    pub pass_bonus: f64,
    /// A controller output above this triggers a jump.
    pub jump_threshold: f64,
    /// Snapshot fires once the score is strictly above this.
    pub snapshot_score: u32,
    pub stop_on_snapshot: bool,
    pub snapshot_path: PathBuf,
    /// Draw each bird's lines to the target gap in the window.
    pub draw_target_lines: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 30,
            fitness_per_tick: 0.1,
            collision_penalty: 1.0,
            pass_bonus: 5.0,
            jump_threshold: 0.5,
            snapshot_score: 20,
            stop_on_snapshot: false,
            snapshot_path: PathBuf::from("model").join("model.bin"),
            draw_target_lines: false,
        }
    }
}

/// Reproduction parameters for the default evolution provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NeatConfig {
    pub population_size: usize,
    pub generations: u32,
    /// Stop early once a genome reaches this fitness.
    pub fitness_threshold: Option<f64>,
    pub num_inputs: usize,
    pub num_outputs: usize,
    /// Number of top genomes copied unchanged into the next generation.
    pub elitism: usize,
    pub tournament_size: usize,
    /// Fraction of the population eligible as parents, best first.
    pub survival_threshold: f64,
    pub crossover_rate: f64,
    pub weight_init_stdev: f64,
    pub weight_mutate_rate: f64,
    pub weight_replace_rate: f64,
    pub weight_mutate_power: f64,
    pub weight_bound: f64,
    pub bias_mutate_rate: f64,
    pub bias_mutate_power: f64,
    pub add_connection_rate: f64,
    pub add_node_rate: f64,
    pub toggle_enable_rate: f64,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 50,
            fitness_threshold: Some(100.0),
            num_inputs: CONTROLLER_INPUTS,
            num_outputs: CONTROLLER_OUTPUTS,
            elitism: 2,
            tournament_size: 3,
            survival_threshold: 0.2,
            crossover_rate: 0.75,
            weight_init_stdev: 1.0,
            weight_mutate_rate: 0.8,
            weight_replace_rate: 0.1,
            weight_mutate_power: 0.5,
            weight_bound: 30.0,
            bias_mutate_rate: 0.7,
            bias_mutate_power: 0.5,
            add_connection_rate: 0.5,
            add_node_rate: 0.2,
            toggle_enable_rate: 0.01,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Seed for pipe placement and reproduction. `None` draws from entropy.
    pub seed: Option<u64>,
    pub game: GameConfig,
    pub neat: NeatConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let neat = &self.neat;
        if neat.population_size == 0 {
            return Err(ConfigError::Invalid("population_size must be positive".into()));
        }
        if neat.num_inputs != CONTROLLER_INPUTS {
            return Err(ConfigError::Invalid(format!(
                "num_inputs must be {CONTROLLER_INPUTS}, got {}",
                neat.num_inputs
            )));
        }
        if neat.num_outputs < CONTROLLER_OUTPUTS {
            return Err(ConfigError::Invalid(format!(
                "num_outputs must be at least {CONTROLLER_OUTPUTS}, got {}",
                neat.num_outputs
            )));
        }
        if neat.elitism > neat.population_size {
            return Err(ConfigError::Invalid(format!(
                "elitism ({}) exceeds population_size ({})",
                neat.elitism, neat.population_size
            )));
        }
        if neat.tournament_size == 0 {
            return Err(ConfigError::Invalid("tournament_size must be positive".into()));
        }
        if !(neat.survival_threshold > 0.0 && neat.survival_threshold <= 1.0) {
            return Err(ConfigError::Invalid(
                "survival_threshold must be in (0, 1]".into(),
            ));
        }
        if self.game.ticks_per_second == 0 {
            return Err(ConfigError::Invalid("ticks_per_second must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "seed": 7, "neat": {{ "population_size": 12 }} }}"#).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.neat.population_size, 12);
        assert_eq!(config.neat.num_inputs, CONTROLLER_INPUTS);
        assert_eq!(config.game, GameConfig::default());
    }

    #[test]
    fn rejects_wrong_input_count() {
        let mut config = Config::default();
        config.neat.num_inputs = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_empty_population() {
        let mut config = Config::default();
        config.neat.population_size = 0;
        config.neat.elitism = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
