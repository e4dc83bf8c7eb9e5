//! Configuration loading and typed config structures for the Petri simulation.
//!
//! The canonical configuration lives in `petri-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure and a loader that reads the file. Every field has a default,
//! so an empty document is a valid configuration.

use std::path::{Path, PathBuf};

use petri_agents::AgentTuning;
use petri_world::{DEFAULT_DENSITY_RADIUS, EventEffectTable, ObstaclePreset};
use serde::Deserialize;

use crate::collaborators::ScheduledEvent;
use crate::params::UpdateParams;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `petri-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Grid dimensions, seed and initial population.
    #[serde(default)]
    pub world: WorldConfig,

    /// Per-tick parameters.
    #[serde(default)]
    pub tick: UpdateParams,

    /// Organism behaviour constants.
    #[serde(default)]
    pub behavior: AgentTuning,

    /// Event effect table and the event schedule.
    #[serde(default)]
    pub events: EventsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Headless run settings.
    #[serde(default)]
    pub run: RunConfig,
}

/// World-level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Grid rows (default: 60).
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Grid columns (default: 80).
    #[serde(default = "default_cols")]
    pub cols: usize,

    /// Energy cap of a tile and of an organism (default: 6.0).
    #[serde(default = "default_max_tile_energy")]
    pub max_tile_energy: f64,

    /// RNG seed (default: 42).
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Organisms placed at start (default: 200).
    #[serde(default = "default_initial_population")]
    pub initial_population: usize,

    /// Starting organism energy as a fraction of the cap (default: 0.5).
    #[serde(default = "default_initial_energy_fraction")]
    pub initial_energy_fraction: f64,

    /// Starting tile energy as a fraction of the cap (default: 0.5).
    #[serde(default = "default_initial_tile_energy_fraction")]
    pub initial_tile_energy_fraction: f64,

    /// Obstacle layout painted at start (default: none).
    #[serde(default)]
    pub obstacle_preset: ObstaclePreset,

    /// Pick a random obstacle layout instead of `obstacle_preset`
    /// (default: false).
    #[serde(default)]
    pub randomize_obstacles: bool,

    /// Radius of the local-density neighbourhood (default: 2).
    #[serde(default = "default_density_radius")]
    pub density_radius: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            max_tile_energy: default_max_tile_energy(),
            seed: default_seed(),
            initial_population: default_initial_population(),
            initial_energy_fraction: default_initial_energy_fraction(),
            initial_tile_energy_fraction: default_initial_tile_energy_fraction(),
            obstacle_preset: ObstaclePreset::default(),
            randomize_obstacles: false,
            density_radius: default_density_radius(),
        }
    }
}

/// Event settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventsConfig {
    /// Overrides of the per-kind effect table.
    #[serde(default)]
    pub effects: EventEffectTable,

    /// Events replayed by tick window.
    #[serde(default)]
    pub schedule: Vec<ScheduledEvent>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit a population summary every this many ticks; `0` disables
    /// (default: 10).
    #[serde(default = "default_summary_interval")]
    pub summary_interval: u64,

    /// Emit JSON lines instead of human-readable text (default: false).
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            summary_interval: default_summary_interval(),
            json: false,
        }
    }
}

/// Headless run settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Ticks to run (default: 500).
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Stop early once the population reaches zero (default: true).
    #[serde(default = "default_true")]
    pub stop_on_extinction: bool,

    /// Write the final snapshot as JSON here, if set.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            stop_on_extinction: default_true(),
            snapshot_path: None,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }
}

const fn default_rows() -> usize {
    60
}
const fn default_cols() -> usize {
    80
}
const fn default_max_tile_energy() -> f64 {
    6.0
}
const fn default_seed() -> u64 {
    42
}
const fn default_initial_population() -> usize {
    200
}
const fn default_initial_energy_fraction() -> f64 {
    0.5
}
const fn default_initial_tile_energy_fraction() -> f64 {
    0.5
}
const fn default_density_radius() -> usize {
    DEFAULT_DENSITY_RADIUS
}
fn default_log_level() -> String {
    "info".to_owned()
}
const fn default_summary_interval() -> u64 {
    10
}
const fn default_ticks() -> u64 {
    500
}
const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use petri_types::EventKind;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SimulationConfig::parse("{}");
        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.world, WorldConfig::default());
        assert_eq!(config.tick, UpdateParams::default());
        assert_eq!(config.behavior, AgentTuning::default());
        assert_eq!(config.run.ticks, 500);
        assert!(config.events.schedule.is_empty());
    }

    #[test]
    fn sections_override_defaults() {
        let yaml = r"
world:
  rows: 10
  cols: 12
  seed: 7
  obstacle_preset: corridors
tick:
  energy_regen_rate: 0.2
  low_diversity_repro_multiplier: 0.0
behavior:
  attack_range: 2
events:
  effects:
    flood:
      regen_add: 0.5
  schedule:
    - kind: drought
      strength: 0.5
      area: { x: 0, y: 0, width: 4, height: 4 }
      start_tick: 3
      duration: 10
logging:
  level: debug
run:
  ticks: 25
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.rows, 10);
        assert_eq!(config.world.cols, 12);
        assert_eq!(config.world.seed, 7);
        assert_eq!(config.world.obstacle_preset, ObstaclePreset::Corridors);
        assert!((config.tick.energy_regen_rate - 0.2).abs() < f64::EPSILON);
        assert!((config.tick.enemy_similarity - 0.55).abs() < f64::EPSILON);
        assert_eq!(config.behavior.attack_range, 2);
        assert!((config.events.effects.flood.regen_add - 0.5).abs() < f64::EPSILON);
        assert!(
            (config.events.effects.drought.drain_add - 0.1).abs() < f64::EPSILON,
            "untouched kinds keep their defaults"
        );
        assert_eq!(
            config.events.schedule.first().map(|e| e.kind),
            Some(EventKind::Drought)
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.run.ticks, 25);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = SimulationConfig::parse("world: [1, 2");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
