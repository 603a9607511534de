//! Run configuration for the equilibrium engines.
//!
//! Loaded from YAML; covers the knobs shared by the SeeSaw loop and the
//! moment-matrix hierarchy: local dimension, relaxation level, backend
//! identity, convergence tolerance, iteration budget, and RNG seed.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::sdp::Solver;

/// Solver run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveConfig {
    /// Human-readable name for this run.
    pub name: String,
    /// Local Hilbert-space dimension per player.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Moment-hierarchy relaxation level.
    #[serde(default = "default_level")]
    pub level: u8,
    /// Backend identity.
    #[serde(default)]
    pub solver: Solver,
    /// SeeSaw stops when the payout difference drops below this.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Maximum number of SeeSaw rounds.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// RNG seed for POVM initialization.
    #[serde(default)]
    pub seed: u64,
}

fn default_dimension() -> usize {
    2
}

fn default_level() -> u8 {
    1
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_max_rounds() -> u32 {
    50
}

impl SolveConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or any field fails
    /// validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension < 2 {
            return Err(ConfigError::InvalidDimension(self.dimension));
        }
        if !(1..=3).contains(&self.level) {
            return Err(ConfigError::InvalidLevel(self.level));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds);
        }
        Ok(())
    }
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            dimension: default_dimension(),
            level: default_level(),
            solver: Solver::default(),
            tolerance: default_tolerance(),
            max_rounds: default_max_rounds(),
            seed: 0,
        }
    }
}

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("failed to read config file {0}: {1}")]
    Io(std::path::PathBuf, #[source] std::io::Error),

    /// YAML parsing error (includes unknown solver names)
    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Dimension below 2
    #[error("invalid dimension: {0} (must be >= 2)")]
    InvalidDimension(usize),

    /// Relaxation level outside 1..=3
    #[error("invalid relaxation level: {0} (must be 1, 2 or 3)")]
    InvalidLevel(u8),

    /// Non-positive tolerance
    #[error("invalid tolerance: {0} (must be > 0)")]
    InvalidTolerance(f64),

    /// Zero iteration budget
    #[error("max_rounds must be > 0")]
    InvalidMaxRounds,
}
