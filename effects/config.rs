//! Study configuration, read from a TOML file.
//!
//! Every field has a default, so an empty file describes the standard study:
//! a 10% holdout, a 10% internal test split, and a lambda grid from 0 to 10 in
//! steps of 0.25.

use crate::estimate::{CANDIDATE_CHAIN, GroupKey};
use crate::prepare::DateGranularity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Grid points closer than this to `stop` are still included.
const GRID_TOLERANCE: f64 = 1e-9;
/// Upper bound on the number of generated grid points. Each point costs one
/// full chain rebuild.
pub const MAX_GRID_POINTS: usize = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid lambda grid: {0}")]
    InvalidLambdaGrid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    pub seed: u64,
    /// Share of all ratings set aside for the final evaluation.
    pub holdout_fraction: f64,
    /// Share of the model-building ratings used to score models during selection.
    pub test_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            holdout_fraction: 0.1,
            test_fraction: 0.1,
        }
    }
}

/// Candidate shrinkage values. An explicit `lambdas` list wins over the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lambdas: Option<Vec<f64>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 10.0,
            step: 0.25,
            lambdas: None,
        }
    }
}

impl SearchConfig {
    /// Expands the configuration into the ordered candidate list.
    pub fn candidates(&self) -> Result<Vec<f64>, ConfigError> {
        if let Some(values) = &self.lambdas {
            if values.is_empty() {
                return Err(ConfigError::InvalidLambdaGrid(
                    "the explicit lambda list is empty".to_string(),
                ));
            }
            if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(ConfigError::InvalidLambdaGrid(format!(
                    "lambda values must be finite and non-negative, found {bad}"
                )));
            }
            return Ok(values.clone());
        }

        let (start, stop, step) = (self.start, self.stop, self.step);
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(ConfigError::InvalidLambdaGrid(
                "start, stop and step must be finite".to_string(),
            ));
        }
        if start < 0.0 {
            return Err(ConfigError::InvalidLambdaGrid(format!(
                "start must be non-negative, got {start}"
            )));
        }
        if step <= 0.0 {
            return Err(ConfigError::InvalidLambdaGrid(format!(
                "step must be positive, got {step}"
            )));
        }
        if stop < start {
            return Err(ConfigError::InvalidLambdaGrid(format!(
                "stop ({stop}) is below start ({start})"
            )));
        }

        let intervals = ((stop - start) / step + GRID_TOLERANCE).floor();
        if !intervals.is_finite() || intervals >= MAX_GRID_POINTS as f64 {
            return Err(ConfigError::InvalidLambdaGrid(format!(
                "a step of {step} from {start} to {stop} gives more than {MAX_GRID_POINTS} points"
            )));
        }
        let intervals = intervals as usize;
        Ok((0..=intervals).map(|i| start + i as f64 * step).collect())
    }
}

/// Rounding units for review dates, one per partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct DateConfig {
    /// Used for the training and test partitions.
    pub evaluation_granularity: DateGranularity,
    /// Used for the final holdout partition.
    pub holdout_granularity: DateGranularity,
}

impl DateConfig {
    pub fn is_consistent(&self) -> bool {
        self.evaluation_granularity == self.holdout_granularity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    pub output_dir: PathBuf,
    /// Grouping keys in fitting order, e.g. `["movie", "user"]`.
    pub chain: Vec<GroupKey>,
    pub split: SplitConfig,
    pub search: SearchConfig,
    pub dates: DateConfig,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            chain: CANDIDATE_CHAIN.to_vec(),
            split: SplitConfig::default(),
            search: SearchConfig::default(),
            dates: DateConfig::default(),
        }
    }
}

impl StudyConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;
        Ok(())
    }
}
