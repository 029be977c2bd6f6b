//! Configuration types for the transport preview pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::curve::Operation;

/// Configuration for the curve processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Raw data is a concatenated up/down sweep
    #[serde(default = "default_up_down_sweep")]
    pub up_down_sweep: bool,

    /// Operations queued on every curve when none are given on the command line
    #[serde(default)]
    pub operations: Vec<Operation>,
}

fn default_up_down_sweep() -> bool {
    true
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            up_down_sweep: default_up_down_sweep(),
            operations: Vec::new(),
        }
    }
}

/// Configuration for splitting multi-field recordings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Expose diff/sum/raw1/raw2 per segment
    #[serde(default = "default_use_delta_method")]
    pub use_delta_method: bool,

    /// Fixed number of angle points per field; detected from the field column if unset
    #[serde(default)]
    pub points_per_field: Option<usize>,
}

fn default_use_delta_method() -> bool {
    true
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            use_delta_method: default_use_delta_method(),
            points_per_field: None,
        }
    }
}

/// Configuration for the harmonic fitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Maximum Levenberg-Marquardt iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Relative decrease of the residual below which the fit has converged
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// Relative parameter step below which the fit has converged
    #[serde(default = "default_step_tolerance")]
    pub step_tolerance: f64,

    /// Starting damping factor
    #[serde(default = "default_initial_damping")]
    pub initial_damping: f64,

    /// Angular frequency seed used when the spectrum estimate is zero or infinite
    #[serde(default = "default_frequency_fallback")]
    pub frequency_fallback: f64,

    /// Fit a vertical offset
    #[serde(default = "default_fit_offset")]
    pub fit_offset: bool,
}

fn default_max_iterations() -> usize {
    200
}

fn default_tolerance() -> f64 {
    1e-12
}

fn default_step_tolerance() -> f64 {
    1e-12
}

fn default_initial_damping() -> f64 {
    1e-3
}

fn default_frequency_fallback() -> f64 {
    1e-2
}

fn default_fit_offset() -> bool {
    true
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            step_tolerance: default_step_tolerance(),
            initial_damping: default_initial_damping(),
            frequency_fallback: default_frequency_fallback(),
            fit_offset: default_fit_offset(),
        }
    }
}

/// Configuration for plain-text column import and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoConfig {
    /// Column delimiter (single ASCII character)
    #[serde(default = "default_delimiter", deserialize_with = "deserialize_delimiter")]
    pub delimiter: char,

    /// Digits after the decimal point in exported values
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// First non-comment row of an input file is a header
    #[serde(default)]
    pub has_header: bool,
}

fn default_delimiter() -> char {
    '\t'
}

fn default_precision() -> usize {
    8
}

/// Delimiter that does not fit in a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("delimiter {0:?} is not an ASCII character")]
pub struct InvalidDelimiter(pub char);

fn deserialize_delimiter<'de, D>(deserializer: D) -> Result<char, D::Error>
where
    D: Deserializer<'de>,
{
    let delimiter = char::deserialize(deserializer)?;
    if delimiter.is_ascii() {
        Ok(delimiter)
    } else {
        Err(serde::de::Error::custom(InvalidDelimiter(delimiter)))
    }
}

impl IoConfig {
    /// Delimiter as a byte.
    pub fn delimiter_byte(&self) -> Result<u8, InvalidDelimiter> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(InvalidDelimiter(self.delimiter))
        }
    }
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            precision: default_precision(),
            has_header: false,
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub fit: FitConfig,

    #[serde(default)]
    pub io: IoConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
