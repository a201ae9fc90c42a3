//! Configuration file handling

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use stratoswarm_tilt_optimizer::{ClearSkyYieldModel, PanelLayout, PanelRow, RunConfig};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optimizer run parameters
    #[serde(default)]
    pub optimizer: RunConfig,

    /// Site and simulation settings
    #[serde(default)]
    pub site: SiteConfig,

    /// Panel layout generated for `tilt run`
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// Site and simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Latitude in degrees, positive north
    #[serde(default = "default_latitude")]
    pub latitude_deg: f64,

    /// Day simulated by the daily objective
    #[serde(default = "default_day_of_year")]
    pub day_of_year: u32,

    /// Days sampled by the yearly objective
    #[serde(default = "default_sample_days")]
    pub sample_days: u32,

    /// Frames the evaluator waits before simulating
    #[serde(default = "default_latency_frames")]
    pub latency_frames: u32,
}

fn default_latitude() -> f64 {
    40.0
}

fn default_day_of_year() -> u32 {
    172
}

fn default_sample_days() -> u32 {
    12
}

fn default_latency_frames() -> u32 {
    1
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            latitude_deg: default_latitude(),
            day_of_year: default_day_of_year(),
            sample_days: default_sample_days(),
            latency_frames: default_latency_frames(),
        }
    }
}

impl SiteConfig {
    /// Clear-sky model for this site
    pub fn yield_model(&self) -> ClearSkyYieldModel {
        ClearSkyYieldModel::new(self.latitude_deg)
            .with_day(self.day_of_year)
            .with_sample_days(self.sample_days)
    }
}

/// Generated panel layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Number of rows
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Collector area per row in square meters
    #[serde(default = "default_row_area")]
    pub row_area: f64,

    /// Module efficiency
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,

    /// Starting tilt of every row in degrees
    #[serde(default)]
    pub initial_tilt_deg: f64,
}

fn default_rows() -> usize {
    4
}

fn default_row_area() -> f64 {
    10.0
}

fn default_efficiency() -> f64 {
    0.2
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            row_area: default_row_area(),
            efficiency: default_efficiency(),
            initial_tilt_deg: 0.0,
        }
    }
}

impl LayoutConfig {
    /// Build a south-facing layout of identical rows
    pub fn build(&self) -> PanelLayout {
        let tilt = self.initial_tilt_deg.to_radians();
        PanelLayout::from_rows(
            (0..self.rows)
                .map(|i| {
                    PanelRow::new(format!("row-{}", i + 1), tilt)
                        .with_area(self.row_area)
                        .with_efficiency(self.efficiency)
                })
                .collect(),
        )
    }
}

impl AppConfig {
    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stratoswarm"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("tilt.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
