//! Batch configuration
//!
//! Loaded from TOML; every key is optional and falls back to [`LodConfig::default`]:
//!
//! ```toml
//! source_dir = "assets/props"
//! tiers = [3000, 1500, 500]
//! output_subfolder = "Processed_LOD"
//! merge_distance = 1e-5
//! uv_max_distance = 0.05
//!
//! [export]
//! bake_transforms = true
//! selection_only = true
//! ```

use crate::{PipelineError, Result};
use lodcrate_algorithms::DEFAULT_MERGE_DISTANCE;
use lodcrate_io::ExportOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Triangle targets used when none are configured, LOD0 first
pub const DEFAULT_TIERS: [usize; 3] = [3000, 1500, 500];

pub const DEFAULT_OUTPUT_SUBFOLDER: &str = "Processed_LOD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    /// Directory scanned (non-recursively) for `.glb` files
    pub source_dir: PathBuf,
    /// Triangle-equivalent targets; the position is the LOD index
    pub tiers: Vec<usize>,
    /// Created inside `source_dir` to receive the LOD files
    pub output_subfolder: String,
    /// Vertex weld tolerance used by the cleaner
    pub merge_distance: f32,
    /// Corners farther than this from the source surface keep their UV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_max_distance: Option<f32>,
    pub export: ExportOptions,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            tiers: DEFAULT_TIERS.to_vec(),
            output_subfolder: DEFAULT_OUTPUT_SUBFOLDER.to_string(),
            merge_distance: DEFAULT_MERGE_DISTANCE,
            uv_max_distance: None,
            export: ExportOptions::default(),
        }
    }
}

impl LodConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the values a batch cannot run with.
    ///
    /// Tiers that are not in descending order are accepted with a warning.
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(PipelineError::InvalidConfig("at least one tier is required".into()));
        }
        if let Some(index) = self.tiers.iter().position(|&t| t == 0) {
            return Err(PipelineError::InvalidConfig(format!(
                "tier {} has a target of 0 triangles",
                index
            )));
        }
        if self.output_subfolder.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("output_subfolder is empty".into()));
        }
        if !self.merge_distance.is_finite() || self.merge_distance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "merge_distance must be a finite non-negative number, got {}",
                self.merge_distance
            )));
        }
        if let Some(d) = self.uv_max_distance {
            if !d.is_finite() || d < 0.0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "uv_max_distance must be a finite non-negative number, got {}",
                    d
                )));
            }
        }
        if self.tiers.windows(2).any(|w| w[1] > w[0]) {
            log::warn!("tiers {:?} are not in descending order", self.tiers);
        }
        Ok(())
    }

    /// Directory the LOD files are written to
    pub fn output_dir(&self) -> PathBuf {
        self.source_dir.join(&self.output_subfolder)
    }
}
