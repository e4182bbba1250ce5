//! Per-tier, per-asset and per-batch outcomes

use std::fmt;
use std::path::PathBuf;

/// Result of one tier
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    Exported(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierReport {
    /// `{base}_LOD{tier_index}`
    pub name: String,
    pub tier_index: usize,
    pub target: usize,
    /// Keep ratio handed to the decimator, 1.0 when nothing was removed
    pub ratio: f32,
    pub vertices: usize,
    pub triangles: usize,
    pub outcome: TierOutcome,
}

impl TierReport {
    pub fn is_exported(&self) -> bool {
        matches!(self.outcome, TierOutcome::Exported(_))
    }
}

/// Why an asset produced no LODs
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The importer failed to read the file
    ImportFailed(String),
    /// The file imported fine but holds no mesh
    NoMesh,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ImportFailed(e) => write!(f, "import failed: {}", e),
            SkipReason::NoMesh => write!(f, "no mesh found"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssetOutcome {
    /// Every tier was attempted; see the tier reports for export results
    Exported,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetReport {
    /// Source file name
    pub file: String,
    /// Deduplicated base name, absent for skipped assets
    pub base_name: Option<String>,
    pub outcome: AssetOutcome,
    pub tiers: Vec<TierReport>,
}

impl AssetReport {
    pub fn skipped(file: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            file: file.into(),
            base_name: None,
            outcome: AssetOutcome::Skipped(reason),
            tiers: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Skipped(_))
    }

    pub fn exported_count(&self) -> usize {
        self.tiers.iter().filter(|t| t.is_exported()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tiers.len() - self.exported_count()
    }
}

/// Summary of a whole batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub assets: Vec<AssetReport>,
}

impl BatchReport {
    /// No eligible input file was found
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets_seen(&self) -> usize {
        self.assets.len()
    }

    pub fn assets_processed(&self) -> usize {
        self.assets.iter().filter(|a| !a.is_skipped()).count()
    }

    pub fn assets_skipped(&self) -> usize {
        self.assets.iter().filter(|a| a.is_skipped()).count()
    }

    pub fn lods_exported(&self) -> usize {
        self.assets.iter().map(AssetReport::exported_count).sum()
    }

    pub fn lods_failed(&self) -> usize {
        self.assets.iter().map(AssetReport::failed_count).sum()
    }

    /// Paths of every LOD file written, in export order
    pub fn exported_files(&self) -> Vec<PathBuf> {
        self.assets
            .iter()
            .flat_map(|a| &a.tiers)
            .filter_map(|t| match &t.outcome {
                TierOutcome::Exported(path) => Some(path.clone()),
                TierOutcome::Failed(_) => None,
            })
            .collect()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} assets processed, {} skipped, {} LOD files exported, {} failed",
            self.assets_processed(),
            self.assets_seen(),
            self.assets_skipped(),
            self.lods_exported(),
            self.lods_failed()
        )
    }
}
