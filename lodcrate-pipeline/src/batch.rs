//! Batch runner over a source directory

use crate::{AssetReport, BatchReport, LodConfig, LodPipeline, PipelineError, Result, SkipReason};
use lodcrate_io::{AssetImporter, SceneBackend, SceneReset};
use std::fs;
use std::path::{Path, PathBuf};

/// `.glb` files directly inside `dir` (extension matched case-insensitively),
/// sorted by file name.
pub fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_glb = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("glb"));
        if is_glb && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Validate `config` and run one batch with a fresh name registry.
pub fn run_batch<B>(config: &LodConfig, backend: &mut B) -> Result<BatchReport>
where
    B: SceneBackend + ?Sized,
{
    config.validate()?;
    LodPipeline::new(config.clone()).run(backend)
}

impl LodPipeline {
    /// Process every input file of the configured source directory.
    ///
    /// A missing source directory is an error. A directory without input
    /// files yields an empty report and creates nothing. Per-asset and
    /// per-tier failures are recorded in the report and never stop the batch.
    pub fn run<B>(&mut self, backend: &mut B) -> Result<BatchReport>
    where
        B: SceneBackend + ?Sized,
    {
        let source_dir = self.config().source_dir.clone();
        if !source_dir.is_dir() {
            log::error!("Source directory not found: {}", source_dir.display());
            return Err(PipelineError::SourceDirectoryNotFound(source_dir));
        }

        let files = collect_inputs(&source_dir)?;
        if files.is_empty() {
            log::info!("No GLBs in source directory {}", source_dir.display());
            return Ok(BatchReport::default());
        }

        let out_dir = self.config().output_dir();
        fs::create_dir_all(&out_dir)?;

        log::info!("Found {} GLB(s). Starting …", files.len());
        let mut report = BatchReport::default();
        for path in &files {
            backend.reset();
            report.assets.push(self.run_file(path, &out_dir, backend));
            backend.reset();
        }
        log::info!("LOD generation complete: {}", report);
        Ok(report)
    }

    fn run_file<B>(&mut self, path: &Path, out_dir: &Path, backend: &mut B) -> AssetReport
    where
        B: SceneBackend + ?Sized,
    {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("➜ Import {}", file);

        match backend.import(path) {
            Ok(Some(source)) => self.process_asset(source, out_dir, backend),
            Ok(None) => {
                log::warn!("   No mesh found, skipped");
                AssetReport::skipped(file, SkipReason::NoMesh)
            }
            Err(e) => {
                log::warn!("   Import failed for {}, skipped: {}", file, e);
                AssetReport::skipped(file, SkipReason::ImportFailed(e.to_string()))
            }
        }
    }
}
