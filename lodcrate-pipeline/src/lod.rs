//! Per-asset LOD generation

use crate::{AssetOutcome, AssetReport, LodConfig, NameDeduplicator, TierOutcome, TierReport};
use lodcrate_algorithms::{MeshCleaner, ScaleNormalizer, SurfaceIndex, UvTransferrer};
use lodcrate_core::{LodAsset, PolygonMesh, SourceAsset};
use lodcrate_io::AssetExporter;
use lodcrate_simplification::{decimation_ratio, Decimator};
use std::path::Path;

/// Turns imported source assets into LOD files.
///
/// Holds the batch-wide name registry and the tier configuration. Every LOD
/// is derived from the normalized source, never from a sibling LOD.
pub struct LodPipeline {
    config: LodConfig,
    names: NameDeduplicator,
    normalizer: ScaleNormalizer,
    cleaner: MeshCleaner,
    decimator: Decimator,
    transferrer: UvTransferrer,
}

impl LodPipeline {
    pub fn new(config: LodConfig) -> Self {
        let transferrer = match config.uv_max_distance {
            Some(d) => UvTransferrer::with_max_distance(d),
            None => UvTransferrer::new(),
        };
        Self {
            cleaner: MeshCleaner::with_merge_distance(config.merge_distance),
            config,
            names: NameDeduplicator::new(),
            normalizer: ScaleNormalizer::new(),
            decimator: Decimator::new(),
            transferrer,
        }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn names(&self) -> &NameDeduplicator {
        &self.names
    }

    /// Generate and export every tier of `source` into `out_dir`.
    ///
    /// Export and decimation failures are logged and recorded per tier; the
    /// remaining tiers are still attempted. `source` is dropped on return.
    pub fn process_asset<E>(&mut self, mut source: SourceAsset, out_dir: &Path, exporter: &mut E) -> AssetReport
    where
        E: AssetExporter + ?Sized,
    {
        let file = source.file_name();
        match self.normalizer.normalize(&mut source.mesh) {
            Some(factor) => log::debug!("normalized {} by {:.6}", file, factor),
            None => log::debug!("{} has zero extent, scale left as is", file),
        }

        log::info!("Materials on source:");
        for name in &source.material_names {
            log::info!("  {}", name);
        }

        let base = self.names.dedup(&file);
        let index = SurfaceIndex::build(&source.mesh);
        if index.is_none() {
            log::debug!("{} has no UV layer, LODs keep their own UVs", file);
        }

        let mut tiers = Vec::with_capacity(self.config.tiers.len());
        for (tier_index, &target) in self.config.tiers.iter().enumerate() {
            let name = LodAsset::lod_name(&base, tier_index);
            let mut mesh = source.mesh.clone();
            let ratio = match self.build_lod(&mut mesh, target, index.as_ref()) {
                Ok(ratio) => ratio,
                Err(e) => {
                    log::error!("   Decimation failed for {}: {}", name, e);
                    tiers.push(TierReport {
                        name,
                        tier_index,
                        target,
                        ratio: decimation_ratio(target, mesh.triangle_equivalent_count()),
                        vertices: mesh.vertex_count(),
                        triangles: mesh.triangle_equivalent_count(),
                        outcome: TierOutcome::Failed(e.to_string()),
                    });
                    continue;
                }
            };
            log::info!("   {} ↳ {}", name, mesh.stats());

            let lod = LodAsset {
                name,
                tier_index,
                target_triangles: target,
                mesh,
                material_names: source.material_names.clone(),
            };
            let outcome = self.export_lod(&lod, out_dir, exporter);
            tiers.push(TierReport {
                vertices: lod.mesh.vertex_count(),
                triangles: lod.mesh.triangle_equivalent_count(),
                name: lod.name,
                tier_index,
                target,
                ratio,
                outcome,
            });
        }

        AssetReport {
            file,
            base_name: Some(base),
            outcome: AssetOutcome::Exported,
            tiers,
        }
    }

    /// Clean, decimate and resample one working copy. Returns the decimation ratio.
    fn build_lod(&self, mesh: &mut PolygonMesh, target: usize, index: Option<&SurfaceIndex>) -> lodcrate_core::Result<f32> {
        self.cleaner.clean(mesh);
        let decimation = self.decimator.decimate(mesh, target)?;
        if let Some(index) = index {
            let transfer = self.transferrer.transfer_from_index(mesh, index);
            if transfer.out_of_range > 0 {
                log::debug!(
                    "{} of {} corners beyond the UV transfer distance",
                    transfer.out_of_range,
                    transfer.out_of_range + transfer.transferred
                );
            }
        }
        Ok(decimation.ratio)
    }

    fn export_lod<E>(&self, lod: &LodAsset, out_dir: &Path, exporter: &mut E) -> TierOutcome
    where
        E: AssetExporter + ?Sized,
    {
        let path = out_dir.join(lod.file_name());
        match exporter.export(lod, &path, &self.config.export) {
            Ok(()) => TierOutcome::Exported(path),
            Err(e) => {
                log::error!("   Export failed for {}: {}", lod.name, e);
                TierOutcome::Failed(e.to_string())
            }
        }
    }
}
