//! Triangle-budget decimation

use crate::{EdgeCollapseSimplifier, MeshSimplifier};
use lodcrate_core::{PolygonMesh, Result};

/// Smallest fraction of the current triangles a decimation may keep
pub const MIN_DECIMATION_RATIO: f32 = 0.01;

/// Fraction of `current` triangles to keep to reach `target`,
/// clamped to `[MIN_DECIMATION_RATIO, 1.0]`. A mesh without triangles gets 1.0.
pub fn decimation_ratio(target: usize, current: usize) -> f32 {
    if current == 0 {
        return 1.0;
    }
    (target as f32 / current as f32).clamp(MIN_DECIMATION_RATIO, 1.0)
}

/// Outcome of one decimation, in triangle-equivalents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimationReport {
    pub ratio: f32,
    pub before: usize,
    pub after: usize,
}

impl DecimationReport {
    /// Whether the mesh was left exactly as it was
    pub fn is_noop(&self) -> bool {
        self.ratio >= 1.0
    }
}

/// Reduces a mesh toward a triangle budget and bakes the result into it.
pub struct Decimator<S: MeshSimplifier = EdgeCollapseSimplifier> {
    simplifier: S,
}

impl Default for Decimator {
    fn default() -> Self {
        Self::new()
    }
}

impl Decimator {
    pub fn new() -> Self {
        Self {
            simplifier: EdgeCollapseSimplifier::new(),
        }
    }
}

impl<S: MeshSimplifier> Decimator<S> {
    pub fn with_simplifier(simplifier: S) -> Self {
        Self { simplifier }
    }

    /// Decimate `mesh` in place toward `target` triangle-equivalents.
    ///
    /// Meshes already at or under budget, and meshes without polygons, are
    /// left untouched. The reached count is advisory: collapse stops early
    /// when no further edge can be removed without breaking the surface.
    pub fn decimate(&self, mesh: &mut PolygonMesh, target: usize) -> Result<DecimationReport> {
        let before = mesh.triangle_equivalent_count();
        let ratio = decimation_ratio(target, before);
        if ratio >= 1.0 {
            return Ok(DecimationReport {
                ratio,
                before,
                after: before,
            });
        }

        *mesh = self.simplifier.simplify(mesh, ratio)?;
        let after = mesh.triangle_equivalent_count();
        log::debug!(
            "decimated {} -> {} triangles (target {}, ratio {:.4})",
            before,
            after,
            target,
            ratio
        );
        Ok(DecimationReport {
            ratio,
            before,
            after,
        })
    }
}
