//! Unit-scale normalization

use lodcrate_core::{Bounded, PolygonMesh, Transform3D, Transformable};

/// Rescales meshes so their largest bounding-box dimension is one unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleNormalizer;

impl ScaleNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Scale `mesh` uniformly about its origin and bake the scale into positions.
    ///
    /// Returns the applied factor, or `None` when the largest dimension is zero
    /// (empty or single-point meshes), in which case the mesh is left untouched.
    pub fn normalize(&self, mesh: &mut PolygonMesh) -> Option<f32> {
        let max_dim = mesh.dimensions().max();
        if max_dim == 0.0 || !max_dim.is_finite() {
            return None;
        }
        let factor = 1.0 / max_dim;
        mesh.transform(&Transform3D::uniform_scaling(factor));
        Some(factor)
    }
}
