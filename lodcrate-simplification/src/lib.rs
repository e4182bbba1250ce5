//! Mesh simplification and decimation
//!
//! This crate reduces mesh complexity toward a triangle budget:
//! - Edge collapse simplification driven by quadric error metrics
//! - Budget-driven decimation that bakes the result into the mesh

pub mod edge_collapse;
pub mod decimate;

pub use edge_collapse::*;
pub use decimate::*;

use lodcrate_core::{PolygonMesh, Result};

/// Simplify a mesh by reducing the number of faces/vertices
pub trait MeshSimplifier {
    /// Simplify mesh keeping `keep_ratio` of its triangles
    /// (1.0 = no reduction, values toward 0.0 = stronger reduction)
    fn simplify(&self, mesh: &PolygonMesh, keep_ratio: f32) -> Result<PolygonMesh>;
}
