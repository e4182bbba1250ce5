//! Asset records passed between import, the LOD pipeline and export

use crate::mesh::PolygonMesh;
use std::path::PathBuf;

/// The high-detail mesh imported from one input file.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    /// Input file the mesh was imported from
    pub path: PathBuf,
    /// Name of the node or mesh the geometry was taken from
    pub mesh_name: Option<String>,
    pub mesh: PolygonMesh,
    /// Materials referenced by the imported mesh, in first-use order
    pub material_names: Vec<String>,
}

impl SourceAsset {
    pub fn new(path: impl Into<PathBuf>, mesh: PolygonMesh) -> Self {
        Self {
            path: path.into(),
            mesh_name: None,
            mesh,
            material_names: Vec::new(),
        }
    }

    /// File name component of the source path
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One simplified variant of a source asset, ready for export.
///
/// Owns its mesh outright; changing it never touches the source or sibling LODs.
#[derive(Debug, Clone)]
pub struct LodAsset {
    /// `{base}_LOD{tier_index}`
    pub name: String,
    pub tier_index: usize,
    pub target_triangles: usize,
    pub mesh: PolygonMesh,
    pub material_names: Vec<String>,
}

impl LodAsset {
    pub fn lod_name(base: &str, tier_index: usize) -> String {
        format!("{}_LOD{}", base, tier_index)
    }

    /// Output file name, `{name}.glb`
    pub fn file_name(&self) -> String {
        format!("{}.glb", self.name)
    }
}
