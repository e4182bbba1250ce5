//! I/O collaborators for the LOD pipeline
//!
//! This crate provides the import, export and scene-reset interfaces the
//! pipeline drives, plus their glTF implementation (`.glb` and `.gltf`).

pub mod error;
pub mod gltf_reader;
pub mod gltf_writer;

pub use error::*;
pub use gltf_reader::GltfReader;
pub use gltf_writer::GltfWriter;

use lodcrate_core::{LodAsset, SourceAsset};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options forwarded to the exporter for every LOD file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Write positions with every transform applied and an identity node
    pub bake_transforms: bool,
    /// Write only the LOD mesh, never other scene content
    pub selection_only: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            bake_transforms: true,
            selection_only: true,
        }
    }
}

/// Imports the source mesh of one input file
pub trait AssetImporter {
    /// Import the first mesh of the file at `path`; `Ok(None)` when it has none.
    fn import(&mut self, path: &Path) -> Result<Option<SourceAsset>, IoError>;
}

/// Exports one LOD mesh to a file
pub trait AssetExporter {
    fn export(&mut self, lod: &LodAsset, path: &Path, options: &ExportOptions) -> Result<(), IoError>;
}

/// Clears whatever a backend keeps about the current scene between assets.
///
/// Mesh data is not part of this: the pipeline owns each source and LOD mesh
/// and drops it when the asset is done.
pub trait SceneReset {
    fn reset(&mut self);
}

/// Everything the batch runner needs from the host side
pub trait SceneBackend: AssetImporter + AssetExporter + SceneReset {}

impl<T: AssetImporter + AssetExporter + SceneReset> SceneBackend for T {}

/// glTF import/export session.
///
/// Remembers the name and materials of the last imported scene until
/// [`SceneReset::reset`] is called. Imported meshes are handed out by value
/// and never retained here.
#[derive(Debug, Default)]
pub struct GltfSession {
    reader: GltfReader,
    writer: GltfWriter,
    /// Source file and materials of the scene currently loaded
    scene: Option<(String, Vec<String>)>,
    exported: usize,
}

impl GltfSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// File name of the scene currently loaded, if any
    pub fn current_scene(&self) -> Option<&str> {
        self.scene.as_ref().map(|(name, _)| name.as_str())
    }

    /// Files written since the session was created
    pub fn exported_count(&self) -> usize {
        self.exported
    }
}

impl AssetImporter for GltfSession {
    fn import(&mut self, path: &Path) -> Result<Option<SourceAsset>, IoError> {
        let asset = self.reader.read_asset(path)?;
        if let Some(asset) = &asset {
            self.scene = Some((asset.file_name(), asset.material_names.clone()));
        }
        Ok(asset)
    }
}

impl AssetExporter for GltfSession {
    fn export(&mut self, lod: &LodAsset, path: &Path, options: &ExportOptions) -> Result<(), IoError> {
        self.writer.write_lod(lod, path, options)?;
        self.exported += 1;
        Ok(())
    }
}

impl SceneReset for GltfSession {
    /// Forget the cached scene name and materials. Nothing else is held.
    fn reset(&mut self) {
        if let Some((name, materials)) = self.scene.take() {
            log::debug!("cleared scene {} ({} materials)", name, materials.len());
        }
    }
}
