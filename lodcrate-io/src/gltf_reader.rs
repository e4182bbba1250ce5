//! glTF mesh import
//!
//! Reads the first mesh of a `.glb` or `.gltf` file into a [`PolygonMesh`].
//! "First" is a depth-first, pre-order walk of the default scene (or the
//! first scene when no default is set), visiting children in declaration
//! order. The node's world transform is baked into the positions. A document
//! without scenes falls back to its first mesh, untransformed.

use crate::IoError;
use gltf::mesh::Mode;
use gltf::{Document, Gltf};
use lodcrate_core::{Point3f, PolygonMesh, SourceAsset, Transform3D, Transformable, UV};
use std::path::Path;

/// Reads source meshes from glTF files
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfReader;

impl GltfReader {
    pub fn new() -> Self {
        Self
    }

    /// Import the first mesh of `path`. Returns `Ok(None)` when the file holds no mesh.
    ///
    /// Only `.glb` and `.gltf` files are read; other extensions are an
    /// [`IoError::InvalidFormat`].
    pub fn read_asset(&self, path: &Path) -> Result<Option<SourceAsset>, IoError> {
        if !path.is_file() {
            return Err(IoError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if extension != "glb" && extension != "gltf" {
            return Err(IoError::InvalidFormat { format: extension });
        }
        let Gltf { document, blob } = Gltf::open(path)?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)?;

        let Some((mesh, transform, node_name)) = select_mesh(&document) else {
            return Ok(None);
        };
        let (mut polygon_mesh, material_names) = read_primitives(&mesh, &buffers)?;
        if polygon_mesh.vertices.is_empty() {
            return Ok(None);
        }
        if !transform.is_identity(1e-6) {
            polygon_mesh.transform(&transform);
        }

        let mut asset = SourceAsset::new(path, polygon_mesh);
        asset.mesh_name = node_name.or_else(|| mesh.name().map(str::to_owned));
        asset.material_names = material_names;
        log::debug!(
            "imported mesh {:?} from {} ({} polygons, {} loose edges)",
            asset.mesh_name,
            path.display(),
            asset.mesh.polygon_count(),
            asset.mesh.loose_edges.len()
        );
        Ok(Some(asset))
    }
}

type MeshSelection<'a> = (gltf::Mesh<'a>, Transform3D, Option<String>);

fn select_mesh(document: &Document) -> Option<MeshSelection<'_>> {
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene
            .nodes()
            .find_map(|node| find_mesh_node(node, Transform3D::identity())),
        None => document
            .meshes()
            .next()
            .map(|mesh| (mesh, Transform3D::identity(), None)),
    }
}

fn find_mesh_node(node: gltf::Node<'_>, parent: Transform3D) -> Option<MeshSelection<'_>> {
    let world = parent.compose(Transform3D::from_columns(node.transform().matrix()));
    if let Some(mesh) = node.mesh() {
        return Some((mesh, world, node.name().map(str::to_owned)));
    }
    node.children().find_map(|child| find_mesh_node(child, world))
}

/// Merge every primitive of `mesh` into one polygon mesh.
///
/// Triangle modes become polygons, line modes loose edges and points bare
/// vertices. Returns the mesh and the distinct material names in first-use order.
fn read_primitives(
    mesh: &gltf::Mesh<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<(PolygonMesh, Vec<String>), IoError> {
    let mut out = PolygonMesh::new();
    let mut uvs: Vec<Vec<UV>> = Vec::new();
    let mut any_uvs = false;
    let mut materials: Vec<String> = Vec::new();

    for primitive in mesh.primitives() {
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data.0[..]));
        let Some(positions) = reader.read_positions() else {
            log::warn!("primitive {} has no positions, skipped", primitive.index());
            continue;
        };

        let base = out.vertices.len();
        out.vertices.extend(positions.map(Point3f::from));
        let count = out.vertices.len() - base;

        let tex_coords: Option<Vec<UV>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
        any_uvs |= tex_coords.is_some();
        let uv_at = |i: usize| {
            tex_coords
                .as_ref()
                .and_then(|t| t.get(i).copied())
                .unwrap_or([0.0, 0.0])
        };

        let indices: Vec<usize> = match reader.read_indices() {
            Some(indices) => indices.into_u32().map(|i| i as usize).collect(),
            None => (0..count).collect(),
        };
        if let Some(&bad) = indices.iter().find(|&&i| i >= count) {
            return Err(IoError::parse(format!(
                "index {} out of range for {} vertices in primitive {}",
                bad,
                count,
                primitive.index()
            )));
        }

        let mut push_triangle = |a: usize, b: usize, c: usize| {
            if a == b || b == c || c == a {
                return;
            }
            out.polygons.push(vec![base + a, base + b, base + c]);
            uvs.push(vec![uv_at(a), uv_at(b), uv_at(c)]);
        };

        match primitive.mode() {
            Mode::Triangles => {
                for tri in indices.chunks_exact(3) {
                    push_triangle(tri[0], tri[1], tri[2]);
                }
            }
            Mode::TriangleStrip => {
                for k in 0..indices.len().saturating_sub(2) {
                    if k % 2 == 0 {
                        push_triangle(indices[k], indices[k + 1], indices[k + 2]);
                    } else {
                        push_triangle(indices[k + 1], indices[k], indices[k + 2]);
                    }
                }
            }
            Mode::TriangleFan => {
                for k in 1..indices.len().saturating_sub(1) {
                    push_triangle(indices[0], indices[k], indices[k + 1]);
                }
            }
            Mode::Lines => {
                for line in indices.chunks_exact(2) {
                    out.loose_edges.push([base + line[0], base + line[1]]);
                }
            }
            Mode::LineStrip | Mode::LineLoop => {
                for line in indices.windows(2) {
                    out.loose_edges.push([base + line[0], base + line[1]]);
                }
                if primitive.mode() == Mode::LineLoop && indices.len() > 2 {
                    out.loose_edges.push([base + indices[indices.len() - 1], base + indices[0]]);
                }
            }
            Mode::Points => {}
        }

        if let Some(name) = primitive.material().name() {
            if !materials.iter().any(|m| m == name) {
                materials.push(name.to_owned());
            }
        }
    }

    out.loose_edges.retain(|e| e[0] != e[1]);
    if any_uvs {
        out.set_uvs(uvs);
    }
    Ok((out, materials))
}
