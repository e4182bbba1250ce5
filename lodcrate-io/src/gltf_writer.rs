//! glTF binary (GLB) export of LOD meshes
//!
//! Each file holds one scene with one node and one mesh. Polygons are
//! fan-triangulated and vertices are split wherever a vertex carries more
//! than one UV, since glTF attributes are per-vertex.

use crate::{ExportOptions, IoError};
use gltf::json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use lodcrate_core::{LodAsset, PolygonMesh, Vector3f};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const GENERATOR: &str = concat!("lodcrate ", env!("CARGO_PKG_VERSION"));

/// Writes LOD meshes as GLB files
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfWriter;

/// Vertex streams ready for the binary chunk
struct ExportGeometry {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Option<Vec<[f32; 2]>>,
    indices: Vec<u32>,
}

impl GltfWriter {
    pub fn new() -> Self {
        Self
    }

    /// Write `lod` to a new file at `path`.
    ///
    /// The GLB is assembled in memory first; `path` is only created once
    /// serialization has succeeded.
    pub fn write_lod(&self, lod: &LodAsset, path: &Path, options: &ExportOptions) -> Result<(), IoError> {
        let mut glb: Vec<u8> = Vec::new();
        self.write_glb(lod, options, &mut glb)?;

        let file = File::create(path).map_err(|e| {
            IoError::write(format!("cannot create {}: {}", path.display(), e))
        })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&glb)?;
        writer.flush()?;
        Ok(())
    }

    /// Serialize `lod` as GLB into `writer`.
    ///
    /// LOD meshes are already in baked object space, so the node is written
    /// without a transform and only the LOD mesh itself is included.
    pub fn write_glb<W: Write>(&self, lod: &LodAsset, options: &ExportOptions, writer: W) -> Result<(), IoError> {
        if lod.mesh.is_empty() {
            return Err(IoError::write(format!("{} has no polygons to export", lod.name)));
        }
        log::trace!(
            "writing {} (bake_transforms: {}, selection_only: {})",
            lod.name,
            options.bake_transforms,
            options.selection_only
        );

        let geometry = build_geometry(&lod.mesh)?;
        let mut root = json::Root::default();
        root.asset = json::Asset {
            version: "2.0".to_string(),
            generator: Some(GENERATOR.to_string()),
            ..Default::default()
        };

        let mut bin_data: Vec<u8> = Vec::new();
        let mut attributes = BTreeMap::new();

        let (min, max) = bounding_coords(&geometry.positions);
        let positions = push_view(
            &mut root,
            &mut bin_data,
            &encode_f32(&geometry.positions),
            json::buffer::Target::ArrayBuffer,
        );
        let positions = push_accessor(
            &mut root,
            positions,
            geometry.positions.len(),
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec3,
            Some((min.to_vec(), max.to_vec())),
        );
        attributes.insert(Valid(json::mesh::Semantic::Positions), positions);

        let normals = push_view(
            &mut root,
            &mut bin_data,
            &encode_f32(&geometry.normals),
            json::buffer::Target::ArrayBuffer,
        );
        let normals = push_accessor(
            &mut root,
            normals,
            geometry.normals.len(),
            json::accessor::ComponentType::F32,
            json::accessor::Type::Vec3,
            None,
        );
        attributes.insert(Valid(json::mesh::Semantic::Normals), normals);

        if let Some(uvs) = &geometry.uvs {
            let view = push_view(
                &mut root,
                &mut bin_data,
                &encode_f32(uvs),
                json::buffer::Target::ArrayBuffer,
            );
            let accessor = push_accessor(
                &mut root,
                view,
                uvs.len(),
                json::accessor::ComponentType::F32,
                json::accessor::Type::Vec2,
                None,
            );
            attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), accessor);
        }

        let index_bytes: Vec<u8> = geometry.indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let indices = push_view(
            &mut root,
            &mut bin_data,
            &index_bytes,
            json::buffer::Target::ElementArrayBuffer,
        );
        let indices = push_accessor(
            &mut root,
            indices,
            geometry.indices.len(),
            json::accessor::ComponentType::U32,
            json::accessor::Type::Scalar,
            None,
        );

        root.push(json::Buffer {
            byte_length: USize64::from(bin_data.len()),
            uri: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        // The primitive references the first material; the rest keep their names in the file
        let materials: Vec<json::Index<json::Material>> = lod
            .material_names
            .iter()
            .map(|name| {
                root.push(json::Material {
                    name: Some(name.clone()),
                    ..Default::default()
                })
            })
            .collect();

        let primitive = json::mesh::Primitive {
            attributes,
            indices: Some(indices),
            material: materials.first().copied(),
            mode: Valid(json::mesh::Mode::Triangles),
            targets: None,
            extensions: Default::default(),
            extras: Default::default(),
        };
        let mesh = root.push(json::Mesh {
            primitives: vec![primitive],
            weights: None,
            name: Some(lod.name.clone()),
            extensions: Default::default(),
            extras: Default::default(),
        });
        let node = root.push(json::Node {
            mesh: Some(mesh),
            name: Some(lod.name.clone()),
            ..Default::default()
        });
        let scene = root.push(json::Scene {
            nodes: vec![node],
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        root.scene = Some(scene);

        let json_string = json::serialize::to_string(&root)
            .map_err(|e| IoError::write(format!("glTF serialization failed: {}", e)))?;
        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: 0, // to_writer computes this
            },
            json: Cow::Owned(json_string.into_bytes()),
            bin: Some(Cow::Owned(bin_data)),
        };
        glb.to_writer(writer)?;
        Ok(())
    }
}

/// Triangulate and split vertices by UV.
fn build_geometry(mesh: &PolygonMesh) -> Result<ExportGeometry, IoError> {
    let vertex_normals = smooth_normals(mesh);
    let capacity = mesh.loop_count();
    let mut geometry = ExportGeometry {
        positions: Vec::with_capacity(capacity),
        normals: Vec::with_capacity(capacity),
        uvs: mesh.uvs.as_ref().map(|_| Vec::with_capacity(capacity)),
        indices: Vec::with_capacity(mesh.triangle_equivalent_count() * 3),
    };
    let mut lookup: HashMap<(usize, [u32; 2]), u32> = HashMap::with_capacity(capacity);

    for (pi, corners) in mesh.fan_triangles() {
        let polygon = &mesh.polygons[pi];
        for c in corners {
            let v = polygon[c];
            let uv = mesh.uvs.as_ref().map(|layer| layer[pi][c]);
            let key = (v, uv.map_or([0, 0], |uv| [uv[0].to_bits(), uv[1].to_bits()]));
            let index = match lookup.get(&key) {
                Some(&index) => index,
                None => {
                    let index = u32::try_from(geometry.positions.len()).map_err(|_| {
                        IoError::write("mesh exceeds the u32 index range".to_string())
                    })?;
                    let p = mesh.vertices[v];
                    let n = vertex_normals[v];
                    geometry.positions.push([p.x, p.y, p.z]);
                    geometry.normals.push([n.x, n.y, n.z]);
                    if let (Some(out), Some(uv)) = (geometry.uvs.as_mut(), uv) {
                        out.push(uv);
                    }
                    lookup.insert(key, index);
                    index
                }
            };
            geometry.indices.push(index);
        }
    }
    Ok(geometry)
}

/// Area-weighted vertex normals; vertices without faces point up.
fn smooth_normals(mesh: &PolygonMesh) -> Vec<Vector3f> {
    let mut normals = vec![Vector3f::zeros(); mesh.vertices.len()];
    for (pi, [a, b, c]) in mesh.fan_triangles() {
        let polygon = &mesh.polygons[pi];
        let (a, b, c) = (polygon[a], polygon[b], polygon[c]);
        let face = (mesh.vertices[b] - mesh.vertices[a]).cross(&(mesh.vertices[c] - mesh.vertices[a]));
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3f::z))
        .collect()
}

fn encode_f32<const N: usize>(items: &[[f32; N]]) -> Vec<u8> {
    items
        .iter()
        .flatten()
        .flat_map(|value| value.to_le_bytes())
        .collect()
}

fn push_view(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    bytes: &[u8],
    target: json::buffer::Target,
) -> json::Index<json::buffer::View> {
    let byte_offset = bin_data.len();
    bin_data.extend_from_slice(bytes);
    pad_to_4(bin_data);

    root.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(bytes.len()),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        target: Some(Valid(target)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn push_accessor(
    root: &mut json::Root,
    view: json::Index<json::buffer::View>,
    count: usize,
    component_type: json::accessor::ComponentType,
    type_: json::accessor::Type,
    bounds: Option<(Vec<f32>, Vec<f32>)>,
) -> json::Index<json::Accessor> {
    let (min, max) = match bounds {
        Some((min, max)) => (Some(json::Value::from(min)), Some(json::Value::from(max))),
        None => (None, None),
    };
    root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Valid(json::accessor::GenericComponentType(component_type)),
        type_: Valid(type_),
        min,
        max,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn pad_to_4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

fn bounding_coords(points: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in points {
        for i in 0..3 {
            min[i] = f32::min(min[i], p[i]);
            max[i] = f32::max(max[i], p[i]);
        }
    }
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodcrate_core::Point3f;

    fn quad() -> PolygonMesh {
        let mut mesh = PolygonMesh::from_vertices_and_polygons(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
        );
        mesh.set_uvs(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]);
        mesh
    }

    #[test]
    fn test_geometry_is_fan_triangulated() {
        let geometry = build_geometry(&quad()).unwrap();
        assert_eq!(geometry.positions.len(), 4);
        assert_eq!(geometry.indices, vec![0, 1, 2, 0, 2, 3]);
        for n in &geometry.normals {
            assert_eq!(*n, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_uv_seams_split_vertices() {
        let mut mesh = PolygonMesh::from_triangles(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        );
        // Vertices 0 and 2 sit on a seam and carry different UVs per face
        mesh.set_uvs(vec![
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]],
            vec![[0.5, 0.0], [0.9, 1.0], [0.0, 1.0]],
        ]);
        let geometry = build_geometry(&mesh).unwrap();
        assert_eq!(geometry.positions.len(), 6);
        assert_eq!(geometry.uvs.as_ref().unwrap().len(), 6);
    }

    #[test]
    fn test_mesh_without_uvs_has_no_texcoords() {
        let mut mesh = quad();
        mesh.uvs = None;
        let geometry = build_geometry(&mesh).unwrap();
        assert!(geometry.uvs.is_none());
        assert_eq!(geometry.positions.len(), 4);
    }

    #[test]
    fn test_empty_lod_is_a_write_error() {
        let lod = LodAsset {
            name: "Empty_LOD0".to_string(),
            tier_index: 0,
            target_triangles: 10,
            mesh: PolygonMesh::new(),
            material_names: Vec::new(),
        };
        let result = GltfWriter::new().write_glb(&lod, &ExportOptions::default(), Vec::<u8>::new());
        assert!(matches!(result, Err(IoError::WriteError { .. })));
    }

    #[test]
    fn test_glb_header() {
        let lod = LodAsset {
            name: "Quad_LOD0".to_string(),
            tier_index: 0,
            target_triangles: 2,
            mesh: quad(),
            material_names: vec!["Wood".to_string()],
        };
        let mut bytes = Vec::new();
        GltfWriter::new()
            .write_glb(&lod, &ExportOptions::default(), &mut bytes)
            .unwrap();
        assert_eq!(&bytes[0..4], b"glTF");
        let length = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        assert_eq!(length as usize, bytes.len());
    }
}
