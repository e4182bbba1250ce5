//! Nearest-surface UV transfer from a high-detail mesh onto its LODs

use crate::nearest_surface::SurfaceIndex;
use lodcrate_core::{Point3f, PolygonMesh, UV};
use rayon::prelude::*;

/// What a transfer wrote into the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UvTransferReport {
    /// Corners that received a UV from the source surface
    pub transferred: usize,
    /// Corners left untouched because the surface was beyond `max_distance`
    pub out_of_range: usize,
    /// The target had no UV layer and one was created
    pub created_layer: bool,
}

/// Copies per-corner UVs from a source surface onto a target mesh.
///
/// Each target corner samples the source at the point of the source surface
/// closest to its vertex, interpolating the source UVs barycentrically. Corners
/// of one welded vertex are sampled separately, each from the source face its
/// own polygon lies on, so UV seams survive. Only the target's UV layer is
/// written; positions and topology are never touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct UvTransferrer {
    /// Corners farther than this from the source keep their previous UV
    pub max_distance: Option<f32>,
}

impl UvTransferrer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_distance(max_distance: f32) -> Self {
        Self {
            max_distance: Some(max_distance),
        }
    }

    /// Transfer UVs from `source` into `target`.
    ///
    /// A source without a UV layer leaves the target unchanged.
    pub fn transfer(&self, target: &mut PolygonMesh, source: &PolygonMesh) -> UvTransferReport {
        match SurfaceIndex::build(source) {
            Some(index) => self.transfer_from_index(target, &index),
            None => {
                log::debug!("source has no UV layer, UV transfer skipped");
                UvTransferReport::default()
            }
        }
    }

    /// Transfer UVs using a prebuilt index of the source surface, so one
    /// index can serve every LOD of an asset.
    pub fn transfer_from_index(&self, target: &mut PolygonMesh, index: &SurfaceIndex) -> UvTransferReport {
        let mut report = UvTransferReport::default();
        if index.is_empty() || target.polygons.is_empty() {
            return report;
        }

        let samples: Vec<Vec<Option<UV>>> = target
            .polygons
            .par_iter()
            .enumerate()
            .map(|(pi, polygon)| {
                let normal = target.polygon_normal(pi);
                let centroid = polygon_centroid(target, polygon);
                polygon
                    .iter()
                    .map(|&v| {
                        let hit = index.nearest_for_corner(&target.vertices[v], normal.as_ref(), &centroid)?;
                        match self.max_distance {
                            Some(max) if hit.distance > max => None,
                            _ => Some(hit.uv),
                        }
                    })
                    .collect()
            })
            .collect();

        if target.uvs.is_none() {
            target.uvs = Some(target.polygons.iter().map(|p| vec![[0.0, 0.0]; p.len()]).collect());
            report.created_layer = true;
        }
        if let Some(uvs) = target.uvs.as_mut() {
            for (polygon_samples, corner_uvs) in samples.iter().zip(uvs.iter_mut()) {
                for (sample, uv) in polygon_samples.iter().zip(corner_uvs.iter_mut()) {
                    match *sample {
                        Some(sample) => {
                            *uv = sample;
                            report.transferred += 1;
                        }
                        None => report.out_of_range += 1,
                    }
                }
            }
        }
        log::debug!(
            "UV transfer: {} corners written, {} out of range",
            report.transferred,
            report.out_of_range
        );
        report
    }
}

fn polygon_centroid(mesh: &PolygonMesh, polygon: &[usize]) -> Point3f {
    let sum = polygon
        .iter()
        .fold(Point3f::origin().coords, |acc, &v| acc + mesh.vertices[v].coords);
    Point3f::from(sum / polygon.len().max(1) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Unit square subdivided into an n x n grid, UVs equal to XY.
    fn textured_grid(n: usize) -> PolygonMesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3f::new(i as f32 / n as f32, j as f32 / n as f32, 0.0));
            }
        }
        let mut polygons = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let v = j * (n + 1) + i;
                polygons.push(vec![v, v + 1, v + n + 2, v + n + 1]);
            }
        }
        let mut mesh = PolygonMesh::from_vertices_and_polygons(vertices, polygons);
        let uvs = mesh
            .polygons
            .iter()
            .map(|p| p.iter().map(|&v| [mesh.vertices[v].x, mesh.vertices[v].y]).collect())
            .collect();
        mesh.set_uvs(uvs);
        mesh
    }

    fn coarse_target() -> PolygonMesh {
        PolygonMesh::from_triangles(
            vec![
                Point3f::new(0.1, 0.2, 0.0),
                Point3f::new(0.9, 0.3, 0.0),
                Point3f::new(0.4, 0.8, 0.0),
            ],
            &[[0, 1, 2]],
        )
    }

    #[test]
    fn test_only_uvs_change() {
        let source = textured_grid(8);
        let mut target = coarse_target();
        target.set_uvs(vec![vec![[9.0, 9.0]; 3]]);
        let before = target.clone();

        let report = UvTransferrer::new().transfer(&mut target, &source);
        assert_eq!(report.transferred, 3);
        assert!(!report.created_layer);
        assert_eq!(target.vertices, before.vertices);
        assert_eq!(target.polygons, before.polygons);
        assert_ne!(target.uvs, before.uvs);
    }

    #[test]
    fn test_uvs_match_source_parameterization() {
        let source = textured_grid(4);
        let mut target = coarse_target();

        let report = UvTransferrer::new().transfer(&mut target, &source);
        assert!(report.created_layer);
        let uvs = target.uvs.as_ref().unwrap();
        for (k, &v) in target.polygons[0].iter().enumerate() {
            assert_relative_eq!(uvs[0][k][0], target.vertices[v].x, epsilon = 1e-5);
            assert_relative_eq!(uvs[0][k][1], target.vertices[v].y, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_offset_surface_projects_onto_source() {
        let source = textured_grid(4);
        let mut target = coarse_target();
        for p in &mut target.vertices {
            p.z = 0.05;
        }
        UvTransferrer::new().transfer(&mut target, &source);
        let uv = target.uvs.as_ref().unwrap()[0][1];
        assert_relative_eq!(uv[0], 0.9, epsilon = 1e-5);
        assert_relative_eq!(uv[1], 0.3, epsilon = 1e-5);
    }

    #[test]
    fn test_max_distance_keeps_previous_uvs() {
        let source = textured_grid(4);
        let mut target = coarse_target();
        target.vertices[2].z = 1.0;
        target.set_uvs(vec![vec![[7.0, 7.0]; 3]]);

        let report = UvTransferrer::with_max_distance(0.5).transfer(&mut target, &source);
        assert_eq!(report.transferred, 2);
        assert_eq!(report.out_of_range, 1);
        assert_eq!(target.uvs.as_ref().unwrap()[0][2], [7.0, 7.0]);
    }

    /// Unit cube of 8 welded vertices, every face mapped onto the whole [0,1] square.
    fn seamed_cube() -> PolygonMesh {
        let vertices = (0..8)
            .map(|i| Point3f::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
            .collect();
        let faces = vec![
            vec![0, 2, 3, 1],
            vec![4, 5, 7, 6],
            vec![0, 1, 5, 4],
            vec![2, 6, 7, 3],
            vec![0, 4, 6, 2],
            vec![1, 3, 7, 5],
        ];
        let mut mesh = PolygonMesh::from_vertices_and_polygons(vertices, faces);
        mesh.set_uvs(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]; 6]);
        mesh
    }

    fn uv_area(a: UV, b: UV, c: UV) -> f32 {
        ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() * 0.5
    }

    #[test]
    fn test_seams_keep_one_uv_per_corner() {
        let source = seamed_cube();
        let mut target = source.clone();
        target.uvs = None;

        let report = UvTransferrer::new().transfer(&mut target, &source);
        assert_eq!(report.transferred, 24);

        let expected = source.uvs.as_ref().unwrap();
        let uvs = target.uvs.as_ref().unwrap();
        for (face, corner_uvs) in uvs.iter().enumerate() {
            for (k, uv) in corner_uvs.iter().enumerate() {
                assert_relative_eq!(uv[0], expected[face][k][0], epsilon = 1e-5);
                assert_relative_eq!(uv[1], expected[face][k][1], epsilon = 1e-5);
            }
            assert!(uv_area(corner_uvs[0], corner_uvs[1], corner_uvs[2]) > 0.4);
            assert!(uv_area(corner_uvs[0], corner_uvs[2], corner_uvs[3]) > 0.4);
        }
    }

    #[test]
    fn test_source_without_uvs_is_noop() {
        let mut source = textured_grid(2);
        source.uvs = None;
        let mut target = coarse_target();
        let before = target.clone();

        let report = UvTransferrer::new().transfer(&mut target, &source);
        assert_eq!(report, UvTransferReport::default());
        assert_eq!(target, before);
    }
}
