//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// A polygon mesh with per-corner (loop) texture coordinates.
///
/// Polygons are ordered vertex-index lists of arity >= 3. When present, the
/// UV layer has exactly the same shape as `polygons`: `uvs[p][k]` belongs to
/// the corner `polygons[p][k]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonMesh {
    pub vertices: Vec<Point3f>,
    pub polygons: Vec<Vec<usize>>,
    /// Edges that bound no polygon (wire geometry)
    pub loose_edges: Vec<[usize; 2]>,
    pub uvs: Option<Vec<Vec<UV>>>,
}

/// Vertex and triangle-equivalent counts, used for progress logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshStats {
    pub vertices: usize,
    pub triangles: usize,
}

impl std::fmt::Display for MeshStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V:{:>6} | T:{:>6}", self.vertices, self.triangles)
    }
}

impl PolygonMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh from vertices and polygons
    pub fn from_vertices_and_polygons(vertices: Vec<Point3f>, polygons: Vec<Vec<usize>>) -> Self {
        Self {
            vertices,
            polygons,
            loose_edges: Vec::new(),
            uvs: None,
        }
    }

    /// Create a mesh from vertices and triangles
    pub fn from_triangles(vertices: Vec<Point3f>, triangles: &[[usize; 3]]) -> Self {
        let polygons = triangles.iter().map(|t| t.to_vec()).collect();
        Self::from_vertices_and_polygons(vertices, polygons)
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of polygons
    pub fn polygon_count(&self) -> usize {
        self.polygons.len()
    }

    /// Get the number of polygon corners
    pub fn loop_count(&self) -> usize {
        self.polygons.iter().map(Vec::len).sum()
    }

    /// Sum over polygons of `arity - 2`; the triangle count without triangulating.
    pub fn triangle_equivalent_count(&self) -> usize {
        self.polygons
            .iter()
            .map(|p| p.len().saturating_sub(2))
            .sum()
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            vertices: self.vertex_count(),
            triangles: self.triangle_equivalent_count(),
        }
    }

    /// Check if the mesh has no surface
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.polygons.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        self.uvs.is_some()
    }

    /// Attach a per-loop UV layer. Ignored when its shape does not match the polygons.
    pub fn set_uvs(&mut self, uvs: Vec<Vec<UV>>) {
        let matches = uvs.len() == self.polygons.len()
            && uvs.iter().zip(&self.polygons).all(|(u, p)| u.len() == p.len());
        if matches {
            self.uvs = Some(uvs);
        }
    }

    /// Add a vertex to the mesh
    pub fn add_vertex(&mut self, vertex: Point3f) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Reverse the winding of one polygon, keeping each UV on its corner.
    pub fn flip_polygon(&mut self, index: usize) {
        self.polygons[index].reverse();
        if let Some(uvs) = self.uvs.as_mut() {
            uvs[index].reverse();
        }
    }

    /// Unit normal of a polygon (Newell's method), `None` for degenerate polygons.
    pub fn polygon_normal(&self, index: usize) -> Option<Vector3f> {
        let polygon = &self.polygons[index];
        let mut normal = Vector3f::zeros();
        for (i, &a) in polygon.iter().enumerate() {
            let b = polygon[(i + 1) % polygon.len()];
            let (pa, pb) = (self.vertices[a], self.vertices[b]);
            normal.x += (pa.y - pb.y) * (pa.z + pb.z);
            normal.y += (pa.z - pb.z) * (pa.x + pb.x);
            normal.z += (pa.x - pb.x) * (pa.y + pb.y);
        }
        normal.try_normalize(f32::EPSILON)
    }

    /// Iterate polygons as fan triangles: `(polygon, [corner0, cornerK, cornerK+1])`.
    pub fn fan_triangles(&self) -> impl Iterator<Item = (usize, [usize; 3])> + '_ {
        self.polygons.iter().enumerate().flat_map(|(pi, polygon)| {
            (1..polygon.len().saturating_sub(1)).map(move |k| (pi, [0, k, k + 1]))
        })
    }

    /// Fan-triangulate every polygon. Triangle-equivalent count is unchanged.
    pub fn triangulate(&mut self) {
        if self.polygons.iter().all(|p| p.len() == 3) {
            return;
        }
        let capacity = self.triangle_equivalent_count();
        let mut polygons: Vec<Vec<usize>> = Vec::with_capacity(capacity);
        let mut uvs: Option<Vec<Vec<UV>>> = self.uvs.as_ref().map(|_| Vec::with_capacity(capacity));
        for (pi, corners) in self.fan_triangles() {
            let polygon = &self.polygons[pi];
            polygons.push(corners.iter().map(|&c| polygon[c]).collect());
            if let (Some(out), Some(src)) = (uvs.as_mut(), self.uvs.as_ref()) {
                out.push(corners.iter().map(|&c| src[pi][c]).collect());
            }
        }
        self.polygons = polygons;
        self.uvs = uvs;
    }

    /// Check index bounds, polygon arity and UV layer shape.
    pub fn validate(&self) -> Result<()> {
        let nv = self.vertices.len();
        for (pi, polygon) in self.polygons.iter().enumerate() {
            if polygon.len() < 3 {
                return Err(Error::InvalidData(format!(
                    "polygon {} has {} vertices, expected at least 3",
                    pi,
                    polygon.len()
                )));
            }
            if let Some(&bad) = polygon.iter().find(|&&v| v >= nv) {
                return Err(Error::InvalidData(format!(
                    "polygon {} references vertex {} of {}",
                    pi, bad, nv
                )));
            }
        }
        if let Some(edge) = self.loose_edges.iter().find(|e| e[0] >= nv || e[1] >= nv) {
            return Err(Error::InvalidData(format!(
                "loose edge {:?} references a missing vertex",
                edge
            )));
        }
        if let Some(uvs) = &self.uvs {
            let matches = uvs.len() == self.polygons.len()
                && uvs.iter().zip(&self.polygons).all(|(u, p)| u.len() == p.len());
            if !matches {
                return Err(Error::InvalidData(
                    "UV layer does not match polygon corners".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.polygons.clear();
        self.loose_edges.clear();
        self.uvs = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad_and_triangle() -> PolygonMesh {
        let mut mesh = PolygonMesh::from_vertices_and_polygons(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(2.0, 0.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3], vec![1, 4, 2]],
        );
        mesh.set_uvs(vec![
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            vec![[0.5, 0.5], [0.6, 0.5], [0.5, 0.6]],
        ]);
        mesh
    }

    #[test]
    fn test_triangle_equivalent_count() {
        let mesh = quad_and_triangle();
        assert_eq!(mesh.triangle_equivalent_count(), 3);
        assert_eq!(mesh.loop_count(), 7);
        assert_eq!(PolygonMesh::new().triangle_equivalent_count(), 0);
    }

    #[test]
    fn test_set_uvs_rejects_wrong_shape() {
        let mut mesh = PolygonMesh::from_triangles(
            vec![Point3f::origin(), Point3f::new(1.0, 0.0, 0.0), Point3f::new(0.0, 1.0, 0.0)],
            &[[0, 1, 2]],
        );
        mesh.set_uvs(vec![vec![[0.0, 0.0]; 2]]);
        assert!(!mesh.has_uvs());
    }

    #[test]
    fn test_triangulate_keeps_corner_uvs() {
        let mut mesh = quad_and_triangle();
        mesh.triangulate();

        assert_eq!(mesh.polygon_count(), 3);
        assert_eq!(mesh.triangle_equivalent_count(), 3);
        assert_eq!(mesh.polygons[0], vec![0, 1, 2]);
        assert_eq!(mesh.polygons[1], vec![0, 2, 3]);
        let uvs = mesh.uvs.as_ref().unwrap();
        assert_eq!(uvs[1], vec![[0.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_flip_polygon_moves_uvs_with_corners() {
        let mut mesh = quad_and_triangle();
        mesh.flip_polygon(1);
        assert_eq!(mesh.polygons[1], vec![2, 4, 1]);
        assert_eq!(mesh.uvs.as_ref().unwrap()[1], vec![[0.5, 0.6], [0.6, 0.5], [0.5, 0.5]]);
    }

    #[test]
    fn test_polygon_normal() {
        let mesh = quad_and_triangle();
        let n = mesh.polygon_normal(0).unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-6);

        let degenerate = PolygonMesh::from_triangles(vec![Point3f::origin(); 3], &[[0, 1, 2]]);
        assert!(degenerate.polygon_normal(0).is_none());
    }

    #[test]
    fn test_validate_rejects_bad_index() {
        let mesh = PolygonMesh::from_vertices_and_polygons(
            vec![Point3f::origin(); 3],
            vec![vec![0, 1, 5]],
        );
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_stats_display() {
        let stats = quad_and_triangle().stats();
        assert_eq!(stats.to_string(), "V:     5 | T:     3");
    }
}
