//! Topological cleanup of imported meshes
//!
//! Removes geometry that carries no surface (isolated vertices, wire edges),
//! welds coincident vertices and recomputes face orientation. The passes run
//! in a fixed order; each one assumes the previous has already run.

use crate::orientation::recalculate_orientation;
use lodcrate_core::{PolygonMesh, UV};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::HashSet;

/// Default vertex merge tolerance in mesh units
pub const DEFAULT_MERGE_DISTANCE: f32 = 1e-5;

/// Counts of what a cleanup pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Vertices removed because no edge or polygon used them
    pub isolated_vertices: usize,
    /// Edges removed because no polygon used them
    pub loose_edges: usize,
    /// Vertices welded into a neighbour within the merge distance
    pub merged_vertices: usize,
    /// Polygons left with fewer than three distinct corners after welding
    pub degenerate_polygons: usize,
    pub flipped_polygons: usize,
}

impl CleanupReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Removes isolated vertices and loose edges, merges near-duplicate
/// vertices and recomputes consistent outward winding.
#[derive(Debug, Clone, Copy)]
pub struct MeshCleaner {
    /// Vertices closer than this are welded together
    pub merge_distance: f32,
}

impl Default for MeshCleaner {
    fn default() -> Self {
        Self {
            merge_distance: DEFAULT_MERGE_DISTANCE,
        }
    }
}

impl MeshCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_merge_distance(merge_distance: f32) -> Self {
        Self { merge_distance }
    }

    /// Clean `mesh` in place. A clean mesh comes back unchanged with an empty report.
    pub fn clean(&self, mesh: &mut PolygonMesh) -> CleanupReport {
        let mut report = CleanupReport {
            isolated_vertices: remove_isolated_vertices(mesh),
            ..Default::default()
        };

        report.loose_edges = remove_loose_edges(mesh);
        // Vertices that only carried the removed edges go with them
        report.isolated_vertices += remove_isolated_vertices(mesh);

        let (merged, degenerate) = merge_by_distance(mesh, self.merge_distance);
        report.merged_vertices = merged;
        report.degenerate_polygons = degenerate;

        report.flipped_polygons = recalculate_orientation(mesh);

        log::debug!(
            "cleanup: {} isolated verts, {} loose edges, {} merged verts, {} degenerate polys, {} flipped",
            report.isolated_vertices,
            report.loose_edges,
            report.merged_vertices,
            report.degenerate_polygons,
            report.flipped_polygons
        );
        report
    }
}

/// Drop vertices not referenced by any polygon or loose edge.
pub fn remove_isolated_vertices(mesh: &mut PolygonMesh) -> usize {
    let mut used = vec![false; mesh.vertices.len()];
    for &v in mesh.polygons.iter().flatten() {
        used[v] = true;
    }
    for edge in &mesh.loose_edges {
        used[edge[0]] = true;
        used[edge[1]] = true;
    }
    compact_vertices(mesh, &used)
}

/// Drop every edge that bounds no polygon. Returns how many were truly loose;
/// entries duplicating a polygon side are discarded without being counted.
pub fn remove_loose_edges(mesh: &mut PolygonMesh) -> usize {
    if mesh.loose_edges.is_empty() {
        return 0;
    }
    let mut polygon_edges = HashSet::new();
    for polygon in &mesh.polygons {
        for (k, &a) in polygon.iter().enumerate() {
            let b = polygon[(k + 1) % polygon.len()];
            polygon_edges.insert((a.min(b), a.max(b)));
        }
    }
    let loose = mesh
        .loose_edges
        .iter()
        .filter(|e| !polygon_edges.contains(&(e[0].min(e[1]), e[0].max(e[1]))))
        .count();
    mesh.loose_edges.clear();
    loose
}

/// Weld vertices within `distance` of an earlier kept vertex.
///
/// Vertices are visited in index order; each kept vertex absorbs every
/// not-yet-merged vertex inside its radius and keeps its own position.
/// Polygon corners that collapse onto their neighbour are removed, and
/// polygons left with fewer than three corners are deleted.
/// Returns `(merged vertices, deleted polygons)`.
pub fn merge_by_distance(mesh: &mut PolygonMesh, distance: f32) -> (usize, usize) {
    let n = mesh.vertices.len();
    if n == 0 {
        return (0, 0);
    }

    let tree = RTree::bulk_load(
        mesh.vertices
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.x, p.y, p.z], i))
            .collect(),
    );
    let radius_2 = distance * distance;
    let mut target: Vec<usize> = (0..n).collect();
    let mut merged = 0;
    for i in 0..n {
        if target[i] != i {
            continue;
        }
        let p = mesh.vertices[i];
        for hit in tree.locate_within_distance([p.x, p.y, p.z], radius_2) {
            let j = hit.data;
            if j != i && target[j] == j {
                target[j] = i;
                merged += 1;
            }
        }
    }
    if merged == 0 {
        return (0, 0);
    }

    let mut polygons = Vec::with_capacity(mesh.polygons.len());
    let mut uvs = mesh.uvs.as_ref().map(|_| Vec::with_capacity(mesh.polygons.len()));
    let mut degenerate = 0;
    for (pi, polygon) in mesh.polygons.iter().enumerate() {
        let corner_uvs = mesh.uvs.as_ref().map(|layer| layer[pi].as_slice());
        let (corners, corner_uvs) = weld_corners(polygon, corner_uvs, &target);
        if corners.len() < 3 {
            degenerate += 1;
            continue;
        }
        polygons.push(corners);
        if let (Some(out), Some(welded)) = (uvs.as_mut(), corner_uvs) {
            out.push(welded);
        }
    }
    mesh.polygons = polygons;
    mesh.uvs = uvs;
    mesh.loose_edges = mesh
        .loose_edges
        .iter()
        .map(|e| [target[e[0]], target[e[1]]])
        .filter(|e| e[0] != e[1])
        .collect();

    remove_isolated_vertices(mesh);
    (merged, degenerate)
}

fn weld_corners(
    polygon: &[usize],
    uvs: Option<&[UV]>,
    target: &[usize],
) -> (Vec<usize>, Option<Vec<UV>>) {
    let mut corners: Vec<usize> = Vec::with_capacity(polygon.len());
    let mut welded_uvs: Option<Vec<UV>> = uvs.map(|_| Vec::with_capacity(polygon.len()));
    for (k, &v) in polygon.iter().enumerate() {
        let v = target[v];
        if corners.last() == Some(&v) {
            continue;
        }
        corners.push(v);
        if let (Some(out), Some(src)) = (welded_uvs.as_mut(), uvs) {
            out.push(src[k]);
        }
    }
    while corners.len() > 1 && corners.first() == corners.last() {
        corners.pop();
        if let Some(out) = welded_uvs.as_mut() {
            out.pop();
        }
    }
    (corners, welded_uvs)
}

/// Keep vertices flagged in `keep`, remapping polygons and loose edges.
/// Every referenced vertex must be kept. Returns how many were removed.
fn compact_vertices(mesh: &mut PolygonMesh, keep: &[bool]) -> usize {
    let removed = keep.iter().filter(|&&k| !k).count();
    if removed == 0 {
        return 0;
    }
    let mut remap = vec![usize::MAX; keep.len()];
    let mut vertices = Vec::with_capacity(keep.len() - removed);
    for (i, &k) in keep.iter().enumerate() {
        if k {
            remap[i] = vertices.len();
            vertices.push(mesh.vertices[i]);
        }
    }
    for v in mesh.polygons.iter_mut().flatten() {
        *v = remap[*v];
    }
    for edge in &mut mesh.loose_edges {
        *edge = [remap[edge[0]], remap[edge[1]]];
    }
    mesh.vertices = vertices;
    removed
}
