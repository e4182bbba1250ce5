//! Edge collapse simplification
//!
//! Implements iterative edge collapse mesh simplification using a half-edge
//! data structure for efficient topology operations and quadric error metrics
//! (QEM) for error-driven edge prioritization. Per-corner UVs are stored on
//! half-edges, so they stay attached to the faces that survive a collapse.

use crate::MeshSimplifier;
use lodcrate_core::{Error, Point3f, PolygonMesh, Result, UV};
use nalgebra::{Matrix4, Vector4};
use priority_queue::PriorityQueue;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

const INVALID: usize = usize::MAX;

// ============================================================
// Half-Edge Data Structure
// ============================================================

#[derive(Debug, Clone)]
struct HalfEdge {
    target: usize,
    twin: usize,
    next: usize,
    prev: usize,
    face: usize,
}

/// Half-edge mesh for topology-aware edge collapse operations.
struct HalfEdgeMesh {
    half_edges: Vec<HalfEdge>,
    /// One outgoing half-edge per vertex (INVALID if removed)
    vertex_edge: Vec<usize>,
    /// One half-edge per face (INVALID if removed)
    face_edge: Vec<usize>,
    active_face_count: usize,
    positions: Vec<Point3f>,
    /// UV of the corner at each half-edge's source vertex
    corner_uvs: Option<Vec<UV>>,
    quadrics: Vec<Matrix4<f64>>,
    vertex_removed: Vec<bool>,
}

impl HalfEdgeMesh {
    /// Build from the triangles of `mesh`; other polygons and triangles
    /// repeating a vertex are left out.
    fn from_polygon_mesh(mesh: &PolygonMesh) -> Self {
        let nv = mesh.vertices.len();
        let triangles: Vec<usize> = mesh
            .polygons
            .iter()
            .enumerate()
            .filter(|(_, p)| p.len() == 3 && p[0] != p[1] && p[1] != p[2] && p[2] != p[0])
            .map(|(pi, _)| pi)
            .collect();
        let nf = triangles.len();

        let mut half_edges = Vec::with_capacity(nf * 3);
        let mut vertex_edge = vec![INVALID; nv];
        let mut face_edge = Vec::with_capacity(nf);
        let mut corner_uvs: Option<Vec<UV>> = mesh.uvs.as_ref().map(|_| Vec::with_capacity(nf * 3));

        for (fi, &pi) in triangles.iter().enumerate() {
            let face = &mesh.polygons[pi];
            let base = fi * 3;
            for j in 0..3usize {
                half_edges.push(HalfEdge {
                    target: face[(j + 1) % 3],
                    twin: INVALID,
                    next: base + (j + 1) % 3,
                    prev: base + (j + 2) % 3,
                    face: fi,
                });
                if vertex_edge[face[j]] == INVALID {
                    vertex_edge[face[j]] = base + j;
                }
            }
            if let (Some(out), Some(uvs)) = (corner_uvs.as_mut(), mesh.uvs.as_ref()) {
                out.extend_from_slice(&uvs[pi]);
            }
            face_edge.push(base);
        }

        // Build twin pointers
        let mut edge_map: HashMap<(usize, usize), usize> = HashMap::with_capacity(nf * 3);
        for (he_idx, he) in half_edges.iter().enumerate() {
            let src = half_edges[he.prev].target;
            edge_map.insert((src, he.target), he_idx);
        }
        for he_idx in 0..half_edges.len() {
            if half_edges[he_idx].twin != INVALID {
                continue;
            }
            let src = half_edges[half_edges[he_idx].prev].target;
            let tgt = half_edges[he_idx].target;
            if let Some(&twin_idx) = edge_map.get(&(tgt, src)) {
                // Non-manifold edges pair up at most once
                if twin_idx != he_idx && half_edges[twin_idx].twin == INVALID {
                    half_edges[he_idx].twin = twin_idx;
                    half_edges[twin_idx].twin = he_idx;
                }
            }
        }

        let mut hem = HalfEdgeMesh {
            half_edges,
            vertex_edge,
            face_edge,
            active_face_count: nf,
            positions: mesh.vertices.clone(),
            corner_uvs,
            quadrics: vec![Matrix4::zeros(); nv],
            vertex_removed: vec![false; nv],
        };
        hem.initialize_quadrics();
        hem
    }

    #[inline]
    fn source(&self, he: usize) -> usize {
        self.half_edges[self.half_edges[he].prev].target
    }

    #[inline]
    fn is_alive(&self, v: usize) -> bool {
        !self.vertex_removed[v] && self.vertex_edge[v] != INVALID
    }

    fn compute_plane(v0: &Point3f, v1: &Point3f, v2: &Point3f) -> Vector4<f64> {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let n = e1.cross(&e2).normalize();
        if !n.iter().all(|x| x.is_finite()) {
            return Vector4::new(0.0, 0.0, 1.0, 0.0);
        }
        let d = -n.dot(&v0.coords);
        Vector4::new(n.x as f64, n.y as f64, n.z as f64, d as f64)
    }

    fn plane_to_quadric(p: &Vector4<f64>) -> Matrix4<f64> {
        let (a, b, c, d) = (p[0], p[1], p[2], p[3]);
        Matrix4::new(
            a * a, a * b, a * c, a * d,
            a * b, b * b, b * c, b * d,
            a * c, b * c, c * c, c * d,
            a * d, b * d, c * d, d * d,
        )
    }

    fn initialize_quadrics(&mut self) {
        for fi in 0..self.face_edge.len() {
            let he0 = self.face_edge[fi];
            if he0 == INVALID {
                continue;
            }
            let he1 = self.half_edges[he0].next;
            let v0 = self.source(he0);
            let v1 = self.half_edges[he0].target;
            let v2 = self.half_edges[he1].target;
            let plane =
                Self::compute_plane(&self.positions[v0], &self.positions[v1], &self.positions[v2]);
            let q = Self::plane_to_quadric(&plane);
            self.quadrics[v0] += q;
            self.quadrics[v1] += q;
            self.quadrics[v2] += q;
        }
    }

    /// Get all outgoing half-edges from a vertex (handles boundary vertices).
    fn outgoing_half_edges(&self, v: usize) -> Vec<usize> {
        let start = self.vertex_edge[v];
        if start == INVALID {
            return vec![];
        }

        // Bound on the walk in case a non-manifold fan never returns to `start`
        let limit = self.half_edges.len();
        let mut result = Vec::new();
        let mut current = start;

        // Rotate counterclockwise: current.prev.twin
        loop {
            result.push(current);
            let prev = self.half_edges[current].prev;
            let twin = self.half_edges[prev].twin;
            if twin == INVALID {
                break;
            }
            current = twin;
            if current == start || result.len() > limit {
                return result;
            }
        }

        // Boundary: also rotate clockwise from start via twin.next
        let twin_of_start = self.half_edges[start].twin;
        if twin_of_start != INVALID {
            let mut current = self.half_edges[twin_of_start].next;
            while current != start && result.len() <= limit {
                result.push(current);
                let twin = self.half_edges[current].twin;
                if twin == INVALID {
                    break;
                }
                current = self.half_edges[twin].next;
            }
        }

        result
    }

    /// One-ring of a vertex, including the far end of an incoming boundary edge.
    fn neighbors(&self, v: usize) -> HashSet<usize> {
        let mut ring = HashSet::new();
        for he in self.outgoing_half_edges(v) {
            ring.insert(self.half_edges[he].target);
            let prev = self.half_edges[he].prev;
            if self.half_edges[prev].twin == INVALID {
                ring.insert(self.source(prev));
            }
        }
        ring
    }

    fn is_boundary_vertex(&self, v: usize) -> bool {
        self.outgoing_half_edges(v).iter().any(|&he| {
            self.half_edges[he].twin == INVALID
                || self.half_edges[self.half_edges[he].prev].twin == INVALID
        })
    }

    /// Check the link condition: common neighbors must equal exactly the
    /// face apices opposite the edge (2 for interior, 1 for boundary).
    fn check_link_condition(&self, v1: usize, v2: usize) -> bool {
        let n1 = self.neighbors(v1);
        let n2 = self.neighbors(v2);
        let common_count = n1.intersection(&n2).count();

        let h = match self.find_half_edge(v1, v2) {
            Some(h) => h,
            None => return false,
        };
        let is_boundary = self.half_edges[h].twin == INVALID;
        let expected = if is_boundary { 1 } else { 2 };
        common_count == expected
    }

    fn find_half_edge(&self, from: usize, to: usize) -> Option<usize> {
        self.outgoing_half_edges(from)
            .into_iter()
            .find(|&he| self.half_edges[he].target == to)
    }

    fn quadric_error(q: &Matrix4<f64>, p: &Point3f) -> f64 {
        let vh = Vector4::new(p.x as f64, p.y as f64, p.z as f64, 1.0);
        (vh.transpose() * q * vh)[0].max(0.0)
    }

    /// Positions `v1` and `v2` could merge to, cheapest first.
    ///
    /// The QEM optimum leads when the quadric is invertible; the endpoints and
    /// midpoint follow so a collapse rejected at one position can try another.
    fn collapse_candidates(&self, v1: usize, v2: usize) -> Vec<(Point3f, f64)> {
        let q = self.quadrics[v1] + self.quadrics[v2];
        let (p1, p2) = (self.positions[v1], self.positions[v2]);
        let mut positions = Vec::with_capacity(4);

        let q3 = q.fixed_view::<3, 3>(0, 0).clone_owned();
        if q3.determinant().abs() > 1e-12 {
            if let Some(inv) = q3.try_inverse() {
                let p = -inv * q.fixed_view::<3, 1>(0, 3);
                let optimal = Point3f::new(p[0] as f32, p[1] as f32, p[2] as f32);
                if optimal.coords.iter().all(|x| x.is_finite()) {
                    positions.push(optimal);
                }
            }
        }
        positions.push(p1);
        positions.push(p2);
        positions.push(nalgebra::center(&p1, &p2));

        let mut scored: Vec<(Point3f, f64)> = positions
            .into_iter()
            .map(|p| (p, Self::quadric_error(&q, &p)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored
    }

    fn compute_collapse_cost(&self, v1: usize, v2: usize) -> f64 {
        self.collapse_candidates(v1, v2)
            .first()
            .map_or(f64::INFINITY, |&(_, cost)| cost)
    }

    /// Whether moving `v1` and `v2` to `new_pos` would fold or flatten any
    /// face that survives the collapse.
    fn collapse_flips_faces(&self, v1: usize, v2: usize, new_pos: &Point3f) -> bool {
        for v in [v1, v2] {
            let p = self.positions[v];
            for he in self.outgoing_half_edges(v) {
                if self.half_edges[he].face == INVALID {
                    continue;
                }
                let a = self.half_edges[he].target;
                let b = self.half_edges[self.half_edges[he].next].target;
                // Faces on the collapsed edge disappear
                if a == v1 || a == v2 || b == v1 || b == v2 {
                    continue;
                }
                let (pa, pb) = (self.positions[a], self.positions[b]);
                let before = (pa - p).cross(&(pb - p));
                let after = (pa - new_pos).cross(&(pb - new_pos));
                if before.dot(&after) <= 0.0 {
                    return true;
                }
            }
        }
        false
    }

    /// Find any valid outgoing half-edge from a vertex (linear scan fallback).
    fn find_valid_outgoing(&self, v: usize) -> usize {
        for (i, he) in self.half_edges.iter().enumerate() {
            if he.face != INVALID && self.source(i) == v {
                return i;
            }
        }
        INVALID
    }

    /// Collapse edge (v1, v2), merging v2 into v1 at new_pos.
    /// Returns true on success.
    fn collapse_edge(&mut self, v1: usize, v2: usize, new_pos: Point3f) -> bool {
        let h = match self.find_half_edge(v1, v2) {
            Some(h) => h,
            None => return false,
        };

        let h_twin = self.half_edges[h].twin;
        let h_next = self.half_edges[h].next;
        let h_prev = self.half_edges[h].prev;
        let face_a = self.half_edges[h].face;
        let h_next_twin = self.half_edges[h_next].twin;
        let h_prev_twin = self.half_edges[h_prev].twin;
        let c = self.half_edges[h_next].target;

        let (face_b, ht_next, ht_prev, ht_next_twin, ht_prev_twin, d) = if h_twin != INVALID {
            let hn = self.half_edges[h_twin].next;
            let hp = self.half_edges[h_twin].prev;
            (
                self.half_edges[h_twin].face,
                hn,
                hp,
                self.half_edges[hn].twin,
                self.half_edges[hp].twin,
                self.half_edges[hn].target,
            )
        } else {
            (INVALID, INVALID, INVALID, INVALID, INVALID, INVALID)
        };

        // Collect v2 outgoing edges BEFORE any modifications
        let v2_outgoing = self.outgoing_half_edges(v2);

        // Re-pair twins for face A border edges
        if h_next_twin != INVALID {
            self.half_edges[h_next_twin].twin = h_prev_twin;
        }
        if h_prev_twin != INVALID {
            self.half_edges[h_prev_twin].twin = h_next_twin;
        }

        // Mark face A as removed
        self.half_edges[h].face = INVALID;
        self.half_edges[h_next].face = INVALID;
        self.half_edges[h_prev].face = INVALID;
        self.face_edge[face_a] = INVALID;
        self.active_face_count -= 1;

        // Handle face B
        if face_b != INVALID {
            if ht_next_twin != INVALID {
                self.half_edges[ht_next_twin].twin = ht_prev_twin;
            }
            if ht_prev_twin != INVALID {
                self.half_edges[ht_prev_twin].twin = ht_next_twin;
            }
            self.half_edges[h_twin].face = INVALID;
            self.half_edges[ht_next].face = INVALID;
            self.half_edges[ht_prev].face = INVALID;
            self.face_edge[face_b] = INVALID;
            self.active_face_count -= 1;
        }

        // Redirect all v2 references to v1
        for &he in &v2_outgoing {
            let prev = self.half_edges[he].prev;
            self.half_edges[prev].target = v1;

            let twin = self.half_edges[he].twin;
            if twin != INVALID && self.half_edges[twin].face != INVALID {
                self.half_edges[twin].target = v1;
            }
        }

        // Fix vertex_edge pointers for v1
        if self.half_edges[self.vertex_edge[v1]].face == INVALID {
            if h_prev_twin != INVALID && self.half_edges[h_prev_twin].face != INVALID {
                self.vertex_edge[v1] = h_prev_twin;
            } else {
                self.vertex_edge[v1] = self.find_valid_outgoing(v1);
            }
        }

        // Fix vertex_edge for c
        if c != INVALID
            && self.vertex_edge[c] != INVALID
            && self.half_edges[self.vertex_edge[c]].face == INVALID
        {
            if h_next_twin != INVALID && self.half_edges[h_next_twin].face != INVALID {
                self.vertex_edge[c] = h_next_twin;
            } else {
                self.vertex_edge[c] = self.find_valid_outgoing(c);
            }
        }

        // Fix vertex_edge for d
        if d != INVALID
            && d != c
            && self.vertex_edge[d] != INVALID
            && self.half_edges[self.vertex_edge[d]].face == INVALID
        {
            if ht_next_twin != INVALID && self.half_edges[ht_next_twin].face != INVALID {
                self.vertex_edge[d] = ht_next_twin;
            } else {
                self.vertex_edge[d] = self.find_valid_outgoing(d);
            }
        }

        // Mark v2 as removed
        self.vertex_edge[v2] = INVALID;
        self.vertex_removed[v2] = true;

        // Update position and quadric for v1
        let v2_quadric = self.quadrics[v2];
        self.positions[v1] = new_pos;
        self.quadrics[v1] += v2_quadric;

        true
    }

    fn to_polygon_mesh(&self) -> PolygonMesh {
        let mut old_to_new = vec![INVALID; self.positions.len()];
        let mut vertices = Vec::new();
        for (i, &removed) in self.vertex_removed.iter().enumerate() {
            if !removed && self.vertex_edge[i] != INVALID {
                old_to_new[i] = vertices.len();
                vertices.push(self.positions[i]);
            }
        }

        let mut polygons = Vec::with_capacity(self.active_face_count);
        let mut uvs: Option<Vec<Vec<UV>>> = self
            .corner_uvs
            .as_ref()
            .map(|_| Vec::with_capacity(self.active_face_count));
        for &he0 in &self.face_edge {
            if he0 == INVALID {
                continue;
            }
            let he1 = self.half_edges[he0].next;
            let he2 = self.half_edges[he1].next;
            let corners = [he0, he1, he2];
            let face = corners.map(|he| old_to_new[self.source(he)]);

            if face.contains(&INVALID) || face[0] == face[1] || face[1] == face[2] || face[2] == face[0] {
                continue;
            }
            polygons.push(face.to_vec());
            if let (Some(out), Some(src)) = (uvs.as_mut(), self.corner_uvs.as_ref()) {
                out.push(corners.iter().map(|&he| src[he]).collect());
            }
        }

        PolygonMesh {
            vertices,
            polygons,
            loose_edges: Vec::new(),
            uvs,
        }
    }
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone)]
struct EdgeCost {
    v1: usize,
    v2: usize,
    cost: f64,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smallest cost first
        other.cost.total_cmp(&self.cost)
    }
}

type EdgeQueue = PriorityQueue<(usize, usize), EdgeCost>;

// ============================================================
// Edge Collapse Simplifier
// ============================================================

/// Edge collapse mesh simplifier using half-edge data structure and QEM.
///
/// This simplifier builds a half-edge mesh for efficient local topology
/// queries (neighbor iteration, boundary detection, link condition checks)
/// and uses quadric error metrics to prioritize edge collapses. Polygons
/// are fan-triangulated first; the output is always a triangle mesh.
pub struct EdgeCollapseSimplifier {
    /// Stop when the minimum collapse cost exceeds this threshold
    pub error_threshold: Option<f64>,
    /// Never collapse edges touching the mesh boundary
    pub preserve_boundary: bool,
    /// Extra penalty weight applied to boundary edge costs
    pub boundary_weight: f64,
}

impl Default for EdgeCollapseSimplifier {
    fn default() -> Self {
        Self {
            error_threshold: None,
            preserve_boundary: false,
            boundary_weight: 100.0,
        }
    }
}

impl EdgeCollapseSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(
        error_threshold: Option<f64>,
        preserve_boundary: bool,
        boundary_weight: f64,
    ) -> Self {
        Self {
            error_threshold,
            preserve_boundary,
            boundary_weight,
        }
    }

    fn edge_cost(&self, hem: &HalfEdgeMesh, v1: usize, v2: usize) -> Option<EdgeCost> {
        let on_boundary = hem.is_boundary_vertex(v1) || hem.is_boundary_vertex(v2);
        if self.preserve_boundary && on_boundary {
            return None;
        }
        let mut cost = hem.compute_collapse_cost(v1, v2);
        if on_boundary {
            cost += self.boundary_weight;
        }
        Some(EdgeCost { v1, v2, cost })
    }

    /// Build the priority queue of edge collapse candidates from the live faces.
    fn build_queue(&self, hem: &HalfEdgeMesh) -> EdgeQueue {
        let mut queue = PriorityQueue::new();
        let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();

        for (he, half_edge) in hem.half_edges.iter().enumerate() {
            if half_edge.face == INVALID {
                continue;
            }
            let (v1, v2) = (hem.source(he), half_edge.target);
            let key = (v1.min(v2), v1.max(v2));
            if !seen_edges.insert(key) {
                continue;
            }
            if let Some(cost) = self.edge_cost(hem, v1, v2) {
                queue.push(key, cost);
            }
        }

        queue
    }

    /// Refresh the costs of every edge around `v` after its quadric changed.
    fn requeue_around(&self, hem: &HalfEdgeMesh, queue: &mut EdgeQueue, v: usize) {
        for n in hem.neighbors(v) {
            if !hem.is_alive(n) {
                continue;
            }
            if let Some(cost) = self.edge_cost(hem, v, n) {
                queue.push((v.min(n), v.max(n)), cost);
            }
        }
    }
}

impl MeshSimplifier for EdgeCollapseSimplifier {
    fn simplify(&self, mesh: &PolygonMesh, keep_ratio: f32) -> Result<PolygonMesh> {
        if mesh.is_empty() {
            return Err(Error::InvalidData("Mesh is empty".to_string()));
        }
        if !(keep_ratio > 0.0 && keep_ratio <= 1.0) {
            return Err(Error::InvalidData(
                "Keep ratio must be in (0.0, 1.0]".to_string(),
            ));
        }

        let mut triangles = mesh.clone();
        triangles.triangulate();
        triangles.loose_edges.clear();
        if keep_ratio == 1.0 {
            return Ok(triangles);
        }

        let face_count = triangles.polygon_count();
        let target_faces = ((keep_ratio * face_count as f32).round() as usize).max(1);
        let mut hem = HalfEdgeMesh::from_polygon_mesh(&triangles);
        let mut queue = self.build_queue(&hem);
        let mut collapse_count = 0usize;
        let mut collapses_at_build = 0usize;

        while hem.active_face_count > target_faces {
            let Some((_, edge_cost)) = queue.pop() else {
                // Every queued edge was rejected; retry once more with fresh costs
                if collapse_count == collapses_at_build {
                    break;
                }
                queue = self.build_queue(&hem);
                collapses_at_build = collapse_count;
                continue;
            };

            // Check error threshold
            if let Some(threshold) = self.error_threshold {
                if edge_cost.cost > threshold {
                    break;
                }
            }

            let (mut v1, mut v2) = (edge_cost.v1, edge_cost.v2);

            // Validate: both vertices still alive and still neighbors
            if !hem.is_alive(v1) || !hem.is_alive(v2) {
                continue;
            }
            let h = match hem.find_half_edge(v1, v2) {
                Some(h) => h,
                None => match hem.find_half_edge(v2, v1) {
                    // Boundary edges exist in one direction only
                    Some(h) => {
                        std::mem::swap(&mut v1, &mut v2);
                        h
                    }
                    None => continue,
                },
            };

            // Never collapse the last remaining faces
            let removed = if hem.half_edges[h].twin == INVALID { 1 } else { 2 };
            if hem.active_face_count <= removed {
                continue;
            }

            // Check link condition to avoid non-manifold topology
            if !hem.check_link_condition(v1, v2) {
                continue;
            }

            let position = hem
                .collapse_candidates(v1, v2)
                .into_iter()
                .map(|(p, _)| p)
                .find(|p| !hem.collapse_flips_faces(v1, v2, p));
            let Some(position) = position else {
                continue;
            };

            if hem.collapse_edge(v1, v2, position) {
                collapse_count += 1;
                self.requeue_around(&hem, &mut queue, v1);
            }
        }

        log::debug!(
            "edge collapse: {} collapses, {} -> {} faces (target {})",
            collapse_count,
            face_count,
            hem.active_face_count,
            target_faces
        );
        Ok(hem.to_polygon_mesh())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn make_single_triangle() -> PolygonMesh {
        PolygonMesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        )
    }

    fn make_tetrahedron() -> PolygonMesh {
        // Consistently wound: each shared edge appears in opposite directions
        PolygonMesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            &[[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
        )
    }

    fn make_plane_grid(size: usize) -> PolygonMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3::new(x as f32, y as f32, 0.0));
            }
        }
        let mut faces = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let tl = y * size + x;
                let tr = tl + 1;
                let bl = (y + 1) * size + x;
                let br = bl + 1;
                faces.push([tl, bl, tr]);
                faces.push([tr, bl, br]);
            }
        }
        PolygonMesh::from_triangles(vertices, &faces)
    }

    fn make_curved_surface(size: usize) -> PolygonMesh {
        let mut mesh = make_plane_grid(size);
        for p in &mut mesh.vertices {
            let fx = p.x / (size - 1) as f32 * std::f32::consts::PI;
            let fy = p.y / (size - 1) as f32 * std::f32::consts::PI;
            p.z = (fx.sin() * fy.sin()) * 2.0;
        }
        mesh
    }

    fn make_quad_grid_with_uvs(size: usize) -> PolygonMesh {
        let mut vertices = Vec::new();
        for y in 0..size {
            for x in 0..size {
                vertices.push(Point3::new(x as f32, y as f32, 0.0));
            }
        }
        let mut polygons = Vec::new();
        for y in 0..(size - 1) {
            for x in 0..(size - 1) {
                let v = y * size + x;
                polygons.push(vec![v, v + size, v + size + 1, v + 1]);
            }
        }
        let mut mesh = PolygonMesh::from_vertices_and_polygons(vertices, polygons);
        let scale = (size - 1) as f32;
        let uvs: Vec<Vec<UV>> = mesh
            .polygons
            .iter()
            .map(|p| {
                p.iter()
                    .map(|&v| [mesh.vertices[v].x / scale, mesh.vertices[v].y / scale])
                    .collect()
            })
            .collect();
        mesh.set_uvs(uvs);
        mesh
    }

    // ---- Construction tests ----

    #[test]
    fn test_creation() {
        let s = EdgeCollapseSimplifier::new();
        assert!(!s.preserve_boundary);
        assert!(s.boundary_weight > 0.0);
        assert!(s.error_threshold.is_none());
    }

    #[test]
    fn test_with_params() {
        let s = EdgeCollapseSimplifier::with_params(Some(0.01), true, 50.0);
        assert_eq!(s.error_threshold, Some(0.01));
        assert!(s.preserve_boundary);
        assert_eq!(s.boundary_weight, 50.0);
    }

    // ---- Half-edge structure tests ----

    #[test]
    fn test_halfedge_construction() {
        let mesh = make_tetrahedron();
        let hem = HalfEdgeMesh::from_polygon_mesh(&mesh);
        assert_eq!(hem.half_edges.len(), 12); // 4 faces * 3
        assert_eq!(hem.active_face_count, 4);
        assert_eq!(hem.positions.len(), 4);

        // Every interior half-edge should have a twin
        for he in &hem.half_edges {
            assert_ne!(he.twin, INVALID, "interior half-edge should have twin");
        }
    }

    #[test]
    fn test_halfedge_boundary() {
        let mesh = make_single_triangle();
        let hem = HalfEdgeMesh::from_polygon_mesh(&mesh);
        // Single triangle: all 3 edges are boundary
        for he in &hem.half_edges {
            assert_eq!(he.twin, INVALID);
        }
        assert!(hem.is_boundary_vertex(0));
        assert!(hem.is_boundary_vertex(1));
        assert!(hem.is_boundary_vertex(2));
        // Both triangle neighbors are found despite the open fan
        assert_eq!(hem.neighbors(0).len(), 2);
    }

    #[test]
    fn test_halfedge_neighbors() {
        let mesh = make_tetrahedron();
        let hem = HalfEdgeMesh::from_polygon_mesh(&mesh);
        // Each vertex in a tetrahedron has 3 neighbors
        for v in 0..4 {
            let nbrs = hem.neighbors(v);
            assert_eq!(nbrs.len(), 3, "tetrahedron vertex should have 3 neighbors");
        }
    }

    #[test]
    fn test_degenerate_triangles_are_skipped() {
        let mut mesh = make_single_triangle();
        mesh.polygons.push(vec![0, 1, 1]);
        let hem = HalfEdgeMesh::from_polygon_mesh(&mesh);
        assert_eq!(hem.active_face_count, 1);
    }

    #[test]
    fn test_link_condition_tetrahedron() {
        let mesh = make_tetrahedron();
        let hem = HalfEdgeMesh::from_polygon_mesh(&mesh);
        // In a tetrahedron every pair of vertices shares the other two as
        // common neighbors, matching the two opposite apices
        assert!(hem.check_link_condition(0, 1));
        assert!(hem.check_link_condition(1, 2));
    }

    // ---- Simplification tests ----

    #[test]
    fn test_empty_mesh() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = PolygonMesh::new();
        assert!(s.simplify(&mesh, 0.5).is_err());
    }

    #[test]
    fn test_invalid_keep_ratio() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_single_triangle();
        assert!(s.simplify(&mesh, 0.0).is_err());
        assert!(s.simplify(&mesh, -0.1).is_err());
        assert!(s.simplify(&mesh, 1.1).is_err());
        assert!(s.simplify(&mesh, f32::NAN).is_err());
    }

    #[test]
    fn test_full_keep_ratio_only_triangulates() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_quad_grid_with_uvs(3);
        let result = s.simplify(&mesh, 1.0).unwrap();
        assert_eq!(result.vertex_count(), 9);
        assert_eq!(result.polygon_count(), 8);
        assert_eq!(result.triangle_equivalent_count(), mesh.triangle_equivalent_count());
    }

    #[test]
    fn test_tetrahedron_simplification() {
        let s = EdgeCollapseSimplifier::with_params(None, false, 0.0);
        let mesh = make_tetrahedron();
        let result = s.simplify(&mesh, 0.5).unwrap();
        assert!(result.polygon_count() <= mesh.polygon_count());
        assert!(result.polygon_count() > 0);
        assert!(result.vertex_count() <= mesh.vertex_count());
    }

    #[test]
    fn test_planar_grid_simplification() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_plane_grid(6);
        let original_faces = mesh.polygon_count();
        assert_eq!(original_faces, 50); // 5*5*2

        let result = s.simplify(&mesh, 0.5).unwrap();
        assert!(result.polygon_count() < original_faces);
        assert!(result.polygon_count() > 0);
        assert!(result.validate().is_ok());
    }

    #[test]
    fn test_planar_grid_does_not_fold() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_plane_grid(11);
        let result = s.simplify(&mesh, 0.2).unwrap();
        for p in 0..result.polygon_count() {
            let normal = result.polygon_normal(p).expect("degenerate face after collapse");
            assert!(normal.z < 0.0, "face {} folded over", p);
        }
    }

    #[test]
    fn test_curved_surface_simplification() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_curved_surface(8);
        let original_faces = mesh.polygon_count();

        let result = s.simplify(&mesh, 0.5).unwrap();
        assert!(result.polygon_count() < original_faces);
        assert!(result.polygon_count() > 0);
    }

    #[test]
    fn test_boundary_preservation() {
        let s = EdgeCollapseSimplifier::with_params(None, true, 0.0);
        let mesh = make_plane_grid(6);

        // Collect original boundary vertex positions
        let original_boundary: HashSet<(i32, i32, i32)> = {
            let size = 6;
            let mut set = HashSet::new();
            for i in 0..size {
                for j in 0..size {
                    if i == 0 || i == size - 1 || j == 0 || j == size - 1 {
                        let idx = i * size + j;
                        let p = mesh.vertices[idx];
                        set.insert(((p.x * 100.0) as i32, (p.y * 100.0) as i32, (p.z * 100.0) as i32));
                    }
                }
            }
            set
        };

        let result = s.simplify(&mesh, 0.5).unwrap();
        let result_positions: HashSet<(i32, i32, i32)> = result
            .vertices
            .iter()
            .map(|p| ((p.x * 100.0) as i32, (p.y * 100.0) as i32, (p.z * 100.0) as i32))
            .collect();

        let preserved = original_boundary.intersection(&result_positions).count();
        let ratio = preserved as f32 / original_boundary.len() as f32;
        assert!(
            ratio > 0.9,
            "Expected >90% boundary preservation, got {:.1}%",
            ratio * 100.0
        );
    }

    #[test]
    fn test_error_threshold() {
        let s = EdgeCollapseSimplifier::with_params(Some(0.0001), false, 0.0);
        let mesh = make_curved_surface(6);
        let result = s.simplify(&mesh, 0.01).unwrap();
        // Curved regions cost more than the threshold, so the budget is not reached
        assert!(result.polygon_count() > 0);
    }

    #[test]
    fn test_corner_uvs_survive_collapse() {
        let s = EdgeCollapseSimplifier::new();
        let mesh = make_quad_grid_with_uvs(6);
        let result = s.simplify(&mesh, 0.4).unwrap();

        assert!(result.validate().is_ok());
        let uvs = result.uvs.as_ref().expect("UV layer should be kept");
        assert_eq!(uvs.len(), result.polygon_count());
        for uv in uvs.iter().flatten() {
            assert!((0.0..=1.0).contains(&uv[0]) && (0.0..=1.0).contains(&uv[1]));
        }
    }

    #[test]
    fn test_never_collapses_to_empty() {
        let s = EdgeCollapseSimplifier::with_params(None, false, 0.0);
        let result = s.simplify(&make_plane_grid(3), 0.01).unwrap();
        assert!(result.polygon_count() >= 1);
    }
}
