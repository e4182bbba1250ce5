//! Consistent outward face orientation

use itertools::Itertools;
use lodcrate_core::{Point3f, PolygonMesh};
use nalgebra::Vector3;
use std::collections::{HashMap, VecDeque};

/// Undirected edge key with the traversal direction of one polygon side.
type EdgeUses = HashMap<(usize, usize), Vec<(usize, bool)>>;

fn edge_uses(mesh: &PolygonMesh) -> EdgeUses {
    let mut uses: EdgeUses = HashMap::with_capacity(mesh.loop_count());
    for (pi, polygon) in mesh.polygons.iter().enumerate() {
        for (a, b) in polygon.iter().copied().circular_tuple_windows::<(usize, usize)>() {
            if a == b {
                continue;
            }
            uses.entry((a.min(b), a.max(b))).or_default().push((pi, a < b));
        }
    }
    uses
}

/// Orient every polygon consistently with its neighbours and outward.
///
/// Each connected component (polygons joined by manifold edges) is walked
/// breadth-first from its lowest-index polygon so that every shared edge is
/// traversed in opposite directions by its two polygons. The component is
/// then flipped as a whole when its signed volume, measured from the
/// component centroid, is significantly negative. Returns the number of
/// polygons whose winding was reversed.
pub fn recalculate_orientation(mesh: &mut PolygonMesh) -> usize {
    let uses = edge_uses(mesh);
    let mut flip: Vec<Option<bool>> = vec![None; mesh.polygons.len()];
    let mut queue = VecDeque::new();

    for seed in 0..mesh.polygons.len() {
        if flip[seed].is_some() {
            continue;
        }
        flip[seed] = Some(false);
        queue.push_back(seed);
        let mut component = Vec::new();

        while let Some(p) = queue.pop_front() {
            component.push(p);
            let flip_p = flip[p].unwrap_or(false);
            for (a, b) in mesh.polygons[p].iter().copied().circular_tuple_windows::<(usize, usize)>() {
                if a == b {
                    continue;
                }
                let Some(sides) = uses.get(&(a.min(b), a.max(b))) else {
                    continue;
                };
                // Only manifold edges carry orientation
                if sides.len() != 2 {
                    continue;
                }
                let forward_p = (a < b) ^ flip_p;
                for &(q, raw_q) in sides {
                    if q == p || flip[q].is_some() {
                        continue;
                    }
                    flip[q] = Some(raw_q ^ !forward_p);
                    queue.push_back(q);
                }
            }
        }

        if is_inside_out(mesh, &component, &flip) {
            for &p in &component {
                flip[p] = flip[p].map(|f| !f);
            }
        }
    }

    let mut flipped = 0;
    for (p, f) in flip.into_iter().enumerate() {
        if f == Some(true) {
            mesh.flip_polygon(p);
            flipped += 1;
        }
    }
    flipped
}

fn is_inside_out(mesh: &PolygonMesh, component: &[usize], flip: &[Option<bool>]) -> bool {
    let mut centroid = Vector3::<f64>::zeros();
    let mut count = 0usize;
    for &p in component {
        for &v in &mesh.polygons[p] {
            centroid += to_f64(&mesh.vertices[v]);
            count += 1;
        }
    }
    if count == 0 {
        return false;
    }
    centroid /= count as f64;

    let mut volume = 0.0f64;
    let mut magnitude = 0.0f64;
    for &p in component {
        let polygon = &mesh.polygons[p];
        let corner = |k: usize| to_f64(&mesh.vertices[polygon[k]]) - centroid;
        for k in 1..polygon.len().saturating_sub(1) {
            let (a, b, c) = (corner(0), corner(k), corner(k + 1));
            let mut term = a.dot(&b.cross(&c));
            if flip[p] == Some(true) {
                term = -term;
            }
            volume += term;
            magnitude += term.abs();
        }
    }
    volume < -1e-6 * magnitude
}

fn to_f64(p: &Point3f) -> Vector3<f64> {
    Vector3::new(p.x as f64, p.y as f64, p.z as f64)
}
