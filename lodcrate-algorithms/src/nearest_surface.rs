//! Closest-point queries against a textured triangle surface

use lodcrate_core::{interpolate_uv, Point3f, PolygonMesh, Vector3f, UV};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Surface distances closer than this compete as ties
const TIE_DISTANCE: f32 = 1e-4;
/// Normal alignments closer than this count as equal
const ALIGNMENT_SLACK: f32 = 1e-3;
/// Fraction of the way from a corner to its polygon centroid used to split ties
const CENTROID_NUDGE: f32 = 1e-2;

/// One fan triangle of a source polygon, with its corner UVs.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceTriangle {
    pub corners: [[f32; 3]; 3],
    pub uvs: [UV; 3],
    /// Polygon of the source mesh this triangle was cut from
    pub polygon: usize,
}

impl SurfaceTriangle {
    fn points(&self) -> [Point3f; 3] {
        self.corners.map(Point3f::from)
    }

    /// Closest point on this triangle to `p` and its barycentric weights.
    pub fn closest_point(&self, p: &Point3f) -> (Point3f, [f32; 3]) {
        let [a, b, c] = self.points();
        closest_point_on_triangle(p, &a, &b, &c)
    }

    /// Unit normal, `None` when the triangle has no area.
    pub fn normal(&self) -> Option<Vector3f> {
        let [a, b, c] = self.points();
        (b - a).cross(&(c - a)).try_normalize(f32::EPSILON)
    }

    /// `|cos|` of the angle to `normal`, ignoring winding.
    fn alignment(&self, normal: Option<&Vector3f>) -> f32 {
        match (self.normal(), normal) {
            (Some(own), Some(other)) => own.dot(other).abs(),
            _ => 0.0,
        }
    }

    fn hit(&self, p: &Point3f) -> SurfaceHit {
        let (point, weights) = self.closest_point(p);
        let [a, b, c] = self.uvs;
        SurfaceHit {
            point,
            distance: (point - p).norm(),
            weights,
            polygon: self.polygon,
            uv: interpolate_uv(a, b, c, weights),
        }
    }
}

impl RTreeObject for SurfaceTriangle {
    type Envelope = AABB<[f32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_points(self.corners.iter())
    }
}

impl PointDistance for SurfaceTriangle {
    fn distance_2(&self, point: &[f32; 3]) -> f32 {
        let p = Point3f::from(*point);
        let (closest, _) = self.closest_point(&p);
        (closest - p).norm_squared()
    }
}

/// Result of a nearest-surface query
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    pub point: Point3f,
    pub distance: f32,
    pub weights: [f32; 3],
    pub polygon: usize,
    /// UV interpolated at `point`
    pub uv: UV,
}

/// R*-tree over the fan triangles of a UV-mapped mesh.
pub struct SurfaceIndex {
    tree: RTree<SurfaceTriangle>,
}

impl SurfaceIndex {
    /// Index the surface of `mesh`. Returns `None` when it has no UV layer.
    pub fn build(mesh: &PolygonMesh) -> Option<Self> {
        let uvs = mesh.uvs.as_ref()?;
        let triangles: Vec<SurfaceTriangle> = mesh
            .fan_triangles()
            .map(|(pi, corners)| {
                let polygon = &mesh.polygons[pi];
                SurfaceTriangle {
                    corners: corners.map(|c| {
                        let p = mesh.vertices[polygon[c]];
                        [p.x, p.y, p.z]
                    }),
                    uvs: corners.map(|c| uvs[pi][c]),
                    polygon: pi,
                }
            })
            .collect();
        Some(Self {
            tree: RTree::bulk_load(triangles),
        })
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest point of the indexed surface to `p`, with the UV found there.
    pub fn nearest(&self, p: &Point3f) -> Option<SurfaceHit> {
        self.tree.nearest_neighbor(&[p.x, p.y, p.z]).map(|t| t.hit(p))
    }

    /// Closest surface point to the corner `p` of a target polygon.
    ///
    /// Several source triangles can touch `p` at once, e.g. on both sides of
    /// a UV seam. Among those within [`TIE_DISTANCE`] of the nearest, the one
    /// most parallel to the polygon `normal` wins, then the one closest to `p`
    /// nudged toward the polygon `centroid`. The hit itself is always taken
    /// at `p`.
    pub fn nearest_for_corner(
        &self,
        p: &Point3f,
        normal: Option<&Vector3f>,
        centroid: &Point3f,
    ) -> Option<SurfaceHit> {
        let query = [p.x, p.y, p.z];
        let nearest = self.tree.nearest_neighbor(&query)?;
        let reach = nearest.distance_2(&query).sqrt() + TIE_DISTANCE;

        let nudged = p + (centroid - p) * CENTROID_NUDGE;
        let nudged = [nudged.x, nudged.y, nudged.z];
        let score = |t: &SurfaceTriangle| (t.alignment(normal), t.distance_2(&nudged));

        let mut best = nearest;
        let mut best_score = score(best);
        for triangle in self.tree.locate_within_distance(query, reach * reach) {
            let (alignment, distance) = score(triangle);
            let better_aligned = alignment > best_score.0 + ALIGNMENT_SLACK;
            let as_aligned = alignment >= best_score.0 - ALIGNMENT_SLACK;
            if better_aligned || (as_aligned && distance < best_score.1) {
                best = triangle;
                best_score = (alignment, distance);
            }
        }
        Some(best.hit(p))
    }
}

/// Closest point to `p` on triangle `abc` by Voronoi-region classification.
///
/// Returns the point and its barycentric weights `[u, v, w]` with respect to
/// `a`, `b` and `c`. Zero-area triangles resolve to one of their corners or edges.
pub fn closest_point_on_triangle(
    p: &Point3f,
    a: &Point3f,
    b: &Point3f,
    c: &Point3f,
) -> (Point3f, [f32; 3]) {
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return (*a, [1.0, 0.0, 0.0]);
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return (*b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v, [1.0 - v, v, 0.0]);
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return (*c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w, [0.0, 1.0 - w, w]);
    }

    let sum = va + vb + vc;
    if sum <= f32::EPSILON * f32::EPSILON {
        return (*a, [1.0, 0.0, 0.0]);
    }
    let v = vb / sum;
    let w = vc / sum;
    (a + ab * v + ac * w, [1.0 - v - w, v, w])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> (Point3f, Point3f, Point3f) {
        (
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_closest_point_interior() {
        let (a, b, c) = unit_triangle();
        let (q, w) = closest_point_on_triangle(&Point3f::new(0.25, 0.25, 2.0), &a, &b, &c);
        assert_relative_eq!(q, Point3f::new(0.25, 0.25, 0.0), epsilon = 1e-6);
        assert_relative_eq!(w[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.25, epsilon = 1e-6);
        assert_relative_eq!(w[2], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_closest_point_regions() {
        let (a, b, c) = unit_triangle();
        let (q, w) = closest_point_on_triangle(&Point3f::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert_eq!(q, a);
        assert_eq!(w, [1.0, 0.0, 0.0]);

        let (q, w) = closest_point_on_triangle(&Point3f::new(0.5, -3.0, 1.0), &a, &b, &c);
        assert_relative_eq!(q, Point3f::new(0.5, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(w[1], 0.5, epsilon = 1e-6);

        let (q, w) = closest_point_on_triangle(&Point3f::new(1.0, 1.0, 0.0), &a, &b, &c);
        assert_relative_eq!(q, Point3f::new(0.5, 0.5, 0.0), epsilon = 1e-6);
        assert_relative_eq!(w[0], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_index_returns_nearest_uv() {
        let mut mesh = PolygonMesh::from_vertices_and_polygons(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2, 3]],
        );
        assert!(SurfaceIndex::build(&mesh).is_none());

        mesh.set_uvs(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]);
        let index = SurfaceIndex::build(&mesh).unwrap();
        assert_eq!(index.len(), 2);

        let hit = index.nearest(&Point3f::new(0.75, 0.25, 0.5)).unwrap();
        assert_relative_eq!(hit.distance, 0.5, epsilon = 1e-6);
        assert_relative_eq!(hit.uv[0], 0.75, epsilon = 1e-6);
        assert_relative_eq!(hit.uv[1], 0.25, epsilon = 1e-6);
        assert_eq!(hit.polygon, 0);
    }

    /// Two quads folded along x = 0 with their own UV islands.
    fn folded_pair() -> PolygonMesh {
        let mut mesh = PolygonMesh::from_vertices_and_polygons(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(1.0, 1.0, 0.0),
                Point3f::new(0.0, 0.0, 1.0),
                Point3f::new(0.0, 1.0, 1.0),
            ],
            vec![vec![0, 2, 3, 1], vec![0, 1, 5, 4]],
        );
        mesh.set_uvs(vec![
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            vec![[0.5, 0.5], [0.5, 0.75], [0.75, 0.75], [0.75, 0.5]],
        ]);
        mesh
    }

    #[test]
    fn test_corner_query_follows_its_own_face() {
        let mesh = folded_pair();
        let index = SurfaceIndex::build(&mesh).unwrap();
        let crease = Point3f::new(0.0, 1.0, 0.0);

        let floor = index
            .nearest_for_corner(&crease, Some(&Vector3f::z()), &Point3f::new(0.5, 0.5, 0.0))
            .unwrap();
        assert_eq!(floor.polygon, 0);
        assert_relative_eq!(floor.uv[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(floor.uv[1], 1.0, epsilon = 1e-6);

        let wall = index
            .nearest_for_corner(&crease, Some(&Vector3f::x()), &Point3f::new(0.0, 0.5, 0.5))
            .unwrap();
        assert_eq!(wall.polygon, 1);
        assert_relative_eq!(wall.uv[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(wall.uv[1], 0.75, epsilon = 1e-6);
        assert_relative_eq!(wall.distance, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_corner_query_without_normal_uses_centroid() {
        let index = SurfaceIndex::build(&folded_pair()).unwrap();
        let crease = Point3f::new(0.0, 0.0, 0.0);

        let hit = index
            .nearest_for_corner(&crease, None, &Point3f::new(0.0, 0.5, 0.5))
            .unwrap();
        assert_eq!(hit.polygon, 1);
        assert_relative_eq!(hit.uv[0], 0.5, epsilon = 1e-6);
        assert_relative_eq!(hit.uv[1], 0.5, epsilon = 1e-6);
    }
}
