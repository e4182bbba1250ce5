//! Core traits for lodcrate

use crate::{mesh::*, point::*, transform::Transform3D};

/// Trait for objects with a spatial extent
pub trait Bounded {
    /// Get the axis-aligned bounding box of the object
    fn bounding_box(&self) -> (Point3f, Point3f);

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        Point3f::from((min.coords + max.coords) * 0.5)
    }

    /// Extents of the bounding box along x, y and z
    fn dimensions(&self) -> Vector3f {
        let (min, max) = self.bounding_box();
        max - min
    }
}

/// Trait for objects that can be transformed
pub trait Transformable {
    /// Apply a transformation to the object
    fn transform(&mut self, transform: &Transform3D);
}

impl Bounded for PolygonMesh {
    fn bounding_box(&self) -> (Point3f, Point3f) {
        if self.vertices.is_empty() {
            return (Point3f::origin(), Point3f::origin());
        }

        let mut min = self.vertices[0];
        let mut max = self.vertices[0];

        for vertex in &self.vertices {
            min.x = min.x.min(vertex.x);
            min.y = min.y.min(vertex.y);
            min.z = min.z.min(vertex.z);

            max.x = max.x.max(vertex.x);
            max.y = max.y.max(vertex.y);
            max.z = max.z.max(vertex.z);
        }

        (min, max)
    }
}

impl Transformable for PolygonMesh {
    /// Bake the transform into vertex positions. Mirroring transforms
    /// reverse polygon winding so faces keep pointing outward.
    fn transform(&mut self, transform: &Transform3D) {
        for vertex in &mut self.vertices {
            *vertex = transform.transform_point(vertex);
        }
        if transform.is_mirroring() {
            for index in 0..self.polygons.len() {
                self.flip_polygon(index);
            }
        }
    }
}
