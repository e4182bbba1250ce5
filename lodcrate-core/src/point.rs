//! Point and attribute types

use nalgebra::{Point3, Vector3};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// Texture coordinates of one polygon corner
pub type UV = [f32; 2];

/// Linear blend of three UVs with barycentric weights `[u, v, w]`.
pub fn interpolate_uv(a: UV, b: UV, c: UV, weights: [f32; 3]) -> UV {
    [
        a[0] * weights[0] + b[0] * weights[1] + c[0] * weights[2],
        a[1] * weights[0] + b[1] * weights[1] + c[1] * weights[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate_uv_corners_and_centroid() {
        let (a, b, c) = ([0.0, 0.0], [1.0, 0.0], [0.0, 1.0]);
        assert_eq!(interpolate_uv(a, b, c, [0.0, 1.0, 0.0]), b);

        let centroid = interpolate_uv(a, b, c, [1.0 / 3.0; 3]);
        assert_relative_eq!(centroid[0], 1.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(centroid[1], 1.0 / 3.0, epsilon = 1e-6);
    }
}
