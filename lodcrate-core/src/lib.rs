//! Core data structures and traits for lodcrate
//!
//! This crate provides the fundamental types shared by the LOD pipeline:
//! points, the polygon mesh value type, transforms, and the asset records
//! that flow between import, processing and export.

pub mod point;
pub mod mesh;
pub mod traits;
pub mod transform;
pub mod asset;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use traits::*;
pub use transform::*;
pub use asset::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix4};
