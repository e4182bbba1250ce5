//! # lodcrate algorithms
//!
//! Geometry passes applied to every LOD tier:
//! scale normalization, topological cleanup (with face orientation
//! recomputation) and nearest-surface UV transfer.

pub mod normalize;
pub mod cleanup;
pub mod orientation;
pub mod nearest_surface;
pub mod uv_transfer;

// Re-export commonly used items
pub use normalize::*;
pub use cleanup::*;
pub use orientation::*;
pub use nearest_surface::*;
pub use uv_transfer::*;
