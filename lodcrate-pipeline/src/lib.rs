//! Batch LOD generation
//!
//! Ties the geometry passes together: every source asset is normalized once,
//! then each triangle tier gets its own cleaned, decimated and UV-resampled
//! copy which is handed to the exporter under a deduplicated name.

pub mod error;
pub mod naming;
pub mod config;
pub mod report;
pub mod lod;
pub mod batch;

pub use error::*;
pub use naming::*;
pub use config::*;
pub use report::*;
pub use lod::*;
pub use batch::*;
