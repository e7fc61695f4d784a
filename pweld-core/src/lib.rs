//! Core data structures for pweld
//!
//! This crate provides the fundamental types shared by the pweld mesh
//! reduction pipeline: triangle meshes, point aliases, error handling,
//! and the nearest-neighbour search trait implemented by the spatial index.

pub mod error;
pub mod mesh;
pub mod point;
pub mod traits;

pub use error::*;
pub use mesh::*;
pub use point::*;
pub use traits::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

/// Common result type for pweld operations
pub type Result<T> = std::result::Result<T, Error>;
