//! # pweld
//!
//! Lock-free parallel vertex clustering for triangle mesh reduction.
//!
//! This is the umbrella crate that provides convenient access to the whole
//! pipeline. Use it to get everything in one place, or depend on the
//! individual crates for more granular control over dependencies.
//!
//! ## Pipeline
//!
//! - **Core**: mesh and point types, errors ([`pweld_core`])
//! - **Spatial**: k-d tree with id-partitioned radius queries ([`pweld_spatial`])
//! - **I/O**: PLY reading and writing ([`pweld_io`])
//! - **Cluster**: the P-Weld merge algorithms and epsilon search
//!   ([`pweld_cluster`])
//!
//! ## Quick start
//!
//! ```
//! use pweld::prelude::*;
//! use pweld::{KdTree, Point3};
//!
//! let mesh = TriangleMesh::from_vertices_and_triangles(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(0.001, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//! let index = KdTree::from_mesh(&mesh);
//! let config = ThreadPoolConfig::new().with_threads(2);
//!
//! let reduced = merge_vertices_forward(&mesh, &index, 0.01, &config).unwrap();
//! assert_eq!(reduced.vertex_count(), 2);
//! ```

// Re-export core functionality
pub use pweld_core::*;

// Re-export sub-crates
pub use pweld_cluster as cluster;
pub use pweld_io as io;
pub use pweld_spatial as spatial;

pub use pweld_spatial::KdTree;

/// Convenient imports for common use cases
pub mod prelude {
    pub use pweld_cluster::{
        find_epsilon, merge_close_vertices, merge_vertices, merge_vertices_forward,
        merge_vertices_forward_async, ThreadPoolConfig, WeldVariant,
    };
    pub use pweld_core::{Error, Point3d, Result, TriangleMesh, Vector3d};
    pub use pweld_io::{read_mesh, write_mesh, MeshReader, MeshWriter};
    pub use pweld_spatial::KdTree;
}
