//! Lock-free parallel vertex clustering for triangle mesh reduction
//!
//! This crate implements the P-Weld family of mesh reduction algorithms:
//! vertices closer than a radius epsilon are merged into cluster centroids
//! and triangles are remapped onto the reduced vertex set. Worker threads
//! coordinate exclusively through a CAS-min parent array and fetch-add
//! remaining counters over an id-partitioned spatial dependency graph; there
//! are no locks anywhere in the hot path.
//!
//! Three variants are provided:
//! - [`merge_close_vertices`]: the sequential greedy baseline,
//! - [`merge_vertices_forward`]: the synchronous parallel algorithm,
//! - [`merge_vertices_forward_async`]: the asynchronous parallel algorithm,
//!   which overlaps centroid discovery with the reduction phase.
//!
//! [`find_epsilon`] inverts the clustering, searching for the epsilon that
//! hits a target reduction rate.

pub mod epsilon;
pub mod forward;
pub mod forward_async;
mod neighbours;
pub mod parallel;
mod reduce;
pub mod sequential;

pub use epsilon::find_epsilon;
pub use forward::merge_vertices_forward;
pub use forward_async::merge_vertices_forward_async;
pub use parallel::ThreadPoolConfig;
pub use sequential::merge_close_vertices;

use pweld_core::{Error, Result, TriangleMesh};
use pweld_spatial::KdTree;

/// Which merge algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeldVariant {
    /// Sequential greedy baseline.
    Baseline,
    /// Synchronous parallel algorithm.
    Forward,
    /// Asynchronous parallel algorithm with overlapped reduction.
    ForwardAsync,
}

impl WeldVariant {
    /// Numeric mapping used by the command line: 0 baseline, 1 sync, 2 async.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Baseline),
            1 => Some(Self::Forward),
            2 => Some(Self::ForwardAsync),
            _ => None,
        }
    }
}

/// Run the selected merge variant on a mesh.
pub fn merge_vertices(
    mesh: &TriangleMesh,
    index: &KdTree,
    epsilon: f64,
    variant: WeldVariant,
    config: &ThreadPoolConfig,
) -> Result<TriangleMesh> {
    match variant {
        WeldVariant::Baseline => merge_close_vertices(mesh, index, epsilon, config),
        WeldVariant::Forward => merge_vertices_forward(mesh, index, epsilon, config),
        WeldVariant::ForwardAsync => merge_vertices_forward_async(mesh, index, epsilon, config),
    }
}

/// Shared input validation for the merge entry points. The clustering core
/// itself is total for any input that passes here.
pub(crate) fn validate_weld_input(mesh: &TriangleMesh, epsilon: f64) -> Result<()> {
    if !(epsilon >= 0.0) {
        return Err(Error::OutOfRange(format!(
            "epsilon {} must be non-negative",
            epsilon
        )));
    }
    if mesh.vertex_count() > u32::MAX as usize {
        return Err(Error::OutOfRange(format!(
            "mesh has {} vertices; vertex ids must fit in 32 bits",
            mesh.vertex_count()
        )));
    }
    mesh.validate_indices()
}
