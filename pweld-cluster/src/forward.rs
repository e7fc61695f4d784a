//! Synchronous forward variant of the parallel vertex clustering algorithm.
//!
//! Vertices coordinate through two flat atomic arrays and nothing else: a
//! parent array `cp` updated with a CAS-min, and a remaining-count array `r`
//! updated with fetch-and-add. The algorithm evolves in rounds; in each round
//! every vertex whose remaining count has reached zero acts as an *active
//! source*, publishes itself as candidate parent to its larger-id neighbours
//! (if it is still its own parent, i.e. a centroid), and retires. The round
//! loop stops once no thread has seen unfinished neighbours.
//!
//! The final parent of a vertex is the minimum id among all centroids that
//! reached it, independent of thread interleaving, so the converged `cp` is
//! deterministic for a given mesh and epsilon.

use crate::neighbours::{prepare_neighbours, NeighbourLists};
use crate::reduce::{carry_attributes, compress_clusters, remap_triangles};
use crate::{validate_weld_input, ThreadPoolConfig};
use log::debug;
use pweld_core::{Point3d, Result, TriangleMesh};
use pweld_spatial::KdTree;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Merge all vertices closer than `epsilon` using the synchronous parallel
/// algorithm, returning the reduced mesh.
///
/// The spatial index must have been built over `mesh.vertices`. The thread
/// count in `config` is fixed for the whole call.
pub fn merge_vertices_forward(
    mesh: &TriangleMesh,
    index: &KdTree,
    epsilon: f64,
    config: &ThreadPoolConfig,
) -> Result<TriangleMesh> {
    validate_weld_input(mesh, epsilon)?;
    let pool = crate::parallel::build_pool(config)?;
    Ok(forward_weld(mesh, index, epsilon, &pool))
}

/// Forward weld on an already-built pool; used directly by the epsilon finder
/// so repeated probes share one thread team.
pub(crate) fn forward_weld(
    mesh: &TriangleMesh,
    index: &KdTree,
    epsilon: f64,
    pool: &ThreadPool,
) -> TriangleMesh {
    let (cp, rounds) = converge(&mesh.vertices, index, epsilon, pool);
    debug!(
        "forward weld converged after {} rounds over {} vertices",
        rounds,
        mesh.vertex_count()
    );

    let cc = compress_clusters(&cp, &mesh.vertices);
    let triangles = remap_triangles(&mesh.triangles, &cc.pid2ccid, pool);
    let (normals, colors) = carry_attributes(mesh, &cp, &cc.pid2ccid, cc.vertices.len());

    TriangleMesh {
        vertices: cc.vertices,
        triangles,
        normals,
        colors,
    }
}

/// Run the wavefront convergence and return the parent array plus the number
/// of rounds taken.
pub(crate) fn converge(
    vertices: &[Point3d],
    index: &KdTree,
    epsilon: f64,
    pool: &ThreadPool,
) -> (Vec<u32>, usize) {
    let n = vertices.len();
    let lists = prepare_neighbours(vertices, index, epsilon, pool);

    let cp: Vec<AtomicU32> = (0..n).map(|i| AtomicU32::new(i as u32)).collect();
    let remaining: Vec<AtomicI32> = lists
        .smaller_counts
        .iter()
        .map(|&c| AtomicI32::new(c as i32 - 1))
        .collect();

    let mut rounds = 0;
    let mut should_continue = true;
    while should_continue {
        rounds += 1;
        // One round: every active source acts, with an OR-reduction over
        // "saw an unfinished neighbour". The end of the bulk operation and
        // the re-evaluation of the loop condition on this thread are the
        // two barriers separating rounds.
        should_continue = pool.install(|| {
            (0..n)
                .into_par_iter()
                .map(|i| process_vertex(i, &lists, &cp, &remaining).0)
                .reduce(|| false, |a, b| a | b)
        });
    }

    (cp.into_iter().map(AtomicU32::into_inner).collect(), rounds)
}

/// Per-vertex step of one round. Returns `(should_continue, acted_as_centroid)`.
///
/// A vertex acts only when its remaining count is exactly zero: all
/// smaller-id neighbours have been processed, so every parent candidate with
/// a smaller id has already been published and the `cp[i] == i` read below is
/// final. The Acquire load pairs with the AcqRel decrements of those
/// neighbours, making their `cp` writes visible here.
#[inline]
pub(crate) fn process_vertex(
    i: usize,
    lists: &NeighbourLists,
    cp: &[AtomicU32],
    remaining: &[AtomicI32],
) -> (bool, bool) {
    match remaining[i].load(Ordering::Acquire) {
        0 => {}
        _ => return (false, false), // negative: already retired; positive: not ready
    }
    // Remove i from the active source list before acting.
    remaining[i].fetch_sub(1, Ordering::AcqRel);
    let is_centroid = cp[i].load(Ordering::Acquire) == i as u32;

    let mut should_continue = false;
    for &j in &lists.bigger[i] {
        let j = j as usize;
        if is_centroid && remaining[j].load(Ordering::Acquire) > 0 {
            // CAS-min: cp[j] only ever decreases, so the smallest centroid
            // that reaches j wins regardless of interleaving.
            cp[j].fetch_min(i as u32, Ordering::AcqRel);
        }
        if remaining[j].load(Ordering::Acquire) >= 1 {
            should_continue = true;
        }
        remaining[j].fetch_sub(1, Ordering::AcqRel);
    }
    (should_continue, is_centroid)
}
