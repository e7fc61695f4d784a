//! Per-vertex neighbour preparation.
//!
//! For every vertex `i` this computes the list of ε-neighbours with a larger
//! id and the count of ε-neighbours with a smaller-or-equal id (the vertex
//! itself included). The write sets are disjoint, so the loop parallelises
//! without coordination; each list is written once and read-only afterwards.

use pweld_core::Point3d;
use pweld_spatial::KdTree;
use rayon::prelude::*;
use rayon::ThreadPool;

pub(crate) struct NeighbourLists {
    /// For each vertex, the ids of ε-neighbours with a larger id.
    pub bigger: Vec<Vec<u32>>,
    /// For each vertex, `|N⁻(i)|`: ε-neighbours with id ≤ i, including i.
    pub smaller_counts: Vec<u32>,
}

pub(crate) fn prepare_neighbours(
    vertices: &[Point3d],
    index: &KdTree,
    epsilon: f64,
    pool: &ThreadPool,
) -> NeighbourLists {
    let results: Vec<(Vec<u32>, u32)> = pool.install(|| {
        (0..vertices.len())
            .into_par_iter()
            .map(|i| index.radius_smaller_and_bigger(&vertices[i], epsilon, i))
            .collect()
    });

    let mut bigger = Vec::with_capacity(results.len());
    let mut smaller_counts = Vec::with_capacity(results.len());
    for (b, s) in results {
        bigger.push(b);
        smaller_counts.push(s);
    }
    NeighbourLists {
        bigger,
        smaller_counts,
    }
}
