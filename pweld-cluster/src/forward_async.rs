//! Asynchronous forward variant of the parallel vertex clustering algorithm.
//!
//! Runs the same atomic protocol as the synchronous variant but counts the
//! centroids each worker slot discovers while the rounds are still running,
//! in cache-line-separated counters. An exclusive prefix sum over those
//! counters then gives every slot its output offset without a sequential
//! centroid-counting pass, centroids are emitted in parallel into disjoint
//! output windows, and the remaining non-centroid folding overlaps with the
//! triangle remap.
//!
//! The vertex range `[0, n)` is statically partitioned into one contiguous
//! range per slot so that a slot's counter matches exactly the centroids of
//! its range.

use crate::neighbours::prepare_neighbours;
use crate::reduce::carry_attributes;
use crate::{validate_weld_input, ThreadPoolConfig};
use log::debug;
use pweld_core::{Point3d, Result, TriangleMesh};
use pweld_spatial::KdTree;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::ops::Range;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Per-slot centroid counter, padded to a full cache line so neighbouring
/// slots never share one.
#[repr(align(64))]
struct PaddedCounter(AtomicU32);

/// Merge all vertices closer than `epsilon` using the asynchronous parallel
/// algorithm, returning the reduced mesh.
pub fn merge_vertices_forward_async(
    mesh: &TriangleMesh,
    index: &KdTree,
    epsilon: f64,
    config: &ThreadPoolConfig,
) -> Result<TriangleMesh> {
    validate_weld_input(mesh, epsilon)?;
    let pool = crate::parallel::build_pool(config)?;
    Ok(forward_async_weld(mesh, index, epsilon, &pool))
}

pub(crate) fn forward_async_weld(
    mesh: &TriangleMesh,
    index: &KdTree,
    epsilon: f64,
    pool: &ThreadPool,
) -> TriangleMesh {
    let n = mesh.vertex_count();
    let lists = prepare_neighbours(&mesh.vertices, index, epsilon, pool);

    let cp: Vec<AtomicU32> = (0..n).map(|i| AtomicU32::new(i as u32)).collect();
    let remaining: Vec<AtomicI32> = lists
        .smaller_counts
        .iter()
        .map(|&c| AtomicI32::new(c as i32 - 1))
        .collect();

    let num_slots = pool.current_num_threads().max(1);
    let ranges = partition_ranges(n, num_slots);
    let counters: Vec<PaddedCounter> = (0..num_slots)
        .map(|_| PaddedCounter(AtomicU32::new(0)))
        .collect();

    let mut rounds = 0;
    let mut should_continue = true;
    while should_continue {
        rounds += 1;
        should_continue = pool.install(|| {
            ranges
                .par_iter()
                .enumerate()
                .map(|(slot, range)| {
                    let mut any_unfinished = false;
                    let mut found = 0u32;
                    for i in range.clone() {
                        let (unfinished, acted_as_centroid) =
                            crate::forward::process_vertex(i, &lists, &cp, &remaining);
                        any_unfinished |= unfinished;
                        found += u32::from(acted_as_centroid);
                    }
                    // Only this slot's task touches this counter.
                    counters[slot].0.fetch_add(found, Ordering::Relaxed);
                    any_unfinished
                })
                .reduce(|| false, |a, b| a | b)
        });
    }
    debug!(
        "forward-async weld converged after {} rounds over {} vertices",
        rounds, n
    );

    let cp: Vec<u32> = cp.into_iter().map(AtomicU32::into_inner).collect();

    // Exclusive prefix sum over the per-slot counters: each slot's output
    // offset, and in total the cluster count.
    let counts: Vec<usize> = counters
        .iter()
        .map(|c| c.0.load(Ordering::Relaxed) as usize)
        .collect();
    let mut offsets = Vec::with_capacity(num_slots);
    let mut cluster_count = 0usize;
    for &c in &counts {
        offsets.push(cluster_count);
        cluster_count += c;
    }

    let mut new_vertices = vec![Point3d::origin(); cluster_count];
    let mut pid2ccid = vec![0u32; n];

    // Carve one disjoint output window per slot, then emit centroids in
    // parallel. Output ids stay dense because windows are laid out in slot
    // order and filled in ascending vertex id within each slot.
    {
        let mut work: Vec<(Range<usize>, u32, &mut [u32], &mut [Point3d])> =
            Vec::with_capacity(num_slots);
        let mut vert_rest: &mut [Point3d] = &mut new_vertices;
        let mut pid_rest: &mut [u32] = &mut pid2ccid;
        for (slot, range) in ranges.iter().enumerate() {
            let (verts, tail) = std::mem::take(&mut vert_rest).split_at_mut(counts[slot]);
            vert_rest = tail;
            let (pids, tail) = std::mem::take(&mut pid_rest).split_at_mut(range.len());
            pid_rest = tail;
            work.push((range.clone(), offsets[slot] as u32, pids, verts));
        }

        let vertices = &mesh.vertices;
        let cp_ref = &cp;
        pool.install(|| {
            work.into_par_iter().for_each(|(range, offset, pids, verts)| {
                let start = range.start;
                let mut local = 0usize;
                for i in range {
                    if cp_ref[i] as usize == i {
                        verts[local] = vertices[i];
                        pids[i - start] = offset + local as u32;
                        local += 1;
                    }
                }
            });
        });
    }

    let (normals, colors) = carry_attributes(mesh, &cp, &pid2ccid, cluster_count);

    // Fold non-centroid positions into the running means from a single task
    // while the triangles are remapped in parallel beside it. pid2ccid is
    // only populated at centroid ids here, so the remap goes through cp.
    let mut member_counts = vec![1u32; cluster_count];
    let mut triangles = mesh.triangles.clone();
    {
        let vertices = &mesh.vertices;
        let cp_ref = &cp;
        let pid_ref = &pid2ccid;
        let new_vertices = &mut new_vertices;
        let member_counts = &mut member_counts;
        pool.install(|| {
            rayon::join(
                || {
                    for i in 0..n {
                        if cp_ref[i] as usize != i {
                            let ccid = pid_ref[cp_ref[i] as usize] as usize;
                            let previous_size = member_counts[ccid] as f64;
                            member_counts[ccid] += 1;
                            new_vertices[ccid] = Point3d::from(
                                (previous_size * new_vertices[ccid].coords + vertices[i].coords)
                                    / (previous_size + 1.0),
                            );
                        }
                    }
                },
                || {
                    triangles.par_iter_mut().for_each(|t| {
                        for v in t.iter_mut() {
                            *v = pid_ref[cp_ref[*v as usize] as usize];
                        }
                    });
                },
            );
        });
    }

    TriangleMesh {
        vertices: new_vertices,
        triangles,
        normals,
        colors,
    }
}

/// Split `[0, n)` into `slots` contiguous near-equal ranges.
fn partition_ranges(n: usize, slots: usize) -> Vec<Range<usize>> {
    let base = n / slots;
    let remainder = n % slots;
    let mut ranges = Vec::with_capacity(slots);
    let mut start = 0;
    for slot in 0..slots {
        let len = base + usize::from(slot < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}
