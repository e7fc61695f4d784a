//! Cluster compression and triangle remapping.
//!
//! Turns a converged parent array into the reduced vertex set: each centroid
//! receives a dense cluster id in ascending vertex-id order, member positions
//! are folded into an incremental arithmetic mean, and triangles are rewritten
//! to the dense ids. Triangles that collapse onto repeated ids are kept.

use pweld_core::{Point3d, TriangleMesh, Vector3d};
use rayon::prelude::*;
use rayon::ThreadPool;

pub(crate) struct CompressedClusters {
    /// One entry per cluster: the running mean of member positions.
    pub vertices: Vec<Point3d>,
    /// Maps every original vertex id to the dense id of its cluster.
    pub pid2ccid: Vec<u32>,
}

/// Sequential reference reduction: walk vertices in id order, allocating a
/// dense id at each centroid and folding members into the running mean.
pub(crate) fn compress_clusters(cp: &[u32], vertices: &[Point3d]) -> CompressedClusters {
    let n = vertices.len();
    let mut pid2ccid = vec![0u32; n];
    let mut new_vertices: Vec<Point3d> = Vec::with_capacity(n);
    let mut member_counts = vec![1u32; n];

    for i in 0..n {
        if cp[i] as usize == i {
            pid2ccid[i] = new_vertices.len() as u32;
            new_vertices.push(vertices[i]);
        } else {
            let ccid = pid2ccid[cp[i] as usize] as usize;
            let previous_size = member_counts[ccid] as f64;
            member_counts[ccid] += 1;
            new_vertices[ccid] = Point3d::from(
                (vertices[i].coords + previous_size * new_vertices[ccid].coords)
                    / (previous_size + 1.0),
            );
            pid2ccid[i] = ccid as u32;
        }
    }

    CompressedClusters {
        vertices: new_vertices,
        pid2ccid,
    }
}

/// Rewrite triangle indices to dense cluster ids. Collapsed triangles are
/// retained; culling them is a downstream concern.
pub(crate) fn remap_triangles(
    triangles: &[[u32; 3]],
    pid2ccid: &[u32],
    pool: &ThreadPool,
) -> Vec<[u32; 3]> {
    pool.install(|| {
        triangles
            .par_iter()
            .map(|t| {
                [
                    pid2ccid[t[0] as usize],
                    pid2ccid[t[1] as usize],
                    pid2ccid[t[2] as usize],
                ]
            })
            .collect()
    })
}

/// Carry optional per-vertex attributes over to the reduced mesh: the output
/// attribute of a cluster is the attribute of its centroid vertex.
pub(crate) fn carry_attributes(
    mesh: &TriangleMesh,
    cp: &[u32],
    pid2ccid: &[u32],
    cluster_count: usize,
) -> (Option<Vec<Vector3d>>, Option<Vec<[u8; 3]>>) {
    let normals = mesh.normals.as_ref().map(|source| {
        let mut out = vec![Vector3d::zeros(); cluster_count];
        for i in 0..cp.len() {
            if cp[i] as usize == i {
                out[pid2ccid[i] as usize] = source[i];
            }
        }
        out
    });
    let colors = mesh.colors.as_ref().map(|source| {
        let mut out = vec![[0u8; 3]; cluster_count];
        for i in 0..cp.len() {
            if cp[i] as usize == i {
                out[pid2ccid[i] as usize] = source[i];
            }
        }
        out
    });
    (normals, colors)
}
