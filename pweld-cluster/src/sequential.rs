//! Sequential vertex merge baseline.
//!
//! The reference algorithm the parallel variants are checked against:
//! neighbourhoods are precomputed in parallel, then a single-threaded pass
//! walks vertices in id order and greedily merges each still-unmapped vertex
//! with its unmapped neighbours. Cluster positions are the arithmetic mean of
//! the members. Tie-breaks differ from the parallel variants when a vertex is
//! within epsilon of several candidate clusters, so comparisons against it
//! should be behavioural (reduction rate, invariants), not id-for-id.

use crate::{validate_weld_input, ThreadPoolConfig};
use pweld_core::{Point3d, Result, TriangleMesh, Vector3d};
use pweld_spatial::KdTree;
use rayon::prelude::*;
use std::collections::HashMap;

/// Merge all vertices closer than `epsilon` with the sequential greedy
/// algorithm, returning the reduced mesh.
pub fn merge_close_vertices(
    mesh: &TriangleMesh,
    index: &KdTree,
    epsilon: f64,
    config: &ThreadPoolConfig,
) -> Result<TriangleMesh> {
    validate_weld_input(mesh, epsilon)?;
    let pool = crate::parallel::build_pool(config)?;

    let n = mesh.vertex_count();
    let neighbourhoods: Vec<Vec<usize>> = pool.install(|| {
        (0..n)
            .into_par_iter()
            .map(|i| {
                index
                    .radius_neighbors(&mesh.vertices[i], epsilon)
                    .into_iter()
                    .map(|(id, _)| id)
                    .collect()
            })
            .collect()
    });

    let mut new_vertices: Vec<Point3d> = Vec::new();
    let mut new_normals: Vec<Vector3d> = Vec::new();
    let mut new_colors: Vec<[u8; 3]> = Vec::new();
    let mut mapping: HashMap<usize, usize> = HashMap::new();

    for vidx in 0..n {
        if mapping.contains_key(&vidx) {
            continue;
        }

        let new_vidx = new_vertices.len();
        mapping.insert(vidx, new_vidx);

        let mut sum = mesh.vertices[vidx].coords;
        let mut members = 1usize;
        for &nb in &neighbourhoods[vidx] {
            if nb == vidx || mapping.contains_key(&nb) {
                continue;
            }
            sum += mesh.vertices[nb].coords;
            mapping.insert(nb, new_vidx);
            members += 1;
        }
        new_vertices.push(Point3d::from(sum / members as f64));

        // The representative's attributes stand for the whole cluster.
        if let Some(normals) = &mesh.normals {
            new_normals.push(normals[vidx]);
        }
        if let Some(colors) = &mesh.colors {
            new_colors.push(colors[vidx]);
        }
    }

    let triangles = mesh
        .triangles
        .iter()
        .map(|t| {
            [
                mapping[&(t[0] as usize)] as u32,
                mapping[&(t[1] as usize)] as u32,
                mapping[&(t[2] as usize)] as u32,
            ]
        })
        .collect();

    Ok(TriangleMesh {
        vertices: new_vertices,
        triangles,
        normals: mesh.normals.as_ref().map(|_| new_normals),
        colors: mesh.colors.as_ref().map(|_| new_colors),
    })
}
