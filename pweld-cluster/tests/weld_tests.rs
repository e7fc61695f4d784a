//! End-to-end tests for the three merge variants.

use approx::assert_relative_eq;
use nalgebra::Point3;
use pweld_cluster::{
    find_epsilon, merge_close_vertices, merge_vertices, merge_vertices_forward,
    merge_vertices_forward_async, ThreadPoolConfig, WeldVariant,
};
use pweld_core::{Point3d, TriangleMesh, Vector3d};
use pweld_spatial::KdTree;

fn config(threads: usize) -> ThreadPoolConfig {
    ThreadPoolConfig::new().with_threads(threads)
}

fn all_variants() -> [WeldVariant; 3] {
    [
        WeldVariant::Baseline,
        WeldVariant::Forward,
        WeldVariant::ForwardAsync,
    ]
}

/// Two tight pairs a unit apart, bridged by two triangles.
fn pair_mesh() -> TriangleMesh {
    TriangleMesh::from_vertices_and_triangles(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.001, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.001, 0.0, 0.0),
        ],
        vec![[0, 1, 2], [1, 2, 3]],
    )
}

/// Ten vertices strung 0.5 apart along the x axis.
fn chain_mesh() -> TriangleMesh {
    let vertices: Vec<Point3d> = (0..10).map(|i| Point3::new(i as f64 * 0.5, 0.0, 0.0)).collect();
    let triangles: Vec<[u32; 3]> = (0..8).map(|i| [i, i + 1, i + 2]).collect();
    TriangleMesh::from_vertices_and_triangles(vertices, triangles)
}

fn grid_mesh(size: usize) -> TriangleMesh {
    let mut vertices = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f64 / (size - 1) as f64 * std::f64::consts::PI;
            let fy = y as f64 / (size - 1) as f64 * std::f64::consts::PI;
            vertices.push(Point3::new(x as f64, y as f64, (fx.sin() * fy.sin()) * 2.0));
        }
    }
    let mut triangles = Vec::with_capacity((size - 1) * (size - 1) * 2);
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = (y * size + x) as u32;
            let tr = tl + 1;
            let bl = ((y + 1) * size + x) as u32;
            let br = bl + 1;
            triangles.push([tl, bl, tr]);
            triangles.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_triangles(vertices, triangles)
}

#[test]
fn pair_mesh_collapses_to_two_centroids() {
    let mesh = pair_mesh();
    let index = KdTree::from_mesh(&mesh);

    let reduced = merge_vertices_forward(&mesh, &index, 0.01, &config(2)).unwrap();
    assert_eq!(reduced.vertex_count(), 2);
    assert_relative_eq!(reduced.vertices[0].x, 0.0005, epsilon = 1e-12);
    assert_relative_eq!(reduced.vertices[1].x, 1.0005, epsilon = 1e-12);
    assert_eq!(reduced.triangles, vec![[0, 0, 1], [0, 1, 1]]);
}

#[test]
fn every_variant_reduces_the_pair_mesh_to_two_vertices() {
    let mesh = pair_mesh();
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        let reduced = merge_vertices(&mesh, &index, 0.01, variant, &config(2)).unwrap();
        assert_eq!(reduced.vertex_count(), 2, "variant {:?}", variant);
        assert_eq!(reduced.triangle_count(), 2, "variant {:?}", variant);
    }
}

#[test]
fn single_vertex_mesh_passes_through() {
    let mesh = TriangleMesh::from_vertices_and_triangles(vec![Point3::new(5.0, 5.0, 5.0)], vec![]);
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        let reduced = merge_vertices(&mesh, &index, 2.0, variant, &config(1)).unwrap();
        assert_eq!(reduced.vertex_count(), 1);
        assert_eq!(reduced.vertices[0], Point3::new(5.0, 5.0, 5.0));
        assert!(reduced.triangles.is_empty());
    }
}

#[test]
fn empty_mesh_passes_through() {
    let mesh = TriangleMesh::new();
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        let reduced = merge_vertices(&mesh, &index, 1.0, variant, &config(2)).unwrap();
        assert_eq!(reduced.vertex_count(), 0);
        assert_eq!(reduced.triangle_count(), 0);
    }
}

#[test]
fn chain_pairs_off_at_small_epsilon() {
    // Attachment is only published by centroids, so the chain pairs off
    // rather than merging transitively; every survivor is the mean of an
    // adjacent pair.
    let mesh = chain_mesh();
    let index = KdTree::from_mesh(&mesh);
    for variant in [WeldVariant::Forward, WeldVariant::ForwardAsync] {
        let reduced = merge_vertices(&mesh, &index, 0.6, variant, &config(4)).unwrap();
        assert_eq!(reduced.vertex_count(), 5, "variant {:?}", variant);
        for (k, v) in reduced.vertices.iter().enumerate() {
            assert_relative_eq!(v.x, k as f64 + 0.25, epsilon = 1e-12);
        }
    }
}

#[test]
fn chain_collapses_fully_once_epsilon_spans_it() {
    let mesh = chain_mesh();
    let index = KdTree::from_mesh(&mesh);
    for variant in [WeldVariant::Forward, WeldVariant::ForwardAsync] {
        let reduced = merge_vertices(&mesh, &index, 4.5, variant, &config(4)).unwrap();
        assert_eq!(reduced.vertex_count(), 1, "variant {:?}", variant);
        // The surviving centroid is the mean of 0.0, 0.5, .., 4.5.
        assert_relative_eq!(reduced.vertices[0].x, 2.25, epsilon = 1e-9);
        for t in &reduced.triangles {
            assert_eq!(t, &[0, 0, 0]);
        }
    }
}

#[test]
fn epsilon_zero_merges_only_exact_duplicates() {
    let mesh = TriangleMesh::from_vertices_and_triangles(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ],
        vec![[0, 1, 2], [1, 2, 3]],
    );
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        let reduced = merge_vertices(&mesh, &index, 0.0, variant, &config(2)).unwrap();
        assert_eq!(reduced.vertex_count(), 3, "variant {:?}", variant);
    }
}

#[test]
fn epsilon_beyond_diameter_collapses_everything() {
    let mesh = grid_mesh(6);
    let index = KdTree::from_mesh(&mesh);
    let (min, max) = mesh.bounding_box().unwrap();
    let diameter = (max - min).norm();

    for variant in all_variants() {
        let reduced = merge_vertices(&mesh, &index, diameter + 1.0, variant, &config(4)).unwrap();
        assert_eq!(reduced.vertex_count(), 1, "variant {:?}", variant);
        for t in &reduced.triangles {
            assert_eq!(t, &[0, 0, 0]);
        }
    }
}

#[test]
fn remapped_indices_stay_within_the_reduced_vertex_set() {
    let mesh = grid_mesh(8);
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        let reduced = merge_vertices(&mesh, &index, 1.5, variant, &config(3)).unwrap();
        assert_eq!(reduced.triangle_count(), mesh.triangle_count());
        let k = reduced.vertex_count() as u32;
        for t in &reduced.triangles {
            for &idx in t {
                assert!(idx < k, "variant {:?}", variant);
            }
        }
    }
}

#[test]
fn forward_output_is_identical_across_thread_counts() {
    let mesh = grid_mesh(10);
    let index = KdTree::from_mesh(&mesh);

    let reference = merge_vertices_forward(&mesh, &index, 1.2, &config(1)).unwrap();
    for threads in [2, 4, 8] {
        let run = merge_vertices_forward(&mesh, &index, 1.2, &config(threads)).unwrap();
        assert_eq!(run.vertices, reference.vertices, "{} threads", threads);
        assert_eq!(run.triangles, reference.triangles, "{} threads", threads);
    }
}

#[test]
fn parallel_variants_match_the_baseline_reduction_rate() {
    // Tie-breaks differ between the baseline and the parallel variants, so
    // compare behaviour: how much got merged, not which ids survived.
    let mesh = pair_mesh();
    let index = KdTree::from_mesh(&mesh);

    let base = merge_close_vertices(&mesh, &index, 0.01, &config(2)).unwrap();
    let forward = merge_vertices_forward(&mesh, &index, 0.01, &config(2)).unwrap();
    let async_ = merge_vertices_forward_async(&mesh, &index, 0.01, &config(2)).unwrap();
    assert_eq!(base.vertex_count(), forward.vertex_count());
    assert_eq!(base.vertex_count(), async_.vertex_count());
}

#[test]
fn reduction_rate_is_monotone_in_epsilon() {
    let mesh = grid_mesh(8);
    let index = KdTree::from_mesh(&mesh);
    let mut last_count = usize::MAX;
    for epsilon in [0.0, 0.5, 1.0, 1.5, 2.5, 5.0, 20.0] {
        let reduced = merge_vertices_forward(&mesh, &index, epsilon, &config(4)).unwrap();
        assert!(
            reduced.vertex_count() <= last_count,
            "vertex count grew between epsilon steps at {}",
            epsilon
        );
        last_count = reduced.vertex_count();
    }
}

#[test]
fn rerunning_at_the_same_epsilon_leaves_little_residual() {
    let mesh = chain_mesh();
    let index = KdTree::from_mesh(&mesh);

    // Pair centroids end up a full unit apart, so a second pass at the same
    // epsilon finds nothing left to merge.
    let once = merge_vertices_forward(&mesh, &index, 0.6, &config(2)).unwrap();
    assert_eq!(once.vertex_count(), 5);

    let index2 = KdTree::from_mesh(&once);
    let twice = merge_vertices_forward(&once, &index2, 0.6, &config(2)).unwrap();
    assert_eq!(twice.vertex_count(), 5);
}

#[test]
fn attributes_follow_their_centroid() {
    let mut mesh = pair_mesh();
    mesh.set_normals(vec![
        Vector3d::new(1.0, 0.0, 0.0),
        Vector3d::new(0.0, 1.0, 0.0),
        Vector3d::new(0.0, 0.0, 1.0),
        Vector3d::new(1.0, 1.0, 0.0),
    ]);
    mesh.set_colors(vec![[10, 0, 0], [20, 0, 0], [30, 0, 0], [40, 0, 0]]);
    let index = KdTree::from_mesh(&mesh);

    for variant in [WeldVariant::Forward, WeldVariant::ForwardAsync] {
        let reduced = merge_vertices(&mesh, &index, 0.01, variant, &config(2)).unwrap();
        // Centroids are vertices 0 and 2; their attributes survive.
        assert_eq!(
            reduced.normals,
            Some(vec![Vector3d::new(1.0, 0.0, 0.0), Vector3d::new(0.0, 0.0, 1.0)]),
            "variant {:?}",
            variant
        );
        assert_eq!(
            reduced.colors,
            Some(vec![[10, 0, 0], [30, 0, 0]]),
            "variant {:?}",
            variant
        );
    }
}

#[test]
fn negative_epsilon_is_rejected_by_every_variant() {
    let mesh = pair_mesh();
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        assert!(merge_vertices(&mesh, &index, -0.1, variant, &config(1)).is_err());
    }
}

#[test]
fn out_of_range_triangle_indices_are_rejected() {
    let mesh = TriangleMesh::from_vertices_and_triangles(
        vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
        vec![[0, 1, 7]],
    );
    let index = KdTree::from_mesh(&mesh);
    for variant in all_variants() {
        assert!(merge_vertices(&mesh, &index, 0.1, variant, &config(1)).is_err());
    }
}

#[test]
fn epsilon_finder_locates_the_chain_threshold() {
    let mesh = chain_mesh();
    let index = KdTree::from_mesh(&mesh);

    // A 0.9 reduction of the ten-vertex chain first happens at epsilon 4.5;
    // the finder converges onto that threshold.
    let epsilon = find_epsilon(&mesh, &index, 0.9, &config(2)).unwrap();
    assert!((epsilon - 4.5).abs() < 1e-6, "epsilon = {}", epsilon);
    let reduced = merge_vertices_forward(&mesh, &index, epsilon + 1e-6, &config(2)).unwrap();
    assert_eq!(reduced.vertex_count(), 1);
}

#[test]
fn epsilon_finder_returns_a_plateau_value_directly() {
    // Two tight pairs: every epsilon in [0.001, 1.0) removes exactly half
    // the vertices, so the first probe inside that plateau is accepted.
    let mesh = pair_mesh();
    let index = KdTree::from_mesh(&mesh);

    let epsilon = find_epsilon(&mesh, &index, 0.5, &config(1)).unwrap();
    let reduced = merge_vertices_forward(&mesh, &index, epsilon, &config(1)).unwrap();
    assert_eq!(reduced.vertex_count(), 2);
}
