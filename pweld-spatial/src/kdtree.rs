//! K-d tree for spatial point queries in three dimensions.
//!
//! The tree stores a copy of the input points and splits on the median along
//! axes cycled per level. All queries report squared Euclidean distances;
//! radius queries are inclusive of the boundary.

use pweld_core::{NearestNeighborSearch, Point3d, TriangleMesh};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A node in the k-d tree.
#[derive(Debug, Clone)]
enum KdNode {
    /// A leaf node containing a single point index.
    Leaf { index: usize },
    /// An internal node that splits space along an axis at its median point.
    Internal {
        index: usize,
        axis: u8,
        left: Option<Box<KdNode>>,
        right: Option<Box<KdNode>>,
    },
}

/// Max-heap entry for the k-NN candidate set, ordered by squared distance.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    index: usize,
    dist2: f64,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2.total_cmp(&other.dist2)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

fn dist2(a: &Point3d, b: &Point3d) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

fn coord(p: &Point3d, axis: u8) -> f64 {
    match axis {
        0 => p.x,
        1 => p.y,
        _ => p.z,
    }
}

/// A static k-d tree over 3D points.
///
/// Built once from a point set; the original insertion-order ids are
/// preserved in all query results.
#[derive(Debug, Clone)]
pub struct KdTree {
    root: Option<Box<KdNode>>,
    points: Vec<Point3d>,
}

impl KdTree {
    /// Builds a k-d tree from a slice of points.
    ///
    /// Returns an empty tree if the input is empty.
    pub fn build(points: &[Point3d]) -> Self {
        if points.is_empty() {
            return KdTree {
                root: None,
                points: Vec::new(),
            };
        }

        let mut indices: Vec<usize> = (0..points.len()).collect();
        let root = Self::build_recursive(points, &mut indices, 0);

        KdTree {
            root: Some(root),
            points: points.to_vec(),
        }
    }

    /// Builds a k-d tree over the vertices of a mesh.
    pub fn from_mesh(mesh: &TriangleMesh) -> Self {
        Self::build(&mesh.vertices)
    }

    fn build_recursive(points: &[Point3d], indices: &mut [usize], depth: usize) -> Box<KdNode> {
        let axis = (depth % 3) as u8;

        if indices.len() == 1 {
            return Box::new(KdNode::Leaf { index: indices[0] });
        }

        // Median split on the current axis
        let median = indices.len() / 2;
        indices.select_nth_unstable_by(median, |&a, &b| {
            coord(&points[a], axis).total_cmp(&coord(&points[b], axis))
        });
        let median_index = indices[median];

        let left = if median > 0 {
            Some(Self::build_recursive(points, &mut indices[..median], depth + 1))
        } else {
            None
        };

        let right = if median + 1 < indices.len() {
            Some(Self::build_recursive(
                points,
                &mut indices[median + 1..],
                depth + 1,
            ))
        } else {
            None
        };

        Box::new(KdNode::Internal {
            index: median_index,
            axis,
            left,
            right,
        })
    }

    /// Returns the number of points in the tree.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The point stored for a given id.
    pub fn point(&self, id: usize) -> &Point3d {
        &self.points[id]
    }

    /// Finds the k nearest neighbors to a query point.
    ///
    /// Returns `(id, squared distance)` pairs sorted closest first.
    pub fn k_nearest(&self, query: &Point3d, k: usize) -> Vec<(usize, f64)> {
        let root = match (&self.root, k) {
            (Some(root), k) if k > 0 => root,
            _ => return Vec::new(),
        };

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
        self.k_nearest_recursive(root, query, k, &mut heap);

        let mut results: Vec<(usize, f64)> = heap.into_iter().map(|e| (e.index, e.dist2)).collect();
        results.sort_by(|a, b| a.1.total_cmp(&b.1));
        results
    }

    fn k_nearest_recursive(
        &self,
        node: &KdNode,
        query: &Point3d,
        k: usize,
        heap: &mut BinaryHeap<HeapEntry>,
    ) {
        match node {
            KdNode::Leaf { index } => {
                Self::heap_insert(heap, *index, dist2(&self.points[*index], query), k);
            }
            KdNode::Internal {
                index,
                axis,
                left,
                right,
            } => {
                let point = &self.points[*index];
                Self::heap_insert(heap, *index, dist2(point, query), k);

                let query_val = coord(query, *axis);
                let point_val = coord(point, *axis);
                let (first, second) = if query_val < point_val {
                    (left, right)
                } else {
                    (right, left)
                };

                if let Some(child) = first {
                    self.k_nearest_recursive(child, query, k, heap);
                }

                // The far side can only matter if the splitting plane is
                // closer than the current k-th candidate.
                let axis_dist2 = (query_val - point_val) * (query_val - point_val);
                let should_search = heap.len() < k
                    || heap.peek().map(|e| axis_dist2 < e.dist2).unwrap_or(true);
                if should_search {
                    if let Some(child) = second {
                        self.k_nearest_recursive(child, query, k, heap);
                    }
                }
            }
        }
    }

    fn heap_insert(heap: &mut BinaryHeap<HeapEntry>, index: usize, dist2: f64, k: usize) {
        if heap.len() < k {
            heap.push(HeapEntry { index, dist2 });
        } else if let Some(max) = heap.peek() {
            if dist2 < max.dist2 {
                heap.pop();
                heap.push(HeapEntry { index, dist2 });
            }
        }
    }

    /// Finds all points within `radius` of the query point (inclusive).
    ///
    /// Returns `(id, squared distance)` pairs in unspecified order. A
    /// negative radius yields an empty result.
    pub fn radius_neighbors(&self, query: &Point3d, radius: f64) -> Vec<(usize, f64)> {
        let mut results = Vec::new();
        if radius < 0.0 {
            return results;
        }
        if let Some(root) = &self.root {
            self.radius_recursive(root, query, radius, radius * radius, &mut |index, d2| {
                results.push((index, d2));
            });
        }
        results
    }

    /// Radius query partitioned by vertex-id order around a pivot id.
    ///
    /// Scans all points within `radius` of `query`; hits with an id greater
    /// than `pivot` are collected into the returned list, hits with an id
    /// less than or equal to `pivot` (the pivot itself included) are only
    /// counted. Returns `(bigger_ids, smaller_count)`.
    pub fn radius_smaller_and_bigger(
        &self,
        query: &Point3d,
        radius: f64,
        pivot: usize,
    ) -> (Vec<u32>, u32) {
        let mut bigger = Vec::new();
        let mut smaller_count = 0u32;
        if radius < 0.0 {
            return (bigger, smaller_count);
        }
        if let Some(root) = &self.root {
            self.radius_recursive(root, query, radius, radius * radius, &mut |index, _| {
                if index > pivot {
                    bigger.push(index as u32);
                } else {
                    smaller_count += 1;
                }
            });
        }
        (bigger, smaller_count)
    }

    fn radius_recursive<F: FnMut(usize, f64)>(
        &self,
        node: &KdNode,
        query: &Point3d,
        radius: f64,
        radius2: f64,
        visit: &mut F,
    ) {
        match node {
            KdNode::Leaf { index } => {
                let d2 = dist2(&self.points[*index], query);
                if d2 <= radius2 {
                    visit(*index, d2);
                }
            }
            KdNode::Internal {
                index,
                axis,
                left,
                right,
            } => {
                let point = &self.points[*index];
                let d2 = dist2(point, query);
                if d2 <= radius2 {
                    visit(*index, d2);
                }

                let query_val = coord(query, *axis);
                let point_val = coord(point, *axis);

                if let Some(child) = left {
                    if query_val - radius <= point_val {
                        self.radius_recursive(child, query, radius, radius2, visit);
                    }
                }
                if let Some(child) = right {
                    if query_val + radius >= point_val {
                        self.radius_recursive(child, query, radius, radius2, visit);
                    }
                }
            }
        }
    }
}

impl NearestNeighborSearch for KdTree {
    fn find_k_nearest(&self, query: &Point3d, k: usize) -> Vec<(usize, f64)> {
        self.k_nearest(query, k)
    }

    fn find_radius_neighbors(&self, query: &Point3d, radius: f64) -> Vec<(usize, f64)> {
        self.radius_neighbors(query, radius)
    }
}
