//! Ear-clipping triangulation of polygonal PLY faces.
//!
//! Faces with more than three vertices are flattened onto the dominant plane
//! of their Newell normal and clipped ear by ear. An ear is a convex corner
//! whose triangle contains no other polygon vertex.

use pweld_core::Point3d;

/// Triangulate one polygonal face given as positions into `polygon`, which
/// holds global vertex ids. Returns triangles of global ids, or an empty
/// vector when the polygon cannot be clipped (degenerate or self-crossing).
pub(crate) fn triangulate_face(vertices: &[Point3d], polygon: &[usize]) -> Vec<[usize; 3]> {
    let n = polygon.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![[polygon[0], polygon[1], polygon[2]]];
    }

    // Newell normal decides the projection plane.
    let mut normal = [0.0f64; 3];
    for i in 0..n {
        let a = &vertices[polygon[i]];
        let b = &vertices[polygon[(i + 1) % n]];
        normal[0] += (a.y - b.y) * (a.z + b.z);
        normal[1] += (a.z - b.z) * (a.x + b.x);
        normal[2] += (a.x - b.x) * (a.y + b.y);
    }
    let dominant = if normal[0].abs() >= normal[1].abs() && normal[0].abs() >= normal[2].abs() {
        0
    } else if normal[1].abs() >= normal[2].abs() {
        1
    } else {
        2
    };
    if normal[dominant] == 0.0 {
        return Vec::new();
    }

    let project = |id: usize| -> [f64; 2] {
        let p = &vertices[id];
        match dominant {
            0 => [p.y, p.z],
            1 => [p.z, p.x],
            _ => [p.x, p.y],
        }
    };

    let mut points: Vec<[f64; 2]> = polygon.iter().map(|&id| project(id)).collect();
    let mut index_map: Vec<usize> = polygon.to_vec();

    // Ensure counter-clockwise winding in the projection.
    let mut signed_area = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        signed_area += a[0] * b[1] - b[0] * a[1];
    }
    if signed_area == 0.0 {
        return Vec::new();
    }
    if signed_area < 0.0 {
        points.reverse();
        index_map.reverse();
    }

    let mut triangles = Vec::with_capacity(n - 2);
    while points.len() > 3 {
        let m = points.len();
        let mut ear = None;
        for i in 0..m {
            let prev = (i + m - 1) % m;
            let next = (i + 1) % m;
            if is_ear(&points, prev, i, next) {
                ear = Some((prev, i, next));
                break;
            }
        }
        match ear {
            Some((prev, i, next)) => {
                triangles.push([index_map[prev], index_map[i], index_map[next]]);
                points.remove(i);
                index_map.remove(i);
            }
            None => return Vec::new(),
        }
    }
    triangles.push([index_map[0], index_map[1], index_map[2]]);
    triangles
}

fn is_ear(points: &[[f64; 2]], prev: usize, curr: usize, next: usize) -> bool {
    let a = points[prev];
    let b = points[curr];
    let c = points[next];

    // The corner must be convex: a left turn in CCW winding.
    if cross(a, b, c) <= 0.0 {
        return false;
    }
    for (i, &p) in points.iter().enumerate() {
        if i == prev || i == curr || i == next {
            continue;
        }
        if point_in_triangle(p, a, b, c) {
            return false;
        }
    }
    true
}

#[inline]
fn cross(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn point_in_triangle(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> bool {
    let d1 = cross(p, a, b);
    let d2 = cross(p, b, c);
    let d3 = cross(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}
