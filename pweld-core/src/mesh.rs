//! Mesh data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// A triangle mesh with vertices and triangles referring to them by index.
///
/// Vertices are addressed by their dense insertion-order id; that ordering
/// is significant to the clustering algorithms, which break ties towards
/// smaller ids. Normals and colors are optional per-vertex attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3d>,
    pub triangles: Vec<[u32; 3]>,
    pub normals: Option<Vec<Vector3d>>,
    pub colors: Option<Vec<[u8; 3]>>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            normals: None,
            colors: None,
        }
    }

    /// Create a mesh from vertices and triangles
    pub fn from_vertices_and_triangles(vertices: Vec<Point3d>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
            normals: None,
            colors: None,
        }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the mesh has no vertices
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Add a vertex to the mesh, returning its id
    pub fn add_vertex(&mut self, vertex: Point3d) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle to the mesh
    pub fn add_triangle(&mut self, triangle: [u32; 3]) {
        self.triangles.push(triangle);
    }

    /// Set vertex normals; ignored if the length does not match
    pub fn set_normals(&mut self, normals: Vec<Vector3d>) {
        if normals.len() == self.vertices.len() {
            self.normals = Some(normals);
        }
    }

    /// Set vertex colors; ignored if the length does not match
    pub fn set_colors(&mut self, colors: Vec<[u8; 3]>) {
        if colors.len() == self.vertices.len() {
            self.colors = Some(colors);
        }
    }

    /// Verify that every triangle index refers to an existing vertex.
    pub fn validate_indices(&self) -> Result<()> {
        let n = self.vertices.len() as u32;
        for (ti, triangle) in self.triangles.iter().enumerate() {
            for &idx in triangle {
                if idx >= n {
                    return Err(Error::OutOfRange(format!(
                        "triangle {} refers to vertex {} but the mesh has {} vertices",
                        ti, idx, n
                    )));
                }
            }
        }
        Ok(())
    }

    /// Axis-aligned bounding box, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<(Point3d, Point3d)> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            min.z = min.z.min(v.z);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
            max.z = max.z.max(v.z);
        }
        Some((min, max))
    }

    /// Clear the mesh
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
        self.normals = None;
        self.colors = None;
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}
