//! I/O operations for pweld meshes
//!
//! This crate reads and writes triangle meshes in the PLY format, ASCII or
//! binary, including optional per-vertex normals and colors. Polygonal faces
//! are triangulated by ear clipping on read.

pub mod ply;
mod triangulate;

pub use ply::{PlyFormat, PlyReader, PlyWriteOptions, PlyWriter};

use pweld_core::{Error, Result, TriangleMesh};
use std::path::Path;

/// Trait for reading meshes from files
pub trait MeshReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh>;
}

/// Trait for writing meshes to files
pub trait MeshWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()>;
}

/// Auto-detect format and read a mesh
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("ply") => PlyReader::read_mesh(path),
        other => Err(Error::Unsupported(format!(
            "unsupported mesh format {:?} (only .ply is supported)",
            other
        ))),
    }
}

/// Auto-detect format and write a mesh
pub fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("ply") => PlyWriter::write_mesh(mesh, path),
        other => Err(Error::Unsupported(format!(
            "unsupported mesh format {:?} (only .ply is supported)",
            other
        ))),
    }
}
