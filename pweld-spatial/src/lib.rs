//! Spatial indexing for pweld
//!
//! This crate provides the static k-d tree used by the clustering pipeline.
//! The tree is built once over the mesh vertices and is read-only afterwards;
//! besides the usual k-NN and radius queries it offers the id-partitioned
//! radius query that feeds the parallel clustering algorithm with per-vertex
//! "bigger-id" neighbour lists and "smaller-id" neighbour counts.

pub mod kdtree;

pub use kdtree::KdTree;
