//! Hierarchical matrix (H-matrix) construction for large sparse weighted
//! matrices whose nonzero structure comes from physically local
//! interactions (boundary-element discretizations, graph-structured
//! systems).
//!
//! The build pipeline recursively partitions the index set into clusters,
//! classifies pairs of clusters as well-separated (compressible to low
//! rank) or near (kept dense), and compresses the well-separated blocks
//! with adaptive cross approximation. The stages are:
//!
//! 1. [`coarsen`] repeatedly merges graph vertices by heavy-edge matching
//!    until two clusters remain, retaining one graph per level.
//! 2. [`tree`] turns the coarsening sequence into a binary cluster tree
//!    and derives the index permutation that makes every cluster a
//!    contiguous index range.
//! 3. [`reorder`] applies the permutation to the matrix and rebuilds the
//!    per-level adjacency graphs over the reordered clusters.
//! 4. [`block`] classifies every pair of same-level tree nodes as Dense,
//!    Admissible or Split, producing a quad-tree of matrix blocks.
//! 5. [`hmatrix`] walks the block tree and assembles the H-matrix,
//!    calling [`aca`] on admissible leaves and copying dense leaves.
//!
//! [`pipeline::build_hmatrix`] chains all five stages.

use ndarray::{Array1, Array2};
use sprs::CsMatBase;

#[macro_use]
extern crate log;
extern crate approx;

pub mod aca;
pub mod block;
pub mod coarsen;
pub mod error;
pub mod hmatrix;
pub mod io;
pub mod pipeline;
pub mod reorder;
pub mod tree;

pub type CsrMatrix = CsMatBase<f64, usize, Vec<usize>, Vec<usize>, Vec<f64>, usize>;
pub type Vector = Array1<f64>;
pub type Matrix = Array2<f64>;

pub use error::{Error, Result};
pub use pipeline::{build_hmatrix, HMatrixConfig, HMatrixOutput};
