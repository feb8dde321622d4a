//! Error types for the H-matrix construction pipeline.
//!
//! Only structural faults are errors: they abort the build and no partial
//! tree is returned. ACA stopping short of the target rank and unmatched
//! vertices during coarsening are expected outcomes, not errors.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Two cluster-tree nodes compared for admissibility sit on
    /// different tree levels.
    #[error("cluster level mismatch: {row_level} vs {col_level}")]
    LevelMismatch { row_level: usize, col_level: usize },

    /// Matrix dimensions disagree with the cluster tree's index ranges.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A full matching pass failed to reduce the cluster count twice in
    /// a row, so the coarsening loop cannot terminate.
    #[error("coarsening stalled at {count} clusters")]
    CoarseningStalled { count: usize },

    /// The input graph is too small to coarsen to two clusters.
    #[error("graph with {0} vertices cannot be coarsened")]
    GraphTooSmall(usize),

    /// Malformed line in a triplet matrix file.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
