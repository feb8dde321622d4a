//! End-to-end driver: sparse matrix in, H-matrix out.
//!
//! The stages run in a fixed order because each one consumes state the
//! previous one produced: coarsening gives the cluster hierarchy, the
//! cluster tree derives the permutation, the permuted matrix rebuilds
//! the level graphs the block classification queries, and the block
//! tree finally tells the assembly which sub-blocks to compress.

use crate::block::{BlockClusterTree, BlockRecord};
use crate::coarsen::{coarsen, AdjacencyGraph};
use crate::error::Result;
use crate::hmatrix::HMatrix;
use crate::reorder::{permute, rebuild_level_graphs};
use crate::tree::ClusterTree;
use crate::CsrMatrix;

/// Knobs for the construction pipeline.
#[derive(Clone, Copy, Debug)]
pub struct HMatrixConfig {
    /// Blocks at or below this size are stored dense regardless of
    /// admissibility.
    pub leaf_size: usize,
    /// Target rank for ACA on admissible blocks.
    pub rank: usize,
}

impl Default for HMatrixConfig {
    fn default() -> Self {
        Self {
            leaf_size: 32,
            rank: 8,
        }
    }
}

/// Everything the pipeline produces.
pub struct HMatrixOutput {
    /// `permutation[new] = old`, mapping permuted indices back to the
    /// input ordering.
    pub permutation: Vec<usize>,
    /// The symmetrically permuted input matrix the H-matrix
    /// approximates.
    pub permuted: CsrMatrix,
    /// The clustering that induced the permutation.
    pub cluster_tree: ClusterTree,
    pub block_tree: BlockClusterTree,
    /// Terminal blocks of the partition in breadth-first order.
    pub records: Vec<BlockRecord>,
    pub hmatrix: HMatrix,
}

/// Runs the whole construction on a square sparse matrix.
pub fn build_hmatrix(mat: &CsrMatrix, config: HMatrixConfig) -> Result<HMatrixOutput> {
    let n = mat.rows();
    info!(
        "building H-matrix for {n}x{n} matrix ({} nnz), leaf size {}, rank {}",
        mat.nnz(),
        config.leaf_size,
        config.rank
    );

    let coarsening = coarsen(AdjacencyGraph::new(mat.clone()))?;
    let mut tree = ClusterTree::from_coarsening(&coarsening);
    let permutation = tree.map_index();
    let permuted = permute(mat, &permutation)?;

    let graphs = rebuild_level_graphs(&tree, &permuted)?;
    tree.update_bt_idx();
    tree.aggregate();

    let block_tree = BlockClusterTree::build(&tree, &graphs, config.leaf_size)?;
    let records = block_tree.records(&tree);
    info!(
        "block partition has {} nodes, {} terminal blocks",
        block_tree.len(),
        records.len()
    );

    let hmatrix = HMatrix::build(&block_tree, &tree, &permuted, config.rank)?;
    info!(
        "assembled H-matrix stores {} of {} dense entries",
        hmatrix.stored_entries(),
        n * n
    );

    Ok(HMatrixOutput {
        permutation,
        permuted,
        cluster_tree: tree,
        block_tree,
        records,
        hmatrix,
    })
}
