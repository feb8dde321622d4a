//! Applies the derived permutation to the system matrix and rebuilds
//! the coarsened adjacency graphs over the reordered clusters.
//!
//! The rebuilt graphs are what the block-cluster classification queries:
//! after reordering, cluster ids at every tree level are the nodes'
//! left-to-right positions, so each level graph must be re-contracted
//! from the permuted matrix under those positions.

use sprs::TriMat;

use crate::coarsen::{convert_to_coarser_graph, AdjacencyGraph};
use crate::error::{Error, Result};
use crate::tree::ClusterTree;
use crate::CsrMatrix;

/// Sparse permutation matrix P with `P[k, perm[k]] = 1`, mapping
/// permuted position k to original index `perm[k]`.
pub fn permutation_matrix(perm: &[usize]) -> CsrMatrix {
    let n = perm.len();
    let mut p = TriMat::new((n, n));
    for (position, &original) in perm.iter().enumerate() {
        p.add_triplet(position, original, 1.0);
    }
    p.to_csr()
}

/// Symmetric reordering `P * A * P^T` of `mat` under `perm`.
pub fn permute(mat: &CsrMatrix, perm: &[usize]) -> Result<CsrMatrix> {
    if mat.rows() != perm.len() || mat.cols() != perm.len() {
        return Err(Error::DimensionMismatch {
            expected: perm.len(),
            got: mat.rows(),
        });
    }
    let p = permutation_matrix(perm);
    let p_transpose = p.transpose_view().to_owned();
    Ok(&p * &(mat * &p_transpose))
}

/// Rebuilds one adjacency graph per coarsening level from the permuted
/// matrix, finest first.
///
/// `graphs[0]` is the permuted matrix itself (the leaf-level adjacency);
/// `graphs[k]` is the contraction of `graphs[k - 1]` under the clusters
/// formed by the tree nodes at level `depth - k`, where each node's
/// cluster members are its children's level positions. With leaves at
/// level `depth`, the adjacency among the nodes of level L is
/// `graphs[depth - L]`.
///
/// Must run after [`ClusterTree::map_index`] and before
/// [`ClusterTree::aggregate`], while node data still holds level
/// positions.
pub fn rebuild_level_graphs(tree: &ClusterTree, permuted: &CsrMatrix) -> Result<Vec<AdjacencyGraph>> {
    let levels = tree.levels();
    let depth = levels.len() - 1;
    if permuted.rows() != levels[depth].len() {
        return Err(Error::DimensionMismatch {
            expected: levels[depth].len(),
            got: permuted.rows(),
        });
    }

    let mut graphs = vec![AdjacencyGraph::new(permuted.clone())];
    for level in (1..depth).rev() {
        let clusters: Vec<Vec<usize>> = levels[level]
            .iter()
            .map(|&id| {
                let node = tree.node(id);
                let mut members = Vec::with_capacity(2);
                if let Some(left) = node.left {
                    members.push(tree.node(left).data[0]);
                }
                if let Some(right) = node.right {
                    members.push(tree.node(right).data[0]);
                }
                members
            })
            .collect();
        let coarse = convert_to_coarser_graph(&graphs[graphs.len() - 1], &clusters);
        graphs.push(coarse);
    }

    debug!("rebuilt {} level graphs", graphs.len());
    Ok(graphs)
}
