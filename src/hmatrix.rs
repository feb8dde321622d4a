//! H-matrix assembly over the block-cluster tree.
//!
//! The supermatrix tree is isomorphic to the block-cluster tree: Super
//! nodes mirror Split blocks, Full leaves hold dense copies of Dense
//! blocks, RankK leaves hold the cross-approximation factors of
//! Admissible blocks. The permuted matrix is read-only throughout and
//! every node's payload is written exactly once, so the terminal blocks
//! (disjoint index ranges) are extracted and compressed in parallel.

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::aca::{aca, RkMatrix};
use crate::block::{BlockClusterTree, BlockKind};
use crate::error::{Error, Result};
use crate::tree::ClusterTree;
use crate::{CsrMatrix, Matrix};

pub type SuperId = usize;

/// Payload of a supermatrix node; the variant is fixed at construction.
pub enum SuperPayload {
    /// Low-rank factors of an admissible block.
    RankK(RkMatrix),
    /// Dense copy of a near block.
    Full(Matrix),
    /// Internal node owning its children.
    Super(Vec<SuperId>),
}

/// One node of the H-matrix tree. `row_start`/`col_start` are the
/// node's absolute offsets in the permuted ordering; `rows`/`cols` its
/// extents.
pub struct Supermatrix {
    pub row_start: usize,
    pub col_start: usize,
    pub rows: usize,
    pub cols: usize,
    pub payload: SuperPayload,
}

pub struct HMatrix {
    nodes: Vec<Supermatrix>,
    root: SuperId,
}

struct LeafTask {
    id: SuperId,
    kind: BlockKind,
    start_row: usize,
    start_col: usize,
    n_rows: usize,
    n_cols: usize,
}

impl HMatrix {
    /// Builds the H-matrix for `permuted` by walking the block-cluster
    /// tree breadth-first, one supermatrix node per block node.
    ///
    /// Dense blocks copy the sub-block at `(start_row, start_col,
    /// n_rows, n_cols)` verbatim; admissible blocks run ACA with target
    /// rank `rank` on the same sub-block and keep only the factors. The
    /// root's extents must equal the permuted matrix size.
    pub fn build(
        block_tree: &BlockClusterTree,
        tree: &ClusterTree,
        permuted: &CsrMatrix,
        rank: usize,
    ) -> Result<Self> {
        let root_rows = tree.node(tree.root()).data.len();
        if permuted.rows() != root_rows || permuted.cols() != root_rows {
            return Err(Error::DimensionMismatch {
                expected: root_rows,
                got: permuted.rows(),
            });
        }

        // Skeleton pass: breadth-first in lockstep with the block tree,
        // recording the extraction extents of every terminal block.
        let mut nodes: Vec<Supermatrix> = Vec::with_capacity(block_tree.len());
        let mut leaves: Vec<LeafTask> = Vec::new();
        let mut queue: VecDeque<(usize, SuperId)> = VecDeque::new();

        let root = push_skeleton(
            &mut nodes,
            &mut leaves,
            block_tree,
            tree,
            block_tree.root(),
        );
        queue.push_back((block_tree.root(), root));

        while let Some((block_id, super_id)) = queue.pop_front() {
            let block = block_tree.node(block_id);
            if block.kind != BlockKind::Split {
                continue;
            }
            let mut children = Vec::with_capacity(block.children.len());
            for &block_child in &block.children {
                let child = push_skeleton(&mut nodes, &mut leaves, block_tree, tree, block_child);
                children.push(child);
                queue.push_back((block_child, child));
            }
            nodes[super_id].payload = SuperPayload::Super(children);
        }

        // Payload pass: terminal blocks touch disjoint slices of the
        // read-only permuted matrix, so they fill in parallel.
        let payloads: Vec<(SuperId, SuperPayload)> = leaves
            .par_iter()
            .map(|task| {
                let block = dense_block(
                    permuted,
                    task.start_row,
                    task.start_col,
                    task.n_rows,
                    task.n_cols,
                );
                let payload = match task.kind {
                    BlockKind::Dense => SuperPayload::Full(block),
                    BlockKind::Admissible => SuperPayload::RankK(aca(&block, rank)),
                    BlockKind::Split => unreachable!("terminal task from a split block"),
                };
                (task.id, payload)
            })
            .collect();
        for (id, payload) in payloads {
            nodes[id].payload = payload;
        }

        info!(
            "h-matrix assembled: {} nodes, {} leaves, target rank {}",
            nodes.len(),
            leaves.len(),
            rank
        );
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> SuperId {
        self.root
    }

    pub fn node(&self, id: SuperId) -> &Supermatrix {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stored floating-point entries: factor vectors for RankK leaves,
    /// full blocks for Dense leaves. A coarse memory figure to compare
    /// against the n^2 dense baseline.
    pub fn stored_entries(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match &node.payload {
                SuperPayload::RankK(rk) => rk.kt * (node.rows + node.cols),
                SuperPayload::Full(_) => node.rows * node.cols,
                SuperPayload::Super(_) => 0,
            })
            .sum()
    }

    /// Dense reconstruction of the whole tree in permuted ordering,
    /// used by diagnostics and the end-to-end tests. Leaves cover
    /// disjoint index ranges, so writing them in arena order suffices.
    pub fn reconstruct(&self) -> Matrix {
        let root = &self.nodes[self.root];
        let mut out = Matrix::zeros((root.rows, root.cols));
        for node in &self.nodes {
            let block = match &node.payload {
                SuperPayload::Full(block) => block.clone(),
                SuperPayload::RankK(rk) => rk.reconstruct(node.rows, node.cols),
                SuperPayload::Super(_) => continue,
            };
            for i in 0..node.rows {
                for j in 0..node.cols {
                    out[[node.row_start + i, node.col_start + j]] = block[[i, j]];
                }
            }
        }
        out
    }
}

fn push_skeleton(
    nodes: &mut Vec<Supermatrix>,
    leaves: &mut Vec<LeafTask>,
    block_tree: &BlockClusterTree,
    tree: &ClusterTree,
    block_id: usize,
) -> SuperId {
    let block = block_tree.node(block_id);
    let rows = &tree.node(block.row_cluster).data;
    let cols = &tree.node(block.col_cluster).data;
    let id = nodes.len();
    nodes.push(Supermatrix {
        row_start: rows[0],
        col_start: cols[0],
        rows: rows.len(),
        cols: cols.len(),
        payload: SuperPayload::Super(Vec::new()),
    });
    if block.kind != BlockKind::Split {
        leaves.push(LeafTask {
            id,
            kind: block.kind,
            start_row: rows[0],
            start_col: cols[0],
            n_rows: rows.len(),
            n_cols: cols.len(),
        });
    }
    id
}

/// Dense copy of a sparse sub-block.
fn dense_block(
    mat: &CsrMatrix,
    start_row: usize,
    start_col: usize,
    n_rows: usize,
    n_cols: usize,
) -> Matrix {
    let mut block = Matrix::zeros((n_rows, n_cols));
    for (i, row) in mat
        .outer_iterator()
        .skip(start_row)
        .take(n_rows)
        .enumerate()
    {
        for (j, &value) in row.iter() {
            if j >= start_col && j < start_col + n_cols {
                block[[i, j - start_col]] = value;
            }
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn dense_to_csr(rows: &[Vec<f64>]) -> CsrMatrix {
        let n = rows.len();
        let mut coo = TriMat::new((n, rows[0].len()));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    coo.add_triplet(i, j, v);
                }
            }
        }
        coo.to_csr()
    }

    #[test]
    fn dense_block_extracts_sub_matrix() {
        let mat = dense_to_csr(&[
            vec![1.0, 2.0, 0.0, 0.0],
            vec![3.0, 4.0, 5.0, 0.0],
            vec![0.0, 6.0, 7.0, 8.0],
            vec![0.0, 0.0, 9.0, 1.0],
        ]);
        let block = dense_block(&mat, 1, 1, 2, 3);
        assert_eq!(block[[0, 0]], 4.0);
        assert_eq!(block[[0, 1]], 5.0);
        assert_eq!(block[[1, 0]], 6.0);
        assert_eq!(block[[1, 2]], 8.0);
    }

    #[test]
    fn dense_block_handles_offsets_at_edges() {
        let mat = dense_to_csr(&[
            vec![1.0, 0.0, 2.0],
            vec![0.0, 3.0, 0.0],
            vec![4.0, 0.0, 5.0],
        ]);
        let block = dense_block(&mat, 2, 2, 1, 1);
        assert_eq!(block[[0, 0]], 5.0);
    }
}
