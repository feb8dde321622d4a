//! Block-cluster tree: a quad-tree over pairs of same-level cluster-tree
//! nodes, classifying each pair as Dense, Admissible or Split.
//!
//! Classification is a one-time assignment made when the node is
//! constructed and never changes afterwards. Split nodes expand into the
//! cartesian product of each side's children; Dense and Admissible nodes
//! are terminal and become the leaves of the H-matrix.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::coarsen::AdjacencyGraph;
use crate::error::{Error, Result};
use crate::tree::{ClusterTree, NodeId};

pub type BlockId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Terminal block kept as a dense copy: one side's index range is at
    /// or below the leaf size.
    Dense,
    /// Terminal block between two well-separated clusters, eligible for
    /// low-rank compression.
    Admissible,
    /// Connected pair above the leaf size; expands into up to four
    /// children.
    Split,
}

/// One node of the quad-tree: a pair of cluster-tree nodes at the same
/// level with its final classification. Children exist only for Split
/// nodes, in column-major cartesian-product order with absent pairings
/// dropped.
#[derive(Debug)]
pub struct BlockNode {
    pub row_cluster: NodeId,
    pub col_cluster: NodeId,
    pub kind: BlockKind,
    pub children: Vec<BlockId>,
}

pub struct BlockClusterTree {
    nodes: Vec<BlockNode>,
    root: BlockId,
}

/// Terminal block record: classification plus the two ordered permuted
/// index lists. The flat list of records is the external encoding of
/// the partition, serializable for downstream consumers.
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockRecord {
    pub kind: BlockKind,
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
}

impl BlockClusterTree {
    /// Classifies every reachable pair breadth-first from (root, root).
    ///
    /// `graphs` are the rebuilt level graphs from
    /// [`crate::reorder::rebuild_level_graphs`]; connectivity of a pair
    /// at tree level L is looked up in `graphs[graphs.len() - L]` by the
    /// two `bt_idx` cluster ids. A pair of nodes from different levels
    /// is a structural fault.
    pub fn build(
        tree: &ClusterTree,
        graphs: &[AdjacencyGraph],
        leaf_size: usize,
    ) -> Result<Self> {
        let root_kind = classify(tree, graphs, leaf_size, tree.root(), tree.root())?;
        let mut nodes = vec![BlockNode {
            row_cluster: tree.root(),
            col_cluster: tree.root(),
            kind: root_kind,
            children: Vec::new(),
        }];

        let mut queue: VecDeque<BlockId> = VecDeque::new();
        if root_kind == BlockKind::Split {
            queue.push_back(0);
        }
        while let Some(id) = queue.pop_front() {
            let row = tree.node(nodes[id].row_cluster);
            let col = tree.node(nodes[id].col_cluster);
            let row_children = [row.left, row.right];
            let col_children = [col.left, col.right];

            for col_child in col_children {
                for row_child in row_children {
                    let (a, b) = match (row_child, col_child) {
                        (Some(a), Some(b)) => (a, b),
                        _ => continue,
                    };
                    let kind = classify(tree, graphs, leaf_size, a, b)?;
                    let child = nodes.len();
                    nodes.push(BlockNode {
                        row_cluster: a,
                        col_cluster: b,
                        kind,
                        children: Vec::new(),
                    });
                    nodes[id].children.push(child);
                    if kind == BlockKind::Split {
                        queue.push_back(child);
                    }
                }
            }
        }

        info!(
            "block cluster tree: {} nodes, {} terminal",
            nodes.len(),
            nodes.iter().filter(|n| n.kind != BlockKind::Split).count()
        );
        Ok(Self { nodes, root: 0 })
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn node(&self, id: BlockId) -> &BlockNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Block ids in breadth-first order.
    pub fn bfs_order(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<BlockId> = VecDeque::new();
        queue.push_back(self.root);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(&self.nodes[id].children);
        }
        order
    }

    /// One record per terminal (Dense or Admissible) node, in
    /// breadth-first order. Must run after the cluster tree has been
    /// aggregated, so node data holds permuted index ranges.
    pub fn records(&self, tree: &ClusterTree) -> Vec<BlockRecord> {
        self.bfs_order()
            .into_iter()
            .filter(|&id| self.nodes[id].kind != BlockKind::Split)
            .map(|id| {
                let node = &self.nodes[id];
                BlockRecord {
                    kind: node.kind,
                    rows: tree.node(node.row_cluster).data.clone(),
                    cols: tree.node(node.col_cluster).data.clone(),
                }
            })
            .collect()
    }
}

/// Classifies a single pair of cluster-tree nodes. The assignment is
/// final; nothing reclassifies a node later.
fn classify(
    tree: &ClusterTree,
    graphs: &[AdjacencyGraph],
    leaf_size: usize,
    a: NodeId,
    b: NodeId,
) -> Result<BlockKind> {
    let row = tree.node(a);
    let col = tree.node(b);
    if row.level != col.level {
        return Err(Error::LevelMismatch {
            row_level: row.level,
            col_level: col.level,
        });
    }

    if row.data.len() <= leaf_size || col.data.len() <= leaf_size {
        return Ok(BlockKind::Dense);
    }

    let connected = row.bt_idx == col.bt_idx
        || graphs[graphs.len() - row.level]
            .edge_weight(row.bt_idx, col.bt_idx)
            != 0.0;
    if connected {
        Ok(BlockKind::Split)
    } else {
        Ok(BlockKind::Admissible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coarsen::{coarsen, AdjacencyGraph};
    use crate::reorder::{permute, rebuild_level_graphs};
    use crate::tree::ClusterTree;
    use crate::CsrMatrix;
    use sprs::TriMat;

    fn graph_from_edges(n: usize, edges: &[(usize, usize, f64)]) -> CsrMatrix {
        let mut coo = TriMat::new((n, n));
        for &(i, j, w) in edges {
            coo.add_triplet(i, j, w);
            coo.add_triplet(j, i, w);
        }
        coo.to_csr()
    }

    fn build_all(mat: &CsrMatrix, leaf_size: usize) -> (ClusterTree, BlockClusterTree, CsrMatrix) {
        let coarsening = coarsen(AdjacencyGraph::new(mat.clone())).unwrap();
        let mut tree = ClusterTree::from_coarsening(&coarsening);
        let perm = tree.map_index();
        let permuted = permute(mat, &perm).unwrap();
        let graphs = rebuild_level_graphs(&tree, &permuted).unwrap();
        tree.update_bt_idx();
        tree.aggregate();
        let block_tree = BlockClusterTree::build(&tree, &graphs, leaf_size).unwrap();
        (tree, block_tree, permuted)
    }

    #[test]
    fn root_below_leaf_size_is_dense_with_no_children() {
        let mat = graph_from_edges(4, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0)]);
        let (_, block_tree, _) = build_all(&mat, 8);
        assert_eq!(block_tree.len(), 1);
        let root = block_tree.node(block_tree.root());
        assert_eq!(root.kind, BlockKind::Dense);
        assert!(root.children.is_empty());
    }

    #[test]
    fn split_never_assigned_at_or_below_leaf_size() {
        let mat = graph_from_edges(
            8,
            &[
                (0, 1, 2.0),
                (1, 2, 1.0),
                (2, 3, 2.0),
                (3, 4, 1.0),
                (4, 5, 2.0),
                (5, 6, 1.0),
                (6, 7, 2.0),
            ],
        );
        let leaf_size = 2;
        let (tree, block_tree, _) = build_all(&mat, leaf_size);
        for id in block_tree.bfs_order() {
            let node = block_tree.node(id);
            if node.kind == BlockKind::Split {
                assert!(tree.node(node.row_cluster).data.len() > leaf_size);
                assert!(tree.node(node.col_cluster).data.len() > leaf_size);
            }
        }
    }

    #[test]
    fn disconnected_components_give_admissible_off_diagonal() {
        let mat = graph_from_edges(4, &[(0, 1, 3.0), (2, 3, 3.0)]);
        let (_, block_tree, _) = build_all(&mat, 1);
        let root = block_tree.node(block_tree.root());
        assert_eq!(root.kind, BlockKind::Split);
        assert_eq!(root.children.len(), 4);

        let kinds: Vec<BlockKind> = root
            .children
            .iter()
            .map(|&id| block_tree.node(id).kind)
            .collect();
        // Column-major child order: (0,0), (1,0), (0,1), (1,1). The
        // cross-component pairs are Admissible, the diagonal component
        // pairs stay connected and split down to dense leaves.
        assert_eq!(
            kinds,
            vec![
                BlockKind::Split,
                BlockKind::Admissible,
                BlockKind::Admissible,
                BlockKind::Split,
            ]
        );
    }

    #[test]
    fn chain_far_pairs_are_admissible() {
        let n = 8;
        let mut edges = Vec::new();
        for i in 0..n - 1 {
            edges.push((i, i + 1, 1.0));
        }
        let mat = graph_from_edges(n, &edges);
        let (tree, block_tree, permuted) = build_all(&mat, 1);

        let admissible: Vec<BlockId> = block_tree
            .bfs_order()
            .into_iter()
            .filter(|&id| block_tree.node(id).kind == BlockKind::Admissible)
            .collect();
        assert!(!admissible.is_empty());
        for id in admissible {
            let node = block_tree.node(id);
            for &i in &tree.node(node.row_cluster).data {
                for &j in &tree.node(node.col_cluster).data {
                    let entry = permuted.get(i, j).copied().unwrap_or(0.0);
                    assert_eq!(entry, 0.0, "coupled entry inside admissible block");
                }
            }
        }
    }

    #[test]
    fn records_hold_permuted_ranges() {
        let mat = graph_from_edges(4, &[(0, 1, 3.0), (2, 3, 3.0)]);
        let (tree, block_tree, _) = build_all(&mat, 1);
        let records = block_tree.records(&tree);
        // 2 admissible cross-component blocks + 8 dense leaf pairs.
        assert_eq!(records.len(), 10);
        assert!(records.iter().all(|r| r.kind != BlockKind::Split));

        let admissible: Vec<&BlockRecord> = records
            .iter()
            .filter(|r| r.kind == BlockKind::Admissible)
            .collect();
        assert_eq!(admissible.len(), 2);
        for record in admissible {
            assert_eq!(record.rows.len(), 2);
            assert_eq!(record.cols.len(), 2);
            assert_ne!(record.rows, record.cols);
        }
    }
}
