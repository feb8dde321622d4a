//! Binary cluster tree built from the coarsening sequence.
//!
//! Nodes live in an arena and reference each other by index; absent
//! children are `None`. The tree is built coarsest level first, then
//! reshaped in three passes: [`ClusterTree::map_index`] derives the
//! index permutation and renumbers nodes by level position,
//! [`ClusterTree::update_bt_idx`] freezes those positions as cluster
//! ids for connectivity queries, and [`ClusterTree::aggregate`] turns
//! every node's data into the contiguous permuted index range it
//! covers.

use std::collections::VecDeque;

use crate::coarsen::Coarsening;

pub type NodeId = usize;

/// Cluster-tree node. `data` starts as a single cluster id, becomes the
/// node's position within its level after [`ClusterTree::map_index`],
/// and ends as the ordered contiguous list of permuted indices the node
/// covers after [`ClusterTree::aggregate`]. `bt_idx` keeps the level
/// position so both numberings stay available.
#[derive(Debug, Clone)]
pub struct ClusterNode {
    pub data: Vec<usize>,
    pub level: usize,
    pub bt_idx: usize,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
}

pub struct ClusterTree {
    nodes: Vec<ClusterNode>,
    root: NodeId,
}

impl ClusterTree {
    /// Builds the tree top-down from the coarsening sequence.
    ///
    /// The root records cluster 0 of the final level. A node at level L
    /// expands the members of its recorded cluster, looked up in the
    /// coarsening level at depth `levels - 1 - L`: two members give two
    /// children, one member a single left child. Leaves sit at level
    /// `levels` and hold original vertex ids.
    pub fn from_coarsening(coarsening: &Coarsening) -> Self {
        let depth = coarsening.len();
        let mut nodes = vec![ClusterNode {
            data: vec![0],
            level: 0,
            bt_idx: 0,
            left: None,
            right: None,
        }];
        let root = 0;

        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            let level = nodes[id].level;
            if level == depth {
                continue;
            }
            let cluster_id = nodes[id].data[0];
            let members = coarsening.cluster(depth - 1 - level, cluster_id).to_vec();

            let left = push_node(&mut nodes, members[0], level + 1);
            nodes[id].left = Some(left);
            queue.push_back(left);
            if members.len() == 2 {
                let right = push_node(&mut nodes, members[1], level + 1);
                nodes[id].right = Some(right);
                queue.push_back(right);
            }
        }

        debug!("cluster tree built: {} nodes", nodes.len());
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &ClusterNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaf count, which equals the size of the index set.
    pub fn leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.left.is_none() && n.right.is_none())
            .count()
    }

    /// Node ids in breadth-first order, which within a level is
    /// left-to-right order.
    pub fn bfs_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(self.root);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(left) = self.nodes[id].left {
                queue.push_back(left);
            }
            if let Some(right) = self.nodes[id].right {
                queue.push_back(right);
            }
        }
        order
    }

    /// Collects the leaves left-to-right into the index permutation
    /// (permuted position -> original vertex id), then rewrites every
    /// node's data to its position within its level, 0-based and reset
    /// per level. The positions are the template the later aggregation
    /// pass concatenates, decoupled from original vertex ids.
    pub fn map_index(&mut self) -> Vec<usize> {
        let order = self.bfs_order();
        let permutation: Vec<usize> = order
            .iter()
            .filter(|&&id| {
                let node = &self.nodes[id];
                node.left.is_none() && node.right.is_none()
            })
            .map(|&id| self.nodes[id].data[0])
            .collect();

        let mut current_level = 0;
        let mut position = 0;
        for &id in &order {
            if self.nodes[id].level != current_level {
                current_level = self.nodes[id].level;
                position = 0;
            }
            self.nodes[id].data = vec![position];
            position += 1;
        }

        info!("index mapping derived for {} indices", permutation.len());
        permutation
    }

    /// Freezes each node's level position as its `bt_idx`, the cluster
    /// id used to query the rebuilt level graphs during admissibility
    /// testing. Must run after [`Self::map_index`] and before
    /// [`Self::aggregate`].
    pub fn update_bt_idx(&mut self) {
        for node in &mut self.nodes {
            node.bt_idx = node.data[0];
        }
    }

    /// Bottom-up aggregation in reverse breadth-first order: every
    /// internal node's data becomes the concatenation of its left then
    /// right child's data, a single child passing through unchanged.
    /// Leaves keep their position value, so afterwards every node holds
    /// the contiguous range of permuted indices it covers.
    pub fn aggregate(&mut self) {
        let order = self.bfs_order();
        for &id in order.iter().rev() {
            let (left, right) = (self.nodes[id].left, self.nodes[id].right);
            if left.is_none() && right.is_none() {
                continue;
            }
            let mut data = Vec::new();
            if let Some(child) = left {
                data.extend_from_slice(&self.nodes[child].data);
            }
            if let Some(child) = right {
                data.extend_from_slice(&self.nodes[child].data);
            }
            self.nodes[id].data = data;
        }
    }

    /// Node ids per level, in left-to-right order.
    pub fn levels(&self) -> Vec<Vec<NodeId>> {
        let mut levels: Vec<Vec<NodeId>> = Vec::new();
        for id in self.bfs_order() {
            let level = self.nodes[id].level;
            if level == levels.len() {
                levels.push(Vec::new());
            }
            levels[level].push(id);
        }
        levels
    }
}

fn push_node(nodes: &mut Vec<ClusterNode>, value: usize, level: usize) -> NodeId {
    let id = nodes.len();
    nodes.push(ClusterNode {
        data: vec![value],
        level,
        bt_idx: 0,
        left: None,
        right: None,
    });
    id
}
