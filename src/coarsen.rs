//! Graph coarsening by modified heavy-edge matching.
//!
//! Each round partitions the current graph's vertices into clusters of
//! one or two vertices, then contracts the clusters into a coarser
//! weighted graph. Matching order is controlled by two priority pools:
//! vertices left unmatched in the previous round get first pick, which
//! keeps the eventual cluster tree balanced. The driving loop
//! [`coarsen`] repeats until exactly two clusters remain and retains
//! every intermediate level for the connectivity queries made later by
//! the block-cluster classification.

use indexmap::IndexSet;
use sprs::TriMat;

use crate::error::{Error, Result};
use crate::CsrMatrix;

/// One weighted adjacency graph of the coarsening sequence. Immutable
/// once produced; the diagonal is a placeholder `1` after contraction.
pub struct AdjacencyGraph {
    mat: CsrMatrix,
}

impl AdjacencyGraph {
    pub fn new(mat: CsrMatrix) -> Self {
        debug_assert_eq!(mat.rows(), mat.cols());
        Self { mat }
    }

    pub fn vertices(&self) -> usize {
        self.mat.rows()
    }

    /// Weight of the edge between `i` and `j`, zero if absent.
    pub fn edge_weight(&self, i: usize, j: usize) -> f64 {
        self.mat.get(i, j).copied().unwrap_or(0.0)
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.mat
    }
}

/// Priority pools for the next round of matching. `group1` holds the
/// higher-priority cluster ids and is seeded with a singleton cluster
/// when one exists.
#[derive(Clone, Debug, Default)]
pub struct PriorityGroups {
    pub group1: Vec<usize>,
    pub group2: Vec<usize>,
}

/// One level of the coarsening sequence: the graph that was matched,
/// the clusters the matching produced (each 1 or 2 vertex ids, numbered
/// in creation order), and the pools handed to the next level.
pub struct CoarseningLevel {
    pub graph: AdjacencyGraph,
    pub clusters: Vec<Vec<usize>>,
    pub groups: PriorityGroups,
}

/// The full ordered coarsening sequence, finest level first. The last
/// level carries a 2x2 graph and a single sorted 2-member cluster.
pub struct Coarsening {
    pub levels: Vec<CoarseningLevel>,
}

impl Coarsening {
    /// Number of coarsening levels retained.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Members of cluster `id` at `level`.
    pub fn cluster(&self, level: usize, id: usize) -> &[usize] {
        &self.levels[level].clusters[id]
    }
}

/// Heaviest unmatched neighbor of `s` within `candidates`, by absolute
/// edge weight. Ties keep the last value seen with weight >= the running
/// maximum. Returns `None` when the best weight is exactly zero, which
/// makes `s` a singleton cluster.
fn heaviest_neighbor(
    graph: &AdjacencyGraph,
    s: usize,
    candidates: &IndexSet<usize>,
) -> Option<usize> {
    let mut best_weight = 0.0;
    let mut best = None;
    if let Some(row) = graph.matrix().outer_view(s) {
        for (t, weight) in row.iter() {
            if t == s || !candidates.contains(&t) {
                continue;
            }
            if weight.abs() >= best_weight {
                best_weight = weight.abs();
                best = Some(t);
            }
        }
    }
    if best_weight == 0.0 {
        None
    } else {
        best
    }
}

/// Priority matching over two vertex pools. Pool 1 drains first with the
/// union of both pools as candidates, then pool 2 drains against itself.
/// Every vertex ends up in exactly one cluster of size 1 or 2. If the
/// whole pass yields a single cluster its members are sorted ascending,
/// pinning down the final two-cluster level.
pub fn priority_match(graph: &AdjacencyGraph, pool1: &[usize], pool2: &[usize]) -> Vec<Vec<usize>> {
    let mut set1: IndexSet<usize> = pool1.iter().copied().collect();
    let mut set2: IndexSet<usize> = pool2.iter().copied().collect();
    let mut clusters: Vec<Vec<usize>> = Vec::with_capacity((set1.len() + set2.len()) / 2 + 1);

    while let Some(&s) = set1.get_index(0) {
        let candidates: IndexSet<usize> = set1.iter().chain(set2.iter()).copied().collect();
        match heaviest_neighbor(graph, s, &candidates) {
            None => {
                clusters.push(vec![s]);
                set1.shift_remove(&s);
            }
            Some(t) => {
                clusters.push(vec![s, t]);
                set1.shift_remove(&s);
                set1.shift_remove(&t);
                set2.shift_remove(&t);
            }
        }
    }

    while let Some(&s) = set2.get_index(0) {
        match heaviest_neighbor(graph, s, &set2) {
            None => {
                clusters.push(vec![s]);
                set2.shift_remove(&s);
            }
            Some(t) => {
                clusters.push(vec![s, t]);
                set2.shift_remove(&s);
                set2.shift_remove(&t);
            }
        }
    }

    if clusters.len() == 1 {
        clusters[0].sort_unstable();
    }
    clusters
}

/// Splits cluster ids `0..count` into the pools for the next round.
/// `group1` gets `ceil(count / 2)` ids, seeded with the first singleton
/// cluster when one exists; `group2` gets the remainder.
pub fn create_priority_groups(clusters: &[Vec<usize>]) -> PriorityGroups {
    let count = clusters.len();
    let group1_size = count / 2 + count % 2;
    let singleton = clusters.iter().position(|c| c.len() == 1);

    let mut group1 = Vec::with_capacity(group1_size);
    let mut group2 = Vec::with_capacity(count - group1_size);
    if let Some(id) = singleton {
        group1.push(id);
    }
    for id in 0..count {
        if Some(id) == singleton {
            continue;
        }
        if group1.len() < group1_size {
            group1.push(id);
        } else {
            group2.push(id);
        }
    }
    PriorityGroups { group1, group2 }
}

/// Contracts `clusters` of `graph` into a `count x count` graph.
/// Off-diagonal weight (i, j) is the sum of fine edge weights between
/// any member of cluster i and any member of cluster j; zero sums are
/// not stored. The diagonal is a placeholder self-weight of 1.
pub fn convert_to_coarser_graph(graph: &AdjacencyGraph, clusters: &[Vec<usize>]) -> AdjacencyGraph {
    let count = clusters.len();
    let mut coarse = TriMat::new((count, count));
    for (i, members_i) in clusters.iter().enumerate() {
        coarse.add_triplet(i, i, 1.0);
        for (j, members_j) in clusters.iter().enumerate() {
            if i == j {
                continue;
            }
            let weight: f64 = members_i
                .iter()
                .flat_map(|&u| members_j.iter().map(move |&v| graph.edge_weight(u, v)))
                .sum();
            if weight != 0.0 {
                coarse.add_triplet(i, j, weight);
            }
        }
    }
    AdjacencyGraph::new(coarse.to_csr())
}

/// Runs the full coarsening loop on `graph` and returns every level.
///
/// The first round's pools split `0..n` at the midpoint; later rounds
/// use the priority groups of the previous level. Cluster counts must
/// strictly decrease; two consecutive rounds without a reduction abort
/// with [`Error::CoarseningStalled`]. When two clusters remain they are
/// contracted into the final level, whose single cluster `[0, 1]` seeds
/// the cluster-tree root. The two remaining clusters are paired
/// unconditionally there: matching would refuse a zero-weight pair and
/// drop half the index set for disconnected inputs.
pub fn coarsen(graph: AdjacencyGraph) -> Result<Coarsening> {
    let n = graph.vertices();
    if n < 3 {
        return Err(Error::GraphTooSmall(n));
    }

    let half = n / 2 + n % 2;
    let pool1: Vec<usize> = (0..half).collect();
    let pool2: Vec<usize> = (half..n).collect();

    let clusters = priority_match(&graph, &pool1, &pool2);
    let groups = create_priority_groups(&clusters);
    trace!("matching round 0: {} -> {} clusters", n, clusters.len());
    let mut levels = vec![CoarseningLevel {
        graph,
        clusters,
        groups,
    }];

    let mut stalled = false;
    loop {
        let last = &levels[levels.len() - 1];
        let count = last.clusters.len();
        let coarse = convert_to_coarser_graph(&last.graph, &last.clusters);

        if count == 2 {
            // Final level: pair the two remaining clusters directly.
            let clusters = vec![vec![0, 1]];
            let groups = create_priority_groups(&clusters);
            levels.push(CoarseningLevel {
                graph: coarse,
                clusters,
                groups,
            });
            break;
        }

        let clusters = priority_match(&coarse, &last.groups.group1, &last.groups.group2);
        trace!(
            "matching round {}: {} -> {} clusters",
            levels.len(),
            count,
            clusters.len()
        );
        if clusters.len() >= count {
            if stalled {
                return Err(Error::CoarseningStalled { count });
            }
            stalled = true;
        } else {
            stalled = false;
        }
        let groups = create_priority_groups(&clusters);
        levels.push(CoarseningLevel {
            graph: coarse,
            clusters,
            groups,
        });
    }

    info!("coarsening finished after {} levels", levels.len());
    Ok(Coarsening { levels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn graph_from_edges(n: usize, edges: &[(usize, usize, f64)]) -> AdjacencyGraph {
        let mut coo = TriMat::new((n, n));
        for &(i, j, w) in edges {
            coo.add_triplet(i, j, w);
            coo.add_triplet(j, i, w);
        }
        AdjacencyGraph::new(coo.to_csr())
    }

    /// Chain 0-1-2-3 with a heavy middle edge: 1 grabs 2 first.
    #[test]
    fn matching_prefers_heaviest_edge() {
        let graph = graph_from_edges(4, &[(0, 1, 1.0), (1, 2, 5.0), (2, 3, 1.0)]);
        let clusters = priority_match(&graph, &[1, 0], &[2, 3]);
        assert_eq!(clusters, vec![vec![1, 2], vec![0], vec![3]]);
    }

    #[test]
    fn unmatched_vertex_becomes_singleton() {
        // Vertex 2 is isolated.
        let graph = graph_from_edges(3, &[(0, 1, 2.0)]);
        let clusters = priority_match(&graph, &[0, 1], &[2]);
        assert_eq!(clusters, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn tie_break_keeps_last_candidate() {
        // Both neighbors of 0 carry weight 2; the scan keeps the last.
        let graph = graph_from_edges(3, &[(0, 1, 2.0), (0, 2, 2.0)]);
        let clusters = priority_match(&graph, &[0], &[1, 2]);
        assert_eq!(clusters[0], vec![0, 2]);
    }

    #[test]
    fn groups_split_at_ceil_half_with_singleton_first() {
        let clusters = vec![vec![0, 1], vec![2, 3], vec![4], vec![5, 6], vec![7, 8]];
        let groups = create_priority_groups(&clusters);
        assert_eq!(groups.group1, vec![2, 0, 1]);
        assert_eq!(groups.group2, vec![3, 4]);
    }

    #[test]
    fn coarser_graph_sums_cross_weights() {
        let graph = graph_from_edges(4, &[(0, 1, 1.0), (0, 2, 2.0), (1, 3, 3.0), (2, 3, 1.0)]);
        let coarse = convert_to_coarser_graph(&graph, &[vec![0, 1], vec![2, 3]]);
        assert_eq!(coarse.vertices(), 2);
        assert_eq!(coarse.edge_weight(0, 0), 1.0);
        assert_eq!(coarse.edge_weight(1, 1), 1.0);
        // 0-2 (2.0) + 1-3 (3.0)
        assert_eq!(coarse.edge_weight(0, 1), 5.0);
        assert_eq!(coarse.edge_weight(1, 0), 5.0);
    }

    #[test]
    fn coarsening_reaches_two_clusters() {
        let graph = graph_from_edges(
            6,
            &[
                (0, 1, 4.0),
                (1, 2, 1.0),
                (2, 3, 4.0),
                (3, 4, 1.0),
                (4, 5, 4.0),
            ],
        );
        let coarsening = coarsen(graph).unwrap();
        let counts: Vec<usize> = coarsening
            .levels
            .iter()
            .map(|level| level.clusters.len())
            .collect();
        for pair in counts.windows(2) {
            assert!(pair[1] < pair[0], "cluster counts must shrink: {counts:?}");
        }
        let last = coarsening.levels.last().unwrap();
        assert_eq!(last.graph.vertices(), 2);
        assert_eq!(last.clusters, vec![vec![0, 1]]);
    }

    #[test]
    fn disconnected_components_coarsen_to_singletons() {
        let graph = graph_from_edges(4, &[(0, 1, 3.0), (2, 3, 3.0)]);
        let coarsening = coarsen(graph).unwrap();
        assert_eq!(coarsening.levels[0].clusters, vec![vec![0, 1], vec![2, 3]]);
        // The final level still pairs the two components.
        assert_eq!(coarsening.levels[1].clusters, vec![vec![0, 1]]);
        assert_eq!(coarsening.levels[1].graph.edge_weight(0, 1), 0.0);
    }

    #[test]
    fn tiny_graph_is_rejected() {
        let graph = graph_from_edges(2, &[(0, 1, 1.0)]);
        assert!(matches!(coarsen(graph), Err(Error::GraphTooSmall(2))));
    }
}
