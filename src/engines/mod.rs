use std::collections::BTreeMap;
use std::fmt;

use clap::ValueEnum;
use rayon::prelude::*;
use serde::Serialize;

use crate::matrix::distance_matrix::DistanceMatrix;
use crate::NodeId;

pub mod fast;
pub mod original;
pub mod rapid;

/// Which closest-pair search drives the agglomeration.
#[derive(ValueEnum, Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NjAlgorithm {
    Original,
    Fast,
    Rapid,
}

impl NjAlgorithm {
    pub fn as_str(&self) -> &str {
        match self {
            NjAlgorithm::Original => "original",
            NjAlgorithm::Fast => "fast",
            NjAlgorithm::Rapid => "rapid",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Fast" | "fast" | "fnj" => NjAlgorithm::Fast,
            "Rapid" | "rapid" | "rnj" => NjAlgorithm::Rapid,
            _ => NjAlgorithm::Original,
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            NjAlgorithm::Original => "Original Neighbor-Joining",
            NjAlgorithm::Fast => "Fast Neighbor-Joining",
            NjAlgorithm::Rapid => "Rapid Neighbor-Joining",
        }
    }
}

impl Default for NjAlgorithm {
    fn default() -> Self {
        NjAlgorithm::Original
    }
}

impl fmt::Display for NjAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_name())
    }
}

/// One node of the clustering result: an original element (no children) or a
/// synthesized ancestor with its children and the branch length to each.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub children: Vec<NodeId>,
    pub distances: Vec<f64>,
}

impl NodeRecord {
    pub fn leaf(id: NodeId) -> Self {
        Self {
            id,
            children: Vec::new(),
            distances: Vec::new(),
        }
    }

    pub fn ancestor(id: NodeId, children: Vec<NodeId>, distances: Vec<f64>) -> Self {
        debug_assert_eq!(children.len(), distances.len());
        Self {
            id,
            children,
            distances,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

pub type NodeRecords = BTreeMap<NodeId, NodeRecord>;

/// Run the selected engine over a copy of `matrix`.
///
/// The matrix must hold at least 3 elements with finite distances; see
/// [`DistanceMatrix::validate_for_nj`].
pub fn join(matrix: &DistanceMatrix, algorithm: NjAlgorithm) -> NodeRecords {
    info!("Using {} ({} elements)", algorithm, matrix.len());
    match algorithm {
        NjAlgorithm::Original => original::OriginalNj::new(matrix).run(),
        NjAlgorithm::Fast => fast::FastNj::new(matrix).run(),
        NjAlgorithm::Rapid => rapid::RapidNj::new(matrix).run(),
    }
}

/// A childless record for every original element.
pub(crate) fn leaf_records(ids: &[NodeId]) -> NodeRecords {
    ids.iter().map(|&id| (id, NodeRecord::leaf(id))).collect()
}

/// First id free for synthesized ancestors.
pub(crate) fn first_ancestor_id(ids: &[NodeId]) -> NodeId {
    ids.iter().copied().max().map_or(0, |m| m + 1)
}

/// Total distance from every element to all others, one row per task.
pub(crate) fn row_sums(rows: &[Vec<f64>]) -> Vec<f64> {
    let n = rows.len();
    (0..n)
        .into_par_iter()
        .map(|i| rows[i].iter().sum::<f64>() + rows[i + 1..].iter().map(|r| r[i]).sum::<f64>())
        .collect()
}

/// Branch lengths of the final three-way join.
pub(crate) fn three_point(d01: f64, d02: f64, d12: f64) -> [f64; 3] {
    [
        (d01 + d02 - d12) / 2.0,
        (d01 + d12 - d02) / 2.0,
        (d02 + d12 - d01) / 2.0,
    ]
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    pub fn saitou_nei() -> DistanceMatrix {
        DistanceMatrix::from_lower_triangle(&[
            vec![0.0],
            vec![7.0, 0.0],
            vec![8.0, 5.0, 0.0],
            vec![11.0, 8.0, 5.0, 0.0],
        ])
        .unwrap()
    }

    /// Tree metric of a random binary tree: each new leaf is hung off the middle of
    /// a randomly chosen edge, and distances are path sums of positive lengths.
    pub fn additive_matrix(n: usize, seed: u64) -> DistanceMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        // adjacency as (a, b, length); leaves are 0..n, internal nodes from n up
        let mut edges: Vec<(usize, usize, f64)> = vec![(0, 1, rng.gen_range(0.5..3.0))];
        let mut next_internal = n;
        for leaf in 2..n {
            let e = rng.gen_range(0..edges.len());
            let (a, b, len) = edges.swap_remove(e);
            let cut = rng.gen_range(0.2..0.8) * len;
            let mid = next_internal;
            next_internal += 1;
            edges.push((a, mid, cut));
            edges.push((mid, b, len - cut));
            edges.push((mid, leaf, rng.gen_range(0.5..3.0)));
        }

        let total = next_internal;
        let mut adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); total];
        for &(a, b, w) in &edges {
            adj[a].push((b, w));
            adj[b].push((a, w));
        }

        let mut m = DistanceMatrix::new(n);
        for src in 0..n {
            let mut dist = vec![f64::NAN; total];
            dist[src] = 0.0;
            let mut stack = vec![src];
            while let Some(u) = stack.pop() {
                for &(v, w) in &adj[u] {
                    if dist[v].is_nan() {
                        dist[v] = dist[u] + w;
                        stack.push(v);
                    }
                }
            }
            for dst in 0..src {
                m.set_distance(src, dst, dist[dst]).unwrap();
            }
        }
        m
    }

    /// Structural invariants every engine must satisfy.
    pub fn assert_well_formed(records: &NodeRecords, n: usize) {
        assert_eq!(records.len(), 2 * n - 2, "n leaves + n-2 ancestors");
        let leaves = records.values().filter(|r| r.is_leaf()).count();
        assert_eq!(leaves, n);

        let root = records.values().next_back().unwrap();
        assert_eq!(root.children.len(), 3);
        for r in records.values().filter(|r| !r.is_leaf() && r.id != root.id) {
            assert_eq!(r.children.len(), 2);
        }

        let mut seen = std::collections::HashSet::new();
        for r in records.values() {
            assert_eq!(r.children.len(), r.distances.len());
            for c in &r.children {
                assert!(records.contains_key(c));
                assert!(seen.insert(*c), "node {} has two parents", c);
                assert!(*c < r.id);
            }
        }
        assert_eq!(seen.len(), records.len() - 1);
    }

    pub fn total_length(records: &NodeRecords) -> f64 {
        records.values().flat_map(|r| r.distances.iter()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn algorithm_names() {
        assert_eq!(NjAlgorithm::from_str("rapid"), NjAlgorithm::Rapid);
        assert_eq!(NjAlgorithm::from_str("Fast"), NjAlgorithm::Fast);
        assert_eq!(NjAlgorithm::from_str("whatever"), NjAlgorithm::Original);
        assert_eq!(NjAlgorithm::Rapid.to_string(), "Rapid Neighbor-Joining");
        assert_eq!(NjAlgorithm::default().as_str(), "original");
    }

    #[test]
    fn row_sums_cover_both_halves() {
        let m = saitou_nei();
        assert_eq!(row_sums(m.rows()), vec![26.0, 20.0, 18.0, 24.0]);
    }

    #[test]
    fn three_point_recovers_star() {
        assert_eq!(three_point(3.0, 4.0, 5.0), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn variants_agree_on_total_length_for_additive_input() {
        for seed in 0..5 {
            let m = additive_matrix(12, seed);
            let lengths: Vec<f64> = [NjAlgorithm::Original, NjAlgorithm::Fast, NjAlgorithm::Rapid]
                .iter()
                .map(|&a| total_length(&join(&m, a)))
                .collect();
            assert!((lengths[0] - lengths[1]).abs() < 1e-9, "{:?}", lengths);
            assert!((lengths[0] - lengths[2]).abs() < 1e-9, "{:?}", lengths);
        }
    }

    #[test]
    fn join_leaves_input_untouched() {
        let m = saitou_nei();
        let before = m.clone();
        let _ = join(&m, NjAlgorithm::Rapid);
        assert_eq!(m, before);
    }
}
