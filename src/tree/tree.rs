use std::collections::{HashMap, HashSet};

use fixedbitset::FixedBitSet;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use crate::engines::NjAlgorithm;
use crate::error::{NjError, NjResult};
use crate::NodeId;

/// Weight given to an edge whose parent has no slot for the child.
pub const MISSING_EDGE_DISTANCE: f64 = 1000.0;

/// Children per node: two for every ancestor, three for the unrooted centre.
pub const MAX_CHILDREN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChildLink {
    pub id: NodeId,
    pub distance: f64,
}

/// A node of the built tree. `valid` marks original elements; synthesized
/// ancestors start out invalid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub valid: bool,
    pub level: usize,
    pub parent: Option<NodeId>,
    pub children: [Option<ChildLink>; MAX_CHILDREN],
    pub class: Option<f64>,
}

impl TreeNode {
    pub fn new(id: NodeId, valid: bool) -> Self {
        Self {
            id,
            valid,
            level: 0,
            parent: None,
            children: [None; MAX_CHILDREN],
            class: None,
        }
    }

    pub fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    pub fn num_children(&self) -> usize {
        self.children.iter().flatten().count()
    }

    pub fn child_ids(&self) -> Vec<NodeId> {
        self.children.iter().flatten().map(|c| c.id).collect()
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        self.children
            .iter()
            .position(|c| c.is_some_and(|c| c.id == id))
    }

    pub fn child_distance(&self, id: NodeId) -> Option<f64> {
        self.children
            .iter()
            .flatten()
            .find(|c| c.id == id)
            .map(|c| c.distance)
    }

    pub fn set_child(&mut self, slot: usize, id: NodeId, distance: f64) {
        self.children[slot] = Some(ChildLink { id, distance });
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        self.children.iter().position(Option::is_none)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
}

/// Nodes in insertion order with an id lookup, plus the derived edge list.
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    algorithm: NjAlgorithm,
    nodes: Vec<TreeNode>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
}

impl Tree {
    /* ---------------- ctor / nodes ---------------- */

    pub fn new(algorithm: NjAlgorithm) -> Self {
        Self {
            algorithm,
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn algorithm(&self) -> NjAlgorithm {
        self.algorithm
    }

    /// Append a node. A node with an id already present replaces the old one.
    pub fn add_node(&mut self, node: TreeNode) {
        match self.index.get(&node.id) {
            Some(&pos) => self.nodes[pos] = node,
            None => {
                self.index.insert(node.id, self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.index.get(&id).map(|&p| &self.nodes[p])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        match self.index.get(&id) {
            Some(&p) => Some(&mut self.nodes[p]),
            None => None,
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop a node. Links other nodes hold to it are left as they are.
    pub fn remove_node(&mut self, id: NodeId) -> Option<TreeNode> {
        let pos = self.index.remove(&id)?;
        let node = self.nodes.remove(pos);
        for (p, n) in self.nodes.iter().enumerate().skip(pos) {
            self.index.insert(n.id, p);
        }
        Some(node)
    }

    pub fn number_of_valid_nodes(&self) -> usize {
        self.nodes.iter().filter(|n| n.valid).count()
    }

    pub fn max_level(&self) -> usize {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }

    /// The root is the last node holding the highest level.
    pub fn root_id(&self) -> Option<NodeId> {
        let mut root: Option<&TreeNode> = None;
        for n in &self.nodes {
            if root.map_or(true, |r| n.level >= r.level) {
                root = Some(n);
            }
        }
        root.map(|n| n.id)
    }

    /* ---------------- edges ---------------- */

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Rebuild the edge list from parent links, one edge per undirected pair.
    pub fn generate_edges(&mut self) {
        let mut seen: HashSet<(NodeId, NodeId)> = HashSet::new();
        let mut edges = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let Some(pid) = node.parent else {
                continue;
            };
            let Some(parent) = self.node(pid) else {
                warn!("Node {} points at parent {} which is not in the tree", node.id, pid);
                continue;
            };
            let weight = parent.child_distance(node.id).unwrap_or_else(|| {
                warn!(
                    "Parent {} has no slot for child {}; using distance {}",
                    pid, node.id, MISSING_EDGE_DISTANCE
                );
                MISSING_EDGE_DISTANCE
            });
            if seen.insert((pid.min(node.id), pid.max(node.id))) {
                edges.push(Edge {
                    source: pid,
                    target: node.id,
                    weight,
                });
            }
        }
        self.edges = edges;
    }

    /* ---------------- queries ---------------- */

    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| !n.has_children())
            .map(|n| n.id)
            .collect()
    }

    pub fn total_branch_length(&self) -> f64 {
        self.edges.iter().map(|e| e.weight).sum()
    }

    /// Cumulative distance from `id` to each of its ancestors (itself at 0).
    fn ancestors_with_distance(&self, id: NodeId) -> HashMap<NodeId, f64> {
        let mut out = HashMap::new();
        let mut cur = id;
        let mut acc = 0.0;
        out.insert(cur, acc);
        for _ in 0..self.nodes.len() {
            let Some(pid) = self.node(cur).and_then(|n| n.parent) else {
                break;
            };
            let Some(d) = self.node(pid).and_then(|p| p.child_distance(cur)) else {
                break;
            };
            acc += d;
            cur = pid;
            if out.insert(cur, acc).is_some() {
                break;
            }
        }
        out
    }

    /// Sum of branch lengths along the path joining `a` and `b`.
    pub fn path_distance(&self, a: NodeId, b: NodeId) -> Option<f64> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let up_a = self.ancestors_with_distance(a);
        let mut cur = b;
        let mut acc = 0.0;
        for _ in 0..=self.nodes.len() {
            if let Some(d) = up_a.get(&cur) {
                return Some(acc + d);
            }
            let pid = self.node(cur)?.parent?;
            acc += self.node(pid)?.child_distance(cur)?;
            cur = pid;
        }
        None
    }

    /// Every node is reached from the root exactly once through child links, and
    /// each child points back at the node that holds it.
    pub fn check_structure(&self) -> NjResult<()> {
        let root = self
            .root_id()
            .ok_or_else(|| NjError::structure("tree has no nodes"))?;
        if let Some(p) = self.node(root).and_then(|n| n.parent) {
            return Err(NjError::structure(format!("root {} has parent {}", root, p)));
        }

        let mut visited = FixedBitSet::with_capacity(self.nodes.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let pos = self.index[&id];
            if visited.contains(pos) {
                return Err(NjError::structure(format!("node {} reached twice", id)));
            }
            visited.insert(pos);
            for child in self.nodes[pos].child_ids() {
                let c = self.node(child).ok_or_else(|| {
                    NjError::structure(format!("node {} lists missing child {}", id, child))
                })?;
                if c.parent != Some(id) {
                    return Err(NjError::structure(format!(
                        "child {} of {} has parent {:?}",
                        child, id, c.parent
                    )));
                }
                stack.push(child);
            }
        }

        if visited.count_ones(..) != self.nodes.len() {
            let missing: Vec<NodeId> = (0..self.nodes.len())
                .filter(|&p| !visited.contains(p))
                .map(|p| self.nodes[p].id)
                .collect();
            return Err(NjError::structure(format!(
                "nodes {:?} are not reachable from root {}",
                missing, root
            )));
        }
        Ok(())
    }

    /// Undirected petgraph view over the edge list.
    pub fn to_graph(&self) -> (UnGraph<NodeId, f64>, HashMap<NodeId, NodeIndex>) {
        let mut graph = UnGraph::<NodeId, f64>::with_capacity(self.nodes.len(), self.edges.len());
        let mut map = HashMap::with_capacity(self.nodes.len());
        for n in &self.nodes {
            map.insert(n.id, graph.add_node(n.id));
        }
        for e in &self.edges {
            if let (Some(&s), Some(&t)) = (map.get(&e.source), map.get(&e.target)) {
                graph.add_edge(s, t, e.weight);
            }
        }
        (graph, map)
    }

    /// The edge list connects every node with exactly `len - 1` edges.
    pub fn edges_span_tree(&self) -> bool {
        let (graph, _) = self.to_graph();
        graph.node_count() > 0
            && graph.edge_count() + 1 == graph.node_count()
            && connected_components(&graph) == 1
    }
}
