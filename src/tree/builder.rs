use crate::engines::{NjAlgorithm, NodeRecords};
use crate::tree::promotion::promote_leaves;
use crate::tree::tree::{Tree, TreeNode, MAX_CHILDREN};
use crate::NodeId;

/// Turns the engine's node records into a linked [`Tree`].
pub struct TreeBuilder<'a> {
    records: &'a NodeRecords,
    ids: &'a [NodeId],
    classes: Option<&'a [f64]>,
    promote: bool,
}

impl<'a> TreeBuilder<'a> {
    /// `ids` are the original elements in matrix order.
    pub fn new(records: &'a NodeRecords, ids: &'a [NodeId]) -> Self {
        Self {
            records,
            ids,
            classes: None,
            promote: false,
        }
    }

    /// Per-element class values, parallel to `ids`.
    pub fn with_classes(mut self, classes: &'a [f64]) -> Self {
        self.classes = Some(classes);
        self
    }

    pub fn promote(mut self, promote: bool) -> Self {
        self.promote = promote;
        self
    }

    pub fn build(self, algorithm: NjAlgorithm) -> Tree {
        let mut tree = Tree::new(algorithm);

        for (pos, &id) in self.ids.iter().enumerate().rev() {
            let mut node = TreeNode::new(id, true);
            node.class = self.classes.and_then(|c| c.get(pos).copied());
            tree.add_node(node);
        }
        for record in self.records.values().filter(|r| !r.is_leaf()) {
            tree.add_node(TreeNode::new(record.id, false));
        }
        debug!(
            "Tree has {} elements and {} ancestors",
            self.ids.len(),
            tree.len() - self.ids.len()
        );

        // children always precede their ancestor, so levels settle in one pass
        let order: Vec<NodeId> = tree.nodes().iter().map(|n| n.id).collect();
        for id in order {
            let Some(record) = self.records.get(&id) else {
                continue;
            };
            let mut slots = Vec::with_capacity(record.children.len());
            let mut level = None;
            for (slot, (&child, &distance)) in record
                .children
                .iter()
                .zip(record.distances.iter())
                .enumerate()
            {
                if slot >= MAX_CHILDREN {
                    warn!("Node {} has more than {} children; dropping {}", id, MAX_CHILDREN, child);
                    continue;
                }
                let Some(c) = tree.node_mut(child) else {
                    warn!("Node {} refers to unknown child {}", id, child);
                    continue;
                };
                c.parent = Some(id);
                level = level.max(Some(c.level));
                slots.push((slot, child, distance));
            }
            if let Some(node) = tree.node_mut(id) {
                for (slot, child, distance) in slots {
                    node.set_child(slot, child, distance);
                }
                node.level = level.map_or(0, |l| l + 1);
            }
        }

        if self.promote {
            let promoted = promote_leaves(&mut tree);
            info!("Promoted {} leaves", promoted);
        }
        tree.generate_edges();
        tree
    }
}
