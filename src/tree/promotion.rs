//! Collapses comb patterns: an ancestor `A` whose children are an unresolved
//! ancestor `B` and a plain element `C`. `A` and `B` are removed, `B`'s children
//! hang off `C`, and `C` takes `A`'s place.

use crate::tree::tree::Tree;
use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Comb {
    a: NodeId,
    b: NodeId,
    c: NodeId,
}

/// Apply every promotion the tree admits and return how many were made.
/// A tree returned by this function has no comb left, so a second call is a no-op.
pub fn promote_leaves(tree: &mut Tree) -> usize {
    let mut promotions = 0;
    while let Some(comb) = find_comb(tree) {
        debug!("Promoting {} over {} and {}", comb.c, comb.a, comb.b);
        collapse(tree, comb);
        promotions += 1;
    }
    promotions
}

/// First match in node order; the scan starts over after every collapse.
fn find_comb(tree: &Tree) -> Option<Comb> {
    let root = tree.root_id();
    tree.nodes().iter().find_map(|b| {
        if b.valid || Some(b.id) == root || !b.has_children() {
            return None;
        }
        let a = tree.node(b.parent?)?;
        if a.valid {
            return None;
        }
        let c = a
            .child_ids()
            .into_iter()
            .filter(|&id| id != b.id)
            .find(|&id| tree.node(id).is_some_and(|n| n.valid && !n.has_children()))?;
        Some(Comb { a: a.id, b: b.id, c })
    })
}

fn collapse(tree: &mut Tree, Comb { a, b, c }: Comb) {
    let (Some(a_node), Some(b_node)) = (tree.node(a).cloned(), tree.node(b).cloned()) else {
        return;
    };
    let d_ab = a_node.child_distance(b).unwrap_or(0.0);
    let d_ac = a_node.child_distance(c).unwrap_or(0.0);

    // B's children move onto C
    for link in b_node.children.iter().flatten() {
        if !tree.contains(link.id) {
            warn!("Node {} refers to unknown child {}", b, link.id);
            continue;
        }
        let distance = link.distance + d_ab / 2.0 + d_ac / 4.0;
        let Some(slot) = tree.node(c).and_then(|n| n.first_free_slot()) else {
            warn!("Node {} has no free slot for {}", c, link.id);
            continue;
        };
        if let Some(cn) = tree.node_mut(c) {
            cn.set_child(slot, link.id, distance);
        }
        if let Some(child) = tree.node_mut(link.id) {
            child.parent = Some(c);
        }
    }

    if let Some(cn) = tree.node_mut(c) {
        cn.parent = a_node.parent;
        cn.level = a_node.level;
    }

    match a_node.parent {
        Some(g) => {
            let Some(g_node) = tree.node_mut(g) else {
                warn!("Node {} points at parent {} which is not in the tree", a, g);
                return finish(tree, a, b);
            };
            match g_node.child_index(a) {
                Some(slot) => {
                    let d_ga = g_node.children[slot].map_or(0.0, |l| l.distance);
                    g_node.set_child(slot, c, d_ga + d_ab / 2.0 + d_ac / 2.0);
                }
                None => warn!("Parent {} has no slot for child {}", g, a),
            }
        }
        None => {
            // A was the root: its remaining child takes over, with C below it
            let rest = a_node
                .child_ids()
                .into_iter()
                .find(|&id| id != b && id != c && tree.contains(id));
            if let Some(x) = rest {
                let d_ax = a_node.child_distance(x).unwrap_or(0.0);
                if let Some(xn) = tree.node_mut(x) {
                    match xn.first_free_slot() {
                        Some(slot) => xn.set_child(slot, c, d_ax + d_ab / 2.0 + d_ac / 2.0),
                        None => warn!("Node {} has no free slot for {}", x, c),
                    }
                    xn.level = a_node.level + 1;
                    xn.parent = None;
                }
                if let Some(cn) = tree.node_mut(c) {
                    cn.parent = Some(x);
                }
            }
        }
    }
    finish(tree, a, b);
}

fn finish(tree: &mut Tree, a: NodeId, b: NodeId) {
    tree.remove_node(a);
    tree.remove_node(b);
}
