use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{fmt_f, IoFmt};
use crate::tree::tree::Tree;
use crate::NodeId;

enum Step {
    Open(NodeId, Option<f64>),
    Close(NodeId, Option<f64>),
    Comma,
}

/// Quote a label when Newick punctuation or whitespace would break it.
fn newick_label(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || "()[]':;,".contains(c));
    if needs_quotes {
        format!("'{}'", s.replace('\'', "''"))
    } else {
        s.to_string()
    }
}

fn write_name<W: FmtWrite>(
    w: &mut W,
    tree: &Tree,
    labels: &HashMap<NodeId, String>,
    id: NodeId,
    distance: Option<f64>,
) -> Result<()> {
    // only original elements are named
    if tree.node(id).is_some_and(|n| n.valid) {
        match labels.get(&id) {
            Some(label) => write!(w, "{}", newick_label(label))?,
            None => write!(w, "{}", id)?,
        }
    }
    if let Some(d) = distance {
        write!(w, ":{}", fmt_f(d))?;
    }
    Ok(())
}

/// Newick with branch lengths, from the root down in child-slot order.
pub fn write_newick<W: FmtWrite>(
    mut w: W,
    tree: &Tree,
    labels: &HashMap<NodeId, String>,
) -> Result<()> {
    let mut stack: Vec<Step> = tree
        .root_id()
        .map(|r| vec![Step::Open(r, None)])
        .unwrap_or_default();

    while let Some(step) = stack.pop() {
        match step {
            Step::Comma => write!(w, ",")?,
            Step::Close(id, distance) => {
                write!(w, ")")?;
                write_name(&mut w, tree, labels, id, distance)?;
            }
            Step::Open(id, distance) => {
                let Some(node) = tree.node(id) else {
                    continue;
                };
                let children: Vec<(NodeId, f64)> = node
                    .children
                    .iter()
                    .flatten()
                    .filter(|l| tree.contains(l.id))
                    .map(|l| (l.id, l.distance))
                    .collect();
                if children.is_empty() {
                    write_name(&mut w, tree, labels, id, distance)?;
                    continue;
                }
                write!(w, "(")?;
                stack.push(Step::Close(id, distance));
                for (k, &(cid, d)) in children.iter().enumerate().rev() {
                    stack.push(Step::Open(cid, Some(d)));
                    if k > 0 {
                        stack.push(Step::Comma);
                    }
                }
            }
        }
    }
    write!(w, ";")?;
    Ok(())
}

pub fn tree_to_newick(tree: &Tree, labels: &HashMap<NodeId, String>) -> Result<String> {
    let mut s = String::new();
    write_newick(&mut s, tree, labels)?;
    Ok(s)
}

pub fn write_newick_to_path<P: AsRef<Path>>(
    path: P,
    tree: &Tree,
    labels: &HashMap<NodeId, String>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create Newick file at {}", path.display()))?;
    let mut buf = BufWriter::new(file);
    write_newick(IoFmt(&mut buf), tree, labels)
        .with_context(|| format!("failed while writing Newick to {}", path.display()))?;
    writeln!(buf)?;
    buf.flush()?;
    Ok(())
}
