//! XML tree dump:
//!
//! ```text
//! <tree>
//! <node label="5">
//! <node label="4" parentDistance="2.0">
//! <leaf label="1" parentDistance="2.0"/>
//! ...
//! </node>
//! </tree>
//! ```
//!
//! The root carries no `parentDistance`. There is no newline after `</tree>`.

use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::output::{fmt_decimal, IoFmt};
use crate::tree::tree::Tree;
use crate::NodeId;

enum Step {
    Open(NodeId, Option<f64>),
    Close,
}

pub fn write_xml<W: FmtWrite>(mut w: W, tree: &Tree) -> Result<()> {
    writeln!(w, "<tree>")?;
    let mut stack: Vec<Step> = tree
        .root_id()
        .map(|r| vec![Step::Open(r, None)])
        .unwrap_or_default();

    while let Some(step) = stack.pop() {
        let (id, distance) = match step {
            Step::Close => {
                writeln!(w, "</node>")?;
                continue;
            }
            Step::Open(id, distance) => (id, distance),
        };
        let Some(node) = tree.node(id) else {
            continue;
        };
        let attrs = match distance {
            Some(d) => format!("label=\"{}\" parentDistance=\"{}\"", id, fmt_decimal(d)),
            None => format!("label=\"{}\"", id),
        };
        if !node.has_children() {
            writeln!(w, "<leaf {}/>", attrs)?;
            continue;
        }
        writeln!(w, "<node {}>", attrs)?;
        stack.push(Step::Close);
        for link in node.children.iter().flatten().rev() {
            if tree.contains(link.id) {
                stack.push(Step::Open(link.id, Some(link.distance)));
            } else {
                warn!("Node {} refers to unknown child {}", id, link.id);
            }
        }
    }
    write!(w, "</tree>")?;
    Ok(())
}

pub fn tree_to_xml(tree: &Tree) -> Result<String> {
    let mut s = String::new();
    write_xml(&mut s, tree)?;
    Ok(s)
}

pub fn write_xml_to_path<P: AsRef<Path>>(path: P, tree: &Tree) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create XML file at {}", path.display()))?;
    let mut buf = BufWriter::new(file);
    write_xml(IoFmt(&mut buf), tree)
        .with_context(|| format!("failed while writing XML to {}", path.display()))?;
    buf.flush()?;
    Ok(())
}
