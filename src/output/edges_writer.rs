use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::tree::tree::Tree;

/// `source,target,weight` rows, one per tree edge.
pub fn write_edges<W: Write>(sink: W, tree: &Tree) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(sink);
    for edge in tree.edges() {
        wtr.serialize(edge)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_edges_to_path<P: AsRef<Path>>(path: P, tree: &Tree) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create edge list at {}", path.display()))?;
    write_edges(file, tree).with_context(|| format!("failed while writing {}", path.display()))
}
