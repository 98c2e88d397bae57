use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::matrix::distance_matrix::DistanceMatrix;
use crate::output::newick_writer::write_newick;
use crate::output::{escape_label, fmt_f, IoFmt};
use crate::tree::tree::Tree;
use crate::NodeId;

/// High-level: write a complete NEXUS file directly to a file path.
pub fn write_nexus_to_path<P: AsRef<Path>>(
    path: P,
    matrix: &DistanceMatrix,
    tree: &Tree,
    labels: &HashMap<NodeId, String>,
) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("failed to create NEXUS file at {}", path.display()))?;
    let mut buf = BufWriter::new(file);
    write_nexus_to_writer(&mut buf, matrix, tree, labels)
        .with_context(|| format!("failed while writing NEXUS to {}", path.display()))?;
    buf.flush()?;
    Ok(())
}

/// Lower-level: stream the Taxa, Distances and Trees blocks to any `io::Write`.
pub fn write_nexus_to_writer<W: Write>(
    mut sink: W,
    matrix: &DistanceMatrix,
    tree: &Tree,
    labels: &HashMap<NodeId, String>,
) -> Result<()> {
    let mut out = IoFmt(&mut sink);
    debug!(
        "Writing NEXUS with {} taxa and {} tree nodes",
        matrix.len(),
        tree.len()
    );
    write_header(&mut out)?;
    write_taxa_block(&mut out, matrix.labels())?;
    write_distances_block(&mut out, matrix)?;
    write_trees_block(&mut out, tree, labels)?;
    Ok(())
}

pub fn write_header<W: FmtWrite>(mut w: W) -> Result<()> {
    writeln!(w, "#nexus\n")?;
    Ok(())
}

pub fn write_taxa_block<W: FmtWrite>(mut w: W, taxa_labels: &[String]) -> Result<()> {
    writeln!(w, "BEGIN Taxa;")?;
    writeln!(w, "DIMENSIONS ntax={};", taxa_labels.len())?;
    writeln!(w, "TAXLABELS")?;
    for (i, name) in taxa_labels.iter().enumerate() {
        writeln!(w, "[{}] '{}'", i + 1, escape_label(name))?;
    }
    writeln!(w, ";")?;
    writeln!(w, "END; [Taxa]\n")?;
    Ok(())
}

/// Lower triangle without the diagonal, matching the on-disk matrix layout.
pub fn write_distances_block<W: FmtWrite>(mut w: W, matrix: &DistanceMatrix) -> Result<()> {
    writeln!(w, "BEGIN Distances;")?;
    writeln!(w, "DIMENSIONS ntax={};", matrix.len())?;
    writeln!(w, "FORMAT labels=no nodiagonal triangle=lower;")?;
    writeln!(w, "MATRIX")?;
    for row in matrix.rows().iter().skip(1) {
        let cells: Vec<String> = row.iter().map(|&v| fmt_f(v)).collect();
        writeln!(w, "{}", cells.join(" "))?;
    }
    writeln!(w, ";")?;
    writeln!(w, "END; [Distances]\n")?;
    Ok(())
}

pub fn write_trees_block<W: FmtWrite>(
    mut w: W,
    tree: &Tree,
    labels: &HashMap<NodeId, String>,
) -> Result<()> {
    writeln!(w, "BEGIN Trees;")?;
    writeln!(w, "[{}]", tree.algorithm())?;
    write!(w, "TREE nj_tree = ")?;
    write_newick(&mut w, tree, labels)?;
    writeln!(w)?;
    writeln!(w, "END; [Trees]")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{join, test_support::*, NjAlgorithm};
    use crate::output::labels_by_id;
    use crate::tree::builder::TreeBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_document() {
        let mut m = saitou_nei();
        m.set_labels(vec!["A".into(), "B".into(), "C".into(), "D'x".into()])
            .unwrap();
        let records = join(&m, NjAlgorithm::Fast);
        let tree = TreeBuilder::new(&records, m.ids()).build(NjAlgorithm::Fast);

        let mut buf = Vec::new();
        write_nexus_to_writer(&mut buf, &m, &tree, &labels_by_id(&m)).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let expected = "#nexus\n\n\
BEGIN Taxa;\n\
DIMENSIONS ntax=4;\n\
TAXLABELS\n\
[1] 'A'\n\
[2] 'B'\n\
[3] 'C'\n\
[4] 'D''x'\n\
;\n\
END; [Taxa]\n\n\
BEGIN Distances;\n\
DIMENSIONS ntax=4;\n\
FORMAT labels=no nodiagonal triangle=lower;\n\
MATRIX\n\
7\n\
8 5\n\
11 8 5\n\
;\n\
END; [Distances]\n\n\
BEGIN Trees;\n\
[Fast Neighbor-Joining]\n\
TREE nj_tree = ((B:2,A:5):2,'D''x':4,C:1);\n\
END; [Trees]\n";
        assert_eq!(text, expected);
    }
}
