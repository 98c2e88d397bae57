use std::collections::HashMap;
use std::fmt::{self, Write as FmtWrite};
use std::io::Write;

use crate::matrix::distance_matrix::DistanceMatrix;
use crate::NodeId;

pub mod edges_writer;
pub mod newick_writer;
pub mod nexus_writer;
pub mod xml_writer;

/* ---------- helpers ---------- */

/// Shortest round-trip decimal with at least one fractional digit (`2.0`, `0.25`).
pub fn fmt_decimal(x: f64) -> String {
    let s = x.to_string();
    if x.is_finite() && !s.contains('.') {
        s + ".0"
    } else {
        s
    }
}

/// Fixed precision with trailing zeros trimmed.
fn trim_float(x: f64, digits: usize) -> String {
    let mut s = format!("{:.1$}", x, digits);
    while s.ends_with('0') && s.contains('.') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s.is_empty() || s == "-0" {
        s = "0".to_string();
    }
    s
}

/// Up to 7 decimals, which is plenty for tree and distance dumps.
fn fmt_f(x: f64) -> String {
    trim_float(x, 7)
}

fn escape_label(s: &str) -> String {
    s.replace('\'', "''")
}

/// Element labels keyed by id, for writers that name leaves.
pub fn labels_by_id(matrix: &DistanceMatrix) -> HashMap<NodeId, String> {
    matrix
        .ids()
        .iter()
        .copied()
        .zip(matrix.labels().iter().cloned())
        .collect()
}

/// Adapter: let `fmt::Write` target any `io::Write`.
struct IoFmt<W: Write>(W);
impl<W: Write> FmtWrite for IoFmt<W> {
    fn write_str(&mut self, s: &str) -> Result<(), fmt::Error> {
        self.0.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
