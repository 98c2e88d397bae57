//! Reading and writing the semicolon-delimited lower-triangle format:
//!
//! ```text
//! n
//! label_0;label_1;...;label_{n-1}
//! class_0;class_1;...;class_{n-1}
//! M[1][0]
//! M[2][0];M[2][1]
//! ...
//! M[n-1][0];...;M[n-1][n-2]
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{NjError, NjResult};
use crate::matrix::distance_matrix::DistanceMatrix;

const DELIM: char = ';';

impl DistanceMatrix {
    pub fn load<P: AsRef<Path>>(path: P) -> NjResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::read_from(BufReader::new(file))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> NjResult<()> {
        self.check_writable_labels()?;
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        self.write_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read>(reader: R) -> NjResult<Self> {
        let mut lines = Vec::new();
        for line in BufReader::new(reader).lines() {
            lines.push(line?);
        }
        // trailing blank lines are tolerated, blank lines inside the body are not
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let header = lines
            .first()
            .ok_or_else(|| NjError::format(1, "missing element count"))?;
        let n: usize = header
            .trim()
            .parse()
            .map_err(|_| NjError::format(1, format!("element count '{}' is not an integer", header.trim())))?;
        if n == 0 {
            return Err(NjError::format(1, "element count must be positive"));
        }

        let expected_lines = n
            .checked_add(2)
            .ok_or_else(|| NjError::format(1, format!("element count {} is too large", n)))?;
        if lines.len() != expected_lines {
            return Err(NjError::format(
                lines.len().min(expected_lines),
                format!(
                    "expected {} lines for {} elements, found {}",
                    expected_lines,
                    n,
                    lines.len()
                ),
            ));
        }

        let labels: Vec<String> = split_tokens(&lines[1])
            .into_iter()
            .map(str::to_string)
            .collect();
        if labels.len() != n {
            return Err(NjError::format(
                2,
                format!("expected {} labels, found {}", n, labels.len()),
            ));
        }

        let classes = parse_numbers(&lines[2], 3)?;
        if classes.len() != n {
            return Err(NjError::format(
                3,
                format!("expected {} class values, found {}", n, classes.len()),
            ));
        }

        let mut m = DistanceMatrix::new(n);
        for i in 1..n {
            let line_no = i + 3;
            let values = parse_numbers(&lines[line_no - 1], line_no)?;
            if values.len() != i {
                return Err(NjError::format(
                    line_no,
                    format!("row {} needs {} distances, found {}", i, i, values.len()),
                ));
            }
            for (j, v) in values.into_iter().enumerate() {
                m.set_distance(i, j, v)?;
            }
        }
        m.set_labels(labels)?;
        m.set_classes(classes)?;
        debug!("Read distance matrix with {} elements", n);
        Ok(m)
    }

    /// Labels that would not read back unchanged are rejected before anything
    /// is written.
    pub fn write_to<W: Write>(&self, w: &mut W) -> NjResult<()> {
        self.check_writable_labels()?;
        writeln!(w, "{}", self.len())?;
        writeln!(w, "{}", self.labels().join(";"))?;
        writeln!(w, "{}", join_numbers(self.classes().iter().copied()))?;
        for row in self.rows().iter().skip(1) {
            writeln!(w, "{}", join_numbers(row.iter().copied()))?;
        }
        Ok(())
    }

    fn check_writable_labels(&self) -> NjResult<()> {
        match self.labels().iter().find(|l| !is_writable_label(l)) {
            Some(label) => Err(NjError::precondition(format!(
                "label {:?} cannot be stored: labels must be non-empty, without ';' or \
                 line breaks, and without surrounding whitespace",
                label
            ))),
            None => Ok(()),
        }
    }
}

/// Trimmed `;`-separated tokens. One trailing separator (`8;5;`) is allowed.
fn split_tokens(line: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = line
        .trim_end_matches(['\r', '\n'])
        .split(DELIM)
        .map(str::trim)
        .collect();
    if tokens.len() > 1 && tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }
    tokens
}

fn is_writable_label(label: &str) -> bool {
    !label.is_empty()
        && label.trim() == label
        && !label.contains([DELIM, '\n', '\r'])
}

fn parse_numbers(line: &str, line_no: usize) -> NjResult<Vec<f64>> {
    split_tokens(line)
        .into_iter()
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| {
                NjError::format(line_no, format!("'{}' is not a number", tok))
            })
        })
        .collect()
}

fn join_numbers<I: Iterator<Item = f64>>(values: I) -> String {
    values
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "4\nA;B;C;D\n1;1;2;2\n7\n8;5\n11;8;5\n";

    #[test]
    fn reads_sample() {
        let m = DistanceMatrix::read_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(m.len(), 4);
        assert_eq!(m.labels(), &["A", "B", "C", "D"]);
        assert_eq!(m.classes(), &[1.0, 1.0, 2.0, 2.0]);
        assert_eq!(m.get_distance(0, 3).unwrap(), 11.0);
        assert_eq!(m.get_distance(2, 1).unwrap(), 5.0);
    }

    #[test]
    fn accepts_crlf_and_spaces() {
        let text = "3\r\nx ; y ; z\r\n0;0;0\r\n1.5\r\n2 ; 2.5\r\n";
        let m = DistanceMatrix::read_from(text.as_bytes()).unwrap();
        assert_eq!(m.labels(), &["x", "y", "z"]);
        assert_eq!(m.get_distance(1, 2).unwrap(), 2.5);
    }

    #[test]
    fn save_then_load_is_identical() {
        let mut m = DistanceMatrix::read_from(SAMPLE.as_bytes()).unwrap();
        m.set_distance(3, 0, 0.1 + 0.2).unwrap();
        m.set_classes(vec![0.5, -1.25, 3.0, 1e-9]).unwrap();

        let tf = NamedTempFile::new().expect("tmp");
        m.save(tf.path()).unwrap();
        let back = DistanceMatrix::load(tf.path()).unwrap();

        assert_eq!(back.labels(), m.labels());
        assert_eq!(back.classes(), m.classes());
        assert_eq!(back.rows(), m.rows());
    }

    #[test]
    fn wrong_token_count_is_format_error() {
        let text = "3\nA;B;C\n0;0;0\n1\n2\n";
        match DistanceMatrix::read_from(text.as_bytes()) {
            Err(NjError::Format { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn non_numeric_is_format_error() {
        let text = "3\nA;B;C\n0;x;0\n1\n2;3\n";
        match DistanceMatrix::read_from(text.as_bytes()) {
            Err(NjError::Format { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("'x'"));
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn label_count_mismatch_is_format_error() {
        let text = "3\nA;B\n0;0;0\n1\n2;3\n";
        assert!(matches!(
            DistanceMatrix::read_from(text.as_bytes()),
            Err(NjError::Format { line: 2, .. })
        ));
    }

    #[test]
    fn truncated_file_is_format_error() {
        let text = "4\nA;B;C;D\n0;0;0;0\n1\n2;3\n";
        assert!(matches!(
            DistanceMatrix::read_from(text.as_bytes()),
            Err(NjError::Format { .. })
        ));
    }

    #[test]
    fn trailing_separators_are_accepted() {
        let text = "4\na;b;c;d;\n0;0;0;0;\n7;\n8;5;\n11;8;5;\n";
        let m = DistanceMatrix::read_from(text.as_bytes()).unwrap();
        assert_eq!(m.labels(), &["a", "b", "c", "d"]);
        assert_eq!(m.classes(), &[0.0; 4]);
        assert_eq!(m.get_distance(3, 2).unwrap(), 5.0);
    }

    #[test]
    fn doubled_trailing_separator_is_still_a_count_error() {
        let text = "3\nA;B;C\n0;0;0\n1;;\n2;3\n";
        assert!(matches!(
            DistanceMatrix::read_from(text.as_bytes()),
            Err(NjError::Format { line: 4, .. })
        ));
    }

    #[test]
    fn huge_element_count_is_format_error() {
        let text = format!("{}\nA\n0\n", usize::MAX);
        assert!(matches!(
            DistanceMatrix::read_from(text.as_bytes()),
            Err(NjError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn unstorable_labels_are_refused_on_write() {
        for bad in [" a", "b;c", "d\ne", "", "f "] {
            let mut m = DistanceMatrix::new(3);
            m.set_labels(vec![bad.to_string(), "x".into(), "y".into()])
                .unwrap();
            let mut out = Vec::new();
            assert!(
                matches!(m.write_to(&mut out), Err(NjError::Precondition(_))),
                "label {:?} was written",
                bad
            );
            assert!(out.is_empty());
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.dmat");
        let mut m = DistanceMatrix::new(3);
        m.set_labels(vec!["a;b".into(), "x".into(), "y".into()]).unwrap();
        assert!(m.save(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn written_labels_read_back_unchanged() {
        let mut m = DistanceMatrix::new(3);
        m.set_labels(vec!["two words".into(), "x-1".into(), "ß".into()])
            .unwrap();
        let mut out = Vec::new();
        m.write_to(&mut out).unwrap();
        let back = DistanceMatrix::read_from(out.as_slice()).unwrap();
        assert_eq!(back.labels(), m.labels());
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            DistanceMatrix::load("/definitely/not/here.dmat"),
            Err(NjError::Io(_))
        ));
    }
}
