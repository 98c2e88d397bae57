use ndarray::Array2;

use crate::error::{NjError, NjResult};
use crate::NodeId;

/// Symmetric pairwise distances over `n` elements, stored as a lower triangle.
///
/// Row `i` holds `i` values: the distances from element `i` to elements `0..i`.
/// The diagonal is implicit and always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    rows: Vec<Vec<f64>>,
    ids: Vec<NodeId>,
    labels: Vec<String>,
    classes: Vec<f64>,
    min_distance: f64,
    max_distance: f64,
}

impl DistanceMatrix {
    /* ---------------- ctor ---------------- */

    /// All-zero matrix over `n` elements with ids `0..n` and labels `"0".."n-1"`.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            rows: (0..n).map(|i| vec![0.0; i]).collect(),
            ids: (0..n).collect(),
            labels: (0..n).map(|i| i.to_string()).collect(),
            classes: vec![0.0; n],
            min_distance: f64::INFINITY,
            max_distance: f64::NEG_INFINITY,
        }
    }

    /// Build from a lower triangle. Row `i` may carry `i` values or `i + 1` values
    /// (the trailing diagonal entry is ignored), e.g. `{{0},{7,0},{8,5,0}}`.
    pub fn from_lower_triangle(rows: &[Vec<f64>]) -> NjResult<Self> {
        let mut m = Self::new(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != i && row.len() != i + 1 {
                return Err(NjError::precondition(format!(
                    "ragged matrix: row {} has {} values, expected {} or {}",
                    i,
                    row.len(),
                    i,
                    i + 1
                )));
            }
            for (j, &v) in row.iter().take(i).enumerate() {
                m.set_distance(i, j, v)?;
            }
        }
        Ok(m)
    }

    /// Build from a full square matrix; only the lower triangle is read.
    pub fn from_square(square: &Array2<f64>, labels: Vec<String>) -> NjResult<Self> {
        let n = square.nrows();
        if square.ncols() != n {
            return Err(NjError::precondition(format!(
                "matrix is not square: {}x{}",
                n,
                square.ncols()
            )));
        }
        let mut m = Self::new(n);
        for i in 1..n {
            for j in 0..i {
                m.set_distance(i, j, square[[i, j]])?;
            }
        }
        m.set_labels(labels)?;
        Ok(m)
    }

    /// Expand into a full symmetric `n x n` array.
    pub fn to_square(&self) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.n, self.n));
        for i in 1..self.n {
            for j in 0..i {
                let v = self.rows[i][j];
                out[[i, j]] = v;
                out[[j, i]] = v;
            }
        }
        out
    }

    /* ---------------- distances ---------------- */

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn check_index(&self, index: usize) -> NjResult<()> {
        if index >= self.n {
            return Err(NjError::OutOfBounds { index, n: self.n });
        }
        Ok(())
    }

    pub fn get_distance(&self, a: usize, b: usize) -> NjResult<f64> {
        self.check_index(a)?;
        self.check_index(b)?;
        Ok(match a.cmp(&b) {
            std::cmp::Ordering::Equal => 0.0,
            std::cmp::Ordering::Greater => self.rows[a][b],
            std::cmp::Ordering::Less => self.rows[b][a],
        })
    }

    /// Write one cell. Diagonal writes are ignored; the running bounds only follow
    /// non-negative values.
    pub fn set_distance(&mut self, a: usize, b: usize, value: f64) -> NjResult<()> {
        self.check_index(a)?;
        self.check_index(b)?;
        if a == b {
            return Ok(());
        }
        let (hi, lo) = if a > b { (a, b) } else { (b, a) };
        self.rows[hi][lo] = value;
        if value >= 0.0 {
            self.min_distance = self.min_distance.min(value);
            self.max_distance = self.max_distance.max(value);
        }
        Ok(())
    }

    pub fn min_distance(&self) -> f64 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Raw lower-triangle rows (`rows()[i].len() == i`).
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /* ---------------- per-element data ---------------- */

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn max_id(&self) -> Option<NodeId> {
        self.ids.iter().copied().max()
    }

    pub fn label_of(&self, id: NodeId) -> Option<&str> {
        self.position_of(id).map(|p| self.labels[p].as_str())
    }

    pub fn position_of(&self, id: NodeId) -> Option<usize> {
        self.ids.iter().position(|&x| x == id)
    }

    pub fn set_ids(&mut self, ids: Vec<NodeId>) -> NjResult<()> {
        self.check_len("ids", ids.len())?;
        let mut seen = ids.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != ids.len() {
            return Err(NjError::precondition("element ids must be unique"));
        }
        self.ids = ids;
        Ok(())
    }

    pub fn set_labels(&mut self, labels: Vec<String>) -> NjResult<()> {
        self.check_len("labels", labels.len())?;
        self.labels = labels;
        Ok(())
    }

    pub fn set_classes(&mut self, classes: Vec<f64>) -> NjResult<()> {
        self.check_len("classes", classes.len())?;
        self.classes = classes;
        Ok(())
    }

    fn check_len(&self, what: &str, len: usize) -> NjResult<()> {
        if len != self.n {
            return Err(NjError::precondition(format!(
                "{} has {} entries but the matrix has {} elements",
                what, len, self.n
            )));
        }
        Ok(())
    }

    /* ---------------- structural edits ---------------- */

    /// Drop the element with the given id (row and column). Unknown ids are ignored.
    /// Bounds are re-derived by a full rescan.
    pub fn remove_element(&mut self, id: NodeId) {
        let Some(index) = self.position_of(id) else {
            return;
        };

        let rows: Vec<Vec<f64>> = self
            .rows
            .iter()
            .enumerate()
            .filter(|&(r, _)| r != index)
            .map(|(r, row)| {
                if r > index {
                    row.iter()
                        .enumerate()
                        .filter(|&(c, _)| c != index)
                        .map(|(_, &v)| v)
                        .collect()
                } else {
                    row.clone()
                }
            })
            .collect();

        self.rows = rows;
        self.n -= 1;
        self.ids.remove(index);
        self.labels.remove(index);
        self.classes.remove(index);
        self.rescan_bounds();
    }

    fn rescan_bounds(&mut self) {
        self.min_distance = f64::INFINITY;
        self.max_distance = f64::NEG_INFINITY;
        for v in self.rows.iter().flatten().copied().filter(|v| *v >= 0.0) {
            self.min_distance = self.min_distance.min(v);
            self.max_distance = self.max_distance.max(v);
        }
    }

    /// Entry check for the joining engines: at least 3 elements, finite distances.
    pub fn validate_for_nj(&self) -> NjResult<()> {
        if self.n < 3 {
            return Err(NjError::precondition(format!(
                "neighbor joining needs at least 3 elements, got {}",
                self.n
            )));
        }
        for (i, row) in self.rows.iter().enumerate() {
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(NjError::precondition(format!(
                    "distance between elements {} and {} is not finite",
                    i, j
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn saitou_nei() -> DistanceMatrix {
        DistanceMatrix::from_lower_triangle(&[
            vec![0.0],
            vec![7.0, 0.0],
            vec![8.0, 5.0, 0.0],
            vec![11.0, 8.0, 5.0, 0.0],
        ])
        .unwrap()
    }

    #[test]
    fn symmetric_reads_and_zero_diagonal() {
        let m = saitou_nei();
        assert_eq!(m.len(), 4);
        assert_eq!(m.get_distance(3, 1).unwrap(), 8.0);
        assert_eq!(m.get_distance(1, 3).unwrap(), 8.0);
        assert_eq!(m.get_distance(2, 2).unwrap(), 0.0);
        assert_eq!(m.min_distance(), 5.0);
        assert_eq!(m.max_distance(), 11.0);
    }

    #[test]
    fn out_of_range_is_an_error() {
        let mut m = saitou_nei();
        assert!(matches!(
            m.get_distance(4, 0),
            Err(NjError::OutOfBounds { index: 4, n: 4 })
        ));
        assert!(m.set_distance(0, 9, 1.0).is_err());
    }

    #[test]
    fn negative_writes_do_not_move_bounds() {
        let mut m = DistanceMatrix::new(3);
        m.set_distance(0, 1, 2.0).unwrap();
        m.set_distance(2, 1, -4.0).unwrap();
        m.set_distance(1, 1, 99.0).unwrap();
        assert_eq!(m.get_distance(1, 2).unwrap(), -4.0);
        assert_eq!(m.min_distance(), 2.0);
        assert_eq!(m.max_distance(), 2.0);
        assert_eq!(m.get_distance(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = DistanceMatrix::from_lower_triangle(&[vec![0.0], vec![1.0, 2.0, 3.0]]);
        assert!(matches!(err, Err(NjError::Precondition(_))));
    }

    #[test]
    fn remove_element_drops_row_and_column() {
        let mut m = saitou_nei();
        m.set_labels(vec!["a".into(), "b".into(), "c".into(), "d".into()])
            .unwrap();
        m.remove_element(1);

        assert_eq!(m.len(), 3);
        assert_eq!(m.ids(), &[0, 2, 3]);
        assert_eq!(m.labels(), &["a", "c", "d"]);
        assert_eq!(m.get_distance(0, 1).unwrap(), 8.0);
        assert_eq!(m.get_distance(0, 2).unwrap(), 11.0);
        assert_eq!(m.get_distance(1, 2).unwrap(), 5.0);
        assert_eq!(m.min_distance(), 5.0);
        assert_eq!(m.max_distance(), 11.0);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut m = saitou_nei();
        let before = m.clone();
        m.remove_element(42);
        assert_eq!(m, before);
    }

    #[test]
    fn square_round_trip() {
        let sq = array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [2.0, 3.0, 0.0]];
        let m = DistanceMatrix::from_square(&sq, vec!["A".into(), "B".into(), "C".into()])
            .unwrap();
        assert_eq!(m.get_distance(2, 1).unwrap(), 3.0);
        assert_eq!(m.to_square(), sq);
    }

    #[test]
    fn validation_requires_three_elements() {
        let m = DistanceMatrix::new(2);
        assert!(matches!(m.validate_for_nj(), Err(NjError::Precondition(_))));
        assert!(saitou_nei().validate_for_nj().is_ok());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut m = DistanceMatrix::new(3);
        assert!(m.set_ids(vec![5, 5, 7]).is_err());
        m.set_ids(vec![10, 20, 30]).unwrap();
        assert_eq!(m.max_id(), Some(30));
        assert_eq!(m.position_of(20), Some(1));
    }
}
