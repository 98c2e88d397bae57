//! Saitou & Nei (1987) neighbor joining with a full scan for the closest pair.
//!
//! Rows are folded by plain averaging. Each folded row then sits above the
//! standard update by half the distance that was joined, so that offset is kept
//! per row and taken off every branch length leaving it.

use crate::engines::{first_ancestor_id, leaf_records, row_sums, three_point, NodeRecord, NodeRecords};
use crate::matrix::distance_matrix::DistanceMatrix;
use crate::NodeId;

pub struct OriginalNj {
    rows: Vec<Vec<f64>>,
    sums: Vec<f64>,
    ids: Vec<NodeId>,
    joined: Vec<f64>,
    n: usize,
    next_id: NodeId,
    records: NodeRecords,
}

impl OriginalNj {
    pub fn new(matrix: &DistanceMatrix) -> Self {
        let rows = matrix.rows().to_vec();
        let sums = row_sums(&rows);
        let ids = matrix.ids().to_vec();
        Self {
            n: rows.len(),
            joined: vec![0.0; rows.len()],
            next_id: first_ancestor_id(&ids),
            records: leaf_records(&ids),
            rows,
            sums,
            ids,
        }
    }

    #[inline]
    fn d(&self, a: usize, b: usize) -> f64 {
        if a > b {
            self.rows[a][b]
        } else {
            self.rows[b][a]
        }
    }

    #[inline]
    fn set(&mut self, a: usize, b: usize, v: f64) {
        if a > b {
            self.rows[a][b] = v;
        } else {
            self.rows[b][a] = v;
        }
    }

    /// Row-major scan over the active triangle; the first strict minimum wins.
    fn closest_pair(&self) -> (usize, usize) {
        let scale = (self.n - 2) as f64;
        let mut best = f64::INFINITY;
        let (mut imin, mut jmin) = (1, 0);
        for i in 1..self.n {
            for j in 0..i {
                let q = self.rows[i][j] - (self.sums[i] + self.sums[j]) / scale;
                if q < best {
                    best = q;
                    imin = i;
                    jmin = j;
                }
            }
        }
        (imin, jmin)
    }

    fn merge(&mut self, imin: usize, jmin: usize) {
        let n = self.n;
        let scale = (n - 2) as f64;
        let dij = self.d(imin, jmin);

        let li = (dij + (self.sums[imin] - self.sums[jmin]) / scale) / 2.0 - self.joined[imin];
        let lj = (dij + (self.sums[jmin] - self.sums[imin]) / scale) / 2.0 - self.joined[jmin];

        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "Joining {} and {} into {} ({:.6}, {:.6})",
            self.ids[imin], self.ids[jmin], id, li, lj
        );
        self.records.insert(
            id,
            NodeRecord::ancestor(id, vec![self.ids[imin], self.ids[jmin]], vec![li, lj]),
        );

        let mut new_sum = 0.0;
        for k in 0..n {
            if k == imin || k == jmin {
                continue;
            }
            let dik = self.d(imin, k);
            let djk = self.d(jmin, k);
            let v = (dik + djk) / 2.0;
            self.sums[k] += v - dik - djk;
            new_sum += v;
            self.set(jmin, k, v);
        }
        self.sums[jmin] = new_sum;
        self.ids[jmin] = id;
        self.joined[jmin] = dij / 2.0;

        let last = n - 1;
        if imin != last {
            for k in 0..last {
                if k != imin {
                    let v = self.d(last, k);
                    self.set(imin, k, v);
                }
            }
            self.sums[imin] = self.sums[last];
            self.ids[imin] = self.ids[last];
            self.joined[imin] = self.joined[last];
        }
        self.n -= 1;
    }

    pub fn run(mut self) -> NodeRecords {
        while self.n > 3 {
            let (imin, jmin) = self.closest_pair();
            self.merge(imin, jmin);
        }

        let [x, y, z] = three_point(self.d(0, 1), self.d(0, 2), self.d(1, 2));
        let id = self.next_id;
        self.records.insert(
            id,
            NodeRecord::ancestor(
                id,
                vec![self.ids[0], self.ids[1], self.ids[2]],
                vec![x - self.joined[0], y - self.joined[1], z - self.joined[2]],
            ),
        );
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::test_support::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn saitou_nei_reference_values() {
        let records = OriginalNj::new(&saitou_nei()).run();
        assert_well_formed(&records, 4);

        let first = &records[&4];
        assert_eq!(first.children, vec![1, 0]);
        assert_eq!(first.distances, vec![2.0, 5.0]);

        let root = &records[&5];
        assert_eq!(root.children, vec![4, 3, 2]);
        assert_eq!(root.distances, vec![2.0, 4.0, 1.0]);
        assert_eq!(total_length(&records), 14.0);
    }

    #[test]
    fn three_elements_is_a_single_star() {
        let m = DistanceMatrix::from_lower_triangle(&[vec![], vec![3.0], vec![4.0, 5.0]]).unwrap();
        let records = OriginalNj::new(&m).run();
        assert_eq!(records.len(), 4);
        assert_eq!(records[&3].children, vec![0, 1, 2]);
        assert_eq!(records[&3].distances, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn synthesized_ids_follow_the_largest_input_id() {
        let mut m = saitou_nei();
        m.set_ids(vec![10, 3, 7, 20]).unwrap();
        let records = OriginalNj::new(&m).run();
        assert!(records.contains_key(&21));
        assert!(records.contains_key(&22));
        assert_eq!(records[&22].children.len(), 3);
    }

    #[test]
    fn additive_matrices_are_well_formed() {
        for seed in 0..4 {
            let m = additive_matrix(15, seed);
            assert_well_formed(&OriginalNj::new(&m).run(), 15);
        }
    }
}
