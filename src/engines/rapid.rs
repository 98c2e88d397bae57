//! Rapid neighbor joining (Simonsen, Mailund & Pedersen, 2008).
//!
//! Each row keeps its distances sorted. Scanning a sorted row can stop as soon
//! as `s - (sum_i + max_sum) / (n - 2)` reaches the best value seen, because no
//! later column in that row can beat it. Merged rows are retired in place and the
//! new row is appended, so storage for all `2n - 3` rows is reserved up front.

use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

use crate::engines::{first_ancestor_id, leaf_records, row_sums, three_point, NodeRecord, NodeRecords};
use crate::matrix::distance_matrix::DistanceMatrix;
use crate::utils::indexed_quicksort;
use crate::NodeId;

#[derive(Debug, Clone)]
struct ActiveRow {
    id: NodeId,
    /// distance to every lower row, `INFINITY` where that row was already retired
    dist: Vec<f64>,
    sorted: Vec<f64>,
    /// `order[k]` is the column holding `sorted[k]`
    order: Vec<usize>,
    sum: f64,
}

impl ActiveRow {
    fn new(row: usize, id: NodeId, dist: Vec<f64>, sum: f64) -> Self {
        let mut sorted = dist.clone();
        let mut rng = StdRng::seed_from_u64(row as u64);
        let order = indexed_quicksort(&mut sorted, &mut rng);
        Self {
            id,
            dist,
            sorted,
            order,
            sum,
        }
    }
}

#[derive(Debug, Clone)]
enum RowState {
    Active(ActiveRow),
    Retired,
}

impl RowState {
    fn active(&self) -> Option<&ActiveRow> {
        match self {
            RowState::Active(row) => Some(row),
            RowState::Retired => None,
        }
    }
}

pub struct RapidNj {
    rows: Vec<RowState>,
    n: usize,
    max_sum: f64,
    next_id: NodeId,
    records: NodeRecords,
}

impl RapidNj {
    pub fn new(matrix: &DistanceMatrix) -> Self {
        let n = matrix.len();
        let sums = row_sums(matrix.rows());
        let ids = matrix.ids();

        let mut rows = Vec::with_capacity((2 * n).saturating_sub(3).max(n));
        rows.par_extend(matrix.rows().par_iter().enumerate().map(|(i, dist)| {
            RowState::Active(ActiveRow::new(i, ids[i], dist.clone(), sums[i]))
        }));

        let mut engine = Self {
            rows,
            n,
            max_sum: f64::MIN,
            next_id: first_ancestor_id(ids),
            records: leaf_records(ids),
        };
        engine.refresh_max_sum();
        engine
    }

    fn row(&self, r: usize) -> Option<&ActiveRow> {
        self.rows[r].active()
    }

    fn is_active(&self, r: usize) -> bool {
        self.row(r).is_some()
    }

    /// Distance between two active rows.
    fn d(&self, a: usize, b: usize) -> f64 {
        let (hi, lo) = if a > b { (a, b) } else { (b, a) };
        self.row(hi).map_or(f64::INFINITY, |r| r.dist[lo])
    }

    fn sum(&self, r: usize) -> f64 {
        self.row(r).map_or(0.0, |r| r.sum)
    }

    fn refresh_max_sum(&mut self) {
        self.max_sum = self
            .rows
            .iter()
            .filter_map(RowState::active)
            .map(|r| r.sum)
            .fold(f64::MIN, f64::max);
    }

    /// Highest row first, sorted columns ascending, pruned by the row-sum bound.
    fn closest_pair(&self) -> (usize, usize) {
        let scale = (self.n - 2) as f64;
        let mut best = f64::INFINITY;
        let (mut imin, mut jmin) = (1, 0);

        for i in (0..self.rows.len()).rev() {
            let Some(row) = self.row(i) else {
                continue;
            };
            let bound_sum = (row.sum + self.max_sum) / scale;
            for (&s, &col) in row.sorted.iter().zip(row.order.iter()) {
                if !(s.is_finite() && s - bound_sum < best) {
                    break;
                }
                let Some(other) = self.row(col) else {
                    continue;
                };
                let q = s - (row.sum + other.sum) / scale;
                if q < best {
                    best = q;
                    imin = i;
                    jmin = col;
                }
            }
        }
        (imin, jmin)
    }

    fn merge(&mut self, imin: usize, jmin: usize) {
        let scale = (self.n - 2) as f64;
        let dij = self.d(imin, jmin);
        let (si, sj) = (self.sum(imin), self.sum(jmin));

        let lik = 0.5 * (dij + (si - sj) / scale);
        let ljk = dij - lik;

        let (Some(id_i), Some(id_j)) = (self.row(imin).map(|r| r.id), self.row(jmin).map(|r| r.id))
        else {
            return;
        };
        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "Joining {} and {} into {} ({:.6}, {:.6})",
            id_i, id_j, id, lik, ljk
        );
        self.records
            .insert(id, NodeRecord::ancestor(id, vec![id_i, id_j], vec![lik, ljk]));

        let l = self.rows.len();
        let mut dist = vec![f64::INFINITY; l];
        let mut new_sum = 0.0;
        for k in 0..l {
            if k == imin || k == jmin || !self.is_active(k) {
                continue;
            }
            let dik = self.d(imin, k);
            let djk = self.d(jmin, k);
            let v = (dik + djk - dij) / 2.0;
            if let RowState::Active(row) = &mut self.rows[k] {
                row.sum += v - dik - djk;
            }
            dist[k] = v;
            new_sum += v;
        }

        self.rows.push(RowState::Active(ActiveRow::new(l, id, dist, new_sum)));
        self.rows[imin] = RowState::Retired;
        self.rows[jmin] = RowState::Retired;
        self.n -= 1;
        self.refresh_max_sum();
    }

    pub fn run(mut self) -> NodeRecords {
        while self.n > 3 {
            let (imin, jmin) = self.closest_pair();
            self.merge(imin, jmin);
        }

        let active: Vec<usize> = (0..self.rows.len()).filter(|&r| self.is_active(r)).collect();
        if let &[a, b, c] = active.as_slice() {
            let [x, y, z] = three_point(self.d(b, a), self.d(c, a), self.d(c, b));
            let ids: Vec<NodeId> = [a, b, c]
                .iter()
                .filter_map(|&r| self.row(r).map(|row| row.id))
                .collect();
            let id = self.next_id;
            self.records
                .insert(id, NodeRecord::ancestor(id, ids, vec![x, y, z]));
        }
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::original::OriginalNj;
    use crate::engines::test_support::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn saitou_nei_reference_values() {
        let records = RapidNj::new(&saitou_nei()).run();
        assert_well_formed(&records, 4);

        // the tie at -16 resolves to the highest row in the backwards scan
        assert_eq!(records[&4].children, vec![3, 2]);
        assert_eq!(records[&4].distances, vec![4.0, 1.0]);
        assert_eq!(records[&5].children, vec![0, 1, 4]);
        assert_eq!(records[&5].distances, vec![5.0, 2.0, 2.0]);
        assert_eq!(total_length(&records), 14.0);
    }

    #[test]
    fn rows_are_sorted_with_their_columns() {
        let engine = RapidNj::new(&saitou_nei());
        let row = engine.row(3).unwrap();
        assert_eq!(row.sorted, vec![5.0, 8.0, 11.0]);
        assert_eq!(row.order, vec![2, 1, 0]);
        assert_eq!(engine.max_sum, 26.0);
    }

    #[test]
    fn storage_grows_by_one_row_per_join() {
        let m = additive_matrix(9, 3);
        let mut engine = RapidNj::new(&m);
        let capacity = engine.rows.capacity();
        assert!(capacity >= 2 * 9 - 3);
        while engine.n > 3 {
            let (i, j) = engine.closest_pair();
            engine.merge(i, j);
        }
        assert_eq!(engine.rows.len(), 9 + 6);
        assert_eq!(engine.rows.capacity(), capacity);
        assert_eq!(engine.rows.iter().filter(|r| r.active().is_some()).count(), 3);
    }

    #[test]
    fn matches_full_scan_on_additive_input() {
        for seed in 20..24 {
            let m = additive_matrix(25, seed);
            let rapid = RapidNj::new(&m).run();
            let full = OriginalNj::new(&m).run();
            assert_well_formed(&rapid, 25);
            let diff = (total_length(&rapid) - total_length(&full)).abs();
            assert!(diff < 1e-9, "seed {} differs by {}", seed, diff);
        }
    }
}
