//! Fast neighbor joining (Elias & Lagergren, 2005).
//!
//! Every active row caches its best partner. A merge only rescans rows that
//! lost their partner, plus the new row; every other row checks the new row in
//! O(1) and keeps its cache otherwise. Candidates are re-scored with the current
//! row sums before the pair is picked.
//!
//! The cache can miss the global minimum, so on non-additive input the tree (and
//! its total branch length) may differ from the full-scan variants. On additive
//! input all variants agree.

use crate::engines::{first_ancestor_id, leaf_records, row_sums, three_point, NodeRecord, NodeRecords};
use crate::matrix::distance_matrix::DistanceMatrix;
use crate::NodeId;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ClosestPair {
    partner: usize,
    q: f64,
}

pub struct FastNj {
    rows: Vec<Vec<f64>>,
    sums: Vec<f64>,
    ids: Vec<NodeId>,
    closest: Vec<ClosestPair>,
    n: usize,
    next_id: NodeId,
    records: NodeRecords,
}

impl FastNj {
    pub fn new(matrix: &DistanceMatrix) -> Self {
        let rows = matrix.rows().to_vec();
        let sums = row_sums(&rows);
        let ids = matrix.ids().to_vec();
        let n = rows.len();
        let mut engine = Self {
            closest: vec![
                ClosestPair {
                    partner: 0,
                    q: f64::INFINITY
                };
                n
            ],
            next_id: first_ancestor_id(&ids),
            records: leaf_records(&ids),
            rows,
            sums,
            ids,
            n,
        };
        if n > 3 {
            for r in 0..n {
                engine.closest[r] = engine.scan_row(r);
            }
        }
        engine
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

    #[inline]
    fn q(&self, a: usize, b: usize) -> f64 {
        self.d(a, b) - (self.sums[a] + self.sums[b]) / (self.n - 2) as f64
    }

    fn scan_row(&self, r: usize) -> ClosestPair {
        let mut best = ClosestPair {
            partner: if r == 0 { 1 } else { 0 },
            q: f64::INFINITY,
        };
        for s in (0..self.n).filter(|&s| s != r) {
            let q = self.q(r, s);
            if q < best.q {
                best = ClosestPair { partner: s, q };
            }
        }
        best
    }

    /// Re-score every cached candidate and return `(imin, jmin)` with `imin > jmin`.
    fn closest_pair(&mut self) -> (usize, usize) {
        let mut best = f64::INFINITY;
        let mut cmin = 0;
        for r in 0..self.n {
            let q = self.q(r, self.closest[r].partner);
            self.closest[r].q = q;
            if q < best {
                best = q;
                cmin = r;
            }
        }
        let partner = self.closest[cmin].partner;
        (cmin.max(partner), cmin.min(partner))
    }

    fn merge(&mut self, imin: usize, jmin: usize) {
        let n = self.n;
        let scale = (n - 2) as f64;
        let dij = self.d(imin, jmin);

        let lik = 0.5 * (dij + (self.sums[imin] - self.sums[jmin]) / scale);
        let ljk = dij - lik;

        let id = self.next_id;
        self.next_id += 1;
        debug!(
            "Joining {} and {} into {} ({:.6}, {:.6})",
            self.ids[imin], self.ids[jmin], id, lik, ljk
        );
        self.records.insert(
            id,
            NodeRecord::ancestor(id, vec![self.ids[imin], self.ids[jmin]], vec![lik, ljk]),
        );

        let mut new_sum = 0.0;
        for k in 0..n {
            if k == imin || k == jmin {
                continue;
            }
            let dik = self.d(imin, k);
            let djk = self.d(jmin, k);
            let v = (dik + djk - dij) / 2.0;
            self.sums[k] += v - dik - djk;
            new_sum += v;
            self.set(jmin, k, v);
        }
        self.sums[jmin] = new_sum;
        self.ids[jmin] = id;

        // move the last row into the hole left by imin
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
            self.closest.swap(imin, last);
        }
        self.n -= 1;

        if self.n <= 3 {
            return;
        }
        for r in 0..self.n {
            let partner = self.closest[r].partner;
            if r == jmin || partner == imin || partner == jmin {
                self.closest[r] = self.scan_row(r);
                continue;
            }
            if partner == last {
                self.closest[r].partner = imin;
            }
            let q = self.q(r, self.closest[r].partner);
            let q_new = self.q(r, jmin);
            self.closest[r] = if q_new < q {
                ClosestPair {
                    partner: jmin,
                    q: q_new,
                }
            } else {
                ClosestPair {
                    partner: self.closest[r].partner,
                    q,
                }
            };
        }
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
            NodeRecord::ancestor(id, vec![self.ids[0], self.ids[1], self.ids[2]], vec![x, y, z]),
        );
        self.records
    }
}
