use std::cmp::Ordering;

use rand::Rng;

/// Sort `values` ascending in place and return the permutation that was applied:
/// after the call `values[k] == before[perm[k]]`.
///
/// Randomised Lomuto quicksort over an explicit stack of half-open ranges, so deep
/// inputs never recurse. Ties are broken by original position, which makes an
/// already sorted slice come back with the identity permutation and keeps long
/// runs of equal keys (e.g. `INFINITY` padding) from degrading the partitions.
pub fn indexed_quicksort<R: Rng>(values: &mut [f64], rng: &mut R) -> Vec<usize> {
    let n = values.len();
    let mut perm: Vec<usize> = (0..n).collect();
    if n < 2 {
        return perm;
    }

    let mut stack: Vec<(usize, usize)> = vec![(0, n)];
    while let Some((lo, hi)) = stack.pop() {
        if hi - lo < 2 {
            continue;
        }
        let pivot = rng.gen_range(lo..hi);
        let p = partition(values, &mut perm, lo, hi, pivot);

        // larger side pushed first, so the stack stays O(log n)
        if p - lo < hi - p - 1 {
            stack.push((p + 1, hi));
            stack.push((lo, p));
        } else {
            stack.push((lo, p));
            stack.push((p + 1, hi));
        }
    }
    perm
}

#[inline]
fn key_cmp(values: &[f64], perm: &[usize], a: usize, b: usize) -> Ordering {
    values[a]
        .total_cmp(&values[b])
        .then_with(|| perm[a].cmp(&perm[b]))
}

/// Lomuto partition of `[lo, hi)` around `pivot`; returns the pivot's final slot.
fn partition(values: &mut [f64], perm: &mut [usize], lo: usize, hi: usize, pivot: usize) -> usize {
    let last = hi - 1;
    values.swap(pivot, last);
    perm.swap(pivot, last);

    let mut store = lo;
    for k in lo..last {
        if key_cmp(values, perm, k, last) == Ordering::Less {
            values.swap(k, store);
            perm.swap(k, store);
            store += 1;
        }
    }
    values.swap(store, last);
    perm.swap(store, last);
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn sorts_and_reports_permutation() {
        let before = vec![3.0, -1.0, 2.5, 0.0, 10.0, -7.25];
        let mut values = before.clone();
        let mut rng = StdRng::seed_from_u64(7);
        let perm = indexed_quicksort(&mut values, &mut rng);

        assert_eq!(values, vec![-7.25, -1.0, 0.0, 2.5, 3.0, 10.0]);
        assert_eq!(perm, vec![5, 1, 3, 2, 0, 4]);
        for (k, &p) in perm.iter().enumerate() {
            assert_eq!(values[k], before[p]);
        }
    }

    #[test]
    fn sorted_input_gives_identity() {
        let mut values = vec![1.0, 1.0, 2.0, 3.0, 3.0, f64::INFINITY, f64::INFINITY];
        let mut rng = StdRng::seed_from_u64(1);
        let perm = indexed_quicksort(&mut values, &mut rng);
        assert_eq!(perm, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn empty_and_single() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut empty: Vec<f64> = vec![];
        assert!(indexed_quicksort(&mut empty, &mut rng).is_empty());
        let mut one = vec![4.0];
        assert_eq!(indexed_quicksort(&mut one, &mut rng), vec![0]);
    }

    #[test]
    fn random_inputs_satisfy_permutation_law() {
        let mut rng = StdRng::seed_from_u64(42);
        for len in [2usize, 5, 64, 1000] {
            let before: Vec<f64> = (0..len)
                .map(|_| (rng.gen_range(0..20) as f64) * 0.5)
                .collect();
            let mut values = before.clone();
            let perm = indexed_quicksort(&mut values, &mut rng);

            assert!(values.windows(2).all(|w| w[0] <= w[1]));
            let mut seen = perm.clone();
            seen.sort_unstable();
            assert_eq!(seen, (0..len).collect::<Vec<_>>());
            for (k, &p) in perm.iter().enumerate() {
                assert_eq!(values[k], before[p]);
            }
        }
    }

    #[test]
    fn many_duplicates_stay_stable_by_index() {
        let mut values = vec![f64::INFINITY; 500];
        values.extend([2.0, 1.0]);
        let mut rng = StdRng::seed_from_u64(3);
        let perm = indexed_quicksort(&mut values, &mut rng);
        assert_eq!(perm[0], 501);
        assert_eq!(perm[1], 500);
        assert_eq!(&perm[2..], &(0..500).collect::<Vec<_>>()[..]);
    }
}
