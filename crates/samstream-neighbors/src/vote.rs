use samstream_core::Float;

/// Reciprocal-distance floor: a zero distance votes with weight 1/1e-9.
const MIN_DISTANCE: f64 = 1e-9;

/// Indices of the `k` smallest entries of `d` within the inclusive slice
/// `[lo, hi]`, ordered by increasing value.
///
/// Ties break toward the earlier index (first-seen). Returns fewer than `k`
/// indices when the slice is shorter than `k`.
pub fn n_arg_min<T: Float>(k: usize, d: &[T], lo: usize, hi: usize) -> Vec<usize> {
    if d.is_empty() || lo > hi || lo >= d.len() {
        return Vec::new();
    }
    let hi = hi.min(d.len() - 1);
    let take = k.min(hi - lo + 1);

    let mut picked = vec![false; hi - lo + 1];
    let mut out = Vec::with_capacity(take);
    for _ in 0..take {
        let mut best: Option<usize> = None;
        for i in lo..=hi {
            if picked[i - lo] {
                continue;
            }
            match best {
                // Strict comparison keeps the first-seen index on ties.
                Some(b) if !(d[i] < d[b]) => {}
                _ => best = Some(i),
            }
        }
        let b = match best {
            Some(b) => b,
            None => break,
        };
        picked[b - lo] = true;
        out.push(b);
    }
    out
}

/// Per-class vote accumulation weighted by reciprocal distance.
///
/// `idx` entries are positions into `d`; `start_idx` is subtracted uniformly
/// to map them onto `labels` (the physical-to-logical offset when `d` is a
/// matrix row).
pub fn distance_weighted_votes<T: Float>(
    d: &[T],
    idx: &[usize],
    labels: &[usize],
    start_idx: usize,
    n_classes: usize,
) -> Vec<T> {
    let mut votes = vec![T::ZERO; n_classes];
    let floor = T::from_f64(MIN_DISTANCE);
    for &i in idx {
        let cls = labels[i - start_idx];
        if cls < n_classes {
            votes[cls] += T::ONE / d[i].max(floor);
        }
    }
    votes
}

/// Per-class vote accumulation with uniform neighbor weight.
pub fn uniform_votes<T: Float>(
    idx: &[usize],
    labels: &[usize],
    start_idx: usize,
    n_classes: usize,
) -> Vec<T> {
    let mut votes = vec![T::ZERO; n_classes];
    for &i in idx {
        let cls = labels[i - start_idx];
        if cls < n_classes {
            votes[cls] += T::ONE;
        }
    }
    votes
}

/// Class with the highest vote; ties break toward the smallest class index.
/// An empty vector maps to class 0.
pub fn arg_max_vote<T: Float>(v: &[T]) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate() {
        if x > v[best] {
            best = i;
        }
    }
    best
}

/// Scale votes in place so they sum to one. A zero or empty vector is left
/// unchanged.
pub fn normalize_votes<T: Float>(v: &mut [T]) {
    let total: T = v.iter().copied().sum();
    if total > T::ZERO {
        for x in v.iter_mut() {
            *x = *x / total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_n_arg_min_orders_by_value() {
        let d = [5.0f64, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(n_arg_min(3, &d, 0, 4), vec![1, 3, 2]);
    }

    #[test]
    fn test_n_arg_min_first_seen_ties() {
        let d = [2.0f64, 1.0, 1.0, 1.0];
        // All three ties must come out in index order, never reordered.
        assert_eq!(n_arg_min(3, &d, 0, 3), vec![1, 2, 3]);
        assert_eq!(n_arg_min(4, &d, 0, 3), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_n_arg_min_slice_bounds() {
        let d = [5.0f64, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(n_arg_min(2, &d, 2, 4), vec![3, 2]);
        assert_eq!(n_arg_min(10, &d, 3, 4), vec![3, 4]);
        assert!(n_arg_min(2, &d, 4, 3).is_empty());
        let empty: [f64; 0] = [];
        assert!(n_arg_min(2, &empty, 0, 0).is_empty());
    }

    #[test]
    fn test_weighted_votes_floor() {
        let d = [0.0f64, 2.0];
        let votes = distance_weighted_votes(&d, &[0, 1], &[0, 1], 0, 2);
        // Zero distance is floored, not divided by zero.
        assert!(votes[0].is_finite());
        assert_abs_diff_eq!(votes[1], 0.5, epsilon = 1e-12);
        assert!(votes[0] > votes[1]);
    }

    #[test]
    fn test_start_idx_mapping() {
        // d is a matrix row with physical offset 2.
        let d = [9.0f64, 9.0, 1.0, 2.0];
        let labels = [1usize, 0];
        let idx = n_arg_min(2, &d, 2, 3);
        assert_eq!(idx, vec![2, 3]);
        let votes = uniform_votes::<f64>(&idx, &labels, 2, 2);
        assert_abs_diff_eq!(votes[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(votes[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_arg_max_vote_ties_to_smallest() {
        assert_eq!(arg_max_vote(&[1.0f64, 1.0, 0.5]), 0);
        assert_eq!(arg_max_vote(&[0.2f64, 0.7, 0.7]), 1);
        let empty: [f64; 0] = [];
        assert_eq!(arg_max_vote(&empty), 0);
    }

    #[test]
    fn test_normalize_votes() {
        let mut v = [1.0f64, 3.0];
        normalize_votes(&mut v);
        assert_abs_diff_eq!(v[0], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(v[1], 0.75, epsilon = 1e-12);

        let mut zero = [0.0f64, 0.0];
        normalize_votes(&mut zero);
        assert_abs_diff_eq!(zero[0], 0.0, epsilon = 1e-12);
    }
}
