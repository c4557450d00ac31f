use std::collections::BTreeMap;

use samstream_core::Float;
use samstream_neighbors::{
    arg_max_vote, distance_weighted_votes, n_arg_min, uniform_votes, SlidingDistanceMatrix,
};

/// Adapts the short-term memory to the suffix length that minimizes an
/// interleaved test-train error, evaluated over a geometric progression of
/// candidate sizes.
///
/// The prediction-history cache maps a start offset (in current STM
/// coordinates) to the outcome bits obtained when training on the suffix
/// starting there; it holds one entry per bisection level, O(log W).
#[derive(Debug, Clone)]
pub struct SizeAdaptor {
    k: usize,
    min_size: usize,
    recalculate: bool,
    uniform_weighted: bool,
    cache: BTreeMap<usize, Vec<u8>>,
}

impl SizeAdaptor {
    pub fn new(k: usize, min_size: usize, recalculate: bool, uniform_weighted: bool) -> Self {
        SizeAdaptor {
            k,
            min_size,
            recalculate,
            uniform_weighted,
            cache: BTreeMap::new(),
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Pick the STM size with the lowest interleaved test-train error.
    ///
    /// Returns the selected size (== `n` when no shrink is warranted) and
    /// re-keys the history cache to the post-trim coordinates before
    /// returning, so the caller only has to trim the memory itself.
    pub fn best_size<T: Float>(
        &mut self,
        matrix: &SlidingDistanceMatrix<T>,
        stm_labels: &[usize],
        n_classes: usize,
    ) -> usize {
        let n = stm_labels.len();
        if n < 2 * self.min_size {
            return n;
        }

        // Candidate sizes n, n/2, n/4, ... down to (not below) 2*min_size;
        // the full size comes first so the first minimum favors it on ties.
        let mut sizes = Vec::new();
        let mut s = n;
        while s >= 2 * self.min_size {
            sizes.push(s);
            s /= 2;
        }
        let offsets: Vec<usize> = sizes.iter().map(|&s| n - s).collect();

        if self.recalculate {
            self.cache.retain(|off, _| offsets.contains(off));
        }

        let mut errors = Vec::with_capacity(offsets.len());
        for &off in &offsets {
            let hist = self.history_for(off, matrix, stm_labels, n_classes);
            errors.push(Self::error_rate(hist));
        }

        let mut best = Self::first_min(&errors);

        if !self.recalculate {
            // Cached histories derived from neighboring keys are an
            // approximation; any candidate that beats the full-size baseline
            // gets one recomputation from scratch before it may win.
            let baseline = errors[0];
            let mut recomputed = false;
            for (i, &off) in offsets.iter().enumerate().skip(1) {
                if errors[i] < baseline {
                    let hist = self.compute_history(off, matrix, stm_labels, n_classes);
                    errors[i] = Self::error_rate(&hist);
                    self.cache.insert(off, hist);
                    recomputed = true;
                }
            }
            if recomputed {
                best = Self::first_min(&errors);
            }
        }

        if best > 0 {
            self.adapt_histories(best);
        }
        sizes[best]
    }

    fn first_min(errors: &[f64]) -> usize {
        let mut best = 0;
        for (i, &e) in errors.iter().enumerate() {
            if e < errors[best] {
                best = i;
            }
        }
        best
    }

    fn error_rate(hist: &[u8]) -> f64 {
        if hist.is_empty() {
            return 1.0;
        }
        let correct: usize = hist.iter().map(|&b| b as usize).sum();
        1.0 - correct as f64 / hist.len() as f64
    }

    /// Cached history for `off`, extended to cover the current STM length.
    fn history_for<T: Float>(
        &mut self,
        off: usize,
        matrix: &SlidingDistanceMatrix<T>,
        stm_labels: &[usize],
        n_classes: usize,
    ) -> &Vec<u8> {
        if !self.cache.contains_key(&off) {
            if !self.recalculate && off > 0 {
                // A key one step older describes the same suffix with one
                // extra leading sample; dropping its first bit approximates
                // the history for this key.
                if let Some(mut hist) = self.cache.remove(&(off - 1)) {
                    if !hist.is_empty() {
                        hist.remove(0);
                    }
                    self.cache.insert(off, hist);
                }
            }
        }

        let mut hist = self.cache.remove(&off).unwrap_or_default();
        self.extend_history(&mut hist, off, matrix, stm_labels, n_classes);
        self.cache.entry(off).or_insert(hist)
    }

    /// Fresh history for `off` over the whole current STM.
    fn compute_history<T: Float>(
        &self,
        off: usize,
        matrix: &SlidingDistanceMatrix<T>,
        stm_labels: &[usize],
        n_classes: usize,
    ) -> Vec<u8> {
        let mut hist = Vec::new();
        self.extend_history(&mut hist, off, matrix, stm_labels, n_classes);
        hist
    }

    /// Append interleaved test-train outcomes for STM positions not yet
    /// covered: position `i` is predicted by kNN over `STM[off..i)`, with
    /// distances read straight from the cached matrix row of `i`.
    fn extend_history<T: Float>(
        &self,
        hist: &mut Vec<u8>,
        off: usize,
        matrix: &SlidingDistanceMatrix<T>,
        stm_labels: &[usize],
        n_classes: usize,
    ) {
        let n = stm_labels.len();
        let origin = matrix.origin();
        let start = off + self.k + hist.len();
        for i in start..n {
            let row = matrix.row(origin + i);
            let idx = n_arg_min(self.k, row, origin + off, origin + i - 1);
            let votes = if self.uniform_weighted {
                uniform_votes::<T>(&idx, stm_labels, origin, n_classes)
            } else {
                distance_weighted_votes(row, &idx, stm_labels, origin, n_classes)
            };
            let correct = arg_max_vote(&votes) == stm_labels[i];
            hist.push(correct as u8);
        }
    }

    /// Re-key the cache after the STM shrank by `levels` bisection levels:
    /// drop the smallest surviving key that many times, shifting the
    /// remaining keys down by the new minimum each time.
    fn adapt_histories(&mut self, levels: usize) {
        for _ in 0..levels {
            let Some((&smallest, _)) = self.cache.iter().next() else {
                break;
            };
            self.cache.remove(&smallest);
            if let Some((&new_min, _)) = self.cache.iter().next() {
                if new_min > 0 {
                    let old = std::mem::take(&mut self.cache);
                    self.cache = old
                        .into_iter()
                        .map(|(key, hist)| (key - new_min, hist))
                        .collect();
                }
            }
        }
    }

    #[cfg(test)]
    fn cached_offsets(&self) -> Vec<usize> {
        self.cache.keys().copied().collect()
    }
}
