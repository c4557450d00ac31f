use samstream_core::Float;

/// Triangular cache of pairwise short-term-memory distances with a sliding
/// origin.
///
/// Physical storage is a flat row-major `(W+1)²` block, reused forever.
/// Logical position `i` maps to physical row/column `origin + i`; trimming
/// the front of the memory only advances the origin. The row written for the
/// newest instance holds its distances to every older instance in its first
/// `m−1` logical columns plus 0 on the diagonal; older rows stay untouched,
/// so surviving entries remain bit-exact across trims and rewrites.
#[derive(Debug, Clone)]
pub struct SlidingDistanceMatrix<T: Float> {
    data: Vec<T>,
    dim: usize,
    limit: usize,
    origin: usize,
}

impl<T: Float> SlidingDistanceMatrix<T> {
    /// Preallocate for a memory capacity of `limit` instances.
    pub fn new(limit: usize) -> Self {
        let dim = limit + 1;
        SlidingDistanceMatrix {
            data: vec![T::ZERO; dim * dim],
            dim,
            limit,
            origin: 0,
        }
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Entry at physical coordinates.
    pub fn get(&self, phys_row: usize, phys_col: usize) -> T {
        self.data[phys_row * self.dim + phys_col]
    }

    /// Full physical row; callers slice it with physical column indices.
    pub fn row(&self, phys_row: usize) -> &[T] {
        &self.data[phys_row * self.dim..(phys_row + 1) * self.dim]
    }

    /// Write the distance row of the newest instance.
    ///
    /// `dists` holds its distances to all `m` current instances in logical
    /// order (last entry 0, the diagonal). Rewrites the live block back to
    /// origin 0 one step before the physical rows would run out.
    pub fn insert_row(&mut self, dists: &[T], m: usize) {
        debug_assert_eq!(dists.len(), m);
        if self.origin + m - 1 >= self.limit {
            self.rewrite(m);
        }
        let row = self.origin + m - 1;
        let start = row * self.dim + self.origin;
        self.data[start..start + m].copy_from_slice(dists);
    }

    /// Drop the `diff` oldest logical rows. No data moves; the abandoned
    /// physical rows become unreachable until the next rewrite.
    pub fn trim_front(&mut self, diff: usize) {
        self.origin += diff;
    }

    /// Forget everything, keeping the allocation.
    pub fn reset(&mut self) {
        self.origin = 0;
    }

    /// Compact the live lower triangle of `m` logical rows back to origin 0.
    fn rewrite(&mut self, m: usize) {
        if self.origin == 0 {
            return;
        }
        for i in 0..m {
            let src_row = self.origin + i;
            // The newest logical row has not been written yet and may sit
            // one past the physical block; it gets its data right after.
            if src_row >= self.dim {
                continue;
            }
            let src = src_row * self.dim + self.origin;
            let dst = i * self.dim;
            self.data.copy_within(src..src + i + 1, dst);
        }
        self.origin = 0;
    }
}
