use samstream_core::{Float, InstanceWindow, StreamHeader};

/// Distance metric over a mixed numeric/nominal attribute space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

/// One-to-one and one-to-many distance over a selected attribute subset.
///
/// Numeric attributes contribute their raw difference; nominal attributes
/// contribute 1 per unequal pair (Hamming style). Normalization by the
/// declared attribute range exists but is off by default.
#[derive(Debug, Clone)]
pub struct DistanceKernel {
    pub metric: DistanceMetric,
    pub normalize: bool,
    subset: Vec<usize>,
    nominal: Vec<bool>,
    range_widths: Vec<Option<f64>>,
}

impl DistanceKernel {
    pub fn new(metric: DistanceMetric, header: &StreamHeader) -> Self {
        let n = header.num_attributes();
        DistanceKernel {
            metric,
            normalize: false,
            subset: (0..n).collect(),
            nominal: header.attributes().iter().map(|a| a.is_nominal()).collect(),
            range_widths: header.attributes().iter().map(|a| a.range_width()).collect(),
        }
    }

    /// Restrict the kernel to a subset of attribute indices.
    pub fn set_subset(&mut self, subset: Vec<usize>) {
        self.subset = subset;
    }

    pub fn subset(&self) -> &[usize] {
        &self.subset
    }

    /// Per-attribute term: |Δ| for numeric (optionally range-normalized),
    /// 0/1 for nominal.
    fn term<T: Float>(&self, idx: usize, a: T, b: T) -> T {
        if self.nominal[idx] {
            if a == b { T::ZERO } else { T::ONE }
        } else {
            let mut diff = (a - b).abs();
            if self.normalize {
                if let Some(width) = self.range_widths[idx] {
                    if width > 0.0 {
                        diff = diff / T::from_f64(width);
                    }
                }
            }
            diff
        }
    }

    /// Distance between two feature vectors.
    pub fn dist<T: Float>(&self, a: &[T], b: &[T]) -> T {
        match self.metric {
            DistanceMetric::Euclidean => {
                let mut acc = T::ZERO;
                for &idx in &self.subset {
                    let t = self.term(idx, a[idx], b[idx]);
                    if self.nominal[idx] {
                        acc += t;
                    } else {
                        acc += t * t;
                    }
                }
                acc.sqrt()
            }
            DistanceMetric::Manhattan => {
                let mut acc = T::ZERO;
                for &idx in &self.subset {
                    acc += self.term(idx, a[idx], b[idx]);
                }
                acc
            }
            DistanceMetric::Chebyshev => {
                let mut acc = T::ZERO;
                for &idx in &self.subset {
                    acc = acc.max(self.term(idx, a[idx], b[idx]));
                }
                acc
            }
        }
    }

    /// Distances from `x` to every instance in the window, in order.
    pub fn dist_to_all<T: Float>(&self, x: &[T], window: &InstanceWindow<T>) -> Vec<T> {
        window.iter().map(|y| self.dist(x, y.values())).collect()
    }
}
