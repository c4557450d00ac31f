use std::collections::VecDeque;

/// ADWIN-style adaptive windowing change detector.
///
/// Fed a stream of 0/1 outcomes; maintains a bounded window and scans cut
/// points with prefix sums. When the means of the two sub-windows around a
/// cut differ by more than a Hoeffding-style bound, the older sub-window is
/// dropped and the change is reported.
#[derive(Debug, Clone)]
pub struct Adwin {
    window: VecDeque<f64>,
    total: f64,
    delta: f64,
    max_window: usize,
    min_samples: usize,
    min_cut: usize,
}

impl Adwin {
    pub const DEFAULT_DELTA: f64 = 0.002;

    pub fn new(delta: f64) -> Self {
        Adwin {
            window: VecDeque::new(),
            total: 0.0,
            delta,
            max_window: 4000,
            min_samples: 30,
            min_cut: 5,
        }
    }

    /// Cap the window at `max_window` outcomes.
    pub fn with_max_window(mut self, max_window: usize) -> Self {
        self.max_window = max_window;
        self
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Mean of the current window.
    pub fn estimate(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.total / self.window.len() as f64
        }
    }

    /// Append one outcome. Returns true when a change was detected (the
    /// stale prefix of the window has already been dropped on return).
    pub fn feed(&mut self, bit: f64) -> bool {
        if self.window.len() >= self.max_window {
            if let Some(old) = self.window.pop_front() {
                self.total -= old;
            }
        }
        self.window.push_back(bit);
        self.total += bit;
        self.check_change()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.total = 0.0;
    }

    fn check_change(&mut self) -> bool {
        let n = self.window.len();
        if n < self.min_samples {
            return false;
        }

        // Single pass over cut points with a running prefix sum.
        let mut prefix = 0.0;
        let mut cut_at = None;
        for (cut, &v) in self.window.iter().enumerate() {
            prefix += v;
            let n1 = (cut + 1) as f64;
            let n2 = (n - cut - 1) as f64;
            if (cut + 1) < self.min_cut || (n - cut - 1) < self.min_cut {
                continue;
            }
            let mean1 = prefix / n1;
            let mean2 = (self.total - prefix) / n2;
            let harmonic = 2.0 * n1 * n2 / (n1 + n2);
            let epsilon = ((1.0 / (2.0 * harmonic)) * (4.0 / self.delta).ln()).sqrt();
            if (mean1 - mean2).abs() > epsilon {
                cut_at = Some(cut + 1);
                break;
            }
        }

        match cut_at {
            Some(cut) => {
                for _ in 0..cut {
                    if let Some(old) = self.window.pop_front() {
                        self.total -= old;
                    }
                }
                true
            }
            None => false,
        }
    }
}

impl Default for Adwin {
    fn default() -> Self {
        Adwin::new(Self::DEFAULT_DELTA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_stationary_stream_stays_quiet() {
        let mut adwin = Adwin::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut detections = 0;
        for _ in 0..2000 {
            let bit = if rng.gen::<f64>() < 0.9 { 1.0 } else { 0.0 };
            if adwin.feed(bit) {
                detections += 1;
            }
        }
        assert_eq!(detections, 0);
    }

    #[test]
    fn test_detects_accuracy_drop() {
        let mut adwin = Adwin::default();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..500 {
            let bit = if rng.gen::<f64>() < 0.9 { 1.0 } else { 0.0 };
            adwin.feed(bit);
        }
        let mut detected = false;
        for _ in 0..500 {
            let bit = if rng.gen::<f64>() < 0.2 { 1.0 } else { 0.0 };
            if adwin.feed(bit) {
                detected = true;
                break;
            }
        }
        assert!(detected);
        // The stale prefix was dropped, so the estimate tracks the new rate.
        assert!(adwin.estimate() < 0.7);
    }

    #[test]
    fn test_reset() {
        let mut adwin = Adwin::default();
        for _ in 0..100 {
            adwin.feed(1.0);
        }
        adwin.reset();
        assert_eq!(adwin.window_len(), 0);
        assert_eq!(adwin.estimate(), 0.0);
    }
}
