use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use samstream_core::{Instance, InstanceRef, StreamHeader};

/// A source of labeled instances with a fixed schema.
pub trait InstanceStream {
    fn header(&self) -> &StreamHeader;
    fn next_instance(&mut self) -> Option<InstanceRef<f64>>;
}

/// Synthetic stream of Gaussian clusters, one center per class.
pub struct GaussianStream {
    header: StreamHeader,
    centers: Vec<Vec<f64>>,
    cluster_std: f64,
    rng: StdRng,
}

impl GaussianStream {
    pub fn new(centers: Vec<Vec<f64>>, cluster_std: f64, seed: Option<u64>) -> Self {
        assert!(!centers.is_empty(), "at least one class center required");
        let n_features = centers[0].len();
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        GaussianStream {
            header: StreamHeader::numeric(n_features, centers.len()),
            centers,
            cluster_std,
            rng,
        }
    }

    /// Standard normal via Box-Muller.
    fn gauss(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(1e-10);
        let u2: f64 = self.rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl InstanceStream for GaussianStream {
    fn header(&self) -> &StreamHeader {
        &self.header
    }

    fn next_instance(&mut self) -> Option<InstanceRef<f64>> {
        let label = self.rng.gen_range(0..self.centers.len());
        let mut values = Vec::with_capacity(self.centers[label].len());
        for j in 0..self.centers[label].len() {
            let z = self.gauss();
            values.push(self.centers[label][j] + z * self.cluster_std);
        }
        Some(Instance::shared(values, label))
    }
}

/// Composes a base and a drift stream around a switch position.
///
/// `width = 0` switches abruptly at `position`; otherwise the probability of
/// drawing from the drift stream follows a sigmoid over the transition
/// window, the classic gradual-drift composition. Nesting drift streams
/// yields recurrent and mixed drifts.
pub struct ConceptDriftStream<A, B> {
    base: A,
    drift: B,
    position: usize,
    width: usize,
    count: usize,
    rng: StdRng,
}

impl<A: InstanceStream, B: InstanceStream> ConceptDriftStream<A, B> {
    pub fn new(base: A, drift: B, position: usize, width: usize, seed: Option<u64>) -> Self {
        assert_eq!(
            base.header().num_attributes(),
            drift.header().num_attributes(),
            "stream schemas must match"
        );
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        ConceptDriftStream {
            base,
            drift,
            position,
            width,
            count: 0,
            rng,
        }
    }

    fn drift_probability(&self) -> f64 {
        if self.width == 0 {
            return if self.count >= self.position { 1.0 } else { 0.0 };
        }
        let t = self.count as f64 - self.position as f64;
        1.0 / (1.0 + (-4.0 * t / self.width as f64).exp())
    }
}

impl<A: InstanceStream, B: InstanceStream> InstanceStream for ConceptDriftStream<A, B> {
    fn header(&self) -> &StreamHeader {
        self.base.header()
    }

    fn next_instance(&mut self) -> Option<InstanceRef<f64>> {
        let p = self.drift_probability();
        self.count += 1;
        if self.rng.gen::<f64>() < p {
            self.drift.next_instance()
        } else {
            self.base.next_instance()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_center(x: f64, seed: u64) -> GaussianStream {
        GaussianStream::new(vec![vec![x, x]], 0.1, Some(seed))
    }

    #[test]
    fn test_gaussian_stream_shape() {
        let mut stream = GaussianStream::new(
            vec![vec![0.0, 0.0], vec![5.0, 5.0]],
            0.5,
            Some(3),
        );
        assert_eq!(stream.header().num_attributes(), 2);
        assert_eq!(stream.header().n_classes(), 2);
        for _ in 0..100 {
            let x = stream.next_instance().unwrap();
            assert_eq!(x.num_values(), 2);
            assert!(x.label() < 2);
            let near = if x.label() == 0 { 0.0 } else { 5.0 };
            assert!((x.value(0) - near).abs() < 4.0);
        }
    }

    #[test]
    fn test_abrupt_switch() {
        let mut stream = ConceptDriftStream::new(
            single_center(0.0, 1),
            single_center(10.0, 2),
            50,
            0,
            Some(3),
        );
        for i in 0..100 {
            let x = stream.next_instance().unwrap();
            if i < 50 {
                assert!(x.value(0) < 5.0, "instance {i} came from the drift stream");
            } else {
                assert!(x.value(0) > 5.0, "instance {i} came from the base stream");
            }
        }
    }

    #[test]
    fn test_gradual_transition_mixes_sources() {
        let mut stream = ConceptDriftStream::new(
            single_center(0.0, 1),
            single_center(10.0, 2),
            100,
            40,
            Some(3),
        );
        let mut base_in_window = 0;
        let mut drift_in_window = 0;
        for i in 0..200 {
            let x = stream.next_instance().unwrap();
            if (80..120).contains(&i) {
                if x.value(0) < 5.0 {
                    base_in_window += 1;
                } else {
                    drift_in_window += 1;
                }
            }
        }
        assert!(base_in_window > 0);
        assert!(drift_in_window > 0);
    }
}
