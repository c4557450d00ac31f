use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use samstream_core::{Float, StreamError, StreamResult};

/// K-Means clustering with k-means++ initialization.
///
/// Operates on plain feature vectors; memory compression calls it per class
/// with uniform sample weights.
pub struct KMeans<T: Float> {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: T,
    pub seed: Option<u64>,
    pub centroids: Option<Vec<Vec<T>>>,
    pub inertia: Option<T>,
}

impl<T: Float> KMeans<T> {
    pub fn new(n_clusters: usize) -> Self {
        KMeans {
            n_clusters,
            max_iter: 100,
            tol: T::from_f64(1e-4),
            seed: Some(42),
            centroids: None,
            inertia: None,
        }
    }

    fn sq_dist(a: &[T], b: &[T]) -> T {
        let mut dist = T::ZERO;
        for j in 0..a.len() {
            let diff = a[j] - b[j];
            dist += diff * diff;
        }
        dist
    }

    /// Fit the model to a point set.
    pub fn fit(&mut self, points: &[Vec<T>]) -> StreamResult<()> {
        if points.is_empty() {
            return Err(StreamError::EmptyInput("kmeans point set".into()));
        }
        if self.n_clusters == 0 {
            return Err(StreamError::InvalidOption("n_clusters must be positive".into()));
        }
        let n = points.len();
        let d = points[0].len();
        let k = self.n_clusters.min(n);

        let mut centroids = self.init_centroids_pp(points, k);
        let mut labels = vec![0usize; n];

        for _iter in 0..self.max_iter {
            // Assignment step
            for i in 0..n {
                let mut best_dist = T::INFINITY;
                let mut best_k = 0;
                for (c, centroid) in centroids.iter().enumerate() {
                    let dist = Self::sq_dist(&points[i], centroid);
                    if dist < best_dist {
                        best_dist = dist;
                        best_k = c;
                    }
                }
                labels[i] = best_k;
            }

            // Update step
            let mut new_centroids = vec![vec![T::ZERO; d]; k];
            let mut counts = vec![0usize; k];
            for i in 0..n {
                let c = labels[i];
                counts[c] += 1;
                for j in 0..d {
                    new_centroids[c][j] += points[i][j];
                }
            }
            for c in 0..k {
                if counts[c] > 0 {
                    for j in 0..d {
                        new_centroids[c][j] = new_centroids[c][j] / T::from_usize(counts[c]);
                    }
                } else {
                    new_centroids[c] = centroids[c].clone();
                }
            }

            // Check convergence
            let mut max_shift = T::ZERO;
            for c in 0..k {
                for j in 0..d {
                    max_shift = max_shift.max((new_centroids[c][j] - centroids[c][j]).abs());
                }
            }

            centroids = new_centroids;
            if max_shift < self.tol {
                break;
            }
        }

        let mut inertia = T::ZERO;
        for i in 0..n {
            inertia += Self::sq_dist(&points[i], &centroids[labels[i]]);
        }

        self.centroids = Some(centroids);
        self.inertia = Some(inertia);
        Ok(())
    }

    /// Fit and return the centroids in one call.
    pub fn fit_centroids(mut self, points: &[Vec<T>]) -> StreamResult<Vec<Vec<T>>> {
        self.fit(points)?;
        Ok(self.centroids.expect("fit stores centroids"))
    }

    fn init_centroids_pp(&self, points: &[Vec<T>], k: usize) -> Vec<Vec<T>> {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let n = points.len();

        let mut centroids = Vec::with_capacity(k);

        // Pick first centroid randomly
        let first = ((rng.gen::<f64>() * n as f64) as usize).min(n - 1);
        centroids.push(points[first].clone());

        // Pick remaining centroids proportional to distance²
        for _c in 1..k {
            let mut distances = vec![T::INFINITY; n];
            for i in 0..n {
                for centroid in &centroids {
                    let dist = Self::sq_dist(&points[i], centroid);
                    if dist < distances[i] {
                        distances[i] = dist;
                    }
                }
            }

            let total: T = distances.iter().copied().sum();
            let threshold = T::from_f64(rng.gen::<f64>()) * total;
            let mut cumulative = T::ZERO;
            let mut selected = 0;
            for (i, &dist) in distances.iter().enumerate() {
                cumulative += dist;
                if cumulative >= threshold {
                    selected = i;
                    break;
                }
            }
            centroids.push(points[selected].clone());
        }

        centroids
    }
}
