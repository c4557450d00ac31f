use rand::Rng;

/// Knuth's Poisson sampler.
///
/// Online bagging draws each member's participation weight from
/// `Poisson(lambda)` instead of bootstrap-sampling the stream.
pub fn poisson_sample<R: Rng>(lambda: f64, rng: &mut R) -> usize {
    let limit = (-lambda).exp();
    let mut k = 0usize;
    let mut p = 1.0;
    loop {
        p *= rng.gen::<f64>();
        if p <= limit {
            return k;
        }
        k += 1;
    }
}
