use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use samstream_classifier::{SamKnn, SamKnnConfig};
use samstream_core::{
    same_instance, Float, InstanceRef, StreamClassifier, StreamError, StreamHeader, StreamResult,
};
use samstream_detect::Adwin;
use samstream_neighbors::{arg_max_vote, normalize_votes};

use crate::bagging::poisson_sample;

/// Configuration of a [`SamKnnEnsemble`].
#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    /// Number of member classifiers.
    pub ensemble_size: usize,
    /// Base Poisson rate for online bagging.
    pub lambda: f64,
    /// Combine raw normalized votes instead of accuracy-weighted ones.
    pub disable_weighted_vote: bool,
    /// Skip change detection and member replacement.
    pub no_drift_detection: bool,
    /// Draw each member's k uniformly from [3, 9].
    pub randomize_k: bool,
    /// Restrict each member to a random attribute subset.
    pub randomize_features: bool,
    /// Draw each member's Poisson rate uniformly from [lambda/2, 3*lambda/2].
    pub randomize_lambda: bool,
    /// Worker threads; negative means one per available CPU.
    pub number_of_jobs: i32,
    pub seed: Option<u64>,
    /// Configuration shared by all members before randomization.
    pub base: SamKnnConfig,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        EnsembleConfig {
            ensemble_size: 10,
            lambda: 6.0,
            disable_weighted_vote: false,
            no_drift_detection: false,
            randomize_k: false,
            randomize_features: false,
            randomize_lambda: false,
            number_of_jobs: -1,
            seed: Some(42),
            base: SamKnnConfig::default(),
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> StreamResult<()> {
        if self.ensemble_size == 0 {
            return Err(StreamError::InvalidOption(
                "ensemble_size must be positive".into(),
            ));
        }
        if !(self.lambda > 0.0) {
            return Err(StreamError::InvalidOption("lambda must be positive".into()));
        }
        self.base.validate()
    }
}

struct Member<T: Float> {
    classifier: SamKnn<T>,
    lambda: f64,
}

/// Parallel bag of adaptive-memory kNN learners.
///
/// Each member sees each instance with Poisson-drawn participation, owns its
/// memories exclusively and trains inside a fork-join region on a fixed-size
/// worker pool. The combined vote weights each member by the accuracy of the
/// memory it currently delegates to; a single change detector over the
/// ensemble's own correctness stream triggers replacement of the worst
/// members.
pub struct SamKnnEnsemble<T: Float> {
    pub config: EnsembleConfig,
    members: Vec<Member<T>>,
    header: Option<StreamHeader>,
    adwin: Adwin,
    pool: Option<rayon::ThreadPool>,
    rng: StdRng,
    memoized: Option<(InstanceRef<T>, Vec<T>)>,
    replacements: u64,
}

impl<T: Float> SamKnnEnsemble<T> {
    pub fn new(config: EnsembleConfig) -> StreamResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let pool = Self::build_pool(config.number_of_jobs)?;
        Ok(SamKnnEnsemble {
            config,
            members: Vec::new(),
            header: None,
            adwin: Adwin::default(),
            pool,
            rng,
            memoized: None,
            replacements: 0,
        })
    }

    fn build_pool(number_of_jobs: i32) -> StreamResult<Option<rayon::ThreadPool>> {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let jobs = if number_of_jobs < 0 {
            available
        } else {
            (number_of_jobs as usize).min(available)
        };
        if jobs <= 1 {
            return Ok(None);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| StreamError::WorkerFailure(e.to_string()))?;
        Ok(Some(pool))
    }

    /// Total member replacements triggered by change detection so far.
    pub fn replacements(&self) -> u64 {
        self.replacements
    }

    pub fn ensemble_size(&self) -> usize {
        self.members.len()
    }

    /// Build the member set for a stream schema.
    pub fn set_context(&mut self, header: &StreamHeader) {
        self.header = Some(header.clone());
        self.members.clear();
        for _ in 0..self.config.ensemble_size {
            let member = self.make_member(header).expect("member construction");
            self.members.push(member);
        }
        self.adwin.reset();
        self.memoized = None;
        self.replacements = 0;
    }

    fn make_member(&mut self, header: &StreamHeader) -> StreamResult<Member<T>> {
        let mut member_config = self.config.base.clone();
        member_config.seed = Some(self.rng.gen::<u64>());
        if self.config.randomize_k {
            member_config.k = self.rng.gen_range(3..=9);
        }
        let lambda = if self.config.randomize_lambda {
            self.rng.gen_range(self.config.lambda / 2.0..=self.config.lambda * 1.5)
        } else {
            self.config.lambda
        };
        let mut classifier = SamKnn::new(member_config)?;
        classifier.set_context(header);
        if self.config.randomize_features {
            let d = header.num_attributes();
            let n_feat = self.rng.gen_range(d.div_ceil(2)..=d.max(1));
            classifier.randomize_features(n_feat, header, &mut self.rng)?;
        }
        Ok(Member { classifier, lambda })
    }

    /// Combined weighted vote, memoized by instance identity so the
    /// prequential predict-then-train pair computes it once.
    pub fn predict(&mut self, x: &InstanceRef<T>) -> StreamResult<Vec<T>> {
        if self.header.is_none() {
            return Err(StreamError::ContextNotSet("predict"));
        }
        if let Some((cached, votes)) = &self.memoized {
            if same_instance(cached, x) {
                return Ok(votes.clone());
            }
        }

        let members = &mut self.members;
        // A failed member contributes a zero vote instead of failing the step.
        let vote_one = |m: &mut Member<T>| -> (Vec<T>, f64) {
            match m.classifier.predict(x) {
                Ok(v) => {
                    let acc = m.classifier.acc_current_concept();
                    (v, acc)
                }
                Err(e) => {
                    log::warn!("member vote failed: {e}");
                    (Vec::new(), 0.0)
                }
            }
        };
        let results: Vec<(Vec<T>, f64)> = match &self.pool {
            Some(pool) => pool.install(|| members.par_iter_mut().map(vote_one).collect()),
            None => members.iter_mut().map(vote_one).collect(),
        };

        let mut combined: Vec<T> = Vec::new();
        for (mut votes, acc) in results {
            normalize_votes(&mut votes);
            if combined.len() < votes.len() {
                combined.resize(votes.len(), T::ZERO);
            }
            let scale = if self.config.disable_weighted_vote || acc == 0.0 {
                T::ONE
            } else {
                T::from_f64(acc)
            };
            for (c, v) in combined.iter_mut().zip(votes.iter()) {
                *c += *v * scale;
            }
        }

        self.memoized = Some((x.clone(), combined.clone()));
        Ok(combined)
    }

    /// Poisson-bagged parallel training step, followed by change detection
    /// over the ensemble's own correctness bit and replacement of the worst
    /// members on detection.
    pub fn train(&mut self, x: &InstanceRef<T>) -> StreamResult<()> {
        if self.header.is_none() {
            return Err(StreamError::ContextNotSet("train"));
        }
        // Correctness is judged on the prediction made before this update;
        // the memoized vote from the host's predict call is reused.
        let votes = self.predict(x)?;

        let draws: Vec<usize> = self
            .members
            .iter()
            .map(|m| poisson_sample(m.lambda, &mut self.rng))
            .collect();

        let members = &mut self.members;
        let train_one = |(m, &count): (&mut Member<T>, &usize)| -> StreamResult<()> {
            if count > 0 {
                m.classifier
                    .train(x)
                    .map_err(|e| StreamError::WorkerFailure(e.to_string()))?;
            }
            Ok(())
        };
        match &self.pool {
            Some(pool) => pool.install(|| {
                members
                    .par_iter_mut()
                    .zip(draws.par_iter())
                    .try_for_each(train_one)
            })?,
            None => members.iter_mut().zip(draws.iter()).try_for_each(train_one)?,
        }

        if !self.config.no_drift_detection {
            let correct = arg_max_vote(&votes) == x.label();
            if self.adwin.feed(correct as u8 as f64) {
                self.replace_worst_members()?;
            }
        }
        Ok(())
    }

    fn replace_worst_members(&mut self) -> StreamResult<()> {
        let n_removals = (self.members.len() / 10).max(1);
        let errors: Vec<f64> = self
            .members
            .iter()
            .map(|m| 1.0 - m.classifier.acc_current_concept())
            .collect();
        let worst = worst_members(&errors, n_removals);
        let header = self.header.clone().expect("context set");
        for idx in worst {
            log::info!(
                "drift detected, replacing member {idx} (error {:.3})",
                errors[idx]
            );
            let fresh = self.make_member(&header)?;
            self.members[idx] = fresh;
            self.replacements += 1;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        if let Some(header) = self.header.clone() {
            self.set_context(&header);
        }
        self.adwin.reset();
        self.memoized = None;
    }

    pub fn after_learning(&mut self) {
        for m in &mut self.members {
            m.classifier.after_learning();
        }
        self.memoized = None;
    }
}

/// Indices of the `n` distinct members with the highest error, worst first.
fn worst_members(errors: &[f64], n: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..errors.len()).collect();
    indices.sort_by(|&a, &b| errors[b].partial_cmp(&errors[a]).unwrap_or(std::cmp::Ordering::Equal));
    indices.truncate(n.min(errors.len()));
    indices
}

impl<T: Float> StreamClassifier<T> for SamKnnEnsemble<T> {
    fn reset(&mut self) {
        SamKnnEnsemble::reset(self);
    }

    fn set_context(&mut self, header: &StreamHeader) {
        SamKnnEnsemble::set_context(self, header);
    }

    fn predict(&mut self, x: &InstanceRef<T>) -> StreamResult<Vec<T>> {
        SamKnnEnsemble::predict(self, x)
    }

    fn train(&mut self, x: &InstanceRef<T>) -> StreamResult<()> {
        SamKnnEnsemble::train(self, x)
    }

    fn after_learning(&mut self) {
        SamKnnEnsemble::after_learning(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samstream_core::Instance;

    fn stream_instance(rng: &mut StdRng, drifted: bool) -> InstanceRef<f64> {
        let label = (rng.gen::<f64>() < 0.5) as usize;
        let effective = if drifted { 1 - label } else { label };
        let base = if label == 0 { 0.0 } else { 4.0 };
        Instance::shared(vec![base + rng.gen::<f64>(), base + rng.gen::<f64>()], effective)
    }

    fn small_ensemble(jobs: i32, size: usize, seed: u64) -> SamKnnEnsemble<f64> {
        let config = EnsembleConfig {
            ensemble_size: size,
            number_of_jobs: jobs,
            seed: Some(seed),
            base: SamKnnConfig {
                limit: 120,
                min_stm_size: 10,
                k: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut ensemble = SamKnnEnsemble::new(config).unwrap();
        ensemble.set_context(&StreamHeader::numeric(2, 2));
        ensemble
    }

    #[test]
    fn test_worst_members_orders_and_dedupes() {
        let errors = [0.1, 0.9, 0.4, 0.9, 0.2];
        assert_eq!(worst_members(&errors, 1), vec![1]);
        let two = worst_members(&errors, 2);
        assert_eq!(two.len(), 2);
        assert!(two.contains(&1) && two.contains(&3));
        assert_eq!(worst_members(&errors, 10).len(), 5);
    }

    #[test]
    fn test_learns_separable_concept() {
        let mut ensemble = small_ensemble(1, 5, 3);
        let mut rng = StdRng::seed_from_u64(101);
        let mut correct = 0;
        let mut total = 0;
        for step in 0..300 {
            let x = stream_instance(&mut rng, false);
            let votes = ensemble.predict(&x).unwrap();
            if step >= 250 {
                total += 1;
                if arg_max_vote(&votes) == x.label() {
                    correct += 1;
                }
            }
            ensemble.train(&x).unwrap();
        }
        assert!(correct as f64 / total as f64 > 0.8);
    }

    #[test]
    fn test_predict_is_memoized_by_identity() {
        let mut ensemble = small_ensemble(1, 3, 5);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let x = stream_instance(&mut rng, false);
            ensemble.predict(&x).unwrap();
            ensemble.train(&x).unwrap();
        }
        let x = stream_instance(&mut rng, false);
        let first = ensemble.predict(&x).unwrap();
        let second = ensemble.predict(&x).unwrap();
        assert_eq!(first, second);

        // A fresh instance with identical values is a different object and
        // must not hit the memo.
        let clone = Instance::shared(x.values().to_vec(), x.label());
        assert!(!same_instance(&x, &clone));
        ensemble.predict(&clone).unwrap();
    }

    #[test]
    fn test_drift_triggers_single_member_replacement() {
        let mut ensemble = small_ensemble(1, 10, 11);
        let mut rng = StdRng::seed_from_u64(19);
        for _ in 0..400 {
            let x = stream_instance(&mut rng, false);
            ensemble.predict(&x).unwrap();
            ensemble.train(&x).unwrap();
        }
        assert_eq!(ensemble.replacements(), 0);
        for _ in 0..400 {
            let x = stream_instance(&mut rng, true);
            ensemble.predict(&x).unwrap();
            ensemble.train(&x).unwrap();
        }
        // nRemovals = max(1, 10 / 10) = 1 per detection.
        assert!(ensemble.replacements() >= 1);
    }

    #[test]
    fn test_no_drift_detection_flag() {
        let config = EnsembleConfig {
            no_drift_detection: true,
            ensemble_size: 5,
            number_of_jobs: 1,
            base: SamKnnConfig { limit: 120, min_stm_size: 10, k: 3, ..Default::default() },
            ..Default::default()
        };
        let mut ensemble: SamKnnEnsemble<f64> = SamKnnEnsemble::new(config).unwrap();
        ensemble.set_context(&StreamHeader::numeric(2, 2));
        let mut rng = StdRng::seed_from_u64(19);
        for step in 0..600 {
            let x = stream_instance(&mut rng, step >= 300);
            ensemble.predict(&x).unwrap();
            ensemble.train(&x).unwrap();
        }
        assert_eq!(ensemble.replacements(), 0);
    }

    #[test]
    fn test_pool_matches_inline_execution() {
        let mut inline = small_ensemble(1, 4, 17);
        let mut pooled = small_ensemble(4, 4, 17);
        let mut rng_a = StdRng::seed_from_u64(31);
        let mut rng_b = StdRng::seed_from_u64(31);
        for _ in 0..120 {
            let xa = stream_instance(&mut rng_a, false);
            let xb = stream_instance(&mut rng_b, false);
            let va = inline.predict(&xa).unwrap();
            let vb = pooled.predict(&xb).unwrap();
            assert_eq!(va, vb);
            inline.train(&xa).unwrap();
            pooled.train(&xb).unwrap();
        }
    }

    #[test]
    fn test_randomized_members() {
        let config = EnsembleConfig {
            randomize_k: true,
            randomize_features: true,
            randomize_lambda: true,
            ensemble_size: 6,
            number_of_jobs: 1,
            base: SamKnnConfig { limit: 120, min_stm_size: 10, ..Default::default() },
            ..Default::default()
        };
        let mut ensemble: SamKnnEnsemble<f64> = SamKnnEnsemble::new(config).unwrap();
        ensemble.set_context(&StreamHeader::numeric(4, 2));
        for m in &ensemble.members {
            assert!((3..=9).contains(&m.classifier.config.k));
            assert!(m.lambda >= 3.0 && m.lambda <= 9.0);
        }
        let mut rng = StdRng::seed_from_u64(41);
        for _ in 0..60 {
            let label = (rng.gen::<f64>() < 0.5) as usize;
            let base = label as f64 * 4.0;
            let x = Instance::shared(
                vec![base, base + rng.gen::<f64>(), rng.gen::<f64>(), base],
                label,
            );
            ensemble.predict(&x).unwrap();
            ensemble.train(&x).unwrap();
        }
    }
}
