use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use samstream_core::{
    same_instance, Float, InstanceRef, InstanceWindow, StreamClassifier, StreamError,
    StreamHeader, StreamResult,
};
use samstream_neighbors::{
    arg_max_vote, distance_weighted_votes, n_arg_min, uniform_votes, DistanceKernel,
    SlidingDistanceMatrix,
};

use crate::adaptor::SizeAdaptor;
use crate::cleaner;
use crate::compress;
use crate::config::SamKnnConfig;

/// Distance vectors computed for the most recently voted instance, reused
/// when the host trains on the very same instance right after predicting it.
struct LastVoted<T: Float> {
    instance: InstanceRef<T>,
    stm_dists: Vec<T>,
    ltm_dists: Option<Vec<T>>,
}

/// Self-adjusting-memory kNN classifier for drifting streams.
///
/// Keeps the current concept in an order-preserving short-term memory and
/// consolidated past concepts in a compressed long-term memory. Every
/// prediction runs kNN against the short-term, long-term and combined views
/// and delegates to whichever has been most accurate over the short-term
/// window; training shrinks the short-term memory to the suffix length that
/// minimizes an interleaved test-train error and migrates cleaned discards
/// into the long-term memory.
pub struct SamKnn<T: Float> {
    pub config: SamKnnConfig,
    header: Option<StreamHeader>,
    kernel: Option<DistanceKernel>,
    stm: InstanceWindow<T>,
    ltm: InstanceWindow<T>,
    matrix: SlidingDistanceMatrix<T>,
    stm_hist: Vec<u8>,
    ltm_hist: Vec<u8>,
    cm_hist: Vec<u8>,
    adaptor: SizeAdaptor,
    max_class_seen: usize,
    steps: u64,
    acc_current_concept: f64,
    last_voted: Option<LastVoted<T>>,
    rng: StdRng,
}

impl<T: Float> SamKnn<T> {
    pub fn new(config: SamKnnConfig) -> StreamResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let adaptor = SizeAdaptor::new(
            config.k,
            config.min_stm_size,
            config.recalculate_error,
            config.uniform_weighted,
        );
        let matrix = SlidingDistanceMatrix::new(config.limit);
        Ok(SamKnn {
            config,
            header: None,
            kernel: None,
            stm: InstanceWindow::new(),
            ltm: InstanceWindow::new(),
            matrix,
            stm_hist: Vec::new(),
            ltm_hist: Vec::new(),
            cm_hist: Vec::new(),
            adaptor,
            max_class_seen: 0,
            steps: 0,
            acc_current_concept: 0.0,
            last_voted: None,
            rng,
        })
    }

    /// Initialize memories and the distance matrix for a stream schema.
    /// The attribute subset starts as the full attribute set.
    pub fn set_context(&mut self, header: &StreamHeader) {
        let mut kernel = DistanceKernel::new(self.config.metric, header);
        kernel.normalize = self.config.normalize;
        self.kernel = Some(kernel);
        self.header = Some(header.clone());
        self.clear_state();
    }

    /// Restrict the classifier to `n_feat` unique attribute indices drawn
    /// uniformly.
    pub fn randomize_features<R: Rng>(
        &mut self,
        n_feat: usize,
        header: &StreamHeader,
        rng: &mut R,
    ) -> StreamResult<()> {
        let kernel = self
            .kernel
            .as_mut()
            .ok_or(StreamError::ContextNotSet("randomize_features"))?;
        let mut indices: Vec<usize> = (0..header.num_attributes()).collect();
        indices.shuffle(rng);
        indices.truncate(n_feat.min(header.num_attributes()));
        kernel.set_subset(indices);
        Ok(())
    }

    pub fn stm_len(&self) -> usize {
        self.stm.len()
    }

    pub fn ltm_len(&self) -> usize {
        self.ltm.len()
    }

    pub fn max_class_seen(&self) -> usize {
        self.max_class_seen
    }

    /// Accuracy of the memory currently delegated to, over the short-term
    /// window.
    pub fn acc_current_concept(&self) -> f64 {
        self.acc_current_concept
    }

    /// Vote vector of length `max_class_seen + 1`. Appends one outcome bit
    /// per memory to the prediction histories, so the host must pass a
    /// labeled instance (prequential test-then-train).
    pub fn predict(&mut self, x: &InstanceRef<T>) -> StreamResult<Vec<T>> {
        self.check_instance(x, "predict")?;
        let n_classes = self.max_class_seen + 1;

        if self.stm.is_empty() {
            self.acc_current_concept = 1.0 / n_classes as f64;
            return Ok(vec![T::from_f64(1.0 / n_classes as f64); n_classes]);
        }

        let kernel = self.kernel.as_ref().expect("kernel set with context");
        let k = self.config.k;
        let d_stm = kernel.dist_to_all(x.values(), &self.stm);
        let d_ltm = kernel.dist_to_all(x.values(), &self.ltm);
        let stm_labels = self.stm.labels();
        let ltm_labels = self.ltm.labels();

        let idx_stm = n_arg_min(k, &d_stm, 0, d_stm.len() - 1);
        let v_stm = self.votes(&d_stm, &idx_stm, &stm_labels, n_classes);

        let v_ltm = if d_ltm.is_empty() {
            vec![T::ZERO; n_classes]
        } else {
            let idx_ltm = n_arg_min(k, &d_ltm, 0, d_ltm.len() - 1);
            self.votes(&d_ltm, &idx_ltm, &ltm_labels, n_classes)
        };

        // Combined view: the first |STM| indices refer to the short-term
        // memory, the rest to the long-term memory.
        let mut d_cm = d_stm.clone();
        d_cm.extend_from_slice(&d_ltm);
        let mut cm_labels = stm_labels.clone();
        cm_labels.extend_from_slice(&ltm_labels);
        let idx_cm = n_arg_min(k, &d_cm, 0, d_cm.len() - 1);
        let v_cm = self.votes(&d_cm, &idx_cm, &cm_labels, n_classes);

        let corr_stm = Self::history_sum(&self.stm_hist);
        let corr_ltm = Self::history_sum(&self.ltm_hist);
        let corr_cm = Self::history_sum(&self.cm_hist);
        let use_stm = corr_stm >= corr_ltm && corr_stm >= corr_cm;
        let use_ltm = !use_stm && corr_ltm > corr_stm && corr_ltm >= corr_cm;

        let label = x.label();
        self.stm_hist.push((arg_max_vote(&v_stm) == label) as u8);
        self.ltm_hist.push((arg_max_vote(&v_ltm) == label) as u8);
        self.cm_hist.push((arg_max_vote(&v_cm) == label) as u8);

        let (votes, corrects) = if use_stm {
            (v_stm, Self::history_sum(&self.stm_hist))
        } else if use_ltm {
            (v_ltm, Self::history_sum(&self.ltm_hist))
        } else {
            (v_cm, Self::history_sum(&self.cm_hist))
        };
        self.acc_current_concept = corrects as f64 / self.stm_hist.len() as f64;

        self.last_voted = Some(LastVoted {
            instance: x.clone(),
            stm_dists: d_stm,
            ltm_dists: if d_ltm.is_empty() { None } else { Some(d_ltm) },
        });
        Ok(votes)
    }

    /// Insert a labeled instance: append to the short-term memory, enforce
    /// the memory budget, cache its distance row, clean the long-term memory
    /// against it and periodically adapt the short-term size.
    pub fn train(&mut self, x: &InstanceRef<T>) -> StreamResult<()> {
        self.check_instance(x, "train")?;
        self.steps += 1;
        if x.label() > self.max_class_seen {
            self.max_class_seen = x.label();
        }

        self.stm.push(x.clone());
        self.memory_size_check()?;

        let m = self.stm.len();
        let dists = match &self.last_voted {
            // The vector computed when this exact instance was voted on is
            // still valid; any front shift since then drops the same number
            // of leading entries.
            Some(lv) if same_instance(&lv.instance, x) && lv.stm_dists.len() + 1 >= m => {
                let drop = lv.stm_dists.len() + 1 - m;
                let mut v = lv.stm_dists[drop..].to_vec();
                v.push(T::ZERO);
                v
            }
            _ => {
                let kernel = self.kernel.as_ref().expect("kernel set with context");
                kernel.dist_to_all(x.values(), &self.stm)
            }
        };
        self.matrix.insert_row(&dists, m);

        self.clean_incremental(&dists);

        if self.steps % self.config.adaptation_interval == 0 {
            self.size_adaptation()?;
        }
        Ok(())
    }

    /// Clear memories and caches, keeping configuration and context.
    pub fn reset(&mut self) {
        self.clear_state();
    }

    /// Release buffers once the stream is exhausted.
    pub fn after_learning(&mut self) {
        self.clear_state();
    }

    fn clear_state(&mut self) {
        self.stm.clear();
        self.ltm.clear();
        self.matrix.reset();
        self.stm_hist.clear();
        self.ltm_hist.clear();
        self.cm_hist.clear();
        self.adaptor.clear_cache();
        self.max_class_seen = self
            .header
            .as_ref()
            .map(|h| h.n_classes().saturating_sub(1))
            .unwrap_or(0);
        self.steps = 0;
        self.acc_current_concept = 0.0;
        self.last_voted = None;
    }

    fn check_instance(&self, x: &InstanceRef<T>, op: &'static str) -> StreamResult<()> {
        let header = self.header.as_ref().ok_or(StreamError::ContextNotSet(op))?;
        if x.num_values() != header.num_attributes() {
            return Err(StreamError::AttributeCountMismatch {
                expected: header.num_attributes(),
                got: x.num_values(),
            });
        }
        Ok(())
    }

    fn votes(&self, d: &[T], idx: &[usize], labels: &[usize], n_classes: usize) -> Vec<T> {
        if self.config.uniform_weighted {
            uniform_votes::<T>(idx, labels, 0, n_classes)
        } else {
            distance_weighted_votes(d, idx, labels, 0, n_classes)
        }
    }

    fn history_sum(hist: &[u8]) -> usize {
        hist.iter().map(|&b| b as usize).sum()
    }

    fn trim_histories(&mut self, diff: usize) {
        let diff = diff.min(self.stm_hist.len());
        self.stm_hist.drain(..diff);
        let diff_ltm = diff.min(self.ltm_hist.len());
        self.ltm_hist.drain(..diff_ltm);
        let diff_cm = diff.min(self.cm_hist.len());
        self.cm_hist.drain(..diff_cm);
    }

    /// Enforce the total memory budget. When over capacity, compress the
    /// long-term memory if it exceeds its own share, otherwise shift the
    /// oldest short-term block into it and compress.
    fn memory_size_check(&mut self) -> StreamResult<()> {
        let max_stm = self.config.max_stm_size();
        let max_ltm = self.config.max_ltm_size();
        while self.stm.len() + self.ltm.len() > max_stm + max_ltm {
            if self.ltm.len() > max_ltm {
                let before = self.ltm.len();
                self.compress_ltm()?;
                if self.ltm.len() == before {
                    break;
                }
            } else {
                let w = self.config.limit;
                let wanted = (w / 10).min(200).max(max_ltm - self.ltm.len() + 1);
                // The newest instance always stays in the short-term memory.
                let shift = wanted.min(self.stm.len().saturating_sub(1));
                if shift == 0 {
                    break;
                }
                let moved = self.stm.trim_front(shift);
                self.migrate_to_ltm(moved);
                self.trim_histories(shift);
                self.compress_ltm()?;
                self.adaptor.clear_cache();
                self.matrix.trim_front(shift);
            }
        }
        Ok(())
    }

    fn compress_ltm(&mut self) -> StreamResult<()> {
        let seed = self.rng.gen::<u64>();
        compress::cluster_down(&mut self.ltm, self.max_class_seen, seed)?;
        // Any cached distances to the long-term memory are now stale.
        if let Some(lv) = &mut self.last_voted {
            lv.ltm_dists = None;
        }
        Ok(())
    }

    /// Append migrated instances to the long-term memory. With a zero
    /// long-term share the discards are simply dropped.
    fn migrate_to_ltm(&mut self, batch: Vec<InstanceRef<T>>) {
        if self.config.max_ltm_size() == 0 || batch.is_empty() {
            return;
        }
        for inst in batch {
            self.ltm.push(inst);
        }
        if let Some(lv) = &mut self.last_voted {
            lv.ltm_dists = None;
        }
    }

    /// Clean the long-term memory against the newest short-term instance,
    /// reusing its just-written distance row and, when valid, the distance
    /// vector cached at vote time.
    fn clean_incremental(&mut self, anchor_stm_dists: &[T]) {
        let k = self.config.k;
        if self.stm.len() <= k || self.ltm.is_empty() {
            return;
        }
        let anchor = self.stm.last().expect("short-term memory not empty").clone();
        let stm_labels = self.stm.labels();

        let cached = match &self.last_voted {
            Some(lv) if same_instance(&lv.instance, &anchor) => match &lv.ltm_dists {
                Some(d) if d.len() == self.ltm.len() => Some(d.clone()),
                _ => None,
            },
            _ => None,
        };
        let d_ltm = match cached {
            Some(d) => d,
            None => {
                let kernel = self.kernel.as_ref().expect("kernel set with context");
                kernel.dist_to_all(anchor.values(), &self.ltm)
            }
        };

        let before = self.ltm.len();
        cleaner::clean_with_anchor(&anchor, anchor_stm_dists, &stm_labels, &mut self.ltm, &d_ltm, k);
        if self.ltm.len() != before {
            if let Some(lv) = &mut self.last_voted {
                lv.ltm_dists = None;
            }
        }
    }

    /// Shrink the short-term memory to the error-minimizing suffix and
    /// migrate the cleaned discards into the long-term memory.
    fn size_adaptation(&mut self) -> StreamResult<()> {
        let n = self.stm.len();
        let stm_labels = self.stm.labels();
        let n_classes = self.max_class_seen + 1;
        let size = self.adaptor.best_size(&self.matrix, &stm_labels, n_classes);
        if size >= n {
            return Ok(());
        }

        let diff = n - size;
        log::debug!("shrinking short-term memory from {n} to {size}");
        let removed = self.stm.trim_front(diff);
        self.matrix.trim_front(diff);
        self.trim_histories(diff);

        let mut batch = InstanceWindow::new();
        for inst in removed {
            batch.push(inst);
        }
        {
            let kernel = self.kernel.as_ref().expect("kernel set with context");
            cleaner::clean_discarded(kernel, &self.stm, &mut batch, self.config.k);
        }
        let survivors: Vec<InstanceRef<T>> = batch.iter().cloned().collect();
        self.migrate_to_ltm(survivors);
        Ok(())
    }
}

impl<T: Float> StreamClassifier<T> for SamKnn<T> {
    fn reset(&mut self) {
        SamKnn::reset(self);
    }

    fn set_context(&mut self, header: &StreamHeader) {
        SamKnn::set_context(self, header);
    }

    fn predict(&mut self, x: &InstanceRef<T>) -> StreamResult<Vec<T>> {
        SamKnn::predict(self, x)
    }

    fn train(&mut self, x: &InstanceRef<T>) -> StreamResult<()> {
        SamKnn::train(self, x)
    }

    fn after_learning(&mut self) {
        SamKnn::after_learning(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use samstream_core::Instance;

    fn small_config(limit: usize, min_stm: usize, k: usize) -> SamKnnConfig {
        SamKnnConfig {
            k,
            limit,
            min_stm_size: min_stm,
            ..Default::default()
        }
    }

    fn ready(config: SamKnnConfig, num_attrs: usize, n_classes: usize) -> SamKnn<f64> {
        let mut sam = SamKnn::new(config).unwrap();
        sam.set_context(&StreamHeader::numeric(num_attrs, n_classes));
        sam
    }

    #[test]
    fn test_predict_without_context_errors() {
        let mut sam: SamKnn<f64> = SamKnn::new(SamKnnConfig::default()).unwrap();
        let x = Instance::shared(vec![0.0], 0);
        assert!(sam.predict(&x).is_err());
    }

    #[test]
    fn test_empty_stm_uniform_vote() {
        let mut sam = ready(SamKnnConfig::default(), 2, 2);
        let x = Instance::shared(vec![0.0, 0.0], 0);
        let votes = sam.predict(&x).unwrap();
        assert_eq!(votes.len(), 2);
        assert_abs_diff_eq!(votes[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(sam.acc_current_concept(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_single_class_stream() {
        let mut sam = ready(small_config(200, 5, 5), 2, 1);
        for _ in 0..100 {
            let x = Instance::shared(vec![0.0, 0.0], 0);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
        }
        let x = Instance::shared(vec![0.0, 0.0], 0);
        let votes = sam.predict(&x).unwrap();
        assert_eq!(arg_max_vote(&votes), 0);
        assert!(votes[0] > 0.0);
        assert_abs_diff_eq!(sam.acc_current_concept(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_vote_counts_neighbors() {
        let config = SamKnnConfig {
            uniform_weighted: true,
            ..small_config(200, 5, 5)
        };
        let mut sam = ready(config, 2, 1);
        for _ in 0..100 {
            let x = Instance::shared(vec![0.0, 0.0], 0);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
        }
        let x = Instance::shared(vec![0.0, 0.0], 0);
        let votes = sam.predict(&x).unwrap();
        assert_abs_diff_eq!(votes[0], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pure_concept_convergence() {
        let mut sam = ready(small_config(30, 5, 3), 2, 2);
        let x = Instance::shared(vec![1.0, 2.0], 1);
        for _ in 0..30 {
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
        }
        let votes = sam.predict(&x).unwrap();
        assert_eq!(arg_max_vote(&votes), 1);
    }

    #[test]
    fn test_invariants_over_random_trace() {
        let mut sam = ready(small_config(60, 5, 3), 2, 2);
        let w = sam.config.limit;
        let mut rng = StdRng::seed_from_u64(3);
        for step in 0..300 {
            let label = (rng.gen::<f64>() < 0.5) as usize;
            let base = if label == 0 { 0.0 } else { 4.0 };
            let x = Instance::shared(
                vec![base + rng.gen::<f64>(), base + rng.gen::<f64>()],
                label,
            );
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();

            assert!(
                sam.stm.len() + sam.ltm.len() <= w,
                "memory budget violated at step {step}"
            );
            assert_eq!(sam.stm_hist.len(), sam.ltm_hist.len());
            assert_eq!(sam.stm_hist.len(), sam.cm_hist.len());
            // The very first predict sees an empty STM and records no bits,
            // so the histories run at most one behind the memory.
            assert!(sam.stm.len() - sam.stm_hist.len() <= 1);
            assert!(sam.matrix.origin() + sam.stm.len() <= w + 1);
        }
    }

    #[test]
    fn test_matrix_rows_match_fresh_recomputation() {
        let mut sam = ready(small_config(20, 2, 2), 1, 2);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..60 {
            let label = (rng.gen::<f64>() < 0.5) as usize;
            let x = Instance::shared(vec![label as f64 * 3.0 + rng.gen::<f64>()], label);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();

            let kernel = sam.kernel.as_ref().unwrap();
            let origin = sam.matrix.origin();
            for i in 0..sam.stm.len() {
                for j in 0..=i {
                    let expected = kernel.dist(
                        sam.stm.get(i).unwrap().values(),
                        sam.stm.get(j).unwrap().values(),
                    );
                    let got = sam.matrix.get(origin + i, origin + j);
                    assert_abs_diff_eq!(got, expected, epsilon = 0.0);
                }
            }
        }
    }

    #[test]
    fn test_abrupt_drift_recovery() {
        let mut sam = ready(small_config(400, 25, 5), 1, 2);
        let mut rng = StdRng::seed_from_u64(17);
        for step in 0..400 {
            let label = (step >= 200) as usize;
            let x = Instance::shared(vec![rng.gen::<f64>()], label);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
        }
        assert!(sam.stm_len() <= 200, "expected bisection, stm = {}", sam.stm_len());
        let corr_stm = SamKnn::<f64>::history_sum(&sam.stm_hist);
        let corr_ltm = SamKnn::<f64>::history_sum(&sam.ltm_hist);
        assert!(corr_stm > corr_ltm);
        assert!(sam.acc_current_concept() > 0.9, "acc = {}", sam.acc_current_concept());
    }

    #[test]
    fn test_zero_ltm_share_never_populates_ltm() {
        let config = SamKnnConfig {
            relative_ltm_size: 0.0,
            ..small_config(80, 5, 3)
        };
        let mut sam = ready(config, 1, 2);
        let mut rng = StdRng::seed_from_u64(5);
        for step in 0..200 {
            let label = (step >= 100) as usize;
            let x = Instance::shared(vec![rng.gen::<f64>()], label);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
            assert_eq!(sam.ltm_len(), 0);
        }
    }

    #[test]
    fn test_recurrent_drift_fills_ltm_with_both_concepts() {
        let mut sam = ready(small_config(300, 25, 5), 1, 2);
        let mut rng = StdRng::seed_from_u64(23);
        for block in 0..8 {
            for _ in 0..100 {
                let v: f64 = rng.gen();
                // Concepts A and B assign opposite labels to the same space.
                let label = if block % 2 == 0 {
                    (v > 0.5) as usize
                } else {
                    (v <= 0.5) as usize
                };
                let x = Instance::shared(vec![v], label);
                sam.predict(&x).unwrap();
                sam.train(&x).unwrap();
            }
        }
        assert!(sam.ltm_len() > 0);
        let ltm_labels = sam.ltm.labels();
        assert!(ltm_labels.iter().any(|&l| l == 0));
        assert!(ltm_labels.iter().any(|&l| l == 1));
    }

    #[test]
    fn test_minimal_capacity_boundary() {
        // limit barely above min_stm_size: the adaptor never bisects and the
        // memory check does all the shrinking.
        let mut sam = ready(small_config(6, 5, 1), 1, 2);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..30 {
            let label = (rng.gen::<f64>() < 0.5) as usize;
            let x = Instance::shared(vec![label as f64 + rng.gen::<f64>()], label);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
            assert!(sam.stm_len() + sam.ltm_len() <= 6);
            assert!(sam.stm_len() >= 1);
        }
    }

    #[test]
    fn test_reset_clears_memories() {
        let mut sam = ready(small_config(100, 5, 3), 1, 2);
        for i in 0..40 {
            let x = Instance::shared(vec![i as f64], (i % 2) as usize);
            sam.predict(&x).unwrap();
            sam.train(&x).unwrap();
        }
        sam.reset();
        assert_eq!(sam.stm_len(), 0);
        assert_eq!(sam.ltm_len(), 0);
        assert_eq!(sam.stm_hist.len(), 0);
        assert_eq!(sam.matrix.origin(), 0);
    }

    #[test]
    fn test_randomize_features_restricts_subset() {
        let mut sam = ready(small_config(100, 5, 3), 6, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let header = StreamHeader::numeric(6, 2);
        sam.randomize_features(3, &header, &mut rng).unwrap();
        let subset = sam.kernel.as_ref().unwrap().subset().to_vec();
        assert_eq!(subset.len(), 3);
        let mut unique = subset.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }
}
