use samstream_core::{StreamError, StreamResult};
use samstream_neighbors::DistanceMetric;

/// Configuration of a [`SamKnn`](crate::SamKnn) classifier.
///
/// `limit` is the total instance capacity W shared by both memories;
/// `relative_ltm_size` carves the long-term share out of it.
#[derive(Debug, Clone)]
pub struct SamKnnConfig {
    /// Neighbors consulted per vote.
    pub k: usize,
    /// Total capacity W of STM + LTM.
    pub limit: usize,
    /// Lower bound on the short-term memory size.
    pub min_stm_size: usize,
    /// Fraction of `limit` reserved for the long-term memory.
    pub relative_ltm_size: f64,
    /// Prune the prediction-history cache instead of extending it
    /// incrementally.
    pub recalculate_error: bool,
    /// Disable distance weighting in votes.
    pub uniform_weighted: bool,
    /// Run size adaptation every this many training steps.
    pub adaptation_interval: u64,
    pub metric: DistanceMetric,
    /// Range-normalize numeric differences. Off by default.
    pub normalize: bool,
    pub seed: Option<u64>,
}

impl Default for SamKnnConfig {
    fn default() -> Self {
        SamKnnConfig {
            k: 5,
            limit: 1000,
            min_stm_size: 50,
            relative_ltm_size: 0.4,
            recalculate_error: false,
            uniform_weighted: false,
            adaptation_interval: 1,
            metric: DistanceMetric::Euclidean,
            normalize: false,
            seed: Some(42),
        }
    }
}

impl SamKnnConfig {
    pub fn validate(&self) -> StreamResult<()> {
        if self.k == 0 {
            return Err(StreamError::InvalidOption("k must be positive".into()));
        }
        if self.limit == 0 {
            return Err(StreamError::InvalidOption("limit must be positive".into()));
        }
        if self.adaptation_interval == 0 {
            return Err(StreamError::InvalidOption(
                "adaptation_interval must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_ltm_size) {
            return Err(StreamError::InvalidOption(
                "relative_ltm_size must be in [0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn max_ltm_size(&self) -> usize {
        (self.relative_ltm_size * self.limit as f64) as usize
    }

    pub fn max_stm_size(&self) -> usize {
        self.limit - self.max_ltm_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SamKnnConfig::default();
        config.validate().unwrap();
        assert_eq!(config.k, 5);
        assert_eq!(config.limit, 1000);
        assert_eq!(config.max_ltm_size(), 400);
        assert_eq!(config.max_stm_size(), 600);
    }

    #[test]
    fn test_ltm_share_can_be_zero() {
        let config = SamKnnConfig { relative_ltm_size: 0.0, ..Default::default() };
        config.validate().unwrap();
        assert_eq!(config.max_ltm_size(), 0);
        assert_eq!(config.max_stm_size(), config.limit);
    }

    #[test]
    fn test_invalid_options() {
        assert!(SamKnnConfig { k: 0, ..Default::default() }.validate().is_err());
        assert!(SamKnnConfig { relative_ltm_size: 1.5, ..Default::default() }
            .validate()
            .is_err());
        assert!(SamKnnConfig { adaptation_interval: 0, ..Default::default() }
            .validate()
            .is_err());
    }
}
