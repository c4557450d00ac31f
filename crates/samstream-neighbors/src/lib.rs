pub mod distance;
pub mod matrix;
pub mod vote;

pub use distance::{DistanceKernel, DistanceMetric};
pub use matrix::SlidingDistanceMatrix;
pub use vote::{arg_max_vote, distance_weighted_votes, n_arg_min, normalize_votes, uniform_votes};
