pub mod bagging;
pub mod ensemble;

pub use bagging::poisson_sample;
pub use ensemble::{EnsembleConfig, SamKnnEnsemble};
