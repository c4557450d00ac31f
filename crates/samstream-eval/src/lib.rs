pub mod prequential;
pub mod streams;

pub use prequential::{EvalRecord, PrequentialConfig, PrequentialEvaluator, RunSummary};
pub use streams::{ConceptDriftStream, GaussianStream, InstanceStream};
