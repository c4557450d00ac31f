//! # samstream
//!
//! Adaptive-memory k-nearest-neighbor learning for data streams with
//! heterogeneous concept drift.
//!
//! ## Modules
//!
//! - **core** — stream schema, shared instances, memory windows, the online-classifier contract
//! - **neighbors** — distance kernel, kNN voting, sliding-origin distance matrix
//! - **cluster** — kMeans++ centroid compression backend
//! - **detect** — adaptive-windowing change detection over outcome streams
//! - **classifier** — SAM-kNN: dual short/long-term memories with size adaptation
//! - **ensemble** — Poisson-bagged parallel ensemble with drift-driven replacement
//! - **metrics** — stream classification metrics: accuracy, kappa, temporal kappa
//! - **eval** — prequential test-then-train driver and synthetic drift streams

/// Core stream types.
pub use samstream_core as core;

/// Distance computation and kNN voting.
pub use samstream_neighbors as neighbors;

/// Centroid compression.
pub use samstream_cluster as cluster;

/// Change detection.
pub use samstream_detect as detect;

/// The adaptive-memory classifier.
pub use samstream_classifier as classifier;

/// The bagged ensemble.
pub use samstream_ensemble as ensemble;

/// Evaluation metrics.
pub use samstream_metrics as metrics;

/// Prequential evaluation and stream generators.
pub use samstream_eval as eval;
