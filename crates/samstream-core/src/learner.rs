use crate::dtype::Float;
use crate::error::StreamResult;
use crate::instance::InstanceRef;
use crate::schema::StreamHeader;

/// Host-facing contract of an online classifier driven prequentially:
/// each labeled instance is first passed to `predict`, then to `train`.
///
/// Contract: the host passes the *same* `InstanceRef` to `predict` and the
/// following `train` call. Implementations key their distance-reuse and
/// memoization caches on that pointer identity; a cloned instance still
/// yields correct results, only slower.
pub trait StreamClassifier<T: Float> {
    /// Clear all memories and caches, keeping the configuration.
    fn reset(&mut self);

    /// Initialize buffers sized to the stream schema.
    fn set_context(&mut self, header: &StreamHeader);

    /// Vote vector of length `max_class_seen + 1`.
    fn predict(&mut self, x: &InstanceRef<T>) -> StreamResult<Vec<T>>;

    /// Update memories with a labeled instance. No return value.
    fn train(&mut self, x: &InstanceRef<T>) -> StreamResult<()>;

    /// Release buffers once the stream is exhausted.
    fn after_learning(&mut self);
}
