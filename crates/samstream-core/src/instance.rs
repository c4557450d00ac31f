use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dtype::Float;

/// An immutable labeled feature vector.
///
/// Instances are never mutated after creation, so they are shared by
/// reference between the input stream and both classifier memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Instance<T: Float> {
    values: Vec<T>,
    label: usize,
}

/// Shared-ownership handle to an instance.
///
/// Pointer identity (`same_instance`) is what ties a `predict` call to the
/// `train` call on the same instance for the distance-reuse and memoization
/// paths.
pub type InstanceRef<T> = Arc<Instance<T>>;

impl<T: Float> Instance<T> {
    pub fn new(values: Vec<T>, label: usize) -> Self {
        Instance { values, label }
    }

    /// Convenience constructor producing a shared handle directly.
    pub fn shared(values: Vec<T>, label: usize) -> InstanceRef<T> {
        Arc::new(Instance::new(values, label))
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn value(&self, idx: usize) -> T {
        self.values[idx]
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    pub fn label(&self) -> usize {
        self.label
    }
}

/// Whether two handles point at the very same instance object.
pub fn same_instance<T: Float>(a: &InstanceRef<T>, b: &InstanceRef<T>) -> bool {
    Arc::ptr_eq(a, b)
}
