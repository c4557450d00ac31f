use std::collections::VecDeque;

use crate::dtype::Float;
use crate::instance::InstanceRef;

/// Ordered append-only buffer of shared instances.
///
/// Supports the three operations both classifier memories need: append at the
/// end, delete from the front, and random access by position. The short-term
/// memory relies on arrival order; the long-term memory stores an unordered
/// set in the same container.
#[derive(Debug, Clone, Default)]
pub struct InstanceWindow<T: Float> {
    items: VecDeque<InstanceRef<T>>,
}

impl<T: Float> InstanceWindow<T> {
    pub fn new() -> Self {
        InstanceWindow { items: VecDeque::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        InstanceWindow { items: VecDeque::with_capacity(cap) }
    }

    pub fn push(&mut self, x: InstanceRef<T>) {
        self.items.push_back(x);
    }

    /// Remove the `n` oldest instances, returning them in arrival order so
    /// the caller can clean and migrate them.
    pub fn trim_front(&mut self, n: usize) -> Vec<InstanceRef<T>> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Remove a single instance by position.
    pub fn remove(&mut self, idx: usize) -> Option<InstanceRef<T>> {
        self.items.remove(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&InstanceRef<T>> {
        self.items.get(idx)
    }

    pub fn last(&self) -> Option<&InstanceRef<T>> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstanceRef<T>> {
        self.items.iter()
    }

    /// Class labels by position, materialized for the voters.
    pub fn labels(&self) -> Vec<usize> {
        self.items.iter().map(|x| x.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Instance;

    fn inst(v: f64, label: usize) -> InstanceRef<f64> {
        Instance::shared(vec![v], label)
    }

    #[test]
    fn test_push_get_order() {
        let mut w = InstanceWindow::new();
        for i in 0..5 {
            w.push(inst(i as f64, i));
        }
        assert_eq!(w.len(), 5);
        assert_eq!(w.get(0).unwrap().value(0), 0.0);
        assert_eq!(w.last().unwrap().value(0), 4.0);
    }

    #[test]
    fn test_trim_front_returns_prefix() {
        let mut w = InstanceWindow::new();
        for i in 0..4 {
            w.push(inst(i as f64, 0));
        }
        let removed = w.trim_front(2);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].value(0), 0.0);
        assert_eq!(removed[1].value(0), 1.0);
        assert_eq!(w.get(0).unwrap().value(0), 2.0);
    }

    #[test]
    fn test_trim_front_clamps() {
        let mut w = InstanceWindow::new();
        w.push(inst(1.0, 0));
        let removed = w.trim_front(10);
        assert_eq!(removed.len(), 1);
        assert!(w.is_empty());
    }

    #[test]
    fn test_labels() {
        let mut w = InstanceWindow::new();
        w.push(inst(0.0, 2));
        w.push(inst(1.0, 0));
        assert_eq!(w.labels(), vec![2, 0]);
    }
}
