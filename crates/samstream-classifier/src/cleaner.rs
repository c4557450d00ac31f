use samstream_core::{Float, InstanceRef, InstanceWindow};
use samstream_neighbors::{n_arg_min, DistanceKernel};

/// Remove from `target` the points contradicting a single STM anchor.
///
/// A target point is contradictory when it is among the anchor's k nearest
/// target neighbors, carries a different label, and sits within the maximum
/// distance from the anchor to its k same-class STM neighbors (the anchor
/// itself counts among them at distance 0). Deletion runs in reverse index
/// order so earlier indices stay valid.
pub(crate) fn clean_with_anchor<T: Float>(
    anchor: &InstanceRef<T>,
    anchor_stm_dists: &[T],
    stm_labels: &[usize],
    target: &mut InstanceWindow<T>,
    anchor_target_dists: &[T],
    k: usize,
) {
    let label = anchor.label();

    let nn_stm = n_arg_min(k, anchor_stm_dists, 0, anchor_stm_dists.len().saturating_sub(1));
    let mut threshold = T::NEG_INFINITY;
    let mut any_same_class = false;
    for &i in &nn_stm {
        if stm_labels[i] == label {
            any_same_class = true;
            threshold = threshold.max(anchor_stm_dists[i]);
        }
    }
    if !any_same_class {
        return;
    }

    let nn_target = n_arg_min(
        k,
        anchor_target_dists,
        0,
        anchor_target_dists.len().saturating_sub(1),
    );
    let mut to_delete: Vec<usize> = nn_target
        .into_iter()
        .filter(|&i| {
            target.get(i).map(|q| q.label()) != Some(label)
                && !(anchor_target_dists[i] > threshold)
        })
        .collect();
    to_delete.sort_unstable();
    for i in to_delete.into_iter().rev() {
        target.remove(i);
    }
}

/// Full cleaning pass: drop from `target` everything contradicting any STM
/// point. Used on a just-discarded STM batch before it migrates into the
/// long-term memory. No-op when the STM is too small to anchor a vote or the
/// target is already empty.
pub(crate) fn clean_discarded<T: Float>(
    kernel: &DistanceKernel,
    stm: &InstanceWindow<T>,
    target: &mut InstanceWindow<T>,
    k: usize,
) {
    if stm.len() <= k || target.is_empty() {
        return;
    }
    let stm_labels = stm.labels();
    for i in 0..stm.len() {
        if target.is_empty() {
            break;
        }
        let anchor = stm.get(i).expect("index in range").clone();
        let d_stm = kernel.dist_to_all(anchor.values(), stm);
        let d_target = kernel.dist_to_all(anchor.values(), target);
        clean_with_anchor(&anchor, &d_stm, &stm_labels, target, &d_target, k);
    }
}
