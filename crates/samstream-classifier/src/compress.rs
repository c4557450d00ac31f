use samstream_cluster::KMeans;
use samstream_core::{Float, Instance, InstanceWindow, StreamResult};

/// Compress the long-term memory by class-wise kMeans++ halving.
///
/// Each class with more than one member is replaced by `⌈n/2⌉` centroids;
/// singleton classes keep their original instance handles. Total size
/// strictly decreases whenever any class holds more than one member.
pub(crate) fn cluster_down<T: Float>(
    ltm: &mut InstanceWindow<T>,
    max_class_seen: usize,
    seed: u64,
) -> StreamResult<()> {
    if ltm.is_empty() {
        return Ok(());
    }
    log::info!("compressing LTM of {} instances", ltm.len());

    let mut compressed = InstanceWindow::new();
    for class in 0..=max_class_seen {
        let members: Vec<_> = ltm.iter().filter(|x| x.label() == class).cloned().collect();
        if members.len() <= 1 {
            for x in members {
                compressed.push(x);
            }
            continue;
        }
        let points: Vec<Vec<T>> = members.iter().map(|x| x.values().to_vec()).collect();
        let n_clusters = members.len().div_ceil(2);
        let mut km = KMeans::new(n_clusters);
        km.seed = Some(seed.wrapping_add(class as u64));
        let centroids = km.fit_centroids(&points)?;
        for centroid in centroids {
            compressed.push(Instance::shared(centroid, class));
        }
    }
    *ltm = compressed;
    Ok(())
}
