//! Caller-level parallelization of 2D clustering across spatial sub-windows.
//!
//! Clustering disjoint spatial regions is provably independent: no cluster
//! state is shared between regions. The core clusterer stays ordinary
//! synchronous code; this helper is the orchestrator-side fan-out used by
//! pixel-type event handlers under high rates.

use eventform_core::Hit2D;
use rayon::prelude::*;

use crate::hierarchical2d::Hierarchical2DClusterer;
use crate::Cluster2DContainer;

/// Clusters 2D hits in parallel, one [`Hierarchical2DClusterer`] per
/// vertical strip of the sensor, `window_width` pixels wide.
///
/// Hits must be chronologically sorted, as for the sequential clusterer;
/// the bucketing by x preserves the per-window order. The returned container
/// is re-sorted by cluster start time so it can feed a matcher like any
/// sequential clusterer output.
///
/// A particle track crossing a window border is split between windows, so
/// `window_width` should be large against both the typical cluster size and
/// `max_coord_gap`.
pub fn cluster_subwindows(
    hits: &[Hit2D],
    window_width: u16,
    max_time_gap: u64,
    max_coord_gap: u16,
) -> Cluster2DContainer {
    let window_width = window_width.max(1);

    let mut windows: Vec<(u16, Vec<Hit2D>)> = Vec::new();
    for &hit in hits {
        let key = hit.x_coordinate / window_width;
        match windows.iter_mut().find(|(window, _)| *window == key) {
            Some((_, bucket)) => bucket.push(hit),
            None => windows.push((key, vec![hit])),
        }
    }

    let mut clusters: Vec<_> = windows
        .into_par_iter()
        .flat_map_iter(|(_, bucket)| {
            let mut clusterer = Hierarchical2DClusterer::new(max_time_gap, max_coord_gap);
            clusterer.cluster(&bucket);
            clusterer.flush();
            clusterer.clusters.into_iter()
        })
        .collect();

    clusters.sort_by_key(eventform_core::Cluster2D::time_start);
    clusters.into_iter().collect()
}
