//! Gap-based clustering of a chronological hit stream on one plane.

use eventform_core::{sort_by_increasing_coordinate, Cluster, Hit};
use tracing::debug;

use crate::ClusterContainer;

/// Groups a time-ascending stream of hits into clusters using two
/// independent, inclusive gap thresholds.
///
/// Hits accumulate into a time window while each consecutive time step is at
/// most `max_time_gap`; a larger step closes the window. A closed window is
/// sorted by coordinate and split wherever a coordinate step exceeds
/// `max_coord_gap`. A hit exactly at a threshold stays inside;
/// threshold + 1 starts a new cluster.
///
/// The caller must deliver hits sorted chronologically. This precondition is
/// not checked: out-of-order input yields wrong (but memory-safe) clustering,
/// never a crash.
#[derive(Debug, Default)]
pub struct GapClusterer {
    max_time_gap: u64,
    max_coord_gap: u16,
    current_time_cluster: Vec<Hit>,
    /// Clustered hits, in stash order.
    pub clusters: ClusterContainer,
    /// Cumulative number of clusters produced.
    pub stats_cluster_count: usize,
}

impl GapClusterer {
    /// Creates a clusterer with the given inclusive gap thresholds.
    pub fn new(max_time_gap: u64, max_coord_gap: u16) -> Self {
        Self {
            max_time_gap,
            max_coord_gap,
            ..Self::default()
        }
    }

    /// Sets the maximum time gap between consecutive hits of one cluster.
    pub fn set_maximum_time_gap(&mut self, max_time_gap: u64) {
        self.max_time_gap = max_time_gap;
    }

    /// Sets the maximum coordinate gap between neighbouring hits of one
    /// cluster.
    pub fn set_maximum_coord_gap(&mut self, max_coord_gap: u16) {
        self.max_coord_gap = max_coord_gap;
    }

    /// Inserts one hit, closing the open time window first if the hit lies
    /// beyond the time gap.
    pub fn insert(&mut self, hit: Hit) {
        if let Some(last) = self.current_time_cluster.last() {
            if hit.time.saturating_sub(last.time) > self.max_time_gap {
                self.flush();
            }
        }
        self.current_time_cluster.push(hit);
    }

    /// Inserts a batch of chronologically sorted hits.
    pub fn cluster(&mut self, hits: &[Hit]) {
        for &hit in hits {
            self.insert(hit);
        }
    }

    /// Closes the open time window, if any, emitting its clusters.
    ///
    /// Required because the input is an unbounded stream: without a flush the
    /// clusterer never learns that the last window is complete. Flushing an
    /// empty clusterer is a no-op.
    pub fn flush(&mut self) {
        if self.current_time_cluster.is_empty() {
            return;
        }
        debug!(window = self.current_time_cluster.len(), "closing time window");

        let mut window = std::mem::take(&mut self.current_time_cluster);
        sort_by_increasing_coordinate(&mut window);

        let Some(first) = window.first() else { return };
        let mut previous_coordinate = first.coordinate;
        let mut cluster = Cluster::default();
        for &hit in &window {
            if !cluster.is_empty() && hit.coordinate - previous_coordinate > self.max_coord_gap {
                self.stash_cluster(cluster);
                cluster = Cluster::default();
            }
            previous_coordinate = hit.coordinate;
            cluster.insert(hit);
        }
        self.stash_cluster(cluster);

        // keep the window's allocation for the next round
        window.clear();
        self.current_time_cluster = window;
    }

    /// Returns true if no clusters have been produced (yet).
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    fn stash_cluster(&mut self, cluster: Cluster) {
        self.stats_cluster_count += 1;
        self.clusters.push_back(cluster);
    }
}
