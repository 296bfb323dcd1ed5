//! Shared state and contract for the cross-plane matcher family.

use eventform_core::{Cluster, Event};
use tracing::trace;

use crate::ClusterContainer;

/// The streaming contract every matcher fulfils.
///
/// `insert` feeds freshly produced clusters into the unmatched pool;
/// `match_events` pairs whatever has become safe to finalize, appending to
/// the matched-event output. With `flush = false` a matcher never commits to
/// a pairing it could still regret: clusters stay queued until newer data on
/// *both* planes has advanced the latency horizon past them. With
/// `flush = true` — called once at stream end — every remaining cluster is
/// force-emitted, possibly as a one-sided event.
pub trait Matcher {
    /// Moves clusters tagged with `plane` into the unmatched pool.
    /// Clusters under a foreign plane tag are rejected and counted.
    fn insert(&mut self, plane: u8, clusters: &mut ClusterContainer);

    /// Moves clusters into the unmatched pool, routing each by its own
    /// plane id.
    fn insert_clusters(&mut self, clusters: &mut ClusterContainer);

    /// Attempts to pair queued clusters into events.
    fn match_events(&mut self, flush: bool);

    /// Matched events produced so far, in non-decreasing start-time order.
    fn matched_events(&self) -> &[Event];

    /// Drains the matched events, leaving the output empty.
    fn take_matched_events(&mut self) -> Vec<Event>;

    /// Cumulative number of events emitted.
    fn stats_event_count(&self) -> usize;
}

/// Common state for matchers: plane assignment, latency bookkeeping, the
/// unmatched-cluster pool and the matched-event output.
///
/// Fields are public so that concrete matchers (and their tests) can reach
/// the internals directly; the matchers re-export a narrower surface.
#[derive(Debug)]
pub struct MatcherBase {
    /// Latency horizon: how far the per-plane watermarks must have advanced
    /// past a cluster before it may be finalized without a flush.
    pub maximum_latency: u64,
    /// Plane id feeding side A.
    pub plane_a: u8,
    /// Plane id feeding side B.
    pub plane_b: u8,
    /// Largest cluster start time seen on plane A.
    pub latest_a: u64,
    /// Largest cluster start time seen on plane B.
    pub latest_b: u64,
    /// Clusters awaiting a partner, re-sorted chronologically on each match.
    pub unmatched_clusters: ClusterContainer,
    /// Completed events, appended in non-decreasing start-time order.
    pub matched_events: Vec<Event>,
    /// Cumulative number of events emitted.
    pub stats_event_count: usize,
    /// Clusters dropped because their plane matched neither side.
    pub stats_rejected_clusters: usize,
}

impl MatcherBase {
    /// Creates matcher state for the given latency horizon and plane pair.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Self {
        Self {
            maximum_latency,
            plane_a,
            plane_b,
            latest_a: 0,
            latest_b: 0,
            unmatched_clusters: ClusterContainer::new(),
            matched_events: Vec::new(),
            stats_event_count: 0,
            stats_rejected_clusters: 0,
        }
    }

    /// Moves clusters tagged with `plane` into the unmatched pool and
    /// advances that plane's watermark from the last cluster's start time.
    pub fn insert(&mut self, plane: u8, clusters: &mut ClusterContainer) {
        if clusters.is_empty() {
            return;
        }
        if let Some(last) = clusters.back() {
            if plane == self.plane_a {
                self.latest_a = self.latest_a.max(last.time_start());
            } else if plane == self.plane_b {
                self.latest_b = self.latest_b.max(last.time_start());
            } else {
                trace!(plane, count = clusters.len(), "rejecting clusters on unselected plane");
                self.stats_rejected_clusters += clusters.len();
                clusters.clear();
                return;
            }
        }
        self.unmatched_clusters.append(clusters);
    }

    /// Moves clusters into the unmatched pool, routing each by its own
    /// plane id; clusters on foreign planes are rejected and counted.
    pub fn insert_clusters(&mut self, clusters: &mut ClusterContainer) {
        for cluster in clusters.drain(..) {
            let plane = cluster.plane();
            if plane == self.plane_a {
                self.latest_a = self.latest_a.max(cluster.time_start());
            } else if plane == self.plane_b {
                self.latest_b = self.latest_b.max(cluster.time_start());
            } else {
                trace!(plane, "rejecting cluster on unselected plane");
                self.stats_rejected_clusters += 1;
                continue;
            }
            self.unmatched_clusters.push_back(cluster);
        }
    }

    /// A cluster is safe to finalize only once newer clusters on *both*
    /// planes have advanced strictly past its end plus the latency horizon.
    pub fn ready_to_be_matched(&self, cluster: &Cluster) -> bool {
        let horizon = cluster.time_end().saturating_add(self.maximum_latency);
        self.latest_a > horizon && self.latest_b > horizon
    }

    /// Sorts the unmatched pool chronologically by cluster start time.
    /// The sort is stable, so same-start clusters keep insertion order.
    pub fn sort_unmatched(&mut self) {
        self.unmatched_clusters
            .make_contiguous()
            .sort_by_key(Cluster::time_start);
    }

    /// Moves an event into the matched output and counts it.
    pub fn stash_event(&mut self, event: Event) {
        trace!(%event, "stashing event");
        self.stats_event_count += 1;
        self.matched_events.push(event);
    }

    /// Puts the single-plane clusters of a partially built event back into
    /// the unmatched pool. Used when a non-flush match run stops at the
    /// latency horizon: the event must not be emitted with information still
    /// possibly in flight.
    pub fn requeue_clusters(&mut self, event: &mut Event) {
        if !event.cluster_a.is_empty() {
            self.unmatched_clusters
                .push_front(std::mem::take(&mut event.cluster_a));
        }
        if !event.cluster_b.is_empty() {
            self.unmatched_clusters
                .push_front(std::mem::take(&mut event.cluster_b));
        }
        event.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventform_core::Hit;

    fn add_cluster(
        container: &mut ClusterContainer,
        plane: u8,
        coord_start: u16,
        coord_end: u16,
        time_start: u64,
        time_end: u64,
        time_step: u64,
    ) {
        let mut cluster = Cluster::default();
        let mut time = time_start;
        while time <= time_end {
            for coordinate in coord_start..=coord_end {
                cluster.insert(Hit::new(time, coordinate, 1.0, plane));
            }
            time += time_step;
        }
        container.push_back(cluster);
    }

    #[test]
    fn construction() {
        let matcher = MatcherBase::new(100, 3, 7);
        assert_eq!(matcher.unmatched_clusters.len(), 0);
        assert_eq!(matcher.maximum_latency, 100);
        assert_eq!(matcher.plane_a, 3);
        assert_eq!(matcher.plane_b, 7);
    }

    #[test]
    fn inserting_moves_data() {
        let mut matcher = MatcherBase::new(100, 0, 1);
        let mut x = ClusterContainer::new();
        add_cluster(&mut x, 0, 0, 10, 0, 200, 10);
        matcher.insert(0, &mut x);
        assert!(x.is_empty());
    }

    #[test]
    fn accept_both_planes() {
        let mut matcher = MatcherBase::new(100, 0, 1);
        let mut x = ClusterContainer::new();
        let mut y = ClusterContainer::new();

        add_cluster(&mut x, 0, 0, 10, 100, 200, 10);
        matcher.insert(0, &mut x);
        assert_eq!(matcher.unmatched_clusters.len(), 1);
        assert_eq!(matcher.latest_a, 100);
        assert_eq!(matcher.latest_b, 0);

        add_cluster(&mut y, 1, 0, 10, 100, 200, 10);
        matcher.insert(1, &mut y);
        assert_eq!(matcher.unmatched_clusters.len(), 2);
        assert_eq!(matcher.latest_a, 100);
        assert_eq!(matcher.latest_b, 100);
    }

    #[test]
    fn accept_implicit_plane() {
        let mut matcher = MatcherBase::new(100, 0, 1);
        let mut x = ClusterContainer::new();
        let mut y = ClusterContainer::new();

        add_cluster(&mut x, 0, 0, 10, 100, 200, 10);
        matcher.insert_clusters(&mut x);
        assert_eq!(matcher.unmatched_clusters.len(), 1);
        assert_eq!(matcher.latest_a, 100);
        assert_eq!(matcher.latest_b, 0);

        add_cluster(&mut y, 1, 0, 10, 100, 200, 10);
        matcher.insert_clusters(&mut y);
        assert_eq!(matcher.unmatched_clusters.len(), 2);
        assert_eq!(matcher.latest_a, 100);
        assert_eq!(matcher.latest_b, 100);
    }

    #[test]
    fn implicit_insert_rejects_invalid_plane() {
        let mut matcher = MatcherBase::new(100, 0, 1);
        assert_eq!(matcher.stats_rejected_clusters, 0);

        let mut x = ClusterContainer::new();
        add_cluster(&mut x, 8, 0, 10, 100, 200, 10);
        matcher.insert_clusters(&mut x);
        assert_eq!(matcher.stats_rejected_clusters, 1);
        assert_eq!(matcher.unmatched_clusters.len(), 0);
    }

    #[test]
    fn accept_other_plane_pair() {
        let mut matcher = MatcherBase::new(100, 3, 4);
        let mut x = ClusterContainer::new();
        let mut y = ClusterContainer::new();

        add_cluster(&mut x, 3, 0, 10, 100, 200, 10);
        matcher.insert(3, &mut x);
        assert_eq!(matcher.unmatched_clusters.len(), 1);
        assert_eq!(matcher.latest_a, 100);
        assert_eq!(matcher.latest_b, 0);

        add_cluster(&mut y, 4, 0, 10, 100, 200, 10);
        matcher.insert(4, &mut y);
        assert_eq!(matcher.unmatched_clusters.len(), 2);
        assert_eq!(matcher.latest_a, 100);
        assert_eq!(matcher.latest_b, 100);
    }

    #[test]
    fn reject_unselected_planes() {
        let mut matcher = MatcherBase::new(100, 3, 4);
        let mut x = ClusterContainer::new();
        let mut y = ClusterContainer::new();

        add_cluster(&mut x, 7, 0, 10, 100, 200, 10);
        matcher.insert(7, &mut x);
        assert_eq!(matcher.unmatched_clusters.len(), 0);
        assert_eq!(matcher.latest_a, 0);
        assert_eq!(matcher.latest_b, 0);

        add_cluster(&mut y, 0, 0, 10, 100, 200, 10);
        matcher.insert(0, &mut y);
        assert_eq!(matcher.unmatched_clusters.len(), 0);
        assert_eq!(matcher.latest_a, 0);
        assert_eq!(matcher.latest_b, 0);
        assert_eq!(matcher.stats_rejected_clusters, 2);
    }

    #[test]
    fn readiness_is_strict() {
        let mut matcher = MatcherBase::new(100, 0, 1);

        let mut cluster = Cluster::default();
        cluster.insert(Hit::new(0, 0, 0.0, 0));

        assert!(!matcher.ready_to_be_matched(&cluster));

        matcher.latest_a = 99;
        matcher.latest_b = 99;
        assert!(!matcher.ready_to_be_matched(&cluster));

        matcher.latest_a = 100;
        matcher.latest_b = 100;
        assert!(!matcher.ready_to_be_matched(&cluster));

        matcher.latest_a = 101;
        assert!(!matcher.ready_to_be_matched(&cluster));

        matcher.latest_b = 101;
        assert!(matcher.ready_to_be_matched(&cluster));
    }

    #[test]
    fn stash_counts_cumulatively() {
        let mut matcher = MatcherBase::new(100, 0, 1);

        let mut event = Event::default();
        event.insert(Hit::new(0, 0, 0.0, 0));
        event.insert(Hit::new(0, 1, 0.0, 0));

        matcher.stash_event(event.clone());
        assert_eq!(matcher.matched_events.len(), 1);
        assert_eq!(matcher.stats_event_count, 1);

        matcher.matched_events.clear();
        matcher.stash_event(event);
        assert_eq!(matcher.matched_events.len(), 1);
        assert_eq!(matcher.stats_event_count, 2);
    }

    #[test]
    fn requeue_returns_clusters() {
        let mut matcher = MatcherBase::new(100, 0, 1);

        let mut event = Event::default();
        event.insert(Hit::new(0, 0, 1.0, 0));
        event.insert(Hit::new(0, 1, 1.0, 1));
        assert!(event.both_planes());

        matcher.requeue_clusters(&mut event);
        assert!(event.is_empty());
        assert_eq!(matcher.unmatched_clusters.len(), 2);
        assert_eq!(matcher.matched_events.len(), 0);
    }
}
