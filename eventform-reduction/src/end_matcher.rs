//! Matcher pairing clusters whose time spans end close to each other.

use eventform_core::{Cluster, Event};
use tracing::debug;

use crate::matcher::{Matcher, MatcherBase};
use crate::ClusterContainer;

/// Pairs clusters across two planes when the end points of their time spans
/// lie within `max_delta_time` of each other.
///
/// This is a softer adjacency test than full overlap, appropriate when the
/// planes sit on fast coincidence electronics.
#[derive(Debug)]
pub struct EndMatcher {
    base: MatcherBase,
    max_delta_time: u64,
}

impl EndMatcher {
    /// Creates a matcher for the given latency horizon and plane pair.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Self {
        Self {
            base: MatcherBase::new(maximum_latency, plane_a, plane_b),
            max_delta_time: 0,
        }
    }

    /// Sets the maximum distance between span end points for a pairing.
    pub fn set_max_delta_time(&mut self, max_delta_time: u64) {
        self.max_delta_time = max_delta_time;
    }

    /// Clusters dropped because their plane matched neither side.
    pub fn stats_rejected_clusters(&self) -> usize {
        self.base.stats_rejected_clusters
    }

    fn belongs_end(&self, cluster: &Cluster, event: &Event) -> bool {
        event.time_end().abs_diff(cluster.time_end()) <= self.max_delta_time
    }
}

impl Matcher for EndMatcher {
    fn insert(&mut self, plane: u8, clusters: &mut ClusterContainer) {
        self.base.insert(plane, clusters);
    }

    fn insert_clusters(&mut self, clusters: &mut ClusterContainer) {
        self.base.insert_clusters(clusters);
    }

    fn match_events(&mut self, flush: bool) {
        self.base.sort_unmatched();

        let mut event = Event::new(self.base.plane_a, self.base.plane_b);
        while let Some(front) = self.base.unmatched_clusters.front() {
            if !flush && !self.base.ready_to_be_matched(front) {
                debug!("not ready to be matched");
                break;
            }
            let Some(mut cluster) = self.base.unmatched_clusters.pop_front() else {
                break;
            };

            if !event.is_empty() && !self.belongs_end(&cluster, &event) {
                let done = std::mem::replace(
                    &mut event,
                    Event::new(self.base.plane_a, self.base.plane_b),
                );
                self.base.stash_event(done);
            }
            event.merge(&mut cluster);
        }

        if !event.is_empty() {
            if flush {
                self.base.stash_event(event);
            } else {
                self.base.requeue_clusters(&mut event);
            }
        }
    }

    fn matched_events(&self) -> &[Event] {
        &self.base.matched_events
    }

    fn take_matched_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.base.matched_events)
    }

    fn stats_event_count(&self) -> usize {
        self.base.stats_event_count
    }
}
