//! Matcher pairing clusters whose time spans overlap.

use eventform_core::Event;
use tracing::debug;

use crate::matcher::{Matcher, MatcherBase};
use crate::ClusterContainer;

/// Pairs clusters across two planes only when their time intervals overlap.
///
/// Strictly stricter than [`EndMatcher`](crate::EndMatcher); used for
/// instruments with well-separated drift times.
#[derive(Debug)]
pub struct OverlapMatcher {
    base: MatcherBase,
}

impl OverlapMatcher {
    /// Creates a matcher for the given latency horizon and plane pair.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Self {
        Self {
            base: MatcherBase::new(maximum_latency, plane_a, plane_b),
        }
    }

    /// Clusters dropped because their plane matched neither side.
    pub fn stats_rejected_clusters(&self) -> usize {
        self.base.stats_rejected_clusters
    }
}

impl Matcher for OverlapMatcher {
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

            if !event.is_empty() && event.time_overlap(&cluster) == 0 {
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
