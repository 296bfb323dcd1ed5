//! Matcher pairing clusters by proximity of their time estimates.

use eventform_core::{Cluster, Event, Result};
use tracing::debug;

use crate::analysis::AnalysisAlgorithm;
use crate::matcher::{Matcher, MatcherBase};
use crate::ClusterContainer;

/// Pairs clusters greedily in time order, comparing per-cluster time
/// estimates instead of raw spans.
///
/// The open event absorbs the next cluster while its plane slot is free and
/// the distance between time estimates stays within `max_delta_time`; a
/// occupied slot or a too-large distance closes the event. The estimate is
/// selected by a configurable time algorithm, because sub-cluster timing
/// models can change which pairing is physically correct.
#[derive(Debug)]
pub struct CenterMatcher {
    base: MatcherBase,
    max_delta_time: u64,
    time_algorithm: AnalysisAlgorithm,
}

impl CenterMatcher {
    /// Creates a matcher for the given latency horizon and plane pair,
    /// defaulting to the center-of-mass time estimate.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Self {
        Self {
            base: MatcherBase::new(maximum_latency, plane_a, plane_b),
            max_delta_time: 0,
            time_algorithm: AnalysisAlgorithm::CenterOfMass,
        }
    }

    /// Sets the maximum distance between cluster time estimates.
    pub fn set_max_delta_time(&mut self, max_delta_time: u64) {
        self.max_delta_time = max_delta_time;
    }

    /// Selects the time estimation algorithm by key: `"center-of-mass"`,
    /// `"charge2"` or `"utpc"`.
    pub fn set_time_algorithm(&mut self, algorithm: &str) -> Result<()> {
        self.time_algorithm = algorithm.parse()?;
        Ok(())
    }

    /// Clusters dropped because their plane matched neither side.
    pub fn stats_rejected_clusters(&self) -> usize {
        self.base.stats_rejected_clusters
    }

    fn cluster_time(&self, cluster: &Cluster) -> f64 {
        match self.time_algorithm {
            AnalysisAlgorithm::Utpc | AnalysisAlgorithm::UtpcWeighted => cluster.time_end() as f64,
            AnalysisAlgorithm::Charge2 => cluster.time_center2(),
            AnalysisAlgorithm::CenterOfMass => cluster.time_center(),
        }
    }
}

impl Matcher for CenterMatcher {
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

            if !event.is_empty() {
                let slot_taken = if cluster.plane() == self.base.plane_a {
                    !event.cluster_a.is_empty()
                } else if cluster.plane() == self.base.plane_b {
                    !event.cluster_b.is_empty()
                } else {
                    // foreign plane; Event::merge will drop it below
                    false
                };
                let too_far = !slot_taken && {
                    let reference = if event.cluster_a.is_empty() {
                        &event.cluster_b
                    } else {
                        &event.cluster_a
                    };
                    let delta = (self.cluster_time(&cluster) - self.cluster_time(reference)).abs();
                    delta > self.max_delta_time as f64
                };
                if slot_taken || too_far {
                    let done = std::mem::replace(
                        &mut event,
                        Event::new(self.base.plane_a, self.base.plane_b),
                    );
                    self.base.stash_event(done);
                }
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
