//! Matcher segmenting the merged cluster stream at time gaps, with optional
//! splitting of pile-up (multi-hit) events by coordinate gap and amplitude.

use eventform_core::{sort_by_increasing_coordinate, Cluster, Error, Event, Result};
use tracing::debug;

use crate::matcher::{Matcher, MatcherBase};
use crate::ClusterContainer;

/// Treats the unmatched clusters of both planes as one time-sorted stream and
/// starts a new event whenever the gap between the open event's span and the
/// next cluster exceeds `minimum_time_gap`.
///
/// With multi-hit splitting enabled, an event whose coordinate span on either
/// plane reaches `maximum_coord_span` is assumed to contain two simultaneous
/// particles. Each side is partitioned at coordinate gaps larger than
/// `minimum_coord_gap` and sub-clusters are paired across planes by amplitude
/// compatibility: the weight sums must satisfy
/// `low · w_b ≤ w_a ≤ high · w_b`. If the partition does not produce an
/// unambiguous 1-to-1 pairing the whole event is discarded — ambiguous data
/// cannot be recovered, only counted.
#[derive(Debug)]
pub struct GapMatcher {
    base: MatcherBase,
    minimum_time_gap: u64,
    split_multi_events: bool,
    coefficient_low: f64,
    coefficient_high: f64,
    maximum_coord_span: u16,
    minimum_coord_gap: u16,
    /// Events discarded because a too-wide span could not be split
    /// unambiguously.
    pub stats_discarded_span_too_large: usize,
}

impl GapMatcher {
    /// Creates a matcher for the given latency horizon and plane pair.
    /// Splitting is off by default.
    pub fn new(maximum_latency: u64, plane_a: u8, plane_b: u8) -> Self {
        Self {
            base: MatcherBase::new(maximum_latency, plane_a, plane_b),
            minimum_time_gap: 0,
            split_multi_events: false,
            coefficient_low: 1.0,
            coefficient_high: 1.0,
            maximum_coord_span: u16::MAX,
            minimum_coord_gap: 0,
            stats_discarded_span_too_large: 0,
        }
    }

    /// Sets the minimum time gap separating two events.
    pub fn set_minimum_time_gap(&mut self, minimum_time_gap: u64) {
        self.minimum_time_gap = minimum_time_gap;
    }

    /// Enables or disables multi-hit splitting and sets the amplitude
    /// compatibility band.
    pub fn set_split_multi_events(
        &mut self,
        split_multi_events: bool,
        coefficient_low: f64,
        coefficient_high: f64,
    ) -> Result<()> {
        if !coefficient_low.is_finite()
            || !coefficient_high.is_finite()
            || coefficient_low < 0.0
            || coefficient_high < coefficient_low
        {
            return Err(Error::InvalidAmplitudeBand {
                low: coefficient_low,
                high: coefficient_high,
            });
        }
        self.split_multi_events = split_multi_events;
        self.coefficient_low = coefficient_low;
        self.coefficient_high = coefficient_high;
        Ok(())
    }

    /// Sets the coordinate span at which an event is considered a multi-hit
    /// candidate.
    pub fn set_maximum_coord_span(&mut self, maximum_coord_span: u16) {
        self.maximum_coord_span = maximum_coord_span;
    }

    /// Sets the coordinate gap at which a too-wide cluster is partitioned.
    pub fn set_minimum_coord_gap(&mut self, minimum_coord_gap: u16) {
        self.minimum_coord_gap = minimum_coord_gap;
    }

    /// Clusters dropped because their plane matched neither side.
    pub fn stats_rejected_clusters(&self) -> usize {
        self.base.stats_rejected_clusters
    }

    fn clusters_match(&self, cluster_a: &Cluster, cluster_b: &Cluster) -> bool {
        let wa = cluster_a.weight_sum();
        let wb = cluster_b.weight_sum();
        wa >= self.coefficient_low * wb && wa <= self.coefficient_high * wb
    }

    fn stash_or_split(&mut self, event: Event) {
        if !self.split_multi_events
            || (event.cluster_a.coord_span() < self.maximum_coord_span
                && event.cluster_b.coord_span() < self.maximum_coord_span)
        {
            self.base.stash_event(event);
        } else {
            debug!(%event, "span too large, attempting multi-hit split");
            self.split_and_stash(event);
        }
    }

    fn split_and_stash(&mut self, mut event: Event) {
        let subs_a = split_by_coord_gap(&mut event.cluster_a, self.minimum_coord_gap);
        let mut subs_b = split_by_coord_gap(&mut event.cluster_b, self.minimum_coord_gap);

        // Each sub-cluster may be amplitude-compatible with at most one
        // partner on the other plane; anything else is unrecoverable.
        for sub_b in &subs_b {
            let partners = subs_a
                .iter()
                .filter(|sub_a| self.clusters_match(sub_a, sub_b))
                .count();
            if partners > 1 {
                debug!("ambiguous amplitude pairing, discarding event");
                self.stats_discarded_span_too_large += 1;
                return;
            }
        }

        let mut paired = Vec::new();
        let mut used_b = vec![false; subs_b.len()];
        for mut sub_a in subs_a {
            let mut partner = None;
            for (j, sub_b) in subs_b.iter().enumerate() {
                if self.clusters_match(&sub_a, sub_b) {
                    if partner.is_some() {
                        debug!("ambiguous amplitude pairing, discarding event");
                        self.stats_discarded_span_too_large += 1;
                        return;
                    }
                    partner = Some(j);
                }
            }
            if let Some(j) = partner {
                if used_b[j] {
                    self.stats_discarded_span_too_large += 1;
                    return;
                }
                used_b[j] = true;
                let mut sub_event = Event::new(self.base.plane_a, self.base.plane_b);
                sub_event.merge(&mut sub_a);
                sub_event.merge(&mut subs_b[j]);
                paired.push(sub_event);
            }
        }

        if paired.is_empty() {
            debug!("no amplitude-compatible pairing found, discarding event");
            self.stats_discarded_span_too_large += 1;
            return;
        }
        for sub_event in paired {
            self.base.stash_event(sub_event);
        }
    }
}

/// Partitions a cluster's hits, sorted by coordinate, wherever the step to
/// the next coordinate exceeds `minimum_coord_gap`. The source cluster is
/// consumed.
fn split_by_coord_gap(cluster: &mut Cluster, minimum_coord_gap: u16) -> Vec<Cluster> {
    sort_by_increasing_coordinate(&mut cluster.hits);

    let mut parts = Vec::new();
    let mut current = Cluster::default();
    let mut last_coord = 0u16;
    for &hit in &cluster.hits {
        if !current.is_empty() && hit.coordinate - last_coord > minimum_coord_gap {
            parts.push(std::mem::take(&mut current));
        }
        last_coord = hit.coordinate;
        current.insert(hit);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    cluster.clear();
    parts
}

impl Matcher for GapMatcher {
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

            if !event.is_empty() && event.time_gap(&cluster) > self.minimum_time_gap {
                let done = std::mem::replace(
                    &mut event,
                    Event::new(self.base.plane_a, self.base.plane_b),
                );
                self.stash_or_split(done);
            }
            event.merge(&mut cluster);
        }

        if !event.is_empty() {
            if flush {
                self.stash_or_split(event);
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
