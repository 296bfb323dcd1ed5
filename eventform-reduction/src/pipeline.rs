//! A plane-pair reduction pipeline: clusterers → matcher → analyzer →
//! geometry/serialization collaborators.

use eventform_core::Hit;
use tracing::debug;

use crate::analysis::EventAnalyzer;
use crate::gap_clusterer::GapClusterer;
use crate::matcher::Matcher;

/// Detector geometry collaborator: maps reduced positions to a pixel id.
/// A return of 0 means the position falls outside the detector.
pub trait PixelLookup {
    /// Pixel id for the given reduced coordinates, 0 if invalid.
    fn pixel_id(&self, x: f64, y: f64) -> u32;
}

/// Serialization/transmission collaborator.
pub trait EventSink {
    /// Records one event, returning the number of bytes written.
    fn add_event(&mut self, time: u64, pixel: u32) -> usize;
}

/// Counters for the pipeline's data-quality outcomes.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineStats {
    /// Events reduced and handed to the sink.
    pub events_produced: usize,
    /// Events whose reduction was not usable (non-finite center).
    pub events_not_good: usize,
    /// Events whose reduced position fell outside the detector.
    pub geometry_errors: usize,
    /// Hits that belonged to neither configured plane.
    pub hits_ignored: usize,
    /// Total bytes reported by the sink.
    pub bytes_written: usize,
}

/// Synchronous reduction pipeline for one detector plane pair.
///
/// Owns one [`GapClusterer`] per plane, a matcher and an analyzer. Each
/// stage's output container is moved into the next stage, never shared;
/// running several pipelines for disjoint plane pairs in parallel requires
/// no coordination.
pub struct PlanePairPipeline {
    plane_a: u8,
    plane_b: u8,
    clusterer_a: GapClusterer,
    clusterer_b: GapClusterer,
    matcher: Box<dyn Matcher + Send>,
    analyzer: EventAnalyzer,
    /// Data-quality counters, reset only by recreating the pipeline.
    pub stats: PipelineStats,
}

impl PlanePairPipeline {
    /// Wires up a pipeline. The matcher must be configured for the same
    /// plane pair.
    pub fn new(
        plane_a: u8,
        plane_b: u8,
        clusterer_a: GapClusterer,
        clusterer_b: GapClusterer,
        matcher: Box<dyn Matcher + Send>,
        analyzer: EventAnalyzer,
    ) -> Self {
        Self {
            plane_a,
            plane_b,
            clusterer_a,
            clusterer_b,
            matcher,
            analyzer,
            stats: PipelineStats::default(),
        }
    }

    /// Processes one chronologically sorted batch of decoded hits and emits
    /// whatever has become safe to finalize. Call [`flush`](Self::flush)
    /// once at stream end to drain the remainder.
    pub fn process<G: PixelLookup, S: EventSink>(
        &mut self,
        hits: &[Hit],
        geometry: &G,
        sink: &mut S,
    ) {
        for &hit in hits {
            if hit.plane == self.plane_a {
                self.clusterer_a.insert(hit);
            } else if hit.plane == self.plane_b {
                self.clusterer_b.insert(hit);
            } else {
                self.stats.hits_ignored += 1;
            }
        }
        self.hand_off();
        self.matcher.match_events(false);
        self.reduce(geometry, sink);
    }

    /// Drains all remaining state: closes open clusters, force-matches the
    /// queue and reduces everything. Idempotent; leaves no pending data.
    pub fn flush<G: PixelLookup, S: EventSink>(&mut self, geometry: &G, sink: &mut S) {
        self.clusterer_a.flush();
        self.clusterer_b.flush();
        self.hand_off();
        self.matcher.match_events(true);
        self.reduce(geometry, sink);
    }

    fn hand_off(&mut self) {
        self.matcher.insert(self.plane_a, &mut self.clusterer_a.clusters);
        self.matcher.insert(self.plane_b, &mut self.clusterer_b.clusters);
    }

    fn reduce<G: PixelLookup, S: EventSink>(&mut self, geometry: &G, sink: &mut S) {
        for mut event in self.matcher.take_matched_events() {
            let reduced = self.analyzer.analyze(&mut event);
            if !reduced.good {
                self.stats.events_not_good += 1;
                continue;
            }
            let pixel = geometry.pixel_id(reduced.x.center, reduced.y.center);
            if pixel == 0 {
                debug!(x = reduced.x.center, y = reduced.y.center, "invalid pixel");
                self.stats.geometry_errors += 1;
                continue;
            }
            self.stats.bytes_written += sink.add_event(reduced.time, pixel);
            self.stats.events_produced += 1;
        }
    }
}
