//! eventform-reduction: the event-formation reduction engine.
//!
//! Groups a time-ordered stream of detector hits into clusters per readout
//! plane ([`GapClusterer`], [`Hierarchical2DClusterer`]), pairs clusters from
//! two independent planes into events under a bounded latency horizon
//! ([`EndMatcher`], [`OverlapMatcher`], [`GapMatcher`], [`CenterMatcher`]),
//! and reduces matched events into position/time estimates
//! ([`EventAnalyzer`]).
//!
//! All stages are synchronous, CPU-bound and single-owner: containers are
//! moved between stages, never shared. Parallel invocation across disjoint
//! detector regions is the orchestrator's business (see [`parallel`]).
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_lossless,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

use std::collections::VecDeque;

use eventform_core::{Cluster, Cluster2D};

pub mod analysis;
pub mod center_matcher;
pub mod end_matcher;
pub mod gap_clusterer;
pub mod gap_matcher;
pub mod hierarchical2d;
pub mod matcher;
pub mod overlap_matcher;
pub mod parallel;
pub mod pipeline;

pub use analysis::{AnalysisAlgorithm, EventAnalyzer, ReducedEvent, ReducedHit};
pub use center_matcher::CenterMatcher;
pub use end_matcher::EndMatcher;
pub use gap_clusterer::GapClusterer;
pub use gap_matcher::GapMatcher;
pub use hierarchical2d::Hierarchical2DClusterer;
pub use matcher::{Matcher, MatcherBase};
pub use overlap_matcher::OverlapMatcher;
pub use parallel::cluster_subwindows;
pub use pipeline::{EventSink, PipelineStats, PixelLookup, PlanePairPipeline};

/// Clusters produced by a clusterer, in stash order, consumed by a matcher.
pub type ClusterContainer = VecDeque<Cluster>;

/// 2D clusters produced by a 2D clusterer, in stash order.
pub type Cluster2DContainer = VecDeque<Cluster2D>;
