//! Reduction of matched events into position/time estimates.

use std::str::FromStr;

use eventform_core::{sort_by_increasing_coordinate, Cluster, Error, Event, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position/time estimation algorithm, selected by string key at
/// construction time.
///
/// - `center-of-mass`: amplitude-weighted centroid over all hits.
/// - `charge2`: amplitude-squared-weighted centroid; de-emphasizes small
///   depositions.
/// - `utpc`: the strip with the latest time. Among several strips sharing
///   the latest time, the one nearest a track end wins; remaining ties go to
///   the higher charge, then the later strip. Time is the latest time.
/// - `utpc_weighted`: as `utpc`, but the position is the charge²-weighted
///   center over the winning strip and its 1–2 coordinate neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnalysisAlgorithm {
    /// Amplitude-weighted centroid.
    CenterOfMass,
    /// Amplitude-squared-weighted centroid.
    Charge2,
    /// Latest-strip drift-time estimate.
    Utpc,
    /// Latest-strip estimate, charge²-weighted with neighbours.
    UtpcWeighted,
}

impl FromStr for AnalysisAlgorithm {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            "center-of-mass" => Ok(Self::CenterOfMass),
            "charge2" => Ok(Self::Charge2),
            "utpc" => Ok(Self::Utpc),
            "utpc_weighted" => Ok(Self::UtpcWeighted),
            other => Err(Error::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Reduced estimate for one cluster: a center position and a time.
///
/// The default (and the reduction of an empty cluster) carries a NaN center;
/// downstream code must check finiteness rather than rely on any in-band
/// zero.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReducedHit {
    /// Estimated position along the cluster's axis. NaN when no estimate
    /// could be formed.
    pub center: f64,
    /// Estimated time.
    pub time: u64,
}

impl Default for ReducedHit {
    fn default() -> Self {
        Self {
            center: f64::NAN,
            time: 0,
        }
    }
}

impl ReducedHit {
    /// True if the center estimate is usable.
    pub fn is_center_good(&self) -> bool {
        self.center.is_finite()
    }
}

/// Reduced estimate for a matched event: one estimate per axis, an event
/// time and a quality flag.
///
/// Ephemeral: produced per event and consumed immediately by geometry and
/// serialization. `good` only asserts that both centers are finite; the
/// calling pipeline applies its own minimum-hit-count and geometry
/// thresholds.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReducedEvent {
    /// Estimate for the plane-A cluster.
    pub x: ReducedHit,
    /// Estimate for the plane-B cluster.
    pub y: ReducedHit,
    /// Event time: the later of the two side estimates.
    pub time: u64,
    /// True if both side estimates are finite.
    pub good: bool,
}

/// Reduces events into [`ReducedEvent`]s with the configured algorithm.
#[derive(Debug, Clone, Copy)]
pub struct EventAnalyzer {
    algorithm: AnalysisAlgorithm,
}

impl EventAnalyzer {
    /// Creates an analyzer from an algorithm key.
    pub fn new(algorithm: &str) -> Result<Self> {
        Ok(Self {
            algorithm: algorithm.parse()?,
        })
    }

    /// Creates an analyzer from an already resolved algorithm.
    pub fn with_algorithm(algorithm: AnalysisAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> AnalysisAlgorithm {
        self.algorithm
    }

    /// Reduces one cluster. An empty cluster yields the default estimate
    /// (NaN center).
    ///
    /// The uTPC variants re-order the cluster's hits by coordinate; the
    /// aggregates are unaffected.
    pub fn analyze_cluster(&self, cluster: &mut Cluster) -> ReducedHit {
        if cluster.is_empty() {
            return ReducedHit::default();
        }

        match self.algorithm {
            AnalysisAlgorithm::CenterOfMass => ReducedHit {
                center: cluster.coord_center(),
                time: truncate_time(cluster.time_center()),
            },
            AnalysisAlgorithm::Charge2 => ReducedHit {
                center: cluster.coord_center2(),
                time: truncate_time(cluster.time_center2()),
            },
            AnalysisAlgorithm::Utpc | AnalysisAlgorithm::UtpcWeighted => {
                let weighted = self.algorithm == AnalysisAlgorithm::UtpcWeighted;
                sort_by_increasing_coordinate(&mut cluster.hits);
                // rebuild so the uTPC index window reflects coordinate order
                let mut ordered = Cluster::default();
                for &hit in &cluster.hits {
                    ordered.insert(hit);
                }
                ReducedHit {
                    center: ordered.coord_utpc(weighted),
                    time: ordered.time_end(),
                }
            }
        }
    }

    /// Reduces a matched event. One-sided events are analyzable; the empty
    /// side comes back with a NaN center, which clears `good`.
    pub fn analyze(&self, event: &mut Event) -> ReducedEvent {
        let x = self.analyze_cluster(&mut event.cluster_a);
        let y = self.analyze_cluster(&mut event.cluster_b);
        ReducedEvent {
            good: x.is_center_good() && y.is_center_good(),
            time: x.time.max(y.time),
            x,
            y,
        }
    }
}

fn truncate_time(estimate: f64) -> u64 {
    if estimate.is_finite() && estimate >= 0.0 {
        estimate as u64
    } else {
        0
    }
}
