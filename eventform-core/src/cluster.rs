//! 1D cluster: a plane-aware container of hits with incremental aggregates.

use crate::hit::Hit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A container of hits, aware of its plane, bounds and weight.
///
/// Hits can be added, but not removed. Coordinates and timestamps are treated
/// as having an uncertainty of 1 when evaluating dimensions, thus including
/// the endpoints: a cluster holding a single hit already has a time span and
/// coordinate span of 1.
///
/// All aggregates are maintained incrementally on [`insert`](Self::insert)
/// and [`merge`](Self::merge), so bound and centroid queries are O(1).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Hits in insertion order.
    ///
    /// Left public because reduction/analysis strategies must be able to sort
    /// hits in their preferred order without copying the contents. Re-sorting
    /// does not disturb the aggregates, which are order-independent, but it
    /// does invalidate the uTPC index window until the cluster is rebuilt.
    pub hits: Vec<Hit>,

    plane: u8,

    coord_start: u16,
    coord_end: u16,
    coord_earliest: u16,
    coord_latest: u16,

    time_start: u64,
    time_end: u64,

    weight_sum: f64,
    coord_mass: f64,
    time_mass: f64,

    weight2_sum: f64,
    coord_mass2: f64,
    time_mass2: f64,

    utpc_idx_min: usize,
    utpc_idx_max: usize,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            hits: Vec::new(),
            plane: Hit::INVALID_PLANE,
            coord_start: Hit::INVALID_COORD,
            coord_end: 0,
            coord_earliest: Hit::INVALID_COORD,
            coord_latest: Hit::INVALID_COORD,
            time_start: u64::MAX,
            time_end: 0,
            weight_sum: 0.0,
            coord_mass: 0.0,
            time_mass: 0.0,
            weight2_sum: 0.0,
            coord_mass2: 0.0,
            time_mass2: 0.0,
            utpc_idx_min: 0,
            utpc_idx_max: 0,
        }
    }
}

impl Cluster {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hit to the cluster, accumulates mass and recalculates bounds.
    ///
    /// No validation is enforced and duplicates are legal: a repeated readout
    /// at the same coordinate and time increases the weight sum as well as
    /// the hit count. No particular time or spatial ordering is expected.
    /// Hits should have non-zero weight if the center of mass is to be
    /// meaningful. Invalidates the plane if planes don't match, but still
    /// adds the hit.
    pub fn insert(&mut self, hit: Hit) {
        if self.hits.is_empty() {
            self.plane = hit.plane;
            self.time_start = hit.time;
            self.time_end = hit.time;
            self.coord_start = hit.coordinate;
            self.coord_end = hit.coordinate;
            self.coord_earliest = hit.coordinate;
            self.coord_latest = hit.coordinate;
            self.utpc_idx_min = 0;
            self.utpc_idx_max = 0;
        } else if self.plane != hit.plane {
            // Mixed-plane content is a data-quality signal, not a fatal
            // condition; the hits are kept.
            self.plane = Hit::INVALID_PLANE;
        }

        self.hits.push(hit);
        let idx = self.hits.len() - 1;

        let weight = f64::from(hit.weight);
        let coordinate = f64::from(hit.coordinate);
        let time = hit.time as f64;

        self.weight_sum += weight;
        self.weight2_sum += weight * weight;
        self.coord_mass += weight * coordinate;
        self.coord_mass2 += weight * weight * coordinate;
        self.time_mass += weight * time;
        self.time_mass2 += weight * weight * time;

        if hit.time < self.time_start {
            self.time_start = hit.time;
            self.coord_earliest = hit.coordinate;
        }

        // More than one hit with the identical largest time widens the uTPC
        // index window instead of moving it.
        if hit.time == self.time_end {
            self.utpc_idx_max = idx;
        } else if hit.time > self.time_end {
            self.utpc_idx_min = idx;
            self.utpc_idx_max = idx;
            self.time_end = hit.time;
            self.coord_latest = hit.coordinate;
        }

        self.coord_start = self.coord_start.min(hit.coordinate);
        self.coord_end = self.coord_end.max(hit.coordinate);
    }

    /// Merges another cluster into this one.
    ///
    /// Moves the hits from the other cluster, rendering it empty, and
    /// combines the aggregates in O(1). Invalidates the plane if planes
    /// don't match, but still merges.
    pub fn merge(&mut self, other: &mut Cluster) {
        if other.hits.is_empty() {
            return;
        }

        if self.hits.is_empty() {
            *self = std::mem::take(other);
            return;
        }

        if other.plane != self.plane {
            self.plane = Hit::INVALID_PLANE;
        }

        if other.time_start < self.time_start {
            self.coord_earliest = other.coord_earliest;
        }
        let offset = self.hits.len();
        if other.time_end > self.time_end {
            self.coord_latest = other.coord_latest;
            self.utpc_idx_min = offset + other.utpc_idx_min;
            self.utpc_idx_max = offset + other.utpc_idx_max;
        } else if other.time_end == self.time_end {
            self.utpc_idx_max = offset + other.utpc_idx_max;
        }

        self.hits.append(&mut other.hits);

        self.weight_sum += other.weight_sum;
        self.weight2_sum += other.weight2_sum;
        self.coord_mass += other.coord_mass;
        self.coord_mass2 += other.coord_mass2;
        self.time_mass += other.time_mass;
        self.time_mass2 += other.time_mass2;
        self.time_start = self.time_start.min(other.time_start);
        self.time_end = self.time_end.max(other.time_end);
        self.coord_start = self.coord_start.min(other.coord_start);
        self.coord_end = self.coord_end.max(other.coord_end);

        other.clear();
    }

    /// Clears hits and resets calculated values.
    ///
    /// Retains the hit buffer's capacity so the cluster object can be reused
    /// on the hot path without reallocating. Callers must not hold data
    /// obtained from `hits` before the clear.
    pub fn clear(&mut self) {
        let mut hits = std::mem::take(&mut self.hits);
        hits.clear();
        *self = Self::default();
        self.hits = hits;
    }

    /// Returns true if the cluster contains no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns true if the cluster contains hits and all are on the same plane.
    pub fn is_valid(&self) -> bool {
        !self.hits.is_empty() && self.plane != Hit::INVALID_PLANE
    }

    /// Returns the common plane of all hits in the cluster, or
    /// [`Hit::INVALID_PLANE`] if hits from several planes have been merged in.
    pub fn plane(&self) -> u8 {
        self.plane
    }

    /// Number of hits in the cluster.
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Checks whether the coordinate span exceeds what the hit count plus the
    /// maximum allowed gap could cover, i.e. whether a coordinate gap larger
    /// than `max_allowed_gap` must be present.
    pub fn has_gap(&self, max_allowed_gap: u16) -> bool {
        self.hits.len() + usize::from(max_allowed_gap) < usize::from(self.coord_span())
    }

    /// Lowest coordinate; undefined for an empty cluster.
    pub fn coord_start(&self) -> u16 {
        self.coord_start
    }

    /// Highest coordinate; undefined for an empty cluster.
    pub fn coord_end(&self) -> u16 {
        self.coord_end
    }

    /// Coordinate of the earliest hit in time; undefined for an empty cluster.
    pub fn coord_earliest(&self) -> u16 {
        self.coord_earliest
    }

    /// Coordinate of the latest hit in time; undefined for an empty cluster.
    pub fn coord_latest(&self) -> u16 {
        self.coord_latest
    }

    /// Coordinate span including both endpoints, 0 for an empty cluster.
    pub fn coord_span(&self) -> u16 {
        if self.hits.is_empty() {
            return 0;
        }
        (self.coord_end - self.coord_start) + 1
    }

    /// Earliest timestamp; undefined for an empty cluster.
    pub fn time_start(&self) -> u64 {
        self.time_start
    }

    /// Latest timestamp; undefined for an empty cluster.
    pub fn time_end(&self) -> u64 {
        self.time_end
    }

    /// Time span including both endpoints, 0 for an empty cluster.
    pub fn time_span(&self) -> u64 {
        if self.hits.is_empty() {
            return 0;
        }
        (self.time_end - self.time_start) + 1
    }

    /// Pre-calculated sum of each hit's weight.
    pub fn weight_sum(&self) -> f64 {
        self.weight_sum
    }

    /// Pre-calculated sum of each hit's weight squared.
    pub fn weight2_sum(&self) -> f64 {
        self.weight2_sum
    }

    /// Pre-calculated sum of each hit's weight*coordinate.
    pub fn coord_mass(&self) -> f64 {
        self.coord_mass
    }

    /// Center of mass in the coordinate dimension.
    ///
    /// NaN if the weight sum is zero. This is deliberate IEEE-754 behavior
    /// relied upon by downstream finiteness checks; it is not clamped.
    pub fn coord_center(&self) -> f64 {
        self.coord_mass / self.weight_sum
    }

    /// Pre-calculated sum of each hit's weight*time.
    pub fn time_mass(&self) -> f64 {
        self.time_mass
    }

    /// Center of mass in the time dimension. NaN if the weight sum is zero.
    pub fn time_center(&self) -> f64 {
        self.time_mass / self.weight_sum
    }

    /// Pre-calculated sum of each hit's weight²·coordinate.
    pub fn coord_mass2(&self) -> f64 {
        self.coord_mass2
    }

    /// Weight-squared center of mass in the coordinate dimension.
    /// NaN if the weight sum is zero.
    pub fn coord_center2(&self) -> f64 {
        self.coord_mass2 / self.weight2_sum
    }

    /// Pre-calculated sum of each hit's weight²·time.
    pub fn time_mass2(&self) -> f64 {
        self.time_mass2
    }

    /// Weight-squared center of mass in the time dimension.
    /// NaN if the weight sum is zero.
    pub fn time_center2(&self) -> f64 {
        self.time_mass2 / self.weight2_sum
    }

    /// uTPC coordinate estimate: the coordinate of the latest-in-time hit,
    /// optionally charge²-weighted with its coordinate neighbours.
    ///
    /// When several hits share the largest time, the uTPC index window picks
    /// the one nearest a track end; ties are broken by larger weight, then by
    /// the later index. The estimate assumes `hits` is sorted by increasing
    /// coordinate and that the index window was built in that order.
    ///
    /// NaN for an empty cluster.
    pub fn coord_utpc(&self, weighted: bool) -> f64 {
        if self.hits.is_empty() {
            return f64::NAN;
        }

        let last = self.hits.len() - 1;
        let utpc_idx = if self.utpc_idx_min == self.utpc_idx_max {
            self.utpc_idx_max
        } else {
            let from_end = last - self.utpc_idx_max;
            if self.utpc_idx_min < from_end {
                self.utpc_idx_min
            } else if self.utpc_idx_min > from_end {
                self.utpc_idx_max
            } else if self.hits[self.utpc_idx_min].weight > self.hits[self.utpc_idx_max].weight {
                self.utpc_idx_min
            } else {
                self.utpc_idx_max
            }
        };

        if !weighted {
            return f64::from(self.hits[utpc_idx].coordinate);
        }

        // Charge²-weighted center over the latest strip and its neighbours.
        let c2 = f64::from(self.hits[utpc_idx].coordinate);
        let w2 = f64::from(self.hits[utpc_idx].weight);
        let (mut c1, mut w1) = (0.0, 0.0);
        let (mut c3, mut w3) = (0.0, 0.0);
        if utpc_idx > 0 {
            c1 = f64::from(self.hits[utpc_idx - 1].coordinate);
            w1 = f64::from(self.hits[utpc_idx - 1].weight);
        }
        if utpc_idx < last {
            c3 = f64::from(self.hits[utpc_idx + 1].coordinate);
            w3 = f64::from(self.hits[utpc_idx + 1].weight);
        }
        (c1 * w1 * w1 + c2 * w2 * w2 + c3 * w3 * w3) / (w1 * w1 + w2 * w2 + w3 * w3)
    }

    /// Overlapping time span of two clusters, inclusive of endpoints.
    /// Zero if the spans are disjoint or either cluster is empty.
    pub fn time_overlap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return 0;
        }
        let latest_start = self.time_start.max(other.time_start);
        let earliest_end = self.time_end.min(other.time_end);
        if latest_start > earliest_end {
            return 0;
        }
        (earliest_end - latest_start) + 1
    }

    /// Time gap between two clusters, zero if their spans touch or overlap.
    ///
    /// The gap involving an empty cluster is undefined and reported as
    /// `u64::MAX`.
    pub fn time_gap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return u64::MAX;
        }
        let latest_start = self.time_start.max(other.time_start);
        let earliest_end = self.time_end.min(other.time_end);
        if latest_start <= earliest_end {
            return 0;
        }
        latest_start - earliest_end
    }
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "plane={} time=({},{})={} space=({},{})={} weight={} entries[{}]",
            self.plane,
            self.time_start,
            self.time_end,
            self.time_span(),
            self.coord_start,
            self.coord_end,
            self.coord_span(),
            self.weight_sum,
            self.hits.len()
        )
    }
}
