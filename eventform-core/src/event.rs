//! Event: a matched pair of clusters from two independent readout planes.

use crate::cluster::Cluster;
use crate::hit::Hit;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A pairing of one cluster from plane A with one from plane B.
///
/// Either side may be empty (a one-sided event) but a non-empty event always
/// has at least one hit somewhere. Hits and clusters are routed to a side by
/// their plane id; anything on a foreign plane is ignored.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Cluster on plane A.
    pub cluster_a: Cluster,
    /// Cluster on plane B.
    pub cluster_b: Cluster,

    plane_a: u8,
    plane_b: u8,
}

impl Default for Event {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

impl Event {
    /// Creates an empty event for the given plane pair.
    pub fn new(plane_a: u8, plane_b: u8) -> Self {
        Self {
            cluster_a: Cluster::default(),
            cluster_b: Cluster::default(),
            plane_a,
            plane_b,
        }
    }

    /// Plane id assigned to side A.
    pub fn plane_a(&self) -> u8 {
        self.plane_a
    }

    /// Plane id assigned to side B.
    pub fn plane_b(&self) -> u8 {
        self.plane_b
    }

    /// Routes a hit to side A or B by its plane; hits from other planes are
    /// ignored.
    pub fn insert(&mut self, hit: Hit) {
        if hit.plane == self.plane_a {
            self.cluster_a.insert(hit);
        } else if hit.plane == self.plane_b {
            self.cluster_b.insert(hit);
        }
    }

    /// Routes a cluster to side A or B by its plane and merges it in,
    /// emptying the source. Clusters from other planes are ignored.
    pub fn merge(&mut self, cluster: &mut Cluster) {
        if cluster.plane() == self.plane_a {
            self.cluster_a.merge(cluster);
        } else if cluster.plane() == self.plane_b {
            self.cluster_b.merge(cluster);
        }
    }

    /// Clears both sides.
    pub fn clear(&mut self) {
        self.cluster_a.clear();
        self.cluster_b.clear();
    }

    /// Returns true if both sides are empty.
    pub fn is_empty(&self) -> bool {
        self.cluster_a.is_empty() && self.cluster_b.is_empty()
    }

    /// Returns true if both sides hold hits.
    pub fn both_planes(&self) -> bool {
        !self.cluster_a.is_empty() && !self.cluster_b.is_empty()
    }

    /// Total number of hits on both sides.
    pub fn total_hit_count(&self) -> usize {
        self.cluster_a.hit_count() + self.cluster_b.hit_count()
    }

    /// Earliest timestamp over both sides; undefined for an empty event.
    pub fn time_start(&self) -> u64 {
        if self.cluster_a.is_empty() {
            return self.cluster_b.time_start();
        }
        if self.cluster_b.is_empty() {
            return self.cluster_a.time_start();
        }
        self.cluster_a.time_start().min(self.cluster_b.time_start())
    }

    /// Latest timestamp over both sides; undefined for an empty event.
    pub fn time_end(&self) -> u64 {
        if self.cluster_a.is_empty() {
            return self.cluster_b.time_end();
        }
        if self.cluster_b.is_empty() {
            return self.cluster_a.time_end();
        }
        self.cluster_a.time_end().max(self.cluster_b.time_end())
    }

    /// Time span of the union of both sides, inclusive of endpoints.
    pub fn time_span(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.time_end() - self.time_start()) + 1
    }

    /// Overlap between this event's time span and a cluster's, inclusive of
    /// endpoints. Zero if either is empty or the spans are disjoint.
    pub fn time_overlap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return 0;
        }
        let latest_start = self.time_start().max(other.time_start());
        let earliest_end = self.time_end().min(other.time_end());
        if latest_start > earliest_end {
            return 0;
        }
        (earliest_end - latest_start) + 1
    }

    /// Gap between this event's time span and a cluster's; zero if they touch
    /// or overlap, `u64::MAX` if either is empty.
    pub fn time_gap(&self, other: &Cluster) -> u64 {
        if self.is_empty() || other.is_empty() {
            return u64::MAX;
        }
        let latest_start = self.time_start().max(other.time_start());
        let earliest_end = self.time_end().min(other.time_end());
        if latest_start <= earliest_end {
            return 0;
        }
        latest_start - earliest_end
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event planes({}{},{}{})",
            self.plane_a,
            if self.cluster_a.is_empty() { "" } else { "*" },
            self.plane_b,
            if self.cluster_b.is_empty() { "" } else { "*" },
        )
    }
}
