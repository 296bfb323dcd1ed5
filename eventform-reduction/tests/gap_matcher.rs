//! Scenario tests for the gap matcher, including multi-hit splitting by
//! coordinate gap and amplitude compatibility.

use eventform_core::{Cluster, Hit};
use eventform_reduction::{ClusterContainer, GapMatcher, Matcher};

fn mock_cluster(
    plane: u8,
    coord_start: u16,
    coord_end: u16,
    time_start: u64,
    time_end: u64,
    weight: f32,
) -> Cluster {
    let mut cluster = Cluster::default();
    for coordinate in coord_start..=coord_end {
        cluster.insert(Hit::new(time_start, coordinate, weight, plane));
        cluster.insert(Hit::new(time_end, coordinate, weight, plane));
    }
    cluster
}

fn push(container: &mut ClusterContainer, cluster: Cluster) {
    container.push_back(cluster);
}

#[test]
fn pairs_within_gap() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);

    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 3, 100, 120, 1.0));
    push(&mut y, mock_cluster(1, 0, 3, 130, 150, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    // gap of 10 between the spans stays below the minimum
    assert_eq!(matcher.stats_event_count(), 1);
    assert!(matcher.matched_events()[0].both_planes());
}

#[test]
fn splits_at_large_gap() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);

    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 3, 100, 120, 1.0));
    push(&mut y, mock_cluster(1, 0, 3, 400, 420, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    assert_eq!(matcher.stats_event_count(), 2);
    let events = matcher.matched_events();
    assert!(!events[0].both_planes());
    assert!(!events[1].both_planes());
}

#[test]
fn gap_exactly_at_minimum_stays_together() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);

    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 3, 100, 120, 1.0));
    // span [170,190] leaves a gap of exactly 50
    push(&mut y, mock_cluster(1, 0, 3, 170, 190, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    assert_eq!(matcher.stats_event_count(), 1);
}

#[test]
fn dont_force_holds_events_back() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);

    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 3, 100, 120, 1.0));
    push(&mut y, mock_cluster(1, 0, 3, 130, 150, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(false);
    assert_eq!(matcher.matched_events().len(), 0);

    // newer clusters alone do not emit: the pair merges but is requeued
    // because the cluster after the gap is still inside the horizon
    x.clear();
    push(&mut x, mock_cluster(0, 0, 3, 800, 810, 1.0));
    y.clear();
    push(&mut y, mock_cluster(1, 0, 3, 800, 810, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(false);
    assert_eq!(matcher.matched_events().len(), 0);

    // once even newer data clears the horizon past the middle clusters,
    // the first pair is separated by a ready cluster and gets emitted
    x.clear();
    push(&mut x, mock_cluster(0, 0, 3, 1600, 1610, 1.0));
    y.clear();
    push(&mut y, mock_cluster(1, 0, 3, 1600, 1610, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(false);

    assert_eq!(matcher.matched_events().len(), 1);
    assert!(matcher.matched_events()[0].both_planes());
}

#[test]
fn multi_hit_split_into_two_events() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);
    matcher
        .set_split_multi_events(true, 1.0, 10.0)
        .expect("valid band");
    matcher.set_maximum_coord_span(20);
    matcher.set_minimum_coord_gap(5);

    // Two simultaneous particles: each plane sees one wide double cluster.
    // Amplitudes pair uniquely: (a1 w=20 ~ b1 w=10) and (a2 w=300 ~ b2 w=200).
    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 1, 100, 110, 5.0)); // a1: w=20
    push(&mut x, mock_cluster(0, 50, 51, 100, 110, 75.0)); // a2: w=300
    push(&mut y, mock_cluster(1, 5, 6, 105, 115, 2.5)); // b1: w=10
    push(&mut y, mock_cluster(1, 60, 61, 105, 115, 50.0)); // b2: w=200
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    assert_eq!(matcher.stats_event_count(), 2);
    assert_eq!(matcher.stats_discarded_span_too_large, 0);
    let events = matcher.matched_events();
    assert_eq!(events.len(), 2);
    for event in events {
        assert!(event.both_planes());
    }
    // the low-amplitude pair
    let low = events
        .iter()
        .find(|event| event.cluster_a.coord_start() == 0)
        .expect("low pair");
    assert_eq!(low.cluster_a.weight_sum(), 20.0);
    assert_eq!(low.cluster_b.weight_sum(), 10.0);
    // the high-amplitude pair
    let high = events
        .iter()
        .find(|event| event.cluster_a.coord_start() == 50)
        .expect("high pair");
    assert_eq!(high.cluster_a.weight_sum(), 300.0);
    assert_eq!(high.cluster_b.weight_sum(), 200.0);
}

#[test]
fn ambiguous_split_is_discarded() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);
    matcher
        .set_split_multi_events(true, 1.0, 10.0)
        .expect("valid band");
    matcher.set_maximum_coord_span(20);
    matcher.set_minimum_coord_gap(5);

    // a1 (w=20) is amplitude-compatible with both b1 (w=10) and b2 (w=15):
    // no unambiguous assignment exists
    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 1, 100, 110, 5.0)); // a1: w=20
    push(&mut x, mock_cluster(0, 50, 51, 100, 110, 75.0)); // a2: w=300
    push(&mut y, mock_cluster(1, 5, 6, 105, 115, 2.5)); // b1: w=10
    push(&mut y, mock_cluster(1, 60, 61, 105, 115, 3.75)); // b2: w=15
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    assert_eq!(matcher.stats_event_count(), 0);
    assert_eq!(matcher.stats_discarded_span_too_large, 1);
}

#[test]
fn split_disabled_keeps_wide_event() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(50);

    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 1, 100, 110, 5.0));
    push(&mut x, mock_cluster(0, 50, 51, 100, 110, 75.0));
    push(&mut y, mock_cluster(1, 5, 6, 105, 115, 2.5));
    push(&mut y, mock_cluster(1, 60, 61, 105, 115, 50.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    assert_eq!(matcher.stats_event_count(), 1);
    let event = &matcher.matched_events()[0];
    assert_eq!(event.cluster_a.coord_span(), 52);
    assert_eq!(event.cluster_b.coord_span(), 57);
}

#[test]
fn invalid_amplitude_band_is_rejected() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    assert!(matcher.set_split_multi_events(true, 2.0, 1.0).is_err());
    assert!(matcher.set_split_multi_events(true, -1.0, 1.0).is_err());
    assert!(matcher.set_split_multi_events(true, 1.0, f64::NAN).is_err());
    assert!(matcher.set_split_multi_events(true, 1.0, 10.0).is_ok());
}

#[test]
fn events_emitted_in_start_order() {
    let mut matcher = GapMatcher::new(600, 0, 1);
    matcher.set_minimum_time_gap(10);

    let mut x = ClusterContainer::new();
    let mut y = ClusterContainer::new();
    push(&mut x, mock_cluster(0, 0, 3, 100, 110, 1.0));
    push(&mut y, mock_cluster(1, 0, 3, 105, 115, 1.0));
    push(&mut x, mock_cluster(0, 0, 3, 300, 310, 1.0));
    push(&mut y, mock_cluster(1, 0, 3, 305, 315, 1.0));
    push(&mut x, mock_cluster(0, 0, 3, 500, 510, 1.0));
    matcher.insert(0, &mut x);
    matcher.insert(1, &mut y);
    matcher.match_events(true);

    let events = matcher.matched_events();
    assert_eq!(events.len(), 3);
    for pair in events.windows(2) {
        assert!(pair[0].time_start() <= pair[1].time_start());
    }
}
