use spindown_fitting::common::{braking_index, NormalizedTime, SampleSeries};
use spindown_fitting::error::FitError;

// ---------------------------------------------------------------------------
// SampleSeries::from_raw
// ---------------------------------------------------------------------------

#[test]
fn from_raw_sorts_by_time() {
    let times = vec![3.0, 1.0, 2.0];
    let values = vec![30.0, 10.0, 20.0];
    let series = SampleSeries::from_raw(&times, &values, 3).expect("conditioning should succeed");
    assert_eq!(series.times(), &[1.0, 2.0, 3.0]);
    assert_eq!(series.values(), &[10.0, 20.0, 30.0]);
}

#[test]
fn from_raw_keeps_first_duplicate() {
    let times = vec![1.0, 2.0, 2.0, 3.0];
    let values = vec![10.0, 20.0, 99.0, 30.0];
    let series = SampleSeries::from_raw(&times, &values, 3).expect("conditioning should succeed");
    assert_eq!(series.times(), &[1.0, 2.0, 3.0]);
    assert_eq!(series.values(), &[10.0, 20.0, 30.0]);
}

#[test]
fn from_raw_keeps_first_duplicate_across_unsorted_input() {
    // After a stable sort 5.0@idx1 precedes 5.0@idx3, so 50.0 survives.
    let times = vec![9.0, 5.0, 1.0, 5.0];
    let values = vec![90.0, 50.0, 10.0, 55.0];
    let series = SampleSeries::from_raw(&times, &values, 3).expect("conditioning should succeed");
    assert_eq!(series.times(), &[1.0, 5.0, 9.0]);
    assert_eq!(series.values(), &[10.0, 50.0, 90.0]);
}

#[test]
fn from_raw_rejects_mismatched_lengths() {
    let err = SampleSeries::from_raw(&[1.0, 2.0], &[10.0], 2).unwrap_err();
    assert!(
        matches!(err, FitError::ShapeMismatch { left: 2, right: 1 }),
        "unexpected error: {err:?}"
    );
}

#[test]
fn from_raw_rejects_short_series_after_dedup() {
    // Three raw samples collapse to two distinct epochs.
    let err = SampleSeries::from_raw(&[1.0, 1.0, 2.0], &[5.0, 5.0, 6.0], 3).unwrap_err();
    assert!(
        matches!(err, FitError::InsufficientSamples { needed: 3, got: 2 }),
        "unexpected error: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// NormalizedTime
// ---------------------------------------------------------------------------

#[test]
fn normalize_maps_to_unit_interval() {
    let norm = NormalizedTime::from_times(&[100.0, 150.0, 300.0]).expect("span is nonzero");
    assert_eq!(norm.times()[0], 0.0);
    assert_eq!(norm.times()[2], 1.0);
    assert!((norm.times()[1] - 0.25).abs() < 1e-15);
    assert_eq!(norm.t_ref(), 100.0);
    assert_eq!(norm.t_scale(), 200.0);
}

#[test]
fn normalize_round_trips_through_denormalize() {
    let raw = vec![58001.5, 58017.25, 58100.0, 58250.75];
    let norm = NormalizedTime::from_times(&raw).expect("span is nonzero");
    for (t_norm, t_raw) in norm.times().iter().zip(&raw) {
        assert!(
            (norm.denormalize(*t_norm) - t_raw).abs() < 1e-9,
            "round trip drifted at t = {t_raw}"
        );
    }
}

#[test]
fn normalize_rejects_zero_span() {
    let err = NormalizedTime::from_times(&[7.0, 7.0, 7.0]).unwrap_err();
    assert!(
        matches!(err, FitError::DegenerateTimeSpan),
        "unexpected error: {err:?}"
    );
}

// ---------------------------------------------------------------------------
// braking_index
// ---------------------------------------------------------------------------

#[test]
fn braking_index_matches_hand_computation() {
    let f = vec![2.0, 4.0];
    let df = vec![1.0, 2.0];
    let d2f = vec![3.0, 5.0];
    let n = braking_index(&f, &df, &d2f).expect("shapes match");
    assert!((n[0] - 6.0).abs() < 1e-15);
    assert!((n[1] - 5.0).abs() < 1e-15);
}

#[test]
fn braking_index_is_nan_where_first_derivative_vanishes() {
    let n = braking_index(&[1.0, 1.0], &[0.0, 2.0], &[3.0, 4.0]).expect("shapes match");
    assert!(n[0].is_nan(), "zero df must give NaN, got {}", n[0]);
    assert!((n[1] - 1.0).abs() < 1e-15);
}

#[test]
fn braking_index_rejects_mismatched_shapes() {
    let err = braking_index(&[1.0, 2.0], &[1.0], &[1.0, 2.0]).unwrap_err();
    assert!(
        matches!(err, FitError::ShapeMismatch { .. }),
        "unexpected error: {err:?}"
    );
}
