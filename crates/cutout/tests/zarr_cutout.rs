//! Integration tests: prepare and read synthetic Zarr cutouts.

use cutout::testdata::{self, CutoutVariant, SyntheticCutout};
use cutout::{CutoutError, CutoutProvider, ZarrCutout};

#[test]
fn test_prepare_derives_features_for_band() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6);
    let cutout = testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    assert!(!cutout.is_prepared(0..4).expect("is_prepared"));

    let report = cutout.prepare_region(0..4).expect("prepare");
    assert!(!report.already_prepared);
    assert_eq!(
        report.derived,
        vec!["wnd100m", "influx", "temperature", "land_mask"]
    );
    assert!(report.validated.is_empty());

    assert!(cutout.is_prepared(0..4).expect("is_prepared"));
    assert!(cutout.is_prepared(1..3).expect("is_prepared"));
    assert!(!cutout.is_prepared(0..8).expect("is_prepared"));

    let fields = cutout.load_region(0..4, 0..24).expect("load");
    assert_eq!(fields.n_time(), 24);
    assert_eq!(fields.n_rows(), 4);
    assert_eq!(fields.n_lon(), 6);

    for t in [0, 5, 17] {
        for col in 0..6 {
            let expected = (testdata::u100(t, 2, col).powi(2) + 9.0).sqrt();
            let actual = fields.wind_speed[fields.index(t, 2, col)];
            assert!((actual - expected).abs() < 1e-5, "t={} col={}", t, col);
        }
    }

    // Night-time accumulations are slightly negative in the raw data.
    assert!(fields.influx.iter().all(|v| *v >= 0.0));
    assert!(fields.influx.iter().any(|v| *v > 100.0));

    let expected_t2m = testdata::t2m(fields.lats[1]);
    assert!((fields.temperature[fields.index(3, 1, 0)] - expected_t2m).abs() < 1e-4);

    assert_eq!(&fields.land_mask[..6], &[1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    assert!((fields.lats[0] - 37.5).abs() < 1e-9);
    assert_eq!(fields.reference_height_m, 100.0);
}

#[test]
fn test_prepare_is_idempotent() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6);
    let cutout = testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    cutout.prepare_region(0..4).expect("prepare");
    cutout.prepare_region(4..8).expect("prepare");

    let again = cutout.prepare_region(2..6).expect("prepare");
    assert!(again.already_prepared);
    assert!(again.derived.is_empty());

    let ranges: Vec<_> = cutout.prepared_ranges().expect("ledger").ranges().collect();
    assert_eq!(ranges, vec![0..8]);
}

#[test]
fn test_missing_raw_variable_is_reported() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6).omit("v100");
    let cutout = testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    let err = cutout.prepare_region(0..4).unwrap_err();
    match err {
        CutoutError::MissingVariable { feature, variable } => {
            assert_eq!(feature, "wnd100m");
            assert_eq!(variable, "v100");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!cutout.is_prepared(0..4).expect("is_prepared"));
}

#[test]
fn test_existing_features_are_validated() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6).variant(CutoutVariant::Prepared);
    let cutout = testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    let report = cutout.prepare_region(0..8).expect("prepare");
    assert!(report.derived.is_empty());
    assert_eq!(report.validated.len(), 4);
    assert!(cutout.is_prepared(0..8).expect("is_prepared"));
}

#[test]
fn test_load_requires_features() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6);
    let cutout = testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    let err = cutout.load_region(0..4, 0..24).unwrap_err();
    assert!(matches!(err, CutoutError::MissingVariable { .. }));
}

#[test]
fn test_out_of_bounds_region() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6).variant(CutoutVariant::Prepared);
    let cutout = testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    assert!(matches!(
        cutout.load_region(4..12, 0..24),
        Err(CutoutError::OutOfBounds { axis: "lat", .. })
    ));
    assert!(matches!(
        cutout.load_region(0..4, 0..25),
        Err(CutoutError::OutOfBounds { axis: "time", .. })
    ));
    assert!(cutout.prepare_region(6..9).is_err());
}

#[test]
fn test_reopen_from_path() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let synthetic = SyntheticCutout::small(8, 6).variant(CutoutVariant::Prepared);
    testdata::write_synthetic_cutout(temp_dir.path(), &synthetic).expect("write cutout");

    let cutout = ZarrCutout::open(temp_dir.path()).expect("open");
    assert_eq!(cutout.grid(), &synthetic.grid);
    assert_eq!(cutout.time_axis().len, 24);
    assert_eq!(cutout.source(), "synthetic");

    assert!(matches!(
        ZarrCutout::open(&temp_dir.path().join("missing")),
        Err(CutoutError::OpenFailed(_))
    ));
}
