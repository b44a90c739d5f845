//! End-to-end runs of the pipeline against synthetic cutouts.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use zarrs::storage::ReadableWritableListableStorage;
use zarrs_filesystem::FilesystemStore;

use cf_common::{Grid, TimeAxis};
use cf_pipeline::{
    ConfigurationError, PipelineError, PrepareMode, RunConfig, RunSummary, Stage, TechnologySpec,
    TileSelection, TilingConfig,
};
use cf_store::{CfStore, StoreConfig};
use cutout::testdata::{write_synthetic_cutout, CutoutVariant, SyntheticCutout};
use cutout::{CutoutError, CutoutProvider, PrepareReport, WeatherFields, ZarrCutout};
use test_utils::assert_all_nan;

const N_LON: usize = 4;
const N_TIME: usize = 24;

fn open_storage(path: &Path) -> ReadableWritableListableStorage {
    std::fs::create_dir_all(path).expect("Failed to create store dir");
    Arc::new(FilesystemStore::new(path).expect("Failed to open store"))
}

fn cutout(path: &Path, n_lat: usize) -> ZarrCutout {
    write_synthetic_cutout(path, &SyntheticCutout::small(n_lat, N_LON)).expect("write cutout")
}

fn onshore_only() -> Vec<TechnologySpec> {
    vec![TechnologySpec::wind_onshore("wind_onshore", "Vestas_V112_3MW")]
}

fn run_config(rows_per_tile: usize) -> RunConfig {
    RunConfig {
        tiling: TilingConfig {
            rows_per_tile: Some(rows_per_tile),
            ..Default::default()
        },
        store: StoreConfig {
            time_chunk: N_TIME,
            lat_chunk: 4,
            lon_chunk: N_LON,
            ..Default::default()
        },
        technologies: onshore_only(),
        threads: Some(2),
        ..Default::default()
    }
}

fn run<C: CutoutProvider>(config: RunConfig, cutout: C, output: &Path) -> RunSummary {
    cf_pipeline::Pipeline::new(config, cutout, open_storage(output))
        .run()
        .expect("run")
}

fn try_run<C: CutoutProvider>(
    config: RunConfig,
    cutout: C,
    output: &Path,
) -> Result<RunSummary, PipelineError> {
    cf_pipeline::Pipeline::new(config, cutout, open_storage(output)).run()
}

fn open_store(output: &Path) -> CfStore {
    CfStore::open_existing(open_storage(output)).expect("open store")
}

fn bits(values: &[f32]) -> Vec<u32> {
    values.iter().map(|v| v.to_bits()).collect()
}

/// Delegates to a Zarr cutout but fails to prepare any band touching `bad_row`.
struct FlakyCutout {
    inner: ZarrCutout,
    bad_row: usize,
}

impl CutoutProvider for FlakyCutout {
    fn grid(&self) -> &Grid {
        self.inner.grid()
    }

    fn time_axis(&self) -> &TimeAxis {
        self.inner.time_axis()
    }

    fn source(&self) -> &str {
        self.inner.source()
    }

    fn is_prepared(&self, rows: Range<usize>) -> cutout::Result<bool> {
        self.inner.is_prepared(rows)
    }

    fn prepare_region(&self, rows: Range<usize>) -> cutout::Result<PrepareReport> {
        if rows.contains(&self.bad_row) {
            return Err(CutoutError::read_failed("u100", "simulated I/O error"));
        }
        self.inner.prepare_region(rows)
    }

    fn load_region(&self, rows: Range<usize>, times: Range<usize>) -> cutout::Result<WeatherFields> {
        self.inner.load_region(rows, times)
    }
}

#[test]
fn test_end_to_end_four_tiles() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let config = RunConfig {
        overwrite: true,
        ..run_config(4)
    };

    let summary = run(config, cutout(&temp_dir.path().join("cutout"), 16), &output);
    assert_eq!(summary.written, vec![0, 1, 2, 3]);
    assert!(summary.skipped.is_empty());
    assert!(summary.failed.is_empty());
    assert!(summary.pending.is_empty());
    assert_eq!(summary.total_tiles, 4);
    assert_eq!(summary.exit_code(), 0);

    let store = open_store(&output);
    let markers = store.completed_markers().expect("markers");
    assert_eq!(markers.len(), 4);
    assert_eq!(markers[3].rows(), 12..16);

    let values = store.read_region(0..16).expect("read");
    assert_eq!(values.len(), N_TIME * 16 * N_LON);
    assert!(values
        .iter()
        .filter(|v| !v.is_nan())
        .all(|v| (0.0..=1.0).contains(v)));
    assert!(values.iter().any(|v| *v > 0.0));

    let recorded: RunSummary = store
        .latest_run_summary()
        .expect("read summary")
        .expect("summary recorded");
    assert_eq!(recorded.written, vec![0, 1, 2, 3]);
    assert!(recorded.finished_at.is_some());
}

#[test]
fn test_resume_writes_only_missing_tiles() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 12);

    let first = RunConfig {
        selection: TileSelection {
            start_index: 0,
            limit: Some(2),
        },
        ..run_config(4)
    };
    let summary = run(first, &source, &output);
    assert_eq!(summary.written, vec![0, 1]);
    let before = bits(&open_store(&output).read_region(0..8).expect("read"));

    let summary = run(run_config(4), &source, &output);
    assert_eq!(summary.written, vec![2]);
    assert_eq!(summary.skipped, vec![0, 1]);
    assert!(summary.failed.is_empty());

    let after = bits(&open_store(&output).read_region(0..8).expect("read"));
    assert_eq!(before, after);
}

#[test]
fn test_rerun_without_overwrite_changes_nothing() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 8);

    run(run_config(4), &source, &output);
    let before = bits(&open_store(&output).read_region(0..8).expect("read"));

    let summary = run(run_config(4), &source, &output);
    assert!(summary.written.is_empty());
    assert_eq!(summary.skipped, vec![0, 1]);

    let after = bits(&open_store(&output).read_region(0..8).expect("read"));
    assert_eq!(before, after);
}

#[test]
fn test_overwrite_rewrites_every_tile() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 8);

    run(run_config(4), &source, &output);
    let summary = run(
        RunConfig {
            overwrite: true,
            ..run_config(4)
        },
        &source,
        &output,
    );
    assert_eq!(summary.written, vec![0, 1]);
    assert!(summary.skipped.is_empty());
}

#[test]
fn test_ineligible_cells_are_nan() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let config = RunConfig {
        technologies: TechnologySpec::defaults(),
        ..run_config(4)
    };

    let summary = run(config, cutout(&temp_dir.path().join("cutout"), 4), &output);
    assert_eq!(summary.written, vec![0]);

    let store = open_store(&output);
    let values = store.read_region(0..4).expect("read");
    let at = |tech: usize, t: usize, row: usize, col: usize| {
        values[((tech * N_TIME + t) * 4 + row) * N_LON + col]
    };

    // Columns 0-1 are land, 2-3 sea.
    for row in 0..4 {
        let onshore_at_sea: Vec<f32> = (0..N_TIME).map(|t| at(0, t, row, 3)).collect();
        assert_all_nan!(onshore_at_sea);
        let offshore_on_land: Vec<f32> = (0..N_TIME).map(|t| at(1, t, row, 0)).collect();
        assert_all_nan!(offshore_on_land);
        let solar_at_sea: Vec<f32> = (0..N_TIME).map(|t| at(2, t, row, 2)).collect();
        assert_all_nan!(solar_at_sea);
        assert!((0..N_TIME).all(|t| !at(1, t, row, 3).is_nan()));
        // Solar on land is a real zero at night, never missing.
        assert!((0..N_TIME).all(|t| !at(2, t, row, 0).is_nan()));
    }

    let onshore = store.read_onshore(0..4).expect("onshore");
    assert_eq!(&onshore[..N_LON], &[1, 1, 0, 0]);
}

#[test]
fn test_failed_tile_does_not_stop_siblings() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let flaky = FlakyCutout {
        inner: cutout(&temp_dir.path().join("cutout"), 16),
        bad_row: 5,
    };
    let config = RunConfig {
        prepare: PrepareMode::PerTile,
        ..run_config(4)
    };

    let summary = run(config, flaky, &output);
    assert_eq!(summary.written, vec![0, 2, 3]);
    assert_eq!(summary.failed_tiles(), vec![1]);
    assert_eq!(summary.failed[0].stage, Stage::Prepare);
    assert!(summary.failed[0].cause.contains("simulated I/O error"));
    assert_eq!(summary.exit_code(), 1);

    let store = open_store(&output);
    assert!(!store.has_completion_marker(1).expect("marker"));
    assert!(store
        .read_region(4..8)
        .expect("read")
        .iter()
        .all(|v| v.is_nan()));
}

#[test]
fn test_fail_fast_leaves_rest_pending() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let flaky = FlakyCutout {
        inner: cutout(&temp_dir.path().join("cutout"), 16),
        bad_row: 5,
    };
    let config = RunConfig {
        prepare: PrepareMode::PerTile,
        fail_fast: true,
        ..run_config(4)
    };

    let summary = run(config, flaky, &output);
    assert_eq!(summary.written, vec![0]);
    assert_eq!(summary.failed_tiles(), vec![1]);
    assert_eq!(summary.pending, vec![2, 3]);
}

#[test]
fn test_whole_preparation_failure_fails_every_open_tile() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = write_synthetic_cutout(
        &temp_dir.path().join("cutout"),
        &SyntheticCutout::small(8, N_LON).omit("v100"),
    )
    .expect("write cutout");

    let summary = run(run_config(4), source, &output);
    assert!(summary.written.is_empty());
    assert_eq!(summary.failed_tiles(), vec![0, 1]);
    assert!(summary.failed.iter().all(|f| f.stage == Stage::Prepare));
    assert!(summary.failed[0].cause.contains("v100"));

    // The summary is recorded even though nothing was written.
    let recorded: Option<RunSummary> = open_store(&output).latest_run_summary().expect("read");
    assert_eq!(recorded.expect("recorded").failed.len(), 2);
}

#[test]
fn test_unsupported_technology_fails_each_tile() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let config = RunConfig {
        technologies: vec![TechnologySpec::wind_onshore("wind", "Acme_9000")],
        ..run_config(4)
    };

    let summary = run(config, cutout(&temp_dir.path().join("cutout"), 8), &output);
    assert_eq!(summary.failed_tiles(), vec![0, 1]);
    assert!(summary.failed.iter().all(|f| f.stage == Stage::Evaluate));
}

#[test]
fn test_prepared_cutout_with_skip_mode() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = write_synthetic_cutout(
        &temp_dir.path().join("cutout"),
        &SyntheticCutout::small(8, N_LON).variant(CutoutVariant::Prepared),
    )
    .expect("write cutout");
    let config = RunConfig {
        prepare: PrepareMode::Skip,
        ..run_config(4)
    };

    let summary = run(config, &source, &output);
    assert_eq!(summary.written, vec![0, 1]);
    // Skipping preparation leaves the ledger alone.
    assert!(!source.is_prepared(0..8).expect("is_prepared"));
}

#[test]
fn test_changed_tiling_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 16);

    run(run_config(4), &source, &output);
    let err = try_run(run_config(8), &source, &output).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::TilingChanged { tile: 0, .. })
    ));
}

#[test]
fn test_incompatible_store_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 8);

    run(run_config(4), &source, &output);
    let other = RunConfig {
        technologies: vec![TechnologySpec::wind_offshore(
            "wind_offshore",
            "NREL_ReferenceTurbine_5MW_offshore",
        )],
        ..run_config(4)
    };
    let err = try_run(other.clone(), &source, &output).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::IncompatibleStore(_))
    ));

    // Overwrite replaces the old store instead.
    let summary = run(
        RunConfig {
            overwrite: true,
            ..other
        },
        &source,
        &output,
    );
    assert_eq!(summary.written, vec![0, 1]);
}

#[test]
fn test_resume_with_changed_turbine_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 12);

    let first = RunConfig {
        selection: TileSelection {
            start_index: 0,
            limit: Some(2),
        },
        ..run_config(4)
    };
    assert_eq!(run(first, &source, &output).written, vec![0, 1]);

    // Same technology name, different power curve.
    let changed = RunConfig {
        technologies: vec![TechnologySpec::wind_onshore(
            "wind_onshore",
            "Enercon_E82_3000kW",
        )],
        ..run_config(4)
    };
    match try_run(changed, &source, &output).unwrap_err() {
        PipelineError::Configuration(ConfigurationError::IncompatibleStore(e)) => {
            assert!(e.to_string().contains("technology parameters"), "{e}");
        }
        other => panic!("unexpected error: {other}"),
    }

    // The unchanged settings still resume.
    let summary = run(run_config(4), &source, &output);
    assert_eq!(summary.written, vec![2]);
    assert_eq!(summary.skipped, vec![0, 1]);
}

#[test]
fn test_foreign_output_directory_is_rejected() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    std::fs::create_dir_all(&output).expect("mkdir");
    std::fs::write(output.join("notes.txt"), b"keep me").expect("write");

    let err = try_run(run_config(4), cutout(&temp_dir.path().join("cutout"), 8), &output)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::IncompatibleStore(_))
    ));
    assert!(output.join("notes.txt").exists());
}

#[test]
fn test_corrupt_marker_is_fatal() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 8);

    run(run_config(4), &source, &output);
    std::fs::write(output.join("_completed/tile_00001.json"), b"{\"tile\": 1,").expect("write");

    match try_run(run_config(4), &source, &output).unwrap_err() {
        PipelineError::Store(e) => assert!(e.is_corruption()),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_degree_step_tiling() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let output = temp_dir.path().join("cf.zarr");
    let source = cutout(&temp_dir.path().join("cutout"), 16);

    // 5° cells: 20° is four rows, one chunk.
    let config = RunConfig {
        tiling: TilingConfig {
            degree_step: Some(20.0),
            ..Default::default()
        },
        ..run_config(4)
    };
    let summary = run(config, &source, &output);
    assert_eq!(summary.written, vec![0, 1, 2, 3]);

    let fractional = RunConfig {
        tiling: TilingConfig {
            degree_step: Some(7.0),
            ..Default::default()
        },
        ..run_config(4)
    };
    let err = try_run(fractional, &source, &temp_dir.path().join("other.zarr")).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::FractionalDegreeStep { .. })
    ));
}

#[test]
fn test_start_index_out_of_range() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = RunConfig {
        selection: TileSelection {
            start_index: 9,
            limit: None,
        },
        ..run_config(4)
    };

    let err = try_run(
        config,
        cutout(&temp_dir.path().join("cutout"), 8),
        &temp_dir.path().join("cf.zarr"),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigurationError::StartIndexOutOfRange { .. })
    ));
}

#[test]
fn test_from_config_opens_paths() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let cutout_dir = temp_dir.path().join("cutout");
    cutout(&cutout_dir, 8);

    let config = RunConfig {
        cutout: cutout_dir,
        output: temp_dir.path().join("out/cf.zarr"),
        prepare: PrepareMode::PerTile,
        ..run_config(8)
    };
    let summary = cf_pipeline::Pipeline::from_config(config)
        .expect("open")
        .run()
        .expect("run");
    assert_eq!(summary.written, vec![0]);

    let bad_step = RunConfig {
        cutout: temp_dir.path().join("cutout"),
        output: temp_dir.path().join("rejected/cf.zarr"),
        tiling: TilingConfig {
            degree_step: Some(7.0),
            ..Default::default()
        },
        ..run_config(4)
    };
    assert!(matches!(
        cf_pipeline::Pipeline::from_config(bad_step),
        Err(PipelineError::Configuration(ConfigurationError::FractionalDegreeStep { .. }))
    ));
    assert!(!temp_dir.path().join("rejected").exists());

    let missing = RunConfig {
        cutout: temp_dir.path().join("missing"),
        output: temp_dir.path().join("out2"),
        ..run_config(8)
    };
    assert!(matches!(
        cf_pipeline::Pipeline::from_config(missing),
        Err(PipelineError::Configuration(ConfigurationError::Cutout(_)))
    ));
}
