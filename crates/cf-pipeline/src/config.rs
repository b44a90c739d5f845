//! Run configuration.
//!
//! A [`RunConfig`] is built once (from YAML, CLI flags or code), validated,
//! and handed to the [`crate::Pipeline`]. Nothing in the library reads the
//! environment.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cf_store::StoreConfig;

use crate::error::ConfigurationError;
use crate::technology::TechnologySpec;

/// When cutout features are prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrepareMode {
    /// Assume the cutout is already prepared.
    Skip,
    /// Prepare the whole cutout once, before the first tile.
    #[default]
    Whole,
    /// Prepare each tile's latitude band just before evaluating it.
    PerTile,
}

/// How the latitude axis is cut into tiles.
///
/// `rows_per_tile` and `degree_step` take precedence over `tile_count`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Number of tiles (default 1).
    pub tile_count: Option<usize>,
    /// Latitude rows per tile.
    pub rows_per_tile: Option<usize>,
    /// Tile height in degrees.
    pub degree_step: Option<f64>,
}

/// A contiguous window of the partition to process in this run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileSelection {
    /// First tile to process.
    pub start_index: usize,
    /// Number of tiles to process from `start_index`; all remaining if unset.
    pub limit: Option<usize>,
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Cutout directory.
    pub cutout: PathBuf,
    /// Output store directory.
    pub output: PathBuf,
    /// Erase the output store before the first tile.
    pub overwrite: bool,
    pub prepare: PrepareMode,
    pub tiling: TilingConfig,
    pub selection: TileSelection,
    pub store: StoreConfig,
    /// Technologies in store order.
    pub technologies: Vec<TechnologySpec>,
    /// Worker threads for evaluation; rayon's default when unset.
    pub threads: Option<usize>,
    /// Stop at the first failed tile, leaving the rest pending.
    pub fail_fast: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cutout: PathBuf::new(),
            output: PathBuf::new(),
            overwrite: false,
            prepare: PrepareMode::default(),
            tiling: TilingConfig::default(),
            selection: TileSelection::default(),
            store: StoreConfig::default(),
            technologies: TechnologySpec::defaults(),
            threads: None,
            fail_fast: false,
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ConfigurationError::invalid(format!("failed to parse YAML: {}", e)))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigurationError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::invalid(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Check settings that do not depend on the cutout.
    ///
    /// Tiling sizes are checked against the grid when partitioning; technology
    /// parameters are checked per tile by the evaluator.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.store.validate().map_err(ConfigurationError::Invalid)?;

        if self.technologies.is_empty() {
            return Err(ConfigurationError::invalid(
                "at least one technology is required",
            ));
        }
        let mut names = HashSet::new();
        for spec in &self.technologies {
            if spec.name.trim().is_empty() {
                return Err(ConfigurationError::invalid(
                    "technology names must not be empty",
                ));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(ConfigurationError::invalid(format!(
                    "duplicate technology '{}'",
                    spec.name
                )));
            }
        }

        if self.threads == Some(0) {
            return Err(ConfigurationError::invalid("threads must be > 0"));
        }
        if self.tiling.tile_count == Some(0) {
            return Err(ConfigurationError::ZeroTileCount);
        }
        if self.tiling.rows_per_tile == Some(0) {
            return Err(ConfigurationError::ZeroRowsPerTile);
        }
        if let Some(step) = self.tiling.degree_step {
            if !(step.is_finite() && step > 0.0) {
                return Err(ConfigurationError::InvalidDegreeStep(step));
            }
        }
        if self.selection.limit == Some(0) {
            return Err(ConfigurationError::invalid("tile limit must be > 0"));
        }
        Ok(())
    }

    /// Technology labels in store order.
    pub fn technology_names(&self) -> Vec<String> {
        self.technologies.iter().map(|t| t.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::technology::{Eligibility, Orientation, TechnologyKind};

    #[test]
    fn test_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.prepare, PrepareMode::Whole);
        assert_eq!(
            config.technology_names(),
            vec!["wind_onshore", "wind_offshore", "solar"]
        );
        assert_eq!(config.store.time_chunk, 168);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
cutout: /data/cutouts/era5-2013
output: /data/cf/era5-2013.zarr
prepare: per_tile
tiling:
  degree_step: 5.0
selection:
  start_index: 2
  limit: 3
store:
  time_chunk: 24
  lat_chunk: 20
  compression: blosc_lz4
technologies:
  - name: wind
    kind: wind_onshore
    turbine: Enercon_E82_3000kW
  - name: pv
    kind: solar_pv
    panel: CSi
    eligibility: any
threads: 4
fail_fast: true
"#;
        let config = RunConfig::from_yaml_str(yaml).expect("parse");
        assert_eq!(config.cutout, PathBuf::from("/data/cutouts/era5-2013"));
        assert_eq!(config.prepare, PrepareMode::PerTile);
        assert_eq!(config.tiling.degree_step, Some(5.0));
        assert_eq!(config.tiling.tile_count, None);
        assert_eq!(config.selection.start_index, 2);
        assert_eq!(config.selection.limit, Some(3));
        assert_eq!(config.store.time_chunk, 24);
        assert_eq!(config.store.lon_chunk, 180);
        assert_eq!(config.threads, Some(4));
        assert!(config.fail_fast);
        assert!(!config.overwrite);
        assert_eq!(config.technologies.len(), 2);
        assert_eq!(config.technologies[1].eligibility, Some(Eligibility::Any));
        assert_eq!(
            config.technologies[1].kind,
            TechnologyKind::SolarPv {
                panel: "CSi".to_string(),
                orientation: Orientation::LatitudeOptimal,
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_prepare_mode_is_rejected() {
        let err = RunConfig::from_yaml_str("prepare: sometimes\n").unwrap_err();
        assert!(matches!(err, ConfigurationError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RunConfig::default();
        config.technologies.push(config.technologies[0].clone());
        assert!(config.validate().is_err());

        let config = RunConfig {
            technologies: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RunConfig {
            threads: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RunConfig {
            tiling: TilingConfig {
                degree_step: Some(-1.0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidDegreeStep(_))
        ));

        let config = RunConfig {
            tiling: TilingConfig {
                tile_count: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ZeroTileCount)
        ));

        let mut config = RunConfig::default();
        config.store.lat_chunk = 0;
        assert!(config.validate().is_err());
    }
}
