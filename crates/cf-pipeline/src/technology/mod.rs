//! Technology specifications and their conversion models.
//!
//! A [`TechnologySpec`] is static configuration. Before evaluating a tile it
//! is resolved into a [`Technology`], which looks up the turbine or panel in
//! the built-in catalog and fails with
//! [`EvaluationError::UnsupportedTechnology`] for anything it cannot model.

pub mod solar;
pub mod wind;

use serde::{Deserialize, Serialize};

use cutout::WeatherFields;

use crate::error::EvaluationError;

pub use solar::{Orientation, PanelModel, SolarModel};
pub use wind::{TurbineCurve, WindModel};

/// Cells a technology may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Land,
    Sea,
    Any,
}

impl Eligibility {
    /// `is_land` is `None` where the land mask is missing; such cells are
    /// only eligible for [`Eligibility::Any`].
    pub fn allows(&self, is_land: Option<bool>) -> bool {
        match (self, is_land) {
            (Eligibility::Any, _) => true,
            (Eligibility::Land, Some(true)) => true,
            (Eligibility::Sea, Some(false)) => true,
            _ => false,
        }
    }
}

/// Conversion device of a technology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TechnologyKind {
    WindOnshore {
        turbine: String,
    },
    WindOffshore {
        turbine: String,
    },
    SolarPv {
        panel: String,
        #[serde(default)]
        orientation: Orientation,
    },
}

impl TechnologyKind {
    pub fn default_eligibility(&self) -> Eligibility {
        match self {
            TechnologyKind::WindOffshore { .. } => Eligibility::Sea,
            TechnologyKind::WindOnshore { .. } | TechnologyKind::SolarPv { .. } => {
                Eligibility::Land
            }
        }
    }

    /// Turbine or panel identifier.
    pub fn device(&self) -> &str {
        match self {
            TechnologyKind::WindOnshore { turbine } | TechnologyKind::WindOffshore { turbine } => {
                turbine
            }
            TechnologyKind::SolarPv { panel, .. } => panel,
        }
    }
}

fn default_capacity_kw() -> f64 {
    1.0
}

/// One technology of the run, in the order of the store's technology axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnologySpec {
    /// Label on the store's technology axis.
    pub name: String,
    #[serde(flatten)]
    pub kind: TechnologyKind,
    /// Defaults to land for onshore wind and solar, sea for offshore wind.
    #[serde(default)]
    pub eligibility: Option<Eligibility>,
    /// Unit capacity per cell. Capacity factors do not depend on it.
    #[serde(default = "default_capacity_kw")]
    pub capacity_kw: f64,
}

impl TechnologySpec {
    pub fn new(name: impl Into<String>, kind: TechnologyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            eligibility: None,
            capacity_kw: default_capacity_kw(),
        }
    }

    pub fn with_eligibility(mut self, eligibility: Eligibility) -> Self {
        self.eligibility = Some(eligibility);
        self
    }

    pub fn eligibility(&self) -> Eligibility {
        self.eligibility
            .unwrap_or_else(|| self.kind.default_eligibility())
    }

    pub fn wind_onshore(name: impl Into<String>, turbine: &str) -> Self {
        Self::new(
            name,
            TechnologyKind::WindOnshore {
                turbine: turbine.to_string(),
            },
        )
    }

    pub fn wind_offshore(name: impl Into<String>, turbine: &str) -> Self {
        Self::new(
            name,
            TechnologyKind::WindOffshore {
                turbine: turbine.to_string(),
            },
        )
    }

    pub fn solar_pv(name: impl Into<String>, panel: &str, orientation: Orientation) -> Self {
        Self::new(
            name,
            TechnologyKind::SolarPv {
                panel: panel.to_string(),
                orientation,
            },
        )
    }

    /// The technologies built when none are configured.
    pub fn defaults() -> Vec<TechnologySpec> {
        vec![
            Self::wind_onshore("wind_onshore", wind::VESTAS_V112_3MW.name),
            Self::wind_offshore("wind_offshore", wind::NREL_5MW_OFFSHORE.name),
            Self::solar_pv("solar", solar::CSI.name, Orientation::LatitudeOptimal),
        ]
    }
}

/// Per-cell conversion from weather to capacity factor.
pub trait ConversionModel: Send + Sync {
    /// Fill `out` (one value per time step) for the cell at `(row, col)` of
    /// `fields`. Values may fall outside `[0, 1]`; missing weather gives NaN.
    fn cell_series(&self, fields: &WeatherFields, row: usize, col: usize, out: &mut [f32]);
}

/// A technology resolved against the catalog.
pub struct Technology {
    pub name: String,
    pub eligibility: Eligibility,
    model: Box<dyn ConversionModel>,
}

impl std::fmt::Debug for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Technology")
            .field("name", &self.name)
            .field("eligibility", &self.eligibility)
            .finish_non_exhaustive()
    }
}

impl Technology {
    pub fn resolve(spec: &TechnologySpec) -> Result<Self, EvaluationError> {
        if !(spec.capacity_kw.is_finite() && spec.capacity_kw > 0.0) {
            return Err(EvaluationError::unsupported(
                &spec.name,
                format!("capacity must be > 0 kW, got {}", spec.capacity_kw),
            ));
        }

        let model: Box<dyn ConversionModel> = match &spec.kind {
            TechnologyKind::WindOnshore { turbine } | TechnologyKind::WindOffshore { turbine } => {
                let curve = wind::turbine(turbine).ok_or_else(|| {
                    EvaluationError::unsupported(
                        &spec.name,
                        format!("unknown turbine '{}'", turbine),
                    )
                })?;
                Box::new(WindModel::new(curve))
            }
            TechnologyKind::SolarPv { panel, orientation } => {
                let panel_model = solar::panel(panel).ok_or_else(|| {
                    EvaluationError::unsupported(&spec.name, format!("unknown panel '{}'", panel))
                })?;
                orientation
                    .validate()
                    .map_err(|reason| EvaluationError::unsupported(&spec.name, reason))?;
                Box::new(SolarModel::new(panel_model, *orientation))
            }
        };

        Ok(Self {
            name: spec.name.clone(),
            eligibility: spec.eligibility(),
            model,
        })
    }

    pub fn cell_series(&self, fields: &WeatherFields, row: usize, col: usize, out: &mut [f32]) {
        self.model.cell_series(fields, row, col, out)
    }
}
