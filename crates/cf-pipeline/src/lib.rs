//! Tiled, resumable capacity-factor pipeline.
//!
//! The latitude axis of a weather cutout is cut into chunk-aligned tiles.
//! Each tile is prepared, evaluated for every configured technology and
//! written into a global chunked store, followed by a completion marker. A
//! rerun skips tiles that already carry a marker, so an interrupted run can
//! simply be restarted.

pub mod config;
pub mod driver;
pub mod error;
pub mod evaluate;
pub mod partition;
pub mod prepare;
pub mod summary;
pub mod technology;
pub mod writer;

pub use config::{PrepareMode, RunConfig, TileSelection, TilingConfig};
pub use driver::{open_output, Pipeline, RunState};
pub use error::{
    ConfigurationError, EvaluationError, PipelineError, PrepareError, PrepareScope, Stage,
    WriteError,
};
pub use evaluate::{CfCube, CfEvaluator};
pub use partition::{partition, select, Tile};
pub use prepare::{prepare, PrepareStrategy};
pub use summary::{RunSummary, StoreStatus, TileFailure};
pub use technology::{Eligibility, Orientation, TechnologyKind, TechnologySpec};
pub use writer::{write, WriteOutcome};
