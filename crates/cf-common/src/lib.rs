//! Common types shared across the capacity-factor workspace.

pub mod bbox;
pub mod error;
pub mod grid;
pub mod sidecar;
pub mod time;

pub use bbox::BoundingBox;
pub use error::{CommonError, CommonResult};
pub use grid::Grid;
pub use time::TimeAxis;
