//! Monthly-varying finite-difference tracer transport
//!
//! A concentration field on the fixed 36 x 18 x 10 longitude/latitude/pressure grid is
//! advanced by an 11-point stencil whose weights change once per month. See
//! [`engine`] for the driver-facing lifecycle.

pub mod coefficient_file;
pub mod coefficients;
pub mod config;
pub mod engine;
pub mod errors;
pub mod grid;
pub mod kernel;
pub mod neighbor_table;
#[cfg(feature = "python")]
pub mod python;
pub mod topology;

pub use coefficients::{CoefficientSource, CoefficientTable, InMemorySource};
pub use engine::{MonthlyTransport, TransportEngine};
pub use errors::{RSCTMError, RSCTMResult};
pub use grid::{Cell, ConcentrationField, Month};
