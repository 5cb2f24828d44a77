//! Tracer transport with optional Python bindings
//!
//! The numerics live in `rsctm-core`; this crate re-exports them and, with the `python`
//! feature, builds the `rsctm._lib` extension module.

pub use rsctm_core::*;

#[cfg(feature = "python")]
mod python;
