//! Utility types and functions.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Warning`] / [`Diagnostics`] / [`Outcome`] - Non-fatal problems
//! - Math type re-exports from glam and angle conventions

mod diag;
mod error;
mod math;

pub use diag::*;
pub use error::*;
pub use math::*;
