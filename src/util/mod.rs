//! Utility types shared by every layer.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Qvv`] / [`Qvvf`] - Transform value types and math re-exports from glam

mod error;
mod math;

pub use error::*;
pub use math::*;
