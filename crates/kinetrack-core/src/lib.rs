//! # Kinetrack-Core
//!
//! Core types and utilities for the kinetrack skeletal geometry and
//! exercise-motion analysis engine: joint frames delivered by a depth sensor,
//! tracking identifiers, shared vector-angle helpers and the error type.

pub mod error;
pub mod geometry;
pub mod types;

pub use error::{Error, Result};
pub use geometry::*;
pub use types::*;
