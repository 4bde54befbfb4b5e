//! Error types for the kinetrack engine.

use thiserror::Error;

use crate::types::JointType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Joint frame is missing an entry for {joint:?}")]
    MissingJoint { joint: JointType },

    #[error("Degenerate segment {from:?} -> {to:?}: zero length or untracked")]
    DegenerateSegment { from: JointType, to: JointType },

    #[error("Invalid angle bounds: lower {lower}, upper {upper}")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("Invalid surface size {width}x{height}")]
    InvalidSurface { width: f64, height: f64 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
