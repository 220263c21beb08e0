//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Every fusion component reports deterministic input/configuration failures through
//! one of the semantic variants below; I/O and JSON errors come from the collaborator
//! adapters in `io`.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Missing band: {band}")]
    MissingBand { band: String },

    #[error("Duplicate band name: {band}")]
    DuplicateBand { band: String },

    #[error("Projection mismatch: no known transform from {from_crs} to {to_crs}")]
    ProjectionMismatch { from_crs: String, to_crs: String },

    #[error("Degenerate statistics: {0}")]
    DegenerateStatistics(String),

    #[error("Sample of {required} pixels exceeds the budget of {budget} pixels")]
    ResourceExhaustion { required: u64, budget: u64 },

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },
}

impl Error {
    pub fn grid_mismatch<S: Into<String>>(context: S) -> Self {
        Error::GridMismatch(context.into())
    }

    pub fn missing_band<S: Into<String>>(band: S) -> Self {
        Error::MissingBand { band: band.into() }
    }

    pub fn invalid<V: std::fmt::Display>(arg: &'static str, value: V) -> Self {
        Error::InvalidArgument {
            arg,
            value: value.to_string(),
        }
    }
}
