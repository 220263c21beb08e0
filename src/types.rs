//! Shared enums used across hpfsharp.
//! Includes `ResampleMethod` and `DegeneratePolicy`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    Nearest,
    Bilinear,
    #[default]
    Bicubic,
}

impl std::fmt::Display for ResampleMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResampleMethod::Nearest => "Nearest",
            ResampleMethod::Bilinear => "Bilinear",
            ResampleMethod::Bicubic => "Bicubic",
        };
        write!(f, "{}", s)
    }
}

/// What the pipeline does when the detail band has zero spread over the region.
#[derive(
    Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DegeneratePolicy {
    /// Surface `Error::DegenerateStatistics` to the caller.
    #[default]
    Fail,
    /// Use a gain of zero for every band, i.e. return the resampled bands unsharpened.
    ZeroGain,
}

impl std::fmt::Display for DegeneratePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegeneratePolicy::Fail => write!(f, "Fail"),
            DegeneratePolicy::ZeroGain => write!(f, "ZeroGain"),
        }
    }
}
