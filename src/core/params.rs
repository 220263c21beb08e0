use serde::{Deserialize, Serialize};

use crate::core::processing::convolve::Kernel;
use crate::core::processing::stats::StatsParams;
use crate::core::processing::synthesize::BandWeights;
use crate::error::{Error, Result};
use crate::types::{DegeneratePolicy, ResampleMethod};

/// Sentinel-2 L2A digital numbers to surface reflectance.
pub const S2_REFLECTANCE_SCALE: f64 = 1e-4;

/// Sentinel-2 bands delivered at 10 m.
pub const S2_10M_BANDS: [&str; 4] = ["B2", "B3", "B4", "B8"];

/// Sentinel-2 bands delivered at 20 m that get sharpened.
pub const S2_20M_BANDS: [&str; 6] = ["B5", "B6", "B7", "B8A", "B11", "B12"];

/// Fusion parameters suitable for config files and CLI presets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub resample: ResampleMethod,
    pub weights: BandWeights,
    pub kernel: Kernel,
    /// Sharpening strength; gains scale linearly with it
    pub modulation: f64,
    pub stats: StatsParams,
    pub on_degenerate: DegeneratePolicy,
    /// Name of the synthetic intensity band
    pub pan_band: String,
    /// Name of the high-pass detail band
    pub detail_band: String,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            resample: ResampleMethod::Bicubic,
            weights: BandWeights::sentinel2_luminance(),
            kernel: Kernel::laplacian8(),
            modulation: 0.25,
            stats: StatsParams::default(),
            on_degenerate: DegeneratePolicy::Fail,
            pan_band: "pan".to_string(),
            detail_band: "hpf".to_string(),
        }
    }
}

impl FusionParams {
    pub fn from_json(json: &str) -> Result<Self> {
        let params: FusionParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.modulation.is_finite() && self.modulation >= 0.0) {
            return Err(Error::invalid("modulation", self.modulation));
        }
        if self.weights.is_empty() {
            return Err(Error::invalid("weights", "empty"));
        }
        if self.stats.max_pixels == 0 {
            return Err(Error::invalid("max_pixels", 0));
        }
        if let Some(scale) = self.stats.scale
            && !(scale.is_finite() && scale > 0.0)
        {
            return Err(Error::invalid("scale", scale));
        }
        if self.pan_band.is_empty() || self.detail_band.is_empty() {
            return Err(Error::invalid("band_name", "empty"));
        }
        if self.pan_band == self.detail_band {
            return Err(Error::invalid("detail_band", &self.detail_band));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_sentinel2_recipe() {
        let p = FusionParams::default();
        assert_eq!(p.resample, ResampleMethod::Bicubic);
        assert_eq!(p.modulation, 0.25);
        assert_eq!(p.stats.scale, Some(30.0));
        assert_eq!(p.stats.max_pixels, 1_000_000_000);
        assert!(p.stats.best_effort);
        assert_eq!(p.kernel, Kernel::laplacian8());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let p = FusionParams::from_json(
            r#"{"modulation": 0.5, "resample": "bilinear", "stats": {"scale": null, "max_pixels": 1000, "best_effort": false}}"#,
        )
        .unwrap();
        assert_eq!(p.modulation, 0.5);
        assert_eq!(p.resample, ResampleMethod::Bilinear);
        assert_eq!(p.stats.scale, None);
        assert!(!p.stats.best_effort);
        assert_eq!(p.weights, BandWeights::sentinel2_luminance());
    }

    #[test]
    fn invalid_json_values_are_rejected() {
        assert!(FusionParams::from_json(r#"{"modulation": -1.0}"#).is_err());
        assert!(FusionParams::from_json(r#"{"weights": {}}"#).is_err());
        assert!(FusionParams::from_json(r#"{"detail_band": "pan"}"#).is_err());
        assert!(matches!(
            FusionParams::from_json(r#"{"stats": {"scale": 0.0}}"#),
            Err(Error::InvalidArgument { arg: "scale", .. })
        ));
        assert!(FusionParams::from_json(r#"{"stats": {"scale": 20.0}}"#).is_ok());
        assert!(matches!(
            FusionParams::from_json("{"),
            Err(Error::Json(_))
        ));
    }
}
