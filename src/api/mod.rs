//! High-level, ergonomic library API: run the complete HPF fusion pipeline on a pair of
//! rasters and summarize the run. Prefer these entrypoints over the per-stage processing
//! modules when integrating hpfsharp.
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::params::FusionParams;
use crate::core::processing::convolve::convolve;
use crate::core::processing::fuse::{assemble, fuse_raster};
use crate::core::processing::gain::{GainSet, compute_gains};
use crate::core::processing::resample::resample;
use crate::core::processing::stats::{BandStats, RegionStats, compute_std_dev};
use crate::core::processing::synthesize::synthesize;
use crate::core::raster::{Band, Raster, is_nodata};
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::types::DegeneratePolicy;

/// Everything one fusion run produced.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    /// Native high-resolution bands followed by the sharpened bands.
    pub raster: Raster,
    /// High-pass detail band on the high-resolution grid.
    pub detail: Band,
    pub stats: RegionStats,
    pub gains: GainSet,
    pub native_bands: Vec<String>,
    pub sharpened_bands: Vec<String>,
    /// True when `DegeneratePolicy::ZeroGain` replaced the computed gains.
    pub degenerate_fallback: bool,
}

/// Sharpen every band of `low_res` to the grid of `high_res`.
///
/// Steps, in order: synthesize the intensity band from `high_res`, resample `low_res` onto
/// the high-resolution grid, high-pass filter the intensity band, measure standard
/// deviations of the resampled bands and the detail band over `region` in one pass,
/// derive per-band gains and inject the gained detail.
pub fn pansharpen(
    high_res: &Raster,
    low_res: &Raster,
    region: &Region,
    params: &FusionParams,
) -> Result<FusionOutput> {
    params.validate()?;
    let grid = high_res.grid();
    info!(
        "Pan-sharpening {} band(s) onto {}x{} grid ({} native band(s))",
        low_res.band_count(),
        grid.width(),
        grid.height(),
        high_res.band_count()
    );

    let pan = synthesize(high_res, &params.weights, &params.pan_band)?;
    let resampled = resample(low_res, grid, params.resample)?;
    let detail = convolve(&pan, &params.kernel, &params.detail_band);
    let detail_raster = Raster::new(grid.clone(), vec![detail])?;

    let stats = compute_std_dev(&resampled.add_bands(&detail_raster)?, region, &params.stats)?;

    let low_names = low_res.band_names();
    let (gains, degenerate_fallback) = match derive_gains(&stats, &low_names, params) {
        Ok(gains) => (gains, false),
        Err(Error::DegenerateStatistics(reason))
            if params.on_degenerate == DegeneratePolicy::ZeroGain =>
        {
            warn!("Degenerate statistics ({}); falling back to zero gain", reason);
            (GainSet::zero(&low_names, params.modulation), true)
        }
        Err(e) => return Err(e),
    };

    let sharpened = fuse_raster(&resampled, &detail_raster, &gains)?;
    let raster = assemble(high_res, &sharpened)?;

    let detail = detail_raster
        .into_bands()
        .pop()
        .ok_or_else(|| Error::missing_band(&params.detail_band))?;

    Ok(FusionOutput {
        native_bands: high_res.band_names().iter().map(|s| s.to_string()).collect(),
        sharpened_bands: low_names.iter().map(|s| s.to_string()).collect(),
        raster,
        detail,
        stats,
        gains,
        degenerate_fallback,
    })
}

fn derive_gains(stats: &RegionStats, bands: &[&str], params: &FusionParams) -> Result<GainSet> {
    let detail_std = stats.std_dev(&params.detail_band)?;
    let band_stds = stats.std_devs(bands)?;
    compute_gains(detail_std, &band_stds, params.modulation)
}

/// Grid description for reports.
#[derive(Debug, Clone, Serialize)]
pub struct GridSummary {
    pub width: usize,
    pub height: usize,
    pub crs: String,
    pub pixel_size: (f64, f64),
    pub transform: [f64; 6],
}

/// Min/max/mean of the valid pixels of an output band.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValueRange {
    pub valid: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl ValueRange {
    pub fn of(band: &Band) -> Self {
        let mut valid = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &v in band.data().iter().filter(|v| !is_nodata(**v)) {
            valid += 1;
            min = min.min(v);
            max = max.max(v);
            sum += v;
        }
        if valid == 0 {
            return Self {
                valid,
                min: None,
                max: None,
                mean: None,
            };
        }
        Self {
            valid,
            min: Some(min),
            max: Some(max),
            mean: Some(sum / valid as f64),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SharpenedBandReport {
    pub name: String,
    pub region: Option<BandStats>,
    pub gain: f64,
    pub output: ValueRange,
}

/// Serializable summary of a fusion run.
#[derive(Debug, Clone, Serialize)]
pub struct FusionReport {
    pub tool: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub grid: GridSummary,
    pub native_bands: Vec<String>,
    pub sharpened: Vec<SharpenedBandReport>,
    pub detail: Option<BandStats>,
    pub stats_scale: f64,
    pub modulation: f64,
    pub degenerate_fallback: bool,
}

impl FusionOutput {
    pub fn report(&self) -> FusionReport {
        let grid = self.raster.grid();
        let sharpened = self
            .sharpened_bands
            .iter()
            .filter_map(|name| {
                let band = self.raster.get(name)?;
                Some(SharpenedBandReport {
                    name: name.clone(),
                    region: self.stats.summary(name).ok(),
                    gain: self.gains.get(name).unwrap_or(0.0),
                    output: ValueRange::of(band),
                })
            })
            .collect();
        FusionReport {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            grid: GridSummary {
                width: grid.width(),
                height: grid.height(),
                crs: grid.crs().to_string(),
                pixel_size: grid.pixel_size(),
                transform: grid.transform().coefficients(),
            },
            native_bands: self.native_bands.clone(),
            sharpened,
            detail: self.stats.summary(self.detail.name()).ok(),
            stats_scale: self.stats.scale(),
            modulation: self.gains.modulation(),
            degenerate_fallback: self.degenerate_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::Grid;
    use crate::core::processing::stats::StatsParams;
    use crate::core::processing::synthesize::BandWeights;
    use ndarray::Array2;

    fn flat_scene() -> (Raster, Raster) {
        let high = Grid::north_up(8, 8, "EPSG:32639", 0.0, 80.0, 10.0).unwrap();
        let low = Grid::north_up(4, 4, "EPSG:32639", 0.0, 80.0, 20.0).unwrap();
        (
            Raster::new(high, vec![Band::constant("B4", 8, 8, 0.1)]).unwrap(),
            Raster::new(low, vec![Band::constant("B5", 4, 4, 0.2)]).unwrap(),
        )
    }

    fn params() -> FusionParams {
        FusionParams {
            weights: BandWeights::new([("B4", 1.0)]),
            stats: StatsParams {
                scale: None,
                ..StatsParams::default()
            },
            ..FusionParams::default()
        }
    }

    #[test]
    fn featureless_scene_fails_by_default() {
        let (high, low) = flat_scene();
        let err = pansharpen(&high, &low, &Region::from_grid(high.grid()), &params()).unwrap_err();
        assert!(matches!(err, Error::DegenerateStatistics(_)));
    }

    #[test]
    fn featureless_scene_can_fall_back_to_zero_gain() {
        let (high, low) = flat_scene();
        let params = FusionParams {
            on_degenerate: DegeneratePolicy::ZeroGain,
            ..params()
        };
        let out = pansharpen(&high, &low, &Region::from_grid(high.grid()), &params).unwrap();
        assert!(out.degenerate_fallback);
        assert_eq!(out.raster.band_names(), vec!["B4", "B5"]);
        assert_eq!(out.gains.get("B5").unwrap(), 0.0);
        let report = out.report();
        assert!(report.degenerate_fallback);
        assert_eq!(report.sharpened.len(), 1);
        assert_eq!(report.sharpened[0].output.valid, 64);
    }

    #[test]
    fn report_serializes() {
        let (high, low) = flat_scene();
        let data = Array2::from_shape_fn((8, 8), |(r, c)| if (r + c) % 2 == 0 { 0.1 } else { 0.3 });
        let high = Raster::new(high.grid().clone(), vec![Band::new("B4", data)]).unwrap();
        let out = pansharpen(&high, &low, &Region::from_grid(high.grid()), &params()).unwrap();
        let json = serde_json::to_value(out.report()).unwrap();
        assert_eq!(json["tool"], "hpfsharp");
        assert_eq!(json["grid"]["width"], 8);
        assert_eq!(json["sharpened"][0]["name"], "B5");
        assert!(json["detail"]["std_dev"].as_f64().unwrap() > 0.0);
    }
}
