use std::f64::consts::TAU;

use ndarray::{Array2, Zip};
use tracing::info;

use crate::core::params::{S2_10M_BANDS, S2_20M_BANDS};
use crate::core::raster::{Band, Grid, Raster};
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::io::{AcquisitionWindow, ImagerySource};

/// Sub-samples per pixel axis when integrating the analytic field over a pixel.
const SUPERSAMPLE: usize = 4;

/// Deterministic analytic scene, sampled at any resolution.
///
/// Every band is an affine function of one shared texture field, so bands of the same
/// scene at different resolutions are mutually consistent: a coarse pixel is the box
/// average of the field over its footprint.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    crs: String,
    pixel_size: f64,
    bands: Vec<String>,
    seed: u64,
}

impl SyntheticScene {
    pub fn new<S: AsRef<str>>(crs: impl Into<String>, pixel_size: f64, bands: &[S]) -> Result<Self> {
        if !(pixel_size.is_finite() && pixel_size > 0.0) {
            return Err(Error::invalid("pixel_size", pixel_size));
        }
        if bands.is_empty() {
            return Err(Error::invalid("bands", "empty"));
        }
        Ok(Self {
            crs: crs.into(),
            pixel_size,
            bands: bands.iter().map(|b| b.as_ref().to_string()).collect(),
            seed: 0,
        })
    }

    /// Sentinel-2 10 m bands (B2, B3, B4, B8).
    pub fn sentinel2_10m(crs: impl Into<String>) -> Self {
        Self {
            crs: crs.into(),
            pixel_size: 10.0,
            bands: S2_10M_BANDS.iter().map(|b| b.to_string()).collect(),
            seed: 0,
        }
    }

    /// Sentinel-2 20 m bands (B5, B6, B7, B8A, B11, B12).
    pub fn sentinel2_20m(crs: impl Into<String>) -> Self {
        Self {
            crs: crs.into(),
            pixel_size: 20.0,
            bands: S2_20M_BANDS.iter().map(|b| b.to_string()).collect(),
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Grid covering `aoi`, snapped outwards to whole pixels.
    pub fn grid_for(&self, aoi: &Region) -> Result<Grid> {
        let p = self.pixel_size;
        let (min_x, min_y, max_x, max_y) = aoi.bounds();
        let x0 = (min_x / p).floor() * p;
        let y0 = (max_y / p).ceil() * p;
        let width = ((max_x - x0) / p).ceil().max(1.0) as usize;
        let height = ((y0 - min_y) / p).ceil().max(1.0) as usize;
        Grid::north_up(width, height, self.crs.clone(), x0, y0, p)
    }

    fn phases(&self) -> [f64; 3] {
        let mut state = self.seed;
        [0, 1, 2].map(|_| (splitmix64(&mut state) >> 11) as f64 / (1u64 << 53) as f64 * TAU)
    }

    /// Shared texture in roughly `[0, 1]`.
    fn texture(phases: &[f64; 3], x: f64, y: f64) -> f64 {
        0.5 + 0.25 * (TAU * x / 170.0 + phases[0]).sin() * (TAU * y / 230.0 + phases[1]).cos()
            + 0.15 * (TAU * (x + y) / 57.0 + phases[2]).sin()
    }

    fn band_response(index: usize) -> (f64, f64) {
        let base = 0.03 + 0.04 * (index % 5) as f64;
        let amp = 0.10 + 0.05 * (index % 3) as f64;
        (base, amp)
    }
}

impl ImagerySource for SyntheticScene {
    fn fetch(&self, aoi: &Region, window: &AcquisitionWindow) -> Result<Raster> {
        let grid = self.grid_for(aoi)?;
        info!(
            "Synthesizing {} band(s) at {} m on a {}x{} grid ({} day window)",
            self.bands.len(),
            self.pixel_size,
            grid.width(),
            grid.height(),
            window.days()
        );
        let phases = self.phases();
        let gt = *grid.transform();
        let step = 1.0 / SUPERSAMPLE as f64;

        // Box-integrated texture, shared by every band.
        let mut field = Array2::<f64>::zeros(grid.shape());
        Zip::indexed(&mut field).par_for_each(|(r, c), value| {
            let mut acc = 0.0;
            for j in 0..SUPERSAMPLE {
                for i in 0..SUPERSAMPLE {
                    let (x, y) = gt.pixel_to_map(
                        c as f64 + (i as f64 + 0.5) * step,
                        r as f64 + (j as f64 + 0.5) * step,
                    );
                    acc += Self::texture(&phases, x, y);
                }
            }
            *value = acc / (SUPERSAMPLE * SUPERSAMPLE) as f64;
        });

        let bands = self
            .bands
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let (base, amp) = Self::band_response(idx);
                Band::new(name.clone(), field.mapv(|t| (base + amp * t).clamp(0.0, 1.0)))
            })
            .collect();
        Raster::new(grid, bands)
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
