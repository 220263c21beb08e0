//! Region statistics: per-band population standard deviation over a region of interest,
//! for every band of a raster in a single traversal.
//!
//! Samples are taken on a lattice whose spacing is the requested `scale` in map units.
//! Each lattice point reads the native pixel that contains it and counts only when its
//! map position lies inside the region. Lattice rows are cut into fixed-size tiles that
//! are reduced on rayon workers; per-tile accumulators are then merged in tile order, so
//! results do not depend on the size of the thread pool.
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::raster::{Grid, Raster, is_nodata};
use crate::core::region::Region;
use crate::error::{Error, Result};

/// Lattice rows per reduction tile. Fixed so the merge order never depends on threading.
const TILE_ROWS: usize = 64;

/// Streaming count / mean / sum of squared deviations (Welford), mergeable with Chan's
/// pairwise update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Moments {
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn merge(&mut self, other: &Moments) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;
        self.mean += delta * nb / n;
        self.m2 += other.m2 + delta * delta * na * nb / n;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Population variance.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).max(0.0))
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

impl FromIterator<f64> for Moments {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut m = Moments::default();
        for v in iter {
            m.push(v);
        }
        m
    }
}

/// Sampling configuration for [`compute_std_dev`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsParams {
    /// Lattice spacing in map units; `None` samples every native pixel.
    pub scale: Option<f64>,
    /// Upper bound on the number of lattice points inside the region.
    pub max_pixels: u64,
    /// Coarsen the lattice instead of failing when `max_pixels` would be exceeded.
    pub best_effort: bool,
}

impl Default for StatsParams {
    fn default() -> Self {
        Self {
            scale: Some(30.0),
            max_pixels: 1_000_000_000,
            best_effort: true,
        }
    }
}

/// Summary of one band over the region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandStats {
    pub count: u64,
    pub mean: f64,
    pub std_dev: f64,
}

/// Per-band statistics produced by one [`compute_std_dev`] call.
#[derive(Debug, Clone)]
pub struct RegionStats {
    moments: BTreeMap<String, Moments>,
    scale: f64,
    region: Region,
}

impl RegionStats {
    /// Effective lattice spacing in map units (after any best-effort coarsening).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.moments.keys().map(String::as_str)
    }

    pub fn moments(&self, band: &str) -> Result<&Moments> {
        self.moments
            .get(band)
            .ok_or_else(|| Error::missing_band(band))
    }

    pub fn summary(&self, band: &str) -> Result<BandStats> {
        let m = self.moments(band)?;
        match (m.mean(), m.std_dev()) {
            (Some(mean), Some(std_dev)) => Ok(BandStats {
                count: m.count(),
                mean,
                std_dev,
            }),
            _ => Err(Error::DegenerateStatistics(format!(
                "band '{}' has no valid samples in the region",
                band
            ))),
        }
    }

    pub fn std_dev(&self, band: &str) -> Result<f64> {
        self.summary(band).map(|s| s.std_dev)
    }

    /// Standard deviations of `bands`, keyed by name.
    pub fn std_devs<S: AsRef<str>>(&self, bands: &[S]) -> Result<BTreeMap<String, f64>> {
        bands
            .iter()
            .map(|b| -> Result<(String, f64)> {
                Ok((b.as_ref().to_string(), self.std_dev(b.as_ref())?))
            })
            .collect()
    }
}

/// Sample positions in pixel space.
#[derive(Debug, Clone, Copy)]
struct Lattice {
    step_x: f64,
    step_y: f64,
    nx: usize,
    ny: usize,
}

impl Lattice {
    fn new(grid: &Grid, scale: Option<f64>) -> Self {
        let (px, py) = grid.pixel_size();
        let (sx, sy) = match scale {
            Some(s) => (s / px, s / py),
            None => (1.0, 1.0),
        };
        let (step_x, nx) = axis(grid.width(), sx);
        let (step_y, ny) = axis(grid.height(), sy);
        Self {
            step_x,
            step_y,
            nx,
            ny,
        }
    }

    #[inline]
    fn point(&self, i: usize, j: usize) -> (f64, f64) {
        ((i as f64 + 0.5) * self.step_x, (j as f64 + 0.5) * self.step_y)
    }

    fn count_in(&self, grid: &Grid, region: &Region) -> u64 {
        let gt = grid.transform();
        (0..self.ny)
            .into_par_iter()
            .map(|j| {
                (0..self.nx)
                    .filter(|&i| {
                        let (u, v) = self.point(i, j);
                        let (x, y) = gt.pixel_to_map(u, v);
                        region.contains(x, y)
                    })
                    .count() as u64
            })
            .sum()
    }
}

/// Spacing and number of lattice points along one axis of `len` pixels.
fn axis(len: usize, step: f64) -> (f64, usize) {
    let n = (len as f64 / step - 0.5).ceil().max(0.0) as usize;
    if n == 0 {
        // Spacing larger than the raster: a single sample at its centre.
        (len as f64, 1)
    } else {
        (step, n)
    }
}

/// Population standard deviation of every band of `raster` restricted to `region`.
pub fn compute_std_dev(raster: &Raster, region: &Region, params: &StatsParams) -> Result<RegionStats> {
    let grid = raster.grid();
    region.ensure_crs(grid)?;
    if params.max_pixels == 0 {
        return Err(Error::invalid("max_pixels", 0));
    }
    if let Some(s) = params.scale
        && !(s.is_finite() && s > 0.0)
    {
        return Err(Error::invalid("scale", s));
    }

    let (base_scale, _) = grid.pixel_size();
    let base_scale = params.scale.unwrap_or(base_scale);
    let mut scale = base_scale;
    let mut lattice = Lattice::new(grid, params.scale);
    let mut count = lattice.count_in(grid, region);

    if count > params.max_pixels {
        if !params.best_effort {
            return Err(Error::ResourceExhaustion {
                required: count,
                budget: params.max_pixels,
            });
        }
        let required = count;
        let mut factor = ((count as f64 / params.max_pixels as f64).sqrt().ceil() as u64).max(2);
        loop {
            scale = base_scale * factor as f64;
            lattice = Lattice::new(grid, Some(scale));
            count = lattice.count_in(grid, region);
            if count <= params.max_pixels {
                break;
            }
            factor += 1;
        }
        warn!(
            "{} samples exceed the budget of {}; coarsened scale {} -> {} ({} samples)",
            required, params.max_pixels, base_scale, scale, count
        );
    }

    info!(
        "Region statistics over {} band(s): scale {}, {} sample(s), lattice {}x{}",
        raster.band_count(),
        scale,
        count,
        lattice.nx,
        lattice.ny
    );

    let bands = raster.bands();
    let gt = grid.transform();
    let (cols, rows) = (grid.width(), grid.height());
    let n_tiles = lattice.ny.div_ceil(TILE_ROWS);

    let partials: Vec<Vec<Moments>> = (0..n_tiles)
        .into_par_iter()
        .map(|t| {
            let mut acc = vec![Moments::default(); bands.len()];
            let j_end = ((t + 1) * TILE_ROWS).min(lattice.ny);
            for j in t * TILE_ROWS..j_end {
                for i in 0..lattice.nx {
                    let (u, v) = lattice.point(i, j);
                    let (x, y) = gt.pixel_to_map(u, v);
                    if !region.contains(x, y) {
                        continue;
                    }
                    let c = (u.floor() as usize).min(cols - 1);
                    let r = (v.floor() as usize).min(rows - 1);
                    for (m, band) in acc.iter_mut().zip(bands) {
                        let value = band.data()[[r, c]];
                        if !is_nodata(value) {
                            m.push(value);
                        }
                    }
                }
            }
            acc
        })
        .collect();

    let mut totals = vec![Moments::default(); bands.len()];
    for tile in &partials {
        for (total, part) in totals.iter_mut().zip(tile) {
            total.merge(part);
        }
    }
    debug!("Merged {} reduction tile(s)", partials.len());

    let moments = bands
        .iter()
        .zip(totals)
        .map(|(band, m)| (band.name().to_string(), m))
        .collect();

    Ok(RegionStats {
        moments,
        scale,
        region: region.clone(),
    })
}
