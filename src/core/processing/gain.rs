use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Gains above this are logged; detail injection that strong tends to produce halos.
const HALO_GAIN_WARNING: f64 = 2.0;

/// Per-band detail multipliers for one fusion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GainSet {
    gains: BTreeMap<String, f64>,
    modulation: f64,
}

impl GainSet {
    /// Gain of zero for every band: fusion then returns the resampled bands unchanged.
    pub fn zero<S: AsRef<str>>(bands: &[S], modulation: f64) -> Self {
        Self {
            gains: bands.iter().map(|b| (b.as_ref().to_string(), 0.0)).collect(),
            modulation,
        }
    }

    pub fn get(&self, band: &str) -> Result<f64> {
        self.gains
            .get(band)
            .copied()
            .ok_or_else(|| Error::missing_band(band))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.gains.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.gains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gains.is_empty()
    }

    pub fn modulation(&self) -> f64 {
        self.modulation
    }
}

/// `gain = band_std / detail_std * modulation` for every band.
///
/// There is no clamping: large modulation values (or a weak detail signal) give large
/// gains, which show up as bright/dark halos along edges in the fused output.
pub fn compute_gains(
    detail_std_dev: f64,
    band_std_devs: &BTreeMap<String, f64>,
    modulation: f64,
) -> Result<GainSet> {
    if !(modulation.is_finite() && modulation >= 0.0) {
        return Err(Error::invalid("modulation", modulation));
    }
    if !detail_std_dev.is_finite() || detail_std_dev == 0.0 {
        return Err(Error::DegenerateStatistics(format!(
            "detail standard deviation is {}",
            detail_std_dev
        )));
    }
    if detail_std_dev < 0.0 {
        return Err(Error::invalid("detail_std_dev", detail_std_dev));
    }

    let mut gains = BTreeMap::new();
    for (band, &std_dev) in band_std_devs {
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(Error::invalid("band_std_dev", format!("{}={}", band, std_dev)));
        }
        let gain = std_dev / detail_std_dev * modulation;
        if gain > HALO_GAIN_WARNING {
            warn!("Gain {:.3} for band '{}' is likely to produce halo artifacts", gain, band);
        }
        debug!("Gain for '{}': {:.6}", band, gain);
        gains.insert(band.clone(), gain);
    }
    Ok(GainSet { gains, modulation })
}
