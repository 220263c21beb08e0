use std::collections::BTreeMap;

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::raster::{Band, Raster};
use crate::error::{Error, Result};

/// Band name → linear coefficient used to build a synthetic intensity band.
///
/// Coefficients are not required to sum to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandWeights(BTreeMap<String, f64>);

impl BandWeights {
    pub fn new<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(weights.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// RGB luma (0.299/0.587/0.114) plus a 0.3 near-infrared term, on Sentinel-2 band names.
    pub fn sentinel2_luminance() -> Self {
        Self::new([("B4", 0.299), ("B3", 0.587), ("B2", 0.114), ("B8", 0.3)])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

impl Default for BandWeights {
    fn default() -> Self {
        Self::sentinel2_luminance()
    }
}

/// Per-pixel weighted sum of the bands named in `weights`, returned as a band called `name`.
pub fn synthesize(raster: &Raster, weights: &BandWeights, name: &str) -> Result<Band> {
    if weights.is_empty() {
        return Err(Error::invalid("weights", "empty"));
    }
    if let Some((band, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
        return Err(Error::invalid("weights", format!("{}={}", band, w)));
    }
    let sources = weights
        .iter()
        .map(|(band, w)| raster.band(band).map(|b| (b, w)))
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Synthesizing '{}' from {} band(s), weight sum {:.3}",
        name,
        sources.len(),
        weights.total()
    );

    let mut out = Array2::<f64>::zeros(raster.grid().shape());
    for (band, w) in sources {
        Zip::from(&mut out)
            .and(band.data())
            .par_for_each(|acc, &v| *acc += w * v);
    }
    Ok(Band::new(name, out))
}
