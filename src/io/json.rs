use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::raster::{Band, GeoTransform, Grid, Raster, is_nodata};
use crate::core::region::Region;
use crate::error::{Error, Result};
use crate::io::{AcquisitionWindow, ImagerySource};

/// One band of a raster document, values row-major as nested rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDocument {
    pub name: String,
    pub values: Vec<Vec<f64>>,
}

/// Self-describing JSON raster: grid geometry, bands and ingestion hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterDocument {
    pub crs: String,
    /// GDAL-ordered affine coefficients
    pub transform: [f64; 6],
    /// Stored value that marks a missing pixel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f64>,
    /// Multiplier from stored values to reflectance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquired: Option<NaiveDate>,
    pub bands: Vec<BandDocument>,
}

impl RasterDocument {
    pub fn from_raster(raster: &Raster) -> Self {
        Self {
            crs: raster.grid().crs().to_string(),
            transform: raster.grid().transform().coefficients(),
            nodata: None,
            scale: None,
            acquired: None,
            bands: raster
                .bands()
                .iter()
                .map(|b| BandDocument {
                    name: b.name().to_string(),
                    values: b.data().outer_iter().map(|row| row.to_vec()).collect(),
                })
                .collect(),
        }
    }

    /// Grid described by the document, sized after its first band.
    pub fn grid(&self) -> Result<Grid> {
        let height = self.bands.first().map_or(0, |b| b.values.len());
        let width = self
            .bands
            .first()
            .and_then(|b| b.values.first())
            .map_or(0, |row| row.len());
        Grid::new(width, height, self.crs.clone(), GeoTransform(self.transform))
    }

    /// Validate geometry, convert the nodata sentinel and apply the reflectance scale.
    pub fn into_raster(self) -> Result<Raster> {
        let grid = self.grid()?;
        let (height, width) = grid.shape();

        let mut bands = Vec::with_capacity(self.bands.len());
        for doc in self.bands {
            if doc.values.len() != height || doc.values.iter().any(|r| r.len() != width) {
                return Err(Error::grid_mismatch(format!(
                    "band '{}' does not match the {}x{} grid",
                    doc.name, width, height
                )));
            }
            let flat: Vec<f64> = doc.values.into_iter().flatten().collect();
            let data = Array2::from_shape_vec((height, width), flat)
                .map_err(|e| Error::grid_mismatch(e.to_string()))?;
            let mut band = Band::new(doc.name, data);
            if let Some(sentinel) = self.nodata {
                band = band.with_nodata_sentinel(sentinel);
            }
            bands.push(band);
        }

        let raster = Raster::new(grid, bands)?;
        Ok(match self.scale {
            Some(factor) => raster.scaled(factor),
            None => raster,
        })
    }
}

/// Imagery source backed by a JSON raster document.
#[derive(Debug, Clone)]
pub struct JsonRasterSource {
    document: RasterDocument,
}

impl JsonRasterSource {
    pub fn new(document: RasterDocument) -> Self {
        Self { document }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(Self::new(serde_json::from_reader(reader)?))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Reading raster document {:?}", path.as_ref());
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    /// Override the document's reflectance scale.
    pub fn with_scale(mut self, factor: f64) -> Self {
        self.document.scale = Some(factor);
        self
    }

    pub fn document(&self) -> &RasterDocument {
        &self.document
    }
}

impl ImagerySource for JsonRasterSource {
    fn fetch(&self, aoi: &Region, window: &AcquisitionWindow) -> Result<Raster> {
        if let Some(date) = self.document.acquired
            && !window.contains(date)
        {
            return Err(Error::invalid("acquired", date));
        }
        let raster = self.document.clone().into_raster()?;
        aoi.ensure_crs(raster.grid())?;

        let (ax0, ay0, ax1, ay1) = aoi.bounds();
        let (gx0, gy0, gx1, gy1) = raster.grid().bounds();
        if ax1 <= gx0 || ax0 >= gx1 || ay1 <= gy0 || ay0 >= gy1 {
            return Err(Error::invalid(
                "aoi",
                format!("{:?} outside raster bounds {:?}", aoi.bounds(), raster.grid().bounds()),
            ));
        }

        let out_of_range = raster
            .bands()
            .iter()
            .flat_map(|b| b.data().iter())
            .filter(|v| !is_nodata(**v) && !(0.0..=1.0).contains(*v))
            .count();
        if out_of_range > 0 {
            warn!(
                "{} value(s) outside [0, 1]; is the reflectance scale set?",
                out_of_range
            );
        }
        Ok(raster)
    }
}
