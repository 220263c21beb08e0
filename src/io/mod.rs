//! Collaborator adapters around the fusion core.
//! Provides the `ImagerySource` / `OutputSink` seams, a deterministic `synthetic`
//! scene generator, a `json` raster document reader, and `writers` for run reports.
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::api::FusionOutput;
use crate::core::raster::Raster;
use crate::core::region::Region;
use crate::error::{Error, Result};

pub mod json;
pub use json::{BandDocument, JsonRasterSource, RasterDocument};

pub mod synthetic;
pub use synthetic::SyntheticScene;

pub mod writers;
pub use writers::report::JsonReportSink;

/// Half-open acquisition date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl AcquisitionWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(Error::invalid("acquisition_window", format!("{}..{}", start, end)));
        }
        Ok(Self { start, end })
    }

    /// January 1st of `year` up to (excluding) January 1st of the following year.
    pub fn year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::invalid("year", year))?;
        let end = NaiveDate::from_ymd_opt(year + 1, 1, 1)
            .ok_or_else(|| Error::invalid("year", year))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn start_year(&self) -> i32 {
        self.start.year()
    }
}

/// Supplies a raster (reflectance already scaled to `[0, 1]`) for an area of interest and
/// an acquisition window.
pub trait ImagerySource {
    fn fetch(&self, aoi: &Region, window: &AcquisitionWindow) -> Result<Raster>;
}

/// Receives the result of a fusion run.
pub trait OutputSink {
    fn accept(&mut self, output: &FusionOutput) -> Result<()>;
}
