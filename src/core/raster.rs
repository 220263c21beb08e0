//! Raster grid model: `GeoTransform`, `Grid`, `Band` and `Raster`.
//!
//! A `Raster` is an ordered set of co-registered bands bound to exactly one `Grid`.
//! Construction validates that every band matches the grid shape and that band names
//! are unique; once built, neither the grid nor the band list can be mutated in place.
//! Nodata pixels are represented as `NaN` throughout the crate.
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Marker value for pixels without data.
pub const NODATA: f64 = f64::NAN;

/// Relative tolerance used when comparing transform coefficients.
const TRANSFORM_TOLERANCE: f64 = 1e-9;

#[inline]
pub fn is_nodata(v: f64) -> bool {
    v.is_nan()
}

/// Affine geotransform coefficients
/// (`[origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height]`, GDAL ordering).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with square or rectangular pixels and no rotation.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Map coordinates of a fractional pixel position (corner convention).
    #[inline]
    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        let gt = &self.0;
        (
            gt[0] + col * gt[1] + row * gt[2],
            gt[3] + col * gt[4] + row * gt[5],
        )
    }

    /// Fractional pixel position of a map coordinate, or `None` for a singular transform.
    #[inline]
    pub fn map_to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let gt = &self.0;
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let dx = x - gt[0];
        let dy = y - gt[3];
        let col = (gt[5] * dx - gt[2] * dy) / det;
        let row = (-gt[4] * dx + gt[1] * dy) / det;
        Some((col, row))
    }

    fn determinant(&self) -> f64 {
        self.0[1] * self.0[5] - self.0[2] * self.0[4]
    }

    /// Ground size of one pixel along the column and row axes.
    pub fn pixel_size(&self) -> (f64, f64) {
        let gt = &self.0;
        (gt[1].hypot(gt[4]), gt[2].hypot(gt[5]))
    }

    fn approx_eq(&self, other: &GeoTransform) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| {
            let scale = a.abs().max(b.abs()).max(1.0);
            (a - b).abs() <= TRANSFORM_TOLERANCE * scale
        })
    }
}

/// Spatial reference shared by every band of a raster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    width: usize,
    height: usize,
    crs: String,
    transform: GeoTransform,
}

impl Grid {
    pub fn new(
        width: usize,
        height: usize,
        crs: impl Into<String>,
        transform: GeoTransform,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid("grid_size", format!("{}x{}", width, height)));
        }
        if transform.0.iter().any(|c| !c.is_finite()) || transform.determinant() == 0.0 {
            return Err(Error::invalid(
                "geotransform",
                format!("{:?}", transform.coefficients()),
            ));
        }
        Ok(Self {
            width,
            height,
            crs: crs.into(),
            transform,
        })
    }

    /// North-up grid with square pixels whose upper-left corner is at `(origin_x, origin_y)`.
    pub fn north_up(
        width: usize,
        height: usize,
        crs: impl Into<String>,
        origin_x: f64,
        origin_y: f64,
        pixel_size: f64,
    ) -> Result<Self> {
        Self::new(
            width,
            height,
            crs,
            GeoTransform::north_up(origin_x, origin_y, pixel_size, pixel_size),
        )
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(rows, cols)`, the shape of every band array bound to this grid.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn pixel_size(&self) -> (f64, f64) {
        self.transform.pixel_size()
    }

    /// Map coordinates of the centre of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform
            .pixel_to_map(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Axis-aligned map bounds `(min_x, min_y, max_x, max_y)` of the grid footprint.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [
            self.transform.pixel_to_map(0.0, 0.0),
            self.transform.pixel_to_map(w, 0.0),
            self.transform.pixel_to_map(w, h),
            self.transform.pixel_to_map(0.0, h),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }

    /// Footprint corners in map coordinates, clockwise from the upper-left.
    pub fn footprint(&self) -> Vec<(f64, f64)> {
        let (w, h) = (self.width as f64, self.height as f64);
        vec![
            self.transform.pixel_to_map(0.0, 0.0),
            self.transform.pixel_to_map(w, 0.0),
            self.transform.pixel_to_map(w, h),
            self.transform.pixel_to_map(0.0, h),
        ]
    }

    pub fn crs_matches(&self, crs: &str) -> bool {
        same_crs(&self.crs, crs)
    }

    pub fn same_as(&self, other: &Grid) -> bool {
        self.width == other.width
            && self.height == other.height
            && same_crs(&self.crs, &other.crs)
            && self.transform.approx_eq(&other.transform)
    }

    /// Fails with `Error::GridMismatch` unless `other` describes the same grid.
    pub fn ensure_same(&self, other: &Grid, context: &str) -> Result<()> {
        if self.same_as(other) {
            return Ok(());
        }
        Err(Error::grid_mismatch(format!(
            "{}: {}x{} {} {:?} vs {}x{} {} {:?}",
            context,
            self.width,
            self.height,
            self.crs,
            self.transform.coefficients(),
            other.width,
            other.height,
            other.crs,
            other.transform.coefficients()
        )))
    }
}

pub(crate) fn same_crs(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// A single named channel of values. Its native resolution is that of the raster it
/// belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    name: String,
    data: Array2<f64>,
}

impl Band {
    pub fn new(name: impl Into<String>, data: Array2<f64>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn constant(name: impl Into<String>, rows: usize, cols: usize, value: f64) -> Self {
        Self::new(name, Array2::from_elem((rows, cols), value))
    }

    /// Replace every pixel equal to `sentinel` with `NODATA`.
    pub fn with_nodata_sentinel(mut self, sentinel: f64) -> Self {
        self.data.mapv_inplace(|v| if v == sentinel { NODATA } else { v });
        self
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    /// `(rows, cols)`
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !is_nodata(**v)).count()
    }
}

/// Ordered collection of co-registered bands sharing one grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    grid: Grid,
    bands: Vec<Band>,
}

impl Raster {
    pub fn new(grid: Grid, bands: Vec<Band>) -> Result<Self> {
        Self::validate_shared_grid(&grid, &bands)?;
        debug!(
            "Raster bound to {}x{} grid with {} band(s)",
            grid.width(),
            grid.height(),
            bands.len()
        );
        Ok(Self { grid, bands })
    }

    /// Build a raster on an existing grid from `(name, values)` pairs.
    pub fn from_grid<I, S>(grid: &Grid, bands: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Array2<f64>)>,
        S: Into<String>,
    {
        let bands = bands
            .into_iter()
            .map(|(name, data)| Band::new(name, data))
            .collect();
        Self::new(grid.clone(), bands)
    }

    /// Check that every band has the grid's shape and that names are unique.
    pub fn validate_shared_grid(grid: &Grid, bands: &[Band]) -> Result<()> {
        let expected = grid.shape();
        for (i, band) in bands.iter().enumerate() {
            if band.dim() != expected {
                return Err(Error::grid_mismatch(format!(
                    "band '{}' is {}x{} but the grid is {}x{}",
                    band.name(),
                    band.dim().1,
                    band.dim().0,
                    expected.1,
                    expected.0
                )));
            }
            if bands[..i].iter().any(|b| b.name() == band.name()) {
                return Err(Error::DuplicateBand {
                    band: band.name().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn into_bands(self) -> Vec<Band> {
        self.bands
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name() == name)
    }

    pub fn band(&self, name: &str) -> Result<&Band> {
        self.get(name).ok_or_else(|| Error::missing_band(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sub-raster holding `names` in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Raster> {
        let bands = names
            .iter()
            .map(|n| self.band(n.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        Raster::new(self.grid.clone(), bands)
    }

    /// Stack the bands of `other` after this raster's bands. Both must share a grid.
    pub fn add_bands(&self, other: &Raster) -> Result<Raster> {
        self.grid.ensure_same(&other.grid, "add_bands")?;
        let mut bands = self.bands.clone();
        bands.extend(other.bands.iter().cloned());
        Raster::new(self.grid.clone(), bands)
    }

    pub fn with_band(mut self, band: Band) -> Result<Raster> {
        self.bands.push(band);
        Raster::new(self.grid, self.bands)
    }

    /// Multiply every valid value by `factor` (e.g. digital numbers to reflectance).
    pub fn scaled(&self, factor: f64) -> Raster {
        let bands = self
            .bands
            .iter()
            .map(|b| Band::new(b.name(), b.data().mapv(|v| v * factor)))
            .collect();
        Raster {
            grid: self.grid.clone(),
            bands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid(w: usize, h: usize) -> Grid {
        Grid::north_up(w, h, "EPSG:32639", 500_000.0, 3_400_000.0, 10.0).unwrap()
    }

    #[test]
    fn transform_round_trips_pixel_positions() {
        let gt = GeoTransform([100.0, 2.0, 0.5, 50.0, 0.25, -3.0]);
        let (x, y) = gt.pixel_to_map(3.5, 7.25);
        let (c, r) = gt.map_to_pixel(x, y).unwrap();
        assert_abs_diff_eq!(c, 3.5, epsilon = 1e-9);
        assert_abs_diff_eq!(r, 7.25, epsilon = 1e-9);
    }

    #[test]
    fn singular_transform_is_rejected() {
        let gt = GeoTransform([0.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
        assert!(Grid::new(4, 4, "EPSG:4326", gt).is_err());
        assert!(gt.map_to_pixel(1.0, 1.0).is_none());
    }

    #[test]
    fn raster_rejects_shape_mismatch() {
        let err = Raster::new(grid(4, 4), vec![Band::constant("B4", 4, 5, 0.1)]).unwrap_err();
        assert!(matches!(err, Error::GridMismatch(_)));
    }

    #[test]
    fn raster_rejects_duplicate_names() {
        let err = Raster::new(
            grid(2, 2),
            vec![Band::constant("B4", 2, 2, 0.1), Band::constant("B4", 2, 2, 0.2)],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateBand { .. }));
    }

    #[test]
    fn select_and_lookup() {
        let r = Raster::new(
            grid(2, 2),
            vec![
                Band::constant("B2", 2, 2, 0.1),
                Band::constant("B3", 2, 2, 0.2),
                Band::constant("B4", 2, 2, 0.3),
            ],
        )
        .unwrap();
        let sub = r.select(&["B4", "B2"]).unwrap();
        assert_eq!(sub.band_names(), vec!["B4", "B2"]);
        assert!(matches!(
            r.select(&["B8"]).unwrap_err(),
            Error::MissingBand { .. }
        ));
    }

    #[test]
    fn add_bands_requires_same_grid() {
        let a = Raster::new(grid(2, 2), vec![Band::constant("a", 2, 2, 0.0)]).unwrap();
        let b = Raster::new(
            Grid::north_up(2, 2, "EPSG:32639", 500_010.0, 3_400_000.0, 10.0).unwrap(),
            vec![Band::constant("b", 2, 2, 0.0)],
        )
        .unwrap();
        assert!(matches!(a.add_bands(&b), Err(Error::GridMismatch(_))));
    }

    #[test]
    fn crs_comparison_ignores_case_and_whitespace() {
        let a = grid(2, 2);
        let b = Grid::north_up(2, 2, " epsg:32639", 500_000.0, 3_400_000.0, 10.0).unwrap();
        assert!(a.same_as(&b));
    }

    #[test]
    fn nodata_sentinel_and_scaling() {
        let band = Band::new(
            "B5",
            Array2::from_shape_vec((1, 3), vec![1000.0, 0.0, 2500.0]).unwrap(),
        )
        .with_nodata_sentinel(0.0);
        assert_eq!(band.valid_count(), 2);
        let r = Raster::new(grid(3, 1), vec![band]).unwrap().scaled(1e-4);
        let data = r.band("B5").unwrap().data();
        assert_abs_diff_eq!(data[[0, 0]], 0.1, epsilon = 1e-12);
        assert!(is_nodata(data[[0, 1]]));
        assert_abs_diff_eq!(data[[0, 2]], 0.25, epsilon = 1e-12);
    }
}
