use ndarray::{Array2, Zip};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::core::raster::{Band, Grid, NODATA, Raster, is_nodata};
use crate::error::{Error, Result};
use crate::types::ResampleMethod;

/// Cubic convolution parameter (Keys, a = -0.5).
pub const CUBIC_A: f64 = -0.5;

/// Black-box reprojection primitive between two coordinate reference systems.
///
/// Implementations map a point expressed in the target grid's CRS to the CRS of the
/// raster being resampled.
pub trait CoordinateTransform: Sync {
    fn source_crs(&self) -> &str;
    fn target_crs(&self) -> &str;
    fn target_to_source(&self, x: f64, y: f64) -> Option<(f64, f64)>;
}

/// Resample every band of `raster` onto `target`. Both grids must use the same CRS.
///
/// Target pixels whose centre falls outside the source footprint are set to `NODATA`.
pub fn resample(raster: &Raster, target: &Grid, method: ResampleMethod) -> Result<Raster> {
    if !target.crs_matches(raster.grid().crs()) {
        return Err(Error::ProjectionMismatch {
            from_crs: raster.grid().crs().to_string(),
            to_crs: target.crs().to_string(),
        });
    }
    resample_inner(raster, target, method, None)
}

/// Like [`resample`], but for grids in different reference systems related by `transform`.
pub fn resample_with_transform(
    raster: &Raster,
    target: &Grid,
    method: ResampleMethod,
    transform: &dyn CoordinateTransform,
) -> Result<Raster> {
    if !raster.grid().crs_matches(transform.source_crs()) || !target.crs_matches(transform.target_crs())
    {
        return Err(Error::ProjectionMismatch {
            from_crs: raster.grid().crs().to_string(),
            to_crs: target.crs().to_string(),
        });
    }
    resample_inner(raster, target, method, Some(transform))
}

fn resample_inner(
    raster: &Raster,
    target: &Grid,
    method: ResampleMethod,
    transform: Option<&dyn CoordinateTransform>,
) -> Result<Raster> {
    let src_grid = raster.grid();
    info!(
        "Resampling {} band(s) {}x{} -> {}x{} ({})",
        raster.band_count(),
        src_grid.width(),
        src_grid.height(),
        target.width(),
        target.height(),
        method
    );

    // Source pixel position of every target pixel centre, shared by all bands.
    let src_gt = *src_grid.transform();
    let mut positions: Array2<Option<(f64, f64)>> = Array2::from_elem(target.shape(), None);
    Zip::indexed(&mut positions).par_for_each(|(row, col), pos| {
        let (x, y) = target.pixel_center(col, row);
        let source_point = match transform {
            Some(t) => t.target_to_source(x, y),
            None => Some((x, y)),
        };
        *pos = source_point.and_then(|(sx, sy)| src_gt.map_to_pixel(sx, sy));
    });

    let outside = positions
        .iter()
        .filter(|p| {
            p.map_or(true, |(u, v)| !inside_footprint(u, v, src_grid.width(), src_grid.height()))
        })
        .count();
    if outside > 0 {
        debug!("{} target pixel(s) fall outside the source footprint", outside);
    }

    let bands = raster
        .bands()
        .par_iter()
        .map(|band| {
            let src = band.data();
            let mut out = Array2::from_elem(target.shape(), NODATA);
            Zip::from(&mut out)
                .and(&positions)
                .par_for_each(|value, pos| {
                    if let Some((u, v)) = *pos {
                        *value = sample(src, u, v, method);
                    }
                });
            Band::new(band.name(), out)
        })
        .collect();

    Raster::new(target.clone(), bands)
}

#[inline]
fn inside_footprint(u: f64, v: f64, cols: usize, rows: usize) -> bool {
    u >= 0.0 && v >= 0.0 && u <= cols as f64 && v <= rows as f64
}

/// Sample `src` at fractional pixel position `(u, v)` (corner convention).
pub fn sample(src: &Array2<f64>, u: f64, v: f64, method: ResampleMethod) -> f64 {
    let (rows, cols) = src.dim();
    if !inside_footprint(u, v, cols, rows) {
        return NODATA;
    }
    // Pixel-centre coordinates
    let x = u - 0.5;
    let y = v - 0.5;
    match method {
        ResampleMethod::Nearest => nearest(src, u, v),
        ResampleMethod::Bilinear => bilinear(src, x, y).unwrap_or_else(|| nearest(src, u, v)),
        ResampleMethod::Bicubic => bicubic(src, x, y)
            .or_else(|| bilinear(src, x, y))
            .unwrap_or_else(|| nearest(src, u, v)),
    }
}

#[inline]
fn clamp_index(i: i64, len: usize) -> usize {
    i.clamp(0, len as i64 - 1) as usize
}

fn nearest(src: &Array2<f64>, u: f64, v: f64) -> f64 {
    let (rows, cols) = src.dim();
    let c = clamp_index(u.floor() as i64, cols);
    let r = clamp_index(v.floor() as i64, rows);
    src[[r, c]]
}

fn bilinear(src: &Array2<f64>, x: f64, y: f64) -> Option<f64> {
    let (rows, cols) = src.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let c0 = clamp_index(x0, cols);
    let c1 = clamp_index(x0 + 1, cols);
    let r0 = clamp_index(y0, rows);
    let r1 = clamp_index(y0 + 1, rows);

    let v00 = src[[r0, c0]];
    let v01 = src[[r0, c1]];
    let v10 = src[[r1, c0]];
    let v11 = src[[r1, c1]];
    if [v00, v01, v10, v11].iter().any(|v| is_nodata(*v)) {
        return None;
    }
    let top = v00 * (1.0 - fx) + v01 * fx;
    let bottom = v10 * (1.0 - fx) + v11 * fx;
    Some(top * (1.0 - fy) + bottom * fy)
}

/// Cubic convolution weight for a tap at distance `d`.
#[inline]
pub fn cubic_weight(d: f64) -> f64 {
    let d = d.abs();
    if d <= 1.0 {
        ((CUBIC_A + 2.0) * d - (CUBIC_A + 3.0)) * d * d + 1.0
    } else if d < 2.0 {
        ((CUBIC_A * d - 5.0 * CUBIC_A) * d + 8.0 * CUBIC_A) * d - 4.0 * CUBIC_A
    } else {
        0.0
    }
}

fn bicubic(src: &Array2<f64>, x: f64, y: f64) -> Option<f64> {
    let (rows, cols) = src.dim();
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = x - x0;
    let ty = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let wx = [
        cubic_weight(1.0 + tx),
        cubic_weight(tx),
        cubic_weight(1.0 - tx),
        cubic_weight(2.0 - tx),
    ];
    let wy = [
        cubic_weight(1.0 + ty),
        cubic_weight(ty),
        cubic_weight(1.0 - ty),
        cubic_weight(2.0 - ty),
    ];

    let mut acc = 0.0;
    for (j, wyj) in wy.iter().enumerate() {
        let r = clamp_index(y0 + j as i64 - 1, rows);
        let mut row_acc = 0.0;
        for (i, wxi) in wx.iter().enumerate() {
            let c = clamp_index(x0 + i as i64 - 1, cols);
            let v = src[[r, c]];
            if is_nodata(v) {
                return None;
            }
            row_acc += wxi * v;
        }
        acc += wyj * row_acc;
    }
    Some(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| 0.01 * (r * cols + c) as f64)
    }

    fn raster_on(grid: &Grid, data: Array2<f64>) -> Raster {
        Raster::new(grid.clone(), vec![Band::new("B5", data)]).unwrap()
    }

    #[test]
    fn cubic_weights_partition_unity() {
        for t in [0.0, 0.1, 0.25, 0.5, 0.9] {
            let sum = cubic_weight(1.0 + t) + cubic_weight(t) + cubic_weight(1.0 - t) + cubic_weight(2.0 - t);
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(cubic_weight(0.0), 1.0);
        assert_abs_diff_eq!(cubic_weight(1.0), 0.0);
        assert_abs_diff_eq!(cubic_weight(2.0), 0.0);
    }

    #[test]
    fn resampling_onto_native_grid_is_identity() {
        let grid = Grid::north_up(7, 5, "EPSG:32639", 1000.0, 2000.0, 20.0).unwrap();
        let data = ramp(5, 7);
        let raster = raster_on(&grid, data.clone());
        for method in [
            ResampleMethod::Nearest,
            ResampleMethod::Bilinear,
            ResampleMethod::Bicubic,
        ] {
            let out = resample(&raster, &grid, method).unwrap();
            let got = out.band("B5").unwrap().data();
            for (a, b) in got.iter().zip(data.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn upsampling_constant_band_stays_constant() {
        let low = Grid::north_up(4, 4, "EPSG:32639", 0.0, 80.0, 20.0).unwrap();
        let high = Grid::north_up(8, 8, "EPSG:32639", 0.0, 80.0, 10.0).unwrap();
        let raster = raster_on(&low, Array2::from_elem((4, 4), 0.2));
        let out = resample(&raster, &high, ResampleMethod::Bicubic).unwrap();
        assert_eq!(out.grid(), &high);
        for v in out.band("B5").unwrap().data() {
            assert_abs_diff_eq!(*v, 0.2, epsilon = 1e-12);
        }
    }

    #[test]
    fn bilinear_interpolates_linear_ramp_exactly() {
        let low = Grid::north_up(4, 1, "EPSG:32639", 0.0, 20.0, 20.0).unwrap();
        let high = Grid::north_up(8, 2, "EPSG:32639", 0.0, 20.0, 10.0).unwrap();
        let data = Array2::from_shape_vec((1, 4), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let out = resample(&raster_on(&low, data), &high, ResampleMethod::Bilinear).unwrap();
        let got = out.band("B5").unwrap().data();
        // Interior high-res centres at 15m, 25m sit a quarter pixel either side of low-res centres.
        assert_abs_diff_eq!(got[[0, 1]], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(got[[0, 2]], 0.75, epsilon = 1e-12);
        // Edge replication beyond the outermost centre
        assert_abs_diff_eq!(got[[0, 0]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(got[[0, 7]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn pixels_outside_source_footprint_are_nodata() {
        let src = Grid::north_up(2, 2, "EPSG:32639", 0.0, 20.0, 10.0).unwrap();
        let dst = Grid::north_up(4, 2, "EPSG:32639", 0.0, 20.0, 10.0).unwrap();
        let out = resample(&raster_on(&src, ramp(2, 2)), &dst, ResampleMethod::Bicubic).unwrap();
        let got = out.band("B5").unwrap().data();
        assert!(!is_nodata(got[[0, 1]]));
        assert!(is_nodata(got[[0, 2]]));
        assert!(is_nodata(got[[1, 3]]));
    }

    #[test]
    fn bicubic_falls_back_around_nodata() {
        let grid = Grid::north_up(4, 4, "EPSG:32639", 0.0, 40.0, 10.0).unwrap();
        // Column ramp 0.1, 0.2, 0.3, 0.4 with one hole in the corner.
        let mut data = Array2::from_shape_fn((4, 4), |(_, c)| 0.1 * (c + 1) as f64);
        data[[0, 0]] = NODATA;
        let high = Grid::north_up(8, 8, "EPSG:32639", 0.0, 40.0, 5.0).unwrap();
        let out = resample(&raster_on(&grid, data), &high, ResampleMethod::Bicubic).unwrap();
        let got = out.band("B5").unwrap().data();

        // Every method would read the hole.
        assert!(is_nodata(got[[0, 0]]));
        // x = 1.25: the 4x4 window reaches column 0, the 2x2 window (columns 1-2) does not.
        assert_abs_diff_eq!(got[[3, 3]], 0.225, epsilon = 1e-12);
        // x = 0.75: both windows reach column 0; the containing pixel (1, 1) is valid.
        assert_abs_diff_eq!(got[[2, 2]], 0.2, epsilon = 1e-12);
        // Far from the hole nothing falls back.
        assert!(!is_nodata(got[[7, 7]]));
    }

    #[test]
    fn bilinear_falls_back_to_nearest_around_nodata() {
        let grid = Grid::north_up(4, 4, "EPSG:32639", 0.0, 40.0, 10.0).unwrap();
        let mut data = Array2::from_shape_fn((4, 4), |(_, c)| 0.1 * (c + 1) as f64);
        data[[0, 0]] = NODATA;
        let high = Grid::north_up(8, 8, "EPSG:32639", 0.0, 40.0, 5.0).unwrap();
        let out = resample(&raster_on(&grid, data), &high, ResampleMethod::Bilinear).unwrap();
        let got = out.band("B5").unwrap().data();
        assert_abs_diff_eq!(got[[2, 2]], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(got[[3, 3]], 0.225, epsilon = 1e-12);
        assert!(is_nodata(got[[1, 1]]));
    }

    #[test]
    fn crs_mismatch_without_transform_fails() {
        let src = Grid::north_up(2, 2, "EPSG:32639", 0.0, 0.0, 10.0).unwrap();
        let dst = Grid::north_up(2, 2, "EPSG:4326", 0.0, 0.0, 10.0).unwrap();
        let err = resample(&raster_on(&src, ramp(2, 2)), &dst, ResampleMethod::Nearest).unwrap_err();
        assert!(matches!(err, Error::ProjectionMismatch { .. }));
    }

    struct Shift;

    impl CoordinateTransform for Shift {
        fn source_crs(&self) -> &str {
            "LOCAL:A"
        }
        fn target_crs(&self) -> &str {
            "LOCAL:B"
        }
        fn target_to_source(&self, x: f64, y: f64) -> Option<(f64, f64)> {
            Some((x - 1000.0, y))
        }
    }

    #[test]
    fn known_transform_bridges_reference_systems() {
        let src = Grid::north_up(3, 3, "LOCAL:A", 0.0, 30.0, 10.0).unwrap();
        let dst = Grid::north_up(3, 3, "LOCAL:B", 1000.0, 30.0, 10.0).unwrap();
        let data = ramp(3, 3);
        let raster = raster_on(&src, data.clone());
        let out = resample_with_transform(&raster, &dst, ResampleMethod::Nearest, &Shift).unwrap();
        assert_eq!(out.band("B5").unwrap().data(), &data);

        let wrong = Grid::north_up(3, 3, "LOCAL:C", 1000.0, 30.0, 10.0).unwrap();
        assert!(resample_with_transform(&raster, &wrong, ResampleMethod::Nearest, &Shift).is_err());
    }
}
