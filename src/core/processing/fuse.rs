use ndarray::{Array2, Zip};
use tracing::info;

use crate::core::processing::gain::GainSet;
use crate::core::raster::{Band, Raster};
use crate::error::{Error, Result};

/// Inject `gain × detail` into every band of `resampled`.
///
/// `detail` must already be on the grid of `resampled`; nothing is resampled here.
/// Band order and names are preserved.
pub fn fuse(resampled: &Raster, detail: &Band, gains: &GainSet) -> Result<Raster> {
    let grid = resampled.grid();
    if detail.dim() != grid.shape() {
        return Err(Error::grid_mismatch(format!(
            "detail band '{}' is {}x{} but the resampled raster is {}x{}",
            detail.name(),
            detail.dim().1,
            detail.dim().0,
            grid.width(),
            grid.height()
        )));
    }

    info!(
        "Injecting detail '{}' into {} band(s)",
        detail.name(),
        resampled.band_count()
    );

    let bands = resampled
        .bands()
        .iter()
        .map(|band| {
            let gain = gains.get(band.name())?;
            let mut out = Array2::<f64>::zeros(grid.shape());
            Zip::from(&mut out)
                .and(band.data())
                .and(detail.data())
                .par_for_each(|o, &base, &d| *o = base + gain * d);
            Ok(Band::new(band.name(), out))
        })
        .collect::<Result<Vec<_>>>()?;

    Raster::new(grid.clone(), bands)
}

/// Like [`fuse`], with the detail band given as a single-band raster so that its grid
/// (not only its shape) is checked against `resampled`.
pub fn fuse_raster(resampled: &Raster, detail: &Raster, gains: &GainSet) -> Result<Raster> {
    resampled.grid().ensure_same(detail.grid(), "fuse")?;
    let band = match detail.bands() {
        [band] => band,
        bands => {
            return Err(Error::invalid("detail_bands", bands.len()));
        }
    };
    fuse(resampled, band, gains)
}

/// Final output: the native high-resolution bands unchanged, then the sharpened bands.
pub fn assemble(native: &Raster, sharpened: &Raster) -> Result<Raster> {
    native.grid().ensure_same(sharpened.grid(), "assemble")?;
    let out = native.add_bands(sharpened)?;
    info!(
        "Assembled {} native + {} sharpened band(s)",
        native.band_count(),
        sharpened.band_count()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::Grid;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;

    use crate::core::processing::gain::compute_gains;

    fn grid() -> Grid {
        Grid::north_up(3, 2, "EPSG:32639", 0.0, 20.0, 10.0).unwrap()
    }

    #[test]
    fn detail_is_broadcast_with_per_band_gain() {
        let resampled = Raster::new(
            grid(),
            vec![Band::constant("B5", 2, 3, 0.2), Band::constant("B6", 2, 3, 0.4)],
        )
        .unwrap();
        let detail = Band::new(
            "hpf",
            Array2::from_shape_vec((2, 3), vec![0.1, -0.1, 0.0, 0.2, -0.2, 0.05]).unwrap(),
        );
        let stds = BTreeMap::from([("B5".to_string(), 0.1), ("B6".to_string(), 0.2)]);
        let gains = compute_gains(0.1, &stds, 0.5).unwrap();
        let fused = fuse(&resampled, &detail, &gains).unwrap();
        assert_eq!(fused.band_names(), vec!["B5", "B6"]);
        for ((r, c), d) in detail.data().indexed_iter() {
            assert_abs_diff_eq!(fused.band("B5").unwrap().data()[[r, c]], 0.2 + 0.5 * d, epsilon = 1e-15);
            assert_abs_diff_eq!(fused.band("B6").unwrap().data()[[r, c]], 0.4 + 1.0 * d, epsilon = 1e-15);
        }
    }

    #[test]
    fn zero_gain_leaves_bands_untouched() {
        let resampled = Raster::new(grid(), vec![Band::constant("B5", 2, 3, 0.2)]).unwrap();
        let detail = Band::constant("hpf", 2, 3, 0.7);
        let fused = fuse(&resampled, &detail, &GainSet::zero(&["B5"], 0.25)).unwrap();
        assert_eq!(fused, resampled);
    }

    #[test]
    fn misaligned_detail_is_rejected() {
        let resampled = Raster::new(grid(), vec![Band::constant("B5", 2, 3, 0.2)]).unwrap();
        let gains = GainSet::zero(&["B5"], 0.25);
        let err = fuse(&resampled, &Band::constant("hpf", 4, 6, 0.0), &gains).unwrap_err();
        assert!(matches!(err, Error::GridMismatch(_)));

        let shifted = Grid::north_up(3, 2, "EPSG:32639", 5.0, 20.0, 10.0).unwrap();
        let detail = Raster::new(shifted, vec![Band::constant("hpf", 2, 3, 0.0)]).unwrap();
        let err = fuse_raster(&resampled, &detail, &gains).unwrap_err();
        assert!(matches!(err, Error::GridMismatch(_)));
    }

    #[test]
    fn band_without_gain_is_missing() {
        let resampled = Raster::new(grid(), vec![Band::constant("B5", 2, 3, 0.2)]).unwrap();
        let err = fuse(&resampled, &Band::constant("hpf", 2, 3, 0.0), &GainSet::zero(&["B6"], 0.25))
            .unwrap_err();
        assert!(matches!(err, Error::MissingBand { .. }));
    }

    #[test]
    fn assemble_keeps_native_bands_first() {
        let native = Raster::new(
            grid(),
            vec![Band::constant("B2", 2, 3, 0.1), Band::constant("B3", 2, 3, 0.1)],
        )
        .unwrap();
        let sharpened = Raster::new(grid(), vec![Band::constant("B5", 2, 3, 0.2)]).unwrap();
        let out = assemble(&native, &sharpened).unwrap();
        assert_eq!(out.band_names(), vec!["B2", "B3", "B5"]);

        let clash = Raster::new(grid(), vec![Band::constant("B2", 2, 3, 0.2)]).unwrap();
        assert!(matches!(
            assemble(&native, &clash),
            Err(Error::DuplicateBand { .. })
        ));
    }
}
