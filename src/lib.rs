#![doc = r#"
HPFSHARP: adaptive high-pass-filter pan-sharpening for multi-resolution rasters.

This crate sharpens coarse multispectral bands (for example Sentinel-2 20 m bands) using the
spatial detail of co-registered fine bands (the 10 m bands). It synthesizes an intensity band
from the fine bands, extracts its high-frequency detail with a Laplacian kernel, and injects
that detail into each resampled coarse band with a gain derived from region statistics:

```text
gain(band) = std(band over region) / std(detail over region) × modulation
output     = resampled(band) + gain(band) × detail
```

It powers the `hpfsharp` CLI and can be embedded in your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may evolve.

Add dependency
--------------
```toml
[dependencies]
hpfsharp = "0.1"
```

Quick start: sharpen in memory
------------------------------
```rust,no_run
use hpfsharp::{pansharpen, Band, BandWeights, FusionParams, Grid, Raster, Region};
use ndarray::Array2;

fn main() -> hpfsharp::Result<()> {
    let fine = Grid::north_up(8, 8, "EPSG:32639", 600_000.0, 3_400_080.0, 10.0)?;
    let coarse = Grid::north_up(4, 4, "EPSG:32639", 600_000.0, 3_400_080.0, 20.0)?;

    let texture = Array2::from_shape_fn((8, 8), |(r, c)| if (r + c) % 2 == 0 { 0.1 } else { 0.3 });
    let high = Raster::new(fine, vec![Band::new("B4", texture)])?;
    let low = Raster::new(coarse, vec![Band::constant("B5", 4, 4, 0.2)])?;

    let params = FusionParams {
        weights: BandWeights::new([("B4", 1.0)]),
        ..FusionParams::default()
    };
    let out = pansharpen(&high, &low, &Region::from_grid(high.grid()), &params)?;

    // Native B4 followed by the sharpened B5, on the 10 m grid.
    assert_eq!(out.raster.band_names(), vec!["B4", "B5"]);
    println!("gain(B5) = {}", out.gains.get("B5")?);
    Ok(())
}
```

Sources and sinks
-----------------
```rust,no_run
use hpfsharp::io::{AcquisitionWindow, ImagerySource, JsonReportSink, OutputSink, SyntheticScene};
use hpfsharp::{pansharpen, FusionParams, Region};

fn main() -> hpfsharp::Result<()> {
    let aoi = Region::rect("EPSG:32639", 600_000.0, 3_400_000.0, 602_560.0, 3_402_560.0)?;
    let window = AcquisitionWindow::year(2023)?;

    let high = SyntheticScene::sentinel2_10m("EPSG:32639").fetch(&aoi, &window)?;
    let low = SyntheticScene::sentinel2_20m("EPSG:32639").fetch(&aoi, &window)?;

    let out = pansharpen(&high, &low, &aoi, &FusionParams::default())?;
    let mut sink = JsonReportSink::create("/out/fusion-report.json")?;
    sink.accept(&out)
}
```

Per-stage building blocks
-------------------------
Every stage of the pipeline is available on its own under [`core::processing`]:

```rust,no_run
use hpfsharp::{
    compute_gains, compute_std_dev, convolve, fuse, resample, synthesize,
    BandWeights, Kernel, Raster, Region, ResampleMethod, StatsParams,
};

fn sharpen(high: &Raster, low: &Raster, region: &Region) -> hpfsharp::Result<Raster> {
    let pan = synthesize(high, &BandWeights::sentinel2_luminance(), "pan")?;
    let detail = convolve(&pan, &Kernel::laplacian8(), "hpf");
    let resampled = resample(low, high.grid(), ResampleMethod::Bicubic)?;

    let stats = compute_std_dev(
        &resampled.clone().with_band(detail.clone())?,
        region,
        &StatsParams::default(),
    )?;
    let gains = compute_gains(stats.std_dev("hpf")?, &stats.std_devs(&low.band_names())?, 0.25)?;
    fuse(&resampled, &detail, &gains)
}
```

Error handling
--------------
All public functions return `hpfsharp::Result<T>`; match on `hpfsharp::Error` to handle specific
cases.

```rust,no_run
use hpfsharp::{pansharpen, Error, FusionParams, Raster, Region};

fn run(high: &Raster, low: &Raster, region: &Region) {
    match pansharpen(high, low, region, &FusionParams::default()) {
        Ok(out) => println!("{} band(s)", out.raster.band_count()),
        Err(Error::DegenerateStatistics(reason)) => eprintln!("nothing to sharpen: {reason}"),
        Err(Error::ResourceExhaustion { required, budget }) => {
            eprintln!("{required} samples exceed the budget of {budget}")
        }
        Err(other) => eprintln!("fusion failed: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: the complete pipeline and run reports.
- [`core`]: grid model, regions, parameters and the per-stage processing modules.
- [`io`]: imagery sources, acquisition windows and output sinks.
- [`types`]: shared enums (`ResampleMethod`, `DegeneratePolicy`).
- [`error`]: crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated re-exports for a stable, ergonomic public API
pub use api::{FusionOutput, FusionReport, pansharpen};
pub use core::params::{FusionParams, S2_10M_BANDS, S2_20M_BANDS, S2_REFLECTANCE_SCALE};
pub use core::processing::convolve::{Kernel, convolve};
pub use core::processing::fuse::{assemble, fuse};
pub use core::processing::gain::{GainSet, compute_gains};
pub use core::processing::resample::{CoordinateTransform, resample, resample_with_transform};
pub use core::processing::stats::{BandStats, RegionStats, StatsParams, compute_std_dev};
pub use core::processing::synthesize::{BandWeights, synthesize};
pub use core::raster::{Band, GeoTransform, Grid, NODATA, Raster};
pub use core::region::Region;
pub use error::{Error, Result};
pub use types::{DegeneratePolicy, ResampleMethod};
