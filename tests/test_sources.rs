use std::fs;

use approx::assert_abs_diff_eq;

use hpfsharp::io::{
    AcquisitionWindow, ImagerySource, JsonRasterSource, JsonReportSink, OutputSink,
    RasterDocument, SyntheticScene,
};
use hpfsharp::{FusionParams, Region, S2_10M_BANDS, S2_20M_BANDS, pansharpen};

const CRS: &str = "EPSG:32639";

fn aoi() -> Region {
    Region::rect(CRS, 600_000.0, 3_400_000.0, 601_280.0, 3_401_280.0).unwrap()
}

#[test]
fn test_synthetic_sentinel2_scene_end_to_end() {
    let window = AcquisitionWindow::year(2023).unwrap();
    let high = SyntheticScene::sentinel2_10m(CRS).with_seed(7).fetch(&aoi(), &window).unwrap();
    let low = SyntheticScene::sentinel2_20m(CRS).with_seed(7).fetch(&aoi(), &window).unwrap();
    assert_eq!(high.grid().shape(), (128, 128));
    assert_eq!(low.grid().shape(), (64, 64));

    let out = pansharpen(&high, &low, &aoi(), &FusionParams::default()).unwrap();
    assert!(!out.degenerate_fallback);
    assert_eq!(out.raster.band_count(), S2_10M_BANDS.len() + S2_20M_BANDS.len());
    assert_eq!(out.sharpened_bands, S2_20M_BANDS.to_vec());
    assert_eq!(out.stats.scale(), 30.0);

    for name in S2_20M_BANDS {
        assert!(out.gains.get(name).unwrap() > 0.0);
        assert_eq!(out.raster.band(name).unwrap().valid_count(), 128 * 128);
    }

    let report = out.report();
    assert_eq!(report.sharpened.len(), S2_20M_BANDS.len());
    assert_eq!(report.grid.width, 128);
    assert!(report.detail.is_some());
}

#[test]
fn test_json_documents_through_report_file() {
    let window = AcquisitionWindow::year(2023).unwrap();
    let high = SyntheticScene::sentinel2_10m(CRS).fetch(&aoi(), &window).unwrap();
    let low = SyntheticScene::sentinel2_20m(CRS).fetch(&aoi(), &window).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let high_path = dir.path().join("high.json");
    let low_path = dir.path().join("low.json");
    fs::write(&high_path, serde_json::to_string(&RasterDocument::from_raster(&high)).unwrap()).unwrap();
    fs::write(&low_path, serde_json::to_string(&RasterDocument::from_raster(&low)).unwrap()).unwrap();

    let high_in = JsonRasterSource::open(&high_path).unwrap().fetch(&aoi(), &window).unwrap();
    let low_in = JsonRasterSource::open(&low_path).unwrap().fetch(&aoi(), &window).unwrap();
    for (read, written) in [(&high_in, &high), (&low_in, &low)] {
        assert_eq!(read.grid(), written.grid());
        assert_eq!(read.band_names(), written.band_names());
        for (a, b) in read.bands().iter().zip(written.bands()) {
            for (x, y) in a.data().iter().zip(b.data().iter()) {
                assert_abs_diff_eq!(*x, *y, epsilon = 1e-15);
            }
        }
    }

    let out = pansharpen(&high_in, &low_in, &aoi(), &FusionParams::default()).unwrap();
    let report_path = dir.path().join("report.json");
    JsonReportSink::create(&report_path).unwrap().accept(&out).unwrap();

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["tool"], "hpfsharp");
    assert_eq!(report["sharpened"].as_array().unwrap().len(), S2_20M_BANDS.len());
    assert_eq!(report["stats_scale"], 30.0);
}
