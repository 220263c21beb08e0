use std::fs;
use std::io;
use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use hpfsharp::io::{
    AcquisitionWindow, ImagerySource, JsonRasterSource, JsonReportSink, OutputSink, SyntheticScene,
};
use hpfsharp::{FusionParams, Raster, Region, pansharpen};

use super::args::CliArgs;
use super::errors::AppError;

const SYNTHETIC_CRS: &str = "EPSG:32639";

/// `--params` file (or defaults) with the individual flags applied on top.
fn build_params(args: &CliArgs) -> Result<FusionParams, AppError> {
    let mut params = match &args.params {
        Some(path) => {
            info!("Loading fusion parameters from {:?}", path);
            FusionParams::from_json(&fs::read_to_string(path)?)?
        }
        None => FusionParams::default(),
    };

    if let Some(method) = args.resample {
        params.resample = method;
    }
    if let Some(modulation) = args.modulation {
        params.modulation = modulation;
    }
    if let Some(scale) = &args.scale {
        params.stats.scale = if scale == "native" {
            None
        } else {
            let parsed = scale.parse::<f64>().map_err(|_| AppError::InvalidScale {
                scale: scale.clone(),
            })?;
            if !(parsed.is_finite() && parsed > 0.0) {
                return Err(AppError::InvalidScale {
                    scale: scale.clone(),
                });
            }
            Some(parsed)
        };
    }
    if let Some(max_pixels) = args.max_pixels {
        params.stats.max_pixels = max_pixels;
    }
    if let Some(best_effort) = args.best_effort {
        params.stats.best_effort = best_effort;
    }
    if let Some(policy) = args.on_degenerate {
        params.on_degenerate = policy;
    }

    params.validate()?;
    Ok(params)
}

fn parse_region(text: &str, crs: &str) -> Result<Region, AppError> {
    let invalid = || AppError::InvalidRegion {
        region: text.to_string(),
    };
    let coords = text
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    match coords.as_slice() {
        &[min_x, min_y, max_x, max_y] => {
            Region::rect(crs, min_x, min_y, max_x, max_y).map_err(|_| invalid())
        }
        _ => Err(invalid()),
    }
}

fn load_synthetic(
    args: &CliArgs,
    window: &AcquisitionWindow,
) -> Result<(Raster, Raster, Region), AppError> {
    if args.high_res.is_some() || args.low_res.is_some() {
        return Err(AppError::ConflictingArguments {
            first: "--synthetic".to_string(),
            second: "--high-res/--low-res".to_string(),
        });
    }
    let text = args.region.as_deref().ok_or(AppError::MissingArgument {
        arg: "--region".to_string(),
    })?;
    let crs = args.crs.as_deref().unwrap_or(SYNTHETIC_CRS);
    let region = parse_region(text, crs)?;

    info!("Generating synthetic Sentinel-2 scene (seed {})", args.seed);
    let high = SyntheticScene::sentinel2_10m(crs)
        .with_seed(args.seed)
        .fetch(&region, window)?;
    let low = SyntheticScene::sentinel2_20m(crs)
        .with_seed(args.seed)
        .fetch(&region, window)?;
    Ok((high, low, region))
}

fn open_source(path: &Path, reflectance_scale: Option<f64>) -> Result<JsonRasterSource, AppError> {
    let source = JsonRasterSource::open(path)?;
    Ok(match reflectance_scale {
        Some(factor) => source.with_scale(factor),
        None => source,
    })
}

fn load_documents(
    args: &CliArgs,
    window: &AcquisitionWindow,
) -> Result<(Raster, Raster, Region), AppError> {
    let high_path = args.high_res.as_deref().ok_or(AppError::MissingArgument {
        arg: "--high-res".to_string(),
    })?;
    let low_path = args.low_res.as_deref().ok_or(AppError::MissingArgument {
        arg: "--low-res".to_string(),
    })?;

    let high_src = open_source(high_path, args.reflectance_scale)?;
    let low_src = open_source(low_path, args.reflectance_scale)?;

    let region = match &args.region {
        Some(text) => {
            let crs = args
                .crs
                .clone()
                .unwrap_or_else(|| high_src.document().crs.clone());
            parse_region(text, &crs)?
        }
        None => Region::from_grid(&high_src.document().grid()?),
    };

    let high = high_src.fetch(&region, window)?;
    let low = low_src.fetch(&region, window)?;
    Ok((high, low, region))
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(io::stderr)
            .init();
    }

    let params = build_params(&args)?;
    let window = AcquisitionWindow::year(args.year)?;

    let (high, low, region) = if args.synthetic {
        load_synthetic(&args, &window)?
    } else {
        load_documents(&args, &window)?
    };

    let output = pansharpen(&high, &low, &region, &params)?;
    info!(
        "Sharpened {} band(s) with modulation {}",
        output.sharpened_bands.len(),
        params.modulation
    );

    match &args.output {
        Some(path) => {
            JsonReportSink::create(path)?.accept(&output)?;
            info!("Successfully wrote report: {:?}", path);
        }
        None => JsonReportSink::new(io::stdout().lock()).accept(&output)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use hpfsharp::{DegeneratePolicy, ResampleMethod};

    fn args(extra: &[&str]) -> CliArgs {
        CliArgs::parse_from(std::iter::once("hpfsharp").chain(extra.iter().copied()))
    }

    #[test]
    fn flags_override_defaults() {
        let params = build_params(&args(&[
            "--resample",
            "bilinear",
            "--modulation",
            "0.5",
            "--scale",
            "native",
            "--best-effort",
            "false",
            "--on-degenerate",
            "zero-gain",
        ]))
        .unwrap();
        assert_eq!(params.resample, ResampleMethod::Bilinear);
        assert_eq!(params.modulation, 0.5);
        assert_eq!(params.stats.scale, None);
        assert!(!params.stats.best_effort);
        assert_eq!(params.on_degenerate, DegeneratePolicy::ZeroGain);
    }

    #[test]
    fn bad_scale_and_region_are_rejected() {
        assert!(matches!(
            build_params(&args(&["--scale", "0"])),
            Err(AppError::InvalidScale { .. })
        ));
        assert!(matches!(
            parse_region("0,0,10", "EPSG:32639"),
            Err(AppError::InvalidRegion { .. })
        ));
        let region = parse_region("0, 0, 100, 50", "EPSG:32639").unwrap();
        assert_eq!(region.bounds(), (0.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn synthetic_mode_requires_region() {
        let window = AcquisitionWindow::year(2023).unwrap();
        assert!(matches!(
            load_synthetic(&args(&["--synthetic"]), &window),
            Err(AppError::MissingArgument { .. })
        ));
    }
}
