use clap::Parser;
use std::path::PathBuf;

use hpfsharp::{DegeneratePolicy, ResampleMethod};

#[derive(Parser)]
#[command(name = "hpfsharp", version, about = "HPF pan-sharpening CLI")]
pub struct CliArgs {
    /// High-resolution raster document (JSON) providing the detail bands
    #[arg(long)]
    pub high_res: Option<PathBuf>,

    /// Low-resolution raster document (JSON) with the bands to sharpen
    #[arg(long)]
    pub low_res: Option<PathBuf>,

    /// Use the built-in synthetic Sentinel-2 scene instead of raster documents
    #[arg(long, default_value_t = false)]
    pub synthetic: bool,

    /// Seed of the synthetic scene
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Region of interest as "min_x,min_y,max_x,max_y" in map units.
    /// Defaults to the high-resolution footprint; required with --synthetic
    #[arg(long)]
    pub region: Option<String>,

    /// CRS of --region (defaults to the high-resolution CRS, EPSG:32639 for --synthetic)
    #[arg(long)]
    pub crs: Option<String>,

    /// Acquisition year; inputs acquired outside it are rejected
    #[arg(long, default_value_t = 2023)]
    pub year: i32,

    /// Fusion parameters (JSON); flags below override individual fields
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Resampling method for the low-resolution bands
    #[arg(long, value_enum)]
    pub resample: Option<ResampleMethod>,

    /// Sharpening strength
    #[arg(long)]
    pub modulation: Option<f64>,

    /// Statistics sampling scale in map units. Options:
    /// - Custom: any positive number (e.g., 30)
    /// - Native: "native" (every pixel of the high-resolution grid)
    #[arg(long)]
    pub scale: Option<String>,

    /// Maximum number of statistics samples
    #[arg(long)]
    pub max_pixels: Option<u64>,

    /// Coarsen the statistics scale instead of failing when --max-pixels is exceeded
    #[arg(long)]
    pub best_effort: Option<bool>,

    /// Behaviour when the detail band is flat over the region
    #[arg(long, value_enum)]
    pub on_degenerate: Option<DegeneratePolicy>,

    /// Multiplier applied to stored values of the raster documents (1e-4 for Sentinel-2 L2A)
    #[arg(long)]
    pub reflectance_scale: Option<f64>,

    /// Report output file (JSON); printed to stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Enable logging (filter with RUST_LOG)
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
