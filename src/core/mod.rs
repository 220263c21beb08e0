//! Core building blocks: the raster grid model, regions of interest, fusion parameters
//! and the per-stage processing modules. These are the primitives consumed by the
//! high-level `api` module.
pub mod params;
pub mod processing;
pub mod raster;
pub mod region;
