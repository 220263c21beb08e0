//! Fusion building blocks, one module per stage: resampling, band synthesis,
//! high-pass convolution, region statistics, gain computation and detail injection.
pub mod convolve;
pub mod fuse;
pub mod gain;
pub mod resample;
pub mod stats;
pub mod synthesize;
