use ndarray::{Array2, Zip, array};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::raster::{Band, NODATA, is_nodata};
use crate::error::{Error, Result};

/// Small convolution matrix with an anchor cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KernelSpec", into = "KernelSpec")]
pub struct Kernel {
    weights: Array2<f64>,
    anchor: (usize, usize),
}

/// Serialized form: row-major weights plus an optional `[row, col]` anchor (default centre).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KernelSpec {
    weights: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anchor: Option<(usize, usize)>,
}

impl TryFrom<KernelSpec> for Kernel {
    type Error = Error;

    fn try_from(raw: KernelSpec) -> Result<Self> {
        let rows = raw.weights.len();
        let cols = raw.weights.first().map_or(0, |r| r.len());
        if raw.weights.iter().any(|r| r.len() != cols) {
            return Err(Error::invalid("kernel", "ragged weight rows"));
        }
        let flat: Vec<f64> = raw.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((rows, cols), flat)
            .map_err(|e| Error::invalid("kernel", e))?;
        let anchor = raw.anchor.unwrap_or((rows / 2, cols / 2));
        Kernel::new(weights, anchor)
    }
}

impl From<Kernel> for KernelSpec {
    fn from(kernel: Kernel) -> Self {
        KernelSpec {
            weights: kernel.weights.outer_iter().map(|r| r.to_vec()).collect(),
            anchor: Some(kernel.anchor),
        }
    }
}

impl Kernel {
    pub fn new(weights: Array2<f64>, anchor: (usize, usize)) -> Result<Self> {
        let (rows, cols) = weights.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::invalid("kernel", "empty"));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::invalid("kernel", "non-finite weight"));
        }
        if anchor.0 >= rows || anchor.1 >= cols {
            return Err(Error::invalid(
                "kernel_anchor",
                format!("({}, {}) outside {}x{}", anchor.0, anchor.1, rows, cols),
            ));
        }
        Ok(Self { weights, anchor })
    }

    /// 8-neighbour Laplacian, the default high-pass filter.
    pub fn laplacian8() -> Self {
        Self {
            weights: array![[1.0, 1.0, 1.0], [1.0, -8.0, 1.0], [1.0, 1.0, 1.0]],
            anchor: (1, 1),
        }
    }

    /// 4-neighbour Laplacian.
    pub fn laplacian4() -> Self {
        Self {
            weights: array![[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]],
            anchor: (1, 1),
        }
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn anchor(&self) -> (usize, usize) {
        self.anchor
    }

    pub fn sum(&self) -> f64 {
        self.weights.sum()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::laplacian8()
    }
}

/// Discrete 2-D convolution of `band` with `kernel`, edges replicated.
///
/// Reads past the raster border take the nearest edge pixel. Any nodata pixel in the
/// (replicated) neighbourhood makes the output pixel nodata. The result is named `name`
/// and has the input band's shape.
pub fn convolve(band: &Band, kernel: &Kernel, name: &str) -> Band {
    let src = band.data();
    let (rows, cols) = src.dim();
    let (k_rows, k_cols) = kernel.weights.dim();
    let (a_r, a_c) = (kernel.anchor.0 as i64, kernel.anchor.1 as i64);
    let k_sum = kernel.sum();

    info!(
        "Convolving '{}' ({}x{}) with {}x{} kernel (replicate edges)",
        band.name(),
        cols,
        rows,
        k_cols,
        k_rows
    );

    let mut out = Array2::from_elem((rows, cols), NODATA);
    Zip::indexed(&mut out).par_for_each(|(r, c), value| {
        let center = src[[r, c]];
        if is_nodata(center) {
            return;
        }
        // Flat neighbourhoods under zero-sum kernels come out as exactly 0.0.
        let mut acc = 0.0;
        for ((i, j), &w) in kernel.weights.indexed_iter() {
            let sr = (r as i64 + a_r - i as i64).clamp(0, rows as i64 - 1) as usize;
            let sc = (c as i64 + a_c - j as i64).clamp(0, cols as i64 - 1) as usize;
            let v = src[[sr, sc]];
            if is_nodata(v) {
                return;
            }
            acc += w * (v - center);
        }
        *value = acc + k_sum * center;
    });

    Band::new(name, out)
}
