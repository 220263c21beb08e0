//! Region of interest used by the statistics engine.
//!
//! A region is a simple polygon (even-odd fill rule) expressed in the map coordinates
//! of a named CRS. The core never transforms regions between reference systems.
use serde::{Deserialize, Serialize};

use crate::core::raster::{Grid, same_crs};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RegionSpec", into = "RegionSpec")]
pub struct Region {
    crs: String,
    vertices: Vec<(f64, f64)>,
    bbox: (f64, f64, f64, f64),
}

/// Serialized form of a [`Region`]; deserialization goes through [`Region::polygon`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegionSpec {
    crs: String,
    vertices: Vec<(f64, f64)>,
}

impl TryFrom<RegionSpec> for Region {
    type Error = Error;

    fn try_from(raw: RegionSpec) -> Result<Self> {
        Region::polygon(raw.crs, raw.vertices)
    }
}

impl From<Region> for RegionSpec {
    fn from(region: Region) -> Self {
        RegionSpec {
            crs: region.crs,
            vertices: region.vertices,
        }
    }
}

impl Region {
    /// Polygon from its vertices; a closing vertex equal to the first one is optional.
    pub fn polygon(crs: impl Into<String>, mut vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() > 1 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(Error::invalid("region_vertices", vertices.len()));
        }
        if vertices.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::invalid("region_vertices", "non-finite coordinate"));
        }
        let bbox = bounding_box(&vertices);
        Ok(Self {
            crs: crs.into(),
            vertices,
            bbox,
        })
    }

    /// Axis-aligned rectangle.
    pub fn rect(crs: impl Into<String>, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if !(min_x < max_x && min_y < max_y) {
            return Err(Error::invalid(
                "region_bounds",
                format!("{},{},{},{}", min_x, min_y, max_x, max_y),
            ));
        }
        Self::polygon(
            crs,
            vec![(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)],
        )
    }

    /// The full footprint of `grid`.
    pub fn from_grid(grid: &Grid) -> Self {
        let vertices = grid.footprint();
        let bbox = bounding_box(&vertices);
        Self {
            crs: grid.crs().to_string(),
            vertices,
            bbox,
        }
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }

    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.bbox
    }

    /// Fails with `Error::ProjectionMismatch` if the region is not expressed in `grid`'s CRS.
    pub fn ensure_crs(&self, grid: &Grid) -> Result<()> {
        if same_crs(&self.crs, grid.crs()) {
            Ok(())
        } else {
            Err(Error::ProjectionMismatch {
                from_crs: self.crs.clone(),
                to_crs: grid.crs().to_string(),
            })
        }
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bounds();
        if x < min_x || x > max_x || y < min_y || y > max_y {
            return false;
        }
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

fn bounding_box(vertices: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    vertices.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |(a, b, c, d), &(x, y)| (a.min(x), b.min(y), c.max(x), d.max(y)),
    )
}
