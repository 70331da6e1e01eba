pub mod index;

use crate::core::dem::DemRaster;
use crate::utils::float::FloatEx;
use index::{Neighbor, PointIndex};
use tap::Pipe;

#[derive(Debug, Clone, Copy)]
pub struct SamplerParams {
    pub k: usize,
    pub error_tolerance: f64,
    pub max_search_radius: f64,
}

// Answers water-surface elevation queries against the shared point index.
// Cheap to copy into worker threads; everything behind it is read-only.
#[derive(Clone, Copy)]
pub struct WaterSurfaceSampler<'a> {
    index: &'a PointIndex,
    params: SamplerParams,
}

impl<'a> WaterSurfaceSampler<'a> {
    pub fn new(index: &'a PointIndex, params: SamplerParams) -> Self {
        Self { index, params }
    }

    pub fn surface_elevation(&self, x: f64, y: f64) -> f32 {
        self.index
            .nearest(
                x,
                y,
                self.params.k,
                self.params.error_tolerance,
                self.params.max_search_radius,
            )
            .pipe(|neighbors| idw_elevation(&neighbors))
    }

    // Water surface for `rows` DEM rows starting at `row_off`. DEM no-data
    // stays no-data; pixels with no neighbor in range come back NaN.
    pub fn sample_rows(&self, dem: &DemRaster, row_off: usize, rows: usize) -> Vec<f32> {
        let width = dem.width();
        let mut out = vec![f32::NAN; width * rows];

        for r in 0..rows {
            let row = row_off + r;
            for col in 0..width {
                if dem.grid.get(col, row).is_not_nan() {
                    let center = dem
                        .transform
                        .pixel_to_geo(col as f64 + 0.5, row as f64 + 0.5);
                    out[r * width + col] = self.surface_elevation(center.x, center.y);
                }
            }
        }

        out
    }
}

// Inverse-distance weighting: a coincident point carries weight 1, everything
// else 1/distance. Empty neighborhoods are gaps, not failures.
fn idw_elevation(neighbors: &[Neighbor]) -> f32 {
    if neighbors.is_empty() {
        return f32::NAN;
    }

    let mut weight_sum = 0.0;
    let mut weighted = 0.0;

    for n in neighbors {
        let weight = if n.distance == 0.0 {
            1.0
        } else {
            1.0 / n.distance
        };
        weight_sum += weight;
        weighted += weight * n.elevation;
    }

    (weighted / weight_sum) as f32
}
