use crate::core::raster::{Interpolator, Raster};
use crate::core::spatial::GeoTransform;
use geo::Rect;
use std::path::PathBuf;

// In-memory DEM. Values are f32 with NaN as no-data; the geotransform maps
// pixel corners, so the center of cell (col, row) sits at (col + 0.5, row + 0.5).
#[derive(Debug, Clone)]
pub struct DemRaster {
    pub grid: Raster,
    pub transform: GeoTransform,
    pub crs: String,
    pub no_data: Option<f64>,
    pub source_path: Option<PathBuf>,
}

impl DemRaster {
    pub fn from_parts(grid: Raster, transform: GeoTransform, crs: impl Into<String>) -> Self {
        Self {
            grid,
            transform,
            crs: crs.into(),
            no_data: None,
            source_path: None,
        }
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn extent(&self) -> Rect<f64> {
        self.transform.extent(self.width(), self.height())
    }

    pub fn cell_size(&self) -> (f64, f64) {
        self.transform.cell_size()
    }

    pub fn diagonal(&self) -> f64 {
        let (cw, ch) = self.cell_size();
        let dx = cw * self.width() as f64;
        let dy = ch * self.height() as f64;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn sample_elevation(&self, x: f64, y: f64, strategy: &dyn Interpolator) -> Option<f32> {
        let px = self.transform.geo_to_pixel(x, y);
        strategy.sample(&self.grid, px.x - 0.5, px.y - 0.5)
    }
}
