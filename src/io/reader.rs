use crate::core::dem::DemRaster;
use crate::core::raster::Raster;
use crate::core::spatial::GeoTransform;
use crate::error::RemError;
use crate::utils::dataset::DatasetEx;
use gdal::{Dataset, Metadata};
use std::path::Path;

pub fn open_dem(path: impl AsRef<Path>) -> Result<DemRaster, RemError> {
    let path = path.as_ref();
    let dataset = Dataset::open_dataset(path)?;

    let mut gt = dataset.geo_transform()?;

    // Point-registered rasters carry their samples at cell corners; shifting
    // the origin half a cell keeps the in-memory convention uniform, with
    // every sample at (col + 0.5, row + 0.5).
    let point_registered = dataset
        .metadata_item("AREA_OR_POINT", "")
        .map(|s| s == "Point")
        .unwrap_or(false);
    if point_registered {
        gt[0] -= 0.5 * gt[1] + 0.5 * gt[2];
        gt[3] -= 0.5 * gt[4] + 0.5 * gt[5];
    }

    let transform = GeoTransform::from_gdal(gt)?;
    let crs = dataset.projection();

    let band = dataset.rasterband(1)?;
    let no_data = band.no_data_value();
    let (width, height) = band.size();

    let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let mut data = buffer.data().to_vec();

    if let Some(no_data) = no_data {
        let sentinel = no_data as f32;
        for v in &mut data {
            if (*v - sentinel).abs() < 1e-6 {
                *v = f32::NAN;
            }
        }
    }

    let mut dem = DemRaster::from_parts(Raster::from_data(width, height, data), transform, crs);
    dem.no_data = no_data;
    dem.source_path = Some(path.to_path_buf());

    Ok(dem)
}
