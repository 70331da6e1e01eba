use crate::core::dem::DemRaster;
use crate::core::raster::Raster;
use crate::core::spatial::GeoTransform;
use crate::error::RemError;
use crate::render::RenderedImage;
use gdal::raster::Buffer;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::DriverManager;
use geo::{Coord, Rect};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const DEFAULT_NO_DATA: f64 = -9999.0;

// Tracks files as they are written; anything not committed is removed on
// drop, so a failed or cancelled run leaves no partial output behind.
#[derive(Debug, Default)]
pub struct OutputGuard {
    files: Vec<PathBuf>,
    committed: bool,
}

impl OutputGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.files.push(path.clone());
        path
    }

    pub fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        std::mem::take(&mut self.files)
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if !self.committed {
            for file in &self.files {
                let _ = fs::remove_file(file);
            }
        }
    }
}

pub fn write_rem_geotiff(path: &Path, rem: &Raster, dem: &DemRaster) -> Result<(), RemError> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<f32, _>(path, rem.width(), rem.height(), 1)?;

    dataset.set_geo_transform(&dem.transform.as_gdal())?;
    if !dem.crs.is_empty() {
        dataset.set_projection(&dem.crs)?;
    }

    let sentinel = dem.no_data.unwrap_or(DEFAULT_NO_DATA);
    let mut band = dataset.rasterband(1)?;
    band.set_no_data_value(Some(sentinel))?;

    let data: Vec<f32> = rem
        .data()
        .iter()
        .map(|v| if v.is_nan() { sentinel as f32 } else { *v })
        .collect();
    let mut buffer = Buffer::new((rem.width(), rem.height()), data);
    band.write((0, 0), (rem.width(), rem.height()), &mut buffer)?;

    Ok(())
}

pub fn write_viz_geotiff(
    path: &Path,
    image: &RenderedImage,
    dem: &DemRaster,
) -> Result<(), RemError> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<u8, _>(path, image.width, image.height, 4)?;

    dataset.set_geo_transform(&dem.transform.as_gdal())?;
    if !dem.crs.is_empty() {
        dataset.set_projection(&dem.crs)?;
    }

    for channel in 0..4 {
        let data: Vec<u8> = image.rgba.iter().skip(channel).step_by(4).copied().collect();
        let mut band = dataset.rasterband(channel + 1)?;
        let mut buffer = Buffer::new((image.width, image.height), data);
        band.write((0, 0), (image.width, image.height), &mut buffer)?;
    }

    Ok(())
}

pub fn write_png(path: &Path, image: &RenderedImage) -> Result<(), RemError> {
    image::save_buffer(
        path,
        &image.rgba,
        image.width as u32,
        image.height as u32,
        ExtendedColorType::Rgba8,
    )?;
    Ok(())
}

// ESRI world file alongside the PNG: pixel size, rotation terms, and the
// world position of the top-left pixel center.
pub fn write_world_file(path: &Path, transform: &GeoTransform) -> Result<(), RemError> {
    let gt = transform.as_gdal();
    let center = transform.pixel_to_geo(0.5, 0.5);

    let contents = format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n",
        gt[1], gt[4], gt[2], gt[5], center.x, center.y
    );
    fs::write(path, contents)?;

    Ok(())
}

pub fn wgs84_bounds(dem: &DemRaster) -> Result<Rect<f64>, RemError> {
    if dem.crs.trim().is_empty() {
        return Err(RemError::InvalidGeometry(
            "DEM has no CRS; a ground overlay needs one".into(),
        ));
    }

    let mut source = SpatialRef::from_wkt(&dem.crs)?;
    source.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    let mut target = SpatialRef::from_epsg(4326)?;
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    let transform = CoordTransform::new(&source, &target)?;

    let extent = dem.extent();
    let mut xs = vec![
        extent.min().x,
        extent.max().x,
        extent.max().x,
        extent.min().x,
    ];
    let mut ys = vec![
        extent.min().y,
        extent.min().y,
        extent.max().y,
        extent.max().y,
    ];
    let mut zs = vec![0.0; 4];

    transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

    let mut min = Coord {
        x: f64::MAX,
        y: f64::MAX,
    };
    let mut max = Coord {
        x: f64::MIN,
        y: f64::MIN,
    };
    for i in 0..4 {
        if !xs[i].is_finite() || !ys[i].is_finite() {
            return Err(RemError::InvalidGeometry(
                "reprojection to WGS84 produced non-finite coordinates".into(),
            ));
        }
        min.x = min.x.min(xs[i]);
        min.y = min.y.min(ys[i]);
        max.x = max.x.max(xs[i]);
        max.y = max.y.max(ys[i]);
    }

    Ok(Rect::new(min, max))
}

pub fn write_kmz(
    path: &Path,
    image: &RenderedImage,
    bounds: Rect<f64>,
    name: &str,
) -> Result<(), RemError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        &image.rgba,
        image.width as u32,
        image.height as u32,
        ExtendedColorType::Rgba8,
    )?;

    let kml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <GroundOverlay>
    <name>{name}</name>
    <Icon><href>overlay.png</href></Icon>
    <LatLonBox>
      <north>{north}</north>
      <south>{south}</south>
      <east>{east}</east>
      <west>{west}</west>
    </LatLonBox>
  </GroundOverlay>
</kml>
"#,
        name = name,
        north = bounds.max().y,
        south = bounds.min().y,
        east = bounds.max().x,
        west = bounds.min().x,
    );

    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("doc.kml", options)?;
    zip.write_all(kml.as_bytes())?;
    zip.start_file("overlay.png", options)?;
    zip.write_all(&png)?;
    zip.finish()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spatial::GeoTransform;

    #[test]
    fn uncommitted_outputs_are_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.txt");
        let dropped = dir.path().join("dropped.txt");

        {
            let mut guard = OutputGuard::new();
            fs::write(guard.track(&kept), b"x").unwrap();
            let committed = guard.commit();
            assert_eq!(committed, vec![kept.clone()]);
        }
        {
            let mut guard = OutputGuard::new();
            fs::write(guard.track(&dropped), b"x").unwrap();
        }

        assert!(kept.exists());
        assert!(!dropped.exists());
    }

    #[test]
    fn world_file_points_at_the_first_pixel_center() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viz.pgw");
        let gt = GeoTransform::from_gdal([500.0, 2.0, 0.0, 900.0, 0.0, -2.0]).unwrap();

        write_world_file(&path, &gt).unwrap();

        let lines: Vec<String> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(lines, vec!["2", "0", "0", "-2", "501", "899"]);
    }

    #[test]
    fn kmz_contains_kml_and_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.kmz");
        let image = RenderedImage {
            width: 2,
            height: 2,
            rgba: vec![255; 16],
        };
        let bounds = Rect::new(Coord { x: 10.0, y: 45.0 }, Coord { x: 11.0, y: 46.0 });

        write_kmz(&path, &image, bounds, "test overlay").unwrap();

        let file = File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert!(archive.by_name("overlay.png").is_ok());

        let mut kml = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("doc.kml").unwrap(), &mut kml).unwrap();
        assert!(kml.contains("<north>46</north>"));
        assert!(kml.contains("<west>10</west>"));
    }
}
