pub mod colormap;
pub mod hillshade;

use crate::config::RenderConfig;
use crate::core::dem::DemRaster;
use crate::core::raster::Raster;
use crate::progress::Progress;
use crate::utils::float::FloatEx;
use hillshade::hillshade;

// Display range for the colormap, in percentiles of the finite REM values.
const DISPLAY_RANGE: [f64; 2] = [2.0, 98.0];

pub struct RenderedImage {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

pub fn render(
    rem: &Raster,
    dem: &DemRaster,
    config: &RenderConfig,
    progress: &Progress<'_>,
) -> RenderedImage {
    let width = rem.width();
    let height = rem.height();

    let (cell_w, cell_h) = dem.cell_size();
    let shade = hillshade(&dem.grid, cell_w, cell_h, config.vertical_exaggeration);
    progress.update(0.3);

    let (lo, hi) = display_range(rem);
    let span = hi - lo;
    let blend = config.hillshade_blend as f32;

    let mut rgba = vec![0u8; width * height * 4];
    for row in 0..height {
        for col in 0..width {
            let idx = row * width + col;
            let value = rem.get(col, row);
            if value.is_nan() {
                continue;
            }

            let t = ((value - lo) / span).clamp(0.0, 1.0);
            let color = colormap::sample(config.colormap, t);

            let s = shade[idx];
            let light = if s.is_not_nan() { s } else { 1.0 };

            let px = &mut rgba[idx * 4..idx * 4 + 4];
            for c in 0..3 {
                px[c] = (blend * light * 255.0 + (1.0 - blend) * color[c] as f32).round() as u8;
            }
            px[3] = 255;
        }

        if row % 64 == 0 {
            progress.update(0.3 + 0.6 * (row as f64 / height as f64));
        }
    }

    RenderedImage {
        width,
        height,
        rgba,
    }
}

fn display_range(rem: &Raster) -> (f32, f32) {
    let (lo, hi) = match rem.percentiles(&DISPLAY_RANGE) {
        Some(ps) => (ps[0], ps[1]),
        None => (0.0, 0.0),
    };

    if hi - lo <= f32::EPSILON {
        (lo, lo + 1.0)
    } else {
        (lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Colormap;
    use crate::core::spatial::GeoTransform;
    use crate::error::Stage;
    use crate::progress::NullSink;

    fn flat_dem(width: usize, height: usize) -> DemRaster {
        let grid = Raster::filled(width, height, 50.0);
        let gt =
            GeoTransform::from_gdal([0.0, 1.0, 0.0, height as f64, 0.0, -1.0]).unwrap();
        DemRaster::from_parts(grid, gt, "")
    }

    fn render_with(rem: &Raster, dem: &DemRaster, config: &RenderConfig) -> RenderedImage {
        let sink = NullSink;
        let progress = Progress::start(&sink, Stage::Rendering);
        render(rem, dem, config, &progress)
    }

    #[test]
    fn nodata_renders_transparent() {
        let dem = flat_dem(4, 4);
        let mut rem = Raster::filled(4, 4, 0.5);
        rem.set(2, 1, f32::NAN);

        let image = render_with(&rem, &dem, &RenderConfig::default());
        let idx = (1 * 4 + 2) * 4;
        assert_eq!(&image.rgba[idx..idx + 4], &[0, 0, 0, 0]);
        assert_eq!(image.rgba[3], 255);
    }

    #[test]
    fn zero_blend_is_pure_colormap() {
        let dem = flat_dem(4, 4);
        let rem = Raster::filled(4, 4, 1.0);

        let config = RenderConfig {
            colormap: Colormap::Viridis,
            hillshade_blend: 0.0,
            ..RenderConfig::default()
        };
        let image = render_with(&rem, &dem, &config);

        // uniform REM degenerates to the low end of the ramp
        assert_eq!(&image.rgba[0..3], &[68, 1, 84]);
    }

    #[test]
    fn full_blend_is_pure_hillshade() {
        let dem = flat_dem(4, 4);
        let rem = Raster::filled(4, 4, 1.0);

        let config = RenderConfig {
            hillshade_blend: 1.0,
            ..RenderConfig::default()
        };
        let image = render_with(&rem, &dem, &config);

        let expected = (std::f32::consts::FRAC_1_SQRT_2 * 255.0).round() as u8;
        assert_eq!(&image.rgba[0..3], &[expected, expected, expected]);
    }

    #[test]
    fn blend_mixes_shade_and_color() {
        let dem = flat_dem(4, 4);
        let rem = Raster::filled(4, 4, 1.0);

        let config = RenderConfig {
            colormap: Colormap::Viridis,
            hillshade_blend: 0.25,
            ..RenderConfig::default()
        };
        let image = render_with(&rem, &dem, &config);

        let shade = std::f32::consts::FRAC_1_SQRT_2 * 255.0;
        let expected_r = (0.25 * shade + 0.75 * 68.0).round() as u8;
        assert_eq!(image.rgba[0], expected_r);
    }
}
