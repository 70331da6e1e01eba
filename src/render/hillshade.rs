use crate::core::raster::Raster;

const LIGHT_AZIMUTH_DEG: f64 = 315.0;
const LIGHT_ALTITUDE_DEG: f64 = 45.0;

// Horn 3x3 shaded relief. Elevation is pre-multiplied by `z_factor`; border
// and no-data neighbors fall back to the center value so every valid pixel
// gets a shade.
pub fn hillshade(grid: &Raster, cell_w: f64, cell_h: f64, z_factor: f64) -> Vec<f32> {
    let w = grid.width();
    let h = grid.height();
    let mut shade = vec![f32::NAN; w * h];

    if w == 0 || h == 0 {
        return shade;
    }

    let zenith = (90.0 - LIGHT_ALTITUDE_DEG).to_radians();
    let azimuth = (360.0 - LIGHT_AZIMUTH_DEG + 90.0).to_radians();
    let (cos_zenith, sin_zenith) = (zenith.cos(), zenith.sin());

    for y in 0..h {
        for x in 0..w {
            let center = grid.get(x, y);
            if center.is_nan() {
                continue;
            }

            let get = |dx: isize, dy: isize| -> f64 {
                let nx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                let ny = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                let v = grid.get(nx, ny);
                if v.is_nan() {
                    center as f64
                } else {
                    v as f64
                }
            };

            let z1 = get(-1, -1);
            let z2 = get(0, -1);
            let z3 = get(1, -1);
            let z4 = get(-1, 0);
            let z6 = get(1, 0);
            let z7 = get(-1, 1);
            let z8 = get(0, 1);
            let z9 = get(1, 1);

            let dz_dx = z_factor * ((z3 + 2.0 * z6 + z9) - (z1 + 2.0 * z4 + z7)) / (8.0 * cell_w);
            let dz_dy = z_factor * ((z7 + 2.0 * z8 + z9) - (z1 + 2.0 * z2 + z3)) / (8.0 * cell_h);

            let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan();
            let aspect = dz_dy.atan2(-dz_dx);

            let value = cos_zenith * slope.cos()
                + sin_zenith * slope.sin() * (azimuth - aspect).cos();

            shade[y * w + x] = value.clamp(0.0, 1.0) as f32;
        }
    }

    shade
}
