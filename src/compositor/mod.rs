use crate::core::raster::{percentile_of_sorted, Raster};
use crate::utils::float::FloatEx;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompositeStats {
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub valid_pixels: u64,
    pub gap_pixels: u64,
}

// REM = DEM - water surface, per pixel. No-data in either input stays
// no-data. `clip_percentile` (e.g. 99.0) clips the finite REM values to
// [P(100-p), P(p)] to tame extrapolation spikes near interpolation edges.
pub fn composite(
    dem: &Raster,
    surface: &Raster,
    clip_percentile: Option<f64>,
) -> (Raster, CompositeStats) {
    assert_eq!(dem.width(), surface.width());
    assert_eq!(dem.height(), surface.height());

    let mut gap_pixels = 0u64;
    let data: Vec<f32> = dem
        .data()
        .iter()
        .zip(surface.data())
        .map(|(&d, &s)| {
            if d.is_not_nan() && s.is_nan() {
                gap_pixels += 1;
            }
            d - s
        })
        .collect();

    let mut rem = Raster::from_data(dem.width(), dem.height(), data);

    if let Some(p) = clip_percentile {
        clip_to_percentiles(&mut rem, p);
    }

    let (min, max) = match rem.min_max() {
        Some((min, max)) => (Some(min), Some(max)),
        None => (None, None),
    };

    let stats = CompositeStats {
        min,
        max,
        valid_pixels: rem.valid_count(),
        gap_pixels,
    };

    (rem, stats)
}

fn clip_to_percentiles(rem: &mut Raster, p: f64) {
    let mut sorted: Vec<f32> = rem
        .data()
        .iter()
        .copied()
        .filter(|v| v.is_not_nan())
        .collect();
    if sorted.is_empty() {
        return;
    }
    sorted.sort_by(f32::total_cmp);

    let hi = percentile_of_sorted(&sorted, p);
    let lo = percentile_of_sorted(&sorted, 100.0 - p);

    for v in rem.data_mut() {
        if v.is_not_nan() {
            *v = v.clamp(lo, hi);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtracts_surface_from_dem() {
        let dem = Raster::from_data(2, 2, vec![10.0, 12.0, 14.0, 16.0]);
        let surface = Raster::from_data(2, 2, vec![10.0, 10.0, 10.0, 10.0]);

        let (rem, stats) = composite(&dem, &surface, None);
        assert_eq!(rem.data(), &[0.0, 2.0, 4.0, 6.0]);
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(6.0));
        assert_eq!(stats.valid_pixels, 4);
        assert_eq!(stats.gap_pixels, 0);
    }

    #[test]
    fn nodata_propagates_from_both_inputs() {
        let dem = Raster::from_data(2, 2, vec![f32::NAN, 12.0, 14.0, 16.0]);
        let surface = Raster::from_data(2, 2, vec![10.0, f32::NAN, 10.0, 10.0]);

        let (rem, stats) = composite(&dem, &surface, None);
        assert!(rem.data()[0].is_nan());
        assert!(rem.data()[1].is_nan());
        assert_eq!(rem.data()[2], 4.0);
        // only the surface gap counts as an interpolation gap
        assert_eq!(stats.gap_pixels, 1);
        assert_eq!(stats.valid_pixels, 2);
    }

    #[test]
    fn percentile_clip_tames_outliers() {
        let mut values: Vec<f32> = (0..100).map(|i| i as f32 * 0.01).collect();
        values[99] = 1000.0;
        let dem = Raster::from_data(10, 10, values);
        let surface = Raster::filled(10, 10, 0.0);

        let (rem, stats) = composite(&dem, &surface, Some(98.0));
        let max = stats.max.unwrap();
        assert!(max < 10.0, "outlier survived the clip: {max}");
        assert!(rem.data().iter().all(|v| *v <= max));
    }

    #[test]
    fn all_nodata_yields_empty_stats() {
        let dem = Raster::filled(3, 3, f32::NAN);
        let surface = Raster::filled(3, 3, 0.0);
        let (_, stats) = composite(&dem, &surface, Some(99.0));
        assert_eq!(stats.min, None);
        assert_eq!(stats.valid_pixels, 0);
        assert_eq!(stats.gap_pixels, 0);
    }
}
