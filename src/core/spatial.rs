use crate::error::RemError;
use geo::{Coord, Rect};

#[derive(Debug, Clone, Copy)]
pub struct GeoTransform {
    forward_matrix: [f64; 6],
    inverse_matrix: [f64; 6],
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Result<Self, RemError> {
        let determinant = gt[1] * gt[5] - gt[2] * gt[4];

        if determinant.abs() < 1e-10 {
            return Err(RemError::InvalidGeometry(
                "geotransform is singular".into(),
            ));
        }

        let inv_det = 1.0 / determinant;

        let inverse_matrix = [
            (gt[2] * gt[3] - gt[5] * gt[0]) * inv_det,
            gt[5] * inv_det,
            -gt[2] * inv_det,
            (gt[4] * gt[0] - gt[1] * gt[3]) * inv_det,
            -gt[4] * inv_det,
            gt[1] * inv_det,
        ];

        Ok(Self {
            forward_matrix: gt,
            inverse_matrix,
        })
    }

    pub fn as_gdal(&self) -> [f64; 6] {
        self.forward_matrix
    }

    #[inline]
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> Coord<f64> {
        let inv = self.inverse_matrix;
        let u = inv[0] + x * inv[1] + y * inv[2];
        let v = inv[3] + x * inv[4] + y * inv[5];
        Coord { x: u, y: v }
    }

    #[inline]
    pub fn pixel_to_geo(&self, x: f64, y: f64) -> Coord<f64> {
        let fwd = self.forward_matrix;
        let lx = fwd[0] + x * fwd[1] + y * fwd[2];
        let ly = fwd[3] + x * fwd[4] + y * fwd[5];
        Coord { x: lx, y: ly }
    }

    pub fn cell_size(&self) -> (f64, f64) {
        (self.forward_matrix[1].abs(), self.forward_matrix[5].abs())
    }

    pub fn extent(&self, width: usize, height: usize) -> Rect<f64> {
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(width as f64, 0.0),
            self.pixel_to_geo(0.0, height as f64),
            self.pixel_to_geo(width as f64, height as f64),
        ];

        let mut min = corners[0];
        let mut max = corners[0];
        for c in &corners[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }

        Rect::new(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn round_trips_pixel_and_geo() {
        let gt = GeoTransform::from_gdal([500_000.0, 10.0, 0.0, 4_650_000.0, 0.0, -10.0]).unwrap();

        let geo = gt.pixel_to_geo(12.5, 7.25);
        let px = gt.geo_to_pixel(geo.x, geo.y);

        assert_relative_eq!(px.x, 12.5, epsilon = 1e-9);
        assert_relative_eq!(px.y, 7.25, epsilon = 1e-9);
    }

    #[test]
    fn rejects_singular_transform() {
        assert!(GeoTransform::from_gdal([0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn extent_covers_full_grid() {
        let gt = GeoTransform::from_gdal([100.0, 1.0, 0.0, 300.0, 0.0, -1.0]).unwrap();
        let rect = gt.extent(50, 20);

        assert_relative_eq!(rect.min().x, 100.0);
        assert_relative_eq!(rect.max().x, 150.0);
        assert_relative_eq!(rect.min().y, 280.0);
        assert_relative_eq!(rect.max().y, 300.0);
    }

    #[test]
    fn cell_size_is_absolute() {
        let gt = GeoTransform::from_gdal([0.0, 2.0, 0.0, 0.0, 0.0, -3.0]).unwrap();
        assert_eq!(gt.cell_size(), (2.0, 3.0));
    }
}
