pub mod heuristic;

use crate::config::KNeighbors;
use crate::core::dem::DemRaster;
use crate::core::raster::{Bilinear, NearestNeighbor};
use crate::error::RemError;
use geo::{Coord, Geometry, Intersects, LineString, MultiLineString, Rect};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct Centerline {
    pub crs: String,
    pub lines: MultiLineString<f64>,
}

impl Centerline {
    pub fn new(crs: impl Into<String>, lines: MultiLineString<f64>) -> Self {
        Self {
            crs: crs.into(),
            lines,
        }
    }

    pub fn from_geometry(crs: impl Into<String>, geometry: Geometry<f64>) -> Result<Self, RemError> {
        let lines = match geometry {
            Geometry::Line(line) => {
                MultiLineString::new(vec![LineString::from(vec![line.start, line.end])])
            }
            Geometry::LineString(line) => MultiLineString::new(vec![line]),
            Geometry::MultiLineString(lines) => lines,
            other => {
                return Err(RemError::InvalidGeometry(format!(
                    "centerline must be a line geometry, got {}",
                    geometry_name(&other)
                )))
            }
        };
        Ok(Self::new(crs, lines))
    }
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

// Supplied by the orchestration layer (OSM lookup, shapefile reader, ...);
// the core never fetches centerlines itself.
pub trait CenterlineProvider {
    fn resolve_centerline(
        &self,
        extent: Rect<f64>,
        crs: &str,
    ) -> Result<Option<Centerline>, RemError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub arc_length: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone)]
pub struct ResolvedCenterline {
    pub points: Vec<SamplePoint>,
    pub segments: Vec<Range<usize>>,
    pub sinuosity: f64,
    pub spacing: f64,
}

impl ResolvedCenterline {
    pub fn neighbor_count(&self, requested: KNeighbors) -> usize {
        let k = match requested {
            KNeighbors::Auto => heuristic::neighbor_count(self.sinuosity),
            KNeighbors::Fixed(n) => n,
        };
        k.min(self.points.len()).max(1)
    }
}

pub fn resolve(
    centerline: &Centerline,
    dem: &DemRaster,
    interpolation_points: usize,
) -> Result<ResolvedCenterline, RemError> {
    if !crs_matches(&dem.crs, &centerline.crs) {
        return Err(RemError::CrsMismatch {
            dem: dem.crs.clone(),
            centerline: centerline.crs.clone(),
        });
    }

    let extent = dem.extent().to_polygon();
    let kept: Vec<&LineString<f64>> = centerline
        .lines
        .iter()
        .filter(|line| line.coords().count() >= 2 && line.intersects(&extent))
        .collect();

    if kept.is_empty() {
        return Err(RemError::NoCenterlineInExtent);
    }

    let total_length: f64 = kept.iter().map(|line| polyline_length(line)).sum();
    if total_length <= 0.0 {
        return Err(RemError::InvalidGeometry(
            "centerline has zero length".into(),
        ));
    }

    let (cell_w, cell_h) = dem.cell_size();
    let spacing = (total_length / interpolation_points as f64).max(cell_w.min(cell_h));

    let bilinear = Bilinear;
    let nearest = NearestNeighbor;

    let mut points = Vec::new();
    let mut segments = Vec::new();
    let mut seg_lengths = Vec::new();
    let mut seg_sinuosities = Vec::new();

    for line in &kept {
        let start = points.len();

        for (x, y, arc) in densify(line, spacing) {
            let elevation = dem
                .sample_elevation(x, y, &bilinear)
                .or_else(|| dem.sample_elevation(x, y, &nearest));

            if let Some(elevation) = elevation {
                points.push(SamplePoint {
                    x,
                    y,
                    arc_length: arc,
                    elevation: elevation as f64,
                });
            }
        }

        if points.len() > start {
            segments.push(start..points.len());

            let arc = polyline_length(line);
            let coords: Vec<Coord<f64>> = line.coords().copied().collect();
            let first = coords[0];
            let last = coords[coords.len() - 1];
            let straight = ((last.x - first.x).powi(2) + (last.y - first.y).powi(2)).sqrt();

            seg_lengths.push(arc);
            seg_sinuosities.push(heuristic::segment_sinuosity(arc, straight));
        }
    }

    if points.is_empty() {
        return Err(RemError::NoCenterlineInExtent);
    }

    let weight_sum: f64 = seg_lengths.iter().sum();
    let sinuosity = seg_lengths
        .iter()
        .zip(&seg_sinuosities)
        .map(|(w, s)| w * s)
        .sum::<f64>()
        / weight_sum;

    Ok(ResolvedCenterline {
        points,
        segments,
        sinuosity,
        spacing,
    })
}

fn crs_matches(dem: &str, centerline: &str) -> bool {
    let dem = dem.trim();
    let centerline = centerline.trim();
    dem.is_empty() || centerline.is_empty() || dem == centerline
}

fn polyline_length(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|l| ((l.end.x - l.start.x).powi(2) + (l.end.y - l.start.y).powi(2)).sqrt())
        .sum()
}

// Walk the segment emitting vertices every `spacing` units of arc length,
// always closing with the terminal vertex. Emitted arc lengths are strictly
// increasing.
fn densify(line: &LineString<f64>, spacing: f64) -> Vec<(f64, f64, f64)> {
    let coords: Vec<Coord<f64>> = line.coords().copied().collect();
    let mut out = Vec::new();

    let first = coords[0];
    out.push((first.x, first.y, 0.0));

    let mut arc_at_vertex = 0.0;
    let mut next_emit = spacing;

    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        if len == 0.0 {
            continue;
        }

        while next_emit < arc_at_vertex + len {
            let t = (next_emit - arc_at_vertex) / len;
            out.push((a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t, next_emit));
            next_emit += spacing;
        }

        arc_at_vertex += len;
    }

    let last = coords[coords.len() - 1];
    let guard = spacing * 1e-6;
    if arc_at_vertex > out.last().map(|p| p.2).unwrap_or(0.0) + guard {
        out.push((last.x, last.y, arc_at_vertex));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::raster::Raster;
    use crate::core::spatial::GeoTransform;
    use approx::assert_relative_eq;
    use geo::polygon;

    fn flat_dem(width: usize, height: usize, elevation: f32) -> DemRaster {
        let grid = Raster::filled(width, height, elevation);
        let gt =
            GeoTransform::from_gdal([0.0, 1.0, 0.0, height as f64, 0.0, -1.0]).unwrap();
        DemRaster::from_parts(grid, gt, "")
    }

    // runs along pixel centers so no vertex is lost to edge sampling
    fn straight_centerline() -> Centerline {
        Centerline::new(
            "",
            MultiLineString::new(vec![LineString::from(vec![(0.5, 50.0), (99.5, 50.0)])]),
        )
    }

    #[test]
    fn densifies_to_the_requested_cap() {
        let dem = flat_dem(100, 100, 10.0);
        let resolved = resolve(&straight_centerline(), &dem, 10).unwrap();

        // 99 units at spacing 9.9: start, 9 interior emissions, terminal vertex
        assert_eq!(resolved.points.len(), 11);
        assert_relative_eq!(resolved.spacing, 9.9);
    }

    #[test]
    fn spacing_never_drops_below_cell_size() {
        let dem = flat_dem(100, 100, 10.0);
        let resolved = resolve(&straight_centerline(), &dem, 100_000).unwrap();
        assert_relative_eq!(resolved.spacing, 1.0);
        assert_eq!(resolved.points.len(), 100);
    }

    #[test]
    fn arc_length_strictly_increases_per_segment() {
        let dem = flat_dem(100, 100, 10.0);
        let lines = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 30.0), (60.0, 30.0), (60.0, 80.0)]),
            LineString::from(vec![(10.0, 90.0), (90.0, 90.0)]),
        ]);
        let resolved = resolve(&Centerline::new("", lines), &dem, 200).unwrap();

        assert_eq!(resolved.segments.len(), 2);
        for segment in &resolved.segments {
            let pts = &resolved.points[segment.clone()];
            for pair in pts.windows(2) {
                assert!(pair[1].arc_length > pair[0].arc_length);
            }
        }
    }

    #[test]
    fn attaches_dem_elevations() {
        let mut grid = Raster::filled(100, 100, 0.0);
        for row in 0..100 {
            for col in 0..100 {
                grid.set(col, row, col as f32);
            }
        }
        let gt = GeoTransform::from_gdal([0.0, 1.0, 0.0, 100.0, 0.0, -1.0]).unwrap();
        let dem = DemRaster::from_parts(grid, gt, "");

        let resolved = resolve(&straight_centerline(), &dem, 100).unwrap();
        for point in &resolved.points {
            // elevation ramps with x; bilinear sampling tracks the ramp
            assert!((point.elevation - (point.x - 0.5)).abs() <= 1.0);
        }
    }

    #[test]
    fn drops_vertices_on_nodata() {
        let mut dem = flat_dem(100, 100, 10.0);
        for col in 0..100 {
            for row in 45..55 {
                dem.grid.set(col, row, f32::NAN);
            }
        }

        // centerline runs straight through the no-data band
        let err = resolve(&straight_centerline(), &dem, 100).unwrap_err();
        assert!(matches!(err, RemError::NoCenterlineInExtent));
    }

    #[test]
    fn discards_segments_outside_the_extent() {
        let dem = flat_dem(100, 100, 10.0);
        let lines = MultiLineString::new(vec![
            LineString::from(vec![(0.0, 50.0), (100.0, 50.0)]),
            LineString::from(vec![(500.0, 500.0), (600.0, 500.0)]),
        ]);
        let resolved = resolve(&Centerline::new("", lines), &dem, 100).unwrap();
        assert_eq!(resolved.segments.len(), 1);
    }

    #[test]
    fn signals_when_nothing_is_in_extent() {
        let dem = flat_dem(100, 100, 10.0);
        let lines =
            MultiLineString::new(vec![LineString::from(vec![(500.0, 500.0), (600.0, 500.0)])]);
        let err = resolve(&Centerline::new("", lines), &dem, 100).unwrap_err();
        assert!(matches!(err, RemError::NoCenterlineInExtent));
    }

    #[test]
    fn rejects_non_line_geometry() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let err = Centerline::from_geometry("", Geometry::Polygon(poly)).unwrap_err();
        assert!(matches!(err, RemError::InvalidGeometry(_)));
    }

    #[test]
    fn rejects_crs_mismatch() {
        let dem = DemRaster {
            crs: "EPSG:32633".into(),
            ..flat_dem(100, 100, 10.0)
        };
        let mut line = straight_centerline();
        line.crs = "EPSG:4326".into();

        let err = resolve(&line, &dem, 100).unwrap_err();
        assert!(matches!(err, RemError::CrsMismatch { .. }));
    }

    #[test]
    fn straight_line_reads_as_sinuosity_one() {
        let dem = flat_dem(100, 100, 10.0);
        let resolved = resolve(&straight_centerline(), &dem, 100).unwrap();
        assert_relative_eq!(resolved.sinuosity, 1.0);
        assert_eq!(resolved.neighbor_count(KNeighbors::Auto), 40);
        assert_eq!(resolved.neighbor_count(KNeighbors::Fixed(5)), 5);
        // fixed k is capped by the available points
        assert_eq!(resolved.neighbor_count(KNeighbors::Fixed(5000)), resolved.points.len());
    }
}
