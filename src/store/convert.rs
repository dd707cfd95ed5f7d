use geo::{Coord, LineString, MultiPolygon, Point, Polygon, Winding};
use shapefile::{self as shp, record::{polygon::GenericPolygon, traits::HasXY}};

/// Convert a shapefile polygon (flat ring list) to a MultiPolygon.
/// Each outer ring starts a new part; inner rings attach to the most recent outer ring.
/// Z and M are dropped.
pub(super) fn polygon_from_shp<P: HasXY>(shape: &GenericPolygon<P>) -> MultiPolygon<f64> {
    #[inline] fn line<P: HasXY>(points: &[P]) -> LineString<f64> {
        points.iter().map(|pt| Coord { x: pt.x(), y: pt.y() }).collect()
    }

    let mut parts: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in shape.rings() {
        match ring {
            shp::PolygonRing::Outer(points) => {
                if let Some(previous) = exterior.replace(line(points)) {
                    parts.push(Polygon::new(previous, std::mem::take(&mut holes)));
                }
            }
            // A hole with no preceding shell is kept as a shell of its own.
            shp::PolygonRing::Inner(points) if exterior.is_none() => exterior = Some(line(points)),
            shp::PolygonRing::Inner(points) => holes.push(line(points)),
        }
    }
    if let Some(last) = exterior {
        parts.push(Polygon::new(last, holes));
    }

    MultiPolygon(parts)
}

/// Convert a MultiPolygon to a shapefile polygon: shells clockwise, holes counter-clockwise.
pub(super) fn polygon_to_shp(polygon: &MultiPolygon<f64>) -> shp::Polygon {
    fn ring(line: &LineString<f64>, clockwise: bool) -> Vec<shp::Point> {
        let mut line = line.clone();
        if clockwise { line.make_cw_winding() } else { line.make_ccw_winding() }
        line.coords().map(|c| shp::Point { x: c.x, y: c.y }).collect()
    }

    let mut rings = Vec::new();
    for part in &polygon.0 {
        rings.push(shp::PolygonRing::Outer(ring(part.exterior(), true)));
        for hole in part.interiors() {
            rings.push(shp::PolygonRing::Inner(ring(hole, false)));
        }
    }
    shp::Polygon::with_rings(rings)
}

#[inline]
pub(super) fn point_from_shp<P: HasXY>(point: &P) -> Point<f64> {
    Point::new(point.x(), point.y())
}

#[inline]
pub(super) fn point_to_shp(point: &Point<f64>) -> shp::Point {
    shp::Point { x: point.x(), y: point.y() }
}
