use anyhow::{anyhow, Result};
use geo::{Area, BooleanOps, Geometry, MultiPolygon, Polygon, Validation};
use tracing::{debug, error};
use wkt::{ToWkt, TryFromWkt};

/// Zero-buffer repair: the union of a polygon with itself. Self-intersections
/// are resolved and degenerate slivers collapse away.
pub fn zero_buffer(polygon: &Polygon<f64>) -> MultiPolygon<f64> {
    let repaired = polygon.union(polygon);
    MultiPolygon::new(
        repaired
            .0
            .into_iter()
            .filter(|p| p.unsigned_area() > 0.0)
            .collect(),
    )
}

/// Union of all polygons, pairwise so overlapping inputs merge.
pub fn union_all(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    let mut iter = polygons.into_iter();
    let Some(first) = iter.next() else {
        return MultiPolygon::new(vec![]);
    };
    iter.fold(MultiPolygon::new(vec![first]), |acc, next| {
        acc.union(&MultiPolygon::new(vec![next]))
    })
}

fn repair(geometry: Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Polygon(p) => Geometry::MultiPolygon(zero_buffer(&p)),
        Geometry::MultiPolygon(mp) => {
            let parts: Vec<Polygon<f64>> = mp.0.iter().flat_map(|p| zero_buffer(p).0).collect();
            Geometry::MultiPolygon(union_all(parts))
        }
        other => other,
    }
}

pub(crate) fn kind_name(geometry: &Geometry<f64>) -> &'static str {
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

/// Canonicalize to `MULTIPOLYGON` WKT.
///
/// Invalid shapes get one zero-buffer repair. Anything that is not areal
/// afterwards is a data-quality problem: logged, and `None` returned.
pub fn normalize(geometry: Geometry<f64>) -> Option<String> {
    normalize_multi(geometry).map(|mp| mp.wkt_string())
}

/// [`normalize`] without the final serialization.
pub fn normalize_multi(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let geometry = if geometry.is_valid() {
        geometry
    } else {
        debug!(kind = kind_name(&geometry), "geometry invalid, applying zero-buffer");
        repair(geometry)
    };

    let multi = match geometry {
        Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        Geometry::MultiPolygon(mp) => mp,
        other => {
            error!(kind = kind_name(&other), "geometry is not Polygon/MultiPolygon");
            return None;
        }
    };

    if multi.0.is_empty() {
        error!("geometry collapsed to an empty MultiPolygon");
        return None;
    }
    Some(multi)
}

/// Parse canonical WKT back into a multipolygon.
pub fn parse_multipolygon(wkt: &str) -> Result<MultiPolygon<f64>> {
    MultiPolygon::<f64>::try_from_wkt_str(wkt)
        .map_err(|e| anyhow!("invalid MULTIPOLYGON WKT: {}", e))
}
