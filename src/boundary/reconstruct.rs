use std::fmt;

use geo::{Euclidean, Geometry, Length, LineString, Polygon, Validation};
use tracing::{debug, info, warn};

use super::merge::line_merge;
use super::normalize::{union_all, zero_buffer};
use super::polygonize::polygonize;
use super::types::WaySegment;

/// Result of one reconstruction stage.
#[derive(Debug)]
pub enum Stage<T> {
    Done(T),
    /// This stage produced nothing; the next fallback should run.
    NeedsFallback,
    Fail(Failure),
}

/// Why a relation yielded no geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NoUsableLines,
    NotClosable,
    NoValidPolygons,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::NoUsableLines => write!(f, "no usable line geometry"),
            Failure::NotClosable => write!(f, "longest merged line is not closed"),
            Failure::NoValidPolygons => write!(f, "no valid polygons after repair"),
        }
    }
}

/// Rebuild a relation's outline from its outer ways.
///
/// Returns a `Polygon` or `MultiPolygon`, or `None` (logged) when the ways
/// cannot form any closed shape.
pub fn reconstruct(ways: &[WaySegment]) -> Option<Geometry<f64>> {
    match try_reconstruct(ways) {
        Ok(geometry) => Some(geometry),
        Err(reason) => {
            warn!(ways = ways.len(), %reason, "boundary reconstruction failed");
            None
        }
    }
}

/// Stage order: linearize, merge, assemble (or longest-ring fallback),
/// repair, combine.
pub fn try_reconstruct(ways: &[WaySegment]) -> Result<Geometry<f64>, Failure> {
    let lines = match linearize(ways) {
        Stage::Done(lines) => lines,
        Stage::NeedsFallback => return Err(Failure::NoUsableLines),
        Stage::Fail(reason) => return Err(reason),
    };
    debug!(lines = lines.len(), ways = ways.len(), "linearized ways");

    let merged = line_merge(&lines);
    debug!(merged = merged.len(), "merged lines");

    let polygons = match assemble(&merged) {
        Stage::Done(polygons) => polygons,
        Stage::NeedsFallback => {
            warn!("polygon assembly produced nothing, trying longest line");
            match longest_ring(&merged) {
                Stage::Done(polygons) => polygons,
                Stage::NeedsFallback => return Err(Failure::NotClosable),
                Stage::Fail(reason) => return Err(reason),
            }
        }
        Stage::Fail(reason) => return Err(reason),
    };

    let polygons = match repair_all(polygons) {
        Stage::Done(polygons) => polygons,
        Stage::NeedsFallback => return Err(Failure::NoValidPolygons),
        Stage::Fail(reason) => return Err(reason),
    };

    combine(polygons, ways.len())
}

/// One open line per way with at least two nodes.
fn linearize(ways: &[WaySegment]) -> Stage<Vec<LineString<f64>>> {
    let lines: Vec<LineString<f64>> = ways
        .iter()
        .filter(|w| w.nodes.len() >= 2)
        .map(|w| LineString::from(w.nodes.clone()))
        .collect();
    if lines.is_empty() {
        Stage::Fail(Failure::NoUsableLines)
    } else {
        Stage::Done(lines)
    }
}

fn assemble(merged: &[LineString<f64>]) -> Stage<Vec<Polygon<f64>>> {
    let polygons = polygonize(merged);
    if polygons.is_empty() {
        Stage::NeedsFallback
    } else {
        debug!(polygons = polygons.len(), "polygonized");
        Stage::Done(polygons)
    }
}

/// Force-close the longest merged line (by path length) if its ends meet.
/// Ties keep the earliest line.
fn longest_ring(merged: &[LineString<f64>]) -> Stage<Vec<Polygon<f64>>> {
    let mut longest: Option<(&LineString<f64>, f64)> = None;
    for line in merged {
        let length = Euclidean.length(line);
        if longest.map_or(true, |(_, best)| length > best) {
            longest = Some((line, length));
        }
    }
    let Some((line, _)) = longest else {
        return Stage::Fail(Failure::NoUsableLines);
    };
    if !line.is_closed() {
        return Stage::Fail(Failure::NotClosable);
    }

    info!(points = line.0.len(), "polygon built from longest line (fallback)");
    Stage::Done(vec![Polygon::new(line.clone(), vec![])])
}

/// Zero-buffer every invalid polygon; drop what stays empty or invalid.
fn repair_all(polygons: Vec<Polygon<f64>>) -> Stage<Vec<Polygon<f64>>> {
    let mut valid = Vec::with_capacity(polygons.len());
    for polygon in polygons {
        if polygon.is_valid() {
            valid.push(polygon);
            continue;
        }
        debug!("polygon invalid, applying zero-buffer");
        let repaired: Vec<Polygon<f64>> = zero_buffer(&polygon)
            .0
            .into_iter()
            .filter(|p| p.is_valid())
            .collect();
        if repaired.is_empty() {
            warn!("polygon still invalid or empty after repair, dropping");
        }
        valid.extend(repaired);
    }

    if valid.is_empty() {
        Stage::Fail(Failure::NoValidPolygons)
    } else {
        Stage::Done(valid)
    }
}

fn combine(mut polygons: Vec<Polygon<f64>>, way_count: usize) -> Result<Geometry<f64>, Failure> {
    if polygons.len() == 1 {
        info!(ways = way_count, "built 1 polygon");
        return Ok(Geometry::Polygon(polygons.remove(0)));
    }

    info!(polygons = polygons.len(), ways = way_count, "built polygons, merging");
    let mut union = union_all(polygons);
    match union.0.len() {
        0 => Err(Failure::NoValidPolygons),
        1 => Ok(Geometry::Polygon(union.0.remove(0))),
        parts => {
            debug!(parts, "union kept a MultiPolygon");
            Ok(Geometry::MultiPolygon(union))
        }
    }
}
