use tracing::{debug, info};

use super::types::{AdminLevel, BoundaryRelation, WaySegment};
use crate::overpass::types::{Element, GeoNode, OverpassResponse};

/// Localized name tag consulted after `name`.
pub const DEFAULT_LOCALIZED_NAME_TAG: &str = "name:ru";

/// District relations (admin level 9/10) from a metadata response.
#[cfg(test)]
pub fn extract_districts(response: &OverpassResponse) -> Vec<BoundaryRelation> {
    extract_districts_with(response, DEFAULT_LOCALIZED_NAME_TAG)
}

/// District relations (admin level 9/10) from a metadata response, naming
/// each from `name` and then `localized_name_tag`.
///
/// Output follows input order. Names are not deduplicated: two relations
/// with the same name are two districts.
pub fn extract_districts_with(
    response: &OverpassResponse,
    localized_name_tag: &str,
) -> Vec<BoundaryRelation> {
    info!(elements = response.elements.len(), "extracting districts");

    let districts: Vec<BoundaryRelation> = response
        .elements
        .iter()
        .filter(|e| e.is_relation())
        .filter(|e| e.tag("boundary") == Some("administrative"))
        .filter_map(|e| {
            let admin_level = e.tag("admin_level").and_then(AdminLevel::from_tag)?;
            let Some(name) = display_name(e, localized_name_tag) else {
                debug!(relation_id = e.id, tags = ?e.tags, "relation without name, skipping");
                return None;
            };
            Some(BoundaryRelation {
                relation_id: e.id,
                name: name.to_string(),
                admin_level,
            })
        })
        .collect();

    info!(districts = districts.len(), "districts extracted");
    districts
}

/// First non-empty of `name`, the localized name, `official_name`, `alt_name`.
pub fn display_name<'a>(element: &'a Element, localized_name_tag: &str) -> Option<&'a str> {
    ["name", localized_name_tag, "official_name", "alt_name"]
        .into_iter()
        .filter_map(|key| element.tag(key))
        .map(str::trim)
        .find(|name| !name.is_empty())
}

/// Way elements of a geometry response as segments. Non-way elements are dropped.
pub fn ways_from_response(response: &OverpassResponse) -> Vec<WaySegment> {
    response
        .elements
        .iter()
        .filter(|e| e.is_way())
        .map(|e| WaySegment {
            way_id: e.id,
            nodes: lon_lat(&e.geometry),
        })
        .collect()
}

/// `outer` way members of a relation fetched with `out geom`.
pub fn outer_members(relation: &Element) -> Vec<WaySegment> {
    relation
        .members
        .iter()
        .filter(|m| m.kind == "way" && m.role == "outer")
        .map(|m| WaySegment {
            way_id: m.ref_id,
            nodes: lon_lat(&m.geometry),
        })
        .collect()
}

fn lon_lat(nodes: &[GeoNode]) -> Vec<(f64, f64)> {
    nodes.iter().map(|n| (n.lon, n.lat)).collect()
}
