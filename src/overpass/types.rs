use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level Overpass JSON response (`[out:json]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// One element of the `elements` array: a relation or a way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    /// "relation" | "way" | "node"
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Node coordinates, present on ways fetched with `out geom`.
    #[serde(default)]
    pub geometry: Vec<GeoNode>,
    /// Relation members, present on relations fetched with `out geom`.
    #[serde(default)]
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoNode {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub ref_id: i64,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub geometry: Vec<GeoNode>,
}

impl Element {
    pub fn is_relation(&self) -> bool {
        self.kind == "relation"
    }

    pub fn is_way(&self) -> bool {
        self.kind == "way"
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_way_with_geometry() {
        let raw = r#"{
            "version": 0.6,
            "elements": [
                {"type": "way", "id": 7, "tags": {"boundary": "administrative"},
                 "geometry": [{"lat": 48.1, "lon": 135.0}, {"lat": 48.2, "lon": 135.1}]}
            ]
        }"#;
        let resp: OverpassResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.elements.len(), 1);
        let way = &resp.elements[0];
        assert!(way.is_way());
        assert_eq!(way.geometry[1], GeoNode { lat: 48.2, lon: 135.1 });
        assert_eq!(way.tag("boundary"), Some("administrative"));
    }

    #[test]
    fn test_parse_relation_members() {
        let raw = r#"{"elements": [
            {"type": "relation", "id": 1, "members": [
                {"type": "way", "ref": 10, "role": "outer",
                 "geometry": [{"lat": 0.0, "lon": 0.0}, {"lat": 0.0, "lon": 1.0}]},
                {"type": "node", "ref": 11, "role": "admin_centre", "lat": 0.5, "lon": 0.5}
            ]}
        ]}"#;
        let resp: OverpassResponse = serde_json::from_str(raw).unwrap();
        let rel = &resp.elements[0];
        assert!(rel.is_relation());
        assert!(rel.tags.is_empty());
        assert_eq!(rel.members.len(), 2);
        assert_eq!(rel.members[0].role, "outer");
        assert!(rel.members[1].geometry.is_empty());
    }

    #[test]
    fn test_missing_elements_defaults_empty() {
        let resp: OverpassResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.elements.is_empty());
    }
}
