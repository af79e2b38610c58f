use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Administrative levels treated as city districts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminLevel {
    Nine,
    Ten,
}

impl AdminLevel {
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim() {
            "9" => Some(AdminLevel::Nine),
            "10" => Some(AdminLevel::Ten),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            AdminLevel::Nine => 9,
            AdminLevel::Ten => 10,
        }
    }
}

/// A district relation found by the metadata query. Identity is `relation_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryRelation {
    pub relation_id: i64,
    pub name: String,
    pub admin_level: AdminLevel,
}

/// One outer way of a relation, as `(lon, lat)` nodes in way order.
#[derive(Debug, Clone, PartialEq)]
pub struct WaySegment {
    pub way_id: i64,
    pub nodes: Vec<(f64, f64)>,
}

/// The unit stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    pub osm_relation_id: i64,
    pub name: String,
    /// Canonical `MULTIPOLYGON` WKT.
    pub geometry: String,
}

/// The whole cache document: `city_code -> districts`.
pub type CityDistricts = BTreeMap<String, Vec<DistrictRecord>>;
