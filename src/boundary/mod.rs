//! District metadata extraction and boundary geometry.
//!
//! Ways come in from Overpass as loose fragments; [`reconstruct`] turns them
//! into polygons and [`normalize`] into the canonical `MULTIPOLYGON` WKT that
//! the cache stores.

pub mod metadata;
pub mod merge;
pub mod normalize;
pub mod polygonize;
pub mod reconstruct;
pub mod types;

