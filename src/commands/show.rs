use anyhow::{Context, Result};
use geo::Area;
use tracing::warn;

use crate::boundary::normalize::parse_multipolygon;
use crate::boundary::types::DistrictRecord;
use crate::state::AppState;

pub async fn show(state: &AppState, city_code: Option<&str>) -> Result<()> {
    let document = state
        .cache
        .get_document()
        .await
        .context("Failed to read cache")?
        .unwrap_or_default();

    let Some(code) = city_code else {
        if document.is_empty() {
            println!("Cache is empty.");
        }
        for (code, districts) in &document {
            println!("{:<16} {} district(s)", code, districts.len());
        }
        return Ok(());
    };

    let Some(districts) = document.get(code) else {
        println!("'{}' is not cached.", code);
        return Ok(());
    };
    for record in districts {
        println!("{}", describe(record));
    }
    Ok(())
}

/// One line per district: id, name, polygon count and planar area in degrees².
fn describe(record: &DistrictRecord) -> String {
    match parse_multipolygon(&record.geometry) {
        Ok(mp) => format!(
            "{:>12}  {:<40} polygons={} area={:.6}",
            record.osm_relation_id,
            record.name,
            mp.0.len(),
            mp.unsigned_area()
        ),
        Err(e) => {
            warn!(relation_id = record.osm_relation_id, error = %e, "cached geometry unreadable");
            format!(
                "{:>12}  {:<40} geometry unreadable",
                record.osm_relation_id, record.name
            )
        }
    }
}
