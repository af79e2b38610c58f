use anyhow::Result;
use tracing::info;

use crate::pipeline::{ingest_city, RecordSource};
use crate::state::AppState;

pub async fn ingest(state: &AppState, city_code: &str, city_name: &str) -> Result<()> {
    info!(city_code, city_name, "Ingestion started");

    let report = ingest_city(
        state.overpass.as_ref(),
        &state.cache,
        &state.pipeline,
        city_code,
        city_name,
    )
    .await?;

    match (report.source, report.records.is_empty()) {
        (_, true) => println!(
            "No boundaries could be built for {} ({} relation(s) found); '{}' is not cached",
            city_name, report.found, report.city_code
        ),
        (RecordSource::Districts, false) => println!(
            "Cached {} of {} district(s) for {} under '{}'",
            report.cached(),
            report.found,
            city_name,
            report.city_code
        ),
        (RecordSource::CityBoundary, false) => println!(
            "No districts found for {}; cached the city boundary under '{}'",
            city_name, report.city_code
        ),
    }
    for record in &report.records {
        println!("  {:>12}  {}", record.osm_relation_id, record.name);
    }
    Ok(())
}
