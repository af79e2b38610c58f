use anyhow::{Context, Result};
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::boundary::metadata::{display_name, extract_districts_with, outer_members, ways_from_response};
use crate::boundary::normalize::normalize;
use crate::boundary::reconstruct::reconstruct;
use crate::boundary::types::{BoundaryRelation, DistrictRecord, WaySegment};
use crate::cache::DistrictCache;
use crate::overpass::queries::{city_area_query, city_boundary_query, districts_geometry_query};
use crate::overpass::QueryExecutor;
use crate::state::PipelineConfig;

/// Where a city's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Districts,
    /// No districts found; the whole city outline stands in.
    CityBoundary,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub city_code: String,
    pub source: RecordSource,
    /// Relations the metadata query returned.
    pub found: usize,
    pub records: Vec<DistrictRecord>,
}

impl IngestReport {
    pub fn cached(&self) -> usize {
        self.records.len()
    }
}

/// Fetch, reconstruct and cache one city's districts.
///
/// Client errors abort before anything is written. A city that yields no
/// records has its cached entry removed.
pub async fn ingest_city<E>(
    executor: &E,
    cache: &DistrictCache,
    config: &PipelineConfig,
    city_code: &str,
    city_name: &str,
) -> Result<IngestReport>
where
    E: QueryExecutor + ?Sized,
{
    info!(city_code, city_name, "ingesting city");
    let (source, found, records) = build_records(executor, config, city_name).await?;

    cache
        .put_city(city_code, records.clone())
        .await
        .with_context(|| format!("Failed to cache districts for {}", city_code))?;

    let report = IngestReport {
        city_code: city_code.to_string(),
        source,
        found,
        records,
    };
    info!(
        city_code,
        found = report.found,
        cached = report.cached(),
        source = ?report.source,
        "city ingested"
    );
    Ok(report)
}

async fn build_records<E>(
    executor: &E,
    config: &PipelineConfig,
    city_name: &str,
) -> Result<(RecordSource, usize, Vec<DistrictRecord>)>
where
    E: QueryExecutor + ?Sized,
{
    let metadata = executor
        .execute(&city_area_query(city_name))
        .await
        .with_context(|| format!("District metadata query failed for {}", city_name))?;
    let districts = extract_districts_with(&metadata, &config.localized_name_tag);

    if districts.is_empty() {
        warn!(city_name, "no districts found, falling back to city boundary");
        let records = city_boundary_records(executor, config, city_name).await?;
        let found = records.len();
        return Ok((RecordSource::CityBoundary, found, records));
    }

    let found = districts.len();
    let records = district_records(executor, config, districts).await?;
    Ok((RecordSource::Districts, found, records))
}

/// One geometry query per relation, `config.concurrency` in flight.
/// Output keeps extraction order; unreconstructable districts are skipped.
pub async fn district_records<E>(
    executor: &E,
    config: &PipelineConfig,
    districts: Vec<BoundaryRelation>,
) -> Result<Vec<DistrictRecord>>
where
    E: QueryExecutor + ?Sized,
{
    let mut built: Vec<(usize, Option<DistrictRecord>)> = stream::iter(districts.into_iter().enumerate())
        .map(|(position, relation)| async move {
            let response = executor
                .execute(&districts_geometry_query(&[relation.relation_id]))
                .await
                .with_context(|| {
                    format!("Geometry query failed for relation {}", relation.relation_id)
                })?;
            let ways = ways_from_response(&response);
            debug!(
                relation_id = relation.relation_id,
                admin_level = relation.admin_level.as_u8(),
                ways = ways.len(),
                "outer ways fetched"
            );

            let record = geometry_wkt(ways).await?.map(|geometry| DistrictRecord {
                osm_relation_id: relation.relation_id,
                name: relation.name.clone(),
                geometry,
            });
            if record.is_none() {
                warn!(
                    relation_id = relation.relation_id,
                    name = %relation.name,
                    "district skipped: no usable geometry"
                );
            }
            Ok::<_, anyhow::Error>((position, record))
        })
        .buffer_unordered(config.concurrency.max(1))
        .try_collect()
        .await?;

    built.sort_by_key(|(position, _)| *position);
    Ok(built.into_iter().filter_map(|(_, record)| record).collect())
}

/// A single record covering the whole city, from the first boundary
/// relation whose outer members carry geometry.
pub async fn city_boundary_records<E>(
    executor: &E,
    config: &PipelineConfig,
    city_name: &str,
) -> Result<Vec<DistrictRecord>>
where
    E: QueryExecutor + ?Sized,
{
    let response = executor
        .execute(&city_boundary_query(city_name))
        .await
        .with_context(|| format!("City boundary query failed for {}", city_name))?;

    let candidate = response
        .elements
        .iter()
        .filter(|e| e.is_relation())
        .map(|e| (e, outer_members(e)))
        .find(|(_, ways)| ways.iter().any(|w| w.nodes.len() >= 2));
    let Some((relation, ways)) = candidate else {
        warn!(city_name, "no city boundary relation with outer geometry");
        return Ok(vec![]);
    };

    let name = display_name(relation, &config.localized_name_tag)
        .unwrap_or(city_name)
        .to_string();
    let relation_id = relation.id;
    match geometry_wkt(ways).await? {
        Some(geometry) => {
            info!(relation_id, name = %name, "city boundary used as single district");
            Ok(vec![DistrictRecord {
                osm_relation_id: relation_id,
                name,
                geometry,
            }])
        }
        None => {
            warn!(relation_id, city_name, "city boundary could not be reconstructed");
            Ok(vec![])
        }
    }
}

/// Reconstruction and normalization are CPU-bound; keep them off the reactor.
async fn geometry_wkt(ways: Vec<WaySegment>) -> Result<Option<String>> {
    tokio::task::spawn_blocking(move || reconstruct(&ways).and_then(normalize))
        .await
        .context("Reconstruction task failed")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::boundary::normalize::parse_multipolygon;
    use crate::cache::config::CacheConfig;
    use crate::overpass::error::{OverpassError, OverpassResult};
    use crate::overpass::types::OverpassResponse;

    /// Answers queries by substring match; unmatched queries return no elements.
    struct FakeOverpass {
        routes: Vec<(String, Result<String, u16>)>,
        delays: HashMap<String, u64>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeOverpass {
        fn new() -> Self {
            Self {
                routes: Vec::new(),
                delays: HashMap::new(),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn route(mut self, needle: &str, body: &str) -> Self {
            self.routes.push((needle.to_string(), Ok(body.to_string())));
            self
        }

        fn reject(mut self, needle: &str, status: u16) -> Self {
            self.routes.push((needle.to_string(), Err(status)));
            self
        }

        fn delay(mut self, needle: &str, ms: u64) -> Self {
            self.delays.insert(needle.to_string(), ms);
            self
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeOverpass {
        async fn execute(&self, query: &str) -> OverpassResult<OverpassResponse> {
            self.seen.lock().unwrap().push(query.to_string());
            if let Some((_, ms)) = self.delays.iter().find(|(needle, _)| query.contains(needle.as_str())) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            match self.routes.iter().find(|(needle, _)| query.contains(needle.as_str())) {
                Some((_, Ok(body))) => Ok(serde_json::from_str(body).unwrap()),
                Some((_, Err(status))) => Err(OverpassError::Rejected {
                    status: *status,
                    body: "rejected".to_string(),
                }),
                None => Ok(OverpassResponse::default()),
            }
        }
    }

    fn metadata(relations: &[(i64, &str)]) -> String {
        let elements: Vec<String> = relations
            .iter()
            .map(|(id, name)| {
                format!(
                    r#"{{"type": "relation", "id": {}, "tags": {{"boundary": "administrative", "admin_level": "9", "name": "{}"}}}}"#,
                    id, name
                )
            })
            .collect();
        format!(r#"{{"elements": [{}]}}"#, elements.join(","))
    }

    /// Outer ways of an axis-aligned square split in two halves.
    fn square_ways(x: f64, size: f64) -> String {
        format!(
            r#"{{"elements": [
                {{"type": "way", "id": 1, "geometry": [{{"lat": 0, "lon": {x0}}}, {{"lat": 0, "lon": {x1}}}, {{"lat": {s}, "lon": {x1}}}]}},
                {{"type": "way", "id": 2, "geometry": [{{"lat": {s}, "lon": {x1}}}, {{"lat": {s}, "lon": {x0}}}, {{"lat": 0, "lon": {x0}}}]}}
            ]}}"#,
            x0 = x,
            x1 = x + size,
            s = size
        )
    }

    const OPEN_WAY: &str = r#"{"elements": [
        {"type": "way", "id": 5, "geometry": [{"lat": 0, "lon": 0}, {"lat": 0, "lon": 1}, {"lat": 1, "lon": 1}]}
    ]}"#;

    async fn memory_cache() -> DistrictCache {
        let cache = DistrictCache::new(CacheConfig::memory());
        cache.init().await.unwrap();
        cache
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[tokio::test]
    async fn test_output_follows_extraction_order() {
        // The first district answers last.
        let overpass = FakeOverpass::new()
            .route("area[", &metadata(&[(101, "First"), (102, "Second"), (103, "Third")]))
            .route("id:101", &square_ways(0.0, 1.0))
            .route("id:102", &square_ways(5.0, 2.0))
            .route("id:103", &square_ways(10.0, 3.0))
            .delay("id:101", 50);
        let cache = memory_cache().await;

        let report = ingest_city(&overpass, &cache, &config(), "khv", "Хабаровск")
            .await
            .unwrap();
        assert_eq!(report.source, RecordSource::Districts);
        assert_eq!(report.found, 3);

        let ids: Vec<i64> = report.records.iter().map(|r| r.osm_relation_id).collect();
        assert_eq!(ids, vec![101, 102, 103]);

        let document = cache.get_document().await.unwrap().unwrap();
        assert_eq!(document["khv"], report.records);
        let second = parse_multipolygon(&document["khv"][1].geometry).unwrap();
        use geo::Area;
        assert!((second.unsigned_area() - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unreconstructable_district_is_skipped() {
        let overpass = FakeOverpass::new()
            .route("area[", &metadata(&[(1, "Good"), (2, "Open")]))
            .route("id:1)", &square_ways(0.0, 1.0))
            .route("id:2)", OPEN_WAY);
        let cache = memory_cache().await;

        let report = ingest_city(&overpass, &cache, &config(), "c", "City").await.unwrap();
        assert_eq!(report.found, 2);
        assert_eq!(report.cached(), 1);
        assert_eq!(report.records[0].name, "Good");
    }

    #[tokio::test]
    async fn test_city_without_districts_or_boundary_is_absent() {
        let overpass = FakeOverpass::new()
            .route("area[", &metadata(&[(1, "Open")]))
            .route("id:1)", OPEN_WAY);
        let cache = memory_cache().await;
        cache.put_city("other", vec![]).await.unwrap();
        cache
            .put_city(
                "c",
                vec![DistrictRecord {
                    osm_relation_id: 9,
                    name: "Stale".to_string(),
                    geometry: "MULTIPOLYGON(((0 0,1 0,1 1,0 0)))".to_string(),
                }],
            )
            .await
            .unwrap();

        let report = ingest_city(&overpass, &cache, &config(), "c", "City").await.unwrap();
        assert!(report.records.is_empty());
        let document = cache.get_document().await.unwrap().unwrap();
        assert!(!document.contains_key("c"));
    }

    #[tokio::test]
    async fn test_city_boundary_fallback() {
        let boundary = r#"{"elements": [
            {"type": "relation", "id": 7, "tags": {"place": "city", "name": "Городок"}, "members": [
                {"type": "way", "ref": 70, "role": "outer", "geometry": [
                    {"lat": 0, "lon": 0}, {"lat": 0, "lon": 2}, {"lat": 2, "lon": 2}]},
                {"type": "way", "ref": 71, "role": "outer", "geometry": [
                    {"lat": 2, "lon": 2}, {"lat": 2, "lon": 0}, {"lat": 0, "lon": 0}]},
                {"type": "node", "ref": 72, "role": "admin_centre"}
            ]}
        ]}"#;
        let overpass = FakeOverpass::new()
            .route("area[", r#"{"elements": []}"#)
            .route("place", boundary);
        let cache = memory_cache().await;

        let report = ingest_city(&overpass, &cache, &config(), "gor", "Городок")
            .await
            .unwrap();
        assert_eq!(report.source, RecordSource::CityBoundary);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].osm_relation_id, 7);
        assert_eq!(report.records[0].name, "Городок");
        assert!(report.records[0].geometry.starts_with("MULTIPOLYGON"));

        let seen = overpass.seen();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].contains("out geom;"));
    }

    #[tokio::test]
    async fn test_client_error_aborts_without_writing() {
        let overpass = FakeOverpass::new()
            .route("area[", &metadata(&[(1, "A"), (2, "B")]))
            .route("id:1)", &square_ways(0.0, 1.0))
            .reject("id:2)", 504);
        let cache = memory_cache().await;
        cache.set(r#"{"c": [], "keep": []}"#).await.unwrap();

        let err = ingest_city(&overpass, &cache, &config(), "c", "City")
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("504"));
        assert_eq!(
            cache.get().await.unwrap().as_deref(),
            Some(r#"{"c": [], "keep": []}"#)
        );
    }

    #[tokio::test]
    async fn test_metadata_error_is_surfaced() {
        let overpass = FakeOverpass::new().reject("area[", 429);
        let cache = memory_cache().await;
        let err = ingest_city(&overpass, &cache, &config(), "c", "City")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("metadata"));
        assert_eq!(cache.get().await.unwrap(), None);
    }
}
