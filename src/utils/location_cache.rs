use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;

use crate::model::work_location::WorkLocation;

/// Active work locations, refreshed from the database at most once per TTL.
/// Reference data changes rarely; every clock-in check reads it.
static LOCATION_CACHE: Lazy<Cache<u8, Arc<Vec<WorkLocation>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(1)
        .time_to_live(Duration::from_secs(300))
        .build()
});

const ACTIVE_KEY: u8 = 0;

async fn load_active(pool: &MySqlPool) -> Result<Vec<WorkLocation>> {
    let mut stream = sqlx::query_as::<_, WorkLocation>(
        r#"
        SELECT id, name, latitude, longitude, radius_meters, is_active
        FROM work_locations
        WHERE is_active = 1
        ORDER BY id
        "#,
    )
    .fetch(pool);

    let mut locations = Vec::new();
    while let Some(row) = stream.next().await {
        locations.push(row?);
    }
    Ok(locations)
}

/// Cached read used by the geofence matcher.
pub async fn active_locations(pool: &MySqlPool) -> Result<Arc<Vec<WorkLocation>>> {
    if let Some(cached) = LOCATION_CACHE.get(&ACTIVE_KEY).await {
        return Ok(cached);
    }

    let fresh = Arc::new(load_active(pool).await?);
    LOCATION_CACHE.insert(ACTIVE_KEY, fresh.clone()).await;
    Ok(fresh)
}

/// Startup warmup so the first clock-in does not pay the DB round trip.
pub async fn warmup_location_cache(pool: &MySqlPool) -> Result<()> {
    let locations = active_locations(pool).await?;
    log::info!("Work location cache warmup complete: {} active", locations.len());
    Ok(())
}
