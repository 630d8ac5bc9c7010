//! Presence resolution
//!
//! Point-in-time reads over person presence state. These are derived
//! views, not incrementally maintained indexes: each call groups the
//! people table by `current_location` as it stands. A current_location
//! pointing at a location that was since deleted from the registry is a
//! valid (possibly orphaned) group - it is never dropped and never
//! fails the call.

use serde::Serialize;
use std::collections::BTreeMap;
use tagsense_common::db::models::{Location, Trend};
use tagsense_common::db::settings;
use tagsense_common::{Result, Store};

/// Aggregated visitor presence for display
#[derive(Debug, Clone, Serialize)]
pub struct VisitorSummary {
    pub count: i64,
    pub trend: Trend,
    pub rooms: BTreeMap<String, i64>,
}

/// Occupancy of one registered location
#[derive(Debug, Clone, Serialize)]
pub struct RoomOccupancy {
    pub location_id: String,
    pub name: String,
    pub occupants: i64,
}

/// Occupancy of all registered locations on one floor
#[derive(Debug, Clone, Serialize)]
pub struct FloorOccupancy {
    pub floor_id: String,
    pub total: i64,
    pub rooms: Vec<RoomOccupancy>,
}

/// Who is where: person ids grouped by current location.
///
/// Empty store yields an empty map, never an error.
pub async fn people_by_location(store: &Store) -> Result<BTreeMap<String, Vec<String>>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT id, current_location FROM people
        WHERE current_location IS NOT NULL AND current_location != ''
        ORDER BY current_location, id
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let mut view: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (person_id, location_id) in rows {
        view.entry(location_id).or_default().push(person_id);
    }
    Ok(view)
}

/// Visitor presence summary: headcount, trend against the last sweep's
/// snapshot, and per-room counts. Well-defined zero result on no data.
pub async fn visitor_summary(store: &Store) -> Result<VisitorSummary> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT current_location FROM people
        WHERE kind = 'visitor' AND current_location IS NOT NULL AND current_location != ''
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    let count = rows.len() as i64;
    let mut rooms: BTreeMap<String, i64> = BTreeMap::new();
    for (location_id,) in rows {
        *rooms.entry(location_id).or_default() += 1;
    }

    let baseline = settings::visitor_count_snapshot(store.pool()).await?;
    let trend = match count.cmp(&baseline) {
        std::cmp::Ordering::Greater => Trend::Up,
        std::cmp::Ordering::Less => Trend::Down,
        std::cmp::Ordering::Equal => Trend::Steady,
    };

    Ok(VisitorSummary { count, trend, rooms })
}

/// Per-room occupant counts for the registered locations of one floor
pub async fn floor_occupancy(store: &Store, floor_id: &str) -> Result<FloorOccupancy> {
    let locations: Vec<(String, String)> =
        sqlx::query_as("SELECT id, name FROM locations WHERE floor_id = ? ORDER BY id")
            .bind(floor_id)
            .fetch_all(store.pool())
            .await?;

    let counts = occupant_counts(store).await?;

    let mut total = 0;
    let rooms = locations
        .into_iter()
        .map(|(location_id, name)| {
            let occupants = counts.get(&location_id).copied().unwrap_or(0);
            total += occupants;
            RoomOccupancy {
                location_id,
                name,
                occupants,
            }
        })
        .collect();

    Ok(FloorOccupancy {
        floor_id: floor_id.to_string(),
        total,
        rooms,
    })
}

/// Rewrite each registered location's derived `occupants` cache from the
/// live view. Only rows whose cache actually differs are touched, so a
/// no-change refresh is a no-op.
pub async fn refresh_location_occupants(store: &Store, now: i64) -> Result<()> {
    let view = people_by_location(store).await?;

    let location_ids: Vec<(String,)> = sqlx::query_as("SELECT id FROM locations")
        .fetch_all(store.pool())
        .await?;

    for (location_id,) in location_ids {
        let occupants = view.get(&location_id).cloned().unwrap_or_default();
        let occupants_json = serde_json::to_string(&occupants)
            .map_err(|e| tagsense_common::Error::StoreUnavailable(e.to_string()))?;

        sqlx::query(
            "UPDATE locations SET occupants = ?, last_update = ? WHERE id = ? AND occupants != ?",
        )
        .bind(&occupants_json)
        .bind(now)
        .bind(&location_id)
        .bind(&occupants_json)
        .execute(store.pool())
        .await?;
    }

    Ok(())
}

/// The location registry, with each location's derived occupant cache
pub async fn locations(store: &Store) -> Result<Vec<Location>> {
    type LocationRow = (String, String, Option<String>, String, String, i64, String);

    let rows: Vec<LocationRow> = sqlx::query_as(
        "SELECT id, name, description, floor_id, occupants, last_update, status \
         FROM locations ORDER BY id",
    )
    .fetch_all(store.pool())
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Location {
            id: row.0,
            name: row.1,
            description: row.2,
            floor_id: row.3,
            // tolerate malformed cache from foreign writers
            occupants: serde_json::from_str(&row.4).unwrap_or_default(),
            last_update: row.5,
            status: row.6,
        })
        .collect())
}

async fn occupant_counts(store: &Store) -> Result<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT current_location, COUNT(*) FROM people
        WHERE current_location IS NOT NULL AND current_location != ''
        GROUP BY current_location
        "#,
    )
    .fetch_all(store.pool())
    .await?;

    Ok(rows.into_iter().collect())
}
