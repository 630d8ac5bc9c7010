//! Identity store
//!
//! Person records (residents and visitors) and their RFID tag
//! assignments. Tag reassignment is a single transaction: the previous
//! owner's reference is cleared at the same instant the new one is
//! written, so at most one owner reference exists at any time.

use sqlx::SqliteConnection;
use tagsense_common::db::models::{Attribution, Person, PersonKind, Tag};
use tagsense_common::{ids, Error, Result, Store};
use tracing::info;

type PersonRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    i64,
    i64,
);

const PERSON_COLUMNS: &str = "id, kind, first_name, last_name, dob, user_id, \
     current_location, last_seen, created_at, updated_at";

fn person_from_row(row: PersonRow) -> Result<Person> {
    Ok(Person {
        id: row.0,
        kind: row.1.parse::<PersonKind>()?,
        first_name: row.2,
        last_name: row.3,
        dob: row.4,
        user_id: row.5,
        current_location: row.6.filter(|l| !l.is_empty()),
        last_seen: row.7,
        created_at: row.8,
        updated_at: row.9,
    })
}

/// Create a person record, returning its generated id.
///
/// Called by the registration flow (resident import or visitor
/// onboarding). Names must be non-empty; everything else is stored as
/// given.
pub async fn create_person(
    store: &Store,
    kind: PersonKind,
    first_name: &str,
    last_name: &str,
    dob: Option<&str>,
    user_id: Option<&str>,
    now: i64,
) -> Result<String> {
    let first_name = first_name.trim();
    let last_name = last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(Error::InvalidInput(
            "person first and last name must be non-empty".to_string(),
        ));
    }

    let id = ids::new_id();
    sqlx::query(
        r#"
        INSERT INTO people (id, kind, first_name, last_name, dob, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(kind.as_str())
    .bind(first_name)
    .bind(last_name)
    .bind(dob)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(store.pool())
    .await?;

    info!("Created {} {} {} ({})", kind, first_name, last_name, id);
    Ok(id)
}

/// Fetch one person by id
pub async fn get_person(store: &Store, id: &str) -> Result<Person> {
    let row: Option<PersonRow> = sqlx::query_as(&format!(
        "SELECT {PERSON_COLUMNS} FROM people WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(store.pool())
    .await?;

    match row {
        Some(row) => person_from_row(row),
        None => Err(Error::NotFound(format!("person {id}"))),
    }
}

/// List people of one kind
pub async fn people_by_kind(store: &Store, kind: PersonKind) -> Result<Vec<Person>> {
    let rows: Vec<PersonRow> = sqlx::query_as(&format!(
        "SELECT {PERSON_COLUMNS} FROM people WHERE kind = ? ORDER BY last_name, first_name"
    ))
    .bind(kind.as_str())
    .fetch_all(store.pool())
    .await?;

    rows.into_iter().map(person_from_row).collect()
}

/// List all people
pub async fn all_people(store: &Store) -> Result<Vec<Person>> {
    let rows: Vec<PersonRow> = sqlx::query_as(&format!(
        "SELECT {PERSON_COLUMNS} FROM people ORDER BY last_name, first_name"
    ))
    .fetch_all(store.pool())
    .await?;

    rows.into_iter().map(person_from_row).collect()
}

/// Assign a tag to a person, reassigning it away from any previous owner.
///
/// The delete/upsert/insert triple runs in one transaction so a crash
/// cannot leave the tag owned by two people or by no one while a
/// person's tag set still references it.
pub async fn assign_tag(store: &Store, tag_id: &str, person_id: &str, now: i64) -> Result<()> {
    let tag_id = tag_id.trim();
    if tag_id.is_empty() {
        return Err(Error::InvalidInput("tag id must be non-empty".to_string()));
    }
    // target must exist for explicit assignment; the write_rfid
    // completion path is deliberately more tolerant
    get_person(store, person_id).await?;

    let mut tx = store.pool().begin().await?;
    assign_tag_on(&mut *tx, tag_id, person_id, now).await?;
    tx.commit().await?;

    info!("Assigned tag {} to person {}", tag_id, person_id);
    Ok(())
}

/// Tag assignment statements, callable inside a caller-owned transaction
pub(crate) async fn assign_tag_on(
    conn: &mut SqliteConnection,
    tag_id: &str,
    person_id: &str,
    now: i64,
) -> Result<()> {
    // clear any previous owner's reference to this tag
    sqlx::query("DELETE FROM person_tags WHERE tag_id = ? AND person_id != ?")
        .bind(tag_id)
        .bind(person_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO tags (id, owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET owner_id = excluded.owner_id, updated_at = excluded.updated_at
        "#,
    )
    .bind(tag_id)
    .bind(person_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO person_tags (person_id, tag_id, assigned_at) VALUES (?, ?, ?)")
        .bind(person_id)
        .bind(tag_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// A person's assigned tag ids, oldest assignment first
pub async fn tags_of(store: &Store, person_id: &str) -> Result<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tag_id FROM person_tags WHERE person_id = ? ORDER BY assigned_at, tag_id",
    )
    .bind(person_id)
    .fetch_all(store.pool())
    .await?;

    Ok(rows.into_iter().map(|(tag_id,)| tag_id).collect())
}

/// Resolve who (if anyone) a tag belongs to.
///
/// A missing tag row or an empty owner back-reference both mean the
/// reading cannot be attributed; neither is an error.
pub async fn resolve_owner(store: &Store, tag_id: &str) -> Result<Attribution> {
    let owner: Option<Option<String>> = sqlx::query_scalar("SELECT owner_id FROM tags WHERE id = ?")
        .bind(tag_id)
        .fetch_optional(store.pool())
        .await?;

    Ok(match owner.flatten() {
        Some(owner_id) if !owner_id.is_empty() => Attribution::Attributed(owner_id),
        _ => Attribution::Unattributed,
    })
}

/// Fetch one tag by EPC
pub async fn get_tag(store: &Store, id: &str) -> Result<Tag> {
    type TagRow = (
        String,
        Option<String>,
        Option<i64>,
        Option<String>,
        Option<i64>,
        Option<String>,
        Option<i64>,
        i64,
        i64,
    );

    let row: Option<TagRow> = sqlx::query_as(
        r#"
        SELECT id, owner_id, last_read_ts, last_read_location, last_read_rssi,
               current_room, last_seen, created_at, updated_at
        FROM tags WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(store.pool())
    .await?;

    let row = row.ok_or_else(|| Error::NotFound(format!("tag {id}")))?;
    Ok(Tag {
        id: row.0,
        owner_id: row.1.filter(|o| !o.is_empty()),
        last_read_ts: row.2,
        last_read_location: row.3,
        last_read_rssi: row.4,
        current_room: row.5.filter(|r| !r.is_empty()),
        last_seen: row.6,
        created_at: row.7,
        updated_at: row.8,
    })
}
