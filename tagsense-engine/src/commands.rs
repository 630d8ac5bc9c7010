//! Command queue
//!
//! A typed, status-tracked outbox of instructions for RFID hardware,
//! stored under `commands/{kind}/{id}` so an agent only polls its own
//! command class. The registration flow enqueues; external hardware
//! agents poll, claim and acknowledge through the shared store.
//!
//! Status only ever moves forward (pending -> in_progress ->
//! completed/failed); out-of-order transition attempts are rejected
//! before any write. Enqueue deliberately does not validate that the
//! target exists - the eventual hardware failure is the only signal.

use crate::identity;
use std::collections::BTreeMap;
use tagsense_common::db::models::{Command, CommandStatus, WRITE_RFID};
use tagsense_common::db::settings;
use tagsense_common::{ids, Error, Result, Store};
use tracing::{debug, info};

type CommandRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    i64,
    i64,
);

const COMMAND_COLUMNS: &str = "id, kind, target_id, status, params, error, created_at, updated_at";

fn command_from_row(row: CommandRow) -> Result<Command> {
    Ok(Command {
        id: row.0,
        kind: row.1,
        target_id: row.2,
        status: row.3.parse::<CommandStatus>()?,
        // tolerate malformed params from foreign writers
        params: serde_json::from_str(&row.4).unwrap_or_default(),
        error: row.5,
        created_at: row.6,
        updated_at: row.7,
    })
}

/// Enqueue a command for the hardware agents of `kind`, returning the
/// generated command id so the caller can correlate the outcome later.
pub async fn enqueue(
    store: &Store,
    kind: &str,
    target_id: &str,
    params: &BTreeMap<String, String>,
    now: i64,
) -> Result<String> {
    let kind = kind.trim();
    let target_id = target_id.trim();
    if kind.is_empty() {
        return Err(Error::InvalidInput("command kind must be non-empty".to_string()));
    }
    if target_id.is_empty() {
        return Err(Error::InvalidInput(
            "command target must be non-empty".to_string(),
        ));
    }

    let id = ids::new_id();
    let params_json = serde_json::to_string(params)
        .map_err(|e| Error::InvalidInput(format!("unencodable params: {e}")))?;

    sqlx::query(
        r#"
        INSERT INTO commands (id, kind, target_id, status, params, created_at, updated_at)
        VALUES (?, ?, ?, 'pending', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(kind)
    .bind(target_id)
    .bind(&params_json)
    .bind(now)
    .bind(now)
    .execute(store.pool())
    .await?;

    info!("Enqueued {} command {} for {}", kind, id, target_id);
    Ok(id)
}

/// Fetch one command
pub async fn get(store: &Store, kind: &str, id: &str) -> Result<Command> {
    let row: Option<CommandRow> = sqlx::query_as(&format!(
        "SELECT {COMMAND_COLUMNS} FROM commands WHERE kind = ? AND id = ?"
    ))
    .bind(kind)
    .bind(id)
    .fetch_optional(store.pool())
    .await?;

    match row {
        Some(row) => command_from_row(row),
        None => Err(Error::NotFound(format!("command {kind}/{id}"))),
    }
}

/// Commands of one kind still waiting for pickup, oldest first.
/// Operator visibility: a permanently pending command is the signal
/// that no agent is polling its kind.
pub async fn pending(store: &Store, kind: &str) -> Result<Vec<Command>> {
    let rows: Vec<CommandRow> = sqlx::query_as(&format!(
        "SELECT {COMMAND_COLUMNS} FROM commands \
         WHERE kind = ? AND status = 'pending' ORDER BY created_at, id"
    ))
    .bind(kind)
    .fetch_all(store.pool())
    .await?;

    rows.into_iter().map(command_from_row).collect()
}

/// Claim the oldest pending command of `kind`, transitioning it to
/// in_progress. Returns None when nothing is waiting (or another agent
/// won the claim).
pub async fn claim_next(store: &Store, kind: &str, now: i64) -> Result<Option<Command>> {
    let mut tx = store.pool().begin().await?;

    let row: Option<CommandRow> = sqlx::query_as(&format!(
        "SELECT {COMMAND_COLUMNS} FROM commands \
         WHERE kind = ? AND status = 'pending' ORDER BY created_at, id LIMIT 1"
    ))
    .bind(kind)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut command = command_from_row(row)?;

    let claimed = sqlx::query(
        "UPDATE commands SET status = 'in_progress', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(now)
    .bind(&command.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if claimed.rows_affected() == 0 {
        // another agent claimed it between our read and write
        return Ok(None);
    }

    command.status = CommandStatus::InProgress;
    command.updated_at = now;
    debug!("Claimed {} command {}", kind, command.id);
    Ok(Some(command))
}

/// Mark a claimed command completed.
///
/// For `write_rfid` commands prefer [`complete_write_rfid`], which also
/// records the tag assignment the completion implies.
pub async fn complete(store: &Store, kind: &str, id: &str, now: i64) -> Result<()> {
    transition(store, kind, id, CommandStatus::Completed, None, now).await
}

/// Mark a claimed command failed, with the reason reported by the agent
pub async fn fail(store: &Store, kind: &str, id: &str, reason: &str, now: i64) -> Result<()> {
    transition(store, kind, id, CommandStatus::Failed, Some(reason), now).await
}

async fn transition(
    store: &Store,
    kind: &str,
    id: &str,
    to: CommandStatus,
    error: Option<&str>,
    now: i64,
) -> Result<()> {
    let current = get(store, kind, id).await?.status;
    if !current.can_transition_to(to) {
        return Err(Error::InvalidInput(format!(
            "command {id} cannot move {current} -> {to}"
        )));
    }

    let updated = sqlx::query(
        "UPDATE commands SET status = ?, error = ?, updated_at = ? \
         WHERE id = ? AND kind = ? AND status = ?",
    )
    .bind(to.as_str())
    .bind(error)
    .bind(now)
    .bind(id)
    .bind(kind)
    .bind(current.as_str())
    .execute(store.pool())
    .await?;

    if updated.rows_affected() == 0 {
        // a concurrent writer moved the command first
        return Err(Error::InvalidInput(format!(
            "command {id} was transitioned concurrently"
        )));
    }

    info!("Command {}/{} -> {}", kind, id, to);
    Ok(())
}

/// Complete a `write_rfid` command and record the tag assignment it
/// implies, in one transaction.
///
/// The status guard is the conditional part: retrying a completion that
/// already happened hits the guard and changes nothing. The command's
/// target need not exist as a person record - a dangling owner
/// back-reference is tolerated by every reader.
pub async fn complete_write_rfid(store: &Store, id: &str, tag_id: &str, now: i64) -> Result<()> {
    let tag_id = tag_id.trim();
    if tag_id.is_empty() {
        return Err(Error::InvalidInput("tag id must be non-empty".to_string()));
    }

    let mut tx = store.pool().begin().await?;

    let row: Option<(String, String)> =
        sqlx::query_as("SELECT target_id, status FROM commands WHERE kind = ? AND id = ?")
            .bind(WRITE_RFID)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some((target_id, status)) = row else {
        return Err(Error::NotFound(format!("command {WRITE_RFID}/{id}")));
    };
    let status = status.parse::<CommandStatus>()?;
    if !status.can_transition_to(CommandStatus::Completed) {
        return Err(Error::InvalidInput(format!(
            "command {id} cannot move {status} -> completed"
        )));
    }

    sqlx::query("UPDATE commands SET status = 'completed', updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    identity::assign_tag_on(&mut *tx, tag_id, &target_id, now).await?;

    tx.commit().await?;

    info!(
        "Command {}/{} completed, tag {} assigned to {}",
        WRITE_RFID, id, tag_id, target_id
    );
    Ok(())
}

/// Promote commands stuck past their settings-backed age thresholds to
/// failed: pending ones nobody ever claimed, in_progress ones whose
/// agent went silent. Returns how many were expired.
pub async fn expire_stale(store: &Store, now: i64) -> Result<usize> {
    let pending_timeout = settings::command_pending_timeout_secs(store.pool()).await?;
    let in_progress_timeout = settings::command_in_progress_timeout_secs(store.pool()).await?;

    let expired_pending = sqlx::query(
        "UPDATE commands SET status = 'failed', error = 'expired: never claimed', updated_at = ? \
         WHERE status = 'pending' AND created_at <= ?",
    )
    .bind(now)
    .bind(now - pending_timeout)
    .execute(store.pool())
    .await?;

    let expired_in_progress = sqlx::query(
        "UPDATE commands SET status = 'failed', error = 'expired: agent never completed', updated_at = ? \
         WHERE status = 'in_progress' AND updated_at <= ?",
    )
    .bind(now)
    .bind(now - in_progress_timeout)
    .execute(store.pool())
    .await?;

    let expired = (expired_pending.rows_affected() + expired_in_progress.rows_affected()) as usize;
    if expired > 0 {
        info!("Expired {} stale commands", expired);
    }
    Ok(expired)
}
