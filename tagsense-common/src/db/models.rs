//! Row models and status enums
//!
//! One struct per stored collection, mirroring the shared store layout:
//! `people/{id}`, `tags/{id}`, `tag_readings/{location_id}/{date}/{id}`,
//! `locations/{id}`, `commands/{kind}/{id}`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Person classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Resident,
    Visitor,
}

impl PersonKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonKind::Resident => "resident",
            PersonKind::Visitor => "visitor",
        }
    }
}

impl FromStr for PersonKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resident" => Ok(PersonKind::Resident),
            "visitor" => Ok(PersonKind::Visitor),
            other => Err(Error::InvalidInput(format!("unknown person kind: {other}"))),
        }
    }
}

impl fmt::Display for PersonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked person (resident or visitor)
///
/// Location fields are mutated only by the presence resolver and the
/// staleness reaper; the assigned tag set only by tag-assignment
/// completion. Person records are never deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub kind: PersonKind,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<String>,
    /// Registration correlation id carried through from onboarding
    pub user_id: Option<String>,
    /// Presence pointer; `None` when not currently in the building
    pub current_location: Option<String>,
    pub last_seen: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A physical RFID transponder
///
/// `owner_id` is a back-reference for owner lookup during ingestion,
/// not an ownership relation; the person record stays authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Physical EPC
    pub id: String,
    pub owner_id: Option<String>,
    pub last_read_ts: Option<i64>,
    pub last_read_location: Option<String>,
    pub last_read_rssi: Option<i64>,
    /// Presence pointer, cleared by the staleness reaper
    pub current_room: Option<String>,
    pub last_seen: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One observed detection of a tag by a reader. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub location_id: String,
    /// Date partition key (`YYYY-MM-DD`, UTC)
    pub date: String,
    pub tag_id: String,
    pub ts: i64,
    pub rssi: i64,
}

/// A reader location in the building
///
/// `occupants` is a derived cache of resolver output; authoritative
/// presence is each person's `current_location`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub floor_id: String,
    pub occupants: Vec<String>,
    pub last_update: i64,
    pub status: String,
}

/// Command lifecycle status
///
/// Transitions are monotonic: pending → in_progress → {completed, failed}.
/// The queue-side expiry also promotes stale pending commands straight to
/// failed. No transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::InProgress => "in_progress",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    /// Whether this status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Failed)
    }

    /// Whether moving to `next` is a legal forward transition
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Failed) | (InProgress, Completed) | (InProgress, Failed)
        )
    }
}

impl FromStr for CommandStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "in_progress" => Ok(CommandStatus::InProgress),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            other => Err(Error::InvalidInput(format!(
                "unknown command status: {other}"
            ))),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An asynchronous instruction directed at RFID hardware, tracked
/// through the status lifecycle and partitioned by kind so an agent
/// only polls its own command class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub kind: String,
    pub target_id: String,
    pub status: CommandStatus,
    pub params: BTreeMap<String, String>,
    /// Failure reason, set on the failed transition
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Command kind understood by the tag-writing hardware agents
pub const WRITE_RFID: &str = "write_rfid";

/// Owner resolution outcome for an ingested reading
///
/// Readings from tags nobody owns are valid sensor data; they are
/// recorded but attributed to no one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Attributed(String),
    Unattributed,
}

/// Visitor-count movement relative to the last sweep snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Steady,
}
