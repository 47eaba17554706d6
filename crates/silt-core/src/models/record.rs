//! Synchronized record model shared by both entity kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::util::unix_millis_now;

/// Entity kind tag.
///
/// Both kinds share one record lifecycle; `todos` additionally carry a
/// workflow [`TodoStatus`]. The tag selects the backing table, so adding a
/// kind means extending this enum and its validation rule, not adding a
/// component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "todos")]
    Todos,
    #[serde(rename = "notes")]
    Notes,
}

impl Kind {
    /// All known kinds.
    pub const ALL: [Self; 2] = [Self::Todos, Self::Notes];

    /// The stable string tag for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todos => "todos",
            Self::Notes => "notes",
        }
    }

    /// The SQLite table backing records of this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Todos => "records_todos",
            Self::Notes => "records_notes",
        }
    }

    /// Whether records of this kind carry a workflow status.
    #[must_use]
    pub const fn has_status(self) -> bool {
        matches!(self, Self::Todos)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todos" => Ok(Self::Todos),
            "notes" => Ok(Self::Notes),
            other => Err(Error::InvalidInput(format!("Unknown kind: {other}"))),
        }
    }
}

/// Workflow status of a todo record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl TodoStatus {
    /// The stable string tag for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(Error::InvalidInput(format!("Unknown status: {other}"))),
        }
    }
}

/// A synchronized record.
///
/// `version` starts at 1 and increases by exactly 1 on every mutation,
/// including soft deletion and conflict resolution. A non-null `deleted_at`
/// marks the record as a tombstone: invisible to live queries, still visible
/// to the sync processor for conflict detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Client-chosen identifier, unique within a kind
    pub id: String,
    /// Non-empty display title
    pub title: String,
    /// Optional body text
    pub content: Option<String>,
    /// Workflow status (todos only)
    pub status: Option<TodoStatus>,
    /// Optimistic concurrency version, starts at 1
    pub version: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last mutation timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft-delete timestamp; non-null means tombstone
    pub deleted_at: Option<i64>,
}

impl Record {
    /// Create a fresh record at version 1 with server-assigned timestamps.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: Option<String>,
        status: Option<TodoStatus>,
    ) -> Self {
        let now = unix_millis_now();
        Self {
            id: id.into(),
            title: title.into(),
            content,
            status,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether this record is a tombstone.
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Partial update to a record's client-owned fields.
///
/// Absent fields are left unchanged by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
}

impl RecordPatch {
    /// A patch carrying every client-owned field of `record`.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            title: Some(record.title.clone()),
            content: record.content.clone(),
            status: record.status,
        }
    }
}
