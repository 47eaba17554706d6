//! Persisted sync conflict model and its lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::models::operation::OperationPayload;
use crate::models::record::{Kind, Record};
use crate::util::unix_millis_now;

/// Lifecycle state of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConflictStatus {
    Pending,
    Resolved,
    Dismissed,
}

impl ConflictStatus {
    /// The stable string tag for this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Resolved => "RESOLVED",
            Self::Dismissed => "DISMISSED",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RESOLVED" => Ok(Self::Resolved),
            "DISMISSED" => Ok(Self::Dismissed),
            other => Err(Error::InvalidInput(format!(
                "Unknown conflict status: {other}"
            ))),
        }
    }
}

/// User-supplied choice that terminates a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    Client,
    Server,
    Custom,
}

/// Durable evidence of an operation whose client version did not match
/// server state.
///
/// `id` equals the offending `operationId`, which makes conflicts at-most-one
/// per operation. `server_data` is the server snapshot at detection time and
/// is null when the target record did not exist (`server_version` 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub id: String,
    pub kind: Kind,
    pub record_id: String,
    pub server_data: Option<Record>,
    pub client_data: OperationPayload,
    pub server_version: i64,
    pub client_version: i64,
    pub status: ConflictStatus,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
    pub resolved_data: Option<Record>,
}

impl Conflict {
    /// Build a PENDING conflict from detection-time evidence.
    ///
    /// `server_version` is derived from the snapshot (0 when absent).
    #[must_use]
    pub fn detected(
        operation_id: impl Into<String>,
        kind: Kind,
        server_data: Option<Record>,
        client_data: OperationPayload,
    ) -> Self {
        let server_version = server_data.as_ref().map_or(0, |record| record.version);
        let client_version = client_data.version.unwrap_or(0);
        Self {
            id: operation_id.into(),
            kind,
            record_id: client_data.id.clone(),
            server_data,
            client_data,
            server_version,
            client_version,
            status: ConflictStatus::Pending,
            created_at: unix_millis_now(),
            resolved_at: None,
            resolved_data: None,
        }
    }
}

/// Filter for conflict listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictFilter {
    pub status: Option<ConflictStatus>,
    pub kind: Option<Kind>,
    /// Maximum rows returned, newest first.
    pub limit: usize,
}

impl Default for ConflictFilter {
    fn default() -> Self {
        Self {
            status: None,
            kind: None,
            limit: 100,
        }
    }
}

/// Aggregate conflict counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictStats {
    pub pending: usize,
    pub resolved: usize,
    pub dismissed: usize,
    /// Total conflicts per kind tag, regardless of status.
    pub by_kind: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_update_payload(id: &str, version: i64) -> OperationPayload {
        OperationPayload {
            id: id.to_string(),
            version: Some(version),
            title: Some("buy bread".to_string()),
            ..OperationPayload::default()
        }
    }

    #[test]
    fn conflict_status_round_trips_through_str() {
        for status in [
            ConflictStatus::Pending,
            ConflictStatus::Resolved,
            ConflictStatus::Dismissed,
        ] {
            let parsed: ConflictStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("OPEN".parse::<ConflictStatus>().is_err());
    }

    #[test]
    fn detected_conflict_derives_versions() {
        let mut server = Record::new("t1", "buy milk", None, None);
        server.version = 2;
        let conflict = Conflict::detected(
            "o2",
            Kind::Todos,
            Some(server),
            client_update_payload("t1", 1),
        );
        assert_eq!(conflict.id, "o2");
        assert_eq!(conflict.record_id, "t1");
        assert_eq!(conflict.server_version, 2);
        assert_eq!(conflict.client_version, 1);
        assert_eq!(conflict.status, ConflictStatus::Pending);
        assert!(conflict.resolved_at.is_none());
    }

    #[test]
    fn absent_record_conflict_has_server_version_zero() {
        let conflict = Conflict::detected("o9", Kind::Notes, None, client_update_payload("n1", 3));
        assert_eq!(conflict.server_version, 0);
        assert!(conflict.server_data.is_none());
    }

    #[test]
    fn default_filter_is_unfiltered_with_limit() {
        let filter = ConflictFilter::default();
        assert!(filter.status.is_none());
        assert!(filter.kind.is_none());
        assert_eq!(filter.limit, 100);
    }
}
