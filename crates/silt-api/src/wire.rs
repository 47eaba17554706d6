//! Wire-layer contract for the sync endpoint.
//!
//! Decodes the batch request and enforces every shape constraint before the
//! processor sees it; an invalid batch is rejected whole with a 400, no
//! operation executed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use silt_core::{Action, RecordPatch, Resolution, SyncOperation};

use crate::error::ApiError;

/// Maximum operations per batch; queuing beyond this is the client's job.
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Maximum record title length, in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Body of `POST /api/sync`.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub operations: Vec<SyncOperation>,
}

/// Body of `PUT /api/conflicts/:id/resolve`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveBody {
    pub resolution: Resolution,
    pub resolved_data: Option<RecordPatch>,
}

/// Decode the sync request body.
///
/// Decoding happens here rather than in the extractor so every shape
/// violation surfaces as a 400, not a 422.
pub fn decode_sync_request(value: serde_json::Value) -> Result<SyncRequest, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::bad_request(format!("malformed sync request: {e}")))
}

/// Decode the resolve request body.
pub fn decode_resolve_body(value: serde_json::Value) -> Result<ResolveBody, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::bad_request(format!("malformed resolve request: {e}")))
}

/// Uniform success envelope for every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Validate the whole batch pre-dispatch.
pub fn validate_batch(request: &SyncRequest) -> Result<(), ApiError> {
    if request.operations.is_empty() {
        return Err(ApiError::bad_request("operations must not be empty"));
    }
    if request.operations.len() > MAX_BATCH_OPERATIONS {
        return Err(ApiError::bad_request(format!(
            "operations exceeds the batch limit of {MAX_BATCH_OPERATIONS}"
        )));
    }

    let mut seen_ids = HashSet::with_capacity(request.operations.len());
    for operation in &request.operations {
        if operation.operation_id.trim().is_empty() {
            return Err(ApiError::bad_request("operationId must not be empty"));
        }
        if !seen_ids.insert(operation.operation_id.as_str()) {
            return Err(ApiError::bad_request(format!(
                "duplicate operationId in batch: {}",
                operation.operation_id
            )));
        }
        validate_operation(operation)?;
    }

    Ok(())
}

fn validate_operation(operation: &SyncOperation) -> Result<(), ApiError> {
    let payload = &operation.data;
    let context = &operation.operation_id;

    if payload.id.trim().is_empty() {
        return Err(ApiError::bad_request(format!(
            "{context}: data.id must not be empty"
        )));
    }

    if payload.status.is_some() && !operation.kind.has_status() {
        return Err(ApiError::bad_request(format!(
            "{context}: status is only valid for todos"
        )));
    }

    match operation.action {
        Action::Create => {
            let Some(title) = payload.title.as_deref().map(str::trim) else {
                return Err(ApiError::bad_request(format!(
                    "{context}: title is required for CREATE"
                )));
            };
            if title.is_empty() {
                return Err(ApiError::bad_request(format!(
                    "{context}: title must not be empty"
                )));
            }
            validate_title_length(context, title)?;
        }
        Action::Update => {
            validate_version(context, payload.version)?;
            if let Some(title) = payload.title.as_deref() {
                if title.trim().is_empty() {
                    return Err(ApiError::bad_request(format!(
                        "{context}: title must not be empty"
                    )));
                }
                validate_title_length(context, title)?;
            }
        }
        Action::Delete => {
            validate_version(context, payload.version)?;
        }
    }

    Ok(())
}

fn validate_version(context: &str, version: Option<i64>) -> Result<(), ApiError> {
    match version {
        Some(version) if version >= 1 => Ok(()),
        Some(_) => Err(ApiError::bad_request(format!(
            "{context}: version must be a positive integer"
        ))),
        None => Err(ApiError::bad_request(format!(
            "{context}: version is required"
        ))),
    }
}

fn validate_title_length(context: &str, title: &str) -> Result<(), ApiError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "{context}: title exceeds {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_core::{Kind, OperationPayload, TodoStatus};

    fn create_op(operation_id: &str, kind: Kind, id: &str, title: &str) -> SyncOperation {
        SyncOperation {
            operation_id: operation_id.to_string(),
            action: Action::Create,
            kind,
            data: OperationPayload {
                id: id.to_string(),
                title: Some(title.to_string()),
                ..OperationPayload::default()
            },
        }
    }

    fn delete_op(operation_id: &str, id: &str, version: Option<i64>) -> SyncOperation {
        SyncOperation {
            operation_id: operation_id.to_string(),
            action: Action::Delete,
            kind: Kind::Notes,
            data: OperationPayload {
                id: id.to_string(),
                version,
                ..OperationPayload::default()
            },
        }
    }

    fn batch(operations: Vec<SyncOperation>) -> SyncRequest {
        SyncRequest { operations }
    }

    #[test]
    fn accepts_a_well_formed_batch() {
        let request = batch(vec![
            create_op("o1", Kind::Todos, "t1", "buy milk"),
            delete_op("o2", "n1", Some(1)),
        ]);
        assert!(validate_batch(&request).is_ok());
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(validate_batch(&batch(vec![])).is_err());
    }

    #[test]
    fn rejects_oversized_batch() {
        let operations = (0..=MAX_BATCH_OPERATIONS)
            .map(|i| create_op(&format!("o{i}"), Kind::Notes, &format!("n{i}"), "memo"))
            .collect();
        assert!(validate_batch(&batch(operations)).is_err());
    }

    #[test]
    fn rejects_duplicate_operation_ids() {
        let request = batch(vec![
            create_op("o1", Kind::Todos, "t1", "a"),
            create_op("o1", Kind::Todos, "t2", "b"),
        ]);
        let err = validate_batch(&request).unwrap_err();
        assert!(err.to_string().contains("duplicate operationId"));
    }

    #[test]
    fn rejects_create_without_title() {
        let mut op = create_op("o1", Kind::Todos, "t1", "x");
        op.data.title = None;
        assert!(validate_batch(&batch(vec![op])).is_err());
    }

    #[test]
    fn rejects_blank_title() {
        let request = batch(vec![create_op("o1", Kind::Todos, "t1", "   ")]);
        assert!(validate_batch(&request).is_err());
    }

    #[test]
    fn rejects_overlong_title() {
        let long_title = "x".repeat(MAX_TITLE_LENGTH + 1);
        let request = batch(vec![create_op("o1", Kind::Notes, "n1", &long_title)]);
        assert!(validate_batch(&request).is_err());

        let max_title = "x".repeat(MAX_TITLE_LENGTH);
        let request = batch(vec![create_op("o1", Kind::Notes, "n1", &max_title)]);
        assert!(validate_batch(&request).is_ok());
    }

    #[test]
    fn rejects_status_on_notes() {
        let mut op = create_op("o1", Kind::Notes, "n1", "memo");
        op.data.status = Some(TodoStatus::Pending);
        let err = validate_batch(&batch(vec![op])).unwrap_err();
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn rejects_delete_without_version() {
        let request = batch(vec![delete_op("o1", "n1", None)]);
        assert!(validate_batch(&request).is_err());
    }

    #[test]
    fn rejects_non_positive_version() {
        assert!(validate_batch(&batch(vec![delete_op("o1", "n1", Some(0))])).is_err());
        assert!(validate_batch(&batch(vec![delete_op("o1", "n1", Some(-3))])).is_err());
    }

    #[test]
    fn rejects_update_with_blank_title() {
        let op = SyncOperation {
            operation_id: "o1".to_string(),
            action: Action::Update,
            kind: Kind::Todos,
            data: OperationPayload {
                id: "t1".to_string(),
                version: Some(1),
                title: Some("  ".to_string()),
                ..OperationPayload::default()
            },
        };
        assert!(validate_batch(&batch(vec![op])).is_err());
    }

    #[test]
    fn rejects_empty_record_id() {
        let request = batch(vec![create_op("o1", Kind::Todos, "", "buy milk")]);
        assert!(validate_batch(&request).is_err());
    }
}
