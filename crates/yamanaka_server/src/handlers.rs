//! Request handlers for the sync endpoints.

use crate::context::SyncContext;
use crate::error::ApiResult;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use yamanaka_protocol::{PullResponse, PushRequest, StatusResponse, SyncEvent};

/// Query parameters accepted by every endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct DeviceQuery {
    pub(crate) device_id: Option<String>,
}

fn sender_label(device_id: &str) -> &str {
    if device_id.is_empty() {
        "unknown device"
    } else {
        device_id
    }
}

/// `GET /api/check` — liveness probe, touches nothing.
pub(crate) async fn check() -> Json<StatusResponse> {
    Json(StatusResponse::ok())
}

/// `GET /api/sync/pull` — the full vault listing.
pub(crate) async fn pull(State(ctx): State<Arc<SyncContext>>) -> ApiResult<Json<PullResponse>> {
    let files = ctx.vault.list_all().await?;
    Ok(Json(PullResponse::new(files)))
}

/// `POST /api/sync/push` — apply incremental mutations from one device.
///
/// Deletes run before updates. Every mutation is independent: a bad path,
/// undecodable content, or filesystem failure skips that one file with a
/// warning and produces no event, while the rest of the batch proceeds. An
/// event is only ever emitted after its write or delete has completed on
/// disk.
pub(crate) async fn push(
    State(ctx): State<Arc<SyncContext>>,
    Query(query): Query<DeviceQuery>,
    Json(request): Json<PushRequest>,
) -> ApiResult<Json<StatusResponse>> {
    let sender = query.device_id.unwrap_or_default();
    info!(
        sender = sender_label(&sender),
        updates = request.files_to_update.len(),
        deletes = request.files_to_delete.len(),
        "processing push"
    );

    for path in &request.files_to_delete {
        match ctx.vault.delete(path).await {
            Ok(true) => {
                ctx.broadcaster
                    .broadcast(&sender, &SyncEvent::file_deleted(path.clone()))
                    .await;
            }
            Ok(false) => warn!(path = %path, "delete requested for a file that does not exist"),
            Err(err) => warn!(path = %path, %err, "could not delete file"),
        }
    }

    for file in &request.files_to_update {
        let bytes = match BASE64.decode(file.content.as_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %file.path, %err, "could not decode file content");
                continue;
            }
        };
        match ctx.vault.write(&file.path, &bytes).await {
            Ok(()) => {
                ctx.broadcaster
                    .broadcast(
                        &sender,
                        &SyncEvent::file_updated(file.path.clone(), file.content.clone()),
                    )
                    .await;
            }
            Err(err) => warn!(path = %file.path, %err, "could not write file"),
        }
    }

    ctx.snapshot(&format!("client push from {}", sender_label(&sender)))
        .await;

    Ok(Json(StatusResponse::push_processed()))
}

/// `POST /api/sync/initial` — replace the whole vault from a gzipped tar.
///
/// Recipients get a single full-sync signal rather than per-file events;
/// their cheapest correct response is one pull.
pub(crate) async fn initial_sync(
    State(ctx): State<Arc<SyncContext>>,
    Query(query): Query<DeviceQuery>,
    body: Bytes,
) -> ApiResult<Json<StatusResponse>> {
    let sender = query.device_id.unwrap_or_default();
    info!(
        sender = sender_label(&sender),
        bytes = body.len(),
        "processing initial sync"
    );

    ctx.vault.clean_except_history().await?;
    ctx.vault.extract_targz(body.to_vec()).await?;

    ctx.broadcaster
        .broadcast(
            &sender,
            &SyncEvent::full_sync_required(
                "the vault was replaced by an initial sync, pull required",
            ),
        )
        .await;

    ctx.snapshot(&format!("initial sync from {}", sender_label(&sender)))
        .await;

    Ok(Json(StatusResponse::initial_sync_processed()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_labels() {
        assert_eq!(sender_label(""), "unknown device");
        assert_eq!(sender_label("device-a"), "device-a");
    }

    #[test]
    fn device_query_is_optional() {
        let query: DeviceQuery = serde_json::from_str("{}").unwrap();
        assert!(query.device_id.is_none());

        let query: DeviceQuery = serde_json::from_str(r#"{"device_id":"a"}"#).unwrap();
        assert_eq!(query.device_id.as_deref(), Some("a"));
    }
}
