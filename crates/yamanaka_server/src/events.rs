//! The long-lived event stream delivered to one subscriber.
//!
//! Connection lifecycle: validate the device id, register a live channel,
//! drain the spool (or collapse an oversized backlog into one full-sync
//! signal), then relay live events until the subscriber goes away. Keep-alive
//! comment frames stop idle intermediaries from closing the connection.

use crate::context::SyncContext;
use crate::error::{ApiError, ApiResult};
use crate::handlers::DeviceQuery;
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::info;
use yamanaka_protocol::SyncEvent;

/// Deregisters the device when the stream is dropped.
///
/// Carries the registration epoch so that if the device already reconnected,
/// tearing down the old stream leaves the new registration alone.
struct RegistrationGuard {
    registry: Arc<yamanaka_core::ClientRegistry>,
    device_id: String,
    epoch: u64,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.registry.deregister(&self.device_id, self.epoch);
        info!(device = %self.device_id, "event stream closed");
    }
}

/// Backlog-then-live event sequence for one subscriber.
///
/// Spooled events are always exhausted before the first live event, which is
/// what keeps per-subscriber delivery in order across a reconnect.
pub struct EventStream {
    backlog: VecDeque<SyncEvent>,
    live: mpsc::Receiver<SyncEvent>,
    _guard: RegistrationGuard,
}

impl Stream for EventStream {
    type Item = SyncEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.backlog.pop_front() {
            return Poll::Ready(Some(event));
        }
        this.live.poll_recv(cx)
    }
}

impl SyncContext {
    /// Opens the event sequence for one subscriber: registers the device,
    /// drains its backlog, and returns the combined stream.
    ///
    /// Exposed so delivery behavior can be exercised without an HTTP
    /// connection; the SSE endpoint is a thin framing layer over this.
    pub async fn subscribe(self: &Arc<Self>, device_id: &str) -> ApiResult<EventStream> {
        let (sender, live) = yamanaka_core::ClientRegistry::event_channel();
        let epoch = self.registry.register(device_id, sender);
        let guard = RegistrationGuard {
            registry: Arc::clone(&self.registry),
            device_id: device_id.to_string(),
            epoch,
        };

        let drained = self.spool.drain(device_id).await?;
        let backlog = if drained.len() > self.config.resync_threshold {
            info!(
                device = %device_id,
                missed = drained.len(),
                "backlog over threshold, requesting a full sync"
            );
            VecDeque::from(vec![SyncEvent::full_sync_required(format!(
                "{} missed updates, full sync required",
                drained.len()
            ))])
        } else {
            VecDeque::from(drained)
        };

        info!(device = %device_id, backlog = backlog.len(), "event stream opened");
        Ok(EventStream {
            backlog,
            live,
            _guard: guard,
        })
    }
}

fn validate_device_id(query: &DeviceQuery) -> ApiResult<&str> {
    match query.device_id.as_deref() {
        None => Err(ApiError::BadRequest("device_id is required".to_string())),
        Some("") => Err(ApiError::BadRequest("device_id must not be empty".to_string())),
        // Device ids name spool directories; keep path metacharacters out.
        Some(id) if id.contains('/') || id.contains('\\') || id.contains("..") => {
            Err(ApiError::BadRequest("device_id contains invalid characters".to_string()))
        }
        Some(id) => Ok(id),
    }
}

/// `GET /api/events` — the subscriber's end of the broadcast.
pub(crate) async fn events(
    State(ctx): State<Arc<SyncContext>>,
    Query(query): Query<DeviceQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let device_id = validate_device_id(&query)?;
    let heartbeat = ctx.config.heartbeat_interval;

    let stream = ctx.subscribe(device_id).await?;
    let frames = futures::StreamExt::map(stream, |event| {
        Ok(Event::default()
            .event(event.name())
            .data(event.payload_json()))
    });

    Ok(Sse::new(frames).keep_alive(KeepAlive::new().interval(heartbeat).text("heartbeat")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(id: Option<&str>) -> DeviceQuery {
        DeviceQuery {
            device_id: id.map(str::to_string),
        }
    }

    #[test]
    fn device_id_is_required() {
        assert!(validate_device_id(&query(None)).is_err());
        assert!(validate_device_id(&query(Some(""))).is_err());
    }

    #[test]
    fn device_id_rejects_path_metacharacters() {
        assert!(validate_device_id(&query(Some("a/b"))).is_err());
        assert!(validate_device_id(&query(Some("a\\b"))).is_err());
        assert!(validate_device_id(&query(Some(".."))).is_err());
    }

    #[test]
    fn device_id_accepts_opaque_tokens() {
        assert_eq!(
            validate_device_id(&query(Some("5f0c2a44-5d6a-4a31-ae2c-0f9d5c9a6f3e"))).unwrap(),
            "5f0c2a44-5d6a-4a31-ae2c-0f9d5c9a6f3e"
        );
    }
}
