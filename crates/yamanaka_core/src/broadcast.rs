//! Event fan-out with slow-consumer and offline policy.

use crate::registry::ClientRegistry;
use crate::spool::EventSpool;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use yamanaka_protocol::SyncEvent;

/// Delivers events to every tracked device except the sender.
///
/// Live subscribers get a non-blocking send on their channel; anyone else —
/// offline devices and subscribers whose channel is full — gets the event
/// spooled for replay on their next connection. A stalled reader can
/// therefore never block a mutation.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    spool: Arc<EventSpool>,
}

impl Broadcaster {
    /// Creates a broadcaster over the given membership and spool.
    pub fn new(registry: Arc<ClientRegistry>, spool: Arc<EventSpool>) -> Self {
        Self { registry, spool }
    }

    /// Fans one event out to every tracked device except `sender_id`.
    ///
    /// The registry lock is held only for the channel sends; spool writes
    /// happen after it is released.
    pub async fn broadcast(&self, sender_id: &str, event: &SyncEvent) {
        debug!(event = event.name(), sender = %sender_id, "broadcasting");

        let to_spool: Vec<String> = {
            let membership = self.registry.membership();
            let mut spill = Vec::new();

            for device_id in membership.tracked.keys() {
                if device_id == sender_id {
                    continue;
                }
                match membership.active.get(device_id) {
                    Some(device) => match device.sender.try_send(event.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(device = %device_id, event = event.name(), "live channel full, spooling event");
                            spill.push(device_id.clone());
                        }
                        Err(TrySendError::Closed(_)) => spill.push(device_id.clone()),
                    },
                    None => spill.push(device_id.clone()),
                }
            }
            spill
        };

        for device_id in to_spool {
            if let Err(err) = self.spool.append(&device_id, event).await {
                warn!(device = %device_id, %err, "could not spool missed event, dropping it");
            }
        }
    }
}
