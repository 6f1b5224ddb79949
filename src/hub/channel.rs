//! Channel-backed hub.
//!
//! Outbound traffic is pushed into a bounded channel and never blocks the
//! coordinator; when the consumer falls behind, messages are dropped and
//! counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use serde_json::Value;
use tracing::warn;

use super::{EventHub, RegionNotification, SharedState};
use crate::error::{MonitorError, MonitorResult};

const STREAM_PATH: &str = "notification_stream";

/// One unit of outbound hub traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Region(RegionNotification),
    SharedState(SharedState),
}

/// An [`EventHub`] that forwards everything to a [`NotificationStream`].
#[derive(Debug)]
pub struct ChannelHub {
    tx: Sender<HubMessage>,
    shared_states: RwLock<HashMap<String, Value>>,
    dropped: AtomicU64,
}

impl ChannelHub {
    /// Create a hub whose stream buffers at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, NotificationStream) {
        let (tx, rx) = bounded(capacity.max(1));
        let hub = Self {
            tx,
            shared_states: RwLock::new(HashMap::new()),
            dropped: AtomicU64::new(0),
        };
        (hub, NotificationStream { rx })
    }

    /// Record another extension's shared state so the monitor can read it.
    pub fn set_shared_state(&self, owner: impl Into<String>, value: Value) {
        let mut states = self
            .shared_states
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.insert(owner.into(), value);
    }

    /// Messages discarded because the stream was full or gone.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, message: HubMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("notification stream full; dropping hub message");
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl EventHub for ChannelHub {
    fn emit_region_event(&self, notification: RegionNotification) {
        self.push(HubMessage::Region(notification));
    }

    fn publish_shared_state(&self, state: SharedState) {
        self.push(HubMessage::SharedState(state));
    }

    fn shared_state(&self, owner: &str) -> Option<Value> {
        let states = self
            .shared_states
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        states.get(owner).cloned()
    }
}

/// Receiving end of a [`ChannelHub`].
#[derive(Debug)]
pub struct NotificationStream {
    rx: Receiver<HubMessage>,
}

impl NotificationStream {
    /// Receive the next message (blocking).
    pub fn recv(&self) -> MonitorResult<HubMessage> {
        self.rx.recv().map_err(|_| MonitorError::Disconnected {
            path: STREAM_PATH.to_string(),
        })
    }

    /// Receive the next message with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> MonitorResult<HubMessage> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => MonitorError::Timeout {
                duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            },
            RecvTimeoutError::Disconnected => MonitorError::Disconnected {
                path: STREAM_PATH.to_string(),
            },
        })
    }

    /// Take a message if one is ready.
    pub fn try_recv(&self) -> MonitorResult<Option<HubMessage>> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MonitorError::Disconnected {
                path: STREAM_PATH.to_string(),
            }),
        }
    }

    /// Everything currently buffered, in order.
    #[must_use]
    pub fn drain(&self) -> Vec<HubMessage> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::policy::{AuthorizationLevel, MonitorMode};
    use crate::region::Region;

    fn region(id: &str) -> Region {
        Region::new(id, Coordinate::new(0.0, 0.0).unwrap(), 100.0).unwrap()
    }

    #[test]
    fn test_messages_arrive_in_order() {
        let (hub, stream) = ChannelHub::new(8);
        hub.emit_region_event(RegionNotification::entry(region("a")));
        hub.publish_shared_state(SharedState::new(
            MonitorMode::CONTINUOUS,
            AuthorizationLevel::Always,
            true,
        ));

        let messages = stream.drain();
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], HubMessage::Region(n) if n.region.id() == "a"));
        assert!(matches!(&messages[1], HubMessage::SharedState(s) if s.is_monitoring_started));
    }

    #[test]
    fn test_full_stream_drops_instead_of_blocking() {
        let (hub, stream) = ChannelHub::new(1);
        hub.emit_region_event(RegionNotification::entry(region("a")));
        hub.emit_region_event(RegionNotification::exit(region("a")));
        assert_eq!(hub.dropped(), 1);
        assert_eq!(stream.drain().len(), 1);
    }

    #[test]
    fn test_recv_timeout_and_disconnect() {
        let (hub, stream) = ChannelHub::new(1);
        let err = stream.recv_timeout(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, MonitorError::Timeout { duration_ms: 5 }));
        assert!(stream.try_recv().unwrap().is_none());

        drop(hub);
        assert!(matches!(stream.recv(), Err(MonitorError::Disconnected { .. })));
    }

    #[test]
    fn test_shared_state_lookup() {
        let (hub, _stream) = ChannelHub::new(1);
        assert!(hub.shared_state("com.adobe.module.configuration").is_none());
        hub.set_shared_state("com.adobe.module.configuration", serde_json::json!({"a": 1}));
        assert_eq!(
            hub.shared_state("com.adobe.module.configuration"),
            Some(serde_json::json!({"a": 1}))
        );
    }
}
