//! Host event hub port.
//!
//! The hub delivers tagged inbound envelopes to the monitor and receives the
//! monitor's outbound traffic: region entry/exit notifications and the
//! shared-state record other extensions read. The monitor never depends on
//! how the hub dispatches internally.

/// Ready-made hub that streams outbound traffic over a channel.
pub mod channel;
/// Inbound envelope classification and decoding.
pub mod envelope;
/// Outbound notification and shared-state types.
pub mod outbound;

pub use channel::{ChannelHub, HubMessage, NotificationStream};
pub use envelope::{EventTag, InboundEnvelope};
pub use outbound::{RegionEventType, RegionNotification, SharedState};

/// Outbound side of the host event hub.
pub trait EventHub: Send + Sync {
    /// Publish a region entry or exit.
    fn emit_region_event(&self, notification: RegionNotification);

    /// Replace this extension's shared state.
    fn publish_shared_state(&self, state: SharedState);

    /// Read another extension's shared state, if it has published one.
    fn shared_state(&self, owner: &str) -> Option<serde_json::Value> {
        let _ = owner;
        None
    }
}
