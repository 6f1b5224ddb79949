//! Location services port.
//!
//! The coordinator owns exactly one provider handle and is the only caller of
//! its command methods. Asynchronous callbacks (fixes, region transitions,
//! authorization changes) flow back through the [`EventSink`] handed to
//! [`LocationProvider::bind`], from whatever thread the platform uses.

use crate::event::Event;
use crate::geo::Coordinate;
use crate::monitor::EventSink;
use crate::policy::{AuthorizationLevel, AuthorizationStatus};
use crate::region::Region;

/// Platform location services as seen by the coordinator.
pub trait LocationProvider: Send {
    /// Receive the sink callbacks should be delivered to. Called once, before
    /// any other method.
    fn bind(&mut self, sink: EventSink) {
        let _ = sink;
    }

    /// Current OS authorization.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Whether the host app is in the foreground; prompts need it.
    fn is_foreground(&self) -> bool;

    fn start_continuous(&mut self);

    fn start_significant_changes(&mut self);

    /// Stop all location updates. Registered regions are left alone.
    fn stop(&mut self);

    fn request_one_shot_fix(&mut self);

    fn register_region(&mut self, region: &Region);

    fn unregister_region(&mut self, region: &Region);

    /// Ask the OS to prompt for `level`.
    fn request_authorization(&mut self, level: AuthorizationLevel);
}

/// Helpers platform glue can use to forward callbacks.
pub trait ProviderCallbacks {
    fn on_location(&self, location: Coordinate) -> bool;
    fn on_region_enter(&self, region: Region) -> bool;
    fn on_region_exit(&self, region: Region) -> bool;
    fn on_authorization_changed(&self, status: AuthorizationStatus) -> bool;
}

impl ProviderCallbacks for EventSink {
    fn on_location(&self, location: Coordinate) -> bool {
        self.dispatch(Event::LocationUpdated(location))
    }

    fn on_region_enter(&self, region: Region) -> bool {
        self.dispatch(Event::RegionEntered(region))
    }

    fn on_region_exit(&self, region: Region) -> bool {
        self.dispatch(Event::RegionExited(region))
    }

    fn on_authorization_changed(&self, status: AuthorizationStatus) -> bool {
        self.dispatch(Event::AuthorizationChanged(status))
    }
}
