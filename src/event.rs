//! Inbound units of work for the coordinator.

use serde::{Deserialize, Serialize};

use crate::config::HostConfiguration;
use crate::geo::Coordinate;
use crate::policy::{AuthorizationLevel, AuthorizationStatus, MonitorMode};
use crate::region::Region;

/// Outcome of a nearby-POI query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlacesResponse {
    /// POIs near `location`.
    Nearby {
        location: Coordinate,
        #[serde(default)]
        regions: Vec<Region>,
    },
    /// The service could not answer.
    Failed {
        location: Coordinate,
        reason: String,
    },
}

impl PlacesResponse {
    #[must_use]
    pub const fn location(&self) -> Coordinate {
        match self {
            Self::Nearby { location, .. } | Self::Failed { location, .. } => *location,
        }
    }
}

/// An inbound event.
///
/// Events from one producer keep their arrival order; nothing is assumed
/// about ordering across producers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start,
    Stop {
        clear_data: bool,
    },
    UpdateLocationNow,
    SetMode(MonitorMode),
    SetAuthorizationLevel(AuthorizationLevel),
    ConfigurationChanged(HostConfiguration),
    LocationUpdated(Coordinate),
    RegionEntered(Region),
    RegionExited(Region),
    AuthorizationChanged(AuthorizationStatus),
    PlacesResponse(PlacesResponse),
}

impl Event {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop { .. } => "stop",
            Self::UpdateLocationNow => "update_location_now",
            Self::SetMode(_) => "set_mode",
            Self::SetAuthorizationLevel(_) => "set_authorization_level",
            Self::ConfigurationChanged(_) => "configuration_changed",
            Self::LocationUpdated(_) => "location_updated",
            Self::RegionEntered(_) => "region_entered",
            Self::RegionExited(_) => "region_exited",
            Self::AuthorizationChanged(_) => "authorization_changed",
            Self::PlacesResponse(_) => "places_response",
        }
    }
}
