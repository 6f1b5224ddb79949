use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{event, EXTENSION_NAME};
use crate::policy::{AuthorizationLevel, MonitorMode};
use crate::region::Region;

/// Direction of a region transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionEventType {
    Entry,
    Exit,
}

/// A region entry or exit, as published to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionNotification {
    pub event_id: Uuid,
    pub region: Region,
    pub event_type: RegionEventType,
    pub timestamp: DateTime<Utc>,
}

impl RegionNotification {
    #[must_use]
    pub fn new(region: Region, event_type: RegionEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            region,
            event_type,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn entry(region: Region) -> Self {
        Self::new(region, RegionEventType::Entry)
    }

    #[must_use]
    pub fn exit(region: Region) -> Self {
        Self::new(region, RegionEventType::Exit)
    }

    /// Hub event name for region notifications.
    #[must_use]
    pub const fn event_name() -> &'static str {
        event::NAME_REGION_EVENT
    }
}

/// The monitor's shared-state record.
///
/// Field names on the wire match the hub's `stateowner` / `monitormode` /
/// `requestauthorizationlevel` / `ismonitoringstarted` keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedState {
    #[serde(rename = "stateowner")]
    pub state_owner: String,
    #[serde(rename = "monitormode")]
    pub monitor_mode: MonitorMode,
    #[serde(rename = "requestauthorizationlevel")]
    pub authorization_level: AuthorizationLevel,
    #[serde(rename = "ismonitoringstarted")]
    pub is_monitoring_started: bool,
}

impl SharedState {
    #[must_use]
    pub fn new(monitor_mode: MonitorMode, authorization_level: AuthorizationLevel, is_monitoring_started: bool) -> Self {
        Self {
            state_owner: EXTENSION_NAME.to_string(),
            monitor_mode,
            authorization_level,
            is_monitoring_started,
        }
    }

    /// The record as a hub event payload.
    #[must_use]
    pub fn to_event_data(&self) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        data.insert(event::DATA_STATE_OWNER.to_string(), self.state_owner.clone().into());
        data.insert(event::DATA_MONITOR_MODE.to_string(), self.monitor_mode.bits().into());
        data.insert(
            event::DATA_REQUEST_AUTHORIZATION_LEVEL.to_string(),
            self.authorization_level.to_string().into(),
        );
        data.insert(
            event::DATA_IS_MONITORING_STARTED.to_string(),
            self.is_monitoring_started.into(),
        );
        serde_json::Value::Object(data)
    }

    /// Hub event name for a shared-state publication.
    #[must_use]
    pub const fn event_name() -> &'static str {
        event::NAME_SHARED_STATE
    }
}
