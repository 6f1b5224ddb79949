//! Wire-level names shared with the host event hub and the settings store.

/// Extension version reported by [`crate::PlacesMonitor::extension_version`].
pub const EXTENSION_VERSION: &str = "2.1.4";
/// Name the extension registers under; also the shared-state owner.
pub const EXTENSION_NAME: &str = "com.adobe.placesMonitor";
/// Platform ceiling on concurrently geofenced regions.
pub const DEFAULT_MAX_MONITORED_REGION_COUNT: usize = 20;

/// Settings-store keys.
pub mod settings {
    pub const MONITORED_REGIONS: &str = "acpplacesmonitor.monitoredregions";
    pub const USER_WITHIN_REGIONS: &str = "acpplacesmonitor.userwithinregions";
    pub const MONITOR_MODE: &str = "acpplacesmonitor.monitormode";
    pub const REQUEST_AUTHORIZATION_LEVEL: &str = "acpplacesmonitor.requestauthorizationlevel";
    pub const IS_MONITORING_STARTED: &str = "acpplacesmonitor.ismonitoringstarted";

    /// Every key owned by the monitor, in a stable order.
    pub const ALL: [&str; 5] = [
        MONITORED_REGIONS,
        USER_WITHIN_REGIONS,
        MONITOR_MODE,
        REQUEST_AUTHORIZATION_LEVEL,
        IS_MONITORING_STARTED,
    ];
}

/// Hub event sources.
pub mod source {
    pub const RESPONSE_CONTENT: &str = "com.adobe.eventSource.responseContent";
    pub const REQUEST_CONTENT: &str = "com.adobe.eventSource.requestContent";
    pub const SHARED_STATE: &str = "com.adobe.eventSource.sharedState";
}

/// Hub event types.
pub mod event_type {
    pub const HUB: &str = "com.adobe.eventType.hub";
    pub const MONITOR: &str = "com.adobe.eventType.placesMonitor";
    pub const PLACES: &str = "com.adobe.eventType.places";
    pub const RULES: &str = "com.adobe.eventType.rulesEngine";
}

/// Hub event names and payload keys.
pub mod event {
    pub const NAME_START: &str = "start monitoring";
    pub const NAME_STOP: &str = "stop monitoring";
    pub const NAME_UPDATE_LOCATION_NOW: &str = "update location now";
    pub const NAME_UPDATE_MONITOR_CONFIGURATION: &str = "update monitor configuration";
    pub const NAME_SET_REQUEST_AUTHORIZATION_LEVEL: &str = "set request authorization level";
    pub const NAME_REGION_EVENT: &str = "places monitor region event";
    pub const NAME_SHARED_STATE: &str = "places monitor shared state";

    pub const DATA_MONITOR_MODE: &str = "monitormode";
    pub const DATA_REQUEST_AUTHORIZATION_LEVEL: &str = "requestauthorizationlevel";
    pub const DATA_CLEAR: &str = "clearclientdata";
    pub const DATA_IS_MONITORING_STARTED: &str = "ismonitoringstarted";
    pub const DATA_STATE_OWNER: &str = "stateowner";
}

/// Shared-state owners the monitor reads.
pub mod shared_state {
    pub const CONFIGURATION: &str = "com.adobe.module.configuration";
    pub const PLACES: &str = "com.adobe.module.places";
}

/// Rules-engine consequence keys.
pub mod rules {
    pub const TRIGGERED_CONSEQUENCE: &str = "triggeredconsequence";
    pub const CONSEQUENCE_TYPE: &str = "type";
    pub const CONSEQUENCE_DETAIL: &str = "detail";
}

/// Host configuration keys.
pub mod configuration {
    pub const GLOBAL_PRIVACY: &str = "global.privacy";
}
