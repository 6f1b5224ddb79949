//! Monitor configuration and the host configuration shared state.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::constants::{self, DEFAULT_MAX_MONITORED_REGION_COUNT};
use crate::error::{MonitorError, MonitorResult};

/// How queued events get drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Drain on the producer's thread; concurrent producers defer to whoever holds the drain.
    #[default]
    Inline,
    /// Drain on a dedicated worker thread woken after every enqueue.
    Worker,
}

/// What the host platform supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformCapabilities {
    /// Native geofence registration.
    pub geofences: bool,
    /// Continuous location updates.
    pub continuous_location: bool,
    /// Significant-change location updates.
    pub significant_location_changes: bool,
    /// "Always" authorization can be granted.
    pub always_authorization: bool,
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self {
            geofences: true,
            continuous_location: true,
            significant_location_changes: true,
            always_authorization: true,
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum concurrently geofenced regions.
    pub max_monitored_regions: usize,
    /// How many nearby POIs to ask for per location update. `None` uses the region cap.
    pub nearby_poi_limit: Option<usize>,
    /// How many drains may retry an event whose persistence failed before it is dropped.
    pub persistence_retry_limit: u32,
    pub drain_mode: DrainMode,
    pub capabilities: PlatformCapabilities,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_monitored_regions: DEFAULT_MAX_MONITORED_REGION_COUNT,
            nearby_poi_limit: None,
            persistence_retry_limit: 3,
            drain_mode: DrainMode::Inline,
            capabilities: PlatformCapabilities::default(),
        }
    }
}

impl MonitorConfig {
    const MAX_NEARBY_POI_LIMIT: usize = 1000;

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidConfig` for a zero region cap or an
    /// out-of-range POI limit.
    pub fn validate(self) -> MonitorResult<Self> {
        if self.max_monitored_regions == 0 {
            return Err(MonitorError::InvalidConfig {
                field: "max_monitored_regions".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(limit) = self.nearby_poi_limit {
            if limit == 0 || limit > Self::MAX_NEARBY_POI_LIMIT {
                return Err(MonitorError::InvalidConfig {
                    field: "nearby_poi_limit".to_string(),
                    reason: format!("must be in [1, {}] (got {limit})", Self::MAX_NEARBY_POI_LIMIT),
                });
            }
        }

        Ok(self)
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidConfig` if the document does not parse or
    /// fails validation.
    pub fn from_json_str(json: &str) -> MonitorResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| MonitorError::InvalidConfig {
            field: "document".to_string(),
            reason: e.to_string(),
        })?;
        cfg.validate()
    }

    /// Effective cap: zero when the platform cannot geofence at all.
    #[must_use]
    pub const fn region_capacity(&self) -> usize {
        if self.capabilities.geofences {
            self.max_monitored_regions
        } else {
            0
        }
    }

    #[must_use]
    pub fn poi_query_limit(&self) -> usize {
        self.nearby_poi_limit.unwrap_or(self.max_monitored_regions)
    }
}

/// Privacy status from the host configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivacyStatus {
    OptedIn,
    OptedOut,
    Unknown,
}

/// Configuration shared state published by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostConfiguration(serde_json::Map<String, serde_json::Value>);

impl HostConfiguration {
    #[must_use]
    pub const fn new(values: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(values)
    }

    /// Builds from a JSON value; anything but an object yields `None`.
    #[must_use]
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }

    /// Privacy status, `Unknown` when absent or unrecognised.
    #[must_use]
    pub fn privacy_status(&self) -> PrivacyStatus {
        match self
            .get_str(constants::configuration::GLOBAL_PRIVACY)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("optedin") => PrivacyStatus::OptedIn,
            Some("optedout") => PrivacyStatus::OptedOut,
            _ => PrivacyStatus::Unknown,
        }
    }
}

/// Latest host configuration, shared between producers and the drain.
///
/// Configuration changes land here directly instead of going through the
/// event queue, so a `Start` waiting at the head of the queue sees them.
#[derive(Debug, Default)]
pub struct ConfigurationSlot {
    current: RwLock<Option<HostConfiguration>>,
}

impl ConfigurationSlot {
    #[must_use]
    pub fn new(initial: Option<HostConfiguration>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn set(&self, config: HostConfiguration) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    }

    #[must_use]
    pub fn current(&self) -> Option<HostConfiguration> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.current.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}
