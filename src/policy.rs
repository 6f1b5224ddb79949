//! Monitoring mode and authorization policy.
//!
//! These types are small and serializable so they can be persisted in the
//! settings store and published in the shared-state record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PlatformCapabilities;

/// Set of location-monitoring flags.
///
/// Stored as raw bits so the persisted form matches what the hub sends in
/// `monitormode` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorMode(u8);

impl MonitorMode {
    /// Location updates roughly once per second.
    pub const CONTINUOUS: Self = Self(1 << 0);
    /// Updates only after the device moves a significant distance.
    pub const SIGNIFICANT_CHANGES: Self = Self(1 << 1);

    const KNOWN_BITS: u8 = Self::CONTINUOUS.0 | Self::SIGNIFICANT_CHANGES.0;

    /// Builds a mode from raw bits, discarding unknown flags.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::KNOWN_BITS)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The strategy the provider should actually run.
    ///
    /// Continuous wins when both flags are set; an empty set falls back to
    /// significant changes.
    #[must_use]
    pub const fn strategy(self) -> MonitoringStrategy {
        if self.contains(Self::CONTINUOUS) {
            MonitoringStrategy::Continuous
        } else {
            MonitoringStrategy::SignificantChanges
        }
    }
}

impl Default for MonitorMode {
    fn default() -> Self {
        Self::SIGNIFICANT_CHANGES
    }
}

impl std::ops::BitOr for MonitorMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The single active location strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringStrategy {
    Continuous,
    SignificantChanges,
}

impl MonitoringStrategy {
    /// Adjusts the strategy to what the platform can run, if anything.
    #[must_use]
    pub const fn supported_on(self, capabilities: &PlatformCapabilities) -> Option<Self> {
        match self {
            Self::SignificantChanges if capabilities.significant_location_changes => {
                Some(Self::SignificantChanges)
            }
            Self::Continuous | Self::SignificantChanges if capabilities.continuous_location => {
                Some(Self::Continuous)
            }
            _ => None,
        }
    }
}

/// Requested location authorization, ordered `WhenInUse < Always`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationLevel {
    WhenInUse,
    #[default]
    Always,
}

impl AuthorizationLevel {
    /// Clamps to what the platform can grant.
    #[must_use]
    pub const fn clamp_to(self, capabilities: &PlatformCapabilities) -> Self {
        if capabilities.always_authorization {
            self
        } else {
            Self::WhenInUse
        }
    }

    /// Parses the hub form: `"wheninuse"` / `"always"` or the numeric `0` / `1`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "wheninuse" | "when_in_use" => Some(Self::WhenInUse),
                "always" => Some(Self::Always),
                _ => None,
            },
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Self::WhenInUse),
                Some(1) => Some(Self::Always),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for AuthorizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WhenInUse => f.write_str("wheninuse"),
            Self::Always => f.write_str("always"),
        }
    }
}

/// Authorization as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    #[default]
    NotDetermined,
    /// Denied by the user or restricted by device policy.
    Denied,
    Granted(AuthorizationLevel),
}

impl AuthorizationStatus {
    #[must_use]
    pub const fn granted(self) -> Option<AuthorizationLevel> {
        match self {
            Self::Granted(level) => Some(level),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

/// Decides whether a new authorization request should replace the persisted target.
///
/// Only strict upgrades over what the OS has granted, or over the level the
/// user already denied, are accepted. With nothing decided yet any change of
/// target is accepted.
#[must_use]
pub fn accepts_authorization_request(
    requested: AuthorizationLevel,
    persisted: AuthorizationLevel,
    status: AuthorizationStatus,
) -> bool {
    match status {
        AuthorizationStatus::Granted(granted) => requested > granted,
        AuthorizationStatus::Denied => requested > persisted,
        AuthorizationStatus::NotDetermined => requested != persisted,
    }
}

/// Whether monitoring has been started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    #[default]
    NotStarted,
    Started,
}

impl MonitorStatus {
    #[must_use]
    pub const fn is_started(self) -> bool {
        matches!(self, Self::Started)
    }

    #[must_use]
    pub const fn from_started(started: bool) -> Self {
        if started {
            Self::Started
        } else {
            Self::NotStarted
        }
    }
}
