//! Points of interest and geofenced regions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};
use crate::geo::Coordinate;

/// Where a region definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegionSource {
    /// Returned by the most recent nearby-POI query.
    #[default]
    PlacesQuery,
    /// Any other origin, e.g. a geofence the host app registered itself.
    Other,
}

/// A circular region around a point of interest.
///
/// Regions are immutable once built; reconciliation replaces them wholesale.
/// Identity is the identifier alone.
///
/// # Examples
///
/// ```
/// use places_monitor::{Coordinate, Region};
///
/// let center = Coordinate::new(37.33, -121.89).unwrap();
/// let region = Region::new("poi-1", center, 150.0).unwrap();
/// assert_eq!(region.id(), "poi-1");
/// assert!(region.contains(&center));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    id: String,
    center: Coordinate,
    radius: f64,
    #[serde(default)]
    source: RegionSource,
}

impl Region {
    /// Creates a region sourced from a places query.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidEvent` for an empty identifier, an invalid
    /// center, or a radius that is not finite and positive.
    pub fn new(id: impl Into<String>, center: Coordinate, radius: f64) -> MonitorResult<Self> {
        Self::with_source(id, center, radius, RegionSource::PlacesQuery)
    }

    /// Creates a region with an explicit source.
    ///
    /// # Errors
    ///
    /// Same as [`Region::new`].
    pub fn with_source(
        id: impl Into<String>,
        center: Coordinate,
        radius: f64,
        source: RegionSource,
    ) -> MonitorResult<Self> {
        let region = Self {
            id: id.into().trim().to_string(),
            center,
            radius,
            source,
        };
        region.validate()?;
        Ok(region)
    }

    /// Checks the invariants a deserialized region must also satisfy.
    ///
    /// # Errors
    ///
    /// Same as [`Region::new`].
    pub fn validate(&self) -> MonitorResult<()> {
        if self.id.trim().is_empty() {
            return Err(MonitorError::invalid_event("region identifier cannot be empty"));
        }
        self.center.validate()?;
        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(MonitorError::invalid_event(format!(
                "region '{}' has invalid radius {}",
                self.id, self.radius
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn center(&self) -> Coordinate {
        self.center
    }

    /// Radius in metres.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    #[must_use]
    pub const fn source(&self) -> RegionSource {
        self.source
    }

    /// Distance in metres from `location` to the region center.
    #[must_use]
    pub fn distance_from(&self, location: &Coordinate) -> f64 {
        self.center.distance_to(location)
    }

    /// True if `location` lies within the radius.
    #[must_use]
    pub fn contains(&self, location: &Coordinate) -> bool {
        self.distance_from(location) <= self.radius
    }

    /// True if both regions have the same identifier and the same geofence.
    ///
    /// `==` compares identifiers only; use this to detect a POI whose
    /// geometry changed.
    #[must_use]
    pub fn same_definition(&self, other: &Self) -> bool {
        self.id == other.id
            && self.center == other.center
            && self.radius.to_bits() == other.radius.to_bits()
            && self.source == other.source
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Region {}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} r={:.0}m", self.id, self.center, self.radius)
    }
}
