//! Geographic coordinates and great-circle distance.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Degrees to radians conversion factor.
const DEG_TO_RAD: f64 = PI / 180.0;

/// A WGS-84 position in decimal degrees.
///
/// # Examples
///
/// ```
/// use places_monitor::Coordinate;
///
/// let sf = Coordinate::new(37.7749, -122.4194).unwrap();
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// assert_eq!(sf.distance_to(&sf), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`.
    pub latitude: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate, rejecting out-of-range or non-finite values.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidEvent` when either component is outside
    /// its valid range.
    pub fn new(latitude: f64, longitude: f64) -> MonitorResult<Self> {
        let coordinate = Self { latitude, longitude };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Checks that both components are finite and in range.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::InvalidEvent` describing the offending component.
    pub fn validate(&self) -> MonitorResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(MonitorError::invalid_event(format!(
                "latitude {} is out of range [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(MonitorError::invalid_event(format!(
                "longitude {} is out of range [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }

    /// Great-circle distance in metres (haversine).
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let lat1 = self.latitude * DEG_TO_RAD;
        let lat2 = other.latitude * DEG_TO_RAD;
        let d_lat = (other.latitude - self.latitude) * DEG_TO_RAD;
        let d_lon = (other.longitude - self.longitude) * DEG_TO_RAD;

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}
