//! Spatial operations: coordinates, great-circle distances and interpolation.
//!
//! All distances are in kilometres. Straight-line ("by air") estimates that need
//! a duration use the assumed city speed of [`ASSUMED_SPEED_KMH`], which is also
//! the scale the A* time heuristic is built on.

use h3o::LatLng;
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average city speed assumed for straight-line time estimates.
pub const ASSUMED_SPEED_KMH: f64 = 30.0;

/// Minutes needed to cover one kilometre at [`ASSUMED_SPEED_KMH`].
pub const MINUTES_PER_KM: f64 = 60.0 / ASSUMED_SPEED_KMH;

/// A WGS84 latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build a coordinate, rejecting non-finite or out-of-range degrees.
    pub fn validated(lat: f64, lng: f64) -> Result<Self> {
        let ll = LatLng::new(lat, lng).map_err(|err| {
            DispatchError::invalid(format!("malformed coordinate ({lat}, {lng}): {err}"))
        })?;
        if !(-90.0..=90.0).contains(&ll.lat()) || !(-180.0..=180.0).contains(&ll.lng()) {
            return Err(DispatchError::invalid(format!(
                "coordinate ({lat}, {lng}) is outside the valid lat/lng range"
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Check an already-built coordinate (e.g. one deserialized from a request).
    pub fn validate(self) -> Result<Self> {
        Self::validated(self.lat, self.lng)
    }

    /// Great-circle distance to `other` in kilometres.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }

    /// Linear interpolation towards `other`; `t` is clamped to [0, 1].
    pub fn lerp(&self, other: &Coordinate, t: f64) -> Coordinate {
        // Endpoints are returned as-is so a finished segment sits exactly on its node.
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *other;
        }
        Coordinate {
            lat: self.lat + (other.lat - self.lat) * t,
            lng: self.lng + (other.lng - self.lng) * t,
        }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Haversine distance between two lat/lng pairs (degrees) in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lon1) = (lat1.to_radians(), lng1.to_radians());
    let (lat2, lon2) = (lat2.to_radians(), lng2.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Straight-line travel time in minutes at the assumed city speed.
pub fn minutes_at_assumed_speed(distance_km: f64) -> f64 {
    distance_km * MINUTES_PER_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = Coordinate::new(12.9716, 77.5946);
        let b = Coordinate::new(12.9626, 77.6371);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-12);
        assert_eq!(a.distance_km(&a), 0.0);
    }

    #[test]
    fn one_degree_on_equator_is_about_111_km() {
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn triangle_inequality_holds_approximately() {
        let a = Coordinate::new(12.9716, 77.5946);
        let b = Coordinate::new(12.9766, 77.5993);
        let c = Coordinate::new(12.9399, 77.6108);
        assert!(a.distance_km(&c) <= a.distance_km(&b) + b.distance_km(&c) + 1e-9);
    }

    #[test]
    fn validation_rejects_nan_and_out_of_range() {
        assert!(Coordinate::validated(f64::NAN, 0.0).is_err());
        assert!(Coordinate::validated(91.0, 0.0).is_err());
        assert!(Coordinate::validated(0.0, -180.5).is_err());
        assert!(Coordinate::validated(-33.9, 151.2).is_ok());
    }

    #[test]
    fn lerp_clamps_fraction() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(2.0, 4.0);
        assert_eq!(a.lerp(&b, 0.5), Coordinate::new(1.0, 2.0));
        assert_eq!(a.lerp(&b, 3.0), b);
    }

    #[test]
    fn assumed_speed_is_two_minutes_per_km() {
        assert_eq!(minutes_at_assumed_speed(1.5), 3.0);
    }
}
