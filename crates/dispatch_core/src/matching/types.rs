use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};
use crate::graph::NodeIndex;
use crate::spatial::Coordinate;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Mini,
    #[default]
    Sedan,
    Premium,
    Suv,
    Xl,
}

impl VehicleType {
    pub const ALL: [VehicleType; 5] = [
        VehicleType::Mini,
        VehicleType::Sedan,
        VehicleType::Premium,
        VehicleType::Suv,
        VehicleType::Xl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VehicleType::Mini => "mini",
            VehicleType::Sedan => "sedan",
            VehicleType::Premium => "premium",
            VehicleType::Suv => "suv",
            VehicleType::Xl => "xl",
        }
    }
}

impl FromStr for VehicleType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        VehicleType::ALL
            .into_iter()
            .find(|vehicle| vehicle.as_str() == wanted)
            .ok_or_else(|| DispatchError::invalid(format!("unknown vehicle type '{s}'")))
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    #[default]
    Available,
    Busy,
    Offline,
    OnTrip,
    OnBreak,
}

impl DriverStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverStatus::Available => "available",
            DriverStatus::Busy => "busy",
            DriverStatus::Offline => "offline",
            DriverStatus::OnTrip => "on_trip",
            DriverStatus::OnBreak => "on_break",
        }
    }
}

impl FromStr for DriverStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(DriverStatus::Available),
            "busy" => Ok(DriverStatus::Busy),
            "offline" => Ok(DriverStatus::Offline),
            "on_trip" => Ok(DriverStatus::OnTrip),
            "on_break" => Ok(DriverStatus::OnBreak),
            _ => Err(DispatchError::invalid(format!("unknown driver status '{s}'"))),
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle of a driver inside one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub(crate) u32);

impl DriverId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "driver#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request-{}", self.0)
    }
}

/// A registered driver. `nearest_node` is derived from `location` and is
/// refreshed on every location update.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub id: DriverId,
    pub external_id: String,
    pub name: String,
    pub location: Coordinate,
    pub nearest_node: NodeIndex,
    pub status: DriverStatus,
    pub vehicle_type: VehicleType,
    pub rating: f64,
    pub total_trips: u32,
}

impl Driver {
    pub fn is_available(&self) -> bool {
        self.status == DriverStatus::Available
    }
}

/// Registration data for a driver; the registry derives the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub external_id: String,
    pub name: String,
    pub location: Coordinate,
    #[serde(default)]
    pub vehicle_type: VehicleType,
    #[serde(default = "default_rating")]
    pub rating: f64,
    #[serde(default)]
    pub total_trips: u32,
    #[serde(default)]
    pub status: DriverStatus,
}

fn default_rating() -> f64 {
    4.5
}

impl DriverProfile {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            location,
            vehicle_type: VehicleType::default(),
            rating: default_rating(),
            total_trips: 0,
            status: DriverStatus::Available,
        }
    }

    pub fn with_vehicle_type(mut self, vehicle_type: VehicleType) -> Self {
        self.vehicle_type = vehicle_type;
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = rating;
        self
    }

    pub fn with_total_trips(mut self, total_trips: u32) -> Self {
        self.total_trips = total_trips;
        self
    }

    pub fn with_status(mut self, status: DriverStatus) -> Self {
        self.status = status;
        self
    }
}

impl From<&Driver> for DriverProfile {
    fn from(driver: &Driver) -> Self {
        Self {
            external_id: driver.external_id.clone(),
            name: driver.name.clone(),
            location: driver.location,
            vehicle_type: driver.vehicle_type,
            rating: driver.rating,
            total_trips: driver.total_trips,
            status: driver.status,
        }
    }
}

/// A rider's request with its nearest graph nodes resolved once at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRequest {
    pub id: RequestId,
    pub user_id: String,
    pub pickup: Coordinate,
    pub dropoff: Option<Coordinate>,
    pub pickup_node: NodeIndex,
    pub dropoff_node: Option<NodeIndex>,
    pub vehicle_type: VehicleType,
    pub created_at_ms: u64,
}

/// One ranked driver for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub driver_id: DriverId,
    pub driver_name: String,
    pub rating: f64,
    pub vehicle_type: VehicleType,
    pub total_trips: u32,
    pub location: Coordinate,
    /// Straight-line distance used by the pre-filter.
    pub direct_distance_km: f64,
    /// Route plus last-mile distance.
    pub route_distance_km: f64,
    pub route_time_min: f64,
    pub eta_minutes: u32,
    pub estimated_fare: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_sets_case_insensitively() {
        assert_eq!("SUV".parse::<VehicleType>().expect("suv"), VehicleType::Suv);
        assert_eq!(" xl ".parse::<VehicleType>().expect("xl"), VehicleType::Xl);
        assert!("rickshaw".parse::<VehicleType>().is_err());

        assert_eq!("on_break".parse::<DriverStatus>().expect("status"), DriverStatus::OnBreak);
        assert!(matches!(
            "sleeping".parse::<DriverStatus>(),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn statuses_round_trip_through_display() {
        for status in [
            DriverStatus::Available,
            DriverStatus::Busy,
            DriverStatus::Offline,
            DriverStatus::OnTrip,
            DriverStatus::OnBreak,
        ] {
            assert_eq!(status.to_string().parse::<DriverStatus>().expect("parse"), status);
        }
    }

    #[test]
    fn profile_defaults_match_a_fresh_sedan_driver() {
        let profile = DriverProfile::new("d-1", "Asha", Coordinate::new(12.97, 77.59));
        assert_eq!(profile.vehicle_type, VehicleType::Sedan);
        assert_eq!(profile.status, DriverStatus::Available);
        assert_eq!(profile.rating, 4.5);
        assert_eq!(profile.total_trips, 0);
    }
}
