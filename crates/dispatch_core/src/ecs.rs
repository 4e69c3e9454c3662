//! Ride components and the directory that maps ride and driver handles to
//! entities. Each active ride is one entity.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bevy_ecs::prelude::{Component, Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, EntityKind, Result};
use crate::matching::{DriverId, RideRequest};
use crate::routing::PathDetails;
use crate::spatial::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,
    Accepted,
    DriverEnRoute,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Forward lifecycle edges, plus cancellation from any non-terminal state.
    pub fn can_transition_to(self, next: RideStatus) -> bool {
        use RideStatus::*;
        match (self, next) {
            (from, Cancelled) => !from.is_terminal(),
            (Requested, Accepted)
            | (Accepted, DriverEnRoute)
            | (DriverEnRoute, Arrived)
            | (Arrived, InProgress)
            | (InProgress, Completed) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::Accepted => "accepted",
            RideStatus::DriverEnRoute => "driver_en_route",
            RideStatus::Arrived => "arrived",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        use RideStatus::*;
        [Requested, Accepted, DriverEnRoute, Arrived, InProgress, Completed, Cancelled]
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| DispatchError::invalid(format!("unknown ride status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RideId(pub u64);

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ride-{}", self.0)
    }
}

#[derive(Debug, Clone, Component)]
pub struct Ride {
    pub id: RideId,
    pub request: Arc<RideRequest>,
    pub driver: DriverId,
    pub status: RideStatus,
    /// Route ETA to pickup at confirmation, including the last-mile leg.
    pub estimated_pickup_min: f64,
    pub estimated_fare: f64,
}

impl Ride {
    /// Move to `next`, failing when the lifecycle does not allow it.
    pub fn transition(&mut self, next: RideStatus) -> Result<RideStatus> {
        if !self.status.can_transition_to(next) {
            return Err(DispatchError::precondition(format!(
                "{} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        Ok(std::mem::replace(&mut self.status, next))
    }
}

/// Which of the two ride paths the cursor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    ToPickup,
    ToDropoff,
}

#[derive(Debug, Clone, Component)]
pub struct RidePaths {
    pub to_pickup: PathDetails,
    pub to_dropoff: PathDetails,
}

impl RidePaths {
    pub fn leg(&self, leg: Leg) -> &PathDetails {
        match leg {
            Leg::ToPickup => &self.to_pickup,
            Leg::ToDropoff => &self.to_dropoff,
        }
    }
}

/// Cursor over the current leg: segment index plus fraction of that segment
/// covered, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct RideProgress {
    pub leg: Leg,
    pub segment: usize,
    pub fraction: f64,
    /// Great-circle distance covered on this leg so far.
    pub leg_traveled_km: f64,
}

impl RideProgress {
    pub fn start(leg: Leg) -> Self {
        Self {
            leg,
            segment: 0,
            fraction: 0.0,
            leg_traveled_km: 0.0,
        }
    }

    /// Interpolated position on the current segment. A single-node path sits
    /// on its node.
    pub fn position(&self, paths: &RidePaths) -> Option<Coordinate> {
        let nodes = &paths.leg(self.leg).nodes;
        match nodes.len() {
            0 => None,
            1 => Some(nodes[0].coordinate()),
            len => {
                let segment = self.segment.min(len - 2);
                let from = nodes[segment].coordinate();
                let to = nodes[segment + 1].coordinate();
                Some(from.lerp(&to, self.fraction))
            }
        }
    }
}

/// Lifecycle timestamps. `*_ms` fields are wall-clock milliseconds;
/// `arrived_sim_ms` is simulated time and drives the pickup dwell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Component)]
pub struct RideTiming {
    pub started_at_ms: u64,
    pub arrived_at_ms: Option<u64>,
    pub arrived_sim_ms: Option<u64>,
    pub pickup_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub cancelled_at_ms: Option<u64>,
}

impl RideTiming {
    pub fn started(wall_ms: u64) -> Self {
        Self {
            started_at_ms: wall_ms,
            ..Self::default()
        }
    }
}

/// Active rides by id, and which ride each busy driver is assigned to.
#[derive(Debug, Default, Resource)]
pub struct RideDirectory {
    rides: HashMap<RideId, Entity>,
    assignments: HashMap<DriverId, RideId>,
    next_id: u64,
}

impl RideDirectory {
    pub fn allocate_id(&mut self) -> RideId {
        self.next_id += 1;
        RideId(self.next_id)
    }

    pub fn insert(&mut self, ride: RideId, driver: DriverId, entity: Entity) {
        self.rides.insert(ride, entity);
        self.assignments.insert(driver, ride);
    }

    pub fn entity(&self, ride: RideId) -> Result<Entity> {
        self.rides
            .get(&ride)
            .copied()
            .ok_or_else(|| DispatchError::not_found(EntityKind::Ride, ride))
    }

    pub fn contains(&self, ride: RideId) -> bool {
        self.rides.contains_key(&ride)
    }

    pub fn ride_for_driver(&self, driver: DriverId) -> Option<RideId> {
        self.assignments.get(&driver).copied()
    }

    pub fn remove(&mut self, ride: RideId, driver: DriverId) {
        self.rides.remove(&ride);
        if self.assignments.get(&driver) == Some(&ride) {
            self.assignments.remove(&driver);
        }
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_only_moves_forward() {
        use RideStatus::*;
        assert!(Requested.can_transition_to(Accepted));
        assert!(DriverEnRoute.can_transition_to(Arrived));
        assert!(!DriverEnRoute.can_transition_to(InProgress));
        assert!(!Arrived.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
    }

    #[test]
    fn cancellation_only_from_non_terminal_states() {
        use RideStatus::*;
        for status in [Requested, Accepted, DriverEnRoute, Arrived, InProgress] {
            assert!(status.can_transition_to(Cancelled), "{status}");
        }
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(
            "driver_en_route".parse::<RideStatus>().expect("status"),
            RideStatus::DriverEnRoute
        );
        assert_eq!(RideStatus::InProgress.to_string(), "in_progress");
        assert!("teleported".parse::<RideStatus>().is_err());
    }

    #[test]
    fn directory_tracks_assignments() {
        let mut world = bevy_ecs::world::World::new();
        let entity = world.spawn_empty().id();
        let mut directory = RideDirectory::default();
        let ride = directory.allocate_id();
        let driver = DriverId(7);
        directory.insert(ride, driver, entity);

        assert_eq!(directory.entity(ride).expect("entity"), entity);
        assert_eq!(directory.ride_for_driver(driver), Some(ride));
        directory.remove(ride, driver);
        assert!(directory.entity(ride).is_err_and(|e| e.is_not_found()));
        assert_eq!(directory.ride_for_driver(driver), None);
    }
}
