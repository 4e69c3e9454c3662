//! Simulation state snapshots and the archive of finished rides.
//!
//! A [`SimulationSnapshot`] is captured after every tick and handed to
//! observers; the same structure answers on-demand state queries.

use std::panic::{catch_unwind, AssertUnwindSafe};

use bevy_ecs::prelude::{Entity, Resource, World};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::clock::SimulationClock;
use crate::ecs::{Leg, Ride, RideId, RidePaths, RideProgress, RideStatus, RideTiming};
use crate::error::{DispatchError, EntityKind, Result};
use crate::matching::{Driver, DriverId, DriverMatcher, RequestId, VehicleType};
use crate::spatial::Coordinate;

/// One ride as seen from outside the simulator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideSnapshot {
    pub ride_id: RideId,
    pub request_id: RequestId,
    pub status: RideStatus,
    pub driver_id: DriverId,
    pub driver_name: String,
    pub driver_location: Coordinate,
    pub pickup: Coordinate,
    pub dropoff: Option<Coordinate>,
    pub leg: Leg,
    pub path_segment: usize,
    pub segment_progress: f64,
    pub estimated_pickup_min: f64,
    pub estimated_fare: f64,
    pub started_at_ms: u64,
    pub pickup_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub cancelled_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverSnapshot {
    pub id: DriverId,
    pub external_id: String,
    pub name: String,
    pub location: Coordinate,
    pub vehicle_type: VehicleType,
}

impl From<&Driver> for DriverSnapshot {
    fn from(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            external_id: driver.external_id.clone(),
            name: driver.name.clone(),
            location: driver.location,
            vehicle_type: driver.vehicle_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimCounts {
    pub active_rides: usize,
    pub completed_rides: usize,
    pub cancelled_rides: usize,
    pub available_drivers: usize,
    pub total_drivers: usize,
}

/// Full simulator state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    pub tick: u64,
    pub sim_time_ms: u64,
    pub timestamp_ms: u64,
    /// `timestamp_ms` as RFC 3339.
    pub timestamp: String,
    /// Non-terminal rides, by ride id.
    pub active_rides: Vec<RideSnapshot>,
    pub available_drivers: Vec<DriverSnapshot>,
    pub counts: SimCounts,
}

/// Final state of a completed or cancelled ride.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideRecord {
    pub ride: RideSnapshot,
    pub archived_at_ms: u64,
}

#[derive(Debug, Default, Resource)]
pub struct RideHistory {
    pub records: Vec<RideRecord>,
}

impl RideHistory {
    pub fn archive(&mut self, record: RideRecord) {
        self.records.push(record);
    }

    pub fn find(&self, ride: RideId) -> Option<&RideRecord> {
        self.records.iter().rev().find(|record| record.ride.ride_id == ride)
    }

    pub fn count(&self, status: RideStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.ride.status == status)
            .count()
    }
}

/// Snapshot of the ride held by `entity`.
pub fn ride_snapshot(world: &World, entity: Entity) -> Result<RideSnapshot> {
    let missing = || DispatchError::not_found(EntityKind::Ride, format!("{entity:?}"));
    let ride = world.get::<Ride>(entity).ok_or_else(missing)?;
    let paths = world.get::<RidePaths>(entity).ok_or_else(missing)?;
    let progress = world.get::<RideProgress>(entity).ok_or_else(missing)?;
    let timing = world.get::<RideTiming>(entity).ok_or_else(missing)?;
    let driver = world.resource::<DriverMatcher>().driver(ride.driver)?;

    Ok(RideSnapshot {
        ride_id: ride.id,
        request_id: ride.request.id,
        status: ride.status,
        driver_id: driver.id,
        driver_name: driver.name.clone(),
        driver_location: progress.position(paths).unwrap_or(driver.location),
        pickup: ride.request.pickup,
        dropoff: ride.request.dropoff,
        leg: progress.leg,
        path_segment: progress.segment,
        segment_progress: progress.fraction,
        estimated_pickup_min: ride.estimated_pickup_min,
        estimated_fare: ride.estimated_fare,
        started_at_ms: timing.started_at_ms,
        pickup_at_ms: timing.pickup_at_ms,
        completed_at_ms: timing.completed_at_ms,
        cancelled_at_ms: timing.cancelled_at_ms,
    })
}

pub fn capture_snapshot(world: &mut World) -> SimulationSnapshot {
    let mut active_rides = Vec::new();
    let mut rides = world.query::<(Entity, &Ride)>();
    let entities: Vec<Entity> = rides
        .iter(world)
        .filter(|(_, ride)| !ride.status.is_terminal())
        .map(|(entity, _)| entity)
        .collect();
    for entity in entities {
        match ride_snapshot(world, entity) {
            Ok(snapshot) => active_rides.push(snapshot),
            Err(err) => warn!(?entity, %err, "skipping ride in snapshot"),
        }
    }
    active_rides.sort_by_key(|ride| ride.ride_id);

    let matcher = world.resource::<DriverMatcher>();
    let available_drivers: Vec<DriverSnapshot> = matcher
        .available_drivers(None)
        .into_iter()
        .map(DriverSnapshot::from)
        .collect();
    let total_drivers = matcher.drivers().len();

    let history = world.resource::<RideHistory>();
    let counts = SimCounts {
        active_rides: active_rides.len(),
        completed_rides: history.count(RideStatus::Completed),
        cancelled_rides: history.count(RideStatus::Cancelled),
        available_drivers: available_drivers.len(),
        total_drivers,
    };

    let clock = world.resource::<SimulationClock>();
    let timestamp_ms = clock.wall_ms();
    SimulationSnapshot {
        tick: clock.ticks(),
        sim_time_ms: clock.now(),
        timestamp_ms,
        timestamp: rfc3339(timestamp_ms),
        active_rides,
        available_drivers,
        counts,
    }
}

fn rfc3339(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|time| time.to_rfc3339())
        .unwrap_or_default()
}

pub type ObserverResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Synchronous per-tick listener.
pub trait SnapshotObserver: Send + Sync {
    fn on_snapshot(&self, snapshot: &SimulationSnapshot) -> ObserverResult;
}

impl<F> SnapshotObserver for F
where
    F: Fn(&SimulationSnapshot) -> ObserverResult + Send + Sync,
{
    fn on_snapshot(&self, snapshot: &SimulationSnapshot) -> ObserverResult {
        self(snapshot)
    }
}

/// Deliver `snapshot` to every observer. Failures and panics are logged and
/// never reach the caller. Returns how many observers failed.
pub fn notify_observers<'a, I, O>(observers: I, snapshot: &SimulationSnapshot) -> usize
where
    I: IntoIterator<Item = &'a O>,
    O: SnapshotObserver + ?Sized + 'a,
{
    let mut failures = 0;
    for observer in observers {
        match catch_unwind(AssertUnwindSafe(|| observer.on_snapshot(snapshot))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                failures += 1;
                warn!(tick = snapshot.tick, %err, "snapshot observer failed");
            }
            Err(_) => {
                failures += 1;
                warn!(tick = snapshot.tick, "snapshot observer panicked");
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_snapshot() -> SimulationSnapshot {
        SimulationSnapshot {
            tick: 3,
            sim_time_ms: 0,
            timestamp_ms: 0,
            timestamp: rfc3339(0),
            active_rides: Vec::new(),
            available_drivers: Vec::new(),
            counts: SimCounts::default(),
        }
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00+00:00");
        assert!(rfc3339(1_700_000_000_123).starts_with("2023-11-14T22:13:20.123"));
    }

    #[test]
    fn failing_observers_do_not_stop_delivery() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let seen = AtomicUsize::new(0);
        let failing = |_: &SimulationSnapshot| -> ObserverResult { Err("disk full".into()) };
        let panicking = |_: &SimulationSnapshot| -> ObserverResult { panic!("observer bug") };
        let counting = |snapshot: &SimulationSnapshot| -> ObserverResult {
            seen.fetch_add(snapshot.tick as usize, Ordering::SeqCst);
            Ok(())
        };
        let observers: [&dyn SnapshotObserver; 3] = [&failing, &panicking, &counting];

        let failures = notify_observers(observers, &empty_snapshot());
        assert_eq!(failures, 2);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
