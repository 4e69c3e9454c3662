use bevy_ecs::prelude::{Entity, World};
use tracing::{info, warn};

use crate::clock::SimulationClock;
use crate::config::DispatchConfig;
use crate::ecs::{Ride, RideDirectory, RideStatus, RideTiming};
use crate::error::{DispatchError, EntityKind, Result};
use crate::matching::{DriverMatcher, DriverStatus};
use crate::telemetry::{ride_snapshot, RideHistory, RideRecord};

/// Release the ride's driver, move the ride into [`RideHistory`] and despawn
/// it. Completed rides add one to the driver's trip count.
pub fn archive_ride(world: &mut World, entity: Entity, wall_ms: u64) -> Result<RideRecord> {
    let snapshot = ride_snapshot(world, entity)?;
    let ride = world
        .get::<Ride>(entity)
        .cloned()
        .ok_or_else(|| DispatchError::not_found(EntityKind::Ride, snapshot.ride_id))?;

    {
        let mut matcher = world.resource_mut::<DriverMatcher>();
        matcher.update_driver_status(ride.driver, DriverStatus::Available)?;
        if ride.status == RideStatus::Completed {
            matcher.record_trip(ride.driver)?;
        }
    }
    world
        .resource_mut::<RideDirectory>()
        .remove(ride.id, ride.driver);
    world.despawn(entity);

    let record = RideRecord {
        ride: snapshot,
        archived_at_ms: wall_ms,
    };
    world.resource_mut::<RideHistory>().archive(record.clone());
    info!(ride = %ride.id, driver = %ride.driver, status = %ride.status, "ride archived");
    Ok(record)
}

/// Archives automatically completed rides once strictly more than the release
/// grace (wall clock) has passed since completion.
pub fn trip_completed_system(world: &mut World) {
    let wall_ms = world.resource::<SimulationClock>().wall_ms();
    let grace_ms = world.resource::<DispatchConfig>().release_grace_ms();

    let mut rides = world.query::<(Entity, &Ride, &RideTiming)>();
    let ready: Vec<Entity> = rides
        .iter(world)
        .filter(|(_, ride, timing)| {
            ride.status == RideStatus::Completed
                && timing
                    .completed_at_ms
                    .is_some_and(|done| wall_ms.saturating_sub(done) > grace_ms)
        })
        .map(|(entity, _, _)| entity)
        .collect();

    for entity in ready {
        if let Err(err) = archive_ride(world, entity, wall_ms) {
            warn!(?entity, %err, "could not archive completed ride");
        }
    }
}
