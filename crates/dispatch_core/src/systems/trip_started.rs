use bevy_ecs::prelude::{Query, Res};
use tracing::{info, warn};

use crate::clock::SimulationClock;
use crate::config::DispatchConfig;
use crate::ecs::{Leg, Ride, RideProgress, RideStatus, RideTiming};
use crate::error::Result;

/// Pick the rider up: `Arrived -> InProgress`, switch to the dropoff path and
/// reset the cursor.
pub fn begin_trip(
    ride: &mut Ride,
    progress: &mut RideProgress,
    timing: &mut RideTiming,
    wall_ms: u64,
) -> Result<()> {
    ride.transition(RideStatus::InProgress)?;
    *progress = RideProgress::start(Leg::ToDropoff);
    timing.pickup_at_ms = Some(wall_ms);
    info!(ride = %ride.id, driver = %ride.driver, "rider picked up");
    Ok(())
}

/// Starts trips whose driver has waited at pickup for the configured dwell
/// (simulated time).
pub fn trip_started_system(
    clock: Res<SimulationClock>,
    config: Res<DispatchConfig>,
    mut rides: Query<(&mut Ride, &mut RideProgress, &mut RideTiming)>,
) {
    let dwell_ms = config.pickup_dwell_ms();
    for (mut ride, mut progress, mut timing) in rides.iter_mut() {
        if ride.status != RideStatus::Arrived {
            continue;
        }
        let Some(arrived_sim_ms) = timing.arrived_sim_ms else {
            continue;
        };
        if clock.now().saturating_sub(arrived_sim_ms) < dwell_ms {
            continue;
        }
        if let Err(err) = begin_trip(&mut ride, &mut progress, &mut timing, clock.wall_ms()) {
            warn!(ride = %ride.id, %err, "could not start trip");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bevy_ecs::prelude::{Schedule, World};

    use crate::ecs::RideId;
    use crate::matching::{DriverId, RequestId, RideRequest, VehicleType};
    use crate::spatial::Coordinate;
    use crate::test_helpers::line_graph;

    fn arrived_ride(world: &mut World, arrived_sim_ms: u64) -> bevy_ecs::entity::Entity {
        let graph = line_graph();
        let a = graph.node_index("A").expect("A");
        let request = RideRequest {
            id: RequestId(1),
            user_id: "u".into(),
            pickup: Coordinate::new(0.0, 0.0),
            dropoff: Some(Coordinate::new(0.0, 2.0)),
            pickup_node: a,
            dropoff_node: None,
            vehicle_type: VehicleType::Sedan,
            created_at_ms: 0,
        };
        world
            .spawn((
                Ride {
                    id: RideId(1),
                    request: Arc::new(request),
                    driver: DriverId(0),
                    status: RideStatus::Arrived,
                    estimated_pickup_min: 0.0,
                    estimated_fare: 0.0,
                },
                RideProgress {
                    leg: Leg::ToPickup,
                    segment: 1,
                    fraction: 1.0,
                    leg_traveled_km: 10.0,
                },
                RideTiming {
                    arrived_sim_ms: Some(arrived_sim_ms),
                    ..RideTiming::default()
                },
            ))
            .id()
    }

    #[test]
    fn waits_for_dwell_then_switches_leg() {
        let mut world = World::new();
        let mut clock = SimulationClock::starting_at(0);
        clock.advance(50, 10.0); // 500 ms simulated
        world.insert_resource(clock);
        world.insert_resource(DispatchConfig::default());
        let entity = arrived_ride(&mut world, 0);

        let mut schedule = Schedule::default();
        schedule.add_systems(trip_started_system);
        schedule.run(&mut world);
        assert_eq!(
            world.get::<Ride>(entity).expect("ride").status,
            RideStatus::Arrived
        );

        world.resource_mut::<SimulationClock>().advance(100, 10.0);
        schedule.run(&mut world);
        let ride = world.get::<Ride>(entity).expect("ride");
        assert_eq!(ride.status, RideStatus::InProgress);
        let progress = world.get::<RideProgress>(entity).expect("progress");
        assert_eq!(*progress, RideProgress::start(Leg::ToDropoff));
        let timing = world.get::<RideTiming>(entity).expect("timing");
        assert_eq!(timing.pickup_at_ms, Some(100));
    }

    #[test]
    fn begin_trip_requires_arrival() {
        let mut world = World::new();
        let entity = arrived_ride(&mut world, 0);
        let mut ride = world.get::<Ride>(entity).expect("ride").clone();
        ride.status = RideStatus::DriverEnRoute;
        let mut progress = RideProgress::start(Leg::ToPickup);
        let mut timing = RideTiming::default();
        assert!(begin_trip(&mut ride, &mut progress, &mut timing, 0).is_err());
        assert_eq!(timing.pickup_at_ms, None);
    }
}
