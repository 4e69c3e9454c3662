//! Ride simulator: owns the ECS world holding the matcher and every active
//! ride, and advances it one tick at a time.
//!
//! All access to the world goes through one mutex, so external operations
//! (confirm, start, complete, cancel, driver updates) never interleave with a
//! tick halfway through. Snapshots are published after every tick on a
//! broadcast channel and to registered synchronous observers.
//!
//! Ride lifecycle:
//!
//! ```text
//! Requested -> Accepted -> DriverEnRoute -> Arrived -> InProgress -> Completed
//!      \___________\_____________\____________\___________\______-> Cancelled
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use bevy_ecs::prelude::{Entity, Schedule, World};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::clock::{Clock, SimulationClock, SystemClock};
use crate::config::DispatchConfig;
use crate::ecs::{Leg, Ride, RideDirectory, RideId, RidePaths, RideProgress, RideStatus, RideTiming};
use crate::error::{DispatchError, EntityKind, Result};
use crate::graph::Graph;
use crate::matching::{
    Driver, DriverId, DriverMatcher, DriverProfile, DriverStatus, MatchCandidate, RideRequest,
    VehicleType,
};
use crate::routing::{CostType, PathDetails, Router};
use crate::runner::{run_tick, tick_schedule};
use crate::spatial::Coordinate;
use crate::store::DriverStore;
use crate::systems::trip_completed::archive_ride;
use crate::systems::trip_started::begin_trip;
use crate::telemetry::{
    capture_snapshot, notify_observers, ride_snapshot, RideHistory, RideRecord, RideSnapshot,
    SimulationSnapshot, SnapshotObserver,
};

/// Result of a successful confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmedRide {
    pub ride: RideSnapshot,
    pub pickup_path: PathDetails,
    pub dropoff_path: PathDetails,
}

struct SimState {
    world: World,
    schedule: Schedule,
}

pub struct Simulator {
    state: Mutex<SimState>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    router: Arc<Router>,
    snapshots: broadcast::Sender<Arc<SimulationSnapshot>>,
    observers: RwLock<Vec<Arc<dyn SnapshotObserver>>>,
}

impl Simulator {
    pub fn new(graph: Arc<Graph>, config: DispatchConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let router = Arc::new(Router::new(graph, config.route_cache_capacity));
        let matcher = DriverMatcher::new(
            Arc::clone(&router),
            config.pricing.clone(),
            Arc::clone(&clock),
        )
        .with_algorithm(config.matching.algorithm);

        let mut world = World::new();
        world.insert_resource(SimulationClock::starting_at(clock.now_ms()));
        world.insert_resource(config.clone());
        world.insert_resource(matcher);
        world.insert_resource(RideDirectory::default());
        world.insert_resource(RideHistory::default());

        let (snapshots, _) = broadcast::channel(config.snapshot_channel_capacity);
        info!(
            nodes = router.graph().len(),
            edges = router.graph().edge_count(),
            speed_multiplier = config.speed_multiplier,
            "simulator ready"
        );
        Ok(Self {
            state: Mutex::new(SimState {
                world,
                schedule: tick_schedule(),
            }),
            clock,
            config,
            router,
            snapshots,
            observers: RwLock::new(Vec::new()),
        })
    }

    pub fn with_system_clock(graph: Arc<Graph>, config: DispatchConfig) -> Result<Self> {
        Self::new(graph, config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn graph(&self) -> &Arc<Graph> {
        self.router.graph()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock_state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_matcher<R>(&self, f: impl FnOnce(&DriverMatcher) -> R) -> R {
        let state = self.lock_state();
        f(state.world.resource::<DriverMatcher>())
    }

    // -- drivers ------------------------------------------------------------

    pub fn register_driver(&self, profile: DriverProfile) -> Result<DriverId> {
        let mut state = self.lock_state();
        state
            .world
            .resource_mut::<DriverMatcher>()
            .register_driver(profile)
    }

    /// Register every driver held by `store`.
    pub fn load_drivers(&self, store: &dyn DriverStore) -> Result<Vec<DriverId>> {
        let profiles = store.get_all()?;
        let mut state = self.lock_state();
        let mut matcher = state.world.resource_mut::<DriverMatcher>();
        let ids = profiles
            .into_iter()
            .map(|profile| matcher.register_driver(profile))
            .collect::<Result<Vec<_>>>()?;
        info!(drivers = ids.len(), "loaded drivers from store");
        Ok(ids)
    }

    /// Write the current state of every driver back to `store`.
    pub fn sync_drivers(&self, store: &dyn DriverStore) -> Result<usize> {
        let profiles: Vec<DriverProfile> =
            self.read_matcher(|m| m.drivers().iter().map(DriverProfile::from).collect());
        for profile in &profiles {
            store.upsert(profile.clone())?;
        }
        Ok(profiles.len())
    }

    pub fn driver(&self, id: DriverId) -> Result<Driver> {
        self.read_matcher(|m| m.driver(id).cloned())
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.read_matcher(|m| m.drivers().to_vec())
    }

    pub fn available_drivers(&self, vehicle_type: Option<VehicleType>) -> Vec<Driver> {
        self.read_matcher(|m| {
            m.available_drivers(vehicle_type)
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Move an unassigned driver. Drivers on a ride follow the ride instead.
    pub fn update_driver_location(&self, id: DriverId, location: Coordinate) -> Result<Driver> {
        let mut state = self.lock_state();
        ensure_unassigned(&state.world, id)?;
        state
            .world
            .resource_mut::<DriverMatcher>()
            .update_driver_location(id, location)
            .cloned()
    }

    /// Change an unassigned driver's status. Returns the previous status.
    pub fn update_driver_status(&self, id: DriverId, status: DriverStatus) -> Result<DriverStatus> {
        let mut state = self.lock_state();
        ensure_unassigned(&state.world, id)?;
        state
            .world
            .resource_mut::<DriverMatcher>()
            .update_driver_status(id, status)
    }

    // -- requests -----------------------------------------------------------

    pub fn create_ride_request(
        &self,
        user_id: impl Into<String>,
        pickup: Coordinate,
        dropoff: Option<Coordinate>,
        vehicle_type: VehicleType,
    ) -> Result<RideRequest> {
        let mut state = self.lock_state();
        state
            .world
            .resource_mut::<DriverMatcher>()
            .create_ride_request(user_id, pickup, dropoff, vehicle_type)
    }

    /// Rank drivers for `request` with the configured matching limits.
    pub fn request_ride(&self, request: &RideRequest) -> Result<Vec<MatchCandidate>> {
        let matching = self.config.matching;
        self.read_matcher(|m| {
            m.match_driver_to_request(request, matching.max_candidates, matching.max_distance_km)
        })
    }

    pub fn fare_for_distance(&self, vehicle_type: VehicleType, distance_km: f64) -> f64 {
        self.read_matcher(|m| m.fare_for_distance(vehicle_type, distance_km))
    }

    // -- rides --------------------------------------------------------------

    /// Assign `driver_id` to `request`. Both paths and the fare are computed
    /// before anything is mutated, so a failure leaves no ride behind and the
    /// driver untouched.
    pub fn confirm_ride(&self, request: &RideRequest, driver_id: DriverId) -> Result<ConfirmedRide> {
        let mut state = self.lock_state();
        let world = &mut state.world;

        let dropoff_node = request.dropoff_node.ok_or_else(|| {
            DispatchError::invalid(format!("{} has no dropoff location", request.id))
        })?;
        let matcher = world.resource::<DriverMatcher>();
        let driver = matcher.driver(driver_id)?.clone();
        if !driver.is_available() {
            return Err(DispatchError::precondition(format!(
                "{driver_id} is {}, not available",
                driver.status
            )));
        }
        if let Some(ride) = world.resource::<RideDirectory>().ride_for_driver(driver_id) {
            return Err(DispatchError::precondition(format!(
                "{driver_id} is already assigned to {ride}"
            )));
        }

        let algorithm = matcher.algorithm();
        let pickup_path =
            self.router
                .route(driver.nearest_node, request.pickup_node, algorithm, CostType::Time)?;
        let dropoff_path =
            self.router
                .route(request.pickup_node, dropoff_node, algorithm, CostType::Time)?;
        let estimated_pickup_min = matcher.driver_eta(&driver, request.pickup_node)?.total_time_min;
        let estimated_fare = matcher.estimate_fare(request)?;

        world
            .resource_mut::<DriverMatcher>()
            .update_driver_status(driver_id, DriverStatus::Busy)?;
        let ride_id = world.resource_mut::<RideDirectory>().allocate_id();
        let mut ride = Ride {
            id: ride_id,
            request: Arc::new(request.clone()),
            driver: driver_id,
            status: RideStatus::Requested,
            estimated_pickup_min,
            estimated_fare,
        };
        ride.transition(RideStatus::Accepted)?;
        ride.transition(RideStatus::DriverEnRoute)?;

        let entity = world
            .spawn((
                ride,
                RidePaths {
                    to_pickup: pickup_path.clone(),
                    to_dropoff: dropoff_path.clone(),
                },
                RideProgress::start(Leg::ToPickup),
                RideTiming::started(self.clock.now_ms()),
            ))
            .id();
        world
            .resource_mut::<RideDirectory>()
            .insert(ride_id, driver_id, entity);
        info!(
            ride = %ride_id,
            request = %request.id,
            driver = %driver_id,
            eta_min = estimated_pickup_min,
            fare = estimated_fare,
            "ride confirmed"
        );

        Ok(ConfirmedRide {
            ride: ride_snapshot(world, entity)?,
            pickup_path,
            dropoff_path,
        })
    }

    /// `Arrived -> InProgress` without waiting for the pickup dwell.
    pub fn start_ride(&self, ride_id: RideId) -> Result<RideSnapshot> {
        let wall_ms = self.clock.now_ms();
        let mut state = self.lock_state();
        let world = &mut state.world;
        let entity = world.resource::<RideDirectory>().entity(ride_id)?;

        {
            let mut rides = world.query::<(&mut Ride, &mut RideProgress, &mut RideTiming)>();
            let (mut ride, mut progress, mut timing) = rides
                .get_mut(world, entity)
                .map_err(|_| DispatchError::not_found(EntityKind::Ride, ride_id))?;
            if ride.status != RideStatus::Arrived {
                return Err(DispatchError::precondition(format!(
                    "{ride_id} is {}; the driver has not arrived at pickup",
                    ride.status
                )));
            }
            begin_trip(&mut ride, &mut progress, &mut timing, wall_ms)?;
        }
        ride_snapshot(world, entity)
    }

    /// `InProgress -> Completed`; the driver is released immediately.
    pub fn complete_ride(&self, ride_id: RideId) -> Result<RideSnapshot> {
        self.finish_ride(ride_id, RideStatus::Completed)
    }

    /// Cancel from any non-terminal state; the driver is released immediately.
    pub fn cancel_ride(&self, ride_id: RideId) -> Result<RideSnapshot> {
        self.finish_ride(ride_id, RideStatus::Cancelled)
    }

    fn finish_ride(&self, ride_id: RideId, outcome: RideStatus) -> Result<RideSnapshot> {
        let wall_ms = self.clock.now_ms();
        let mut state = self.lock_state();
        let world = &mut state.world;
        let entity = active_entity(world, ride_id)?;

        {
            let mut rides = world.query::<(&mut Ride, &mut RideTiming)>();
            let (mut ride, mut timing) = rides
                .get_mut(world, entity)
                .map_err(|_| DispatchError::not_found(EntityKind::Ride, ride_id))?;
            if outcome == RideStatus::Completed && ride.status != RideStatus::InProgress {
                return Err(DispatchError::precondition(format!(
                    "{ride_id} is {}, not in progress",
                    ride.status
                )));
            }
            ride.transition(outcome)?;
            match outcome {
                RideStatus::Completed => timing.completed_at_ms = Some(wall_ms),
                _ => timing.cancelled_at_ms = Some(wall_ms),
            }
        }

        let record = archive_ride(world, entity, wall_ms)?;
        Ok(record.ride)
    }

    /// Current state of a ride, falling back to the archive for finished ones.
    pub fn ride_status(&self, ride_id: RideId) -> Result<RideSnapshot> {
        let state = self.lock_state();
        let world = &state.world;
        if let Ok(entity) = world.resource::<RideDirectory>().entity(ride_id) {
            return ride_snapshot(world, entity);
        }
        world
            .resource::<RideHistory>()
            .find(ride_id)
            .map(|record| record.ride.clone())
            .ok_or_else(|| DispatchError::not_found(EntityKind::Ride, ride_id))
    }

    /// Interpolated driver position for a ride.
    pub fn ride_position(&self, ride_id: RideId) -> Result<Coordinate> {
        Ok(self.ride_status(ride_id)?.driver_location)
    }

    pub fn history(&self) -> Vec<RideRecord> {
        self.lock_state()
            .world
            .resource::<RideHistory>()
            .records
            .clone()
    }

    // -- ticking ------------------------------------------------------------

    pub fn snapshot(&self) -> SimulationSnapshot {
        capture_snapshot(&mut self.lock_state().world)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SimulationSnapshot>> {
        self.snapshots.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn SnapshotObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Restart elapsed-time measurement from now, so time spent without a
    /// runner is not replayed on the next tick.
    pub fn resume_clock(&self) {
        let now = self.clock.now_ms();
        self.lock_state()
            .world
            .resource_mut::<SimulationClock>()
            .rebase(now);
    }

    pub fn ticks(&self) -> u64 {
        self.lock_state().world.resource::<SimulationClock>().ticks()
    }

    /// Advance the simulation once and publish the resulting snapshot.
    pub fn tick(&self) -> Arc<SimulationSnapshot> {
        let snapshot = {
            let mut guard = self.lock_state();
            let SimState { world, schedule } = &mut *guard;
            run_tick(world, schedule, self.clock.now_ms());
            Arc::new(capture_snapshot(world))
        };
        debug!(
            tick = snapshot.tick,
            sim_time_ms = snapshot.sim_time_ms,
            active_rides = snapshot.counts.active_rides,
            "tick"
        );

        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        notify_observers(observers.iter().map(|o| o.as_ref()), &snapshot);
        // No subscribers is not an error.
        let _ = self.snapshots.send(Arc::clone(&snapshot));
        snapshot
    }
}

fn ensure_unassigned(world: &World, driver: DriverId) -> Result<()> {
    world.resource::<DriverMatcher>().driver(driver)?;
    match world.resource::<RideDirectory>().ride_for_driver(driver) {
        Some(ride) => Err(DispatchError::precondition(format!(
            "{driver} is assigned to {ride}"
        ))),
        None => Ok(()),
    }
}

fn active_entity(world: &World, ride_id: RideId) -> Result<Entity> {
    let entity = world.resource::<RideDirectory>().entity(ride_id);
    if entity.is_err() && world.resource::<RideHistory>().find(ride_id).is_some() {
        return Err(DispatchError::precondition(format!(
            "{ride_id} has already finished"
        )));
    }
    entity
}
