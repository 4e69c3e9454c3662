#![allow(dead_code)]

use std::sync::Arc;

use dispatch_core::clock::{Clock, ManualClock, ONE_SEC_MS};
use dispatch_core::config::DispatchConfig;
use dispatch_core::ecs::{RideId, RideStatus};
use dispatch_core::graph::Graph;
use dispatch_core::matching::{DriverId, DriverProfile, RideRequest, VehicleType};
use dispatch_core::simulation::Simulator;
use dispatch_core::test_helpers::{manual_clock, test_simulator_with};
use dispatch_core::telemetry::SimulationSnapshot;

/// Vehicles cover exactly 1 km per wall-clock second.
pub fn fast_config() -> DispatchConfig {
    DispatchConfig::default()
        .with_speed_multiplier(1.0)
        .with_vehicle_speed_kmh(3600.0)
        .with_pickup_dwell_secs(1.0)
        .with_release_grace_secs(5.0)
}

/// A simulator on a manual clock, plus helpers to place drivers on nodes and
/// step time forward.
pub struct Harness {
    pub sim: Simulator,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(graph: Graph) -> Self {
        Self::with_config(graph, fast_config())
    }

    pub fn with_config(graph: Graph, config: DispatchConfig) -> Self {
        let clock = manual_clock(12);
        let sim = test_simulator_with(graph, Arc::clone(&clock), config);
        Self { sim, clock }
    }

    pub fn node(&self, id: &str) -> dispatch_core::spatial::Coordinate {
        self.sim
            .graph()
            .get_node(id)
            .unwrap_or_else(|err| panic!("node {id}: {err}"))
            .coordinate
    }

    pub fn driver_at(&self, external_id: &str, node: &str) -> DriverId {
        self.driver_with(DriverProfile::new(external_id, external_id, self.node(node)))
    }

    pub fn driver_with(&self, profile: DriverProfile) -> DriverId {
        self.sim.register_driver(profile).expect("register driver")
    }

    pub fn request(&self, pickup: &str, dropoff: &str) -> RideRequest {
        self.sim
            .create_ride_request(
                "rider-1",
                self.node(pickup),
                Some(self.node(dropoff)),
                VehicleType::Sedan,
            )
            .expect("ride request")
    }

    /// Move the wall clock forward by `ms` and run one tick.
    pub fn tick_after(&self, ms: u64) -> Arc<SimulationSnapshot> {
        self.clock.advance_ms(ms);
        self.sim.tick()
    }

    /// Tick once per wall second until `ride` reports `status`. Returns the
    /// number of ticks taken, or `None` after `max_ticks`.
    pub fn tick_until(&self, ride: RideId, status: RideStatus, max_ticks: usize) -> Option<usize> {
        for n in 1..=max_ticks {
            self.tick_after(ONE_SEC_MS);
            if self.sim.ride_status(ride).ok()?.status == status {
                return Some(n);
            }
        }
        None
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} +/- {tolerance}, got {actual}"
    );
}
