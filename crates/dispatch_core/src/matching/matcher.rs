use std::sync::Arc;

use bevy_ecs::prelude::Resource;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::{DispatchError, Result};
use crate::graph::{Graph, NodeIndex};
use crate::matching::{
    Driver, DriverId, DriverProfile, DriverRegistry, DriverStatus, MatchCandidate, RequestId,
    RideRequest, VehicleType,
};
use crate::pricing::FareSchedule;
use crate::routing::{Algorithm, CostType, PathDetails, Router};
use crate::spatial::{minutes_at_assumed_speed, Coordinate};

/// Two-stage driver selection over a shared router.
///
/// Stage one is a cheap straight-line pre-filter over available drivers. Stage
/// two routes each surviving candidate to the pickup node and ranks by the
/// resulting ETA, so topology (rivers, one-way roads) can reorder candidates.
/// A driver excluded by the straight-line cap is never reconsidered.
#[derive(Debug, Resource)]
pub struct DriverMatcher {
    router: Arc<Router>,
    registry: DriverRegistry,
    pricing: FareSchedule,
    algorithm: Algorithm,
    clock: Arc<dyn Clock>,
    next_request: u64,
}

impl DriverMatcher {
    pub fn new(router: Arc<Router>, pricing: FareSchedule, clock: Arc<dyn Clock>) -> Self {
        Self {
            router,
            registry: DriverRegistry::new(),
            pricing,
            algorithm: Algorithm::AStar,
            clock,
            next_request: 1,
        }
    }

    /// Search used for ETA and fare routes.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn graph(&self) -> &Graph {
        self.router.graph()
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn pricing(&self) -> &FareSchedule {
        &self.pricing
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    pub fn register_driver(&mut self, profile: DriverProfile) -> Result<DriverId> {
        self.registry.register(self.router.graph(), profile)
    }

    pub fn driver(&self, id: DriverId) -> Result<&Driver> {
        self.registry.get(id)
    }

    pub fn drivers(&self) -> &[Driver] {
        self.registry.list()
    }

    pub fn available_drivers(&self, vehicle_type: Option<VehicleType>) -> Vec<&Driver> {
        self.registry.available(vehicle_type).collect()
    }

    pub fn update_driver_location(&mut self, id: DriverId, location: Coordinate) -> Result<&Driver> {
        self.registry
            .update_location(self.router.graph(), id, location)
    }

    pub fn update_driver_status(&mut self, id: DriverId, status: DriverStatus) -> Result<DriverStatus> {
        self.registry.update_status(id, status)
    }

    pub fn record_trip(&mut self, id: DriverId) -> Result<u32> {
        self.registry.record_trip(id)
    }

    /// Build a request, resolving pickup and dropoff to their nearest nodes.
    pub fn create_ride_request(
        &mut self,
        user_id: impl Into<String>,
        pickup: Coordinate,
        dropoff: Option<Coordinate>,
        vehicle_type: VehicleType,
    ) -> Result<RideRequest> {
        let pickup = pickup.validate()?;
        let dropoff = dropoff.map(Coordinate::validate).transpose()?;
        let graph = self.router.graph();
        let (pickup_node, _) = graph.nearest_node(pickup)?;
        let dropoff_node = match dropoff {
            Some(dropoff) => Some(graph.nearest_node(dropoff)?.0),
            None => None,
        };

        let id = RequestId(self.next_request);
        self.next_request += 1;
        Ok(RideRequest {
            id,
            user_id: user_id.into(),
            pickup,
            dropoff,
            pickup_node,
            dropoff_node,
            vehicle_type,
            created_at_ms: self.clock.now_ms(),
        })
    }

    /// Available drivers within `max_distance_km` of `location` in a straight
    /// line, nearest first, at most `max_count` of them.
    pub fn find_nearest_drivers(
        &self,
        location: Coordinate,
        max_count: usize,
        max_distance_km: f64,
        vehicle_type: Option<VehicleType>,
    ) -> Vec<(&Driver, f64)> {
        let mut nearby: Vec<(&Driver, f64)> = self
            .registry
            .available(vehicle_type)
            .map(|driver| (driver, location.distance_km(&driver.location)))
            .filter(|(_, distance)| *distance <= max_distance_km)
            .collect();
        nearby.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)));
        nearby.truncate(max_count);
        nearby
    }

    /// Time-optimised route from the driver's nearest node to `pickup_node`,
    /// with the leg from the driver's raw position to that node added to both
    /// totals at the assumed speed.
    pub fn driver_eta(&self, driver: &Driver, pickup_node: NodeIndex) -> Result<PathDetails> {
        let mut path =
            self.router
                .route(driver.nearest_node, pickup_node, self.algorithm, CostType::Time)?;
        let start = self.graph().node(driver.nearest_node)?;
        let last_mile_km = driver.location.distance_km(&start.coordinate);
        path.total_distance_km += last_mile_km;
        path.total_time_min += minutes_at_assumed_speed(last_mile_km);
        Ok(path)
    }

    /// Rank candidates for `request` by route ETA. Drivers that cannot reach
    /// the pickup are dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unreachable`] when the dropoff cannot be reached
    /// from the pickup. The fare is priced before any driver is ranked, so no
    /// candidates are returned in that case. With no driver inside the
    /// pre-filter radius the result is an empty list and the dropoff is not
    /// checked.
    pub fn match_driver_to_request(
        &self,
        request: &RideRequest,
        max_candidates: usize,
        max_distance_km: f64,
    ) -> Result<Vec<MatchCandidate>> {
        let nearby = self.find_nearest_drivers(
            request.pickup,
            max_candidates,
            max_distance_km,
            Some(request.vehicle_type),
        );
        if nearby.is_empty() {
            debug!(request = %request.id, "no drivers within pre-filter radius");
            return Ok(Vec::new());
        }

        let estimated_fare = self.estimate_fare(request)?;
        let mut candidates = Vec::with_capacity(nearby.len());
        for (driver, direct_distance_km) in nearby {
            let eta = match self.driver_eta(driver, request.pickup_node) {
                Ok(eta) => eta,
                Err(DispatchError::Unreachable { from, to }) => {
                    warn!(
                        request = %request.id,
                        driver = %driver.id,
                        %from,
                        %to,
                        "dropping candidate that cannot reach pickup"
                    );
                    continue;
                }
                Err(err) => return Err(err),
            };
            candidates.push(MatchCandidate {
                driver_id: driver.id,
                driver_name: driver.name.clone(),
                rating: driver.rating,
                vehicle_type: driver.vehicle_type,
                total_trips: driver.total_trips,
                location: driver.location,
                direct_distance_km,
                route_distance_km: eta.total_distance_km,
                route_time_min: eta.total_time_min,
                eta_minutes: eta.total_time_min.ceil().max(0.0) as u32,
                estimated_fare,
            });
        }

        // Stable: equal ETAs keep straight-line order.
        candidates.sort_by(|a, b| a.route_time_min.total_cmp(&b.route_time_min));
        debug!(
            request = %request.id,
            candidates = candidates.len(),
            "ranked candidates by route ETA"
        );
        Ok(candidates)
    }

    /// Fare for the request's ride. The distance comes from a
    /// distance-optimised route between pickup and dropoff, or the schedule's
    /// placeholder when there is no dropoff.
    pub fn estimate_fare(&self, request: &RideRequest) -> Result<f64> {
        let distance_km = match request.dropoff_node {
            Some(dropoff) => {
                self.router
                    .route(request.pickup_node, dropoff, self.algorithm, CostType::Distance)?
                    .total_distance_km
            }
            None => self.pricing.placeholder_distance_km,
        };
        Ok(self.fare_for_distance(request.vehicle_type, distance_km))
    }

    /// Fare for an arbitrary distance at the current local hour.
    pub fn fare_for_distance(&self, vehicle_type: VehicleType, distance_km: f64) -> f64 {
        self.pricing
            .fare(vehicle_type, distance_km, self.clock.local_hour())
    }
}
