//! Transport-agnostic facade over the simulator: route quotes, the request
//! book and runner control. Every operation takes and returns plain data, so
//! an HTTP or RPC layer only has to translate.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::DispatchConfig;
use crate::ecs::RideId;
use crate::error::{DispatchError, EntityKind, Result};
use crate::graph::Graph;
use crate::matching::{DriverId, MatchCandidate, RequestId, RideRequest, VehicleType};
use crate::routing::{Algorithm, CostType, PathDetails, PathNode};
use crate::runner::SimulationRunner;
use crate::scenario::{demo_city_graph, demo_drivers};
use crate::simulation::{ConfirmedRide, Simulator};
use crate::spatial::Coordinate;
use crate::store::InMemoryDriverStore;
use crate::telemetry::{RideSnapshot, SimulationSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteQuery {
    pub origin: Coordinate,
    pub destination: Coordinate,
    #[serde(default)]
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default = "default_cost_type")]
    pub cost_type: CostType,
}

fn default_cost_type() -> CostType {
    CostType::Time
}

impl RouteQuery {
    pub fn new(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            origin,
            destination,
            vehicle_type: VehicleType::default(),
            algorithm: Algorithm::default(),
            cost_type: default_cost_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteQuote {
    pub origin_node: PathNode,
    pub destination_node: PathNode,
    pub path: PathDetails,
    /// Total path time rounded up to whole minutes.
    pub eta_minutes: u32,
    pub estimated_fare: f64,
}

/// A request together with the drivers it was matched against.
#[derive(Debug, Clone, PartialEq)]
pub struct RideOffer {
    pub request: RideRequest,
    pub candidates: Vec<MatchCandidate>,
}

pub struct DispatchService {
    simulator: Arc<Simulator>,
    /// Unconfirmed offers, oldest evicted first once full.
    offers: Mutex<LruCache<RequestId, RideOffer>>,
    runner: Mutex<Option<SimulationRunner>>,
}

impl DispatchService {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        let capacity =
            NonZeroUsize::new(simulator.config().offer_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            simulator,
            offers: Mutex::new(LruCache::new(capacity)),
            runner: Mutex::new(None),
        }
    }

    pub fn with_graph(graph: Graph, config: DispatchConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let simulator = Simulator::new(Arc::new(graph), config, clock)?;
        Ok(Self::new(Arc::new(simulator)))
    }

    /// The demo city with its eight-driver fleet on the system clock.
    pub fn demo(config: DispatchConfig) -> Result<Self> {
        let service = Self::with_graph(demo_city_graph()?, config, Arc::new(SystemClock))?;
        let store = InMemoryDriverStore::with_drivers(demo_drivers())?;
        service.simulator.load_drivers(&store)?;
        Ok(service)
    }

    pub fn simulator(&self) -> &Arc<Simulator> {
        &self.simulator
    }

    fn lock_offers(&self) -> MutexGuard<'_, LruCache<RequestId, RideOffer>> {
        self.offers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_runner(&self) -> MutexGuard<'_, Option<SimulationRunner>> {
        self.runner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route, ETA and fare between two arbitrary coordinates, each snapped to
    /// its nearest node. The fare is always priced on the shortest-distance
    /// path, whatever `cost_type` the returned path was searched by, so it
    /// matches what a confirmed ride on the same trip is charged.
    pub fn quote_route(&self, query: &RouteQuery) -> Result<RouteQuote> {
        let origin = query.origin.validate()?;
        let destination = query.destination.validate()?;
        let graph = self.simulator.graph();
        let (from, _) = graph.nearest_node(origin)?;
        let (to, _) = graph.nearest_node(destination)?;

        let router = self.simulator.router();
        let path = router.route(from, to, query.algorithm, query.cost_type)?;
        let fare_distance_km = match query.cost_type {
            CostType::Distance => path.total_distance_km,
            CostType::Time => {
                router
                    .route(from, to, query.algorithm, CostType::Distance)?
                    .total_distance_km
            }
        };
        let estimated_fare = self
            .simulator
            .fare_for_distance(query.vehicle_type, fare_distance_km);
        let empty = || DispatchError::invalid("route has no nodes");
        let origin_node = path.start().cloned().ok_or_else(empty)?;
        let destination_node = path.goal().cloned().ok_or_else(empty)?;
        Ok(RouteQuote {
            origin_node,
            destination_node,
            eta_minutes: path.total_time_min.ceil() as u32,
            estimated_fare,
            path,
        })
    }

    /// Create a request, rank drivers for it and keep both until the rider
    /// confirms.
    pub fn request_ride(
        &self,
        user_id: impl Into<String>,
        pickup: Coordinate,
        dropoff: Option<Coordinate>,
        vehicle_type: VehicleType,
    ) -> Result<RideOffer> {
        let request = self
            .simulator
            .create_ride_request(user_id, pickup, dropoff, vehicle_type)?;
        let candidates = self.simulator.request_ride(&request)?;
        info!(
            request = %request.id,
            candidates = candidates.len(),
            "ride requested"
        );
        let offer = RideOffer {
            request,
            candidates,
        };
        if let Some((evicted, _)) = self.lock_offers().push(offer.request.id, offer.clone()) {
            if evicted != offer.request.id {
                debug!(request = %evicted, "unconfirmed offer evicted");
            }
        }
        Ok(offer)
    }

    pub fn offer(&self, request_id: RequestId) -> Result<RideOffer> {
        self.lock_offers()
            .peek(&request_id)
            .cloned()
            .ok_or_else(|| DispatchError::not_found(EntityKind::Request, request_id))
    }

    /// Drop a pending request without booking a ride.
    pub fn withdraw_request(&self, request_id: RequestId) -> Result<RideOffer> {
        let offer = self
            .lock_offers()
            .pop(&request_id)
            .ok_or_else(|| DispatchError::not_found(EntityKind::Request, request_id))?;
        info!(request = %request_id, "ride request withdrawn");
        Ok(offer)
    }

    pub fn pending_offers(&self) -> usize {
        self.lock_offers().len()
    }

    /// Confirm a pending request with `driver_id`. The request is consumed only
    /// when the ride is created.
    pub fn confirm_ride(&self, request_id: RequestId, driver_id: DriverId) -> Result<ConfirmedRide> {
        let offer = self.offer(request_id)?;
        let confirmed = self.simulator.confirm_ride(&offer.request, driver_id)?;
        self.lock_offers().pop(&request_id);
        Ok(confirmed)
    }

    pub fn status(&self, ride_id: RideId) -> Result<RideSnapshot> {
        self.simulator.ride_status(ride_id)
    }

    pub fn position(&self, ride_id: RideId) -> Result<Coordinate> {
        self.simulator.ride_position(ride_id)
    }

    pub fn start(&self, ride_id: RideId) -> Result<RideSnapshot> {
        self.simulator.start_ride(ride_id)
    }

    pub fn complete(&self, ride_id: RideId) -> Result<RideSnapshot> {
        self.simulator.complete_ride(ride_id)
    }

    pub fn cancel(&self, ride_id: RideId) -> Result<RideSnapshot> {
        self.simulator.cancel_ride(ride_id)
    }

    pub fn simulation_state(&self) -> SimulationSnapshot {
        self.simulator.snapshot()
    }

    /// Start the tick loop on the current tokio runtime.
    pub fn start_simulation(&self) -> Result<()> {
        let mut runner = self.lock_runner();
        if runner.as_ref().is_some_and(|r| !r.is_finished()) {
            return Err(DispatchError::precondition("simulation is already running"));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DispatchError::precondition(
                "starting the simulation needs a tokio runtime",
            ));
        }
        *runner = Some(SimulationRunner::spawn(Arc::clone(&self.simulator)));
        Ok(())
    }

    /// Stop the tick loop. Returns the ticks it ran, or `None` if it was not
    /// running.
    pub async fn stop_simulation(&self) -> Option<u64> {
        let runner = self.lock_runner().take()?;
        Some(runner.stop().await)
    }

    pub fn is_running(&self) -> bool {
        self.lock_runner()
            .as_ref()
            .is_some_and(|runner| !runner.is_finished())
    }
}
