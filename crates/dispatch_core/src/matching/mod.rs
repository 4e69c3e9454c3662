//! Driver registry and the request-to-driver matcher.

pub mod matcher;
pub mod registry;
pub mod types;

pub use matcher::DriverMatcher;
pub use registry::DriverRegistry;
pub use types::{
    Driver, DriverId, DriverProfile, DriverStatus, MatchCandidate, RequestId, RideRequest,
    VehicleType,
};
