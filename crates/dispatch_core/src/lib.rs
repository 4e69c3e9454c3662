//! Spatial dispatch engine: a weighted road graph, shortest-path search,
//! driver matching with fare estimates, and a tick-driven ride simulator.
//!
//! The usual entry point is [`service::DispatchService`], which wraps a
//! [`simulation::Simulator`] and the background [`runner::SimulationRunner`].

pub mod clock;
pub mod config;
pub mod ecs;
pub mod error;
pub mod graph;
pub mod logging;
pub mod matching;
pub mod pricing;
pub mod routing;
pub mod runner;
pub mod scenario;
pub mod service;
pub mod simulation;
pub mod spatial;
pub mod store;
pub mod systems;
pub mod telemetry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{DispatchError, Result};
