use std::fs;
use std::path::Path;

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::ONE_SEC_MS;
use crate::error::{DispatchError, EntityKind, Result};
use crate::pricing::FareSchedule;
use crate::routing::Algorithm;

/// Wall-clock period between simulator ticks.
const DEFAULT_TICK_INTERVAL_MS: u64 = 100;

/// Simulated seconds per wall-clock second.
const DEFAULT_SPEED_MULTIPLIER: f64 = 10.0;

const DEFAULT_VEHICLE_SPEED_KMH: f64 = 30.0;

/// Candidate selection limits used by `request_ride`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub max_candidates: usize,
    /// Straight-line pre-filter radius.
    pub max_distance_km: f64,
    /// Search used for ETA, fare and ride paths.
    pub algorithm: Algorithm,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_candidates: 5,
            max_distance_km: 10.0,
            algorithm: Algorithm::AStar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Resource)]
#[serde(default)]
pub struct DispatchConfig {
    pub tick_interval_ms: u64,
    pub speed_multiplier: f64,
    pub vehicle_speed_kmh: f64,
    /// Simulated seconds a driver waits at pickup before the trip starts.
    pub pickup_dwell_secs: f64,
    /// Wall-clock seconds a driver stays busy after an automatic completion.
    pub release_grace_secs: f64,
    pub matching: MatchingConfig,
    pub pricing: FareSchedule,
    pub route_cache_capacity: usize,
    pub snapshot_channel_capacity: usize,
    /// Unconfirmed ride offers kept by the service before the oldest is evicted.
    pub offer_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            speed_multiplier: DEFAULT_SPEED_MULTIPLIER,
            vehicle_speed_kmh: DEFAULT_VEHICLE_SPEED_KMH,
            pickup_dwell_secs: 1.0,
            release_grace_secs: 5.0,
            matching: MatchingConfig::default(),
            pricing: FareSchedule::default(),
            route_cache_capacity: 1024,
            snapshot_channel_capacity: 64,
            offer_capacity: 256,
        }
    }
}

impl DispatchConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DispatchError::not_found(
                EntityKind::ConfigFile,
                path.display(),
            ));
        }
        let config: DispatchConfig = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(DispatchError::invalid("tick_interval_ms must be positive"));
        }
        for (name, value) in [
            ("speed_multiplier", self.speed_multiplier),
            ("vehicle_speed_kmh", self.vehicle_speed_kmh),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DispatchError::invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("pickup_dwell_secs", self.pickup_dwell_secs),
            ("release_grace_secs", self.release_grace_secs),
            ("matching.max_distance_km", self.matching.max_distance_km),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DispatchError::invalid(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if self.snapshot_channel_capacity == 0 {
            return Err(DispatchError::invalid(
                "snapshot_channel_capacity must be positive",
            ));
        }
        if self.offer_capacity == 0 {
            return Err(DispatchError::invalid("offer_capacity must be positive"));
        }
        self.pricing.validate()
    }

    pub fn pickup_dwell_ms(&self) -> u64 {
        (self.pickup_dwell_secs * ONE_SEC_MS as f64).round() as u64
    }

    pub fn release_grace_ms(&self) -> u64 {
        (self.release_grace_secs * ONE_SEC_MS as f64).round() as u64
    }

    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn with_speed_multiplier(mut self, speed_multiplier: f64) -> Self {
        self.speed_multiplier = speed_multiplier;
        self
    }

    pub fn with_vehicle_speed_kmh(mut self, vehicle_speed_kmh: f64) -> Self {
        self.vehicle_speed_kmh = vehicle_speed_kmh;
        self
    }

    pub fn with_pickup_dwell_secs(mut self, secs: f64) -> Self {
        self.pickup_dwell_secs = secs;
        self
    }

    pub fn with_release_grace_secs(mut self, secs: f64) -> Self {
        self.release_grace_secs = secs;
        self
    }

    pub fn with_matching(mut self, matching: MatchingConfig) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.matching.algorithm = algorithm;
        self
    }

    pub fn with_pricing(mut self, pricing: FareSchedule) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn with_route_cache_capacity(mut self, capacity: usize) -> Self {
        self.route_cache_capacity = capacity;
        self
    }

    pub fn with_offer_capacity(mut self, capacity: usize) -> Self {
        self.offer_capacity = capacity;
        self
    }
}
