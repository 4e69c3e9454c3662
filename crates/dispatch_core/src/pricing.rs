//! Fare schedule: base fare plus a per-kilometre rate by vehicle type, with a
//! surge multiplier during fixed local-hour windows.
//!
//! Formula: `fare = (base_fare + distance_km * rate(vehicle)) * surge(hour)`,
//! rounded to two decimals.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};
use crate::matching::VehicleType;

/// Base fare in currency units (rupees).
pub const BASE_FARE: f64 = 50.0;

/// Rate used for vehicle types the schedule has no entry for (the sedan rate).
pub const FALLBACK_PER_KM_RATE: f64 = 15.0;

pub const SURGE_MULTIPLIER: f64 = 1.5;

/// Ride distance assumed when a request has no dropoff.
pub const PLACEHOLDER_DISTANCE_KM: f64 = 5.0;

/// Inclusive range of local hours during which surge applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurgeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl SurgeWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FareSchedule {
    pub base_fare: f64,
    pub per_km: BTreeMap<VehicleType, f64>,
    pub fallback_per_km: f64,
    pub surge_multiplier: f64,
    pub surge_windows: Vec<SurgeWindow>,
    pub placeholder_distance_km: f64,
}

impl Default for FareSchedule {
    fn default() -> Self {
        Self {
            base_fare: BASE_FARE,
            per_km: BTreeMap::from([
                (VehicleType::Mini, 12.0),
                (VehicleType::Sedan, 15.0),
                (VehicleType::Premium, 20.0),
                (VehicleType::Suv, 18.0),
                (VehicleType::Xl, 25.0),
            ]),
            fallback_per_km: FALLBACK_PER_KM_RATE,
            surge_multiplier: SURGE_MULTIPLIER,
            surge_windows: vec![SurgeWindow::new(8, 10), SurgeWindow::new(17, 19)],
            placeholder_distance_km: PLACEHOLDER_DISTANCE_KM,
        }
    }
}

impl FareSchedule {
    pub fn per_km_rate(&self, vehicle: VehicleType) -> f64 {
        self.per_km
            .get(&vehicle)
            .copied()
            .unwrap_or(self.fallback_per_km)
    }

    pub fn is_surge_hour(&self, hour: u32) -> bool {
        self.surge_windows.iter().any(|window| window.contains(hour))
    }

    /// Fare for a ride of `distance_km` starting at local `hour`.
    pub fn fare(&self, vehicle: VehicleType, distance_km: f64, hour: u32) -> f64 {
        let mut fare = self.base_fare + distance_km * self.per_km_rate(vehicle);
        if self.is_surge_hour(hour) {
            fare *= self.surge_multiplier;
        }
        round_currency(fare)
    }

    pub fn validate(&self) -> Result<()> {
        let rates = self.per_km.values().chain([&self.fallback_per_km]);
        if rates.into_iter().any(|rate| !rate.is_finite() || *rate < 0.0) {
            return Err(DispatchError::invalid("per-km rates must be non-negative"));
        }
        if !self.base_fare.is_finite() || self.base_fare < 0.0 {
            return Err(DispatchError::invalid("base fare must be non-negative"));
        }
        if !self.surge_multiplier.is_finite() || self.surge_multiplier <= 0.0 {
            return Err(DispatchError::invalid("surge multiplier must be positive"));
        }
        if !self.placeholder_distance_km.is_finite() || self.placeholder_distance_km < 0.0 {
            return Err(DispatchError::invalid(
                "placeholder distance must be non-negative",
            ));
        }
        if let Some(window) = self
            .surge_windows
            .iter()
            .find(|w| w.start_hour > w.end_hour || w.end_hour > 23)
        {
            return Err(DispatchError::invalid(format!(
                "surge window {}..={} is not a valid hour range",
                window.start_hour, window.end_hour
            )));
        }
        Ok(())
    }
}

pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
