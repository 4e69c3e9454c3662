//! Wall clocks and simulated time.
//!
//! [`Clock`] is the injectable source of wall time: production code uses
//! [`SystemClock`], tests drive a [`ManualClock`]. [`SimulationClock`] is the ECS
//! resource that turns wall time elapsed between ticks into simulated time.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use bevy_ecs::prelude::Resource;
use chrono::Timelike;

pub const ONE_SEC_MS: u64 = 1000;

/// Source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Hour of day (0-23) in the local time zone; drives surge pricing.
    fn local_hour(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }

    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
    local_hour: AtomicU32,
}

impl ManualClock {
    pub fn new(start_ms: u64, local_hour: u32) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
            local_hour: AtomicU32::new(local_hour % 24),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_local_hour(&self, hour: u32) {
        self.local_hour.store(hour % 24, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn local_hour(&self) -> u32 {
        self.local_hour.load(Ordering::SeqCst)
    }
}

/// Simulated time, advanced once per tick by the speed-scaled wall time elapsed
/// since the previous tick.
#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now_ms: u64,
    delta_ms: u64,
    wall_ms: u64,
    last_wall_ms: Option<u64>,
    ticks: u64,
}

impl SimulationClock {
    /// Clock whose first tick measures elapsed time from `wall_ms`.
    pub fn starting_at(wall_ms: u64) -> Self {
        Self {
            wall_ms,
            last_wall_ms: Some(wall_ms),
            ..Self::default()
        }
    }

    /// Simulated milliseconds since the simulator was created.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Simulated milliseconds covered by the current tick.
    pub fn delta_ms(&self) -> u64 {
        self.delta_ms
    }

    pub fn delta_secs(&self) -> f64 {
        self.delta_ms as f64 / ONE_SEC_MS as f64
    }

    /// Wall time of the current tick.
    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Forget the previous tick so the next one starts measuring from `wall_ms`.
    pub fn rebase(&mut self, wall_ms: u64) {
        self.wall_ms = wall_ms;
        self.last_wall_ms = Some(wall_ms);
    }

    /// Advance simulated time by the wall time elapsed since the last tick,
    /// scaled by `speed_multiplier`.
    pub fn advance(&mut self, wall_ms: u64, speed_multiplier: f64) {
        let elapsed_wall = self
            .last_wall_ms
            .map(|last| wall_ms.saturating_sub(last))
            .unwrap_or(0);
        self.delta_ms = (elapsed_wall as f64 * speed_multiplier.max(0.0)).round() as u64;
        self.now_ms += self.delta_ms;
        self.wall_ms = wall_ms;
        self.last_wall_ms = Some(wall_ms);
        self.ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tick_without_baseline_covers_no_time() {
        let mut clock = SimulationClock::default();
        clock.advance(5_000, 10.0);
        assert_eq!(clock.delta_ms(), 0);
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.ticks(), 1);
    }

    #[test]
    fn ticks_scale_elapsed_wall_time() {
        let mut clock = SimulationClock::starting_at(1_000);
        clock.advance(1_100, 10.0);
        assert_eq!(clock.delta_ms(), 1_000);
        clock.advance(1_350, 10.0);
        assert_eq!(clock.delta_ms(), 2_500);
        assert_eq!(clock.now(), 3_500);
        assert_eq!(clock.wall_ms(), 1_350);
        assert!((clock.delta_secs() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn rebase_drops_idle_time() {
        let mut clock = SimulationClock::starting_at(0);
        clock.rebase(60_000);
        clock.advance(60_100, 1.0);
        assert_eq!(clock.delta_ms(), 100);
    }

    #[test]
    fn manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(10, 25);
        assert_eq!(clock.local_hour(), 1);
        clock.advance_ms(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set_ms(100);
        clock.set_local_hour(18);
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(clock.local_hour(), 18);
    }
}
