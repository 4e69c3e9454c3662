//! Tick schedule and the background task that drives it.
//!
//! [`run_tick`] advances [`SimulationClock`] by the speed-scaled wall time
//! since the previous tick and runs the schedule once. [`SimulationRunner`]
//! calls [`Simulator::tick`] on a fixed wall-clock interval until stopped.

use std::sync::Arc;
use std::time::Duration;

use bevy_ecs::prelude::{Query, Schedule, With, World};
use bevy_ecs::schedule::{ExecutorKind, IntoSystemConfigs};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::clock::SimulationClock;
use crate::config::DispatchConfig;
use crate::ecs::Ride;
use crate::simulation::Simulator;
use crate::systems::{
    movement::ride_movement_system, trip_completed::trip_completed_system,
    trip_started::trip_started_system,
};

fn has_rides(rides: Query<(), With<Ride>>) -> bool {
    !rides.is_empty()
}

/// Movement, then pickup, then release: a ride that arrives this tick starts
/// its trip on a later tick once the dwell has passed.
pub fn tick_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            ride_movement_system,
            trip_started_system,
            trip_completed_system,
        )
            .chain()
            .run_if(has_rides),
    );
    schedule
}

/// One tick at wall time `wall_ms`.
pub fn run_tick(world: &mut World, schedule: &mut Schedule, wall_ms: u64) {
    let speed_multiplier = world.resource::<DispatchConfig>().speed_multiplier;
    world
        .resource_mut::<SimulationClock>()
        .advance(wall_ms, speed_multiplier);
    schedule.run(world);
}

/// Handle to a running tick loop.
#[derive(Debug)]
pub struct SimulationRunner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<u64>,
}

impl SimulationRunner {
    /// Start ticking `simulator` on the current tokio runtime.
    pub fn spawn(simulator: Arc<Simulator>) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let period_ms = simulator.config().tick_interval_ms.max(1);
        simulator.resume_clock();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(period_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_ms, "simulation runner started");

            let mut ticks = 0u64;
            loop {
                tokio::select! {
                    biased;
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        simulator.tick();
                        ticks += 1;
                    }
                }
            }

            info!(ticks, "simulation runner stopped");
            ticks
        });

        Self { shutdown, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it. Returns the number of ticks run.
    pub async fn stop(self) -> u64 {
        // The receiver is gone only if the task already ended.
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(ticks) => ticks,
            Err(err) => {
                warn!(%err, "simulation runner task failed");
                0
            }
        }
    }
}
