//! Performance benchmarks for dispatch_core using Criterion.rs.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dispatch_core::clock::ManualClock;
use dispatch_core::config::DispatchConfig;
use dispatch_core::matching::{DriverMatcher, VehicleType};
use dispatch_core::pricing::FareSchedule;
use dispatch_core::routing::{find_path, Algorithm, CostType, Router};
use dispatch_core::scenario::scatter_drivers;
use dispatch_core::simulation::Simulator;
use dispatch_core::test_helpers::grid_graph;

fn bench_pathfinding(c: &mut Criterion) {
    let mut group = c.benchmark_group("pathfinding");
    for size in [10usize, 30, 60] {
        let graph = grid_graph(size, size);
        let goal = format!("{}_{}", size - 1, size - 1);
        for algorithm in [Algorithm::Dijkstra, Algorithm::AStar] {
            group.bench_with_input(
                BenchmarkId::new(algorithm.to_string(), size),
                &graph,
                |b, graph| {
                    b.iter(|| {
                        black_box(find_path(graph, "0_0", &goal, algorithm, CostType::Time))
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    for drivers in [50usize, 200, 1000] {
        let graph = Arc::new(grid_graph(30, 30));
        let router = Arc::new(Router::new(Arc::clone(&graph), 4096));
        let mut matcher = DriverMatcher::new(
            router,
            FareSchedule::default(),
            Arc::new(ManualClock::new(0, 12)),
        );
        for profile in scatter_drivers(&graph, drivers, 42).expect("scatter") {
            matcher
                .register_driver(profile.with_vehicle_type(VehicleType::Sedan))
                .expect("register");
        }
        let centre = graph.get_node("15_15").expect("centre").coordinate;
        let corner = graph.get_node("29_29").expect("corner").coordinate;
        let request = matcher
            .create_ride_request("bench", centre, Some(corner), VehicleType::Sedan)
            .expect("request");

        group.bench_with_input(BenchmarkId::from_parameter(drivers), &request, |b, request| {
            b.iter(|| black_box(matcher.match_driver_to_request(request, 5, 10.0)));
        });
    }
    group.finish();
}

fn bench_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_tick");
    for rides in [10usize, 100] {
        let clock = Arc::new(ManualClock::new(0, 12));
        let graph = Arc::new(grid_graph(30, 30));
        let config = DispatchConfig::default().with_release_grace_secs(3600.0);
        let sim = Simulator::new(Arc::clone(&graph), config, Arc::clone(&clock) as _)
            .expect("simulator");
        let drivers = scatter_drivers(&graph, rides, 7).expect("scatter");
        for (i, profile) in drivers.into_iter().enumerate() {
            let driver = sim.register_driver(profile).expect("register");
            let pickup = graph.get_node(&format!("{}_{}", i % 30, 0)).expect("pickup").coordinate;
            let dropoff = graph.get_node(&format!("{}_{}", i % 30, 29)).expect("dropoff").coordinate;
            let request = sim
                .create_ride_request("bench", pickup, Some(dropoff), VehicleType::Sedan)
                .expect("request");
            sim.confirm_ride(&request, driver).expect("confirm");
        }

        group.bench_function(BenchmarkId::from_parameter(rides), |b| {
            b.iter(|| {
                clock.advance_ms(100);
                black_box(sim.tick())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pathfinding, bench_matching, bench_ticks);
criterion_main!(benches);
