//! Shared fixtures for unit and integration tests.
//!
//! Graphs here are small and hand-built so that expected routes can be worked
//! out on paper.

use std::sync::Arc;

use crate::clock::ManualClock;
use crate::config::DispatchConfig;
use crate::graph::Graph;
use crate::simulation::Simulator;
use crate::spatial::haversine_km;

/// Wall-clock start of every [`ManualClock`] handed out here.
pub const TEST_EPOCH_MS: u64 = 1_700_000_000_000;

/// Origin of [`grid_graph`].
const GRID_ORIGIN: (f64, f64) = (12.9, 77.5);
const GRID_SPACING_DEG: f64 = 0.01;

/// `A(0,0) - B(0,1) - C(0,2)`, two-way. Each road is 111.2 km and 240 min.
///
/// # Panics
///
/// Panics if the fixture is rejected by the graph (should never happen).
pub fn line_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_node("A", 0.0, 0.0, Some("Alpha")).expect("A");
    graph.add_node("B", 0.0, 1.0, Some("Bravo")).expect("B");
    graph.add_node("C", 0.0, 2.0, Some("Charlie")).expect("C");
    graph.add_edge("A", "B", 111.2, 240.0, true).expect("A-B");
    graph.add_edge("B", "C", 111.2, 240.0, true).expect("B-C");
    graph
}

/// `s` and `t` joined by a short congested road (1 km, 20 min) and by a ring
/// road through `m` (3 km, 6 min in total).
///
/// # Panics
///
/// Panics if the fixture is rejected by the graph (should never happen).
pub fn shortcut_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_node("s", 0.0, 0.0, None).expect("s");
    graph.add_node("t", 0.0, 0.009, None).expect("t");
    graph.add_node("m", 0.01, 0.0045, None).expect("m");
    graph.add_edge("s", "t", 1.0, 20.0, true).expect("s-t");
    graph.add_edge("s", "m", 1.5, 3.0, true).expect("s-m");
    graph.add_edge("m", "t", 1.5, 3.0, true).expect("m-t");
    graph
}

/// `rows x cols` lattice with ids `"r_c"`. Every road is as long as the
/// great-circle distance between its ends and takes 3 min/km, so both A* cost
/// types are admissible on it.
///
/// # Panics
///
/// Panics if the fixture is rejected by the graph (should never happen).
pub fn grid_graph(rows: usize, cols: usize) -> Graph {
    let mut graph = Graph::new();
    let mut coordinates = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            let lat = GRID_ORIGIN.0 + r as f64 * GRID_SPACING_DEG;
            let lng = GRID_ORIGIN.1 + c as f64 * GRID_SPACING_DEG;
            graph
                .add_node(format!("{r}_{c}"), lat, lng, None)
                .expect("grid node");
            coordinates.push((lat, lng));
        }
    }

    let mut connect = |a: (usize, usize), b: (usize, usize)| {
        let (lat1, lng1) = coordinates[a.0 * cols + a.1];
        let (lat2, lng2) = coordinates[b.0 * cols + b.1];
        let km = haversine_km(lat1, lng1, lat2, lng2);
        graph
            .add_edge(
                &format!("{}_{}", a.0, a.1),
                &format!("{}_{}", b.0, b.1),
                km,
                3.0 * km,
                true,
            )
            .expect("grid edge");
    };
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                connect((r, c), (r, c + 1));
            }
            if r + 1 < rows {
                connect((r, c), (r + 1, c));
            }
        }
    }
    graph
}

/// A pickup `P` with a river to its east. `X` sits just across the river
/// (1.1 km away by air) but has to drive north around it (12.4 km, 33 min);
/// `W` is twice as far by air but has a direct road (2.3 km, 6 min).
///
/// ```text
///   Z ----- Y
///   |       |
///   W - P ~ X
/// ```
///
/// # Panics
///
/// Panics if the fixture is rejected by the graph (should never happen).
pub fn river_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_node("P", 0.0, 0.0, Some("Pickup")).expect("P");
    graph.add_node("X", 0.0, 0.01, Some("Across the river")).expect("X");
    graph.add_node("Y", 0.05, 0.01, Some("North bridge east")).expect("Y");
    graph.add_node("Z", 0.05, 0.0, Some("North bridge west")).expect("Z");
    graph.add_node("W", 0.0, -0.02, Some("West")).expect("W");
    graph.add_edge("X", "Y", 5.6, 15.0, true).expect("X-Y");
    graph.add_edge("Y", "Z", 1.2, 3.0, true).expect("Y-Z");
    graph.add_edge("Z", "P", 5.6, 15.0, true).expect("Z-P");
    graph.add_edge("W", "P", 2.3, 6.0, true).expect("W-P");
    graph
}

pub fn manual_clock(local_hour: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(TEST_EPOCH_MS, local_hour))
}

/// Simulator on `graph` with default settings, driven by `clock`.
///
/// # Panics
///
/// Panics if the default configuration is rejected (should never happen).
pub fn test_simulator(graph: Graph, clock: Arc<ManualClock>) -> Simulator {
    test_simulator_with(graph, clock, DispatchConfig::default())
}

/// # Panics
///
/// Panics if `config` is invalid.
pub fn test_simulator_with(
    graph: Graph,
    clock: Arc<ManualClock>,
    config: DispatchConfig,
) -> Simulator {
    Simulator::new(Arc::new(graph), config, clock).expect("test simulator")
}
