//! Pathfinding over the city graph.
//!
//! Two best-first searches share one implementation ([`search`]):
//!
//! - **Dijkstra**: priority = cost so far.
//! - **A\***: priority = cost so far + great-circle distance to the goal. When
//!   optimising time the distance is converted at 2 min/km (30 km/h). The
//!   heuristic is only admissible while every road is at least that slow; a
//!   faster road can make A\* return a costlier route than Dijkstra. This is
//!   left visible rather than corrected, so callers that need guaranteed optima
//!   should ask for [`Algorithm::Dijkstra`].
//!
//! Queue entries with equal priority pop in ascending [`NodeIndex`] order
//! (node insertion order), which makes the chosen path reproducible when
//! several optima exist.
//!
//! [`find_path`] runs a search, rebuilds the node sequence from the predecessor
//! table and aggregates both cost dimensions along it. [`Router`] adds an LRU
//! cache in front of that for an immutable shared graph.

mod cache;
mod path;
mod search;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};
use crate::graph::{EdgeCost, Graph, NodeIndex};

pub use cache::Router;
pub use path::{path_details, reconstruct_path, PathDetails, PathNode, PathSegment};
pub use search::{a_star, dijkstra, SearchTree};

/// Which edge weight drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    Distance,
    Time,
}

impl CostType {
    pub fn edge_weight(self, cost: &EdgeCost) -> f64 {
        match self {
            CostType::Distance => cost.distance_km,
            CostType::Time => cost.time_min,
        }
    }
}

impl FromStr for CostType {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distance" => Ok(CostType::Distance),
            "time" => Ok(CostType::Time),
            other => Err(DispatchError::invalid(format!(
                "cost_type must be 'time' or 'distance', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CostType::Distance => "distance",
            CostType::Time => "time",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Dijkstra,
    #[default]
    AStar,
}

impl FromStr for Algorithm {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dijkstra" => Ok(Algorithm::Dijkstra),
            "a_star" | "astar" | "a*" => Ok(Algorithm::AStar),
            other => Err(DispatchError::invalid(format!(
                "algorithm must be 'dijkstra' or 'a_star', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Dijkstra => "dijkstra",
            Algorithm::AStar => "a_star",
        })
    }
}

/// Shortest path between two node ids.
pub fn find_path(
    graph: &Graph,
    start: &str,
    goal: &str,
    algorithm: Algorithm,
    cost_type: CostType,
) -> Result<PathDetails> {
    let start = graph.node_index(start)?;
    let goal = graph.node_index(goal)?;
    find_path_between(graph, start, goal, algorithm, cost_type)
}

/// Shortest path between two node handles.
pub fn find_path_between(
    graph: &Graph,
    start: NodeIndex,
    goal: NodeIndex,
    algorithm: Algorithm,
    cost_type: CostType,
) -> Result<PathDetails> {
    let tree = match algorithm {
        Algorithm::Dijkstra => dijkstra(graph, start, goal, cost_type)?,
        Algorithm::AStar => a_star(graph, start, goal, cost_type)?,
    };
    let nodes = reconstruct_path(graph, &tree.predecessors, start, goal)?;
    path_details(graph, &nodes, algorithm, cost_type)
}
