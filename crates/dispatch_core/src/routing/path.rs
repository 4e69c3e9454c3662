use serde::Serialize;

use crate::error::{DispatchError, EntityKind, Result};
use crate::graph::{Graph, NodeIndex};
use crate::routing::{Algorithm, CostType};
use crate::spatial::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathNode {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

impl PathNode {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lng)
    }
}

/// One traversed road with both of its costs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathSegment {
    pub from: String,
    pub to: String,
    pub distance_km: f64,
    pub time_min: f64,
}

/// A resolved route. Totals are the sums over `segments` in both cost
/// dimensions, whichever one drove the search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDetails {
    pub nodes: Vec<PathNode>,
    #[serde(skip)]
    pub node_indices: Vec<NodeIndex>,
    pub total_distance_km: f64,
    pub total_time_min: f64,
    pub segments: Vec<PathSegment>,
    pub algorithm: Algorithm,
    pub cost_type: CostType,
}

impl PathDetails {
    /// Total in the requested dimension.
    pub fn cost(&self, cost_type: CostType) -> f64 {
        match cost_type {
            CostType::Distance => self.total_distance_km,
            CostType::Time => self.total_time_min,
        }
    }

    pub fn start(&self) -> Option<&PathNode> {
        self.nodes.first()
    }

    pub fn goal(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    pub fn hop_count(&self) -> usize {
        self.segments.len()
    }
}

/// Walk the predecessor table back from `goal` to `start`.
///
/// `start == goal` yields the single node. A goal with no predecessor is
/// unreachable; a chain that never arrives at `start` means the table is
/// corrupt and is reported instead of looping.
pub fn reconstruct_path(
    graph: &Graph,
    predecessors: &[Option<NodeIndex>],
    start: NodeIndex,
    goal: NodeIndex,
) -> Result<Vec<NodeIndex>> {
    if start == goal {
        return Ok(vec![start]);
    }

    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        let previous = predecessors.get(current.index()).copied().flatten();
        let Some(previous) = previous else {
            if current == goal {
                return Err(DispatchError::Unreachable {
                    from: graph.node(start)?.id.clone(),
                    to: graph.node(goal)?.id.clone(),
                });
            }
            return Err(DispatchError::invalid(format!(
                "predecessor chain from {goal} stops at {current} before reaching {start}"
            )));
        };
        path.push(previous);
        if path.len() > predecessors.len() + 1 {
            return Err(DispatchError::invalid(format!(
                "predecessor chain from {goal} loops without reaching {start}"
            )));
        }
        current = previous;
    }

    path.reverse();
    Ok(path)
}

/// Resolve a node sequence into coordinates, names, per-segment costs and
/// totals. Missing nodes or edges fail instead of being skipped.
pub fn path_details(
    graph: &Graph,
    path: &[NodeIndex],
    algorithm: Algorithm,
    cost_type: CostType,
) -> Result<PathDetails> {
    if path.is_empty() {
        return Err(DispatchError::invalid("path must contain at least one node"));
    }

    let mut nodes = Vec::with_capacity(path.len());
    for &idx in path {
        let node = graph.node(idx)?;
        nodes.push(PathNode {
            id: node.id.clone(),
            name: node.display_name(),
            lat: node.coordinate.lat,
            lng: node.coordinate.lng,
        });
    }

    let mut segments = Vec::with_capacity(path.len().saturating_sub(1));
    let mut total_distance_km = 0.0;
    let mut total_time_min = 0.0;
    for (pair, names) in path.windows(2).zip(nodes.windows(2)) {
        let cost = graph.edge_cost(pair[0], pair[1]).ok_or_else(|| {
            DispatchError::not_found(
                EntityKind::Edge,
                format!("{} -> {}", names[0].id, names[1].id),
            )
        })?;
        total_distance_km += cost.distance_km;
        total_time_min += cost.time_min;
        segments.push(PathSegment {
            from: names[0].id.clone(),
            to: names[1].id.clone(),
            distance_km: cost.distance_km,
            time_min: cost.time_min,
        });
    }

    Ok(PathDetails {
        nodes,
        node_indices: path.to_vec(),
        total_distance_km,
        total_time_min,
        segments,
        algorithm,
        cost_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::line_graph;

    fn handles(graph: &Graph) -> (NodeIndex, NodeIndex, NodeIndex) {
        (
            graph.node_index("A").expect("A"),
            graph.node_index("B").expect("B"),
            graph.node_index("C").expect("C"),
        )
    }

    #[test]
    fn single_node_path_has_zero_totals() {
        let graph = line_graph();
        let (a, _, _) = handles(&graph);
        let nodes = reconstruct_path(&graph, &[None, None, None], a, a).expect("path");
        assert_eq!(nodes, vec![a]);
        let details = path_details(&graph, &nodes, Algorithm::AStar, CostType::Time).expect("details");
        assert_eq!(details.nodes.len(), 1);
        assert!(details.segments.is_empty());
        assert_eq!(details.total_distance_km, 0.0);
        assert_eq!(details.total_time_min, 0.0);
    }

    #[test]
    fn missing_predecessor_is_unreachable() {
        let graph = line_graph();
        let (a, _, c) = handles(&graph);
        let err = reconstruct_path(&graph, &[None, None, None], a, c).expect_err("no chain");
        assert!(matches!(err, DispatchError::Unreachable { ref from, ref to } if from == "A" && to == "C"));
    }

    #[test]
    fn looping_chain_fails_loudly() {
        let graph = line_graph();
        let (a, b, c) = handles(&graph);
        // C -> B -> C -> ... never reaches A.
        let err = reconstruct_path(&graph, &[None, Some(c), Some(b)], a, c).expect_err("loop");
        assert!(matches!(err, DispatchError::InvalidArgument(_)));
    }

    #[test]
    fn missing_edge_is_reported() {
        let graph = line_graph();
        let (a, _, c) = handles(&graph);
        let err = path_details(&graph, &[a, c], Algorithm::Dijkstra, CostType::Distance)
            .expect_err("A and C are not adjacent");
        assert!(matches!(
            err,
            DispatchError::NotFound { kind: EntityKind::Edge, .. }
        ));
    }

    #[test]
    fn totals_sum_segments() {
        let graph = line_graph();
        let (a, b, c) = handles(&graph);
        let details = path_details(&graph, &[a, b, c], Algorithm::Dijkstra, CostType::Distance)
            .expect("details");
        assert_eq!(details.hop_count(), 2);
        let time: f64 = details.segments.iter().map(|s| s.time_min).sum();
        assert!((details.total_time_min - time).abs() < 1e-12);
        assert_eq!(details.start().map(|n| n.id.as_str()), Some("A"));
        assert_eq!(details.goal().map(|n| n.id.as_str()), Some("C"));
        assert_eq!(details.cost(CostType::Time), details.total_time_min);
    }
}
