//! Graph store: city intersections connected by directed roads.
//!
//! Nodes live in a dense table addressed by [`NodeIndex`]; string ids resolve to
//! indices through a hash map. Every directed edge carries both a distance and a
//! travel time so the pathfinder can optimise either dimension. Edges are not
//! assumed symmetric: `add_edge(.., bidirectional = false)` stores one direction
//! only, and that is how files are reloaded.

pub mod io;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, EntityKind, Result};
use crate::spatial::Coordinate;

/// Opaque handle of a node inside one [`Graph`]. Handles are assigned in
/// insertion order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cost pair of one directed road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeCost {
    pub distance_km: f64,
    pub time_min: f64,
}

impl EdgeCost {
    pub fn new(distance_km: f64, time_min: f64) -> Result<Self> {
        for (label, value) in [("distance", distance_km), ("time", time_min)] {
            if !value.is_finite() || value < 0.0 {
                return Err(DispatchError::invalid(format!(
                    "edge {label} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(Self {
            distance_km,
            time_min,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub coordinate: Coordinate,
    pub name: Option<String>,
    adjacency: Vec<(NodeIndex, EdgeCost)>,
}

impl Node {
    /// Outgoing edges in insertion order.
    pub fn neighbors(&self) -> &[(NodeIndex, EdgeCost)] {
        &self.adjacency
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Node {}", self.id))
    }

    fn upsert_edge(&mut self, to: NodeIndex, cost: EdgeCost) {
        match self.adjacency.iter_mut().find(|(target, _)| *target == to) {
            Some(existing) => existing.1 = cost,
            None => self.adjacency.push((to, cost)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|node| node.adjacency.len()).sum()
    }

    /// Insert a node. Ids must be unique and coordinates valid.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        lat: f64,
        lng: f64,
        name: Option<&str>,
    ) -> Result<NodeIndex> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(DispatchError::invalid(format!("duplicate node id {id}")));
        }
        let coordinate = Coordinate::validated(lat, lng)?;
        let handle = NodeIndex(self.nodes.len() as u32);
        self.index.insert(id.clone(), handle);
        self.nodes.push(Node {
            id,
            coordinate,
            name: name.map(str::to_owned),
            adjacency: Vec::new(),
        });
        Ok(handle)
    }

    /// Add a road from `from` to `to`, and back again when `bidirectional`.
    /// Re-adding an existing directed edge replaces its costs.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        distance_km: f64,
        time_min: f64,
        bidirectional: bool,
    ) -> Result<()> {
        let cost = EdgeCost::new(distance_km, time_min)?;
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;
        self.nodes[from_idx.index()].upsert_edge(to_idx, cost);
        if bidirectional {
            self.nodes[to_idx.index()].upsert_edge(from_idx, cost);
        }
        Ok(())
    }

    pub fn node_index(&self, id: &str) -> Result<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DispatchError::not_found(EntityKind::Node, id))
    }

    pub fn get_node(&self, id: &str) -> Result<&Node> {
        let idx = self.node_index(id)?;
        self.node(idx)
    }

    /// Resolve a handle. Handles from another graph fail with NotFound.
    pub fn node(&self, idx: NodeIndex) -> Result<&Node> {
        self.nodes
            .get(idx.index())
            .ok_or_else(|| DispatchError::not_found(EntityKind::Node, idx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeIndex(i as u32), node))
    }

    /// Every directed edge as `(from, to, cost)`.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node, EdgeCost)> {
        self.nodes.iter().flat_map(move |node| {
            node.adjacency
                .iter()
                .map(move |(to, cost)| (node, &self.nodes[to.index()], *cost))
        })
    }

    pub fn edge_cost(&self, from: NodeIndex, to: NodeIndex) -> Option<EdgeCost> {
        self.nodes.get(from.index()).and_then(|node| {
            node.adjacency
                .iter()
                .find(|(target, _)| *target == to)
                .map(|(_, cost)| *cost)
        })
    }

    /// Closest node by great-circle distance, scanning every node. The first
    /// node reaching the strict minimum wins, so ties go to insertion order.
    pub fn nearest_node(&self, location: Coordinate) -> Result<(NodeIndex, f64)> {
        let mut best: Option<(NodeIndex, f64)> = None;
        for (idx, node) in self.nodes() {
            let distance = location.distance_km(&node.coordinate);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((idx, distance)),
            }
        }
        best.ok_or_else(|| DispatchError::not_found(EntityKind::Node, "nearest node of empty graph"))
    }

    /// South-west and north-east corners spanning every node.
    pub fn bounding_box(&self) -> Option<(Coordinate, Coordinate)> {
        let first = self.nodes.first()?.coordinate;
        let (mut min, mut max) = (first, first);
        for node in &self.nodes {
            min.lat = min.lat.min(node.coordinate.lat);
            min.lng = min.lng.min(node.coordinate.lng);
            max.lat = max.lat.max(node.coordinate.lat);
            max.lng = max.lng.max(node.coordinate.lng);
        }
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut graph = Graph::new();
        graph.add_node("a", 0.0, 0.0, Some("Alpha")).expect("a");
        graph.add_node("b", 0.0, 0.01, None).expect("b");
        graph.add_node("c", 0.01, 0.0, None).expect("c");
        graph.add_edge("a", "b", 1.1, 3.0, true).expect("a-b");
        graph.add_edge("b", "c", 1.6, 4.0, false).expect("b-c");
        graph
    }

    #[test]
    fn edges_respect_direction() {
        let graph = triangle();
        let a = graph.node_index("a").expect("a");
        let b = graph.node_index("b").expect("b");
        let c = graph.node_index("c").expect("c");
        assert!(graph.edge_cost(a, b).is_some());
        assert!(graph.edge_cost(b, a).is_some());
        assert!(graph.edge_cost(b, c).is_some());
        assert!(graph.edge_cost(c, b).is_none());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn re_adding_an_edge_replaces_costs() {
        let mut graph = triangle();
        graph.add_edge("b", "c", 2.0, 9.0, false).expect("replace");
        let b = graph.node_index("b").expect("b");
        let c = graph.node_index("c").expect("c");
        assert_eq!(graph.edge_cost(b, c), Some(EdgeCost::new(2.0, 9.0).expect("cost")));
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn rejects_negative_costs_and_unknown_nodes() {
        let mut graph = triangle();
        assert!(matches!(
            graph.add_edge("a", "c", -1.0, 1.0, true),
            Err(DispatchError::InvalidArgument(_))
        ));
        assert!(graph.add_edge("a", "zz", 1.0, 1.0, true).is_err_and(|e| e.is_not_found()));
        assert!(graph.add_node("a", 1.0, 1.0, None).is_err());
    }

    #[test]
    fn nearest_node_breaks_ties_by_insertion_order() {
        let mut graph = Graph::new();
        graph.add_node("west", 0.0, -0.01, None).expect("west");
        graph.add_node("east", 0.0, 0.01, None).expect("east");
        let (idx, distance) = graph
            .nearest_node(Coordinate::new(0.0, 0.0))
            .expect("nearest");
        assert_eq!(graph.node(idx).expect("node").id, "west");
        assert!(distance > 1.0 && distance < 1.2);
    }

    #[test]
    fn nearest_node_on_empty_graph_is_not_found() {
        let graph = Graph::new();
        assert!(graph
            .nearest_node(Coordinate::new(0.0, 0.0))
            .is_err_and(|e| e.is_not_found()));
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let graph = triangle();
        assert_eq!(graph.get_node("a").expect("a").display_name(), "Alpha");
        assert_eq!(graph.get_node("b").expect("b").display_name(), "Node b");
    }

    #[test]
    fn bounding_box_spans_all_nodes() {
        let graph = triangle();
        let (sw, ne) = graph.bounding_box().expect("bbox");
        assert_eq!(sw, Coordinate::new(0.0, 0.0));
        assert_eq!(ne, Coordinate::new(0.01, 0.01));
    }
}
