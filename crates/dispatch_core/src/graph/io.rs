//! Graph persistence: node and edge lists serialized as JSON.
//!
//! Every directed edge is written as its own record and reloaded with
//! `bidirectional = false`, so a save/load round trip keeps one-way roads one-way.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DispatchError, EntityKind, Result};
use crate::graph::Graph;

#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    lat: f64,
    lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    from: String,
    to: String,
    distance: f64,
    time: f64,
}

/// Load/save contract for graph persistence backends.
pub trait GraphStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<Graph>;
    fn save(&self, graph: &Graph, path: &Path) -> Result<()>;
}

/// Pretty-printed JSON files on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonGraphStore;

impl GraphStore for JsonGraphStore {
    fn load(&self, path: &Path) -> Result<Graph> {
        load_graph(path)
    }

    fn save(&self, graph: &Graph, path: &Path) -> Result<()> {
        save_graph(graph, path)
    }
}

impl Graph {
    pub fn to_json(&self) -> Result<String> {
        let file = GraphFile {
            nodes: self
                .nodes()
                .map(|(_, node)| NodeRecord {
                    id: node.id.clone(),
                    lat: node.coordinate.lat,
                    lng: node.coordinate.lng,
                    name: node.name.clone(),
                })
                .collect(),
            edges: self
                .edges()
                .map(|(from, to, cost)| EdgeRecord {
                    from: from.id.clone(),
                    to: to.id.clone(),
                    distance: cost.distance_km,
                    time: cost.time_min,
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Parse a graph document. Edges are inserted exactly as listed.
    pub fn from_json(data: &str) -> Result<Graph> {
        let file: GraphFile = serde_json::from_str(data)?;
        let mut graph = Graph::new();
        for node in file.nodes {
            graph
                .add_node(node.id.clone(), node.lat, node.lng, node.name.as_deref())
                .map_err(|err| {
                    DispatchError::MalformedGraph(format!("node {}: {err}", node.id))
                })?;
        }
        for edge in file.edges {
            graph
                .add_edge(&edge.from, &edge.to, edge.distance, edge.time, false)
                .map_err(|err| {
                    DispatchError::MalformedGraph(format!(
                        "edge {} -> {}: {err}",
                        edge.from, edge.to
                    ))
                })?;
        }
        Ok(graph)
    }
}

pub fn load_graph(path: &Path) -> Result<Graph> {
    if !path.exists() {
        return Err(DispatchError::not_found(
            EntityKind::GraphFile,
            path.display(),
        ));
    }
    let data = fs::read_to_string(path)?;
    let graph = Graph::from_json(&data)?;
    info!(
        path = %path.display(),
        nodes = graph.len(),
        edges = graph.edge_count(),
        "loaded city graph"
    );
    Ok(graph)
}

pub fn save_graph(graph: &Graph, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, graph.to_json()?)?;
    debug!(path = %path.display(), nodes = graph.len(), "saved city graph");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_keeps_listed_direction_only() {
        let data = r#"{
            "nodes": [
                {"id": "1", "lat": 12.97, "lng": 77.59, "name": "Majestic"},
                {"id": "2", "lat": 12.98, "lng": 77.60}
            ],
            "edges": [{"from": "1", "to": "2", "distance": 1.5, "time": 8.0}]
        }"#;
        let graph = Graph::from_json(data).expect("graph");
        let one = graph.node_index("1").expect("1");
        let two = graph.node_index("2").expect("2");
        assert!(graph.edge_cost(one, two).is_some());
        assert!(graph.edge_cost(two, one).is_none());
        assert_eq!(graph.get_node("2").expect("2").name, None);
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = Graph::from_json("{\"nodes\": [").expect_err("truncated");
        assert!(matches!(err, DispatchError::Parse(_)));
    }

    #[test]
    fn dangling_edges_are_malformed() {
        let data = r#"{"nodes": [{"id": "1", "lat": 0.0, "lng": 0.0}],
                       "edges": [{"from": "1", "to": "9", "distance": 1.0, "time": 1.0}]}"#;
        let err = Graph::from_json(data).expect_err("dangling edge");
        assert!(matches!(err, DispatchError::MalformedGraph(_)));
    }
}
