use std::fs;

use dispatch_core::error::{DispatchError, EntityKind};
use dispatch_core::graph::io::{load_graph, save_graph, GraphStore, JsonGraphStore};
use dispatch_core::graph::Graph;
use dispatch_core::routing::{find_path, Algorithm, CostType};
use dispatch_core::scenario::demo_city_graph;
use tempfile::tempdir;

#[test]
fn demo_city_survives_a_round_trip() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("maps").join("city_graph.json");
    let original = demo_city_graph().expect("demo city");

    JsonGraphStore.save(&original, &path).expect("save");
    let reloaded = JsonGraphStore.load(&path).expect("load");

    assert_eq!(reloaded.len(), original.len());
    assert_eq!(reloaded.edge_count(), original.edge_count());
    for (_, node) in original.nodes() {
        let copy = reloaded.get_node(&node.id).expect("node");
        assert_eq!(copy.coordinate, node.coordinate);
        assert_eq!(copy.name, node.name);
    }
    let before = find_path(&original, "1", "8", Algorithm::Dijkstra, CostType::Time).expect("path");
    let after = find_path(&reloaded, "1", "8", Algorithm::Dijkstra, CostType::Time).expect("path");
    assert_eq!(before.nodes, after.nodes);
}

#[test]
fn one_way_roads_stay_one_way() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("one_way.json");
    let mut graph = Graph::new();
    graph.add_node("a", 0.0, 0.0, None).expect("a");
    graph.add_node("b", 0.0, 0.01, None).expect("b");
    graph.add_edge("a", "b", 1.2, 3.0, false).expect("a->b");

    save_graph(&graph, &path).expect("save");
    let reloaded = load_graph(&path).expect("load");
    let a = reloaded.node_index("a").expect("a");
    let b = reloaded.node_index("b").expect("b");
    assert_eq!(reloaded.edge_count(), 1);
    assert!(reloaded.edge_cost(a, b).is_some());
    assert!(reloaded.edge_cost(b, a).is_none());
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempdir().expect("tempdir");
    let err = load_graph(&dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(
        err,
        DispatchError::NotFound {
            kind: EntityKind::GraphFile,
            ..
        }
    ));
}

#[test]
fn malformed_files_never_load_as_empty_graphs() {
    let dir = tempdir().expect("tempdir");

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "not json").expect("write");
    assert!(matches!(load_graph(&garbage), Err(DispatchError::Parse(_))));

    let bad_coordinate = dir.path().join("bad_coordinate.json");
    fs::write(
        &bad_coordinate,
        r#"{"nodes": [{"id": "1", "lat": 120.0, "lng": 0.0}], "edges": []}"#,
    )
    .expect("write");
    assert!(matches!(
        load_graph(&bad_coordinate),
        Err(DispatchError::MalformedGraph(_))
    ));

    let negative_cost = dir.path().join("negative_cost.json");
    fs::write(
        &negative_cost,
        r#"{"nodes": [{"id": "1", "lat": 0.0, "lng": 0.0}, {"id": "2", "lat": 0.0, "lng": 0.01}],
            "edges": [{"from": "1", "to": "2", "distance": -1.0, "time": 2.0}]}"#,
    )
    .expect("write");
    assert!(matches!(
        load_graph(&negative_cost),
        Err(DispatchError::MalformedGraph(_))
    ));
}
