use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::error::Result;
use crate::graph::{Graph, Node, NodeIndex};
use crate::routing::CostType;
use crate::spatial::MINUTES_PER_KM;

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    priority: f64,
    node: NodeIndex,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by priority, then by node.
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Costs and predecessors left behind by a search. Indexed by `NodeIndex`.
#[derive(Debug, Clone)]
pub struct SearchTree {
    pub costs: Vec<f64>,
    pub predecessors: Vec<Option<NodeIndex>>,
    /// Nodes popped and expanded (including the goal).
    pub settled: usize,
}

impl SearchTree {
    /// Best known cost from the start, if the node was reached.
    pub fn cost_to(&self, node: NodeIndex) -> Option<f64> {
        self.costs
            .get(node.index())
            .copied()
            .filter(|cost| cost.is_finite())
    }
}

/// Dijkstra's algorithm; stops as soon as `goal` is popped.
pub fn dijkstra(
    graph: &Graph,
    start: NodeIndex,
    goal: NodeIndex,
    cost_type: CostType,
) -> Result<SearchTree> {
    best_first(graph, start, goal, cost_type, |_| 0.0)
}

/// A* with a great-circle heuristic (scaled to minutes when optimising time).
pub fn a_star(
    graph: &Graph,
    start: NodeIndex,
    goal: NodeIndex,
    cost_type: CostType,
) -> Result<SearchTree> {
    let target = graph.node(goal)?.coordinate;
    let scale = match cost_type {
        CostType::Distance => 1.0,
        CostType::Time => MINUTES_PER_KM,
    };
    best_first(graph, start, goal, cost_type, |node| {
        node.coordinate.distance_km(&target) * scale
    })
}

fn best_first<H>(
    graph: &Graph,
    start: NodeIndex,
    goal: NodeIndex,
    cost_type: CostType,
    heuristic: H,
) -> Result<SearchTree>
where
    H: Fn(&Node) -> f64,
{
    let start_node = graph.node(start)?;
    graph.node(goal)?;

    let n = graph.len();
    let mut costs = vec![f64::INFINITY; n];
    let mut predecessors: Vec<Option<NodeIndex>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut queue = BinaryHeap::new();
    let mut settled = 0;

    costs[start.index()] = 0.0;
    queue.push(QueueEntry {
        priority: heuristic(start_node),
        node: start,
    });

    while let Some(QueueEntry { node: current, .. }) = queue.pop() {
        if visited[current.index()] {
            continue;
        }
        visited[current.index()] = true;
        settled += 1;

        if current == goal {
            break;
        }

        let current_cost = costs[current.index()];
        for &(next, edge) in graph.node(current)?.neighbors() {
            if visited[next.index()] {
                continue;
            }
            let tentative = current_cost + cost_type.edge_weight(&edge);
            if tentative < costs[next.index()] {
                costs[next.index()] = tentative;
                predecessors[next.index()] = Some(current);
                queue.push(QueueEntry {
                    priority: tentative + heuristic(graph.node(next)?),
                    node: next,
                });
            }
        }
    }

    debug!(
        %start,
        %goal,
        %cost_type,
        settled,
        reached = costs[goal.index()].is_finite(),
        "search finished"
    );

    Ok(SearchTree {
        costs,
        predecessors,
        settled,
    })
}
