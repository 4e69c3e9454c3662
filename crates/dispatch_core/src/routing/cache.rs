use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::trace;

use crate::error::Result;
use crate::graph::{Graph, NodeIndex};
use crate::routing::{find_path_between, Algorithm, CostType, PathDetails};

type RouteKey = (NodeIndex, NodeIndex, Algorithm, CostType);

/// Pathfinder over a shared, immutable graph with an LRU cache of resolved
/// routes. Only successful lookups are cached.
#[derive(Debug)]
pub struct Router {
    graph: Arc<Graph>,
    cache: Mutex<LruCache<RouteKey, PathDetails>>,
}

impl Router {
    pub fn new(graph: Arc<Graph>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            graph,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn route(
        &self,
        start: NodeIndex,
        goal: NodeIndex,
        algorithm: Algorithm,
        cost_type: CostType,
    ) -> Result<PathDetails> {
        let key = (start, goal, algorithm, cost_type);
        if let Some(hit) = self.lock_cache().get(&key) {
            trace!(%start, %goal, "route cache hit");
            return Ok(hit.clone());
        }

        let details = find_path_between(&self.graph, start, goal, algorithm, cost_type)?;
        self.lock_cache().put(key, details.clone());
        Ok(details)
    }

    /// Route between two node ids.
    pub fn route_by_id(
        &self,
        start: &str,
        goal: &str,
        algorithm: Algorithm,
        cost_type: CostType,
    ) -> Result<PathDetails> {
        let start = self.graph.node_index(start)?;
        let goal = self.graph.node_index(goal)?;
        self.route(start, goal, algorithm, cost_type)
    }

    pub fn cached_routes(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> MutexGuard<'_, LruCache<RouteKey, PathDetails>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
