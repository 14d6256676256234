//! The substrate every strategy runs on: a read-only view of the network and a controller which
//! moves requests and contents around and mutates the node caches.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::warn;

use crate::cache::{ContentCache, GenericCache, StaticStore};
use crate::collector::{Collector, NullCollector};
use crate::config::ReplacementPolicyConfig;
use crate::error::StrategyError;
use crate::topology::Topology;
use crate::{ContentId, NodeId, Time};

/// Read-only queries over the topology and the current content placement
pub trait NetworkView {
    fn content_source(&self, content: ContentId) -> Option<NodeId>;

    /// The shortest path between two nodes, endpoints included. `None` if they aren't connected
    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>>;

    fn has_cache(&self, node: NodeId) -> bool;

    /// Cache nodes in a fixed, ascending order
    fn cache_nodes(&self) -> Vec<NodeId>;

    /// Total cache budget of a node, static and dynamic partitions together
    fn cache_size(&self, node: NodeId) -> Option<usize>;

    /// The source of a content plus every cache currently holding it
    fn content_locations(&self, content: ContentId) -> BTreeSet<NodeId>;

    /// Checks whether a node caches a content, without touching its replacement state
    fn cache_lookup(&self, node: NodeId, content: ContentId) -> bool;

    fn link_delay(&self, u: NodeId, v: NodeId) -> Option<f64>;

    fn receivers(&self) -> Vec<NodeId>;

    fn topology(&self) -> &Topology;
}

/// Mutating operations, all scoped to the currently open session
///
/// A session brackets exactly one request. `get` and `put` operations act on the content of the
/// open session
pub trait NetworkController {
    fn start_session(
        &mut self,
        time: Time,
        receiver: NodeId,
        content: ContentId,
        log: bool,
    ) -> Result<(), StrategyError>;

    fn end_session(&mut self, success: bool) -> Result<(), StrategyError>;

    fn forward_request_hop(&mut self, u: NodeId, v: NodeId);

    fn forward_request_path(&mut self, path: &[NodeId]) {
        for hop in path.windows(2) {
            self.forward_request_hop(hop[0], hop[1]);
        }
    }

    /// Forwards content over a link of the primary delivery path
    fn forward_content_hop(&mut self, u: NodeId, v: NodeId);

    /// Forwards content along a path. `main_path` is false for auxiliary copies, e.g. the branch of
    /// a multicast delivery which only feeds a cache
    fn forward_content_path(&mut self, path: &[NodeId], main_path: bool);

    /// Looks the session content up at a node: a cache hit, or the node being its source
    fn get_content(&mut self, node: NodeId) -> bool;

    /// Inserts the session content at a node, returning what was evicted. No-op on nodes without
    /// a cache
    fn put_content(&mut self, node: NodeId) -> Option<ContentId>;

    fn get_static_content(&mut self, node: NodeId) -> bool;

    /// Returns true if the content is held by the static partition after the call
    fn put_static_content(&mut self, node: NodeId) -> bool;

    fn get_dynamic_content(&mut self, node: NodeId) -> bool;

    fn put_dynamic_content(&mut self, node: NodeId) -> Option<ContentId>;

    /// Splits the budget of a cache node into a static partition of `static_capacity` entries and
    /// a dynamic partition holding the rest. Both partitions start empty
    fn partition_cache(&mut self, node: NodeId, static_capacity: usize) -> Result<(), StrategyError>;

    /// Passes strategy-level instrumentation to the attached collector
    fn record(&mut self, metric: &str, value: f64);
}

/// Everything a strategy needs for one request
pub trait Network: NetworkView + NetworkController {}

impl<T: NetworkView + NetworkController + ?Sized> Network for T {}

#[derive(Debug, Clone, Copy)]
struct Session {
    content: ContentId,
    log: bool,
}

/// In-memory network: topology, precomputed shortest paths and per-node caches
///
/// Traffic of logged sessions is reported to the collector `C`
pub struct NetworkModel<C: Collector = NullCollector> {
    topology: Topology,
    paths: HashMap<(NodeId, NodeId), Vec<NodeId>>,
    caches: BTreeMap<NodeId, GenericCache>,
    static_caches: BTreeMap<NodeId, StaticStore>,
    session: Option<Session>,
    collector: C,
}

impl NetworkModel<NullCollector> {
    pub fn new(topology: Topology, policy: ReplacementPolicyConfig) -> Self {
        Self::with_collector(topology, policy, NullCollector)
    }
}

impl<C: Collector> NetworkModel<C> {
    pub fn with_collector(topology: Topology, policy: ReplacementPolicyConfig, collector: C) -> Self {
        let caches = topology
            .cache_nodes()
            .into_iter()
            .filter_map(|node| Some((node, GenericCache::with_policy(topology.cache_size(node)?, policy))))
            .collect();
        Self {
            paths: topology.all_pairs_shortest_paths(),
            topology,
            caches,
            static_caches: BTreeMap::new(),
            session: None,
            collector,
        }
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// The dynamic (regular) cache of a node
    pub fn cache(&self, node: NodeId) -> Option<&GenericCache> {
        self.caches.get(&node)
    }

    pub fn static_cache(&self, node: NodeId) -> Option<&StaticStore> {
        self.static_caches.get(&node)
    }

    /// Every content cached at a node, static partition first
    pub fn cache_dump(&self, node: NodeId) -> Vec<ContentId> {
        let mut dump: Vec<ContentId> = self
            .static_caches
            .get(&node)
            .map(|s| s.contents().to_vec())
            .unwrap_or_default();
        if let Some(cache) = self.caches.get(&node) {
            dump.extend(cache.contents());
        }
        dump
    }

    pub fn session_open(&self) -> bool {
        self.session.is_some()
    }

    fn session_content(&self, operation: &str) -> Option<ContentId> {
        if self.session.is_none() {
            warn!(operation, "controller call outside of a session ignored");
        }
        self.session.map(|s| s.content)
    }

    fn logging(&self) -> bool {
        self.session.map_or(false, |s| s.log)
    }

    fn is_source_of(&self, node: NodeId, content: ContentId) -> bool {
        self.topology.content_source(content) == Some(node)
    }

    fn lookup_dynamic(&mut self, node: NodeId) -> bool {
        let Some(content) = self.session_content("get_content") else {
            return false;
        };
        let log = self.logging();
        if let Some(cache) = self.caches.get_mut(&node) {
            if cache.get(content) {
                if log {
                    self.collector.cache_hit(node);
                }
                return true;
            }
            if log {
                self.collector.cache_miss(node);
            }
        }
        if self.is_source_of(node, content) {
            if log {
                self.collector.server_hit(node);
            }
            return true;
        }
        false
    }

    fn insert_dynamic(&mut self, node: NodeId) -> Option<ContentId> {
        let content = self.session_content("put_content")?;
        self.caches.get_mut(&node)?.put(content)
    }
}

impl<C: Collector> NetworkView for NetworkModel<C> {
    fn content_source(&self, content: ContentId) -> Option<NodeId> {
        self.topology.content_source(content)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        self.paths.get(&(from, to)).cloned()
    }

    fn has_cache(&self, node: NodeId) -> bool {
        self.caches.contains_key(&node)
    }

    fn cache_nodes(&self) -> Vec<NodeId> {
        self.caches.keys().copied().collect()
    }

    fn cache_size(&self, node: NodeId) -> Option<usize> {
        self.topology.cache_size(node)
    }

    fn content_locations(&self, content: ContentId) -> BTreeSet<NodeId> {
        let mut locations: BTreeSet<NodeId> = self
            .caches
            .keys()
            .copied()
            .filter(|node| self.cache_lookup(*node, content))
            .collect();
        locations.extend(self.topology.content_source(content));
        locations
    }

    fn cache_lookup(&self, node: NodeId, content: ContentId) -> bool {
        self.caches.get(&node).map_or(false, |c| c.has(content))
            || self.static_caches.get(&node).map_or(false, |s| s.has(content))
    }

    fn link_delay(&self, u: NodeId, v: NodeId) -> Option<f64> {
        self.topology.link_delay(u, v)
    }

    fn receivers(&self) -> Vec<NodeId> {
        self.topology.receivers()
    }

    fn topology(&self) -> &Topology {
        &self.topology
    }
}

impl<C: Collector> NetworkController for NetworkModel<C> {
    fn start_session(
        &mut self,
        time: Time,
        receiver: NodeId,
        content: ContentId,
        log: bool,
    ) -> Result<(), StrategyError> {
        if self.session.is_some() {
            return Err(StrategyError::SessionAlreadyOpen);
        }
        self.session = Some(Session { content, log });
        if log {
            self.collector.start_session(time, receiver, content);
        }
        Ok(())
    }

    fn end_session(&mut self, success: bool) -> Result<(), StrategyError> {
        let session = self.session.take().ok_or(StrategyError::NoOpenSession)?;
        if session.log {
            self.collector.end_session(success);
        }
        Ok(())
    }

    fn forward_request_hop(&mut self, u: NodeId, v: NodeId) {
        if self.logging() {
            self.collector.request_hop(u, v, true);
        }
    }

    fn forward_content_hop(&mut self, u: NodeId, v: NodeId) {
        if self.logging() {
            self.collector.content_hop(u, v, true);
        }
    }

    fn forward_content_path(&mut self, path: &[NodeId], main_path: bool) {
        if self.logging() {
            for hop in path.windows(2) {
                self.collector.content_hop(hop[0], hop[1], main_path);
            }
        }
    }

    fn get_content(&mut self, node: NodeId) -> bool {
        self.lookup_dynamic(node)
    }

    fn put_content(&mut self, node: NodeId) -> Option<ContentId> {
        self.insert_dynamic(node)
    }

    fn get_static_content(&mut self, node: NodeId) -> bool {
        let Some(content) = self.session_content("get_static_content") else {
            return false;
        };
        let hit = self.static_caches.get(&node).map_or(false, |s| s.has(content));
        if hit && self.logging() {
            self.collector.cache_hit(node);
        }
        hit
    }

    fn put_static_content(&mut self, node: NodeId) -> bool {
        let Some(content) = self.session_content("put_static_content") else {
            return false;
        };
        self.static_caches.get_mut(&node).map_or(false, |s| s.insert(content))
    }

    fn get_dynamic_content(&mut self, node: NodeId) -> bool {
        self.lookup_dynamic(node)
    }

    fn put_dynamic_content(&mut self, node: NodeId) -> Option<ContentId> {
        self.insert_dynamic(node)
    }

    fn partition_cache(&mut self, node: NodeId, static_capacity: usize) -> Result<(), StrategyError> {
        let total = self
            .topology
            .cache_size(node)
            .ok_or_else(|| StrategyError::invalid("node", node, "has no cache to partition"))?;
        if static_capacity > total {
            return Err(StrategyError::invalid(
                "static_capacity",
                static_capacity,
                "exceeds the node's cache budget",
            ));
        }
        let policy = self
            .caches
            .get(&node)
            .map_or(ReplacementPolicyConfig::default(), GenericCache::policy);
        if self.caches.get(&node).map_or(false, |c| !c.is_empty()) {
            warn!(node, "partitioning a non-empty cache drops its contents");
        }
        self.caches.insert(node, GenericCache::with_policy(total - static_capacity, policy));
        self.static_caches.insert(node, StaticStore::new(static_capacity));
        Ok(())
    }

    fn record(&mut self, metric: &str, value: f64) {
        self.collector.record(metric, value);
    }
}
