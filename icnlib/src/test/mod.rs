use std::collections::BTreeSet;

use tracing_subscriber::EnvFilter;

use crate::config::ReplacementPolicyConfig;
use crate::error::StrategyError;
use crate::network::{NetworkController, NetworkModel, NetworkView};
use crate::strategy::{Event, Strategy};
use crate::topology::{NodeRole, Topology};
use crate::{ContentId, NodeId, Time};

mod offline;
mod onpath;

/// Installs a subscriber printing to the test output. Safe to call from every test
pub(crate) fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .with_test_writer()
        .try_init();
}

/// A line of `n` nodes, receiver 0 at one end, `source` serving `contents`
pub(crate) fn line_topology(
    n: NodeId,
    caches: &[(NodeId, usize)],
    source: NodeId,
    contents: impl IntoIterator<Item = ContentId>,
) -> Topology {
    let mut topology = Topology::path(n);
    for &(node, size) in caches {
        topology.set_cache(node, size).unwrap();
    }
    topology.add_contents(source, contents).unwrap();
    topology.set_role(0, NodeRole::Receiver).unwrap();
    topology
}

/// A topology from an edge list, every node a router until told otherwise
pub(crate) fn topology_from_edges(edges: &[(NodeId, NodeId)]) -> Topology {
    let nodes: BTreeSet<NodeId> = edges.iter().flat_map(|&(u, v)| [u, v]).collect();
    let mut topology = Topology::new();
    for node in nodes {
        topology.add_node(node, NodeRole::Router).unwrap();
    }
    for &(u, v) in edges {
        topology.add_edge(u, v, 1.0).unwrap();
    }
    topology
}

pub(crate) fn request(time: Time, receiver: NodeId, content: ContentId) -> Event {
    Event::new(time, receiver, content, true)
}

/// One controller call, as seen by a [`RecordingNetwork`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Start { receiver: NodeId, content: ContentId, log: bool },
    End,
    RequestHop(NodeId, NodeId),
    ContentHop(NodeId, NodeId, bool),
    Get(NodeId, bool),
    Put(NodeId),
    GetStatic(NodeId, bool),
    PutStatic(NodeId),
    GetDynamic(NodeId, bool),
    PutDynamic(NodeId),
    Partition(NodeId, usize),
    Record(String),
}

/// A network model which logs every controller call before passing it on
pub(crate) struct RecordingNetwork {
    pub inner: NetworkModel,
    pub calls: Vec<Call>,
    /// Makes sources deny holding their own contents
    pub lose_sources: bool,
    session_content: Option<ContentId>,
}

impl RecordingNetwork {
    pub fn new(topology: Topology) -> Self {
        Self::with_policy(topology, ReplacementPolicyConfig::LeastRecentlyUsed)
    }

    pub fn with_policy(topology: Topology, policy: ReplacementPolicyConfig) -> Self {
        Self {
            inner: NetworkModel::new(topology, policy),
            calls: Vec::new(),
            lose_sources: false,
            session_content: None,
        }
    }

    /// Drains the calls recorded so far
    pub fn take(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn puts(&self) -> Vec<NodeId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Put(node) => Some(*node),
                _ => None,
            })
            .collect()
    }

    pub fn request_hops(&self) -> Vec<(NodeId, NodeId)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::RequestHop(u, v) => Some((*u, *v)),
                _ => None,
            })
            .collect()
    }

    pub fn content_hops(&self) -> Vec<(NodeId, NodeId, bool)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::ContentHop(u, v, main) => Some((*u, *v, *main)),
                _ => None,
            })
            .collect()
    }

    /// Runs a strategy over a sequence of requests
    pub fn replay(&mut self, strategy: &mut dyn Strategy, events: &[Event]) -> Result<(), StrategyError> {
        for event in events {
            strategy.process_event(self, event)?;
            assert!(!self.inner.session_open(), "session left open by {}", strategy.name());
        }
        Ok(())
    }
}

impl NetworkView for RecordingNetwork {
    fn content_source(&self, content: ContentId) -> Option<NodeId> {
        self.inner.content_source(content)
    }

    fn shortest_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        self.inner.shortest_path(from, to)
    }

    fn has_cache(&self, node: NodeId) -> bool {
        self.inner.has_cache(node)
    }

    fn cache_nodes(&self) -> Vec<NodeId> {
        self.inner.cache_nodes()
    }

    fn cache_size(&self, node: NodeId) -> Option<usize> {
        self.inner.cache_size(node)
    }

    fn content_locations(&self, content: ContentId) -> BTreeSet<NodeId> {
        self.inner.content_locations(content)
    }

    fn cache_lookup(&self, node: NodeId, content: ContentId) -> bool {
        self.inner.cache_lookup(node, content)
    }

    fn link_delay(&self, u: NodeId, v: NodeId) -> Option<f64> {
        self.inner.link_delay(u, v)
    }

    fn receivers(&self) -> Vec<NodeId> {
        self.inner.receivers()
    }

    fn topology(&self) -> &Topology {
        self.inner.topology()
    }
}

impl NetworkController for RecordingNetwork {
    fn start_session(&mut self, time: Time, receiver: NodeId, content: ContentId, log: bool) -> Result<(), StrategyError> {
        self.calls.push(Call::Start { receiver, content, log });
        self.session_content = Some(content);
        self.inner.start_session(time, receiver, content, log)
    }

    fn end_session(&mut self, success: bool) -> Result<(), StrategyError> {
        self.calls.push(Call::End);
        self.inner.end_session(success)
    }

    fn forward_request_hop(&mut self, u: NodeId, v: NodeId) {
        self.calls.push(Call::RequestHop(u, v));
        self.inner.forward_request_hop(u, v);
    }

    fn forward_content_hop(&mut self, u: NodeId, v: NodeId) {
        self.calls.push(Call::ContentHop(u, v, true));
        self.inner.forward_content_hop(u, v);
    }

    fn forward_content_path(&mut self, path: &[NodeId], main_path: bool) {
        for hop in path.windows(2) {
            self.calls.push(Call::ContentHop(hop[0], hop[1], main_path));
        }
        self.inner.forward_content_path(path, main_path);
    }

    fn get_content(&mut self, node: NodeId) -> bool {
        let lost = self.lose_sources
            && self.session_content.map_or(false, |content| {
                self.inner.content_source(content) == Some(node) && !self.inner.cache_lookup(node, content)
            });
        let hit = !lost && self.inner.get_content(node);
        self.calls.push(Call::Get(node, hit));
        hit
    }

    fn put_content(&mut self, node: NodeId) -> Option<ContentId> {
        self.calls.push(Call::Put(node));
        self.inner.put_content(node)
    }

    fn get_static_content(&mut self, node: NodeId) -> bool {
        let hit = self.inner.get_static_content(node);
        self.calls.push(Call::GetStatic(node, hit));
        hit
    }

    fn put_static_content(&mut self, node: NodeId) -> bool {
        self.calls.push(Call::PutStatic(node));
        self.inner.put_static_content(node)
    }

    fn get_dynamic_content(&mut self, node: NodeId) -> bool {
        let hit = self.inner.get_dynamic_content(node);
        self.calls.push(Call::GetDynamic(node, hit));
        hit
    }

    fn put_dynamic_content(&mut self, node: NodeId) -> Option<ContentId> {
        self.calls.push(Call::PutDynamic(node));
        self.inner.put_dynamic_content(node)
    }

    fn partition_cache(&mut self, node: NodeId, static_capacity: usize) -> Result<(), StrategyError> {
        self.calls.push(Call::Partition(node, static_capacity));
        self.inner.partition_cache(node, static_capacity)
    }

    fn record(&mut self, metric: &str, value: f64) {
        self.calls.push(Call::Record(metric.to_string()));
        self.inner.record(metric, value);
    }
}
