//! Network topology: the graph, node roles, cache budgets and content placement, plus the derived
//! quantities strategies precompute at construction (diameter, betweenness, shortest paths).

use std::collections::{BTreeMap, HashMap, VecDeque};

use petgraph::algo::{connected_components, dijkstra};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Deserialize;

use crate::config::{ContentSpec, TopologyConfig};
use crate::error::TopologyError;
use crate::{ContentId, NodeId};

/// The role a node plays in the content distribution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Issues requests
    Receiver,
    /// Forwards, and caches if it has a budget
    #[default]
    Router,
    /// Permanently holds the contents assigned to it
    Source,
}

/// Undirected network graph with per-node metadata
///
/// Nodes are kept in ascending id order everywhere, which is what makes every derived quantity
/// (paths, cache ordering, tie-breaks) deterministic
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: UnGraph<NodeId, f64>,
    indices: BTreeMap<NodeId, NodeIndex>,
    roles: BTreeMap<NodeId, NodeRole>,
    cache_sizes: BTreeMap<NodeId, usize>,
    sources: HashMap<ContentId, NodeId>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// A line of `n` routers, node `i` linked to node `i + 1`
    pub fn path(n: NodeId) -> Self {
        let mut topology = Self::new();
        for id in 0..n {
            topology.indices.insert(id, topology.graph.add_node(id));
            topology.roles.insert(id, NodeRole::Router);
        }
        for id in 1..n {
            topology.graph.add_edge(topology.indices[&(id - 1)], topology.indices[&id], 1.0);
        }
        topology
    }

    pub fn from_config(config: &TopologyConfig) -> Result<Self, TopologyError> {
        let mut topology = Self::new();
        for node in &config.nodes {
            topology.add_node(node.id, node.role)?;
            if node.cache_size > 0 {
                topology.set_cache(node.id, node.cache_size)?;
            }
            for spec in &node.contents {
                match *spec {
                    ContentSpec::Single(content) => topology.add_contents(node.id, [content])?,
                    ContentSpec::Range { from, to } => {
                        if from > to {
                            return Err(TopologyError::InvalidContentRange { from, to });
                        }
                        topology.add_contents(node.id, from..=to)?
                    }
                }
            }
        }
        for edge in &config.edges {
            topology.add_edge(edge.u, edge.v, edge.delay)?;
        }
        Ok(topology)
    }

    pub fn add_node(&mut self, id: NodeId, role: NodeRole) -> Result<(), TopologyError> {
        if self.indices.contains_key(&id) {
            return Err(TopologyError::DuplicateNode(id));
        }
        self.indices.insert(id, self.graph.add_node(id));
        self.roles.insert(id, role);
        Ok(())
    }

    pub fn add_edge(&mut self, u: NodeId, v: NodeId, delay: f64) -> Result<(), TopologyError> {
        let a = self.index(u)?;
        let b = self.index(v)?;
        self.graph.update_edge(a, b, delay);
        Ok(())
    }

    /// Gives a node a cache of the given capacity. A capacity of 0 removes the cache
    pub fn set_cache(&mut self, node: NodeId, size: usize) -> Result<(), TopologyError> {
        self.index(node)?;
        if size == 0 {
            self.cache_sizes.remove(&node);
        } else {
            self.cache_sizes.insert(node, size);
        }
        Ok(())
    }

    /// Makes `node` the source of every given content. Each content has exactly one source
    pub fn add_contents(
        &mut self,
        node: NodeId,
        contents: impl IntoIterator<Item = ContentId>,
    ) -> Result<(), TopologyError> {
        self.index(node)?;
        for content in contents {
            if let Some(&first) = self.sources.get(&content) {
                if first != node {
                    return Err(TopologyError::DuplicateSource {
                        content,
                        first,
                        second: node,
                    });
                }
            }
            self.sources.insert(content, node);
        }
        self.roles.insert(node, NodeRole::Source);
        Ok(())
    }

    pub fn set_role(&mut self, node: NodeId, role: NodeRole) -> Result<(), TopologyError> {
        self.index(node)?;
        self.roles.insert(node, role);
        Ok(())
    }

    fn index(&self, node: NodeId) -> Result<NodeIndex, TopologyError> {
        self.indices.get(&node).copied().ok_or(TopologyError::UnknownNode(node))
    }

    /// All node ids, ascending
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.indices.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.indices.len()
    }

    /// All edges as `(u, v, delay)` with `u < v`, ascending
    pub fn edges(&self) -> Vec<(NodeId, NodeId, f64)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = self.graph.edge_endpoints(e)?;
                let (u, v) = (self.graph[a], self.graph[b]);
                Some((u.min(v), u.max(v), self.graph[e]))
            })
            .collect();
        edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        edges
    }

    /// Neighbours of a node, ascending
    pub fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        let Some(&index) = self.indices.get(&node) else {
            return Vec::new();
        };
        let mut neighbors: Vec<_> = self.graph.neighbors(index).map(|n| self.graph[n]).collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbors(node).len()
    }

    pub fn role(&self, node: NodeId) -> Option<NodeRole> {
        self.roles.get(&node).copied()
    }

    pub fn receivers(&self) -> Vec<NodeId> {
        self.nodes_with_role(NodeRole::Receiver)
    }

    pub fn sources(&self) -> Vec<NodeId> {
        self.nodes_with_role(NodeRole::Source)
    }

    fn nodes_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.roles.iter().filter(|(_, r)| **r == role).map(|(n, _)| *n).collect()
    }

    pub fn cache_size(&self, node: NodeId) -> Option<usize> {
        self.cache_sizes.get(&node).copied()
    }

    /// Nodes with a cache, ascending. This ordering is what hash-routing assigns contents over
    pub fn cache_nodes(&self) -> Vec<NodeId> {
        self.cache_sizes.keys().copied().collect()
    }

    pub fn content_source(&self, content: ContentId) -> Option<NodeId> {
        self.sources.get(&content).copied()
    }

    pub fn link_delay(&self, u: NodeId, v: NodeId) -> Option<f64> {
        let edge = self.graph.find_edge(*self.indices.get(&u)?, *self.indices.get(&v)?)?;
        Some(self.graph[edge])
    }

    pub fn is_connected(&self) -> bool {
        connected_components(&self.graph) <= 1
    }

    /// Ascending adjacency lists over dense indices, dense index `i` being the `i`-th smallest id
    fn dense_adjacency(&self) -> (Vec<NodeId>, Vec<Vec<usize>>) {
        let ids: Vec<NodeId> = self.nodes().collect();
        let position: HashMap<NodeId, usize> = ids.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let adjacency = ids
            .iter()
            .map(|n| self.neighbors(*n).iter().map(|m| position[m]).collect())
            .collect();
        (ids, adjacency)
    }

    /// The longest shortest path, in hops
    pub fn diameter(&self) -> Result<usize, TopologyError> {
        if !self.is_connected() {
            return Err(TopologyError::Disconnected);
        }
        Ok(self
            .graph
            .node_indices()
            .map(|start| dijkstra(&self.graph, start, None, |_| 1usize).into_values().max().unwrap_or(0))
            .max()
            .unwrap_or(0))
    }

    /// Normalised betweenness centrality of every node
    pub fn betweenness_centrality(&self) -> BTreeMap<NodeId, f64> {
        let (ids, adjacency) = self.dense_adjacency();
        ids.into_iter().zip(brandes(&adjacency)).collect()
    }

    /// Betweenness centrality of every node computed within its own ego network, i.e. the node,
    /// its neighbours and the links among them
    pub fn ego_betweenness_centrality(&self) -> BTreeMap<NodeId, f64> {
        self.nodes()
            .map(|node| {
                let mut members = vec![node];
                members.extend(self.neighbors(node));
                members.sort_unstable();
                let position: HashMap<NodeId, usize> =
                    members.iter().enumerate().map(|(i, n)| (*n, i)).collect();
                let adjacency: Vec<Vec<usize>> = members
                    .iter()
                    .map(|m| {
                        self.neighbors(*m)
                            .iter()
                            .filter_map(|n| position.get(n).copied())
                            .collect()
                    })
                    .collect();
                (node, brandes(&adjacency)[position[&node]])
            })
            .collect()
    }

    /// Hop-count shortest paths between every ordered pair of connected nodes
    ///
    /// Searches run from every node in ascending id order, expanding neighbours in ascending
    /// order, and the result is symmetrised: the path from `b` to `a` is the reverse of the path
    /// from `a` to `b` for `a < b`
    pub fn all_pairs_shortest_paths(&self) -> HashMap<(NodeId, NodeId), Vec<NodeId>> {
        let (ids, adjacency) = self.dense_adjacency();
        let mut paths = HashMap::new();
        for source in 0..ids.len() {
            let (_, parents) = bfs(&adjacency, source);
            for target in source..ids.len() {
                let mut path = Vec::new();
                let mut current = Some(target);
                while let Some(node) = current {
                    path.push(ids[node]);
                    current = if node == source { None } else { parents[node] };
                }
                if path.last() != Some(&ids[source]) {
                    continue;
                }
                path.reverse();
                let reversed: Vec<NodeId> = path.iter().rev().copied().collect();
                paths.insert((ids[target], ids[source]), reversed);
                paths.insert((ids[source], ids[target]), path);
            }
        }
        paths
    }
}

/// Breadth first search returning hop distances and parents, `None` for unreachable nodes
fn bfs(adjacency: &[Vec<usize>], source: usize) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let mut distance = vec![None; adjacency.len()];
    let mut parent = vec![None; adjacency.len()];
    let mut queue = VecDeque::new();
    distance[source] = Some(0);
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        let next = distance[u].map_or(0, |d| d + 1);
        for &v in &adjacency[u] {
            if distance[v].is_none() {
                distance[v] = Some(next);
                parent[v] = Some(u);
                queue.push_back(v);
            }
        }
    }
    (distance, parent)
}

/// Brandes' algorithm on an unweighted undirected graph, normalised by `1/((n-1)(n-2))`
///
/// Every unordered pair is accumulated from both endpoints, so the normalisation matches the
/// usual `2/((n-1)(n-2))` over unordered pairs
fn brandes(adjacency: &[Vec<usize>]) -> Vec<f64> {
    let n = adjacency.len();
    let mut betweenness = vec![0.0; n];
    for s in 0..n {
        let mut stack = Vec::with_capacity(n);
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut distance: Vec<i64> = vec![-1; n];
        sigma[s] = 1.0;
        distance[s] = 0;
        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &adjacency[v] {
                if distance[w] < 0 {
                    distance[w] = distance[v] + 1;
                    queue.push_back(w);
                }
                if distance[w] == distance[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }
        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                betweenness[w] += delta[w];
            }
        }
    }
    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        for b in &mut betweenness {
            *b *= scale;
        }
    }
    betweenness
}
