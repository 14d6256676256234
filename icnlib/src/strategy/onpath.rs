//! Strategies which route every request along the shortest path to the content source and only
//! differ in where copies are left on the way back

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use super::{fetch_from_source, path_between, path_links, probe_path, return_path, source_of, Event, Strategy};
use crate::error::StrategyError;
use crate::network::{Network, NetworkView};
use crate::NodeId;

/// The request path to the source, probed hop by hop. Returns the serving node and the path the
/// content travels back on
fn serve_on_path(net: &mut dyn Network, event: &Event) -> Result<(NodeId, Vec<NodeId>), StrategyError> {
    let source = source_of(net, event.content)?;
    let path = path_between(net, event.receiver, source)?;
    let serving = probe_path(net, &path, event.content)?;
    let back = return_path(net, event.receiver, serving)?;
    Ok((serving, back))
}

/// Never caches: every request is served by the source
#[derive(Debug, Default)]
pub struct NoCache;

impl NoCache {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for NoCache {
    fn name(&self) -> &'static str {
        "NO_CACHE"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let source = source_of(net, event.content)?;
        let path = path_between(net, event.receiver, source)?;
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        net.forward_request_path(&path);
        fetch_from_source(net, source, event.content)?;
        let back: Vec<NodeId> = path.iter().rev().copied().collect();
        net.forward_content_path(&back, true);
        net.end_session(true)
    }
}

/// Only the first cache on the request path is ever looked up, and it keeps a copy of whatever
/// it had to fetch from the source
#[derive(Debug, Default)]
pub struct Edge;

impl Edge {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for Edge {
    fn name(&self) -> &'static str {
        "EDGE"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let source = source_of(net, event.content)?;
        let path = path_between(net, event.receiver, source)?;
        net.start_session(event.time, event.receiver, event.content, event.log)?;

        let mut edge_cache = None;
        let mut serving = source;
        for (hop, (u, v)) in path_links(&path).enumerate() {
            net.forward_request_hop(u, v);
            if net.has_cache(v) {
                edge_cache = Some(v);
                if net.get_content(v) {
                    serving = v;
                } else {
                    // Straight to the source, the remaining caches are skipped
                    net.forward_request_path(&path[hop + 1..]);
                    fetch_from_source(net, source, event.content)?;
                }
                break;
            }
        }
        if edge_cache.is_none() {
            fetch_from_source(net, source, event.content)?;
        }

        let back = return_path(net, event.receiver, serving)?;
        net.forward_content_path(&back, true);
        if let Some(edge) = edge_cache {
            if serving == source && edge != source {
                net.put_content(edge);
            }
        }
        net.end_session(true)
    }
}

/// Leave Copy Everywhere: every cache on the way back keeps a copy
#[derive(Debug, Default)]
pub struct LeaveCopyEverywhere;

impl LeaveCopyEverywhere {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeaveCopyEverywhere {
    fn name(&self) -> &'static str {
        "LCE"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let (_, back) = serve_on_path(net, event)?;
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if net.has_cache(v) {
                net.put_content(v);
            }
        }
        net.end_session(true)
    }
}

/// Leave Copy Down: only the first cache below the serving node keeps a copy
#[derive(Debug, Default)]
pub struct LeaveCopyDown;

impl LeaveCopyDown {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeaveCopyDown {
    fn name(&self) -> &'static str {
        "LCD"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let (_, back) = serve_on_path(net, event)?;
        let mut copied = false;
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if !copied && v != event.receiver && net.has_cache(v) {
                net.put_content(v);
                copied = true;
            }
        }
        net.end_session(true)
    }
}

/// The probability with which ProbCache admits a content at a cache
///
/// `path_capacity` is the total cache budget from the current hop to the receiver, `cache_size`
/// the budget of the current cache, `x` how many caches the content has crossed so far, itself
/// included, and `c` the number of caches on the whole delivery path
pub fn admission_probability(path_capacity: f64, t_tw: f64, cache_size: f64, x: f64, c: f64) -> f64 {
    if cache_size <= 0.0 || c <= 0.0 {
        return 0.0;
    }
    let prob = path_capacity / (t_tw * cache_size) * (x / c).powf(c);
    prob.clamp(0.0, 1.0)
}

/// ProbCache: copies are left with a probability favouring caches close to the receiver and
/// paths with spare capacity
#[derive(Debug)]
pub struct ProbCache {
    t_tw: f64,
    cache_sizes: BTreeMap<NodeId, usize>,
    rng: StdRng,
}

impl ProbCache {
    pub fn new(view: &dyn NetworkView, t_tw: f64, rng: StdRng) -> Result<Self, StrategyError> {
        if !(t_tw > 0.0) || !t_tw.is_finite() {
            return Err(StrategyError::invalid("t_tw", t_tw, "must be a positive number"));
        }
        let cache_sizes = view
            .cache_nodes()
            .into_iter()
            .filter_map(|node| Some((node, view.cache_size(node)?)))
            .collect();
        Ok(Self { t_tw, cache_sizes, rng })
    }
}

impl Strategy for ProbCache {
    fn name(&self) -> &'static str {
        "PROB_CACHE"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let (_, back) = serve_on_path(net, event)?;
        let c = back.iter().filter(|v| self.cache_sizes.contains_key(v)).count() as f64;
        let mut x = 0.0;
        for hop in 1..back.len() {
            let (u, v) = (back[hop - 1], back[hop]);
            let path_capacity: usize = back[hop - 1..]
                .iter()
                .filter_map(|n| self.cache_sizes.get(n))
                .sum();
            if self.cache_sizes.contains_key(&v) {
                x += 1.0;
            }
            net.forward_content_hop(u, v);
            if v == event.receiver {
                continue;
            }
            if let Some(&size) = self.cache_sizes.get(&v) {
                let prob = admission_probability(path_capacity as f64, self.t_tw, size as f64, x, c);
                let draw: f64 = self.rng.gen();
                trace!(node = v, prob, draw, "probabilistic admission");
                if draw < prob {
                    net.put_content(v);
                }
            }
        }
        net.end_session(true)
    }
}

/// Cache Less For More: one copy, at the cache of highest betweenness centrality on the way
/// back. Ties go to the cache closest to the receiver
#[derive(Debug)]
pub struct CacheLessForMore {
    betweenness: BTreeMap<NodeId, f64>,
}

impl CacheLessForMore {
    pub fn new(view: &dyn NetworkView, use_ego_betw: bool) -> Self {
        let topology = view.topology();
        let betweenness = if use_ego_betw {
            topology.ego_betweenness_centrality()
        } else {
            topology.betweenness_centrality()
        };
        Self { betweenness }
    }

    pub fn betweenness(&self, node: NodeId) -> f64 {
        self.betweenness.get(&node).copied().unwrap_or(0.0)
    }
}

impl Strategy for CacheLessForMore {
    fn name(&self) -> &'static str {
        "CL4M"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let (_, back) = serve_on_path(net, event)?;
        let mut designated = None;
        let mut max_betweenness = f64::NEG_INFINITY;
        for &v in back.iter().skip(1) {
            if net.has_cache(v) && self.betweenness(v) >= max_betweenness {
                max_betweenness = self.betweenness(v);
                designated = Some(v);
            }
        }
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if Some(v) == designated {
                net.put_content(v);
            }
        }
        net.end_session(true)
    }
}

/// One copy, at a cache picked uniformly among those strictly between the serving node and the
/// receiver
#[derive(Debug)]
pub struct RandomChoice {
    rng: StdRng,
}

impl RandomChoice {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl Strategy for RandomChoice {
    fn name(&self) -> &'static str {
        "RAND_CHOICE"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let (_, back) = serve_on_path(net, event)?;
        let inner = if back.len() > 2 { &back[1..back.len() - 1] } else { &[][..] };
        let caches: Vec<NodeId> = inner.iter().copied().filter(|v| net.has_cache(*v)).collect();
        let designated = caches.choose(&mut self.rng).copied();
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if Some(v) == designated {
                net.put_content(v);
            }
        }
        net.end_session(true)
    }
}

/// Every cache on the way back, receiver excluded, keeps a copy with probability `p`
#[derive(Debug)]
pub struct RandomBernoulli {
    p: f64,
    rng: StdRng,
}

impl RandomBernoulli {
    pub fn new(p: f64, rng: StdRng) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(StrategyError::invalid("p", p, "must be a probability in [0, 1]"));
        }
        Ok(Self { p, rng })
    }
}

impl Strategy for RandomBernoulli {
    fn name(&self) -> &'static str {
        "RAND_BERNOULLI"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let (_, back) = serve_on_path(net, event)?;
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if v != event.receiver && net.has_cache(v) && self.rng.gen::<f64>() < self.p {
                net.put_content(v);
            }
        }
        net.end_session(true)
    }
}
