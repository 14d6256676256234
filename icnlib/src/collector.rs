use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::topology::Topology;
use crate::{ContentId, NodeId, Time};

/// Observer of the traffic a strategy generates
///
/// The network model calls the traffic hooks only for sessions whose `log` flag is set, so
/// warm-up requests never reach a collector. `record` is the strategies' own instrumentation
/// channel and is always forwarded. Every hook defaults to doing nothing
pub trait Collector {
    fn start_session(&mut self, _time: Time, _receiver: NodeId, _content: ContentId) {}

    fn cache_hit(&mut self, _node: NodeId) {}

    fn cache_miss(&mut self, _node: NodeId) {}

    fn server_hit(&mut self, _node: NodeId) {}

    fn request_hop(&mut self, _u: NodeId, _v: NodeId, _main_path: bool) {}

    fn content_hop(&mut self, _u: NodeId, _v: NodeId, _main_path: bool) {}

    fn end_session(&mut self, _success: bool) {}

    /// Strategy-level instrumentation, e.g. how many requests a lookup table answered
    fn record(&mut self, _metric: &str, _value: f64) {}
}

/// A collector which discards everything
#[derive(Debug, Default)]
pub struct NullCollector;

impl Collector for NullCollector {}

/// The result of a run. Can be serialised to the output format of the simulator
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub requests: u64,
    pub cache_hits: u64,
    pub server_hits: u64,
    pub cache_hit_ratio: f64,
    pub mean_request_hops: f64,
    pub mean_content_hops: f64,
    pub mean_latency: f64,
    pub link_load: Vec<LinkLoad>,
    /// Sums of every value passed to `record`, keyed by metric name
    pub metrics: BTreeMap<String, f64>,
}

/// Number of content and request packets which crossed a link, in either direction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkLoad {
    pub u: NodeId,
    pub v: NodeId,
    pub requests: u64,
    pub contents: u64,
}

/// Aggregates hit ratio, hop counts, latency and link load over all logged sessions
///
/// Latency is the sum of link delays over primary hops, requests and contents alike. Auxiliary
/// copies (multicast branches towards a cache) count towards link load only
#[derive(Debug, Default)]
pub struct SummaryCollector {
    delays: HashMap<(NodeId, NodeId), f64>,
    requests: u64,
    cache_hits: u64,
    server_hits: u64,
    request_hops: u64,
    content_hops: u64,
    latency: f64,
    session_latency: f64,
    link_requests: HashMap<(NodeId, NodeId), u64>,
    link_contents: HashMap<(NodeId, NodeId), u64>,
    metrics: BTreeMap<String, f64>,
}

fn link(u: NodeId, v: NodeId) -> (NodeId, NodeId) {
    (u.min(v), u.max(v))
}

impl SummaryCollector {
    pub fn new(topology: &Topology) -> Self {
        Self {
            delays: topology.edges().into_iter().map(|(u, v, d)| ((u, v), d)).collect(),
            ..Self::default()
        }
    }

    fn delay(&self, u: NodeId, v: NodeId) -> f64 {
        self.delays.get(&link(u, v)).copied().unwrap_or(0.0)
    }

    pub fn summary(&self) -> RunSummary {
        let per_request = |value: f64| {
            if self.requests == 0 {
                0.0
            } else {
                value / self.requests as f64
            }
        };
        let mut links: Vec<(NodeId, NodeId)> =
            self.link_requests.keys().chain(self.link_contents.keys()).copied().collect();
        links.sort_unstable();
        links.dedup();
        RunSummary {
            requests: self.requests,
            cache_hits: self.cache_hits,
            server_hits: self.server_hits,
            cache_hit_ratio: per_request(self.cache_hits as f64),
            mean_request_hops: per_request(self.request_hops as f64),
            mean_content_hops: per_request(self.content_hops as f64),
            mean_latency: per_request(self.latency),
            link_load: links
                .into_iter()
                .map(|(u, v)| LinkLoad {
                    u,
                    v,
                    requests: self.link_requests.get(&(u, v)).copied().unwrap_or(0),
                    contents: self.link_contents.get(&(u, v)).copied().unwrap_or(0),
                })
                .collect(),
            metrics: self.metrics.clone(),
        }
    }
}

impl Collector for SummaryCollector {
    fn start_session(&mut self, _time: Time, _receiver: NodeId, _content: ContentId) {
        self.requests += 1;
        self.session_latency = 0.0;
    }

    fn cache_hit(&mut self, _node: NodeId) {
        self.cache_hits += 1;
    }

    fn server_hit(&mut self, _node: NodeId) {
        self.server_hits += 1;
    }

    fn request_hop(&mut self, u: NodeId, v: NodeId, main_path: bool) {
        *self.link_requests.entry(link(u, v)).or_default() += 1;
        if main_path {
            self.request_hops += 1;
            self.session_latency += self.delay(u, v);
        }
    }

    fn content_hop(&mut self, u: NodeId, v: NodeId, main_path: bool) {
        *self.link_contents.entry(link(u, v)).or_default() += 1;
        if main_path {
            self.content_hops += 1;
            self.session_latency += self.delay(u, v);
        }
    }

    fn end_session(&mut self, _success: bool) {
        self.latency += self.session_latency;
    }

    fn record(&mut self, metric: &str, value: f64) {
        *self.metrics.entry(metric.to_string()).or_default() += value;
    }
}
