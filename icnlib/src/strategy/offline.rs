//! Strategies driven by placements computed out of band
//!
//! The optimal oracle replays a sequence of snapshots, each telling which cache should hold which
//! content from its checkpoint on. The static oracle preloads one placement and never changes it.
//! The hybrid strategy pins the most popular contents in a static partition of every cache and
//! runs the rest of the budget as a regular cache

use tracing::{debug, info, trace};

use super::{path_between, path_links, probe_path, return_path, source_of, Event, Strategy};
use crate::artifacts::{Snapshot, SnapshotProvider};
use crate::error::{ArtifactError, StrategyError};
use crate::network::Network;
use crate::{ContentId, NodeId};

/// Writes a placement into the caches, one unlogged session per entry
fn preload<F>(net: &mut dyn Network, event: &Event, placement: &[(NodeId, ContentId)], mut put: F) -> Result<(), StrategyError>
where
    F: FnMut(&mut dyn Network, NodeId),
{
    for &(node, content) in placement {
        net.start_session(event.time, event.receiver, content, false)?;
        put(&mut *net, node);
        net.end_session(true)?;
    }
    debug!(entries = placement.len(), "placement preloaded");
    Ok(())
}

/// A warm-up request: it opens and closes an unmeasured session and moves nothing
fn skip(net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
    net.start_session(event.time, event.receiver, event.content, false)?;
    net.end_session(true)
}

/// Probes the path to the source and returns the path the content takes back
fn serve(net: &mut dyn Network, event: &Event) -> Result<Vec<NodeId>, StrategyError> {
    let source = source_of(net, event.content)?;
    let path = path_between(net, event.receiver, source)?;
    let serving = probe_path(net, &path, event.content)?;
    trace!(content = event.content, serving, "request served");
    return_path(net, event.receiver, serving)
}

/// Oracle caching: copies are left exactly where the current snapshot says they belong
pub struct Optimal {
    provider: Box<dyn SnapshotProvider>,
    snapshot: Snapshot,
    /// Snapshots loaded so far, the current one included
    loaded: usize,
    max_snapshots: usize,
    preloaded: bool,
    warmup_requests: u64,
    checkpoint_interval: u64,
    requests: u64,
    since_checkpoint: u64,
}

impl Optimal {
    pub fn new(
        provider: Box<dyn SnapshotProvider>,
        warmup_requests: u64,
        checkpoint_interval: u64,
        max_snapshots: Option<usize>,
    ) -> Result<Self, StrategyError> {
        if checkpoint_interval == 0 {
            return Err(StrategyError::invalid("checkpoint_interval", 0, "must be at least 1"));
        }
        let available = provider.snapshot_count();
        let max_snapshots = max_snapshots.map_or(available, |max| max.min(available));
        if max_snapshots == 0 {
            return Err(StrategyError::Artifact(ArtifactError::MissingSnapshot(0)));
        }
        let snapshot = provider.load(0)?;
        info!(snapshots = max_snapshots, warmup_requests, checkpoint_interval, "oracle ready");
        Ok(Self {
            provider,
            snapshot,
            loaded: 1,
            max_snapshots,
            preloaded: false,
            warmup_requests,
            checkpoint_interval,
            requests: 0,
            since_checkpoint: 0,
        })
    }

    /// Index of the snapshot currently in use
    pub fn current_snapshot(&self) -> usize {
        self.loaded - 1
    }

    fn checkpoint(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        self.snapshot = self.provider.load(self.loaded)?;
        self.loaded += 1;
        self.since_checkpoint = 0;
        info!(snapshot = self.current_snapshot(), requests = self.requests, "oracle checkpoint");
        preload(net, event, self.snapshot.placement(), |net, node| {
            net.put_content(node);
        })?;
        net.record("optimal.checkpoint", self.current_snapshot() as f64);
        Ok(())
    }
}

impl Strategy for Optimal {
    fn name(&self) -> &'static str {
        "OPTIMAL"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        if !self.preloaded {
            preload(net, event, self.snapshot.placement(), |net, node| {
                net.put_content(node);
            })?;
            self.preloaded = true;
        }
        self.requests += 1;
        if self.requests <= self.warmup_requests {
            return skip(net, event);
        }
        if self.since_checkpoint >= self.checkpoint_interval && self.loaded < self.max_snapshots {
            self.checkpoint(net, event)?;
        }

        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let back = serve(net, event)?;
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if self.snapshot.membership(v, event.content) {
                net.put_content(v);
            }
        }
        self.since_checkpoint += 1;
        net.end_session(true)
    }
}

/// Static oracle: one placement, loaded before the first request and never changed
#[derive(Debug)]
pub struct StaticOptimal {
    placement: Vec<(NodeId, ContentId)>,
    preloaded: bool,
    warmup_requests: u64,
    requests: u64,
}

impl StaticOptimal {
    pub fn new(placement: Vec<(NodeId, ContentId)>, warmup_requests: u64) -> Self {
        info!(entries = placement.len(), warmup_requests, "static placement ready");
        Self {
            placement,
            preloaded: false,
            warmup_requests,
            requests: 0,
        }
    }
}

impl Strategy for StaticOptimal {
    fn name(&self) -> &'static str {
        "STATIC_OPTIMAL"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        if !self.preloaded {
            preload(net, event, &self.placement, |net, node| {
                net.put_content(node);
            })?;
            self.preloaded = true;
        }
        self.requests += 1;
        if self.requests <= self.warmup_requests {
            return skip(net, event);
        }
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let back = serve(net, event)?;
        net.forward_content_path(&back, true);
        net.end_session(true)
    }
}

/// Static plus dynamic caching
///
/// On the first request every cache is split into a static partition, filled with the top ranked
/// contents, and a dynamic partition. Requests are looked up in both, static first, and every
/// cache on the way back keeps a dynamic copy
#[derive(Debug)]
pub struct Hybrid {
    ranked_contents: Vec<ContentId>,
    static_fraction: f64,
    partitioned: bool,
}

impl Hybrid {
    pub fn new(ranked_contents: Vec<ContentId>, static_fraction: f64) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&static_fraction) {
            return Err(StrategyError::invalid("static_fraction", static_fraction, "must be in [0, 1]"));
        }
        info!(ranked = ranked_contents.len(), static_fraction, "hybrid caching ready");
        Ok(Self {
            ranked_contents,
            static_fraction,
            partitioned: false,
        })
    }

    /// Static capacity of a cache with the given total budget
    pub fn static_capacity(&self, cache_size: usize) -> usize {
        (cache_size as f64 * self.static_fraction).round() as usize
    }

    fn partition(&self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        for node in net.cache_nodes() {
            let Some(size) = net.cache_size(node) else {
                continue;
            };
            let capacity = self.static_capacity(size);
            net.partition_cache(node, capacity)?;
            let pinned: Vec<(NodeId, ContentId)> = self
                .ranked_contents
                .iter()
                .take(capacity)
                .map(|&content| (node, content))
                .collect();
            preload(net, event, &pinned, |net, node| {
                net.put_static_content(node);
            })?;
            debug!(node, static_capacity = capacity, dynamic_capacity = size - capacity, "cache partitioned");
        }
        Ok(())
    }
}

impl Strategy for Hybrid {
    fn name(&self) -> &'static str {
        "HYBRID"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        if !self.partitioned {
            self.partition(net, event)?;
            self.partitioned = true;
        }
        let source = source_of(net, event.content)?;
        let path = path_between(net, event.receiver, source)?;

        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let mut serving = None;
        for (u, v) in path_links(&path) {
            net.forward_request_hop(u, v);
            if v == source || !net.has_cache(v) {
                continue;
            }
            if net.get_static_content(v) {
                if event.log {
                    net.record("hybrid.static_hit", 1.0);
                }
                serving = Some(v);
                break;
            }
            if net.get_dynamic_content(v) {
                if event.log {
                    net.record("hybrid.dynamic_hit", 1.0);
                }
                serving = Some(v);
                break;
            }
        }
        let serving = match serving {
            Some(node) => node,
            None => {
                if !net.get_dynamic_content(source) {
                    return Err(StrategyError::ContentNotAtSource {
                        content: event.content,
                        node: source,
                    });
                }
                source
            }
        };

        let back = return_path(net, event.receiver, serving)?;
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            if net.has_cache(v) {
                net.put_dynamic_content(v);
            }
        }
        net.end_session(true)
    }
}
