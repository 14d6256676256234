//! Hash-routing: every content has one authoritative cache, chosen by hashing its id over the
//! cache nodes, and requests always go through it. The variants only differ in how content
//! coming back from the source after a miss reaches that cache and the receiver

use tracing::{debug, trace};

use super::{fetch_from_source, path_between, source_of, Event, Strategy};
use crate::error::StrategyError;
use crate::network::{Network, NetworkView};
use crate::{ContentId, NodeId};

/// Maps contents onto the cache nodes
#[derive(Debug, Clone)]
pub struct HashAssignment {
    cache_nodes: Vec<NodeId>,
}

impl HashAssignment {
    /// Fails if the network has no cache node to assign contents to
    pub fn new(view: &dyn NetworkView) -> Result<Self, StrategyError> {
        Self::from_cache_nodes(view.cache_nodes())
    }

    /// Slot `i` of the assignment is the `i`-th node given
    pub fn from_cache_nodes(cache_nodes: Vec<NodeId>) -> Result<Self, StrategyError> {
        if cache_nodes.is_empty() {
            return Err(StrategyError::invalid("cache_nodes", 0, "hash-routing needs at least one cache node"));
        }
        debug!(caches = cache_nodes.len(), "hash assignment built");
        Ok(Self { cache_nodes })
    }

    pub fn cache_nodes(&self) -> &[NodeId] {
        &self.cache_nodes
    }

    /// Slot of a content: `content mod n`, mirrored on every other block of `n` ids
    pub fn hash(&self, content: ContentId) -> usize {
        let n = self.cache_nodes.len() as ContentId;
        let h = content % n;
        let slot = if (content / n) % 2 == 0 { h } else { n - h - 1 };
        slot as usize
    }

    pub fn authoritative_cache(&self, content: ContentId) -> NodeId {
        self.cache_nodes[self.hash(content)]
    }
}

/// The node where the path from the source to the cache and the path from the source to the
/// receiver part ways. If one path is a prefix of the other, it is the cache itself
pub fn fork_node(cache_path: &[NodeId], recv_path: &[NodeId], cache: NodeId) -> NodeId {
    (1..cache_path.len().min(recv_path.len()))
        .find(|&i| cache_path[i] != recv_path[i])
        .map_or(cache, |i| cache_path[i - 1])
}

/// What happened at the authoritative cache
enum Lookup {
    Hit,
    /// The content was fetched from the source, nothing has been delivered yet
    Miss { source: NodeId },
}

/// Routes the request to the authoritative cache and, on a miss, on to the source. A hit is
/// delivered to the receiver straight away
fn lookup(net: &mut dyn Network, event: &Event, cache: NodeId) -> Result<Lookup, StrategyError> {
    let source = source_of(net, event.content)?;
    let to_cache = path_between(net, event.receiver, cache)?;
    net.forward_request_path(&to_cache);
    if net.get_content(cache) {
        trace!(content = event.content, cache, "authoritative cache hit");
        deliver(net, cache, event.receiver, true)?;
        return Ok(Lookup::Hit);
    }
    let to_source = path_between(net, cache, source)?;
    net.forward_request_path(&to_source);
    fetch_from_source(net, source, event.content)?;
    Ok(Lookup::Miss { source })
}

fn deliver(net: &mut dyn Network, from: NodeId, to: NodeId, main_path: bool) -> Result<(), StrategyError> {
    let path = path_between(net, from, to)?;
    net.forward_content_path(&path, main_path);
    Ok(())
}

/// Source to cache, copy at the cache, cache to receiver
fn deliver_symmetric(net: &mut dyn Network, source: NodeId, cache: NodeId, receiver: NodeId) -> Result<(), StrategyError> {
    deliver(net, source, cache, true)?;
    net.put_content(cache);
    deliver(net, cache, receiver, true)
}

/// The delivery path from the source to the receiver, and where it forks off towards the cache
fn split(net: &dyn Network, source: NodeId, cache: NodeId, receiver: NodeId) -> Result<(Vec<NodeId>, NodeId), StrategyError> {
    let recv_path = path_between(net, source, receiver)?;
    let cache_path = path_between(net, source, cache)?;
    let fork = fork_node(&cache_path, &recv_path, cache);
    Ok((recv_path, fork))
}

/// Symmetric hash-routing: content always returns through the authoritative cache
#[derive(Debug)]
pub struct HashroutingSymmetric {
    assignment: HashAssignment,
}

impl HashroutingSymmetric {
    pub fn new(view: &dyn NetworkView) -> Result<Self, StrategyError> {
        Ok(Self {
            assignment: HashAssignment::new(view)?,
        })
    }
}

impl Strategy for HashroutingSymmetric {
    fn name(&self) -> &'static str {
        "HR_SYMM"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let cache = self.assignment.authoritative_cache(event.content);
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        if let Lookup::Miss { source } = lookup(net, event, cache)? {
            deliver_symmetric(net, source, cache, event.receiver)?;
        }
        net.end_session(true)
    }
}

/// Asymmetric hash-routing: content takes the shortest path back and is only cached if that path
/// crosses the authoritative cache
#[derive(Debug)]
pub struct HashroutingAsymmetric {
    assignment: HashAssignment,
}

impl HashroutingAsymmetric {
    pub fn new(view: &dyn NetworkView) -> Result<Self, StrategyError> {
        Ok(Self {
            assignment: HashAssignment::new(view)?,
        })
    }
}

impl Strategy for HashroutingAsymmetric {
    fn name(&self) -> &'static str {
        "HR_ASYMM"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let cache = self.assignment.authoritative_cache(event.content);
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        if let Lookup::Miss { source } = lookup(net, event, cache)? {
            let recv_path = path_between(net, source, event.receiver)?;
            if recv_path.contains(&cache) {
                deliver_symmetric(net, source, cache, event.receiver)?;
            } else {
                net.forward_content_path(&recv_path, true);
            }
        }
        net.end_session(true)
    }
}

/// Multicast hash-routing: off-path caches get their copy from a branch of the delivery
#[derive(Debug)]
pub struct HashroutingMulticast {
    assignment: HashAssignment,
}

impl HashroutingMulticast {
    pub fn new(view: &dyn NetworkView) -> Result<Self, StrategyError> {
        Ok(Self {
            assignment: HashAssignment::new(view)?,
        })
    }
}

impl Strategy for HashroutingMulticast {
    fn name(&self) -> &'static str {
        "HR_MULTICAST"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let cache = self.assignment.authoritative_cache(event.content);
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        if let Lookup::Miss { source } = lookup(net, event, cache)? {
            let (recv_path, fork) = split(net, source, cache, event.receiver)?;
            if recv_path.contains(&cache) {
                deliver_symmetric(net, source, cache, event.receiver)?;
            } else {
                deliver(net, source, fork, true)?;
                deliver(net, fork, event.receiver, true)?;
                deliver(net, fork, cache, false)?;
                net.put_content(cache);
            }
        }
        net.end_session(true)
    }
}

/// Asymmetric delivery, plus a multicast branch to the authoritative cache whenever the branch
/// is shorter than a fraction of the network diameter
#[derive(Debug)]
pub struct HashroutingHybridAM {
    assignment: HashAssignment,
    /// Maximum branch length, in hops
    max_stretch: f64,
}

impl HashroutingHybridAM {
    /// `max_stretch` is a fraction of the network diameter
    pub fn new(view: &dyn NetworkView, max_stretch: f64) -> Result<Self, StrategyError> {
        if !(max_stretch >= 0.0) || !max_stretch.is_finite() {
            return Err(StrategyError::invalid("max_stretch", max_stretch, "must be a non-negative number"));
        }
        let diameter = view.topology().diameter()?;
        Ok(Self {
            assignment: HashAssignment::new(view)?,
            max_stretch: diameter as f64 * max_stretch,
        })
    }
}

impl Strategy for HashroutingHybridAM {
    fn name(&self) -> &'static str {
        "HR_HYBRID_AM"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let cache = self.assignment.authoritative_cache(event.content);
        net.start_session(event.time, event.receiver, event.content, event.log)?;
        if let Lookup::Miss { source } = lookup(net, event, cache)? {
            let (recv_path, fork) = split(net, source, cache, event.receiver)?;
            if recv_path.contains(&cache) {
                deliver_symmetric(net, source, cache, event.receiver)?;
            } else {
                net.forward_content_path(&recv_path, true);
                let branch = path_between(net, fork, cache)?;
                if ((branch.len() - 1) as f64) < self.max_stretch {
                    net.forward_content_path(&branch, false);
                    net.put_content(cache);
                }
            }
        }
        net.end_session(true)
    }
}

/// Picks symmetric or multicast delivery per request, whichever crosses fewer links. Ties go to
/// symmetric delivery
#[derive(Debug)]
pub struct HashroutingHybridSM {
    assignment: HashAssignment,
}

impl HashroutingHybridSM {
    pub fn new(view: &dyn NetworkView) -> Result<Self, StrategyError> {
        Ok(Self {
            assignment: HashAssignment::new(view)?,
        })
    }
}

impl Strategy for HashroutingHybridSM {
    fn name(&self) -> &'static str {
        "HR_HYBRID_SM"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let cache = self.assignment.authoritative_cache(event.content);
        let receiver = event.receiver;
        net.start_session(event.time, receiver, event.content, event.log)?;
        if let Lookup::Miss { source } = lookup(net, event, cache)? {
            let (recv_path, fork) = split(net, source, cache, receiver)?;
            if recv_path.contains(&cache) {
                deliver_symmetric(net, source, cache, receiver)?;
            } else {
                let hops = |net: &dyn Network, u, v| path_between(net, u, v).map(|p| p.len());
                let view = &*net;
                let symmetric = hops(view, source, cache)? + hops(view, cache, receiver)? - 2;
                let multicast = hops(view, source, fork)? + hops(view, fork, cache)? + hops(view, fork, receiver)? - 3;
                trace!(symmetric, multicast, "delivery cost");
                net.put_content(cache);
                if symmetric <= multicast {
                    deliver(net, source, cache, true)?;
                    deliver(net, cache, receiver, true)?;
                } else {
                    net.forward_content_path(&recv_path, true);
                    deliver(net, fork, cache, false)?;
                }
            }
        }
        net.end_session(true)
    }
}
