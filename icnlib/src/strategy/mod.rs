//! Caching and routing strategies
//!
//! Every strategy implements [`Strategy::process_event`]: open one session on the controller,
//! route the request to a serving node, deliver the content back while deciding where to leave
//! copies, and close the session before returning. Strategies are independent of each other and
//! only share the helpers below

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::artifacts::{read_content_list, resolve_placement, ContentIndex, SnapshotDirectory};
use crate::config::StrategyConfig;
use crate::error::StrategyError;
use crate::network::{Network, NetworkView};
use crate::{ContentId, NodeId, Time};

pub mod ctr;
pub mod hashrouting;
pub mod nrr;
pub mod offline;
pub mod onpath;

pub use ctr::{CharacteristicTime, ReturnCaching};
pub use hashrouting::{
    HashAssignment, HashroutingAsymmetric, HashroutingHybridAM, HashroutingHybridSM, HashroutingMulticast,
    HashroutingSymmetric,
};
pub use nrr::{Metacaching, NearestReplicaRouting};
pub use offline::{Hybrid, Optimal, StaticOptimal};
pub use onpath::{
    CacheLessForMore, Edge, LeaveCopyDown, LeaveCopyEverywhere, NoCache, ProbCache, RandomBernoulli, RandomChoice,
};

/// A content request, immutable once issued
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub time: Time,
    pub receiver: NodeId,
    pub content: ContentId,
    /// Whether the traffic of this request is measured
    pub log: bool,
}

impl Event {
    pub fn new(time: Time, receiver: NodeId, content: ContentId, log: bool) -> Self {
        Self {
            time,
            receiver,
            content,
            log,
        }
    }
}

/// A caching and routing strategy
pub trait Strategy {
    /// The registry name of the strategy
    fn name(&self) -> &'static str;

    /// Handles one request from issue to delivery, within exactly one controller session
    ///
    /// Fails if the request reaches the source of the content and the source doesn't hold it
    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError>;
}

/// Consecutive `(u, v)` links of a path
pub fn path_links(path: &[NodeId]) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
    path.windows(2).map(|hop| (hop[0], hop[1]))
}

pub(crate) fn source_of(net: &dyn Network, content: ContentId) -> Result<NodeId, StrategyError> {
    net.content_source(content).ok_or(StrategyError::UnknownContent(content))
}

pub(crate) fn path_between(net: &dyn Network, from: NodeId, to: NodeId) -> Result<Vec<NodeId>, StrategyError> {
    net.shortest_path(from, to).ok_or(StrategyError::NoPath { from, to })
}

/// The path content takes from `serving` back to `receiver`
pub(crate) fn return_path(net: &dyn Network, receiver: NodeId, serving: NodeId) -> Result<Vec<NodeId>, StrategyError> {
    let mut path = path_between(net, receiver, serving)?;
    path.reverse();
    Ok(path)
}

/// Retrieves the session content from its source, which must hold it
pub(crate) fn fetch_from_source(net: &mut dyn Network, source: NodeId, content: ContentId) -> Result<(), StrategyError> {
    if net.get_content(source) {
        Ok(())
    } else {
        Err(StrategyError::ContentNotAtSource { content, node: source })
    }
}

/// Forwards a request along `path`, probing every cache on the way, and returns the first node
/// which serves it. Reaching the end of the path means the last node must serve it
pub(crate) fn probe_path(net: &mut dyn Network, path: &[NodeId], content: ContentId) -> Result<NodeId, StrategyError> {
    for (u, v) in path_links(path) {
        net.forward_request_hop(u, v);
        if net.has_cache(v) && net.get_content(v) {
            return Ok(v);
        }
    }
    let Some(&last) = path.last() else {
        return Err(StrategyError::UnknownContent(content));
    };
    if path.len() > 1 && net.has_cache(last) {
        // Already probed above, and a source is always served by get_content
        return Err(StrategyError::ContentNotAtSource { content, node: last });
    }
    fetch_from_source(net, last, content)?;
    Ok(last)
}

/// Builds the configured strategy
///
/// `seed` initialises the one random stream the randomised strategies draw from, so replaying a
/// trace with the same seed reproduces the run exactly
pub fn create_strategy(
    config: &StrategyConfig,
    view: &dyn NetworkView,
    seed: u64,
) -> Result<Box<dyn Strategy>, StrategyError> {
    let rng = StdRng::seed_from_u64(seed);
    let strategy: Box<dyn Strategy> = match config {
        StrategyConfig::NoCache => Box::new(NoCache::new()),
        StrategyConfig::Edge => Box::new(Edge::new()),
        StrategyConfig::LeaveCopyEverywhere => Box::new(LeaveCopyEverywhere::new()),
        StrategyConfig::LeaveCopyDown => Box::new(LeaveCopyDown::new()),
        StrategyConfig::ProbCache { t_tw } => Box::new(ProbCache::new(view, *t_tw, rng)?),
        StrategyConfig::CacheLessForMore { use_ego_betw } => Box::new(CacheLessForMore::new(view, *use_ego_betw)),
        StrategyConfig::RandomChoice => Box::new(RandomChoice::new(rng)),
        StrategyConfig::RandomBernoulli { p } => Box::new(RandomBernoulli::new(*p, rng)?),
        StrategyConfig::NearestReplica { metacaching } => Box::new(NearestReplicaRouting::new(metacaching)?),
        StrategyConfig::HashroutingSymmetric => Box::new(HashroutingSymmetric::new(view)?),
        StrategyConfig::HashroutingAsymmetric => Box::new(HashroutingAsymmetric::new(view)?),
        StrategyConfig::HashroutingMulticast => Box::new(HashroutingMulticast::new(view)?),
        StrategyConfig::HashroutingHybridAM { max_stretch } => Box::new(HashroutingHybridAM::new(view, *max_stretch)?),
        StrategyConfig::HashroutingHybridSM => Box::new(HashroutingHybridSM::new(view)?),
        StrategyConfig::Optimal {
            snapshots,
            warmup_requests,
            checkpoint_interval,
            max_snapshots,
        } => {
            let provider = SnapshotDirectory::discover(snapshots)?;
            Box::new(Optimal::new(
                Box::new(provider),
                *warmup_requests,
                *checkpoint_interval,
                *max_snapshots,
            )?)
        }
        StrategyConfig::StaticOptimal {
            placement,
            contents,
            warmup_requests,
        } => {
            let index = match contents {
                Some(path) => ContentIndex::listed(read_content_list(path)?),
                None => ContentIndex::OneBased,
            };
            let raw = crate::artifacts::read_placement(placement)?;
            let placement = resolve_placement(raw, &index, placement)?;
            Box::new(StaticOptimal::new(placement, *warmup_requests))
        }
        StrategyConfig::Hybrid {
            ranked_contents,
            static_fraction,
        } => Box::new(Hybrid::new(read_content_list(ranked_contents)?, *static_fraction)?),
        StrategyConfig::CharacteristicTime(params) => {
            Box::new(CharacteristicTime::from_config(params, ReturnCaching::LeaveCopyDown)?)
        }
        StrategyConfig::CharacteristicTimeLce(params) => {
            Box::new(CharacteristicTime::from_config(params, ReturnCaching::LeaveCopyEverywhere)?)
        }
    };
    info!(strategy = strategy.name(), seed, "strategy created");
    Ok(strategy)
}
