use std::str::FromStr;

use super::{path_between, path_links, return_path, source_of, Event, Strategy};
use crate::error::StrategyError;
use crate::network::Network;

/// How copies are left on the way back from the nearest replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metacaching {
    /// Every cache on the way back which doesn't hold the content yet
    LeaveCopyEverywhere,
    /// The first cache below the replica
    LeaveCopyDown,
}

impl FromStr for Metacaching {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LCE" => Ok(Metacaching::LeaveCopyEverywhere),
            "LCD" => Ok(Metacaching::LeaveCopyDown),
            other => Err(StrategyError::UnsupportedMetacaching(other.to_string())),
        }
    }
}

/// Ideal Nearest Replica Routing: every node knows, without signalling, where the closest copy of
/// a content is, and requests go straight there
#[derive(Debug)]
pub struct NearestReplicaRouting {
    metacaching: Metacaching,
}

impl NearestReplicaRouting {
    pub fn new(metacaching: &str) -> Result<Self, StrategyError> {
        Ok(Self {
            metacaching: metacaching.parse()?,
        })
    }

    pub fn metacaching(&self) -> Metacaching {
        self.metacaching
    }
}

impl Strategy for NearestReplicaRouting {
    fn name(&self) -> &'static str {
        "NRR"
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let source = source_of(net, event.content)?;
        // Locations come in ascending id order, so the first of the shortest wins ties
        let mut nearest = (source, path_between(net, event.receiver, source)?);
        for location in net.content_locations(event.content) {
            let path = path_between(net, event.receiver, location)?;
            if path.len() < nearest.1.len() || (path.len() == nearest.1.len() && location < nearest.0) {
                nearest = (location, path);
            }
        }
        let (replica, path) = nearest;

        net.start_session(event.time, event.receiver, event.content, event.log)?;
        net.forward_request_path(&path);
        if !net.get_content(replica) {
            return Err(StrategyError::ContentNotAtSource {
                content: event.content,
                node: replica,
            });
        }
        let back = return_path(net, event.receiver, replica)?;
        match self.metacaching {
            Metacaching::LeaveCopyEverywhere => {
                for (u, v) in path_links(&back) {
                    net.forward_content_hop(u, v);
                    if net.has_cache(v) && !net.cache_lookup(v, event.content) {
                        net.put_content(v);
                    }
                }
            }
            Metacaching::LeaveCopyDown => {
                let mut copied = false;
                for (u, v) in path_links(&back) {
                    net.forward_content_hop(u, v);
                    if !copied && v != event.receiver && net.has_cache(v) {
                        net.put_content(v);
                        copied = true;
                    }
                }
            }
        }
        net.end_session(true)
    }
}
