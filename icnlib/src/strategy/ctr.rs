//! Characteristic-time routing
//!
//! Every receiver remembers, in a small table, where it was recently served from and until when
//! that copy is predicted to stay cached. The prediction is the characteristic time of an LRU cache
//! under the Che approximation, with content ids read as Zipf popularity ranks

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, trace};

use super::{fetch_from_source, path_between, path_links, source_of, Event, Strategy};
use crate::config::CharacteristicTimeConfig;
use crate::error::StrategyError;
use crate::network::Network;
use crate::popularity::{che_characteristic_time, TruncatedZipf};
use crate::{ContentId, NodeId, Time};

/// Where copies are left on the way back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCaching {
    /// The first cache below the serving node
    LeaveCopyDown,
    /// Every cache on the way back
    LeaveCopyEverywhere,
}

/// A placement a receiver has been served from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRecord {
    pub content: ContentId,
    pub node: NodeId,
    /// Predicted time the copy leaves the cache
    pub departure: Time,
    /// Time the request which produced the record was issued
    pub arrival: Time,
}

/// Fixed-size table of recent placements
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementTable {
    slots: Vec<Option<PlacementRecord>>,
}

impl PlacementTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// The record of a content with the latest predicted departure, the first one on ties
    pub fn lookup(&self, content: ContentId) -> Option<&PlacementRecord> {
        self.records()
            .filter(|record| record.content == content)
            .fold(None, |best: Option<&PlacementRecord>, record| match best {
                Some(b) if b.departure >= record.departure => Some(b),
                _ => Some(record),
            })
    }

    /// Writes a record into the first empty slot, or over the record with the smallest predicted
    /// departure. Returns the slot written
    pub fn insert(&mut self, record: PlacementRecord) -> usize {
        let slot = self.slots.iter().position(Option::is_none).unwrap_or_else(|| {
            self.slots
                .iter()
                .enumerate()
                .fold((0, f64::INFINITY), |(best, min), (i, s)| match s {
                    Some(r) if r.departure < min => (i, r.departure),
                    _ => (best, min),
                })
                .0
        });
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(record);
        }
        slot
    }

    pub fn records(&self) -> impl Iterator<Item = &PlacementRecord> {
        self.slots.iter().flatten()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Routes to a recently used replica while it is predicted to still be there
#[derive(Debug)]
pub struct CharacteristicTime {
    caching: ReturnCaching,
    pdf: Vec<f64>,
    table_capacity: usize,
    cache_size: Option<f64>,
    symm_paths: bool,
    tables: BTreeMap<NodeId, PlacementTable>,
    /// Memoised characteristic times, keyed by capacity bits and content
    residency: HashMap<(u64, ContentId), f64>,
}

impl CharacteristicTime {
    pub fn new(
        caching: ReturnCaching,
        popularity: TruncatedZipf,
        table_capacity: usize,
        cache_size: Option<f64>,
        symm_paths: bool,
    ) -> Result<Self, StrategyError> {
        if table_capacity == 0 {
            return Err(StrategyError::invalid("table_capacity", 0, "must be at least 1"));
        }
        if let Some(size) = cache_size {
            if !(size >= 0.0) {
                return Err(StrategyError::invalid("cache_size", size, "must be a non-negative number"));
            }
        }
        info!(
            ?caching,
            alpha = popularity.alpha(),
            n_contents = popularity.pdf().len(),
            table_capacity,
            symm_paths,
            "characteristic time routing ready"
        );
        Ok(Self {
            caching,
            pdf: popularity.pdf().to_vec(),
            table_capacity,
            cache_size,
            symm_paths,
            tables: BTreeMap::new(),
            residency: HashMap::new(),
        })
    }

    pub fn from_config(config: &CharacteristicTimeConfig, caching: ReturnCaching) -> Result<Self, StrategyError> {
        let popularity = TruncatedZipf::new(config.alpha, config.n_contents)?;
        Self::new(caching, popularity, config.table_capacity, config.cache_size, config.symm_paths)
    }

    /// The placement table of a receiver, if it has been served from a cache before
    pub fn table(&self, receiver: NodeId) -> Option<&PlacementTable> {
        self.tables.get(&receiver)
    }

    /// Characteristic time of a cache of `capacity` entries, seen by `content`
    pub fn residency_time(&mut self, capacity: f64, content: ContentId) -> f64 {
        let pdf = &self.pdf;
        *self.residency.entry((capacity.to_bits(), content)).or_insert_with(|| {
            // Content ids are 1-based popularity ranks, the pdf is 0-based
            let target = content.checked_sub(1).map(|rank| rank as usize);
            che_characteristic_time(pdf, capacity, target)
        })
    }

    /// The node the request is sent to
    fn choose_target(&self, net: &mut dyn Network, event: &Event, source: NodeId) -> Result<NodeId, StrategyError> {
        let content = event.content;
        // Expired records are treated as absent
        let live = self
            .table(event.receiver)
            .and_then(|t| t.lookup(content))
            .filter(|record| event.time < record.departure);
        if let Some(record) = live {
            if net.cache_lookup(record.node, content) {
                trace!(content, node = record.node, "placement table hit");
                if event.log {
                    net.record("ctr.table_hit", 1.0);
                }
                return Ok(record.node);
            }
            if event.log {
                net.record("ctr.table_fallback", 1.0);
            }
            return Ok(source);
        }

        let mut nearest: Option<(usize, NodeId)> = None;
        for location in net.content_locations(content) {
            if location == source {
                continue;
            }
            let hops = path_between(net, event.receiver, location)?.len();
            if nearest.map_or(true, |(best, _)| hops < best) {
                nearest = Some((hops, location));
            }
        }
        if let Some((hops, replica)) = nearest {
            let to_source = path_between(net, event.receiver, source)?.len();
            let gain = hops as i64 - to_source as i64;
            if net.cache_lookup(replica, content) && gain < 0 {
                trace!(content, replica, gain, "closer replica");
                if event.log {
                    net.record("ctr.replica_hit", 1.0);
                }
                return Ok(replica);
            }
        }
        Ok(source)
    }
}

impl Strategy for CharacteristicTime {
    fn name(&self) -> &'static str {
        match self.caching {
            ReturnCaching::LeaveCopyDown => "CTR",
            ReturnCaching::LeaveCopyEverywhere => "CTR_LCE",
        }
    }

    fn process_event(&mut self, net: &mut dyn Network, event: &Event) -> Result<(), StrategyError> {
        let source = source_of(net, event.content)?;
        let target = self.choose_target(net, event, source)?;
        let path = path_between(net, event.receiver, target)?;

        net.start_session(event.time, event.receiver, event.content, event.log)?;
        let mut walked = vec![event.receiver];
        let mut serving = None;
        // A replica at the receiver itself leaves no link to probe it on
        if target == event.receiver && net.has_cache(event.receiver) && net.get_content(event.receiver) {
            serving = Some(event.receiver);
        }
        for (u, v) in path_links(&path) {
            net.forward_request_hop(u, v);
            walked.push(v);
            if net.has_cache(v) && net.get_content(v) {
                serving = Some(v);
                break;
            }
        }
        let serving = match serving {
            Some(node) => node,
            None => {
                // The target didn't have it after all, carry on to the source
                let onwards = path_between(net, target, source)?;
                net.forward_request_path(&onwards);
                walked.extend(onwards.iter().skip(1));
                fetch_from_source(net, source, event.content)?;
                source
            }
        };

        let back: Vec<NodeId> = if self.symm_paths {
            walked.into_iter().rev().collect()
        } else {
            path_between(net, serving, event.receiver)?
        };
        let mut copied = false;
        for (u, v) in path_links(&back) {
            net.forward_content_hop(u, v);
            let admit = match self.caching {
                ReturnCaching::LeaveCopyEverywhere => net.has_cache(v),
                ReturnCaching::LeaveCopyDown => !copied && v != event.receiver && net.has_cache(v),
            };
            if admit {
                net.put_content(v);
                copied = true;
            }
        }
        net.end_session(true)?;

        if serving != source {
            let capacity = match self.cache_size {
                Some(size) => size,
                None => net.cache_size(serving).unwrap_or(0) as f64,
            };
            let departure = event.time + self.residency_time(capacity, event.content);
            let table_capacity = self.table_capacity;
            let slot = self
                .tables
                .entry(event.receiver)
                .or_insert_with(|| PlacementTable::new(table_capacity))
                .insert(PlacementRecord {
                    content: event.content,
                    node: serving,
                    departure,
                    arrival: event.time,
                });
            debug!(receiver = event.receiver, content = event.content, serving, departure, slot, "placement recorded");
        }
        Ok(())
    }
}
