use std::collections::{HashMap, HashSet};

use crate::config::ReplacementPolicyConfig;
use crate::replacement_policies::{LeastFrequentlyUsed, LeastRecentlyUsed, ReplacementPolicy, RoundRobin};
use crate::ContentId;

/// A generic trait for the content store of a cache node
///
/// Technically not required as we're using static dispatch instead of dyn ContentCache, but this
/// keeps the node storage swappable for the network model
pub trait ContentCache {
    /// Looks a content up, returning true on a hit. A hit updates the replacement policy, a miss
    /// leaves the cache untouched
    fn get(&mut self, content: ContentId) -> bool;

    /// Checks whether a content is stored, without any side effect
    fn has(&self, content: ContentId) -> bool;

    /// Inserts a content, returning the content it evicted, if any
    ///
    /// Inserting a content which is already stored refreshes it as if it was read
    fn put(&mut self, content: ContentId) -> Option<ContentId>;

    /// The maximum number of contents which can be stored
    fn capacity(&self) -> usize;

    /// The number of contents currently stored
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored contents, in slot order. Useful for debugging and snapshot comparisons
    fn contents(&self) -> Vec<ContentId>;
}

/// A fixed capacity content cache, parameterised by a replacement policy
///
/// Contents live in slots; the policy only ever sees slot indices, so adding a policy never means
/// touching the bookkeeping here. Monomorphisation inlines the policy calls
pub struct Cache<R: ReplacementPolicy> {
    slots: Vec<Option<ContentId>>,
    index: HashMap<ContentId, usize>,
    replacement_policy: R,
}

impl<R: ReplacementPolicy> Cache<R> {
    pub fn new(capacity: usize, policy: R) -> Self {
        Self {
            slots: vec![None; capacity],
            index: HashMap::with_capacity(capacity),
            replacement_policy: policy,
        }
    }
}

impl<R: ReplacementPolicy> ContentCache for Cache<R> {
    fn get(&mut self, content: ContentId) -> bool {
        match self.index.get(&content) {
            Some(&slot) => {
                self.replacement_policy.update_on_read(slot);
                true
            }
            None => false,
        }
    }

    fn has(&self, content: ContentId) -> bool {
        self.index.contains_key(&content)
    }

    fn put(&mut self, content: ContentId) -> Option<ContentId> {
        if self.slots.is_empty() {
            return None;
        }
        if let Some(&slot) = self.index.get(&content) {
            self.replacement_policy.update_on_read(slot);
            return None;
        }
        let slot = self.replacement_policy.get_new_slot();
        let evicted = self.slots[slot].replace(content);
        if let Some(old) = evicted {
            self.index.remove(&old);
        }
        self.index.insert(content, slot);
        evicted
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn contents(&self) -> Vec<ContentId> {
        self.slots.iter().flatten().copied().collect()
    }
}

/// Enum for all the node cache types provided by the library
///
/// Using trait objects reduces boilerplate, but the network model looks a cache up on every hop
/// of every request. Branching explicitly keeps the concrete types visible to the compiler
pub enum GenericCache {
    RoundRobin(Cache<RoundRobin>),
    LeastRecentlyUsed(Cache<LeastRecentlyUsed>),
    LeastFrequentlyUsed(Cache<LeastFrequentlyUsed>),
}

impl GenericCache {
    /// Creates an empty cache with the given capacity and replacement policy
    pub fn with_policy(capacity: usize, policy: ReplacementPolicyConfig) -> Self {
        match policy {
            ReplacementPolicyConfig::RoundRobin => {
                GenericCache::from(Cache::new(capacity, RoundRobin::new(capacity)))
            }
            ReplacementPolicyConfig::LeastRecentlyUsed => {
                GenericCache::from(Cache::new(capacity, LeastRecentlyUsed::new(capacity)))
            }
            ReplacementPolicyConfig::LeastFrequentlyUsed => {
                GenericCache::from(Cache::new(capacity, LeastFrequentlyUsed::new(capacity)))
            }
        }
    }

    /// The policy this cache was built with, so a resized replacement can keep it
    pub fn policy(&self) -> ReplacementPolicyConfig {
        match self {
            GenericCache::RoundRobin(_) => ReplacementPolicyConfig::RoundRobin,
            GenericCache::LeastRecentlyUsed(_) => ReplacementPolicyConfig::LeastRecentlyUsed,
            GenericCache::LeastFrequentlyUsed(_) => ReplacementPolicyConfig::LeastFrequentlyUsed,
        }
    }
}

impl From<Cache<RoundRobin>> for GenericCache {
    fn from(value: Cache<RoundRobin>) -> Self {
        Self::RoundRobin(value)
    }
}

impl From<Cache<LeastRecentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastRecentlyUsed>) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<Cache<LeastFrequentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastFrequentlyUsed>) -> Self {
        Self::LeastFrequentlyUsed(value)
    }
}

impl ContentCache for GenericCache {
    fn get(&mut self, content: ContentId) -> bool {
        match self {
            GenericCache::RoundRobin(c) => c.get(content),
            GenericCache::LeastRecentlyUsed(c) => c.get(content),
            GenericCache::LeastFrequentlyUsed(c) => c.get(content),
        }
    }

    fn has(&self, content: ContentId) -> bool {
        match self {
            GenericCache::RoundRobin(c) => c.has(content),
            GenericCache::LeastRecentlyUsed(c) => c.has(content),
            GenericCache::LeastFrequentlyUsed(c) => c.has(content),
        }
    }

    fn put(&mut self, content: ContentId) -> Option<ContentId> {
        match self {
            GenericCache::RoundRobin(c) => c.put(content),
            GenericCache::LeastRecentlyUsed(c) => c.put(content),
            GenericCache::LeastFrequentlyUsed(c) => c.put(content),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            GenericCache::RoundRobin(c) => c.capacity(),
            GenericCache::LeastRecentlyUsed(c) => c.capacity(),
            GenericCache::LeastFrequentlyUsed(c) => c.capacity(),
        }
    }

    fn len(&self) -> usize {
        match self {
            GenericCache::RoundRobin(c) => c.len(),
            GenericCache::LeastRecentlyUsed(c) => c.len(),
            GenericCache::LeastFrequentlyUsed(c) => c.len(),
        }
    }

    fn contents(&self) -> Vec<ContentId> {
        match self {
            GenericCache::RoundRobin(c) => c.contents(),
            GenericCache::LeastRecentlyUsed(c) => c.contents(),
            GenericCache::LeastFrequentlyUsed(c) => c.contents(),
        }
    }
}

/// The static partition of a node: filled once, never evicts
///
/// Inserting into a full store is ignored rather than displacing anything
pub struct StaticStore {
    capacity: usize,
    contents: HashSet<ContentId>,
    order: Vec<ContentId>,
}

impl StaticStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            contents: HashSet::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    /// Returns true if the content is stored after the call
    pub fn insert(&mut self, content: ContentId) -> bool {
        if self.contents.contains(&content) {
            return true;
        }
        if self.order.len() >= self.capacity {
            return false;
        }
        self.contents.insert(content);
        self.order.push(content);
        true
    }

    pub fn has(&self, content: ContentId) -> bool {
        self.contents.contains(&content)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contents(&self) -> &[ContentId] {
        &self.order
    }
}
