/// A generic trait for implementing new replacement policies. Can be used to parameterise a Cache.
pub trait ReplacementPolicy {
    /// Updates the policy when a stored content is read, or inserted again while already present
    ///
    /// Not applicable for some policies, a default which does nothing is provided
    ///
    /// # Arguments
    ///
    /// * `slot`: The index of the slot which was read
    ///
    /// returns: ()
    ///
    fn update_on_read(&mut self, _slot: usize) {}

    /// Used by the cache to get a slot index when a new content needs added to the cache.
    ///
    /// Implementations should assume that when this method is called, the content in the slot has
    /// been replaced. Slots which have never been written must be handed out before any occupied
    /// slot is evicted
    ///
    /// returns: usize
    fn get_new_slot(&mut self) -> usize;
}

/// Round robin replacement. As contents only ever enter through `get_new_slot` this evicts in
/// insertion order, i.e. FIFO
pub struct RoundRobin {
    next: usize,
    capacity: usize,
}

impl RoundRobin {
    pub fn new(capacity: usize) -> Self {
        Self { next: 0, capacity }
    }
}

impl ReplacementPolicy for RoundRobin {
    fn get_new_slot(&mut self) -> usize {
        let val = self.next;
        self.next = (self.next + 1) % self.capacity;
        val
    }
}

/// Least Recently Used replacement policy
///
/// This implementation keeps track of when each slot was last used, and also keeps track of a
/// logical clock, which is updated each time a slot is used. Unused slots keep the time 0, which
/// the clock never hands out, so they are picked first
pub struct LeastRecentlyUsed {
    last_used_times: Vec<u64>,
    time: u64,
}

impl LeastRecentlyUsed {
    pub fn new(capacity: usize) -> Self {
        Self {
            last_used_times: vec![0; capacity],
            time: 1,
        }
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn update_on_read(&mut self, slot: usize) {
        self.last_used_times[slot] = self.time;
        self.time += 1;
    }

    fn get_new_slot(&mut self) -> usize {
        let mut min_value = u64::MAX;
        let mut min_index = 0;
        let mut index = 0;
        while index < self.last_used_times.len() {
            if self.last_used_times[index] < min_value {
                min_value = self.last_used_times[index];
                min_index = index;
            }
            index += 1;
        }
        self.last_used_times[min_index] = self.time;
        self.time += 1;
        min_index
    }
}

/// Least frequently used replacement policy
///
/// Ties go to the lowest slot index, which also makes unused slots (usage 0) fill in order
pub struct LeastFrequentlyUsed {
    usages: Vec<u64>,
}

impl LeastFrequentlyUsed {
    pub fn new(capacity: usize) -> Self {
        Self {
            usages: vec![0; capacity],
        }
    }
}

impl ReplacementPolicy for LeastFrequentlyUsed {
    fn update_on_read(&mut self, slot: usize) {
        self.usages[slot] += 1;
    }

    fn get_new_slot(&mut self) -> usize {
        let mut min_value = u64::MAX;
        let mut min_index = 0;
        let mut index = 0;
        while index < self.usages.len() {
            if self.usages[index] < min_value {
                min_value = self.usages[index];
                min_index = index;
            }
            index += 1;
        }
        self.usages[min_index] = 1;
        min_index
    }
}
