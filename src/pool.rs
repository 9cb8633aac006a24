// agora_core/src/pool.rs
//
// Order pool (C1): a slab allocator for `Order` records.
//
// The source this is grounded on (`memory_manager.h`) keeps a
// `boost::intrusive::list` of free slots threaded through raw pointers into
// fixed-size backing arrays, so that a freed slot's address is still valid
// and can be re-linked in O(1). In safe Rust the equivalent of "a stable
// address" is a stable `u32` index into a growable arena: `acquire` and
// `release` are still O(1), and the free list is a plain `Vec<u32>` used as
// a LIFO stack (`push`/`pop` are both O(1), and LIFO reuse keeps recently
// freed slots hot in cache, matching the source's `push_front`/`pop_front`
// discipline on its intrusive list).

use crate::error::{SimError, SimResult};
use crate::order::Order;

/// Stable handle into an `OrderPool`. Valid until the order it names is
/// released back to the pool.
pub type OrderRef = u32;

pub struct OrderPool {
    slots: Vec<Order>,
    free: Vec<OrderRef>,
    used: usize,
}

impl OrderPool {
    /// `initial_capacity` must be a power of two, mirroring the source's
    /// slab-sizing discipline; unlike the source (which calls `exit(1)`),
    /// a library reports this as an ordinary error.
    pub fn new(initial_capacity: usize) -> SimResult<Self> {
        if initial_capacity == 0 || !initial_capacity.is_power_of_two() {
            return Err(SimError::InvalidArgument(format!(
                "OrderPool capacity must be a power of two, got {initial_capacity}"
            )));
        }
        Ok(Self {
            slots: Vec::with_capacity(initial_capacity),
            free: Vec::new(),
            used: 0,
        })
    }

    /// Acquire a cleared order record. O(1) amortized: either pops the
    /// front of the free list (genuinely O(1)) or pushes a fresh
    /// zero-valued slot onto `slots` (amortized O(1) like any `Vec::push`).
    pub fn acquire(&mut self) -> OrderRef {
        self.used += 1;
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize].clear();
            return idx;
        }
        self.slots.push(Order::default());
        (self.slots.len() - 1) as OrderRef
    }

    /// Return an order record to the free list. O(1). The record is
    /// cleared immediately so a stale read through a dangling `OrderRef`
    /// (a caller bug) observes zeros rather than another order's state.
    pub fn release(&mut self, idx: OrderRef) {
        self.slots[idx as usize].clear();
        self.free.push(idx);
        self.used -= 1;
    }

    pub fn get(&self, idx: OrderRef) -> &Order {
        &self.slots[idx as usize]
    }

    pub fn get_mut(&mut self, idx: OrderRef) -> &mut Order {
        &mut self.slots[idx as usize]
    }

    /// Number of currently-acquired (not-yet-released) records.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Number of records sitting on the free list, ready for reuse.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Total records ever allocated (used + free).
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }
}
