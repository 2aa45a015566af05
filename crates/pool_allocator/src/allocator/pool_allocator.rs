//! Growable pool allocator
//!
//! Handles are drawn from the active pool until it reports exhaustion or
//! fragmentation. The allocator then steps to the next pool, appending a new
//! one at twice the previous capacity when it is already at the tail, and
//! retries once.
//!
//! ```text
//! pools:  [ base ][ 2*base ][ 4*base ] ...
//!                     ^
//!                active_index
//! ```
//!
//! Pools behind `active_index` are never revisited until `clear`, which
//! resets all of them in place and rewinds to pool 0 while keeping the
//! capacities reached so far.
//!
//! The allocator is not synchronized. Every mutating call takes `&mut self`;
//! share an instance across threads only behind a caller-owned lock.

use log::{debug, info, trace, warn};

use super::error::{AllocatorError, AllocatorResult};
use super::factory::PoolFactory;
use crate::config::AllocatorConfig;

/// A pool and the parameters it was created with
struct PoolSlot<P, G> {
    pool: P,
    capacity: u32,
    flags: G,
}

/// Read-only view of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolInfo<G> {
    /// Position in the pool sequence
    pub index: usize,
    /// Capacity the pool was created with
    pub capacity: u32,
    /// Creation flags snapshotted when the pool was created
    pub flags: G,
}

/// Allocator counters since the last `init`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of pools currently owned
    pub pool_count: usize,
    /// Pool currently receiving allocations
    pub active_index: usize,
    /// Sum of all pool capacities
    pub total_capacity: u64,
    /// Successful allocations
    pub allocations: u64,
    /// Pools appended after the first
    pub growth_events: u64,
    /// Advances onto an existing idle pool instead of growing
    pub idle_advances: u64,
    /// Completed `clear` calls
    pub clears: u64,
}

/// Dynamic pool-backed handle allocator
///
/// # Example
///
/// ```rust
/// use pool_allocator::prelude::*;
///
/// let mut allocator = PoolAllocator::new(MemoryPoolFactory::new());
/// allocator.init(MemoryCategory::Storage, 16).unwrap();
///
/// for _ in 0..17 {
///     allocator.allocate(&MemoryRequest::single()).unwrap();
/// }
///
/// assert_eq!(allocator.pool_count(), 2);
/// assert_eq!(allocator.active_index(), 1);
/// assert_eq!(allocator.pool_capacity(1), Some(32));
/// ```
pub struct PoolAllocator<F: PoolFactory> {
    factory: F,
    category: Option<F::Category>,
    base_capacity: u32,
    pools: Vec<PoolSlot<F::Pool, F::Flags>>,
    active_index: usize,
    growth_factor: u32,
    creation_flags: F::Flags,
    ready: bool,
    allocations: u64,
    growth_events: u64,
    idle_advances: u64,
    clears: u64,
}

impl<F: PoolFactory> PoolAllocator<F> {
    /// Create an uninitialized allocator that owns `factory`
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            category: None,
            base_capacity: 0,
            pools: Vec::new(),
            active_index: 0,
            growth_factor: 1,
            creation_flags: F::Flags::default(),
            ready: false,
            allocations: 0,
            growth_events: 0,
            idle_advances: 0,
            clears: 0,
        }
    }

    /// Create the first pool and make the allocator ready
    ///
    /// Fails with a programming fault if the allocator is already ready or
    /// `base_capacity` is zero. If the backend cannot create the first pool
    /// the allocator stays uninitialized.
    pub fn init(&mut self, category: F::Category, base_capacity: u32) -> AllocatorResult<()> {
        if self.ready {
            return Err(AllocatorError::AlreadyInitialized);
        }
        if base_capacity == 0 {
            return Err(AllocatorError::ZeroCapacity);
        }

        let flags = self.creation_flags;
        let pool = self
            .factory
            .create_pool(category, base_capacity, flags)
            .map_err(|source| AllocatorError::PoolCreation {
                capacity: base_capacity,
                source,
            })?;

        self.category = Some(category);
        self.base_capacity = base_capacity;
        self.growth_factor = 1;
        self.pools.push(PoolSlot {
            pool,
            capacity: base_capacity,
            flags,
        });
        self.active_index = 0;
        self.ready = true;
        self.allocations = 0;
        self.growth_events = 0;
        self.idle_advances = 0;
        self.clears = 0;

        info!(
            "Initialized pool allocator for {:?} with base capacity {}",
            category, base_capacity
        );
        Ok(())
    }

    /// Apply config-file flags, then `init` with the configured base capacity
    pub fn init_with_config(
        &mut self,
        category: F::Category,
        config: &AllocatorConfig,
    ) -> AllocatorResult<()> {
        self.set_creation_flags(F::flags_from_bits(config.creation_flags));
        self.init(category, config.base_capacity)
    }

    /// Set the flags used for pools created from now on
    ///
    /// Existing pools keep the flags they were created with.
    pub fn set_creation_flags(&mut self, flags: F::Flags) {
        debug!("Pool creation flags set to {:?}", flags);
        self.creation_flags = flags;
    }

    /// Draw one handle, growing the pool sequence if needed
    pub fn allocate(&mut self, spec: &F::Spec) -> AllocatorResult<F::Handle> {
        self.ensure_ready("allocate")?;

        let pool_index = self.active_index;
        match self
            .factory
            .allocate_from_pool(&self.pools[pool_index].pool, spec)
        {
            Ok(handle) => {
                self.allocations += 1;
                trace!("Allocated from pool {}", pool_index);
                Ok(handle)
            }
            Err(err) if err.is_retryable() => {
                debug!("Pool {} cannot satisfy request ({}), advancing", pool_index, err);
                self.advance()?;

                let pool_index = self.active_index;
                let handle = self
                    .factory
                    .allocate_from_pool(&self.pools[pool_index].pool, spec)
                    .map_err(|source| AllocatorError::RetryFailed { pool_index, source })?;
                self.allocations += 1;
                Ok(handle)
            }
            Err(source) => Err(AllocatorError::Backend { pool_index, source }),
        }
    }

    /// Reset every pool in place and rewind to pool 0
    ///
    /// Every handle previously returned becomes invalid. The caller must make
    /// sure none of them is still in use. Pool capacities are kept.
    pub fn clear(&mut self) -> AllocatorResult<()> {
        self.ensure_ready("clear")?;

        for (pool_index, slot) in self.pools.iter().enumerate() {
            self.factory
                .reset_pool(&slot.pool)
                .map_err(|source| AllocatorError::Reset { pool_index, source })?;
        }
        self.active_index = 0;
        self.clears += 1;

        debug!("Cleared {} pools", self.pools.len());
        Ok(())
    }

    /// Destroy every pool and return to the uninitialized state
    ///
    /// All pools are released even if some fail; the first failure is
    /// returned afterwards.
    pub fn destroy(&mut self) -> AllocatorResult<()> {
        self.ensure_ready("destroy")?;

        let pool_count = self.pools.len();
        match self.release_pools() {
            Some(err) => Err(err),
            None => {
                info!("Destroyed pool allocator ({} pools released)", pool_count);
                Ok(())
            }
        }
    }

    /// Whether `init` has run and `destroy` has not
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Resource category set by `init`
    pub fn category(&self) -> Option<F::Category> {
        self.category
    }

    /// Capacity of pool 0
    pub fn base_capacity(&self) -> u32 {
        self.base_capacity
    }

    /// Number of pools currently owned
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Pool currently receiving allocations
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// Multiplier applied to the base capacity by the most recent pool
    pub fn growth_factor(&self) -> u32 {
        self.growth_factor
    }

    /// Flags that the next created pool will get
    pub fn creation_flags(&self) -> F::Flags {
        self.creation_flags
    }

    /// Capacity of pool `index`
    pub fn pool_capacity(&self, index: usize) -> Option<u32> {
        self.pools.get(index).map(|slot| slot.capacity)
    }

    /// Flags pool `index` was created with
    pub fn pool_flags(&self, index: usize) -> Option<F::Flags> {
        self.pools.get(index).map(|slot| slot.flags)
    }

    /// Iterate over all pools in creation order
    pub fn pools(&self) -> impl Iterator<Item = PoolInfo<F::Flags>> + '_ {
        self.pools.iter().enumerate().map(|(index, slot)| PoolInfo {
            index,
            capacity: slot.capacity,
            flags: slot.flags,
        })
    }

    /// Sum of all pool capacities
    pub fn total_capacity(&self) -> u64 {
        self.pools.iter().map(|slot| u64::from(slot.capacity)).sum()
    }

    /// Snapshot of the allocator counters
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            pool_count: self.pools.len(),
            active_index: self.active_index,
            total_capacity: self.total_capacity(),
            allocations: self.allocations,
            growth_events: self.growth_events,
            idle_advances: self.idle_advances,
            clears: self.clears,
        }
    }

    /// Backend this allocator draws from
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Mutable access to the backend
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    fn ensure_ready(&self, operation: &'static str) -> AllocatorResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(AllocatorError::NotReady { operation })
        }
    }

    /// Step one pool forward, appending a new pool when already at the tail
    ///
    /// `active_index` only moves once the target pool exists, so a failed
    /// growth leaves the allocator pointing at a valid pool.
    fn advance(&mut self) -> AllocatorResult<()> {
        let next = self.active_index + 1;
        if next == self.pools.len() {
            self.grow()?;
        } else {
            self.idle_advances += 1;
            debug!("Advancing to idle pool {}", next);
        }
        self.active_index = next;
        Ok(())
    }

    fn grow(&mut self) -> AllocatorResult<()> {
        let base = self.base_capacity;
        let factor = self.growth_factor.checked_mul(2).ok_or(AllocatorError::CapacityOverflow {
            base,
            factor: self.growth_factor,
        })?;
        let capacity = base
            .checked_mul(factor)
            .ok_or(AllocatorError::CapacityOverflow { base, factor })?;

        let category = self.category.ok_or(AllocatorError::NotReady { operation: "allocate" })?;
        let flags = self.creation_flags;
        let pool = self
            .factory
            .create_pool(category, capacity, flags)
            .map_err(|source| AllocatorError::PoolCreation { capacity, source })?;

        self.growth_factor = factor;
        self.pools.push(PoolSlot { pool, capacity, flags });
        self.growth_events += 1;

        debug!(
            "Grew to {} pools; pool {} has capacity {}",
            self.pools.len(),
            self.pools.len() - 1,
            capacity
        );
        Ok(())
    }

    /// Destroy every pool and mark the allocator unready
    fn release_pools(&mut self) -> Option<AllocatorError> {
        let mut first_failure = None;
        for (pool_index, slot) in self.pools.drain(..).enumerate() {
            if let Err(source) = self.factory.destroy_pool(slot.pool) {
                warn!("Failed to destroy pool {}: {}", pool_index, source);
                if first_failure.is_none() {
                    first_failure = Some(AllocatorError::Destroy { pool_index, source });
                }
            }
        }

        self.category = None;
        self.active_index = 0;
        self.ready = false;
        first_failure
    }
}

impl<F: PoolFactory> Drop for PoolAllocator<F> {
    fn drop(&mut self) {
        if self.ready {
            if let Some(err) = self.release_pools() {
                warn!("Pool allocator dropped with teardown failure: {}", err);
            }
        }
    }
}
