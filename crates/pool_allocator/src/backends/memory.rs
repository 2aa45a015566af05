//! In-memory pool backend
//!
//! Pools here are bookkeeping only: a capacity, a fill level and the flags
//! they were created with. Useful for tests, tooling and dry runs of an
//! allocation workload without a GPU.

use bitflags::bitflags;
use log::trace;

use crate::allocator::{PoolError, PoolFactory};

/// Resource categories understood by the in-memory backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryCategory {
    /// Uniform buffer bindings
    Uniform,
    /// Storage buffer bindings
    Storage,
    /// Sampled image bindings
    Sampler,
    /// Storage image bindings
    StorageImage,
}

bitflags! {
    /// Creation flags recorded on in-memory pools
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPoolFlags: u32 {
        /// Handles may be released one by one
        const FREE_INDIVIDUAL = 1 << 0;
        /// Bindings may be updated after they are bound
        const UPDATE_AFTER_BIND = 1 << 1;
        /// Pool lives in host memory only
        const HOST_ONLY = 1 << 2;
    }
}

impl Default for MemoryPoolFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Identifier of an in-memory pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryPoolId(pub usize);

/// One allocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequest {
    /// Capacity units the request consumes
    pub units: u32,
}

impl MemoryRequest {
    /// Request `units` of capacity
    pub fn new(units: u32) -> Self {
        Self { units }
    }

    /// Request a single unit
    pub fn single() -> Self {
        Self::new(1)
    }
}

impl Default for MemoryRequest {
    fn default() -> Self {
        Self::single()
    }
}

/// Handle returned by the in-memory backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle {
    /// Pool the handle was drawn from
    pub pool: MemoryPoolId,
    /// Offset of the first unit within the pool
    pub offset: u32,
    /// Reset generation of the pool when the handle was issued
    pub generation: u32,
}

/// State of one in-memory pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPoolRecord {
    /// Category the pool was created for
    pub category: MemoryCategory,
    /// Total capacity in units
    pub capacity: u32,
    /// Flags the pool was created with
    pub flags: MemoryPoolFlags,
    /// Units handed out since the last reset
    pub used: u32,
    /// Number of times the pool was reset
    pub resets: u32,
    /// Whether the pool has been destroyed
    pub destroyed: bool,
    fragment_next: bool,
}

impl MemoryPoolRecord {
    /// Units still available
    pub fn remaining(&self) -> u32 {
        self.capacity - self.used
    }
}

/// [`PoolFactory`] that keeps pools as plain records
#[derive(Debug, Default)]
pub struct MemoryPoolFactory {
    pools: Vec<MemoryPoolRecord>,
    fail_next_create: bool,
    fail_next_reset: bool,
    fail_next_destroy: bool,
}

impl MemoryPoolFactory {
    /// Create a factory with no pools
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_pool` call fail with a backend error
    pub fn fail_next_create(&mut self) {
        self.fail_next_create = true;
    }

    /// Make the next `reset_pool` call fail with a backend error
    pub fn fail_next_reset(&mut self) {
        self.fail_next_reset = true;
    }

    /// Make the next `destroy_pool` call fail with a backend error
    ///
    /// The pool involved stays live.
    pub fn fail_next_destroy(&mut self) {
        self.fail_next_destroy = true;
    }

    /// Make the next allocation from pool `index` report fragmentation
    ///
    /// Returns `false` if no such pool exists.
    pub fn inject_fragmentation(&mut self, index: usize) -> bool {
        match self.pools.get_mut(index) {
            Some(record) => {
                record.fragment_next = true;
                true
            }
            None => false,
        }
    }

    /// Record of pool `index`, including destroyed pools
    pub fn pool(&self, index: usize) -> Option<&MemoryPoolRecord> {
        self.pools.get(index)
    }

    /// All pools ever created, in creation order
    pub fn records(&self) -> &[MemoryPoolRecord] {
        &self.pools
    }

    /// Number of pools ever created
    pub fn created_pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Number of pools not yet destroyed
    pub fn live_pool_count(&self) -> usize {
        self.pools.iter().filter(|record| !record.destroyed).count()
    }

    /// Number of destroyed pools
    pub fn destroyed_pool_count(&self) -> usize {
        self.pools.iter().filter(|record| record.destroyed).count()
    }

    fn live_record(&mut self, pool: MemoryPoolId) -> Result<&mut MemoryPoolRecord, PoolError> {
        match self.pools.get_mut(pool.0) {
            Some(record) if !record.destroyed => Ok(record),
            Some(_) => Err(PoolError::Backend(format!("pool {} was destroyed", pool.0))),
            None => Err(PoolError::Backend(format!("unknown pool {}", pool.0))),
        }
    }
}

impl PoolFactory for MemoryPoolFactory {
    type Category = MemoryCategory;
    type Flags = MemoryPoolFlags;
    type Pool = MemoryPoolId;
    type Spec = MemoryRequest;
    type Handle = MemoryHandle;

    fn create_pool(
        &mut self,
        category: MemoryCategory,
        capacity: u32,
        flags: MemoryPoolFlags,
    ) -> Result<MemoryPoolId, PoolError> {
        if std::mem::take(&mut self.fail_next_create) {
            return Err(PoolError::Backend("injected pool creation failure".to_string()));
        }

        let id = MemoryPoolId(self.pools.len());
        self.pools.push(MemoryPoolRecord {
            category,
            capacity,
            flags,
            used: 0,
            resets: 0,
            destroyed: false,
            fragment_next: false,
        });
        trace!("Created in-memory pool {} ({:?}, capacity {})", id.0, category, capacity);
        Ok(id)
    }

    fn allocate_from_pool(
        &mut self,
        pool: &MemoryPoolId,
        spec: &MemoryRequest,
    ) -> Result<MemoryHandle, PoolError> {
        let id = *pool;
        let record = self.live_record(id)?;

        if spec.units == 0 {
            return Err(PoolError::Backend("zero-unit request".to_string()));
        }
        if std::mem::take(&mut record.fragment_next) {
            return Err(PoolError::Fragmented);
        }
        if spec.units > record.remaining() {
            return Err(PoolError::Exhausted);
        }

        let offset = record.used;
        record.used += spec.units;
        Ok(MemoryHandle {
            pool: id,
            offset,
            generation: record.resets,
        })
    }

    fn reset_pool(&mut self, pool: &MemoryPoolId) -> Result<(), PoolError> {
        if std::mem::take(&mut self.fail_next_reset) {
            return Err(PoolError::Backend("injected pool reset failure".to_string()));
        }
        let record = self.live_record(*pool)?;
        record.used = 0;
        record.fragment_next = false;
        record.resets += 1;
        Ok(())
    }

    fn destroy_pool(&mut self, pool: MemoryPoolId) -> Result<(), PoolError> {
        if std::mem::take(&mut self.fail_next_destroy) {
            return Err(PoolError::Backend("injected pool destroy failure".to_string()));
        }
        let record = self.live_record(pool)?;
        record.destroyed = true;
        Ok(())
    }

    fn flags_from_bits(bits: u32) -> MemoryPoolFlags {
        MemoryPoolFlags::from_bits_truncate(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory_with_pool(capacity: u32) -> (MemoryPoolFactory, MemoryPoolId) {
        let mut factory = MemoryPoolFactory::new();
        let pool = factory
            .create_pool(MemoryCategory::Uniform, capacity, MemoryPoolFlags::empty())
            .unwrap();
        (factory, pool)
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let (mut factory, pool) = factory_with_pool(2);
        let first = factory.allocate_from_pool(&pool, &MemoryRequest::single()).unwrap();
        let second = factory.allocate_from_pool(&pool, &MemoryRequest::single()).unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);

        let err = factory.allocate_from_pool(&pool, &MemoryRequest::single()).unwrap_err();
        assert_eq!(err, PoolError::Exhausted);
    }

    #[test]
    fn test_oversized_request_is_exhaustion() {
        let (mut factory, pool) = factory_with_pool(4);
        let err = factory.allocate_from_pool(&pool, &MemoryRequest::new(5)).unwrap_err();
        assert_eq!(err, PoolError::Exhausted);
    }

    #[test]
    fn test_zero_unit_request_is_not_retryable() {
        let (mut factory, pool) = factory_with_pool(4);
        let err = factory.allocate_from_pool(&pool, &MemoryRequest::new(0)).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_injected_fragmentation_fires_once() {
        let (mut factory, pool) = factory_with_pool(4);
        assert!(factory.inject_fragmentation(0));
        assert!(!factory.inject_fragmentation(7));

        let err = factory.allocate_from_pool(&pool, &MemoryRequest::single()).unwrap_err();
        assert_eq!(err, PoolError::Fragmented);
        assert!(factory.allocate_from_pool(&pool, &MemoryRequest::single()).is_ok());
    }

    #[test]
    fn test_reset_restores_capacity_and_bumps_generation() {
        let (mut factory, pool) = factory_with_pool(1);
        factory.allocate_from_pool(&pool, &MemoryRequest::single()).unwrap();
        factory.reset_pool(&pool).unwrap();

        let handle = factory.allocate_from_pool(&pool, &MemoryRequest::single()).unwrap();
        assert_eq!(handle.offset, 0);
        assert_eq!(handle.generation, 1);
        assert_eq!(factory.pool(0).unwrap().resets, 1);
    }

    #[test]
    fn test_destroyed_pool_rejects_use() {
        let (mut factory, pool) = factory_with_pool(1);
        factory.destroy_pool(pool).unwrap();

        assert_eq!(factory.live_pool_count(), 0);
        assert_eq!(factory.destroyed_pool_count(), 1);
        assert!(factory.allocate_from_pool(&pool, &MemoryRequest::single()).is_err());
        assert!(factory.destroy_pool(pool).is_err());
    }

    #[test]
    fn test_fail_next_create_fires_once() {
        let mut factory = MemoryPoolFactory::new();
        factory.fail_next_create();
        assert!(factory
            .create_pool(MemoryCategory::Storage, 4, MemoryPoolFlags::empty())
            .is_err());
        assert!(factory
            .create_pool(MemoryCategory::Storage, 4, MemoryPoolFlags::empty())
            .is_ok());
        assert_eq!(factory.created_pool_count(), 1);
    }

    #[test]
    fn test_flags_from_bits_drops_unknown_bits() {
        let flags = MemoryPoolFactory::flags_from_bits(0b1000_0011);
        assert_eq!(
            flags,
            MemoryPoolFlags::FREE_INDIVIDUAL | MemoryPoolFlags::UPDATE_AFTER_BIND
        );
    }

    #[test]
    fn test_fail_next_reset_and_destroy_fire_once() {
        let (mut factory, pool) = factory_with_pool(2);
        factory.fail_next_reset();
        factory.fail_next_destroy();

        assert!(factory.reset_pool(&pool).is_err());
        assert_eq!(factory.pool(0).unwrap().resets, 0);
        assert!(factory.reset_pool(&pool).is_ok());

        assert!(factory.destroy_pool(pool).is_err());
        assert_eq!(factory.live_pool_count(), 1);
        assert!(factory.destroy_pool(pool).is_ok());
        assert_eq!(factory.destroyed_pool_count(), 1);
    }
}
