//! Backend contract for creating and drawing from pools

use std::fmt::Debug;

use super::error::PoolError;

/// Creates fixed-capacity pools and performs the primitive pool operations
///
/// A [`PoolAllocator`](super::PoolAllocator) owns exactly one factory and
/// calls it for every pool it creates, draws from, resets or destroys. All
/// calls are synchronous.
///
/// `allocate_from_pool` must report a full pool as [`PoolError::Exhausted`]
/// or [`PoolError::Fragmented`]; those are the only failures the allocator
/// recovers from.
pub trait PoolFactory {
    /// Kind of resource every pool hands out
    type Category: Copy + Debug;
    /// Creation-time pool configuration
    type Flags: Copy + Default + Debug;
    /// Backend pool handle
    type Pool;
    /// Description of a single allocation request
    type Spec: ?Sized;
    /// Handle returned to the caller
    type Handle;

    /// Create an empty pool holding `capacity` units of `category`
    fn create_pool(
        &mut self,
        category: Self::Category,
        capacity: u32,
        flags: Self::Flags,
    ) -> Result<Self::Pool, PoolError>;

    /// Draw one handle from `pool`
    fn allocate_from_pool(
        &mut self,
        pool: &Self::Pool,
        spec: &Self::Spec,
    ) -> Result<Self::Handle, PoolError>;

    /// Release every handle drawn from `pool`, keeping its storage
    fn reset_pool(&mut self, pool: &Self::Pool) -> Result<(), PoolError>;

    /// Release `pool` and its storage
    fn destroy_pool(&mut self, pool: Self::Pool) -> Result<(), PoolError>;

    /// Convert raw flag bits from a config file into backend flags
    fn flags_from_bits(bits: u32) -> Self::Flags;
}
