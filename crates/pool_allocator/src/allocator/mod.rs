//! Pool-backed handle allocation
//!
//! [`PoolAllocator`] drives a [`PoolFactory`] backend: it keeps the pool
//! sequence, decides when to grow, and turns backend failures into
//! [`AllocatorError`]s.

pub mod error;
pub mod factory;
pub mod pool_allocator;

#[cfg(test)]
mod tests;

pub use error::{AllocatorError, AllocatorResult, ErrorClass, PoolError, PoolErrorKind};
pub use factory::PoolFactory;
pub use pool_allocator::{AllocatorStats, PoolAllocator, PoolInfo};
