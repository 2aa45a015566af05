//! # Pool Allocator
//!
//! A growable, pool-backed handle allocator. Handles are drawn from a
//! sequence of fixed-capacity pools; when the active pool runs dry the
//! allocator moves on to the next one, creating a new pool of twice the
//! previous capacity when none is left.
//!
//! ## Features
//!
//! - **Geometric Growth**: pool `i` holds `base_capacity * 2^i` units
//! - **Bulk Recycling**: `clear` resets every pool in place and keeps the
//!   capacities already reached
//! - **Pluggable Backends**: any [`PoolFactory`] can back the allocator;
//!   a Vulkan descriptor pool backend and an in-memory backend ship with
//!   the crate
//! - **Config Files**: allocator settings load from TOML or RON
//!
//! ## Quick Start
//!
//! ```rust
//! use pool_allocator::prelude::*;
//!
//! fn main() -> Result<(), AllocatorError> {
//!     let mut allocator = PoolAllocator::new(MemoryPoolFactory::new());
//!     allocator.init(MemoryCategory::Uniform, 4)?;
//!
//!     for _ in 0..5 {
//!         allocator.allocate(&MemoryRequest::single())?;
//!     }
//!
//!     assert_eq!(allocator.pool_count(), 2);
//!     assert_eq!(allocator.pool_capacity(1), Some(8));
//!
//!     allocator.clear()?;
//!     allocator.destroy()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names)]

pub mod allocator;
pub mod backends;
pub mod config;
pub mod foundation;

pub use allocator::{
    AllocatorError, AllocatorResult, AllocatorStats, ErrorClass, PoolAllocator, PoolError,
    PoolErrorKind, PoolFactory, PoolInfo,
};

/// Common imports for allocator users
pub mod prelude {
    pub use crate::{
        allocator::{
            AllocatorError, AllocatorResult, AllocatorStats, ErrorClass, PoolAllocator,
            PoolError, PoolErrorKind, PoolFactory, PoolInfo,
        },
        backends::memory::{
            MemoryCategory, MemoryHandle, MemoryPoolFactory, MemoryPoolFlags, MemoryRequest,
        },
        backends::vulkan::{DescriptorAllocator, DescriptorPoolFactory},
        config::{AllocatorConfig, Config, ConfigError},
    };
}
