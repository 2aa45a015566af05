//! Pool backends
//!
//! - `vulkan`: descriptor pools on an `ash::Device`
//! - `memory`: bookkeeping-only pools for tests and dry runs

pub mod memory;
pub mod vulkan;

pub use memory::MemoryPoolFactory;
pub use vulkan::{DescriptorAllocator, DescriptorPoolFactory};
