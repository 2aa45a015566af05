//! Vulkan descriptor pool backend
//!
//! Each pool is a `VkDescriptorPool` holding `capacity` descriptors of a
//! single descriptor type, and every allocation draws one descriptor set for
//! a given layout. `VK_ERROR_OUT_OF_POOL_MEMORY` and
//! `VK_ERROR_FRAGMENTED_POOL` are reported as exhaustion and fragmentation
//! so the allocator can move on to a larger pool.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ash::vk;
//! use pool_allocator::prelude::*;
//!
//! # fn run(device: ash::Device, layout: vk::DescriptorSetLayout) -> Result<(), AllocatorError> {
//! let mut allocator = DescriptorAllocator::new(DescriptorPoolFactory::new(device));
//! allocator.init(vk::DescriptorType::UNIFORM_BUFFER, 16)?;
//!
//! let set = allocator.allocate(&layout)?;
//! # let _ = set;
//!
//! // After the frame that used the sets has finished on the GPU
//! allocator.clear()?;
//! # Ok(())
//! # }
//! ```

use ash::{vk, Device};

use crate::allocator::{PoolAllocator, PoolError, PoolFactory};
use crate::config::{AllocatorConfig, DEFAULT_MAX_SETS_PER_POOL};

/// Allocator handing out descriptor sets from growable descriptor pools
pub type DescriptorAllocator = PoolAllocator<DescriptorPoolFactory>;

/// [`PoolFactory`] backed by `VkDescriptorPool`
pub struct DescriptorPoolFactory {
    device: Device,
    max_sets: u32,
}

impl DescriptorPoolFactory {
    /// Create a factory for `device` with the default per-pool set limit
    pub fn new(device: Device) -> Self {
        Self {
            device,
            max_sets: DEFAULT_MAX_SETS_PER_POOL,
        }
    }

    /// Create a factory using the set limit from `config`
    pub fn from_config(device: Device, config: &AllocatorConfig) -> Self {
        Self::new(device).with_max_sets(config.max_sets_per_pool)
    }

    /// Set the maximum number of sets each new pool can hold
    pub fn with_max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Maximum number of sets each new pool can hold
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Device the pools are created on
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl PoolFactory for DescriptorPoolFactory {
    type Category = vk::DescriptorType;
    type Flags = vk::DescriptorPoolCreateFlags;
    type Pool = vk::DescriptorPool;
    type Spec = vk::DescriptorSetLayout;
    type Handle = vk::DescriptorSet;

    fn create_pool(
        &mut self,
        category: vk::DescriptorType,
        capacity: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> Result<vk::DescriptorPool, PoolError> {
        let pool_sizes = [vk::DescriptorPoolSize::builder()
            .ty(category)
            .descriptor_count(capacity)
            .build()];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(flags)
            .max_sets(self.max_sets)
            .pool_sizes(&pool_sizes);

        unsafe { self.device.create_descriptor_pool(&pool_info, None) }.map_err(pool_error_from_vk)
    }

    fn allocate_from_pool(
        &mut self,
        pool: &vk::DescriptorPool,
        layout: &vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, PoolError> {
        let layouts = [*layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(*pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(pool_error_from_vk)?;

        sets.into_iter()
            .next()
            .ok_or_else(|| PoolError::Backend("driver returned no descriptor set".to_string()))
    }

    fn reset_pool(&mut self, pool: &vk::DescriptorPool) -> Result<(), PoolError> {
        unsafe {
            self.device
                .reset_descriptor_pool(*pool, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(pool_error_from_vk)
    }

    fn destroy_pool(&mut self, pool: vk::DescriptorPool) -> Result<(), PoolError> {
        unsafe {
            self.device.destroy_descriptor_pool(pool, None);
        }
        Ok(())
    }

    fn flags_from_bits(bits: u32) -> vk::DescriptorPoolCreateFlags {
        vk::DescriptorPoolCreateFlags::from_raw(bits)
    }
}

/// Map a Vulkan result code onto the backend-neutral pool error
pub fn pool_error_from_vk(result: vk::Result) -> PoolError {
    match result {
        vk::Result::ERROR_OUT_OF_POOL_MEMORY => PoolError::Exhausted,
        vk::Result::ERROR_FRAGMENTED_POOL => PoolError::Fragmented,
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            PoolError::OutOfMemory
        }
        other => PoolError::Backend(format!("Vulkan API error: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_memory_errors_are_retryable() {
        assert_eq!(
            pool_error_from_vk(vk::Result::ERROR_OUT_OF_POOL_MEMORY),
            PoolError::Exhausted
        );
        assert_eq!(
            pool_error_from_vk(vk::Result::ERROR_FRAGMENTED_POOL),
            PoolError::Fragmented
        );
        assert!(pool_error_from_vk(vk::Result::ERROR_FRAGMENTED_POOL).is_retryable());
    }

    #[test]
    fn test_memory_errors_are_fatal() {
        let host = pool_error_from_vk(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let device = pool_error_from_vk(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        assert_eq!(host, PoolError::OutOfMemory);
        assert_eq!(device, PoolError::OutOfMemory);
        assert!(!host.is_retryable());
    }

    #[test]
    fn test_other_results_are_backend_errors() {
        let err = pool_error_from_vk(vk::Result::ERROR_DEVICE_LOST);
        assert!(matches!(err, PoolError::Backend(ref msg) if msg.contains("ERROR_DEVICE_LOST")));
    }

    #[test]
    fn test_flags_from_bits() {
        let flags = DescriptorPoolFactory::flags_from_bits(
            vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET.as_raw(),
        );
        assert_eq!(flags, vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);
    }
}
