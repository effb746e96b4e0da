//! Command pool management.
//!
//! [`CommandPool`] owns a VkCommandPool created with
//! `RESET_COMMAND_BUFFER`, so every buffer it hands out can be re-recorded in
//! place frame after frame. The buffers are freed together with the pool.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use presenter_rhi::PresentDevice;
//! use presenter_rhi::command::CommandPool;
//!
//! # fn example(device: Arc<dyn PresentDevice>) -> Result<(), presenter_rhi::RhiError> {
//! let queue_family = device.queue_families().graphics_family.unwrap_or(0);
//! let pool = CommandPool::new(device.clone(), queue_family)?;
//! let buffers = pool.allocate_command_buffers(2)?;
//! assert_eq!(buffers.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::error::RhiResult;
use crate::present_device::PresentDevice;

/// Vulkan command pool wrapper.
///
/// A command pool is associated with a specific queue family and can only
/// allocate command buffers that will be submitted to queues of that family.
///
/// # Thread Safety
///
/// Command pools are not thread-safe. Record from one thread at a time.
pub struct CommandPool {
    /// Device that owns the pool.
    device: Arc<dyn PresentDevice>,
    /// Vulkan command pool handle.
    pool: vk::CommandPool,
    /// Queue family index this pool belongs to.
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a new command pool whose buffers can be reset individually.
    ///
    /// # Errors
    ///
    /// Returns an error if command pool creation fails.
    pub fn new(device: Arc<dyn PresentDevice>, queue_family_index: u32) -> RhiResult<Self> {
        let pool = device.create_command_pool(queue_family_index)?;

        info!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Returns the queue family index this pool belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocates primary command buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn allocate_command_buffers(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let buffers = self.device.allocate_command_buffers(self.pool, count)?;
        Ok(buffers)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.pool);
        info!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDevice, ObjectKind};

    #[test]
    fn test_allocate_and_drop() {
        let mock = Arc::new(MockDevice::new());
        let pool = CommandPool::new(mock.clone(), 0).unwrap();

        let buffers = pool.allocate_command_buffers(3).unwrap();
        assert_eq!(buffers.len(), 3);
        assert_eq!(pool.queue_family_index(), 0);
        assert_eq!(mock.live_count(ObjectKind::CommandPool), 1);

        drop(pool);
        assert_eq!(mock.live_total(), 0);
        assert!(mock.invalid_destroys().is_empty());
    }

    #[test]
    fn test_command_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
    }
}
