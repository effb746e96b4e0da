//! Synchronization primitives for Vulkan.
//!
//! This module provides RAII wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - GPU-to-GPU ordering (between queue operations)
//! - [`Fence`] - GPU-to-CPU completion signaling (for host waiting)
//!
//! # Overview
//!
//! - **Semaphores** order operations within or across queues. For example,
//!   waiting for image acquisition before colour output, or waiting for
//!   rendering to complete before presentation. The CPU never observes them.
//!
//! - **Fences** let the CPU know when GPU work is complete. Waiting on a fence
//!   is the one blocking point of the frame loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use presenter_rhi::PresentDevice;
//! use presenter_rhi::sync::{Semaphore, Fence};
//!
//! # fn example(device: Arc<dyn PresentDevice>) -> Result<(), presenter_rhi::RhiError> {
//! let image_acquired = Semaphore::new(device.clone())?;
//!
//! // Signaled initially so the first wait returns at once
//! let frame_complete = Fence::new(device.clone(), true)?;
//!
//! frame_complete.wait(u64::MAX)?;
//! frame_complete.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::error::RhiResult;
use crate::present_device::PresentDevice;

/// Vulkan semaphore wrapper.
///
/// # Thread Safety
///
/// The semaphore is immutable after creation and can be safely shared between
/// threads.
pub struct Semaphore {
    /// Device that owns the semaphore.
    device: Arc<dyn PresentDevice>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<dyn PresentDevice>) -> RhiResult<Self> {
        let semaphore = device.create_semaphore()?;

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.semaphore);
        debug!("Destroyed semaphore");
    }
}

/// Vulkan fence wrapper.
///
/// # Thread Safety
///
/// The fence is immutable after creation. Wait and reset operations can be
/// called from any thread, but ordering them is the caller's responsibility.
pub struct Fence {
    /// Device that owns the fence.
    device: Arc<dyn PresentDevice>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The device
    /// * `signaled` - If true, creates the fence in the signaled state.
    ///   This is useful for fences that are waited on before the first
    ///   GPU operation that would signal them.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<dyn PresentDevice>, signaled: bool) -> RhiResult<Self> {
        let fence = device.create_fence(signaled)?;

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// Blocks until the fence is signaled or the timeout expires.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for infinite wait.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait times out (`vk::Result::TIMEOUT`) or fails.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        self.device.wait_for_fence(self.fence, timeout)?;
        Ok(())
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be in use by any queue operation when this is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset operation fails.
    pub fn reset(&self) -> RhiResult<()> {
        self.device.reset_fence(self.fence)?;
        Ok(())
    }

    /// Checks if the fence is currently signaled, without blocking.
    pub fn is_signaled(&self) -> bool {
        matches!(self.device.fence_status(self.fence), Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.device.destroy_fence(self.fence);
        debug!("Destroyed fence");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockDevice, ObjectKind};

    #[test]
    fn test_semaphore_is_destroyed_on_drop() {
        let mock = Arc::new(MockDevice::new());
        let semaphore = Semaphore::new(mock.clone()).unwrap();
        let handle = semaphore.handle();
        assert_eq!(mock.live_count(ObjectKind::Semaphore), 1);

        drop(semaphore);

        assert_eq!(mock.live_count(ObjectKind::Semaphore), 0);
        assert_eq!(
            mock.count_calls(|c| *c == Call::DestroySemaphore(handle)),
            1
        );
    }

    #[test]
    fn test_fence_created_signaled() {
        let mock = Arc::new(MockDevice::new());
        let fence = Fence::new(mock.clone(), true).unwrap();

        assert!(fence.is_signaled());
        fence.wait(u64::MAX).unwrap();
        fence.reset().unwrap();
        assert!(!fence.is_signaled());
    }

    #[test]
    fn test_fence_unsignaled_wait_times_out() {
        let mock = Arc::new(MockDevice::new());
        let fence = Fence::new(mock.clone(), false).unwrap();

        let err = fence.wait(0).unwrap_err();
        assert!(matches!(
            err,
            crate::RhiError::VulkanError(vk::Result::TIMEOUT)
        ));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Semaphore>();
        assert_sync::<Semaphore>();
        assert_send::<Fence>();
        assert_sync::<Fence>();
    }
}
