//! Frame slots in flight.
//!
//! The ring holds one [`FrameSlot`] per frame the CPU may run ahead of the
//! GPU. Its depth is fixed at construction and has nothing to do with the
//! number of presentable images, so rebuilding the chain never touches it.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use presenter_rhi::command::CommandPool;
use presenter_rhi::sync::{Fence, Semaphore};
use presenter_rhi::{PresentDevice, RhiError, RhiResult};

/// Per-frame synchronization primitives and command buffer.
///
/// # Synchronization Flow
///
/// ```text
/// 1. Wait on frame_complete (previous use of this slot is done on the GPU)
/// 2. Acquire an image (signals image_acquired)
/// 3. Reset frame_complete, re-record command_buffer
/// 4. Submit command_buffer:
///    - Wait on image_acquired at colour-attachment output
///    - Signal render_complete
///    - Signal frame_complete
/// 5. Present (waits on render_complete)
/// ```
pub struct FrameSlot {
    /// Re-recorded in place every time the slot comes round.
    command_buffer: vk::CommandBuffer,
    /// Signaled by the presentation engine when the acquired image is ready.
    image_acquired: Semaphore,
    /// Signaled when this slot's rendering is complete.
    render_complete: Semaphore,
    /// Signaled when the GPU is done with this slot. Created signaled.
    frame_complete: Fence,
}

impl FrameSlot {
    fn new(device: &Arc<dyn PresentDevice>, command_buffer: vk::CommandBuffer) -> RhiResult<Self> {
        let image_acquired = Semaphore::new(device.clone())?;
        let render_complete = Semaphore::new(device.clone())?;
        // Signaled so the first wait on this slot returns at once
        let frame_complete = Fence::new(device.clone(), true)?;

        Ok(Self {
            command_buffer,
            image_acquired,
            render_complete,
            frame_complete,
        })
    }

    /// Returns the command buffer.
    #[inline]
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Returns the image-acquired semaphore.
    #[inline]
    pub fn image_acquired(&self) -> &Semaphore {
        &self.image_acquired
    }

    /// Returns the render-complete semaphore.
    #[inline]
    pub fn render_complete(&self) -> &Semaphore {
        &self.render_complete
    }

    /// Returns the frame-complete fence.
    #[inline]
    pub fn frame_complete(&self) -> &Fence {
        &self.frame_complete
    }
}

/// Fixed-size ring of frame slots.
pub struct FrameSlotRing {
    // Declared before the pool: slots drop first
    slots: Vec<FrameSlot>,
    pool: CommandPool,
}

impl FrameSlotRing {
    /// Allocates `depth` slots, their command buffers coming from one pool on
    /// `queue_family`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidConfig`] if `depth` is zero, or the device
    /// error if any object creation fails. Objects created before the failure
    /// are destroyed.
    pub fn new(
        device: Arc<dyn PresentDevice>,
        queue_family: u32,
        depth: usize,
    ) -> RhiResult<Self> {
        if depth == 0 {
            return Err(RhiError::InvalidConfig(
                "frames in flight must be at least 1".to_string(),
            ));
        }
        let count = u32::try_from(depth).map_err(|_| {
            RhiError::InvalidConfig(format!("{} frames in flight is too many", depth))
        })?;

        let pool = CommandPool::new(device.clone(), queue_family)?;
        let command_buffers = pool.allocate_command_buffers(count)?;

        let mut slots = Vec::with_capacity(depth);
        for (i, command_buffer) in command_buffers.into_iter().enumerate() {
            slots.push(FrameSlot::new(&device, command_buffer)?);
            debug!("Created frame slot {}", i);
        }

        info!("Frame slot ring created with {} frames in flight", depth);

        Ok(Self { slots, pool })
    }

    /// Number of slots. Never changes.
    #[inline]
    pub fn depth(&self) -> usize {
        self.slots.len()
    }

    /// Returns the slot at `index`, wrapping around the ring.
    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index % self.slots.len()]
    }

    /// Iterates over the slots in ring order.
    pub fn iter(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Returns the pool the command buffers came from.
    #[inline]
    pub fn command_pool(&self) -> &CommandPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presenter_rhi::mock::{Call, MockDevice, ObjectKind};

    #[test]
    fn test_ring_allocates_depth_slots() {
        let mock = Arc::new(MockDevice::new());
        let ring = FrameSlotRing::new(mock.clone(), 0, 3).unwrap();

        assert_eq!(ring.depth(), 3);
        assert_eq!(mock.live_count(ObjectKind::Semaphore), 6);
        assert_eq!(mock.live_count(ObjectKind::Fence), 3);
        assert_eq!(mock.live_count(ObjectKind::CommandPool), 1);
        assert_eq!(
            mock.count_calls(|c| matches!(c, Call::AllocateCommandBuffers(_))),
            1
        );
    }

    #[test]
    fn test_fences_start_signaled() {
        let mock = Arc::new(MockDevice::new());
        let ring = FrameSlotRing::new(mock.clone(), 0, 2).unwrap();

        for slot in ring.iter() {
            assert!(slot.frame_complete().is_signaled());
        }
        assert_eq!(
            mock.count_calls(|c| matches!(c, Call::CreateFence { signaled: true, .. })),
            2
        );
    }

    #[test]
    fn test_slots_are_distinct() {
        let mock = Arc::new(MockDevice::new());
        let ring = FrameSlotRing::new(mock.clone(), 0, 2).unwrap();

        let a = ring.slot(0);
        let b = ring.slot(1);
        assert_ne!(a.command_buffer(), b.command_buffer());
        assert_ne!(a.image_acquired().handle(), b.image_acquired().handle());
        assert_ne!(a.image_acquired().handle(), a.render_complete().handle());
        assert_ne!(a.frame_complete().handle(), b.frame_complete().handle());

        // Wraps
        assert_eq!(ring.slot(2).command_buffer(), a.command_buffer());
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let mock = Arc::new(MockDevice::new());
        let err = FrameSlotRing::new(mock.clone(), 0, 0).err().unwrap();

        assert!(matches!(err, RhiError::InvalidConfig(_)));
        assert_eq!(mock.live_total(), 0);
    }

    #[test]
    fn test_drop_releases_everything() {
        let mock = Arc::new(MockDevice::new());
        let ring = FrameSlotRing::new(mock.clone(), 0, 2).unwrap();

        drop(ring);

        assert_eq!(mock.live_total(), 0);
        assert!(mock.invalid_destroys().is_empty());
        let calls = mock.calls();
        assert!(matches!(calls.last(), Some(Call::DestroyCommandPool(_))));
    }
}
