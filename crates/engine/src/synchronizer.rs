//! Per-frame acquire, record, submit and present protocol.
//!
//! One call to [`FrameSynchronizer::run_frame`] walks a frame through
//! `Idle → Acquiring → Recording → Submitted → Presenting → Idle`:
//!
//! 1. **Wait** on the current slot's fence. This is the only blocking point
//!    and bounds the CPU to the ring depth.
//! 2. **Acquire** an image, signaling the slot's image-acquired semaphore.
//!    Out-of-date abandons the frame before the fence is reset, so the slot
//!    stays usable. Suboptimal carries on and asks for a rebuild afterwards.
//! 3. **Reset** the fence and **record** the slot's command buffer against
//!    the acquired image's framebuffer, with viewport and scissor taken from
//!    the live chain extent.
//! 4. **Submit**, waiting on image-acquired at colour-attachment output and
//!    signaling render-complete and the fence.
//! 5. **Present**, waiting on render-complete.
//! 6. **Advance** the cursor.
//!
//! Rebuilding the chain is not done here; the outcome tells the caller
//! whether it is needed.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, trace, warn};

use presenter_rhi::chain::PresentationChain;
use presenter_rhi::framebuffer::FramebufferSet;
use presenter_rhi::{FrameSubmit, PresentDevice, RhiError, RhiResult};

use crate::frame_ring::FrameSlotRing;

/// Where the current frame is in the protocol.
///
/// After an error the state is left at the stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// Result of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The image was presented and the chain still matches the surface.
    Presented,
    /// The frame was submitted but the chain is suboptimal or out of date.
    PresentedNeedsRebuild,
    /// Acquire reported out-of-date. Nothing was recorded or submitted and
    /// the cursor did not move.
    OutOfDate,
}

impl FrameOutcome {
    /// Why the chain must be rebuilt after this frame, if it must.
    ///
    /// A present that reports out-of-date still put the image on screen, so
    /// it is classed with suboptimal. Both reasons are recoverable.
    pub fn rebuild_reason(&self) -> Option<RhiError> {
        match self {
            FrameOutcome::Presented => None,
            FrameOutcome::PresentedNeedsRebuild => Some(RhiError::SurfaceSuboptimal),
            FrameOutcome::OutOfDate => Some(RhiError::SurfaceOutOfDate),
        }
    }
}

/// Monotonically advancing index into the frame slot ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    index: usize,
    depth: usize,
    frame: u64,
}

impl FrameCursor {
    /// Creates a cursor at slot 0 of a ring of `depth` slots.
    pub fn new(depth: usize) -> Self {
        Self {
            index: 0,
            depth: depth.max(1),
            frame: 0,
        }
    }

    /// Current slot index.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of frames completed so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Moves to the next slot, wrapping at the ring depth.
    #[inline]
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.depth;
        self.frame += 1;
    }
}

/// What a recorder gets to work with while the render pass is open.
pub struct RecordContext<'a> {
    /// Device to record through.
    pub device: &'a dyn PresentDevice,
    /// The slot's command buffer, inside the render pass.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the acquired image.
    pub image_index: u32,
    /// Live chain extent; viewport and scissor already cover it.
    pub extent: vk::Extent2D,
    /// Framebuffer of the acquired image.
    pub framebuffer: vk::Framebuffer,
    /// Ring slot this frame uses.
    pub slot_index: usize,
    /// Frame number since startup.
    pub frame: u64,
}

/// Supplies per-frame content.
///
/// Called between render pass begin and end. Must not block.
pub trait FrameRecorder: Send {
    /// Clear colour for this frame's single attachment.
    fn clear_color(&mut self) -> [f32; 4];

    /// Records draw commands. The default records nothing.
    fn record(&mut self, _ctx: &RecordContext<'_>) -> RhiResult<()> {
        Ok(())
    }
}

/// Recorder that clears to a fixed colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor(pub [f32; 4]);

impl FrameRecorder for ClearColor {
    fn clear_color(&mut self) -> [f32; 4] {
        self.0
    }
}

/// Runs frames over a [`FrameSlotRing`].
pub struct FrameSynchronizer {
    device: Arc<dyn PresentDevice>,
    ring: FrameSlotRing,
    cursor: FrameCursor,
    state: FrameState,
}

impl FrameSynchronizer {
    /// Takes ownership of the ring; the cursor starts at slot 0.
    pub fn new(device: Arc<dyn PresentDevice>, ring: FrameSlotRing) -> Self {
        let cursor = FrameCursor::new(ring.depth());
        Self {
            device,
            ring,
            cursor,
            state: FrameState::Idle,
        }
    }

    /// Runs one frame.
    ///
    /// `framebuffers` must have been built from `chain`, against
    /// `render_pass`.
    ///
    /// # Errors
    ///
    /// - [`RhiError::Submission`] if the graphics queue rejects the work
    /// - [`RhiError::Present`] if presentation fails for a reason other than
    ///   out-of-date or suboptimal
    /// - [`RhiError::VulkanError`] if a fence wait, acquire or recording fails
    ///
    /// All of these are fatal.
    pub fn run_frame(
        &mut self,
        chain: &PresentationChain,
        framebuffers: &FramebufferSet,
        render_pass: vk::RenderPass,
        recorder: &mut dyn FrameRecorder,
    ) -> RhiResult<FrameOutcome> {
        let slot_index = self.cursor.index();
        let slot = self.ring.slot(slot_index);
        let device = self.device.as_ref();

        // 1. Wait
        self.state = FrameState::Idle;
        trace!("Waiting on frame slot {}", slot_index);
        slot.frame_complete().wait(u64::MAX)?;

        // 2. Acquire
        self.state = FrameState::Acquiring;
        let (image_index, acquire_suboptimal) =
            match device.acquire_next_image(chain.handle(), slot.image_acquired().handle()) {
                Ok(acquired) => acquired,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("Presentation chain out of date during acquire");
                    self.state = FrameState::Idle;
                    return Ok(FrameOutcome::OutOfDate);
                }
                Err(e) => return Err(e.into()),
            };
        if acquire_suboptimal {
            debug!("Presentation chain suboptimal during acquire");
        }

        let framebuffer = framebuffers.get(image_index).ok_or_else(|| {
            RhiError::InvalidConfig(format!(
                "no framebuffer for image {} ({} built)",
                image_index,
                framebuffers.len()
            ))
        })?;
        let extent = chain.extent();
        let command_buffer = slot.command_buffer();

        // 3. Reset fence, record
        self.state = FrameState::Recording;
        slot.frame_complete().reset()?;
        device.begin_command_buffer(command_buffer)?;
        device.cmd_begin_render_pass(
            command_buffer,
            render_pass,
            framebuffer,
            extent,
            recorder.clear_color(),
        );
        device.cmd_set_viewport_scissor(command_buffer, extent);
        recorder.record(&RecordContext {
            device,
            command_buffer,
            image_index,
            extent,
            framebuffer,
            slot_index,
            frame: self.cursor.frame(),
        })?;
        device.cmd_end_render_pass(command_buffer);
        device.end_command_buffer(command_buffer)?;

        // 4. Submit
        let submit = FrameSubmit {
            command_buffer,
            wait_semaphore: slot.image_acquired().handle(),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.render_complete().handle(),
            fence: slot.frame_complete().handle(),
        };
        device
            .submit_graphics(&submit)
            .map_err(RhiError::Submission)?;
        self.state = FrameState::Submitted;

        // 5. Present
        self.state = FrameState::Presenting;
        let outcome = match device.queue_present(
            chain.handle(),
            image_index,
            slot.render_complete().handle(),
        ) {
            Ok(false) if !acquire_suboptimal => FrameOutcome::Presented,
            Ok(_) => {
                debug!("Presentation chain suboptimal");
                FrameOutcome::PresentedNeedsRebuild
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Presentation chain out of date during present");
                FrameOutcome::PresentedNeedsRebuild
            }
            Err(e) => {
                warn!("Present failed: {:?}", e);
                return Err(RhiError::Present(e));
            }
        };

        // 6. Advance
        self.cursor.advance();
        self.state = FrameState::Idle;

        Ok(outcome)
    }

    /// Current protocol state.
    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// The frame cursor.
    #[inline]
    pub fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    /// The frame slot ring.
    #[inline]
    pub fn ring(&self) -> &FrameSlotRing {
        &self.ring
    }
}
