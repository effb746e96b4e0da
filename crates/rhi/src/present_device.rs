//! The device seam used by every presentation component.
//!
//! [`PresentDevice`] is the narrow set of device, queue and surface operations
//! the presentation chain, the frame slot ring and the frame synchronizer
//! consume. Components receive it as an explicit `Arc<dyn PresentDevice>`
//! instead of reaching for global state.
//!
//! [`Device`](crate::device::Device) implements it on top of `ash`. With the
//! `mock` feature, [`MockDevice`](crate::mock::MockDevice) implements it without
//! a GPU so the frame protocol can be tested call-by-call.
//!
//! Raw calls return [`VkResult`] so callers can match on
//! `ERROR_OUT_OF_DATE_KHR` and `SUBOPTIMAL_KHR` before converting to
//! [`RhiError`](crate::RhiError) with `?`.

use ash::prelude::VkResult;
use ash::vk;

use crate::chain::SwapchainSupportDetails;
use crate::error::RhiResult;
use crate::physical_device::QueueFamilyIndices;

/// Parameters for creating a swapchain, resolved by
/// [`PresentationChain::build`](crate::chain::PresentationChain::build).
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDesc {
    /// Number of images requested from the presentation engine.
    pub min_image_count: u32,
    /// Pixel format and colour space.
    pub surface_format: vk::SurfaceFormatKHR,
    /// Image extent.
    pub extent: vk::Extent2D,
    /// Presentation cadence.
    pub present_mode: vk::PresentModeKHR,
    /// EXCLUSIVE when graphics and present share a family, CONCURRENT otherwise.
    pub sharing_mode: vk::SharingMode,
    /// Families sharing the images; empty for EXCLUSIVE.
    pub queue_family_indices: Vec<u32>,
    /// Surface transform to apply, normally the current one.
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// One graphics-queue submission for a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSubmit {
    /// The slot's recorded command buffer.
    pub command_buffer: vk::CommandBuffer,
    /// Signaled by acquisition; waited on before colour output.
    pub wait_semaphore: vk::Semaphore,
    /// Stage at which the wait applies.
    pub wait_stage: vk::PipelineStageFlags,
    /// Signaled when rendering is complete; waited on by presentation.
    pub signal_semaphore: vk::Semaphore,
    /// Signaled when the GPU has finished with the command buffer.
    pub fence: vk::Fence,
}

/// Device, queue and surface operations consumed by the presentation core.
///
/// Destroy calls take handles the implementation previously created and must
/// tolerate nothing else; ownership and ordering are enforced by the RAII
/// wrappers built on top of this trait.
pub trait PresentDevice: Send + Sync {
    /// Queue family indices for graphics and presentation.
    fn queue_families(&self) -> QueueFamilyIndices;

    /// Queries surface capabilities, formats and present modes.
    fn surface_support(&self) -> RhiResult<SwapchainSupportDetails>;

    /// Creates a swapchain for the bound surface.
    fn create_swapchain(&self, desc: &ChainDesc) -> VkResult<vk::SwapchainKHR>;

    /// Retrieves the presentable images owned by a swapchain.
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    /// Destroys a swapchain. Its images go with it.
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Creates an image view.
    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;

    /// Destroys an image view.
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Creates a single-layer framebuffer.
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;

    /// Destroys a framebuffer.
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Creates a binary semaphore in the unsignaled state.
    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;

    /// Destroys a semaphore.
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Creates a fence, optionally already signaled.
    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;

    /// Destroys a fence.
    fn destroy_fence(&self, fence: vk::Fence);

    /// Blocks until the fence is signaled or `timeout` nanoseconds pass.
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> VkResult<()>;

    /// Returns the fence to the unsignaled state.
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    /// Non-blocking fence status query.
    fn fence_status(&self, fence: vk::Fence) -> VkResult<bool>;

    /// Creates a command pool whose buffers can be reset individually.
    fn create_command_pool(&self, queue_family_index: u32) -> VkResult<vk::CommandPool>;

    /// Destroys a command pool and frees its buffers.
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    /// Allocates primary command buffers.
    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;

    /// Resets a command buffer and begins one-time-submit recording.
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    /// Finishes recording.
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()>;

    /// Begins a render pass covering the whole extent with one clear colour.
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    );

    /// Sets the dynamic viewport and scissor to cover `extent`.
    fn cmd_set_viewport_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D);

    /// Ends the current render pass.
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    /// Acquires the next presentable image, signaling `semaphore` when it is ready.
    ///
    /// Returns `(image_index, suboptimal)`.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    /// Submits one frame to the graphics queue.
    fn submit_graphics(&self, submit: &FrameSubmit) -> VkResult<()>;

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// Returns `true` when the swapchain is suboptimal.
    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool>;

    /// Blocks until every queue on the device is idle.
    fn wait_idle(&self) -> VkResult<()>;
}
