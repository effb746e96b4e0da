//! Recording [`PresentDevice`] for tests that run without a GPU.
//!
//! [`MockDevice`] hands out unique handles, keeps a log of every call in
//! order, tracks which objects are alive, and lets a test script the results
//! of acquire, submit and present as well as creation failures.
//!
//! GPU work completes instantly: a submit signals its fence right away.
//! Waiting on a fence that nothing will ever signal returns `TIMEOUT` instead
//! of hanging, so a broken frame protocol fails the test.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use crate::chain::SwapchainSupportDetails;
use crate::error::{RhiError, RhiResult};
use crate::physical_device::QueueFamilyIndices;
use crate::present_device::{ChainDesc, FrameSubmit, PresentDevice};

/// Kind of a device object tracked by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Swapchain,
    ImageView,
    Framebuffer,
    Semaphore,
    Fence,
    CommandPool,
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SurfaceSupport,
    CreateSwapchain(ChainDesc),
    DestroySwapchain(vk::SwapchainKHR),
    CreateImageView(vk::ImageView),
    DestroyImageView(vk::ImageView),
    CreateFramebuffer {
        framebuffer: vk::Framebuffer,
        attachments: Vec<vk::ImageView>,
        extent: vk::Extent2D,
    },
    DestroyFramebuffer(vk::Framebuffer),
    CreateSemaphore(vk::Semaphore),
    DestroySemaphore(vk::Semaphore),
    CreateFence {
        fence: vk::Fence,
        signaled: bool,
    },
    DestroyFence(vk::Fence),
    WaitForFence(vk::Fence),
    ResetFence(vk::Fence),
    CreateCommandPool(vk::CommandPool),
    DestroyCommandPool(vk::CommandPool),
    AllocateCommandBuffers(Vec<vk::CommandBuffer>),
    BeginCommandBuffer(vk::CommandBuffer),
    EndCommandBuffer(vk::CommandBuffer),
    BeginRenderPass {
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    },
    SetViewportScissor {
        command_buffer: vk::CommandBuffer,
        extent: vk::Extent2D,
    },
    EndRenderPass(vk::CommandBuffer),
    Acquire {
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    },
    Submit(FrameSubmit),
    Present {
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    },
    WaitIdle,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    next_handle: u64,
    live: HashMap<u64, ObjectKind>,
    invalid_destroys: Vec<u64>,
    fences: HashMap<u64, bool>,
    /// Image count and next image index per swapchain
    swapchains: HashMap<u64, (u32, u32)>,
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    queue_families: QueueFamilyIndices,
    acquire_results: VecDeque<VkResult<bool>>,
    submit_results: VecDeque<VkResult<()>>,
    present_results: VecDeque<VkResult<bool>>,
    swapchain_failure: Option<vk::Result>,
    image_view_failure: Option<(u32, vk::Result)>,
}

impl MockState {
    fn allocate(&mut self, kind: ObjectKind) -> u64 {
        self.next_handle += 1;
        let raw = self.next_handle;
        self.live.insert(raw, kind);
        raw
    }

    fn release(&mut self, raw: u64, kind: ObjectKind) {
        match self.live.get(&raw) {
            Some(&live_kind) if live_kind == kind => {
                self.live.remove(&raw);
            }
            _ => self.invalid_destroys.push(raw),
        }
    }
}

/// A [`PresentDevice`] that records calls instead of talking to a GPU.
///
/// Defaults: one queue family for graphics and present, a surface that
/// follows the window (extent sentinel) with a 1..=4096 extent range, 2..=8
/// images, a single B8G8R8A8_SRGB/SRGB_NONLINEAR format and FIFO + MAILBOX.
pub struct MockDevice {
    state: Mutex<MockState>,
}

impl MockDevice {
    /// Creates a mock with a well-behaved default surface.
    pub fn new() -> Self {
        let state = MockState {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            queue_families: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
            ..Default::default()
        };

        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the reported surface capabilities.
    pub fn set_capabilities(&self, capabilities: vk::SurfaceCapabilitiesKHR) {
        self.state().capabilities = capabilities;
    }

    /// Sets the current extent the surface reports.
    ///
    /// `u32::MAX` on both sides means "follow the window".
    pub fn set_current_extent(&self, extent: vk::Extent2D) {
        self.state().capabilities.current_extent = extent;
    }

    /// Sets the image count range (max 0 = unbounded).
    pub fn set_image_count_range(&self, min: u32, max: u32) {
        let mut state = self.state();
        state.capabilities.min_image_count = min;
        state.capabilities.max_image_count = max;
    }

    /// Replaces the supported surface formats.
    pub fn set_formats(&self, formats: Vec<vk::SurfaceFormatKHR>) {
        self.state().formats = formats;
    }

    /// Replaces the supported present modes.
    pub fn set_present_modes(&self, present_modes: Vec<vk::PresentModeKHR>) {
        self.state().present_modes = present_modes;
    }

    /// Replaces the queue family indices.
    pub fn set_queue_families(&self, queue_families: QueueFamilyIndices) {
        self.state().queue_families = queue_families;
    }

    /// Queues a result for the next acquire.
    ///
    /// `Ok(suboptimal)` returns the next image in rotation.
    pub fn push_acquire_result(&self, result: VkResult<bool>) {
        self.state().acquire_results.push_back(result);
    }

    /// Queues a result for the next submit.
    pub fn push_submit_result(&self, result: VkResult<()>) {
        self.state().submit_results.push_back(result);
    }

    /// Queues a result for the next present. `Ok(true)` means suboptimal.
    pub fn push_present_result(&self, result: VkResult<bool>) {
        self.state().present_results.push_back(result);
    }

    /// Makes the next swapchain creation fail.
    pub fn fail_swapchain_creation(&self, error: vk::Result) {
        self.state().swapchain_failure = Some(error);
    }

    /// Lets `successes` image views be created, then fails the next one.
    pub fn fail_image_view_after(&self, successes: u32, error: vk::Result) {
        self.state().image_view_failure = Some((successes, error));
    }

    /// Returns a copy of the call log.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Empties the call log. Live objects are kept.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Counts logged calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| predicate(c)).count()
    }

    /// Number of live objects of one kind.
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.state().live.values().filter(|&&k| k == kind).count()
    }

    /// Number of live objects of any kind.
    pub fn live_total(&self) -> usize {
        self.state().live.len()
    }

    /// Raw handles passed to a destroy call that were not alive (or were of
    /// another kind). Double destroys show up here.
    pub fn invalid_destroys(&self) -> Vec<u64> {
        self.state().invalid_destroys.clone()
    }

    /// The description passed to the most recent swapchain creation.
    pub fn last_chain_desc(&self) -> Option<ChainDesc> {
        self.state().calls.iter().rev().find_map(|c| match c {
            Call::CreateSwapchain(desc) => Some(desc.clone()),
            _ => None,
        })
    }

    /// Returns whether a fence is currently signaled.
    pub fn is_fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state()
            .fences
            .get(&fence.as_raw())
            .copied()
            .unwrap_or(false)
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentDevice for MockDevice {
    fn queue_families(&self) -> QueueFamilyIndices {
        self.state().queue_families
    }

    fn surface_support(&self) -> RhiResult<SwapchainSupportDetails> {
        let mut state = self.state();
        state.calls.push(Call::SurfaceSupport);

        if state.queue_families.present_family.is_none() {
            return Err(RhiError::SurfaceError(
                "no queue family can present".to_string(),
            ));
        }

        Ok(SwapchainSupportDetails {
            capabilities: state.capabilities,
            formats: state.formats.clone(),
            present_modes: state.present_modes.clone(),
        })
    }

    fn create_swapchain(&self, desc: &ChainDesc) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state();
        state.calls.push(Call::CreateSwapchain(desc.clone()));

        if let Some(error) = state.swapchain_failure.take() {
            return Err(error);
        }

        let raw = state.allocate(ObjectKind::Swapchain);
        state.swapchains.insert(raw, (desc.min_image_count, 0));
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let mut state = self.state();
        let Some(&(count, _)) = state.swapchains.get(&swapchain.as_raw()) else {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };

        // Images are owned by the swapchain, so they are not tracked as live
        let images = (0..count)
            .map(|_| {
                state.next_handle += 1;
                vk::Image::from_raw(state.next_handle)
            })
            .collect();
        Ok(images)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        state.calls.push(Call::DestroySwapchain(swapchain));
        state.swapchains.remove(&swapchain.as_raw());
        state.release(swapchain.as_raw(), ObjectKind::Swapchain);
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        let mut state = self.state();

        if let Some((remaining, error)) = state.image_view_failure {
            if remaining == 0 {
                state.image_view_failure = None;
                return Err(error);
            }
            state.image_view_failure = Some((remaining - 1, error));
        }

        let view = vk::ImageView::from_raw(state.allocate(ObjectKind::ImageView));
        state.calls.push(Call::CreateImageView(view));
        Ok(view)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        let mut state = self.state();
        state.calls.push(Call::DestroyImageView(view));
        state.release(view.as_raw(), ObjectKind::ImageView);
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let mut state = self.state();

        // A framebuffer over a dead view is a use-after-free on a real device
        if attachments
            .iter()
            .any(|v| state.live.get(&v.as_raw()) != Some(&ObjectKind::ImageView))
        {
            return Err(vk::Result::ERROR_UNKNOWN);
        }

        let framebuffer = vk::Framebuffer::from_raw(state.allocate(ObjectKind::Framebuffer));
        state.calls.push(Call::CreateFramebuffer {
            framebuffer,
            attachments: attachments.to_vec(),
            extent,
        });
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state();
        state.calls.push(Call::DestroyFramebuffer(framebuffer));
        state.release(framebuffer.as_raw(), ObjectKind::Framebuffer);
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let mut state = self.state();
        let semaphore = vk::Semaphore::from_raw(state.allocate(ObjectKind::Semaphore));
        state.calls.push(Call::CreateSemaphore(semaphore));
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state();
        state.calls.push(Call::DestroySemaphore(semaphore));
        state.release(semaphore.as_raw(), ObjectKind::Semaphore);
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut state = self.state();
        let raw = state.allocate(ObjectKind::Fence);
        state.fences.insert(raw, signaled);
        let fence = vk::Fence::from_raw(raw);
        state.calls.push(Call::CreateFence { fence, signaled });
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        state.calls.push(Call::DestroyFence(fence));
        state.fences.remove(&fence.as_raw());
        state.release(fence.as_raw(), ObjectKind::Fence);
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push(Call::WaitForFence(fence));
        match state.fences.get(&fence.as_raw()) {
            Some(true) => Ok(()),
            Some(false) => Err(vk::Result::TIMEOUT),
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push(Call::ResetFence(fence));
        match state.fences.get_mut(&fence.as_raw()) {
            Some(signaled) => {
                *signaled = false;
                Ok(())
            }
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    fn fence_status(&self, fence: vk::Fence) -> VkResult<bool> {
        self.state()
            .fences
            .get(&fence.as_raw())
            .copied()
            .ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn create_command_pool(&self, _queue_family_index: u32) -> VkResult<vk::CommandPool> {
        let mut state = self.state();
        let pool = vk::CommandPool::from_raw(state.allocate(ObjectKind::CommandPool));
        state.calls.push(Call::CreateCommandPool(pool));
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut state = self.state();
        state.calls.push(Call::DestroyCommandPool(pool));
        state.release(pool.as_raw(), ObjectKind::CommandPool);
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state();
        if state.live.get(&pool.as_raw()) != Some(&ObjectKind::CommandPool) {
            return Err(vk::Result::ERROR_UNKNOWN);
        }

        // Freed with their pool, so not tracked as live
        let buffers: Vec<vk::CommandBuffer> = (0..count)
            .map(|_| {
                state.next_handle += 1;
                vk::CommandBuffer::from_raw(state.next_handle)
            })
            .collect();
        state.calls.push(Call::AllocateCommandBuffers(buffers.clone()));
        Ok(buffers)
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state()
            .calls
            .push(Call::BeginCommandBuffer(command_buffer));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state().calls.push(Call::EndCommandBuffer(command_buffer));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) {
        self.state().calls.push(Call::BeginRenderPass {
            command_buffer,
            framebuffer,
            extent,
            clear_color,
        });
    }

    fn cmd_set_viewport_scissor(&self, command_buffer: vk::CommandBuffer, extent: vk::Extent2D) {
        self.state().calls.push(Call::SetViewportScissor {
            command_buffer,
            extent,
        });
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.state().calls.push(Call::EndRenderPass(command_buffer));
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state();
        state.calls.push(Call::Acquire {
            swapchain,
            semaphore,
        });

        let scripted = state.acquire_results.pop_front().unwrap_or(Ok(false));
        let suboptimal = scripted?;

        let Some((count, next)) = state.swapchains.get_mut(&swapchain.as_raw()) else {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };
        let image_index = *next;
        *next = (*next + 1) % (*count).max(1);
        Ok((image_index, suboptimal))
    }

    fn submit_graphics(&self, submit: &FrameSubmit) -> VkResult<()> {
        let mut state = self.state();
        state.calls.push(Call::Submit(*submit));

        state.submit_results.pop_front().unwrap_or(Ok(()))?;

        // Work completes instantly
        if let Some(signaled) = state.fences.get_mut(&submit.fence.as_raw()) {
            *signaled = true;
        }
        Ok(())
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut state = self.state();
        state.calls.push(Call::Present {
            swapchain,
            image_index,
            wait_semaphore,
        });

        if !state.swapchains.contains_key(&swapchain.as_raw()) {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        state.present_results.pop_front().unwrap_or(Ok(false))
    }

    fn wait_idle(&self) -> VkResult<()> {
        self.state().calls.push(Call::WaitIdle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique() {
        let mock = MockDevice::new();
        let a = mock.create_semaphore().unwrap();
        let b = mock.create_semaphore().unwrap();
        let f = mock.create_fence(true).unwrap();

        assert_ne!(a, b);
        assert_ne!(a.as_raw(), f.as_raw());
        assert_eq!(mock.live_count(ObjectKind::Semaphore), 2);
        assert_eq!(mock.live_count(ObjectKind::Fence), 1);
    }

    #[test]
    fn test_double_destroy_is_reported() {
        let mock = MockDevice::new();
        let semaphore = mock.create_semaphore().unwrap();

        mock.destroy_semaphore(semaphore);
        mock.destroy_semaphore(semaphore);

        assert_eq!(mock.invalid_destroys(), vec![semaphore.as_raw()]);
    }

    #[test]
    fn test_submit_signals_fence() {
        let mock = MockDevice::new();
        let fence = mock.create_fence(false).unwrap();
        assert_eq!(mock.wait_for_fence(fence, u64::MAX), Err(vk::Result::TIMEOUT));

        mock.submit_graphics(&FrameSubmit {
            command_buffer: vk::CommandBuffer::null(),
            wait_semaphore: vk::Semaphore::null(),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: vk::Semaphore::null(),
            fence,
        })
        .unwrap();

        assert!(mock.is_fence_signaled(fence));
        assert_eq!(mock.wait_for_fence(fence, u64::MAX), Ok(()));
    }

    #[test]
    fn test_scripted_acquire_results() {
        let mock = MockDevice::new();
        let desc = ChainDesc {
            min_image_count: 2,
            surface_format: vk::SurfaceFormatKHR::default(),
            extent: vk::Extent2D {
                width: 4,
                height: 4,
            },
            present_mode: vk::PresentModeKHR::FIFO,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: Vec::new(),
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
        };
        let swapchain = mock.create_swapchain(&desc).unwrap();
        let semaphore = vk::Semaphore::null();

        mock.push_acquire_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));
        mock.push_acquire_result(Ok(true));

        assert_eq!(
            mock.acquire_next_image(swapchain, semaphore),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR)
        );
        assert_eq!(mock.acquire_next_image(swapchain, semaphore), Ok((0, true)));
        assert_eq!(mock.acquire_next_image(swapchain, semaphore), Ok((1, false)));
        assert_eq!(mock.acquire_next_image(swapchain, semaphore), Ok((0, false)));
    }
}
