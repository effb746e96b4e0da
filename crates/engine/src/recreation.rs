//! Presentation chain recreation.
//!
//! The [`RecreationController`] owns the live chain and its framebuffers.
//! When the chain is invalidated (out-of-date or suboptimal results, or a
//! window resize) it rebuilds both in a fixed order:
//!
//! 1. wait for the device to go idle
//! 2. destroy the framebuffers
//! 3. destroy the image views, then the swapchain
//! 4. build a new chain (and its views)
//! 5. build new framebuffers
//!
//! If the window has no area (minimized), step 4 is skipped and the
//! controller reports [`Recreation::Suspended`]. It retries on every later
//! call until the extent is usable again. The frame slot ring is never
//! touched.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ash::vk;
use tracing::{debug, error, info};

use presenter_rhi::chain::PresentationChain;
use presenter_rhi::framebuffer::FramebufferSet;
use presenter_rhi::{PresentDevice, RhiError, RhiResult};

/// What [`RecreationController::recreate_if_needed`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recreation {
    /// Nothing was pending, or a resize is still settling.
    NotNeeded,
    /// A new chain and framebuffers are live.
    Rebuilt,
    /// The window has no area; no chain exists until it does.
    Suspended,
}

/// Owns the chain and its per-image framebuffers and rebuilds them on demand.
pub struct RecreationController {
    device: Arc<dyn PresentDevice>,
    render_pass: vk::RenderPass,
    vsync: bool,
    settle: Duration,
    extent_hint: vk::Extent2D,
    // Framebuffers reference the chain's views: declared first, dropped first
    framebuffers: Option<FramebufferSet>,
    chain: Option<PresentationChain>,
    invalidated: bool,
    resized_at: Option<Instant>,
    rebuilds: u64,
}

impl RecreationController {
    /// Creates a controller with no chain yet. The first call to
    /// [`recreate_if_needed`](Self::recreate_if_needed) builds one.
    ///
    /// `render_pass` must outlive the controller.
    pub fn new(
        device: Arc<dyn PresentDevice>,
        render_pass: vk::RenderPass,
        initial_extent: vk::Extent2D,
        vsync: bool,
        settle: Duration,
    ) -> Self {
        Self {
            device,
            render_pass,
            vsync,
            settle,
            extent_hint: initial_extent,
            framebuffers: None,
            chain: None,
            invalidated: false,
            resized_at: None,
            rebuilds: 0,
        }
    }

    /// Marks the chain stale. The next rebuild happens regardless of any
    /// resize debounce.
    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    /// Records the latest window extent. Earlier unprocessed extents are
    /// discarded.
    pub fn notify_resized(&mut self, extent: vk::Extent2D) {
        debug!("Resize to {}x{} pending", extent.width, extent.height);
        self.extent_hint = extent;
        self.resized_at = Some(Instant::now());
    }

    /// Returns true if a resize has been recorded but not yet acted on.
    #[inline]
    pub fn has_pending_resize(&self) -> bool {
        self.resized_at.is_some()
    }

    /// Returns true if the next call would rebuild (ignoring the debounce).
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.invalidated || self.chain.is_none() || self.resized_at.is_some()
    }

    /// Rebuilds the chain and framebuffers if anything is pending.
    ///
    /// An invalidated or missing chain is rebuilt at once. A resize alone
    /// waits until no newer resize has arrived for the settle duration.
    ///
    /// # Errors
    ///
    /// Any failure other than a degenerate extent is fatal. What was torn
    /// down stays torn down, and nothing half-built is kept.
    pub fn recreate_if_needed(&mut self) -> RhiResult<Recreation> {
        let forced = self.invalidated || self.chain.is_none();
        let resize_settled = self
            .resized_at
            .is_some_and(|at| at.elapsed() >= self.settle);

        if !forced && !resize_settled {
            return Ok(Recreation::NotNeeded);
        }

        self.teardown()?;
        self.invalidated = false;
        self.resized_at = None;

        let chain = match PresentationChain::build(
            self.device.clone(),
            self.extent_hint,
            self.vsync,
        ) {
            Ok(chain) => chain,
            Err(RhiError::DegenerateExtent { width, height }) => {
                debug!(
                    "Window extent {}x{} has no area, recreation suspended",
                    width, height
                );
                return Ok(Recreation::Suspended);
            }
            Err(e) => {
                error!("Presentation chain rebuild failed: {}", e);
                return Err(e);
            }
        };

        // On failure `chain` drops here and is torn down
        let framebuffers = FramebufferSet::new(self.device.clone(), &chain, self.render_pass)
            .inspect_err(|e| error!("Framebuffer rebuild failed: {}", e))?;

        self.rebuilds += 1;
        info!(
            "Presentation chain ready: {}x{}, {} images (build #{})",
            chain.extent().width,
            chain.extent().height,
            chain.image_count(),
            self.rebuilds
        );

        self.framebuffers = Some(framebuffers);
        self.chain = Some(chain);
        Ok(Recreation::Rebuilt)
    }

    /// Waits for the device, then destroys framebuffers, views and swapchain.
    ///
    /// Nothing to destroy means nothing to wait for.
    fn teardown(&mut self) -> RhiResult<()> {
        if self.chain.is_none() && self.framebuffers.is_none() {
            return Ok(());
        }

        self.device.wait_idle()?;

        self.framebuffers = None;
        if let Some(mut chain) = self.chain.take() {
            chain.teardown();
        }
        Ok(())
    }

    /// Destroys everything. Used at shutdown, after the device is idle.
    pub fn release(&mut self) {
        self.framebuffers = None;
        if let Some(mut chain) = self.chain.take() {
            chain.teardown();
        }
    }

    /// The live chain, if any.
    #[inline]
    pub fn chain(&self) -> Option<&PresentationChain> {
        self.chain.as_ref()
    }

    /// The live framebuffers, if any.
    #[inline]
    pub fn framebuffers(&self) -> Option<&FramebufferSet> {
        self.framebuffers.as_ref()
    }

    /// The live chain and its framebuffers together.
    #[inline]
    pub fn targets(&self) -> Option<(&PresentationChain, &FramebufferSet)> {
        self.chain.as_ref().zip(self.framebuffers.as_ref())
    }

    /// The extent the next build will ask for.
    #[inline]
    pub fn extent_hint(&self) -> vk::Extent2D {
        self.extent_hint
    }

    /// Number of successful builds, the first one included.
    #[inline]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Render pass the framebuffers are built against.
    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presenter_rhi::mock::{Call, MockDevice, ObjectKind};

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn controller(mock: &Arc<MockDevice>, settle: Duration) -> RecreationController {
        RecreationController::new(
            mock.clone(),
            vk::RenderPass::null(),
            extent(800, 600),
            false,
            settle,
        )
    }

    #[test]
    fn test_first_call_builds() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        assert!(ctl.is_pending());

        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Rebuilt);

        let (chain, framebuffers) = ctl.targets().unwrap();
        assert_eq!(chain.extent(), extent(800, 600));
        assert_eq!(framebuffers.len(), chain.image_count() as usize);
        // Nothing existed, so nothing to wait for
        assert_eq!(mock.count_calls(|c| *c == Call::WaitIdle), 0);
    }

    #[test]
    fn test_no_pending_is_noop() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        ctl.recreate_if_needed().unwrap();
        mock.clear_calls();

        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::NotNeeded);
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::NotNeeded);
        assert!(mock.calls().is_empty());
        assert_eq!(ctl.rebuild_count(), 1);
    }

    #[test]
    fn test_rebuild_order() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        ctl.recreate_if_needed().unwrap();
        mock.clear_calls();

        ctl.invalidate();
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Rebuilt);

        let calls = mock.calls();
        let first = |pred: fn(&Call) -> bool| calls.iter().position(|c| pred(c)).unwrap();
        let last = |pred: fn(&Call) -> bool| calls.iter().rposition(|c| pred(c)).unwrap();

        let idle = first(|c| *c == Call::WaitIdle);
        let last_fb_destroy = last(|c| matches!(c, Call::DestroyFramebuffer(_)));
        let first_view_destroy = first(|c| matches!(c, Call::DestroyImageView(_)));
        let last_view_destroy = last(|c| matches!(c, Call::DestroyImageView(_)));
        let swapchain_destroy = first(|c| matches!(c, Call::DestroySwapchain(_)));
        let swapchain_create = first(|c| matches!(c, Call::CreateSwapchain(_)));
        let first_fb_create = first(|c| matches!(c, Call::CreateFramebuffer { .. }));

        assert_eq!(idle, 0);
        assert!(last_fb_destroy < first_view_destroy);
        assert!(last_view_destroy < swapchain_destroy);
        assert!(swapchain_destroy < swapchain_create);
        assert!(swapchain_create < first_fb_create);
        assert!(mock.invalid_destroys().is_empty());
    }

    #[test]
    fn test_framebuffers_reference_new_views() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        ctl.recreate_if_needed().unwrap();
        let old_views = ctl.chain().unwrap().image_views().to_vec();

        mock.set_image_count_range(3, 0);
        ctl.notify_resized(extent(1024, 768));
        mock.clear_calls();
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Rebuilt);

        let (chain, framebuffers) = ctl.targets().unwrap();
        assert_eq!(chain.image_count(), 4);
        assert_eq!(framebuffers.len(), 4);
        assert_eq!(framebuffers.extent(), extent(1024, 768));

        let attachments: Vec<vk::ImageView> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateFramebuffer { attachments, .. } => Some(attachments[0]),
                _ => None,
            })
            .collect();
        assert_eq!(attachments, chain.image_views());
        assert!(attachments.iter().all(|v| !old_views.contains(v)));
    }

    #[test]
    fn test_degenerate_extent_suspends() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        ctl.recreate_if_needed().unwrap();

        ctl.notify_resized(extent(0, 0));
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Suspended);
        assert!(ctl.chain().is_none());
        assert!(ctl.framebuffers().is_none());
        assert_eq!(mock.live_count(ObjectKind::Swapchain), 0);
        assert_eq!(mock.live_count(ObjectKind::ImageView), 0);

        // Still minimized: keeps polling without building anything
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Suspended);
        assert!(ctl.is_pending());

        ctl.notify_resized(extent(800, 600));
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Rebuilt);
        assert_eq!(ctl.chain().unwrap().extent(), extent(800, 600));
    }

    #[test]
    fn test_resize_waits_to_settle() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::from_secs(3600));
        ctl.recreate_if_needed().unwrap();

        ctl.notify_resized(extent(1024, 768));
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::NotNeeded);
        assert!(ctl.has_pending_resize());

        // Out-of-date cannot wait; it uses the latest extent
        ctl.invalidate();
        assert_eq!(ctl.recreate_if_needed().unwrap(), Recreation::Rebuilt);
        assert_eq!(ctl.chain().unwrap().extent(), extent(1024, 768));
        assert!(!ctl.has_pending_resize());
    }

    #[test]
    fn test_rebuild_failure_is_fatal_and_leaves_nothing() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        ctl.recreate_if_needed().unwrap();

        mock.fail_swapchain_creation(vk::Result::ERROR_SURFACE_LOST_KHR);
        ctl.invalidate();
        let err = ctl.recreate_if_needed().unwrap_err();

        assert!(matches!(err, RhiError::ChainCreation(_)));
        assert!(ctl.chain().is_none());
        assert_eq!(mock.live_total(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mock = Arc::new(MockDevice::new());
        let mut ctl = controller(&mock, Duration::ZERO);
        ctl.recreate_if_needed().unwrap();

        ctl.release();
        ctl.release();

        assert_eq!(mock.live_total(), 0);
        assert!(mock.invalid_destroys().is_empty());
    }
}
