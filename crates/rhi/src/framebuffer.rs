//! Per-image framebuffers.
//!
//! A [`FramebufferSet`] holds one framebuffer per image view of a
//! [`PresentationChain`](crate::chain::PresentationChain), in image order.
//! It references the chain's views, so it must be dropped before the chain
//! is torn down and rebuilt whenever the chain is.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::chain::PresentationChain;
use crate::error::RhiResult;
use crate::present_device::PresentDevice;

/// One framebuffer per presentable image.
pub struct FramebufferSet {
    device: Arc<dyn PresentDevice>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl FramebufferSet {
    /// Creates a framebuffer for every view of `chain` against `render_pass`.
    ///
    /// On failure the framebuffers created so far are destroyed.
    ///
    /// # Errors
    ///
    /// Returns an error if any framebuffer creation fails.
    pub fn new(
        device: Arc<dyn PresentDevice>,
        chain: &PresentationChain,
        render_pass: vk::RenderPass,
    ) -> RhiResult<Self> {
        let extent = chain.extent();
        let mut set = Self {
            device,
            framebuffers: Vec::with_capacity(chain.image_views().len()),
            extent,
        };

        for &view in chain.image_views() {
            let framebuffer = set
                .device
                .create_framebuffer(render_pass, &[view], extent)?;
            set.framebuffers.push(framebuffer);
        }

        debug!(
            "Created {} framebuffers at {}x{}",
            set.framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(set)
    }

    /// Returns the framebuffer for an acquired image index.
    #[inline]
    pub fn get(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    /// Returns all framebuffers in image order.
    #[inline]
    pub fn handles(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    /// Number of framebuffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Returns true if the set holds no framebuffers.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Extent the framebuffers were created at.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for FramebufferSet {
    fn drop(&mut self) {
        if self.framebuffers.is_empty() {
            return;
        }
        for framebuffer in self.framebuffers.drain(..) {
            self.device.destroy_framebuffer(framebuffer);
        }
        debug!("Destroyed framebuffers");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockDevice, ObjectKind};

    fn build_chain(mock: &Arc<MockDevice>) -> PresentationChain {
        let hint = vk::Extent2D {
            width: 640,
            height: 480,
        };
        PresentationChain::build(mock.clone(), hint, false).unwrap()
    }

    #[test]
    fn test_one_framebuffer_per_view() {
        let mock = Arc::new(MockDevice::new());
        let chain = build_chain(&mock);

        let set = FramebufferSet::new(mock.clone(), &chain, vk::RenderPass::null()).unwrap();

        assert_eq!(set.len(), chain.image_views().len());
        assert_eq!(set.extent(), chain.extent());
        assert!(set.get(set.len() as u32).is_none());

        let attachments: Vec<vk::ImageView> = mock
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateFramebuffer { attachments, .. } => Some(attachments[0]),
                _ => None,
            })
            .collect();
        assert_eq!(attachments, chain.image_views());
    }

    #[test]
    fn test_dropped_before_chain_leaks_nothing() {
        let mock = Arc::new(MockDevice::new());
        let chain = build_chain(&mock);
        let set = FramebufferSet::new(mock.clone(), &chain, vk::RenderPass::null()).unwrap();
        assert_eq!(mock.live_count(ObjectKind::Framebuffer), 3);

        drop(set);
        drop(chain);

        assert_eq!(mock.live_total(), 0);
        assert!(mock.invalid_destroys().is_empty());
    }
}
