//! Presentation chain management.
//!
//! This module owns the VkSwapchainKHR and one image view per presentable
//! image.
//!
//! # Overview
//!
//! The [`PresentationChain`] struct is built wholesale against a surface and
//! device pair and destroyed wholesale on invalidation. It covers:
//! - Surface capability querying
//! - Format, present mode, extent and image count selection
//! - Image view creation and teardown
//!
//! A chain is never mutated in place. When the surface changes, the caller
//! tears the old chain down and builds a new one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use presenter_rhi::chain::PresentationChain;
//! use presenter_rhi::{vk, PresentDevice};
//!
//! # fn demo(device: Arc<dyn PresentDevice>) -> presenter_rhi::RhiResult<()> {
//! let hint = vk::Extent2D { width: 1280, height: 720 };
//! let mut chain = PresentationChain::build(device, hint, false)?;
//! println!("{} images at {:?}", chain.image_count(), chain.extent());
//! chain.teardown();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::present_device::{ChainDesc, PresentDevice};

/// Surface support details.
///
/// Contains information about what the surface supports for chain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Surface support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Checks if the support is adequate for presenting.
    ///
    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// The rotating set of presentable images bound to a window surface.
///
/// Owns the swapchain handle and one view per image. The images themselves
/// belong to the presentation engine and go away with the swapchain.
///
/// # Thread Safety
///
/// The chain is driven from the render loop thread only.
pub struct PresentationChain {
    /// Device the chain was built on
    device: Arc<dyn PresentDevice>,
    /// Swapchain handle, null once torn down
    swapchain: vk::SwapchainKHR,
    /// Presentable images (owned by the swapchain)
    images: Vec<vk::Image>,
    /// One view per image, same order
    image_views: Vec<vk::ImageView>,
    /// Image format and color space
    surface_format: vk::SurfaceFormatKHR,
    /// Image extent
    extent: vk::Extent2D,
    /// Present mode
    present_mode: vk::PresentModeKHR,
    /// Image count requested at creation
    min_image_count: u32,
}

impl PresentationChain {
    /// Builds a chain against the device's surface.
    ///
    /// Selection rules:
    /// - Format: B8G8R8A8_SRGB with SRGB_NONLINEAR, then B8G8R8A8_UNORM, then
    ///   the first supported format
    /// - Present mode: MAILBOX when available and `vsync` is off, else FIFO
    /// - Extent: `extent_hint` when the surface reports the "follow window"
    ///   sentinel, otherwise the surface's current extent, clamped to the
    ///   supported range in both cases
    /// - Image count: `min_image_count + 1`, capped at the maximum (0 = none)
    ///
    /// Build is atomic: on failure every object created so far is destroyed
    /// before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`RhiError::DegenerateExtent`] if the resolved extent has a zero side
    /// - [`RhiError::ChainCreation`] if the surface is unsupported or the
    ///   device rejects the configuration
    pub fn build(
        device: Arc<dyn PresentDevice>,
        extent_hint: vk::Extent2D,
        vsync: bool,
    ) -> RhiResult<Self> {
        let support = device.surface_support().map_err(|e| match e {
            RhiError::ChainCreation(_) => e,
            other => RhiError::ChainCreation(format!("surface query failed: {}", other)),
        })?;

        if !support.is_adequate() {
            return Err(RhiError::ChainCreation(
                "Inadequate surface support (no formats or present modes)".to_string(),
            ));
        }

        let extent = resolve_extent(&support.capabilities, extent_hint)?;
        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes, vsync);
        let min_image_count = determine_image_count(&support.capabilities);

        let queue_families = device.queue_families();
        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::ChainCreation(
                "Device has no graphics or present queue family".to_string(),
            ));
        };

        let (sharing_mode, queue_family_indices) = if graphics_family != present_family {
            debug!(
                "Using CONCURRENT sharing mode between graphics ({}) and present ({}) queues",
                graphics_family, present_family
            );
            (
                vk::SharingMode::CONCURRENT,
                vec![graphics_family, present_family],
            )
        } else {
            debug!("Using EXCLUSIVE sharing mode (same queue family for graphics and present)");
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        };

        let desc = ChainDesc {
            min_image_count,
            surface_format,
            extent,
            present_mode,
            sharing_mode,
            queue_family_indices,
            pre_transform: support.capabilities.current_transform,
        };

        info!(
            "Creating presentation chain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            min_image_count
        );

        let swapchain = device
            .create_swapchain(&desc)
            .map_err(|e| RhiError::ChainCreation(format!("swapchain rejected: {:?}", e)))?;

        // From here on, dropping `chain` on an early return releases what exists
        let mut chain = Self {
            device,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            surface_format,
            extent,
            present_mode,
            min_image_count,
        };

        chain.images = chain
            .device
            .swapchain_images(swapchain)
            .map_err(|e| RhiError::ChainCreation(format!("image query failed: {:?}", e)))?;

        chain.image_views.reserve(chain.images.len());
        for (i, &image) in chain.images.iter().enumerate() {
            let view_info = color_view_info(image, surface_format.format);
            let view = chain.device.create_image_view(&view_info).map_err(|e| {
                RhiError::ChainCreation(format!("Failed to create image view {}: {:?}", i, e))
            })?;
            chain.image_views.push(view);
        }

        info!(
            "Presentation chain created with {} images",
            chain.images.len()
        );

        Ok(chain)
    }

    /// Destroys the views, then the swapchain.
    ///
    /// Idempotent. Safe on a partially built chain.
    pub fn teardown(&mut self) {
        if !self.image_views.is_empty() {
            for view in self.image_views.drain(..) {
                self.device.destroy_image_view(view);
            }
            debug!("Destroyed presentation chain image views");
        }

        if self.swapchain != vk::SwapchainKHR::null() {
            self.device.destroy_swapchain(self.swapchain);
            self.swapchain = vk::SwapchainKHR::null();

            info!(
                "Presentation chain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }

        self.images.clear();
    }

    /// Returns true until [`teardown`](Self::teardown) runs.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.swapchain != vk::SwapchainKHR::null()
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Returns the color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }

    /// Returns the extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the image count requested at creation.
    #[inline]
    pub fn min_image_count(&self) -> u32 {
        self.min_image_count
    }

    /// Returns the number of presentable images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns all presentable images.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Returns all image views, indexed like [`images`](Self::images).
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for PresentationChain {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PresentationChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationChain")
            .field("swapchain", &self.swapchain)
            .field("format", &self.surface_format.format)
            .field("extent", &self.extent)
            .field("present_mode", &self.present_mode)
            .field("images", &self.images.len())
            .finish()
    }
}

/// Builds the create-info for a colour view of a presentable image.
///
/// Identity swizzle, colour aspect, one mip level, one array layer.
pub fn color_view_info(image: vk::Image, format: vk::Format) -> vk::ImageViewCreateInfo<'static> {
    vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        )
}

/// Chooses the best surface format from the available formats.
///
/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR color space.
/// Falls back to the first available format if the preferred format is not available.
///
/// `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    // Prefer SRGB format for correct gamma handling
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return format;
    }

    let first = formats.first().copied().unwrap_or_default();
    warn!("Using first available surface format: {:?}", first.format);
    first
}

/// Chooses the present mode.
///
/// Prefers MAILBOX (no tearing, low latency) unless `vsync` is requested.
/// Falls back to FIFO, which every implementation must support.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    debug!("Selected FIFO present mode (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Resolves the chain extent.
///
/// A current extent of `u32::MAX` means the surface follows the window, so
/// `hint` is used. Either way the result is clamped to the supported range.
///
/// # Errors
///
/// Returns [`RhiError::DegenerateExtent`] when the window has a zero side.
pub fn resolve_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    hint: vk::Extent2D,
) -> RhiResult<vk::Extent2D> {
    let follows_window = capabilities.current_extent.width == u32::MAX;
    let requested = if follows_window {
        hint
    } else {
        capabilities.current_extent
    };

    // Clamping 0 up to the minimum would hide a minimized window
    if requested.width == 0 || requested.height == 0 {
        return Err(RhiError::DegenerateExtent {
            width: requested.width,
            height: requested.height,
        });
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    let extent = vk::Extent2D {
        width: clamp_dimension(requested.width, min.width, max.width),
        height: clamp_dimension(requested.height, min.height, max.height),
    };

    if extent.width == 0 || extent.height == 0 {
        return Err(RhiError::DegenerateExtent {
            width: extent.width,
            height: extent.height,
        });
    }

    debug!(
        "Resolved extent: {}x{} (requested: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        requested.width,
        requested.height,
        min.width,
        min.height,
        max.width,
        max.height
    );

    Ok(extent)
}

/// Clamps without panicking on a driver that reports `min > max`.
#[inline]
fn clamp_dimension(value: u32, min: u32, max: u32) -> u32 {
    value.max(min).min(max)
}

/// Determines the number of images to request.
///
/// One more than the minimum, but respects the maximum if set.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    // If max_image_count is 0, there's no maximum
    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockDevice, ObjectKind};
    use crate::physical_device::QueueFamilyIndices;

    fn srgb(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn follow_window_caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            srgb(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            srgb(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_fallback() {
        let formats = vec![
            srgb(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            srgb(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected, formats[0]);
    }

    #[test]
    fn test_choose_surface_format_requires_matching_color_space() {
        let formats = vec![
            srgb(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            srgb(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            srgb(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected, formats[0]);
    }

    #[test]
    fn test_choose_surface_format_has_no_unorm_preference() {
        let formats = vec![
            srgb(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            srgb(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        assert_eq!(choose_surface_format(&formats), formats[0]);
    }

    #[test]
    fn test_choose_present_mode_prefers_mailbox() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_choose_present_mode_fallback_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);

        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_present_mode_vsync_forces_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_resolve_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };

        let resolved = resolve_extent(&capabilities, extent(800, 600)).unwrap();
        assert_eq!(resolved, extent(1920, 1080));
    }

    #[test]
    fn test_resolve_extent_clamps_to_limits() {
        let capabilities = follow_window_caps();

        assert_eq!(
            resolve_extent(&capabilities, extent(3000, 3000)).unwrap(),
            extent(2000, 2000)
        );
        assert_eq!(
            resolve_extent(&capabilities, extent(50, 50)).unwrap(),
            extent(100, 100)
        );
        assert_eq!(
            resolve_extent(&capabilities, extent(800, 600)).unwrap(),
            extent(800, 600)
        );
    }

    #[test]
    fn test_resolve_extent_degenerate_hint() {
        let capabilities = follow_window_caps();

        let err = resolve_extent(&capabilities, extent(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            RhiError::DegenerateExtent {
                width: 0,
                height: 0
            }
        ));

        let err = resolve_extent(&capabilities, extent(640, 0)).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_resolve_extent_degenerate_current() {
        // Minimized windows report a fixed 0x0 extent on some platforms
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(0, 0),
            min_image_extent: extent(0, 0),
            max_image_extent: extent(0, 0),
            ..Default::default()
        };

        let err = resolve_extent(&capabilities, extent(800, 600)).unwrap_err();
        assert!(matches!(err, RhiError::DegenerateExtent { .. }));
    }

    #[test]
    fn test_determine_image_count() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 2);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0, // 0 means no limit
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn test_color_view_info() {
        let info = color_view_info(vk::Image::null(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(info.view_type, vk::ImageViewType::TYPE_2D);
        assert_eq!(info.components.r, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(info.components.a, vk::ComponentSwizzle::IDENTITY);
        assert_eq!(
            info.subresource_range.aspect_mask,
            vk::ImageAspectFlags::COLOR
        );
        assert_eq!(info.subresource_range.level_count, 1);
        assert_eq!(info.subresource_range.layer_count, 1);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }

    #[test]
    fn test_build_creates_one_view_per_image() {
        let mock = Arc::new(MockDevice::new());
        mock.set_capabilities(follow_window_caps());

        let chain = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap();

        assert!(chain.is_live());
        assert_eq!(chain.extent(), extent(800, 600));
        assert_eq!(chain.image_count(), 3);
        assert_eq!(chain.image_views().len(), chain.images().len());
        assert_eq!(chain.format(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chain.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(mock.live_count(ObjectKind::ImageView), 3);
        assert_eq!(mock.live_count(ObjectKind::Swapchain), 1);
    }

    #[test]
    fn test_build_exclusive_sharing_for_shared_family() {
        let mock = Arc::new(MockDevice::new());
        let _chain = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap();

        let desc = mock.last_chain_desc().unwrap();
        assert_eq!(desc.sharing_mode, vk::SharingMode::EXCLUSIVE);
        assert!(desc.queue_family_indices.is_empty());
    }

    #[test]
    fn test_build_concurrent_sharing_for_split_families() {
        let mock = Arc::new(MockDevice::new());
        mock.set_queue_families(QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
        });

        let _chain = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap();

        let desc = mock.last_chain_desc().unwrap();
        assert_eq!(desc.sharing_mode, vk::SharingMode::CONCURRENT);
        assert_eq!(desc.queue_family_indices, vec![0, 1]);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mock = Arc::new(MockDevice::new());
        let mut chain = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap();

        chain.teardown();
        chain.teardown();
        drop(chain);

        let destroys = mock.count_calls(|c| matches!(c, Call::DestroySwapchain(_)));
        assert_eq!(destroys, 1);
        assert_eq!(mock.live_total(), 0);
        assert!(mock.invalid_destroys().is_empty());
    }

    #[test]
    fn test_teardown_destroys_views_before_swapchain() {
        let mock = Arc::new(MockDevice::new());
        let mut chain = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap();
        mock.clear_calls();

        chain.teardown();

        let calls = mock.calls();
        let last = calls.len() - 1;
        assert!(matches!(calls[last], Call::DestroySwapchain(_)));
        assert!(
            calls[..last]
                .iter()
                .all(|c| matches!(c, Call::DestroyImageView(_)))
        );
    }

    #[test]
    fn test_failed_view_creation_leaks_nothing() {
        let mock = Arc::new(MockDevice::new());
        mock.fail_image_view_after(1, vk::Result::ERROR_OUT_OF_HOST_MEMORY);

        let err = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap_err();

        assert!(matches!(err, RhiError::ChainCreation(_)));
        assert!(err.is_fatal());
        assert_eq!(mock.live_total(), 0);
        assert!(mock.invalid_destroys().is_empty());
    }

    #[test]
    fn test_rejected_swapchain_is_chain_creation_error() {
        let mock = Arc::new(MockDevice::new());
        mock.fail_swapchain_creation(vk::Result::ERROR_INITIALIZATION_FAILED);

        let err = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap_err();

        assert!(matches!(err, RhiError::ChainCreation(_)));
        assert_eq!(mock.live_total(), 0);
    }

    #[test]
    fn test_inadequate_surface_is_chain_creation_error() {
        let mock = Arc::new(MockDevice::new());
        mock.set_present_modes(Vec::new());

        let err = PresentationChain::build(mock.clone(), extent(800, 600), false).unwrap_err();
        assert!(matches!(err, RhiError::ChainCreation(_)));
        assert_eq!(mock.count_calls(|c| matches!(c, Call::CreateSwapchain(_))), 0);
    }

    #[test]
    fn test_degenerate_hint_creates_nothing() {
        let mock = Arc::new(MockDevice::new());

        let err = PresentationChain::build(mock.clone(), extent(0, 0), false).unwrap_err();

        assert!(matches!(err, RhiError::DegenerateExtent { .. }));
        assert_eq!(mock.live_total(), 0);
    }

    #[test]
    fn test_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PresentationChain>();
        assert_sync::<PresentationChain>();
    }
}
