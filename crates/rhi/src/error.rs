//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
///
/// The presentation kinds split into two groups. Out-of-date, suboptimal and
/// degenerate-extent are recoverable: the frame loop rebuilds the chain (or
/// waits for a usable window size) and carries on. Everything else is fatal
/// and is expected to end the render loop.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// The device or surface rejected the presentation chain configuration
    #[error("Presentation chain creation failed: {0}")]
    ChainCreation(String),

    /// The surface no longer matches the presentation chain. Reported as a
    /// frame's rebuild reason rather than returned from the frame loop.
    #[error("Surface is out of date")]
    SurfaceOutOfDate,

    /// The surface still accepts the chain but it no longer matches exactly.
    /// Reported as a frame's rebuild reason rather than returned from the frame loop.
    #[error("Surface is suboptimal")]
    SurfaceSuboptimal,

    /// The window has a zero-sized client area (e.g. minimized)
    #[error("Degenerate surface extent {width}x{height}")]
    DegenerateExtent { width: u32, height: u32 },

    /// The graphics queue rejected a submission
    #[error("Queue submission failed: {0}")]
    Submission(vk::Result),

    /// The present queue rejected a presentation request
    #[error("Presentation failed: {0}")]
    Present(vk::Result),

    /// Render pass creation error
    #[error("Render pass error: {0}")]
    RenderPassError(String),

    /// Invalid construction parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RhiError {
    /// Returns true for conditions handled by rebuilding or deferring the chain.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RhiError::SurfaceOutOfDate
                | RhiError::SurfaceSuboptimal
                | RhiError::DegenerateExtent { .. }
        )
    }

    /// Returns true for conditions that must end the render loop.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
