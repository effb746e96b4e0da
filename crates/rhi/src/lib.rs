//! Vulkan presentation layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over the parts of Vulkan that a
//! window presenter needs, using the `ash` crate. It handles:
//! - Instance and device creation
//! - Physical device selection
//! - The [`PresentDevice`] seam every presentation component is built on
//! - Synchronization primitives and command pools
//! - Presentation chain (swapchain) construction and teardown
//! - Per-image framebuffers and the colour render pass

mod error;

pub mod chain;
pub mod command;
pub mod device;
pub mod framebuffer;
pub mod instance;
pub mod physical_device;
pub mod present_device;
pub mod render_pass;
pub mod sync;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{RhiError, RhiResult};
pub use present_device::{ChainDesc, FrameSubmit, PresentDevice};

// Re-export ash types that users might need
pub use ash::vk;
