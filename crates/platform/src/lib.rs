//! Platform abstraction layer for the presenter.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation and the instance extensions it needs

mod window;

pub use window::{Surface, Window, extent_of};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
