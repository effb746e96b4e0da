//! Core utilities for the presenter.
//!
//! This crate provides foundational types and utilities used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Configuration loading
//! - A monotonic timer

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, PresentConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
