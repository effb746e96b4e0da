//! Configuration loading.
//!
//! The presenter reads an optional TOML file:
//!
//! ```toml
//! [window]
//! title = "Presenter"
//! width = 1280
//! height = 720
//!
//! [present]
//! frames_in_flight = 2
//! vsync = false
//! resize_settle_ms = 0
//! validation = true
//! clear_color = [0.1, 0.1, 0.15, 1.0]
//! ```
//!
//! Every key is optional; missing keys take their default value.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Window creation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title.
    pub title: String,
    /// Initial client-area width in pixels.
    pub width: u32,
    /// Initial client-area height in pixels.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Presenter".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Presentation and frame pacing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentConfig {
    /// Number of frame slots the CPU may run ahead of the GPU.
    pub frames_in_flight: usize,
    /// Always use FIFO presentation instead of preferring MAILBOX.
    pub vsync: bool,
    /// Resize notifications younger than this are not acted on until they settle.
    /// Zero rebuilds on the first frame after a resize.
    pub resize_settle_ms: u64,
    /// Enable the Khronos validation layer when available.
    pub validation: bool,
    /// Clear colour applied to every frame.
    pub clear_color: [f32; 4],
}

impl Default for PresentConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            vsync: false,
            resize_settle_ms: 0,
            validation: cfg!(debug_assertions),
            clear_color: [0.1, 0.1, 0.15, 1.0],
        }
    }
}

impl PresentConfig {
    /// The resize debounce window as a [`Duration`](std::time::Duration).
    pub fn resize_settle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.resize_settle_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub present: PresentConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults. A file that exists but cannot be
    /// parsed, or that holds out-of-range values, is an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it is malformed or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is malformed or invalid.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        debug!("Parsed config: {:?}", config);
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.present.frames_in_flight == 0 {
            return Err(Error::Config(
                "present.frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero (got {}x{})",
                self.window.width, self.window.height
            )));
        }
        if self
            .present
            .clear_color
            .iter()
            .any(|c| !(0.0..=1.0).contains(c))
        {
            return Err(Error::Config(
                "present.clear_color components must be within 0.0..=1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.present.frames_in_flight, 2);
        assert!(!config.present.vsync);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [present]
            vsync = true
            "#,
        )
        .unwrap();

        assert!(config.present.vsync);
        assert_eq!(config.present.frames_in_flight, 2);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn test_zero_frames_in_flight_rejected() {
        let result = EngineConfig::from_toml_str(
            r#"
            [present]
            frames_in_flight = 0
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_window_size_rejected() {
        let result = EngineConfig::from_toml_str(
            r#"
            [window]
            width = 0
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = EngineConfig::from_toml_str("[present\nvsync = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[window]\ntitle = \"Test\"\nwidth = 800\nheight = 600\n\n[present]\nframes_in_flight = 3\nresize_settle_ms = 150"
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.window.title, "Test");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.present.frames_in_flight, 3);
        assert_eq!(config.present.resize_settle(), std::time::Duration::from_millis(150));
    }
}
