//! Engine-level configuration: logging and the main window

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError, RendererConfig};

/// Main window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Quasar".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

/// # Engine Configuration
///
/// Top-level configuration file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Main window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
}

impl EngineConfig {
    /// Create a configuration for the given application and window size
    pub fn new(app_name: &str, width: u32, height: u32) -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig {
                title: app_name.to_string(),
                width,
                height,
                resizable: true,
            },
            renderer: RendererConfig::new(app_name),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Replace the renderer settings
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }
        self.renderer.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("Quasar", 1280, 720)
    }
}

impl Config for EngineConfig {}
