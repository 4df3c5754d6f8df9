//! # Renderer Configuration
//!
//! Settings consumed by the Vulkan backend at initialization: application
//! identity, frames in flight, validation, clear color, swapchain preferences
//! and shader locations.

use ash::vk;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Config, ConfigError};

/// Upper bound on frames in flight
pub const MAX_FRAMES_IN_FLIGHT_LIMIT: usize = 8;

/// Shader locations for the main graphics pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Resolve shader file names against the usual output directories.
    ///
    /// The first directory that contains both files wins; when none does the
    /// bare names are kept so the load error names the missing file.
    pub fn with_path_resolution(vertex_file: &str, fragment_file: &str) -> Self {
        const SHADER_DIRS: [&str; 4] = ["target/shaders", "shaders", "resources/shaders", "."];

        SHADER_DIRS
            .iter()
            .map(Path::new)
            .find(|dir| dir.join(vertex_file).exists() && dir.join(fragment_file).exists())
            .map_or_else(
                || Self::new(vertex_file, fragment_file),
                |dir| {
                    Self::new(
                        dir.join(vertex_file).to_string_lossy(),
                        dir.join(fragment_file).to_string_lossy(),
                    )
                },
            )
    }

    /// Validate the shader configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vertex_shader_path.is_empty() || self.fragment_shader_path.is_empty() {
            return Err(ConfigError::Invalid("shader paths cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("target/shaders/quad.vert.spv", "target/shaders/quad.frag.spv")
    }
}

/// Present mode preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentModePreference {
    /// Mailbox when offered, FIFO otherwise
    LowLatency,
    /// Always FIFO (vsync)
    Fifo,
}

impl PresentModePreference {
    /// The mode to look for before falling back to FIFO
    pub const fn preferred_mode(self) -> vk::PresentModeKHR {
        match self {
            Self::LowLatency => vk::PresentModeKHR::MAILBOX,
            Self::Fifo => vk::PresentModeKHR::FIFO,
        }
    }
}

/// Surface format preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceFormatPreference {
    /// `B8G8R8A8_SRGB` with the sRGB non-linear color space
    Srgb,
    /// `B8G8R8A8_UNORM` with the sRGB non-linear color space
    Unorm,
}

impl SurfaceFormatPreference {
    /// The format/color-space pair to look for
    pub const fn surface_format(self) -> vk::SurfaceFormatKHR {
        let format = match self {
            Self::Srgb => vk::Format::B8G8R8A8_SRGB,
            Self::Unorm => vk::Format::B8G8R8A8_UNORM,
        };
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }
}

/// Vulkan renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Number of frame slots cycled by the frame synchronizer
    pub max_frames_in_flight: usize,
    /// Validation layers; `None` enables them in debug builds only
    pub enable_validation: Option<bool>,
    /// Clear color for the main render pass
    pub clear_color: [f32; 4],
    /// Present mode preference
    pub preferred_present_mode: PresentModePreference,
    /// Surface format preference
    pub preferred_surface_format: SurfaceFormatPreference,
    /// Shader locations
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a configuration with defaults for everything but the name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (1, 0, 0),
            max_frames_in_flight: 2,
            enable_validation: None,
            clear_color: [0.005, 0.005, 0.005, 1.0],
            preferred_present_mode: PresentModePreference::LowLatency,
            preferred_surface_format: SurfaceFormatPreference::Srgb,
            shaders: ShaderConfig::default(),
        }
    }

    /// Set application version
    pub const fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set the number of frames in flight
    pub const fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Force validation on or off
    pub const fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Set the clear color
    pub const fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the present mode preference
    pub const fn with_present_mode(mut self, preference: PresentModePreference) -> Self {
        self.preferred_present_mode = preference;
        self
    }

    /// Set the surface format preference
    pub const fn with_surface_format(mut self, preference: SurfaceFormatPreference) -> Self {
        self.preferred_surface_format = preference;
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Application version packed for `VkApplicationInfo`
    pub const fn packed_version(&self) -> u32 {
        let (major, minor, patch) = self.application_version;
        vk::make_api_version(0, major, minor, patch)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("application name cannot be empty".to_string()));
        }

        if !(1..=MAX_FRAMES_IN_FLIGHT_LIMIT).contains(&self.max_frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "max_frames_in_flight must be within 1..={MAX_FRAMES_IN_FLIGHT_LIMIT}, got {}",
                self.max_frames_in_flight
            )));
        }

        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid("clear color components must be within 0..=1".to_string()));
        }

        self.shaders.validate()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Quasar Application")
    }
}

impl Config for RendererConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RendererConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_frames_in_flight, 2);
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        assert!(RendererConfig::default().with_max_frames_in_flight(0).validate().is_err());
        assert!(RendererConfig::default().with_max_frames_in_flight(8).validate().is_ok());
        assert!(RendererConfig::default().with_max_frames_in_flight(9).validate().is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(RendererConfig::new("").validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_clear_color_range() {
        let config = RendererConfig::default().with_clear_color([0.0, 0.2, 1.5, 1.0]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_override() {
        assert!(RendererConfig::default().with_validation(true).validation_enabled());
        assert!(!RendererConfig::default().with_validation(false).validation_enabled());
    }

    #[test]
    fn test_preferences_map_to_vulkan() {
        assert_eq!(
            PresentModePreference::LowLatency.preferred_mode(),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            SurfaceFormatPreference::Unorm.surface_format().format,
            vk::Format::B8G8R8A8_UNORM
        );

        let config = RendererConfig::default()
            .with_present_mode(PresentModePreference::Fifo)
            .with_surface_format(SurfaceFormatPreference::Unorm);
        assert_eq!(config.preferred_present_mode.preferred_mode(), vk::PresentModeKHR::FIFO);
        assert_eq!(
            config.preferred_surface_format.surface_format().format,
            vk::Format::B8G8R8A8_UNORM
        );
    }

    #[test]
    fn test_packed_version() {
        let config = RendererConfig::default().with_version(2, 3, 4);
        let packed = config.packed_version();
        assert_eq!(vk::api_version_major(packed), 2);
        assert_eq!(vk::api_version_minor(packed), 3);
        assert_eq!(vk::api_version_patch(packed), 4);
    }
}
