//! Configuration system
//!
//! Configuration structs implement [`Config`] and can be read from or written
//! to `.toml` and `.ron` files.

mod engine;
mod renderer;

pub use engine::{EngineConfig, WindowConfig};
pub use renderer::{
    PresentModePreference, RendererConfig, ShaderConfig, SurfaceFormatPreference,
};
pub use serde::{Deserialize, Serialize};

use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;

        match format {
            ConfigFormat::Toml => {
                toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            ConfigFormat::Ron => {
                ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
        }
    }

    /// Load configuration from file, falling back to defaults when the file
    /// does not exist
    fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save configuration to file
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = self.to_config_string(ConfigFormat::from_path(path)?)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Serialize into the given textual format
    fn to_config_string(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
            }
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }

    /// Parse from the given textual format
    fn from_config_str(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => {
                toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            ConfigFormat::Ron => {
                ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
            }
        }
    }
}

/// Supported on-disk configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML
    Toml,
    /// Rusty Object Notation
    Ron,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its allowed range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/b.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("engine.ron")).unwrap(), ConfigFormat::Ron);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("engine.json")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_toml_round_trip_preserves_renderer_settings() {
        let config = EngineConfig::default().with_renderer(
            RendererConfig::new("Round Trip")
                .with_max_frames_in_flight(3)
                .with_present_mode(PresentModePreference::Fifo),
        );

        let text = config.to_config_string(ConfigFormat::Toml).unwrap();
        let parsed = EngineConfig::from_config_str(&text, ConfigFormat::Toml).unwrap();

        assert_eq!(parsed.renderer.application_name, "Round Trip");
        assert_eq!(parsed.renderer.max_frames_in_flight, 3);
        assert_eq!(parsed.renderer.preferred_present_mode, PresentModePreference::Fifo);
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let parsed = RendererConfig::from_config_str(
            "(application_name: \"Partial\")",
            ConfigFormat::Ron,
        )
        .unwrap();

        assert_eq!(parsed.application_name, "Partial");
        assert_eq!(parsed.max_frames_in_flight, 2);
    }

    #[test]
    fn test_load_missing_file_falls_back_to_default() {
        let path = std::env::temp_dir().join("quasar_render_missing_config_4e1d.toml");
        let config = EngineConfig::load_or_default(&path).unwrap();
        assert_eq!(config.window.width, EngineConfig::default().window.width);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join("quasar_render_saved_config_91af.ron");
        let config = EngineConfig::default().with_log_level("debug");
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.log_level, "debug");
        let _ = std::fs::remove_file(&path);
    }
}
