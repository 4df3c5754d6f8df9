//! Vulkan backend error types

use ash::vk;
use thiserror::Error;

use crate::config::ConfigError;
use crate::render::window::WindowError;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader could not be found or loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// No physical device satisfies the requirements
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A required instance or device extension is missing
    #[error("Required extension not supported: {name}")]
    MissingExtension {
        /// Extension name
        name: String,
    },

    /// A required device feature is missing
    #[error("Required feature not supported: {name}")]
    MissingFeature {
        /// Feature name
        name: String,
    },

    /// The presentation surface could not be created
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// No memory type matches the filter and property flags
    #[error("No suitable memory type for filter {type_filter:#b} with {properties:?}")]
    NoSuitableMemoryType {
        /// Memory type bits from the resource's requirements
        type_filter: u32,
        /// Requested property flags
        properties: vk::MemoryPropertyFlags,
    },

    /// A format lacks a capability the operation needs
    #[error("Format {format:?} unsupported: {reason}")]
    UnsupportedFormat {
        /// The format in question
        format: vk::Format,
        /// Missing capability
        reason: String,
    },

    /// Memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: u64,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Shader bytecode is malformed or could not be read
    #[error("Shader error: {0}")]
    Shader(String),

    /// Window system failure
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Invalid renderer configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// How an error is handled by the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fatal during startup
    Initialization,
    /// Recovered by recreating the swapchain; never surfaced to the caller
    TransientSwapchain,
    /// Fatal at startup, aborts only the load at runtime
    ResourceCreation,
    /// Anything else
    Runtime,
}

impl VulkanError {
    /// Classify the error
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Api(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => {
                ErrorCategory::TransientSwapchain
            }
            Self::Api(
                vk::Result::ERROR_OUT_OF_HOST_MEMORY
                | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
                | vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            )
            | Self::NoSuitableMemoryType { .. }
            | Self::UnsupportedFormat { .. }
            | Self::OutOfMemory { .. }
            | Self::Shader(_) => ErrorCategory::ResourceCreation,
            Self::Loading(_)
            | Self::NoSuitableDevice
            | Self::MissingExtension { .. }
            | Self::MissingFeature { .. }
            | Self::SurfaceCreation(_)
            | Self::InitializationFailed(_)
            | Self::Window(_)
            | Self::Config(_) => ErrorCategory::Initialization,
            Self::Api(_) | Self::InvalidOperation { .. } => ErrorCategory::Runtime,
        }
    }

    /// Whether recreating the swapchain recovers from this error
    pub const fn is_out_of_date(&self) -> bool {
        matches!(self.category(), ErrorCategory::TransientSwapchain)
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_results_are_transient() {
        assert!(VulkanError::Api(vk::Result::ERROR_OUT_OF_DATE_KHR).is_out_of_date());
        assert!(VulkanError::Api(vk::Result::SUBOPTIMAL_KHR).is_out_of_date());
        assert!(!VulkanError::Api(vk::Result::ERROR_DEVICE_LOST).is_out_of_date());
    }

    #[test]
    fn test_categories() {
        assert_eq!(VulkanError::NoSuitableDevice.category(), ErrorCategory::Initialization);
        assert_eq!(
            VulkanError::MissingExtension { name: "VK_KHR_swapchain".into() }.category(),
            ErrorCategory::Initialization
        );
        assert_eq!(
            VulkanError::NoSuitableMemoryType {
                type_filter: 0b10,
                properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            }
            .category(),
            ErrorCategory::ResourceCreation
        );
        assert_eq!(
            VulkanError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).category(),
            ErrorCategory::ResourceCreation
        );
        assert_eq!(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST).category(), ErrorCategory::Runtime);
    }

    #[test]
    fn test_memory_type_message_shows_filter_bits() {
        let err = VulkanError::NoSuitableMemoryType {
            type_filter: 0b101,
            properties: vk::MemoryPropertyFlags::HOST_VISIBLE,
        };
        assert!(err.to_string().contains("0b101"));
    }
}
