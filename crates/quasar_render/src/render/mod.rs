//! Rendering: window, Vulkan backend and the frame loop

pub mod frame;
pub mod renderer;
pub mod vulkan;
pub mod window;

pub use frame::{FrameOutcome, FrameStats, SkipReason};
pub use renderer::Renderer;
pub use vulkan::{VulkanError, VulkanResult};
pub use window::{Window, WindowError};
