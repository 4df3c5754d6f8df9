//! Vulkan backend
//!
//! RAII wrappers over the Vulkan objects the renderer owns. Each wrapper holds
//! a clone of the `ash::Device` function table and destroys its handle on
//! drop; owners declare fields in reverse creation order.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor_set;
pub mod device;
pub mod device_selection;
pub mod error;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod render_pass;
pub mod resource_factory;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod swapchain_manager;
pub mod sync;
pub mod vertex_layout;

pub use buffer::{find_memory_type, Buffer};
pub use commands::{record, CommandPool, CommandRecorder, DrawResources, PipelineState};
pub use context::VulkanContext;
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use device::{Device, LogicalDevice, PhysicalDeviceInfo};
pub use device_selection::{
    detect_depth_format, find_queue_families, select_device, DeviceCandidate, DeviceRequirements, DeviceSelection,
    QueueFamilies, QueueFamilyCaps, QueueFamilyIndices, QueueRoles, Rejection,
};
pub use error::{ErrorCategory, VulkanError, VulkanResult};
pub use framebuffer::{DepthBuffer, Framebuffer};
pub use image::{mip_levels_for, Image, ImageDesc, ImageView, Sampler, Texture};
pub use instance::VulkanInstance;
pub use render_pass::RenderPass;
pub use resource_factory::ResourceFactory;
pub use shader::{validate_spirv, FramePushConstants, GraphicsPipeline, ShaderModule};
pub use surface::{Surface, SwapchainSupport};
pub use swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format, Swapchain, SwapchainLifecycle,
    SwapchainState,
};
pub use swapchain_manager::SwapchainManager;
pub use sync::{Fence, FrameSlot, Semaphore};
