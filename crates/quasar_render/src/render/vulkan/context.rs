//! The explicit Vulkan context
//!
//! Built once at startup and borrowed by every component. Fields are declared
//! in reverse creation order, so dropping the context tears down the device,
//! then the surface, then the instance.

use super::device::Device;
use super::instance::VulkanInstance;
use super::surface::Surface;
use super::VulkanResult;
use crate::config::RendererConfig;
use crate::platform::PlatformCapabilities;
use crate::render::window::Window;

/// Instance, surface and device for one window
pub struct VulkanContext {
    device: Device,
    surface: Surface,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create the instance, the window surface and the selected device
    pub fn new(window: &Window, config: &RendererConfig, platform: &PlatformCapabilities) -> VulkanResult<Self> {
        let window_extensions = window.required_instance_extensions()?;
        let instance = VulkanInstance::new(
            &config.application_name,
            config.packed_version(),
            &window_extensions,
            platform,
            config.validation_enabled(),
        )?;
        let surface = Surface::new(&instance, window)?;
        let device = Device::new(&instance, &surface, platform)?;

        Ok(Self {
            device,
            surface,
            instance,
        })
    }

    /// Selected device
    pub const fn device(&self) -> &Device {
        &self.device
    }

    /// Device and surface together, for swapchain rebuilds
    pub fn device_and_surface(&mut self) -> (&mut Device, &Surface) {
        (&mut self.device, &self.surface)
    }

    /// Presentation surface
    pub const fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Instance and debug messenger
    pub const fn instance(&self) -> &VulkanInstance {
        &self.instance
    }
}
