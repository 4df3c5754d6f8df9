//! Presentation surface and swapchain-support queries

use ash::extensions::khr;
use ash::vk;

use super::{VulkanError, VulkanInstance, VulkanResult};
use crate::render::window::Window;

/// Surface capabilities as seen by one physical device
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    /// Image count and extent limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format/color-space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Window surface with RAII cleanup
pub struct Surface {
    loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl Surface {
    /// Create the surface for a window
    pub fn new(instance: &VulkanInstance, window: &Window) -> VulkanResult<Self> {
        let loader = khr::Surface::new(instance.entry(), instance.instance());
        let surface = window
            .create_surface(instance.instance().handle())
            .map_err(|e| VulkanError::SurfaceCreation(e.to_string()))?;

        Ok(Self { loader, surface })
    }

    /// Surface handle
    pub const fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub const fn loader(&self) -> &khr::Surface {
        &self.loader
    }

    /// Whether a queue family of the device can present to this surface
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> VulkanResult<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Current capabilities (extent limits change with the window)
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .map_err(VulkanError::Api)
    }

    /// Query the full swapchain-support descriptor
    pub fn query_support(&self, physical_device: vk::PhysicalDevice) -> VulkanResult<SwapchainSupport> {
        let capabilities = self.capabilities(physical_device)?;
        let (formats, present_modes) = unsafe {
            (
                self.loader
                    .get_physical_device_surface_formats(physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
                self.loader
                    .get_physical_device_surface_present_modes(physical_device, self.surface)
                    .map_err(VulkanError::Api)?,
            )
        };

        Ok(SwapchainSupport {
            capabilities,
            formats,
            present_modes,
        })
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}
