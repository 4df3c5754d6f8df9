//! Platform capability descriptor
//!
//! Resolved once at startup and handed to instance creation and device
//! selection, so platform differences are plain data rather than separate
//! compiled code paths.

use std::ffi::CStr;

use ash::vk;

/// `VK_KHR_portability_subset`
pub fn portability_subset_extension() -> &'static CStr {
    vk::KhrPortabilitySubsetFn::name()
}

/// `VK_KHR_portability_enumeration`
pub fn portability_enumeration_extension() -> &'static CStr {
    vk::KhrPortabilityEnumerationFn::name()
}

/// What the host platform requires from the Vulkan setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Devices must expose `VK_KHR_portability_subset` (layered implementations)
    pub requires_portability_subset: bool,
    /// The instance must enable portability enumeration to see such devices
    pub portability_enumeration: bool,
    /// Whether to look for a discrete GPU before accepting any GPU
    pub prefer_discrete_gpu: bool,
}

impl PlatformCapabilities {
    /// Describe the platform this binary runs on
    pub const fn detect() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::portability()
        } else {
            Self::native()
        }
    }

    /// A platform with a conformant native driver
    pub const fn native() -> Self {
        Self {
            requires_portability_subset: false,
            portability_enumeration: false,
            prefer_discrete_gpu: true,
        }
    }

    /// A platform reached through a portability layer such as MoltenVK
    pub const fn portability() -> Self {
        Self {
            requires_portability_subset: true,
            portability_enumeration: true,
            prefer_discrete_gpu: false,
        }
    }

    /// Device extensions every candidate must support
    pub fn required_device_extensions(&self) -> Vec<&'static CStr> {
        let mut extensions = vec![ash::extensions::khr::Swapchain::name()];
        if self.requires_portability_subset {
            extensions.push(portability_subset_extension());
        }
        extensions
    }

    /// Extra instance extensions on top of what the window system needs
    pub fn extra_instance_extensions(&self) -> Vec<&'static CStr> {
        if self.portability_enumeration {
            vec![portability_enumeration_extension()]
        } else {
            Vec::new()
        }
    }

    /// Flags for `VkInstanceCreateInfo`
    pub fn instance_create_flags(&self) -> vk::InstanceCreateFlags {
        if self.portability_enumeration {
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        }
    }
}

impl Default for PlatformCapabilities {
    fn default() -> Self {
        Self::detect()
    }
}
