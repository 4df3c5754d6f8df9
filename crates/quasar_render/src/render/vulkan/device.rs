//! Physical device queries and the logical device
//!
//! The queries here fill [`DeviceCandidate`] snapshots; the choice itself is
//! made by [`select_device`] so it stays deterministic and testable.

use std::ffi::CStr;

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Instance};

use super::commands::CommandPool;
use super::device_selection::{
    detect_depth_format, select_device, DeviceCandidate, DeviceRequirements, QueueFamilies, QueueFamilyCaps,
};
use super::surface::{Surface, SwapchainSupport};
use super::{VulkanError, VulkanInstance, VulkanResult};
use crate::platform::PlatformCapabilities;

/// Capabilities of the selected physical device
pub struct PhysicalDeviceInfo {
    /// Physical device handle
    pub handle: vk::PhysicalDevice,
    /// Properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory types and heaps
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family for each role
    pub queue_families: QueueFamilies,
    /// Depth attachment format
    pub depth_format: vk::Format,
    /// Some memory type is both device-local and host-visible
    pub supports_device_local_host_visible: bool,
}

impl PhysicalDeviceInfo {
    /// Device name as reported by the driver
    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

fn device_local_heaps(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> Vec<u64> {
    memory_properties.memory_heaps[..memory_properties.memory_heap_count as usize]
        .iter()
        .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
        .map(|heap| heap.size)
        .collect()
}

fn has_device_local_host_visible(memory_properties: &vk::PhysicalDeviceMemoryProperties) -> bool {
    let wanted = vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE;
    memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .any(|memory_type| memory_type.property_flags.contains(wanted))
}

/// Snapshot one physical device against the target surface
fn query_candidate(
    instance: &Instance,
    surface: &Surface,
    physical_device: vk::PhysicalDevice,
) -> VulkanResult<(DeviceCandidate, SwapchainSupport)> {
    let properties = unsafe { instance.get_physical_device_properties(physical_device) };
    let features = unsafe { instance.get_physical_device_features(physical_device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
    let family_properties = unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    let mut queue_families = Vec::with_capacity(family_properties.len());
    for (index, family) in (0u32..).zip(&family_properties) {
        queue_families.push(QueueFamilyCaps {
            flags: family.queue_flags,
            queue_count: family.queue_count,
            supports_present: surface.supports_present(physical_device, index)?,
        });
    }

    let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
        .map_err(VulkanError::Api)?
        .iter()
        .map(|extension| {
            unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }
                .to_string_lossy()
                .into_owned()
        })
        .collect();

    let support = surface.query_support(physical_device)?;

    let candidate = DeviceCandidate {
        name: unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned(),
        device_type: properties.device_type,
        api_version: properties.api_version,
        driver_version: properties.driver_version,
        queue_families,
        extensions,
        sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        surface_format_count: support.formats.len(),
        present_mode_count: support.present_modes.len(),
        device_local_heaps: device_local_heaps(&memory_properties),
    };

    Ok((candidate, support))
}

/// Logical device and its queues, destroyed on drop
pub struct LogicalDevice {
    /// Device function table
    pub device: ash::Device,
    /// Graphics queue
    pub graphics_queue: vk::Queue,
    /// Present queue
    pub present_queue: vk::Queue,
    /// Transfer queue
    pub transfer_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one queue per unique family
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        families: &QueueFamilies,
        extensions: &[&CStr],
    ) -> VulkanResult<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extension_names: Vec<_> = extensions.iter().map(|name| name.as_ptr()).collect();

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(true)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| match e {
            vk::Result::ERROR_EXTENSION_NOT_PRESENT => VulkanError::MissingExtension {
                name: format!("{extensions:?}"),
            },
            vk::Result::ERROR_FEATURE_NOT_PRESENT => VulkanError::MissingFeature {
                name: "samplerAnisotropy".to_string(),
            },
            other => VulkanError::Api(other),
        })?;

        let (graphics_queue, present_queue, transfer_queue) = unsafe {
            (
                device.get_device_queue(families.graphics, 0),
                device.get_device_queue(families.present, 0),
                device.get_device_queue(families.transfer, 0),
            )
        };

        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            transfer_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// The selected GPU: logical device, queues and cached capabilities.
///
/// Fields drop in declaration order, so the command pool goes before the
/// device it was created from.
pub struct Device {
    graphics_command_pool: CommandPool,
    logical: LogicalDevice,
    physical: PhysicalDeviceInfo,
    swapchain_support: SwapchainSupport,
    instance: Instance,
}

/// Run `query` on every handle, logging and dropping the ones that fail
fn query_each<H: Copy, T>(handles: &[H], mut query: impl FnMut(H) -> VulkanResult<T>) -> Vec<(H, T)> {
    handles
        .iter()
        .filter_map(|&handle| match query(handle) {
            Ok(value) => Some((handle, value)),
            Err(e) => {
                log::warn!("Skipping GPU whose capability query failed: {}", e);
                None
            }
        })
        .collect()
}

impl Device {
    /// Enumerate GPUs, select one and create the logical device
    pub fn new(
        instance: &VulkanInstance,
        surface: &Surface,
        platform: &PlatformCapabilities,
    ) -> VulkanResult<Self> {
        let raw_instance = instance.instance();
        let physical_devices =
            unsafe { raw_instance.enumerate_physical_devices() }.map_err(VulkanError::Api)?;
        if physical_devices.is_empty() {
            log::error!("No Vulkan-capable GPU found");
            return Err(VulkanError::NoSuitableDevice);
        }

        let queried = query_each(&physical_devices, |physical_device| {
            query_candidate(raw_instance, surface, physical_device)
        });
        let mut handles = Vec::with_capacity(queried.len());
        let mut candidates = Vec::with_capacity(queried.len());
        let mut supports = Vec::with_capacity(queried.len());
        for (physical_device, (candidate, support)) in queried {
            candidate.log_summary();
            handles.push(physical_device);
            candidates.push(candidate);
            supports.push(support);
        }

        let requirements = DeviceRequirements::for_platform(platform);
        let selection = select_device(&candidates, &requirements)?;
        let queue_families = selection.queues.resolve().ok_or(VulkanError::NoSuitableDevice)?;
        let handle = handles[selection.index];
        let swapchain_support = supports.swap_remove(selection.index);

        log::info!(
            "Selected GPU '{}' (graphics family {}, present family {}, transfer family {})",
            candidates[selection.index].name,
            queue_families.graphics,
            queue_families.present,
            queue_families.transfer,
        );

        let properties = unsafe { raw_instance.get_physical_device_properties(handle) };
        let features = unsafe { raw_instance.get_physical_device_features(handle) };
        let memory_properties = unsafe { raw_instance.get_physical_device_memory_properties(handle) };
        let depth_format =
            detect_depth_format(|format| unsafe { raw_instance.get_physical_device_format_properties(handle, format) })?;
        log::debug!("Depth format: {:?}", depth_format);

        let physical = PhysicalDeviceInfo {
            handle,
            properties,
            features,
            memory_properties,
            queue_families,
            depth_format,
            supports_device_local_host_visible: has_device_local_host_visible(&memory_properties),
        };

        let logical = LogicalDevice::new(
            raw_instance,
            handle,
            &queue_families,
            &platform.required_device_extensions(),
        )?;
        let graphics_command_pool = CommandPool::new(logical.device.clone(), queue_families.graphics)?;

        Ok(Self {
            graphics_command_pool,
            logical,
            physical,
            swapchain_support,
            instance: raw_instance.clone(),
        })
    }

    /// Device function table
    pub const fn handle(&self) -> &ash::Device {
        &self.logical.device
    }

    /// Physical device capabilities
    pub const fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Queue families in use
    pub const fn queue_families(&self) -> &QueueFamilies {
        &self.physical.queue_families
    }

    /// Graphics queue
    pub const fn graphics_queue(&self) -> vk::Queue {
        self.logical.graphics_queue
    }

    /// Present queue
    pub const fn present_queue(&self) -> vk::Queue {
        self.logical.present_queue
    }

    /// Transfer queue
    pub const fn transfer_queue(&self) -> vk::Queue {
        self.logical.transfer_queue
    }

    /// Swapchain extension loader
    pub const fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.logical.swapchain_loader
    }

    /// Command pool on the graphics family
    pub const fn command_pool(&self) -> &CommandPool {
        &self.graphics_command_pool
    }

    /// Memory types and heaps
    pub const fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical.memory_properties
    }

    /// Detected depth format
    pub const fn depth_format(&self) -> vk::Format {
        self.physical.depth_format
    }

    /// Cached swapchain-support descriptor
    pub const fn swapchain_support(&self) -> &SwapchainSupport {
        &self.swapchain_support
    }

    /// Re-query surface capabilities, formats and present modes
    pub fn refresh_swapchain_support(&mut self, surface: &Surface) -> VulkanResult<&SwapchainSupport> {
        self.swapchain_support = surface.query_support(self.physical.handle)?;
        Ok(&self.swapchain_support)
    }

    /// Format features of `format` on this device
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical.handle, format)
        }
    }

    /// Largest anisotropy the sampler may use, or 1.0 when disabled
    pub fn max_sampler_anisotropy(&self) -> f32 {
        if self.physical.features.sampler_anisotropy == vk::TRUE {
            self.physical.properties.limits.max_sampler_anisotropy
        } else {
            1.0
        }
    }

    /// Block until all queues are idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.logical.device.device_wait_idle() }.map_err(VulkanError::Api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(types: &[vk::MemoryPropertyFlags], heaps: &[(u64, vk::MemoryHeapFlags)]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        for (i, &flags) in types.iter().enumerate() {
            properties.memory_types[i].property_flags = flags;
        }
        for (i, &(size, flags)) in heaps.iter().enumerate() {
            properties.memory_heaps[i] = vk::MemoryHeap { size, flags };
        }
        properties.memory_type_count = types.len() as u32;
        properties.memory_heap_count = heaps.len() as u32;
        properties
    }

    #[test]
    fn test_failed_query_skips_only_that_device() {
        let queried = query_each(&[0_u32, 1, 2], |handle| {
            if handle == 1 {
                Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))
            } else {
                Ok(handle * 10)
            }
        });
        assert_eq!(queried, vec![(0, 0), (2, 20)]);

        let none: Vec<(u32, u32)> = query_each(&[7_u32], |_| Err(VulkanError::NoSuitableDevice));
        assert!(none.is_empty());
    }

    #[test]
    fn test_device_local_heaps() {
        let properties = memory_properties(
            &[],
            &[
                (8 << 30, vk::MemoryHeapFlags::DEVICE_LOCAL),
                (16 << 30, vk::MemoryHeapFlags::empty()),
                (256 << 20, vk::MemoryHeapFlags::DEVICE_LOCAL),
            ],
        );
        assert_eq!(device_local_heaps(&properties), vec![8 << 30, 256 << 20]);
    }

    #[test]
    fn test_device_local_host_visible_detection() {
        let discrete = memory_properties(
            &[
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ],
            &[],
        );
        assert!(!has_device_local_host_visible(&discrete));

        let resizable_bar = memory_properties(
            &[vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE],
            &[],
        );
        assert!(has_device_local_host_visible(&resizable_bar));
    }
}
