//! Physical device scoring and queue-family mapping
//!
//! Everything here works on plain snapshots of what a physical device reports,
//! so selection is deterministic and can be tested without a GPU. The Vulkan
//! queries that fill the snapshots live in [`super::device`].

use std::fmt;

use ash::vk;
use bitflags::bitflags;

use super::{VulkanError, VulkanResult};
use crate::platform::PlatformCapabilities;

bitflags! {
    /// Queue roles a device must provide
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct QueueRoles: u8 {
        /// Graphics commands
        const GRAPHICS = 1;
        /// Presentation to the window surface
        const PRESENT = 1 << 1;
        /// Transfer (copy) commands
        const TRANSFER = 1 << 2;
        /// Compute dispatches
        const COMPUTE = 1 << 3;
    }
}

/// What one queue family offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyCaps {
    /// Capability flags reported by the driver
    pub flags: vk::QueueFlags,
    /// Number of queues in the family
    pub queue_count: u32,
    /// Whether the family can present to the target surface
    pub supports_present: bool,
}

impl QueueFamilyCaps {
    /// Capabilities a transfer-capable family exposes besides transfer.
    /// Lower means more likely to be a dedicated DMA queue.
    pub fn transfer_score(&self) -> u32 {
        u32::from(self.flags.contains(vk::QueueFlags::GRAPHICS))
            + u32::from(self.flags.contains(vk::QueueFlags::COMPUTE))
    }
}

/// Queue family chosen for each role, if any
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Graphics family
    pub graphics: Option<u32>,
    /// Present family
    pub present: Option<u32>,
    /// Transfer family
    pub transfer: Option<u32>,
    /// Compute family
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// Roles that were resolved
    pub fn roles(&self) -> QueueRoles {
        let mut roles = QueueRoles::empty();
        roles.set(QueueRoles::GRAPHICS, self.graphics.is_some());
        roles.set(QueueRoles::PRESENT, self.present.is_some());
        roles.set(QueueRoles::TRANSFER, self.transfer.is_some());
        roles.set(QueueRoles::COMPUTE, self.compute.is_some());
        roles
    }

    /// The three families the renderer uses, once all are known
    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
            transfer: self.transfer?,
        })
    }
}

/// Resolved graphics, present and transfer families (may alias)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics family
    pub graphics: u32,
    /// Present family
    pub present: u32,
    /// Transfer family
    pub transfer: u32,
}

impl QueueFamilies {
    /// Distinct family indices in ascending order
    pub fn unique(&self) -> Vec<u32> {
        let mut families = vec![self.graphics, self.present, self.transfer];
        families.sort_unstable();
        families.dedup();
        families
    }

    /// Whether graphics and present live on different families
    pub const fn split_present(&self) -> bool {
        self.graphics != self.present
    }
}

/// Map queue roles onto the families of one device.
///
/// - Graphics: the first family that both draws and presents, otherwise the
///   first graphics family.
/// - Present: the graphics family when it presents, otherwise the first
///   present-capable family.
/// - Transfer: the transfer family with the lowest [`transfer_score`]
///   (earliest wins ties). Falls back to the graphics family, whose queues
///   always accept transfer work.
/// - Compute: the first compute family.
///
/// [`transfer_score`]: QueueFamilyCaps::transfer_score
pub fn find_queue_families(families: &[QueueFamilyCaps]) -> QueueFamilyIndices {
    let usable = || {
        families
            .iter()
            .enumerate()
            .filter(|(_, family)| family.queue_count > 0)
            .filter_map(|(index, family)| u32::try_from(index).ok().map(|index| (index, family)))
    };

    let mut indices = QueueFamilyIndices::default();

    let has_graphics = |family: &QueueFamilyCaps| family.flags.contains(vk::QueueFlags::GRAPHICS);
    indices.graphics = usable()
        .find(|&(_, family)| has_graphics(family) && family.supports_present)
        .or_else(|| usable().find(|&(_, family)| has_graphics(family)))
        .map(|(index, _)| index);

    indices.present = match indices.graphics {
        Some(graphics) if families[graphics as usize].supports_present => Some(graphics),
        _ => usable()
            .find(|(_, family)| family.supports_present)
            .map(|(index, _)| index),
    };

    if let (Some(graphics), Some(present)) = (indices.graphics, indices.present) {
        if graphics != present {
            log::warn!("Graphics family {graphics} and present family {present} differ");
        }
    }

    let mut best_transfer: Option<(u32, u32)> = None;
    for (index, family) in usable().filter(|(_, f)| f.flags.contains(vk::QueueFlags::TRANSFER)) {
        let score = family.transfer_score();
        if best_transfer.map_or(true, |(_, best)| score < best) {
            best_transfer = Some((index, score));
        }
    }
    indices.transfer = best_transfer.map(|(index, _)| index).or(indices.graphics);

    indices.compute = usable()
        .find(|(_, family)| family.flags.contains(vk::QueueFlags::COMPUTE))
        .map(|(index, _)| index);

    indices
}

/// Snapshot of one physical device
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Device name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// Supported API version
    pub api_version: u32,
    /// Driver version (vendor encoded)
    pub driver_version: u32,
    /// Queue families in driver order
    pub queue_families: Vec<QueueFamilyCaps>,
    /// Supported device extension names
    pub extensions: Vec<String>,
    /// Whether anisotropic sampling is supported
    pub sampler_anisotropy: bool,
    /// Number of surface formats offered for the target surface
    pub surface_format_count: usize,
    /// Number of present modes offered for the target surface
    pub present_mode_count: usize,
    /// Sizes of device-local memory heaps in bytes
    pub device_local_heaps: Vec<u64>,
}

impl DeviceCandidate {
    /// Log the candidate's identity and memory at info level
    pub fn log_summary(&self) {
        log::info!(
            "GPU candidate '{}' ({:?}) driver {}.{}.{} API {}.{}.{}",
            self.name,
            self.device_type,
            vk::api_version_major(self.driver_version),
            vk::api_version_minor(self.driver_version),
            vk::api_version_patch(self.driver_version),
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        );
        for (heap, size) in self.device_local_heaps.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let gib = *size as f64 / f64::from(1u32 << 30);
            log::info!("  device-local heap {heap}: {gib:.2} GiB");
        }
    }
}

/// What a device must offer to be selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequirements {
    /// Queue roles that must be resolvable
    pub roles: QueueRoles,
    /// Anisotropic sampling must be supported
    pub sampler_anisotropy: bool,
    /// Only discrete GPUs qualify
    pub discrete_gpu: bool,
    /// Device extensions that must be present
    pub extensions: Vec<String>,
}

impl DeviceRequirements {
    /// Requirements of the renderer on the given platform
    pub fn for_platform(platform: &PlatformCapabilities) -> Self {
        Self {
            roles: QueueRoles::GRAPHICS | QueueRoles::PRESENT | QueueRoles::TRANSFER,
            sampler_anisotropy: true,
            discrete_gpu: platform.prefer_discrete_gpu,
            extensions: platform
                .required_device_extensions()
                .iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect(),
        }
    }

    /// Same requirements with any GPU type accepted
    #[must_use]
    pub fn relaxed(&self) -> Self {
        Self {
            discrete_gpu: false,
            ..self.clone()
        }
    }
}

/// Why a candidate was not selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Discrete GPU required
    NotDiscrete,
    /// Some queue roles could not be mapped
    MissingQueueRoles(QueueRoles),
    /// A required extension is absent
    MissingExtension(String),
    /// Anisotropic sampling unsupported
    NoSamplerAnisotropy,
    /// No surface formats or no present modes
    InadequateSwapchainSupport,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDiscrete => write!(f, "not a discrete GPU"),
            Self::MissingQueueRoles(roles) => write!(f, "missing queue roles {roles:?}"),
            Self::MissingExtension(name) => write!(f, "missing extension {name}"),
            Self::NoSamplerAnisotropy => write!(f, "no sampler anisotropy"),
            Self::InadequateSwapchainSupport => write!(f, "no surface formats or present modes"),
        }
    }
}

/// Check one candidate against the requirements
pub fn evaluate_candidate(
    candidate: &DeviceCandidate,
    requirements: &DeviceRequirements,
) -> Result<QueueFamilyIndices, Rejection> {
    if requirements.discrete_gpu && candidate.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
        return Err(Rejection::NotDiscrete);
    }

    let indices = find_queue_families(&candidate.queue_families);
    let missing = requirements.roles.difference(indices.roles());
    if !missing.is_empty() {
        return Err(Rejection::MissingQueueRoles(missing));
    }

    if let Some(name) = requirements
        .extensions
        .iter()
        .find(|required| !candidate.extensions.contains(required))
    {
        return Err(Rejection::MissingExtension(name.clone()));
    }

    if candidate.surface_format_count == 0 || candidate.present_mode_count == 0 {
        return Err(Rejection::InadequateSwapchainSupport);
    }

    if requirements.sampler_anisotropy && !candidate.sampler_anisotropy {
        return Err(Rejection::NoSamplerAnisotropy);
    }

    Ok(indices)
}

/// The chosen device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSelection {
    /// Index into the candidate list
    pub index: usize,
    /// Queue mapping for that device
    pub queues: QueueFamilyIndices,
    /// Whether the discrete-GPU requirement had to be dropped
    pub relaxed_discrete: bool,
}

fn first_qualifying(
    candidates: &[DeviceCandidate],
    requirements: &DeviceRequirements,
) -> Option<(usize, QueueFamilyIndices)> {
    candidates
        .iter()
        .enumerate()
        .find_map(|(index, candidate)| match evaluate_candidate(candidate, requirements) {
            Ok(queues) => Some((index, queues)),
            Err(reason) => {
                log::debug!("Rejected GPU '{}': {reason}", candidate.name);
                None
            }
        })
}

/// Pick the first qualifying candidate in enumeration order.
///
/// When a discrete GPU is required and none qualifies, the search runs once
/// more accepting any device type.
pub fn select_device(
    candidates: &[DeviceCandidate],
    requirements: &DeviceRequirements,
) -> VulkanResult<DeviceSelection> {
    if let Some((index, queues)) = first_qualifying(candidates, requirements) {
        return Ok(DeviceSelection {
            index,
            queues,
            relaxed_discrete: false,
        });
    }

    if requirements.discrete_gpu {
        log::info!("No discrete GPU qualifies, retrying with any device type");
        if let Some((index, queues)) = first_qualifying(candidates, &requirements.relaxed()) {
            return Ok(DeviceSelection {
                index,
                queues,
                relaxed_discrete: true,
            });
        }
    }

    Err(VulkanError::NoSuitableDevice)
}

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate usable as a depth attachment with linear or optimal tiling
pub fn detect_depth_format(
    mut format_properties: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> VulkanResult<vk::Format> {
    let attachment = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
    DEPTH_FORMAT_CANDIDATES
        .into_iter()
        .find(|&format| {
            let properties = format_properties(format);
            properties.linear_tiling_features.contains(attachment)
                || properties.optimal_tiling_features.contains(attachment)
        })
        .ok_or_else(|| VulkanError::UnsupportedFormat {
            format: vk::Format::UNDEFINED,
            reason: "no depth-stencil attachment format available".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPHICS_ALL: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::GRAPHICS.as_raw()
            | vk::QueueFlags::COMPUTE.as_raw()
            | vk::QueueFlags::TRANSFER.as_raw(),
    );
    const COMPUTE_TRANSFER: vk::QueueFlags =
        vk::QueueFlags::from_raw(vk::QueueFlags::COMPUTE.as_raw() | vk::QueueFlags::TRANSFER.as_raw());

    fn family(flags: vk::QueueFlags, present: bool) -> QueueFamilyCaps {
        QueueFamilyCaps {
            flags,
            queue_count: 1,
            supports_present: present,
        }
    }

    fn candidate(name: &str, device_type: vk::PhysicalDeviceType) -> DeviceCandidate {
        DeviceCandidate {
            name: name.to_string(),
            device_type,
            api_version: vk::API_VERSION_1_2,
            driver_version: 0,
            queue_families: vec![family(GRAPHICS_ALL, true)],
            extensions: vec!["VK_KHR_swapchain".to_string()],
            sampler_anisotropy: true,
            surface_format_count: 2,
            present_mode_count: 1,
            device_local_heaps: vec![1 << 30],
        }
    }

    fn requirements(discrete: bool) -> DeviceRequirements {
        DeviceRequirements {
            roles: QueueRoles::GRAPHICS | QueueRoles::PRESENT | QueueRoles::TRANSFER,
            sampler_anisotropy: true,
            discrete_gpu: discrete,
            extensions: vec!["VK_KHR_swapchain".to_string()],
        }
    }

    #[test]
    fn test_single_family_aliases_every_role() {
        let indices = find_queue_families(&[family(GRAPHICS_ALL, true)]);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(indices.transfer, Some(0));
        assert_eq!(indices.compute, Some(0));
        assert_eq!(indices.resolve().unwrap().unique(), vec![0]);
    }

    #[test]
    fn test_dedicated_transfer_family_preferred() {
        let indices = find_queue_families(&[
            family(GRAPHICS_ALL, true),
            family(COMPUTE_TRANSFER, false),
            family(vk::QueueFlags::TRANSFER, false),
        ]);
        assert_eq!(indices.transfer, Some(2));
        assert_eq!(indices.compute, Some(0));
    }

    #[test]
    fn test_transfer_tie_keeps_earliest() {
        let indices = find_queue_families(&[
            family(GRAPHICS_ALL, true),
            family(vk::QueueFlags::TRANSFER, false),
            family(vk::QueueFlags::TRANSFER, false),
        ]);
        assert_eq!(indices.transfer, Some(1));
    }

    #[test]
    fn test_transfer_falls_back_to_graphics() {
        let indices = find_queue_families(&[family(vk::QueueFlags::GRAPHICS, true)]);
        assert_eq!(indices.transfer, Some(0));
    }

    #[test]
    fn test_graphics_prefers_family_that_presents() {
        let indices = find_queue_families(&[
            family(GRAPHICS_ALL, false),
            family(GRAPHICS_ALL, true),
        ]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(1));
    }

    #[test]
    fn test_present_second_pass() {
        let indices = find_queue_families(&[
            family(GRAPHICS_ALL, false),
            family(vk::QueueFlags::TRANSFER, false),
            family(vk::QueueFlags::COMPUTE, true),
        ]);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(2));
        assert!(indices.resolve().unwrap().split_present());
    }

    #[test]
    fn test_empty_families_ignored() {
        let mut empty = family(GRAPHICS_ALL, true);
        empty.queue_count = 0;
        let indices = find_queue_families(&[empty, family(GRAPHICS_ALL, true)]);
        assert_eq!(indices.graphics, Some(1));
    }

    #[test]
    fn test_rejections() {
        let req = requirements(false);

        let mut no_ext = candidate("a", vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_ext.extensions.clear();
        assert_eq!(
            evaluate_candidate(&no_ext, &req),
            Err(Rejection::MissingExtension("VK_KHR_swapchain".to_string()))
        );

        let mut no_present = candidate("b", vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_present.queue_families = vec![family(GRAPHICS_ALL, false)];
        assert_eq!(
            evaluate_candidate(&no_present, &req),
            Err(Rejection::MissingQueueRoles(QueueRoles::PRESENT))
        );

        let mut no_formats = candidate("c", vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_formats.surface_format_count = 0;
        assert_eq!(
            evaluate_candidate(&no_formats, &req),
            Err(Rejection::InadequateSwapchainSupport)
        );

        let mut no_aniso = candidate("d", vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_aniso.sampler_anisotropy = false;
        assert_eq!(evaluate_candidate(&no_aniso, &req), Err(Rejection::NoSamplerAnisotropy));

        let integrated = candidate("e", vk::PhysicalDeviceType::INTEGRATED_GPU);
        assert_eq!(
            evaluate_candidate(&integrated, &requirements(true)),
            Err(Rejection::NotDiscrete)
        );
    }

    #[test]
    fn test_discrete_preferred_over_earlier_integrated() {
        let candidates = vec![
            candidate("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU),
            candidate("discrete", vk::PhysicalDeviceType::DISCRETE_GPU),
        ];
        let selection = select_device(&candidates, &requirements(true)).unwrap();
        assert_eq!(selection.index, 1);
        assert!(!selection.relaxed_discrete);
    }

    #[test]
    fn test_relaxed_retry_when_no_discrete() {
        let candidates = vec![
            candidate("cpu", vk::PhysicalDeviceType::CPU),
            candidate("integrated", vk::PhysicalDeviceType::INTEGRATED_GPU),
        ];
        let selection = select_device(&candidates, &requirements(true)).unwrap();
        assert_eq!(selection.index, 0);
        assert!(selection.relaxed_discrete);
    }

    #[test]
    fn test_no_suitable_device() {
        let mut unusable = candidate("x", vk::PhysicalDeviceType::DISCRETE_GPU);
        unusable.sampler_anisotropy = false;
        assert!(matches!(
            select_device(&[unusable], &requirements(true)),
            Err(VulkanError::NoSuitableDevice)
        ));
        assert!(matches!(
            select_device(&[], &requirements(false)),
            Err(VulkanError::NoSuitableDevice)
        ));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let build = || {
            vec![
                candidate("a", vk::PhysicalDeviceType::INTEGRATED_GPU),
                candidate("b", vk::PhysicalDeviceType::DISCRETE_GPU),
                candidate("c", vk::PhysicalDeviceType::DISCRETE_GPU),
            ]
        };
        let first = select_device(&build(), &requirements(true)).unwrap();
        for _ in 0..10 {
            assert_eq!(select_device(&build(), &requirements(true)).unwrap(), first);
        }
        assert_eq!(first.index, 1);
    }

    #[test]
    fn test_platform_requirements() {
        let req = DeviceRequirements::for_platform(&PlatformCapabilities::portability());
        assert!(!req.discrete_gpu);
        assert!(req.extensions.iter().any(|e| e == "VK_KHR_portability_subset"));
        assert!(req.roles.contains(QueueRoles::TRANSFER));
    }

    #[test]
    fn test_depth_format_preference_order() {
        let supported = |format: vk::Format| vk::FormatProperties {
            optimal_tiling_features: if format == vk::Format::D24_UNORM_S8_UINT {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            },
            ..Default::default()
        };
        assert_eq!(detect_depth_format(supported).unwrap(), vk::Format::D24_UNORM_S8_UINT);

        let everything = |_: vk::Format| vk::FormatProperties {
            linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        };
        assert_eq!(detect_depth_format(everything).unwrap(), vk::Format::D32_SFLOAT);

        assert!(detect_depth_format(|_: vk::Format| vk::FormatProperties::default()).is_err());
    }
}
