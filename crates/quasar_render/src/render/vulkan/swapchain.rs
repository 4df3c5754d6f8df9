//! Swapchain creation and lifecycle
//!
//! The choosers at the top are pure functions over what the surface reports.
//! [`Swapchain`] owns the `VkSwapchainKHR` and the color views of its images;
//! size-dependent attachments live in the swapchain manager.

use ash::vk;

use super::device::Device;
use super::image::ImageView;
use super::surface::SwapchainSupport;
use super::{VulkanError, VulkanResult};
use crate::config::PresentModePreference;

/// Preferred format if offered, otherwise the first candidate
pub fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|format| format.format == preferred.format && format.color_space == preferred.color_space)
        .or_else(|| available.first().copied())
}

/// Preferred mode if offered, otherwise FIFO (always supported)
pub fn choose_present_mode(available: &[vk::PresentModeKHR], preference: PresentModePreference) -> vk::PresentModeKHR {
    let preferred = preference.preferred_mode();
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or the drawable size clamped to the
/// surface limits when the current extent is undefined (`u32::MAX`)
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, drawable: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: drawable.0.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: drawable.1.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// `min + 1`, clamped to `max` unless `max` is 0 (unbounded)
pub const fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && desired > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        desired
    }
}

/// Lifecycle of the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    /// Not created yet
    Uninitialized,
    /// Images match the surface
    Ready,
    /// Surface changed; recreation pending
    Stale,
    /// Torn down
    Destroyed,
}

/// State machine plus the generation counter
#[derive(Debug, Clone, Copy)]
pub struct SwapchainLifecycle {
    state: SwapchainState,
    generation: u64,
}

impl Default for SwapchainLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapchainLifecycle {
    /// Start uninitialized at generation 0
    pub const fn new() -> Self {
        Self {
            state: SwapchainState::Uninitialized,
            generation: 0,
        }
    }

    /// Current state
    pub const fn state(&self) -> SwapchainState {
        self.state
    }

    /// Number of successful creations so far
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether recreation is pending
    pub fn is_stale(&self) -> bool {
        self.state == SwapchainState::Stale
    }

    /// Record that the surface no longer matches. Returns `true` on the
    /// `Ready -> Stale` transition; repeated signals are absorbed.
    pub fn mark_stale(&mut self) -> bool {
        if self.state == SwapchainState::Ready {
            self.state = SwapchainState::Stale;
            true
        } else {
            false
        }
    }

    /// Record a successful (re)creation and return the new generation
    pub fn mark_ready(&mut self) -> u64 {
        self.generation += 1;
        self.state = SwapchainState::Ready;
        self.generation
    }

    /// Record teardown. Returns `false` if already destroyed.
    pub fn mark_destroyed(&mut self) -> bool {
        if self.state == SwapchainState::Destroyed {
            false
        } else {
            self.state = SwapchainState::Destroyed;
            true
        }
    }
}

/// Sharing mode and the families that share the images
pub fn image_sharing(graphics_family: u32, present_family: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, vec![graphics_family, present_family])
    }
}

/// Parameters resolved for one swapchain build
#[derive(Debug, Clone, Copy)]
pub struct SwapchainParams {
    /// Color format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Present mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Requested minimum image count
    pub image_count: u32,
}

impl SwapchainParams {
    /// Resolve parameters from the current support descriptor
    pub fn resolve(
        support: &SwapchainSupport,
        preferred_format: vk::SurfaceFormatKHR,
        present_preference: PresentModePreference,
        drawable: (u32, u32),
    ) -> VulkanResult<Self> {
        let surface_format = choose_surface_format(&support.formats, preferred_format).ok_or_else(|| {
            VulkanError::InitializationFailed("surface reports no formats".to_string())
        })?;

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes, present_preference),
            extent: choose_extent(&support.capabilities, drawable),
            image_count: choose_image_count(&support.capabilities),
        })
    }
}

/// `VkSwapchainKHR` with one color view per image
pub struct Swapchain {
    image_views: Vec<ImageView>,
    images: Vec<vk::Image>,
    loader: ash::extensions::khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    params: SwapchainParams,
}

impl Swapchain {
    /// Create a swapchain, retiring `old_swapchain` if one is passed
    pub fn new(
        device: &Device,
        surface: vk::SurfaceKHR,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        params: SwapchainParams,
        old_swapchain: Option<&Self>,
    ) -> VulkanResult<Self> {
        let families = device.queue_families();
        let (sharing_mode, family_indices) = image_sharing(families.graphics, families.present);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(params.image_count)
            .image_format(params.surface_format.format)
            .image_color_space(params.surface_format.color_space)
            .image_extent(params.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(params.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain.map_or_else(vk::SwapchainKHR::null, |old| old.swapchain));

        let loader = device.swapchain_loader().clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }.map_err(VulkanError::Api)?;

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(VulkanError::Api(e));
            }
        };

        // Views are pushed one by one so a failure drops the ones already made
        let mut built = Self {
            image_views: Vec::with_capacity(images.len()),
            images,
            loader,
            swapchain,
            params,
        };
        for &image in &built.images {
            built.image_views.push(ImageView::new(
                device.handle().clone(),
                image,
                params.surface_format.format,
                vk::ImageAspectFlags::COLOR,
                1,
            )?);
        }

        log::info!(
            "Swapchain created: {:?} {:?}, {:?}, {}x{}, {} images",
            params.surface_format.format,
            params.surface_format.color_space,
            params.present_mode,
            params.extent.width,
            params.extent.height,
            built.images.len(),
        );
        Ok(built)
    }

    /// Swapchain handle
    pub const fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Extension loader
    pub const fn loader(&self) -> &ash::extensions::khr::Swapchain {
        &self.loader
    }

    /// Image extent
    pub const fn extent(&self) -> vk::Extent2D {
        self.params.extent
    }

    /// Color format and color space
    pub const fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.params.surface_format
    }

    /// Present mode in use
    pub const fn present_mode(&self) -> vk::PresentModeKHR {
        self.params.present_mode
    }

    /// Number of images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Color view of image `index`
    pub fn image_view(&self, index: usize) -> Option<vk::ImageView> {
        self.image_views.get(index).map(ImageView::handle)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.image_views.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn srgb() -> vk::SurfaceFormatKHR {
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)
    }

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D { width: 800, height: 600 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn test_preferred_format_selected() {
        let available = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            srgb(),
        ];
        assert_eq!(choose_surface_format(&available, srgb()), Some(srgb()));
    }

    #[test]
    fn test_format_falls_back_to_first() {
        let first = format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let available = [
            first,
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&available, srgb()), Some(first));
        assert_eq!(choose_surface_format(&[], srgb()), None);
    }

    #[test]
    fn test_present_mode_selection() {
        let with_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&with_mailbox, PresentModePreference::LowLatency),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&with_mailbox, PresentModePreference::Fifo),
            vk::PresentModeKHR::FIFO
        );

        let without = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&without, PresentModePreference::LowLatency),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn test_extent_uses_current_extent() {
        let extent = choose_extent(&capabilities(2, 3), (1920, 1080));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_extent_clamps_undefined_extent() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        caps.max_image_extent = vk::Extent2D { width: 1024, height: 768 };

        let extent = choose_extent(&caps, (1920, 500));
        assert_eq!((extent.width, extent.height), (1024, 500));
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&capabilities(2, 0)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3)), 3);
    }

    #[test]
    fn test_lifecycle_generation() {
        let mut lifecycle = SwapchainLifecycle::new();
        assert_eq!(lifecycle.state(), SwapchainState::Uninitialized);
        assert!(!lifecycle.mark_stale());

        assert_eq!(lifecycle.mark_ready(), 1);
        assert!(lifecycle.mark_stale());
        assert_eq!(lifecycle.mark_ready(), 2);
        assert_eq!(lifecycle.state(), SwapchainState::Ready);
    }

    #[test]
    fn test_repeated_stale_signals_coalesce() {
        let mut lifecycle = SwapchainLifecycle::new();
        lifecycle.mark_ready();

        assert!(lifecycle.mark_stale());
        assert!(!lifecycle.mark_stale());
        assert!(lifecycle.is_stale());

        assert_eq!(lifecycle.mark_ready(), 2);
        assert!(!lifecycle.is_stale());
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut lifecycle = SwapchainLifecycle::new();
        lifecycle.mark_ready();
        assert!(lifecycle.mark_destroyed());
        assert!(!lifecycle.mark_destroyed());
        assert!(!lifecycle.mark_stale());
        assert_eq!(lifecycle.state(), SwapchainState::Destroyed);
    }

    #[test]
    fn test_sharing_mode() {
        assert_eq!(image_sharing(0, 0), (vk::SharingMode::EXCLUSIVE, Vec::new()));
        assert_eq!(image_sharing(0, 2), (vk::SharingMode::CONCURRENT, vec![0, 2]));
    }
}
