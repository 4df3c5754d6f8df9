//! Swapchain ownership and recreation
//!
//! The manager is the only owner of the swapchain images, their views, the
//! framebuffers and the depth attachment. Everything else borrows handles for
//! the duration of a frame.

use ash::vk;

use super::device::Device;
use super::framebuffer::{DepthBuffer, Framebuffer};
use super::surface::Surface;
use super::swapchain::{choose_extent, Swapchain, SwapchainLifecycle, SwapchainParams, SwapchainState};
use super::sync::Semaphore;
use super::{VulkanError, VulkanResult};
use crate::config::PresentModePreference;
use crate::render::frame::{AcquireOutcome, PresentOutcome, RecreateOutcome};

/// Owner of the swapchain and the resources sized by it
pub struct SwapchainManager {
    framebuffers: Vec<Framebuffer>,
    depth: Option<DepthBuffer>,
    swapchain: Option<Swapchain>,
    render_pass: vk::RenderPass,
    surface_format: vk::SurfaceFormatKHR,
    present_preference: PresentModePreference,
    lifecycle: SwapchainLifecycle,
}

impl SwapchainManager {
    /// Create the first swapchain.
    ///
    /// The color format chosen here is kept for the manager's lifetime so the
    /// render pass built from it stays compatible across rebuilds.
    pub fn new(
        device: &mut Device,
        surface: &Surface,
        preferred_format: vk::SurfaceFormatKHR,
        present_preference: PresentModePreference,
        drawable: (u32, u32),
    ) -> VulkanResult<Self> {
        let support = device.refresh_swapchain_support(surface)?.clone();
        let params = SwapchainParams::resolve(&support, preferred_format, present_preference, drawable)?;
        if params.extent.width == 0 || params.extent.height == 0 {
            return Err(VulkanError::InitializationFailed(
                "cannot create a swapchain for a zero-area surface".to_string(),
            ));
        }

        let swapchain = Swapchain::new(device, surface.handle(), &support.capabilities, params, None)?;

        Ok(Self {
            framebuffers: Vec::new(),
            depth: None,
            swapchain: Some(swapchain),
            render_pass: vk::RenderPass::null(),
            surface_format: params.surface_format,
            present_preference,
            lifecycle: SwapchainLifecycle::new(),
        })
    }

    /// Build depth and framebuffers for `render_pass` and mark the swapchain ready
    pub fn attach_render_pass(&mut self, device: &Device, render_pass: vk::RenderPass) -> VulkanResult<u64> {
        self.render_pass = render_pass;
        self.build_targets(device)?;
        let generation = self.lifecycle.mark_ready();
        log::debug!("Swapchain generation {} ready", generation);
        Ok(generation)
    }

    fn build_targets(&mut self, device: &Device) -> VulkanResult<()> {
        let swapchain = self.swapchain.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "no swapchain to build framebuffers for".to_string(),
        })?;
        let extent = swapchain.extent();

        let depth = DepthBuffer::new(
            device.handle(),
            device.memory_properties(),
            device.depth_format(),
            extent,
        )?;

        let mut framebuffers = Vec::with_capacity(swapchain.image_count());
        for index in 0..swapchain.image_count() {
            let color = swapchain.image_view(index).ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("swapchain image {index} has no view"),
            })?;
            framebuffers.push(Framebuffer::new(
                device.handle().clone(),
                self.render_pass,
                &[color, depth.image_view()],
                extent,
            )?);
        }

        self.depth = Some(depth);
        self.framebuffers = framebuffers;
        Ok(())
    }

    fn release_targets(&mut self) {
        self.framebuffers.clear();
        self.depth = None;
    }

    /// Rebuild against the current surface.
    ///
    /// Waits for the device to go idle, releases the per-image resources and
    /// creates a new swapchain from the old one. A zero-area surface defers
    /// the rebuild without touching anything.
    pub fn recreate(
        &mut self,
        device: &mut Device,
        surface: &Surface,
        drawable: (u32, u32),
    ) -> VulkanResult<RecreateOutcome> {
        if self.lifecycle.state() == SwapchainState::Destroyed {
            return Err(VulkanError::InvalidOperation {
                reason: "swapchain already destroyed".to_string(),
            });
        }
        self.lifecycle.mark_stale();

        let capabilities = surface.capabilities(device.physical().handle)?;
        let extent = choose_extent(&capabilities, drawable);
        if extent.width == 0 || extent.height == 0 {
            log::debug!("Surface has zero area, swapchain rebuild deferred");
            return Ok(RecreateOutcome::Deferred);
        }

        device.wait_idle()?;
        self.release_targets();

        let support = device.refresh_swapchain_support(surface)?.clone();
        let params = SwapchainParams::resolve(&support, self.surface_format, self.present_preference, drawable)?;
        if params.surface_format != self.surface_format {
            return Err(VulkanError::UnsupportedFormat {
                format: self.surface_format.format,
                reason: "surface no longer offers the swapchain format".to_string(),
            });
        }

        // The old swapchain is retired by the new one and destroyed after it exists
        let swapchain = Swapchain::new(
            device,
            surface.handle(),
            &support.capabilities,
            params,
            self.swapchain.as_ref(),
        )?;
        self.swapchain = Some(swapchain);
        self.build_targets(device)?;

        let generation = self.lifecycle.mark_ready();
        log::info!(
            "Swapchain recreated: {}x{}, generation {}",
            params.extent.width,
            params.extent.height,
            generation
        );
        Ok(RecreateOutcome::Recreated { generation })
    }

    /// Acquire the next image, signaling `signal` when it is ready
    pub fn acquire_next_image(&mut self, signal: &Semaphore) -> VulkanResult<AcquireOutcome> {
        let swapchain = self.ready_swapchain()?;
        let result = unsafe {
            swapchain
                .loader()
                .acquire_next_image(swapchain.handle(), u64::MAX, signal.handle(), vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => {
                if suboptimal {
                    self.lifecycle.mark_stale();
                }
                Ok(AcquireOutcome::Acquired {
                    image_index,
                    suboptimal,
                })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.lifecycle.mark_stale();
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Queue `image_index` for presentation after `wait` is signaled
    pub fn present(&mut self, queue: vk::Queue, image_index: u32, wait: &Semaphore) -> VulkanResult<PresentOutcome> {
        let swapchain = self.ready_swapchain()?;
        let wait_semaphores = [wait.handle()];
        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { swapchain.loader().queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                self.lifecycle.mark_stale();
                Ok(PresentOutcome::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.lifecycle.mark_stale();
                Ok(PresentOutcome::OutOfDate)
            }
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    fn ready_swapchain(&self) -> VulkanResult<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "swapchain not available".to_string(),
        })
    }

    /// Framebuffer for swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Framebuffer::handle)
    }

    /// Current image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map_or(vk::Extent2D { width: 0, height: 0 }, Swapchain::extent)
    }

    /// Color format shared by every generation
    pub const fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Lifecycle state and generation
    pub const fn lifecycle(&self) -> &SwapchainLifecycle {
        &self.lifecycle
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    /// Release everything in reverse creation order. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.lifecycle.mark_destroyed() {
            self.release_targets();
            self.swapchain = None;
            log::debug!("Swapchain destroyed");
        }
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
