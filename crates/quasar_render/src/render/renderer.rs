//! Renderer: the public face of the backend
//!
//! Owns the Vulkan context and every GPU object built on it, and runs the
//! frame protocol through [`FrameSynchronizer`]. Teardown is structural:
//! [`GpuState`] declares its fields so that dependents drop before what they
//! were created from, after one device-idle wait.

use ash::vk;

use super::frame::{
    AcquireOutcome, FrameBackend, FrameOutcome, FrameStats, FrameSynchronizer, PresentOutcome, RecreateOutcome,
};
use super::vulkan::commands::{self, DrawResources, PipelineState};
use super::vulkan::descriptor_set::{write_texture, DescriptorPool, DescriptorSetLayout};
use super::vulkan::vertex_layout::VertexInputLayout;
use super::vulkan::{
    Buffer, FramePushConstants, FrameSlot, GraphicsPipeline, RenderPass, ResourceFactory, SwapchainManager, Texture,
    VulkanContext, VulkanError, VulkanResult,
};
use super::window::Window;
use crate::assets::{MeshData, TextureData};
use crate::config::RendererConfig;
use crate::platform::PlatformCapabilities;

/// Texture descriptor sets the pool can hold at once
const MAX_TEXTURE_SETS: u32 = 16;

struct MeshBuffers {
    vertices: Buffer,
    indices: Buffer,
    index_count: u32,
}

struct BoundTexture {
    descriptor_set: vk::DescriptorSet,
    texture: Texture,
}

/// Everything that lives on the GPU, in teardown order
struct GpuState {
    mesh: Option<MeshBuffers>,
    texture: BoundTexture,
    frame_slots: Vec<FrameSlot>,
    pipeline: GraphicsPipeline,
    descriptor_pool: DescriptorPool,
    descriptor_layout: DescriptorSetLayout,
    swapchain: SwapchainManager,
    render_pass: RenderPass,
    context: VulkanContext,
    drawable: (u32, u32),
    resize_requested: bool,
    clear_color: [f32; 4],
    elapsed: f32,
}

impl Drop for GpuState {
    fn drop(&mut self) {
        if let Err(e) = self.context.device().wait_idle() {
            log::error!("Device wait failed during teardown: {}", e);
        }
        if let Err(e) = self.descriptor_pool.free(self.texture.descriptor_set) {
            log::warn!("Failed to free texture descriptor set: {}", e);
        }
    }
}

fn read_shader(path: &str) -> VulkanResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| VulkanError::Shader(format!("failed to read {path}: {e}")))
}

impl GpuState {
    fn bind_texture(
        context: &VulkanContext,
        pool: &DescriptorPool,
        layout: &DescriptorSetLayout,
        data: &TextureData,
    ) -> VulkanResult<BoundTexture> {
        let texture = ResourceFactory::new(context.device()).upload_texture(data)?;
        let descriptor_set = pool.allocate(layout)?;
        write_texture(
            context.device().handle(),
            descriptor_set,
            texture.image_view(),
            texture.sampler(),
        );
        Ok(BoundTexture {
            descriptor_set,
            texture,
        })
    }

    fn pipeline_state(&self) -> PipelineState {
        PipelineState {
            render_pass: self.render_pass.handle(),
            pipeline: self.pipeline.handle(),
            layout: self.pipeline.layout(),
            extent: self.swapchain.extent(),
            clear_color: self.clear_color,
        }
    }

    fn draw_resources(&self) -> Option<DrawResources> {
        self.mesh.as_ref().map(|mesh| DrawResources {
            vertex_buffer: mesh.vertices.handle(),
            index_buffer: mesh.indices.handle(),
            index_count: mesh.index_count,
            descriptor_set: self.texture.descriptor_set,
            push_constants: FramePushConstants::new(self.elapsed, self.swapchain.extent()),
        })
    }

    fn slot(&self, slot: usize) -> VulkanResult<&FrameSlot> {
        self.frame_slots.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {slot} out of range"),
        })
    }
}

impl FrameBackend for GpuState {
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.in_flight.wait(u64::MAX)
    }

    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
        let frame_slots = &self.frame_slots;
        let frame = frame_slots.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {slot} out of range"),
        })?;
        self.swapchain.acquire_next_image(&frame.image_available)
    }

    fn reset_slot(&mut self, slot: usize) -> VulkanResult<()> {
        self.slot(slot)?.in_flight.reset()
    }

    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
        let framebuffer = self
            .swapchain
            .framebuffer(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for swapchain image {image_index}"),
            })?;
        let state = self.pipeline_state();
        let resources = self.draw_resources();

        commands::record(
            self.context.device().handle(),
            self.slot(slot)?.command_buffer,
            framebuffer,
            &state,
            resources.as_ref(),
        )
    }

    fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = self.slot(slot)?;
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [frame.command_buffer];
        let signal_semaphores = [frame.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let device = self.context.device();
        unsafe {
            device
                .handle()
                .queue_submit(device.graphics_queue(), &[submit_info.build()], frame.in_flight.handle())
        }
        .map_err(VulkanError::Api)
    }

    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentOutcome> {
        let queue = self.context.device().present_queue();
        let frame = self.frame_slots.get(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("frame slot {slot} out of range"),
        })?;
        self.swapchain.present(queue, image_index, &frame.render_finished)
    }

    fn recreate_swapchain(&mut self) -> VulkanResult<RecreateOutcome> {
        let (device, surface) = self.context.device_and_surface();
        self.swapchain.recreate(device, surface, self.drawable)
    }

    fn surface_extent(&self) -> (u32, u32) {
        self.drawable
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.resize_requested)
    }

    fn recover_slot(&mut self, slot: usize) -> VulkanResult<()> {
        let frame = self.slot(slot)?;
        frame.in_flight.reset()?;

        // No command buffers: the batch only consumes image-available and
        // signals the fence
        let wait_semaphores = [frame.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        let device = self.context.device();
        unsafe {
            device
                .handle()
                .queue_submit(device.graphics_queue(), &[submit_info.build()], frame.in_flight.handle())
        }
        .map_err(VulkanError::Api)?;
        log::warn!("Frame slot {} released after a failed frame", slot);
        Ok(())
    }
}

/// Vulkan renderer for one window
pub struct Renderer {
    sync: FrameSynchronizer,
    gpu: Option<GpuState>,
    config: RendererConfig,
}

impl Renderer {
    /// Bring up the whole backend for `window`.
    ///
    /// Fails if no device qualifies, a required extension or feature is
    /// missing, the surface cannot be created or the shaders cannot be loaded.
    pub fn init(app_name: &str, window: &Window, mut config: RendererConfig) -> VulkanResult<Self> {
        config.application_name = app_name.to_string();
        config.validate()?;

        let platform = PlatformCapabilities::detect();
        log::info!("Initializing renderer for '{}' ({:?})", app_name, platform);

        let mut context = VulkanContext::new(window, &config, &platform)?;
        let drawable = window.framebuffer_size();

        let mut swapchain = {
            let (device, surface) = context.device_and_surface();
            SwapchainManager::new(
                device,
                surface,
                config.preferred_surface_format.surface_format(),
                config.preferred_present_mode,
                drawable,
            )?
        };

        let device = context.device();
        let render_pass = RenderPass::new_forward_pass(
            device.handle().clone(),
            swapchain.surface_format().format,
            device.depth_format(),
        )?;
        swapchain.attach_render_pass(device, render_pass.handle())?;

        let descriptor_layout = DescriptorSetLayout::texture_layout(device.handle())?;
        let descriptor_pool = DescriptorPool::new(device.handle().clone(), MAX_TEXTURE_SETS)?;

        let vertex_spirv = read_shader(&config.shaders.vertex_shader_path)?;
        let fragment_spirv = read_shader(&config.shaders.fragment_shader_path)?;
        let vertex_layout = VertexInputLayout::for_vertex();
        let pipeline = GraphicsPipeline::new(
            device.handle(),
            &vertex_spirv,
            &fragment_spirv,
            render_pass.handle(),
            descriptor_layout.handle(),
            &vertex_layout.create_info(),
        )?;

        let frame_count = u32::try_from(config.max_frames_in_flight).map_err(|_| {
            VulkanError::InitializationFailed("too many frames in flight".to_string())
        })?;
        let frame_slots = device
            .command_pool()
            .allocate_command_buffers(frame_count)?
            .into_iter()
            .map(|command_buffer| FrameSlot::new(device.handle(), command_buffer))
            .collect::<VulkanResult<Vec<_>>>()?;

        // A valid descriptor set must be bound before any texture is uploaded
        let texture = GpuState::bind_texture(
            &context,
            &descriptor_pool,
            &descriptor_layout,
            &TextureData::solid_color(1, 1, [255; 4]),
        )?;

        log::info!(
            "Renderer ready: {} frames in flight, {} swapchain images",
            frame_slots.len(),
            swapchain.image_count()
        );

        let gpu = GpuState {
            mesh: None,
            texture,
            frame_slots,
            pipeline,
            descriptor_pool,
            descriptor_layout,
            swapchain,
            render_pass,
            context,
            drawable,
            resize_requested: false,
            clear_color: config.clear_color,
            elapsed: 0.0,
        };

        Ok(Self {
            sync: FrameSynchronizer::new(config.max_frames_in_flight),
            gpu: Some(gpu),
            config,
        })
    }

    fn gpu(&mut self) -> VulkanResult<&mut GpuState> {
        self.gpu.as_mut().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "renderer has been shut down".to_string(),
        })
    }

    /// Render and present one frame, `delta_time` seconds after the last.
    ///
    /// Out-of-date swapchains and zero-area surfaces skip the frame instead
    /// of failing.
    pub fn draw_frame(&mut self, delta_time: f32) -> VulkanResult<FrameOutcome> {
        let gpu = self.gpu.as_mut().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "renderer has been shut down".to_string(),
        })?;
        gpu.elapsed += delta_time;
        self.sync.draw_frame(gpu)
    }

    /// Request a swapchain rebuild before the next frame
    pub fn resize(&mut self) {
        self.sync.request_recreate();
    }

    /// New drawable size from the window; rebuilds before the next acquire
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.drawable = (width, height);
            gpu.resize_requested = true;
        }
    }

    /// Skip frames while the window is minimized
    pub fn set_suspended(&mut self, suspended: bool) {
        if suspended != self.sync.is_suspended() {
            log::debug!("Renderer {}", if suspended { "suspended" } else { "resumed" });
        }
        self.sync.set_suspended(suspended);
    }

    /// Replace the mesh being drawn.
    ///
    /// On failure the error is logged and the previous mesh stays bound.
    pub fn upload_mesh(&mut self, mesh: &MeshData) -> VulkanResult<()> {
        let result = self.try_upload_mesh(mesh);
        if let Err(e) = &result {
            log::error!("Mesh upload failed: {}", e);
        }
        result
    }

    fn try_upload_mesh(&mut self, mesh: &MeshData) -> VulkanResult<()> {
        mesh.validate().map_err(|e| VulkanError::InvalidOperation {
            reason: e.to_string(),
        })?;
        let index_count = u32::try_from(mesh.indices.len()).map_err(|_| VulkanError::InvalidOperation {
            reason: "too many indices".to_string(),
        })?;

        let gpu = self.gpu()?;
        let factory = ResourceFactory::new(gpu.context.device());
        let vertices = factory.upload_buffer(mesh.vertex_bytes(), vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let indices = factory.upload_buffer(mesh.index_bytes(), vk::BufferUsageFlags::INDEX_BUFFER)?;

        // The old buffers may still be read by frames in flight
        gpu.context.device().wait_idle()?;
        gpu.mesh = Some(MeshBuffers {
            vertices,
            indices,
            index_count,
        });

        log::info!(
            "Uploaded mesh: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(())
    }

    /// Replace the texture sampled by the mesh.
    ///
    /// On failure the error is logged and the previous texture stays bound.
    pub fn upload_texture(&mut self, texture: &TextureData) -> VulkanResult<()> {
        let result = self.try_upload_texture(texture);
        if let Err(e) = &result {
            log::error!("Texture upload failed: {}", e);
        }
        result
    }

    fn try_upload_texture(&mut self, data: &TextureData) -> VulkanResult<()> {
        data.validate().map_err(|e| VulkanError::InvalidOperation {
            reason: e.to_string(),
        })?;
        let gpu = self.gpu()?;
        let bound = GpuState::bind_texture(&gpu.context, &gpu.descriptor_pool, &gpu.descriptor_layout, data)?;

        gpu.context.device().wait_idle()?;
        let previous = std::mem::replace(&mut gpu.texture, bound);
        gpu.descriptor_pool.free(previous.descriptor_set)?;

        log::info!(
            "Uploaded texture {}x{} ({} mip levels)",
            data.width,
            data.height,
            gpu.texture.texture.mip_levels()
        );
        Ok(())
    }

    /// Frame counters
    pub const fn stats(&self) -> FrameStats {
        self.sync.stats()
    }

    /// Configuration the renderer was built with
    pub const fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Wait for the GPU and release every resource. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            let stats = self.sync.stats();
            log::info!(
                "Shutting down renderer after {} frames ({} swapchain rebuilds, {} skipped)",
                stats.frames_presented,
                stats.recreations,
                stats.skipped
            );
            drop(gpu);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
