//! Command pools, one-shot submissions and render-pass recording

use ash::{vk, Device};

use super::shader::FramePushConstants;
use super::sync::Fence;
use super::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None) }
            .map_err(VulkanError::Api)?;

        Ok(Self {
            device,
            command_pool,
        })
    }

    /// Allocate primary command buffers
    pub fn allocate_command_buffers(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }.map_err(VulkanError::Api)
    }

    /// Return command buffers to the pool
    pub fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, command_buffers);
        }
    }

    /// Allocate a buffer and start recording a one-shot submission
    pub fn begin_single_time(&self) -> VulkanResult<SingleTimeCommands<'_>> {
        let command_buffer = self
            .allocate_command_buffers(1)?
            .into_iter()
            .next()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "driver returned no command buffer".to_string(),
            })?;

        let commands = SingleTimeCommands {
            pool: self,
            command_buffer,
        };
        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(VulkanError::Api)?;

        Ok(commands)
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            // Buffers from this pool may still be executing
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// A command buffer recorded once, submitted, and waited on.
///
/// The buffer goes back to its pool when this value is dropped, whether or
/// not it was submitted.
pub struct SingleTimeCommands<'a> {
    pool: &'a CommandPool,
    command_buffer: vk::CommandBuffer,
}

impl SingleTimeCommands<'_> {
    /// Command buffer to record into
    pub const fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// End recording, submit to `queue` and block until the work completes
    pub fn submit_and_wait(self, queue: vk::Queue) -> VulkanResult<()> {
        let device = &self.pool.device;
        unsafe { device.end_command_buffer(self.command_buffer) }.map_err(VulkanError::Api)?;

        let fence = Fence::new(device.clone(), false)?;
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers);
        unsafe { device.queue_submit(queue, &[submit_info.build()], fence.handle()) }
            .map_err(VulkanError::Api)?;

        fence.wait(u64::MAX)
    }
}

impl Drop for SingleTimeCommands<'_> {
    fn drop(&mut self) {
        self.pool.free_command_buffers(&[self.command_buffer]);
    }
}

/// Command buffer recorder tracking begin/end state
pub struct CommandRecorder<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
    recording: bool,
}

impl<'a> CommandRecorder<'a> {
    /// Wrap a command buffer that is not currently recording
    pub const fn new(device: &'a Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            recording: false,
        }
    }

    /// Begin command recording
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device.begin_command_buffer(self.command_buffer, &begin_info) }
            .map_err(VulkanError::Api)?;

        self.recording = true;
        Ok(())
    }

    /// Begin a render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_, 'a>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// End command recording
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        unsafe { self.device.end_command_buffer(self.command_buffer) }.map_err(VulkanError::Api)?;
        self.recording = false;
        Ok(self.command_buffer)
    }
}

/// Render pass in progress; dropping it records `vkCmdEndRenderPass`
pub struct ActiveRenderPass<'r, 'a> {
    recorder: &'r mut CommandRecorder<'a>,
}

impl ActiveRenderPass<'_, '_> {
    fn device(&self) -> &Device {
        self.recorder.device
    }

    fn command_buffer(&self) -> vk::CommandBuffer {
        self.recorder.command_buffer
    }

    /// Set viewport
    pub fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe { self.device().cmd_set_viewport(self.command_buffer(), 0, &[viewport]) };
    }

    /// Set scissor
    pub fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe { self.device().cmd_set_scissor(self.command_buffer(), 0, &[scissor]) };
    }

    /// Bind graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device()
                .cmd_bind_pipeline(self.command_buffer(), vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Bind vertex buffers
    pub fn bind_vertex_buffers(&mut self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.device()
                .cmd_bind_vertex_buffers(self.command_buffer(), first_binding, buffers, offsets);
        }
    }

    /// Bind index buffer
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe {
            self.device()
                .cmd_bind_index_buffer(self.command_buffer(), buffer, 0, index_type);
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                self.command_buffer(),
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Push constants to shaders
    pub fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, data: &[u8]) {
        unsafe {
            self.device()
                .cmd_push_constants(self.command_buffer(), layout, stages, 0, data);
        }
    }

    /// Draw indexed
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.device()
                .cmd_draw_indexed(self.command_buffer(), index_count, 1, 0, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_, '_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder
                .device
                .cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}

/// Fixed state a frame is recorded against
#[derive(Debug, Clone, Copy)]
pub struct PipelineState {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Graphics pipeline to bind
    pub pipeline: vk::Pipeline,
    /// Layout for descriptor sets and push constants
    pub layout: vk::PipelineLayout,
    /// Current swapchain extent
    pub extent: vk::Extent2D,
    /// Color attachment clear value
    pub clear_color: [f32; 4],
}

/// GPU resources bound for the draw call
#[derive(Debug, Clone, Copy)]
pub struct DrawResources {
    /// Vertex buffer (binding 0)
    pub vertex_buffer: vk::Buffer,
    /// 32-bit index buffer
    pub index_buffer: vk::Buffer,
    /// Number of indices to draw
    pub index_count: u32,
    /// Texture descriptor set (set 0)
    pub descriptor_set: vk::DescriptorSet,
    /// Per-frame push constants
    pub push_constants: FramePushConstants,
}

/// Clear values for the color and depth attachments
pub fn clear_values(clear_color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ]
}

/// Viewport covering `extent` with the standard depth range
#[allow(clippy::cast_precision_loss)]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Record one frame into `command_buffer`.
///
/// The buffer is reset first, so the caller must have observed the fence of
/// its previous submission. Without `resources` the pass only clears.
pub fn record(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    framebuffer: vk::Framebuffer,
    state: &PipelineState,
    resources: Option<&DrawResources>,
) -> VulkanResult<()> {
    unsafe { device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty()) }
        .map_err(VulkanError::Api)?;

    let mut recorder = CommandRecorder::new(device, command_buffer);
    recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: state.extent,
    };
    let clear = clear_values(state.clear_color);
    {
        let mut pass = recorder.begin_render_pass(state.render_pass, framebuffer, render_area, &clear)?;
        pass.bind_pipeline(state.pipeline);
        pass.set_viewport(full_viewport(state.extent));
        pass.set_scissor(render_area);

        if let Some(resources) = resources {
            pass.bind_vertex_buffers(0, &[resources.vertex_buffer], &[0]);
            pass.bind_index_buffer(resources.index_buffer, vk::IndexType::UINT32);
            pass.bind_descriptor_sets(state.layout, &[resources.descriptor_set]);
            pass.push_constants(
                state.layout,
                FramePushConstants::STAGES,
                bytemuck::bytes_of(&resources.push_constants),
            );
            pass.draw_indexed(resources.index_count);
        }
    }

    recorder.end()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_covers_extent() {
        let viewport = full_viewport(vk::Extent2D { width: 1920, height: 1080 });
        assert_relative_eq!(viewport.width, 1920.0);
        assert_relative_eq!(viewport.height, 1080.0);
        assert_relative_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_clear_values() {
        let values = clear_values([0.1, 0.2, 0.3, 1.0]);
        unsafe {
            assert_relative_eq!(values[0].color.float32[2], 0.3);
            assert_relative_eq!(values[1].depth_stencil.depth, 1.0);
        }
    }
}
