//! Buffer, image, sampler and shader creation plus staging uploads
//!
//! Uploads follow the staging pattern: bytes go into a host-visible buffer,
//! a one-shot command buffer copies them into device-local memory, the
//! submission is waited on and the staging buffer is freed.

use ash::vk;

use super::buffer::Buffer;
use super::device::Device;
use super::image::{
    copy_buffer_to_image, mip_levels_for, record_mipmaps, supports_linear_blit, transition_layout, Image, ImageDesc,
    ImageView, Sampler, Texture,
};
use super::shader::ShaderModule;
use super::{VulkanError, VulkanResult};
use crate::assets::TextureData;

/// Format textures are uploaded in
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

const HOST_STAGING: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Creates GPU resources on a borrowed device
pub struct ResourceFactory<'a> {
    device: &'a Device,
}

impl<'a> ResourceFactory<'a> {
    /// Factory for `device`
    pub const fn new(device: &'a Device) -> Self {
        Self { device }
    }

    /// Buffer with memory satisfying `properties`
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Buffer> {
        Buffer::new(
            self.device.handle().clone(),
            self.device.memory_properties(),
            size,
            usage,
            properties,
        )
    }

    /// Image with memory satisfying `properties`
    pub fn create_image(&self, desc: ImageDesc, properties: vk::MemoryPropertyFlags) -> VulkanResult<Image> {
        Image::new(
            self.device.handle().clone(),
            self.device.memory_properties(),
            desc,
            properties,
        )
    }

    /// View over every mip level of `image`
    pub fn create_image_view(&self, image: &Image, aspect_mask: vk::ImageAspectFlags) -> VulkanResult<ImageView> {
        let desc = image.desc();
        ImageView::new(
            self.device.handle().clone(),
            image.handle(),
            desc.format,
            aspect_mask,
            desc.mip_levels,
        )
    }

    /// Sampler using the device's maximum anisotropy
    pub fn create_sampler(&self, mip_levels: u32) -> VulkanResult<Sampler> {
        Sampler::new(
            self.device.handle().clone(),
            self.device.max_sampler_anisotropy(),
            mip_levels,
        )
    }

    /// Shader module from SPIR-V bytes
    pub fn create_shader_module(&self, spirv: &[u8]) -> VulkanResult<ShaderModule> {
        ShaderModule::from_bytes(self.device.handle().clone(), spirv)
    }

    fn staging_buffer(&self, bytes: &[u8]) -> VulkanResult<Buffer> {
        let staging = self.create_buffer(
            bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            HOST_STAGING,
        )?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Copy `bytes` into a new device-local buffer with `usage`
    pub fn upload_buffer(&self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Buffer> {
        let staging = self.staging_buffer(bytes)?;
        let target = self.create_buffer(
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let commands = self.device.command_pool().begin_single_time()?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: staging.size(),
        };
        unsafe {
            self.device.handle().cmd_copy_buffer(
                commands.command_buffer(),
                staging.handle(),
                target.handle(),
                &[region],
            );
        }
        commands.submit_and_wait(self.device.graphics_queue())?;

        log::debug!("Uploaded {} bytes into a {:?} buffer", bytes.len(), usage);
        Ok(target)
    }

    /// Upload pixels into a sampled, fully mipmapped texture
    pub fn upload_texture(&self, texture: &TextureData) -> VulkanResult<Texture> {
        texture.validate().map_err(|e| VulkanError::InvalidOperation {
            reason: e.to_string(),
        })?;
        let extent = vk::Extent2D {
            width: texture.width,
            height: texture.height,
        };
        let mip_levels = mip_levels_for(texture.width, texture.height);

        if mip_levels > 1 && !supports_linear_blit(&self.device.format_properties(TEXTURE_FORMAT)) {
            return Err(VulkanError::UnsupportedFormat {
                format: TEXTURE_FORMAT,
                reason: "linear-filtered blits are not supported".to_string(),
            });
        }

        let staging = self.staging_buffer(&texture.to_rgba8())?;
        let image = self.create_image(
            ImageDesc {
                extent,
                format: TEXTURE_FORMAT,
                mip_levels,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                tiling: vk::ImageTiling::OPTIMAL,
            },
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let device = self.device.handle();
        let commands = self.device.command_pool().begin_single_time()?;
        let cmd = commands.command_buffer();
        transition_layout(
            device,
            cmd,
            image.handle(),
            (0, mip_levels),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
        )?;
        copy_buffer_to_image(device, cmd, staging.handle(), image.handle(), extent);
        record_mipmaps(device, cmd, image.handle(), extent, mip_levels)?;
        commands.submit_and_wait(self.device.graphics_queue())?;
        drop(staging);

        let view = self.create_image_view(&image, vk::ImageAspectFlags::COLOR)?;
        let sampler = self.create_sampler(mip_levels)?;

        log::debug!(
            "Uploaded {}x{} texture with {} mip levels",
            texture.width,
            texture.height,
            mip_levels
        );
        Ok(Texture::from_parts(image, view, sampler))
    }
}
