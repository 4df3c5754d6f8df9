//! Images, views, samplers and the layout transitions used for uploads

use ash::{vk, Device};

use super::buffer::allocate_memory;
use super::{VulkanError, VulkanResult};

/// Number of levels in a full mip chain: `floor(log2(max(w, h))) + 1`
pub fn mip_levels_for(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// One downsampling step of a mip chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipBlit {
    /// Level read from
    pub src_level: u32,
    /// Size of the source level
    pub src_extent: (i32, i32),
    /// Size of the destination level (`src_level + 1`)
    pub dst_extent: (i32, i32),
}

/// The blits that build levels `1..levels` from level 0, halving each
/// dimension and clamping at one texel
pub fn mip_blit_plan(width: u32, height: u32, levels: u32) -> Vec<MipBlit> {
    let mut extent = (
        i32::try_from(width).unwrap_or(i32::MAX),
        i32::try_from(height).unwrap_or(i32::MAX),
    );

    (1..levels)
        .map(|level| {
            let next = ((extent.0 / 2).max(1), (extent.1 / 2).max(1));
            let blit = MipBlit {
                src_level: level - 1,
                src_extent: extent,
                dst_extent: next,
            };
            extent = next;
            blit
        })
        .collect()
}

/// Whether a format supports linear filtering when blitting with optimal tiling
pub fn supports_linear_blit(properties: &vk::FormatProperties) -> bool {
    properties.optimal_tiling_features.contains(
        vk::FormatFeatureFlags::BLIT_SRC
            | vk::FormatFeatureFlags::BLIT_DST
            | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
    )
}

/// Description of an image to create
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Size in texels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Mip levels to allocate
    pub mip_levels: u32,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Tiling
    pub tiling: vk::ImageTiling,
}

/// 2D image owning its memory
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    desc: ImageDesc,
}

impl Image {
    /// Create an image and bind freshly allocated memory to it
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: ImageDesc,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create a zero-area image".to_string(),
            });
        }

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_info, None) }.map_err(|e| match e {
            vk::Result::ERROR_FORMAT_NOT_SUPPORTED => VulkanError::UnsupportedFormat {
                format: desc.format,
                reason: format!("cannot create image with usage {:?}", desc.usage),
            },
            other => VulkanError::Api(other),
        })?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate_memory(&device, memory_properties, requirements, properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            image,
            memory,
            desc,
        })
    }

    /// Image handle
    pub const fn handle(&self) -> vk::Image {
        self.image
    }

    /// Creation parameters
    pub const fn desc(&self) -> &ImageDesc {
        &self.desc
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Image view with RAII cleanup
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    /// View all `mip_levels` of a 2D image
    pub fn new(
        device: Device,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.create_image_view(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self { device, view })
    }

    /// View handle
    pub const fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

/// Sampler with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Trilinear, repeating sampler with the given anisotropy (1.0 disables it)
    pub fn new(device: Device, max_anisotropy: f32, mip_levels: u32) -> VulkanResult<Self> {
        #[allow(clippy::cast_precision_loss)]
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(max_anisotropy > 1.0)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        let sampler = unsafe { device.create_sampler(&create_info, None) }.map_err(VulkanError::Api)?;
        Ok(Self { device, sampler })
    }

    /// Sampler handle
    pub const fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Sampled texture: image, full-chain view and sampler
pub struct Texture {
    sampler: Sampler,
    view: ImageView,
    image: Image,
}

impl Texture {
    pub(crate) const fn from_parts(image: Image, view: ImageView, sampler: Sampler) -> Self {
        Self { sampler, view, image }
    }

    /// View over every mip level
    pub const fn image_view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Sampler handle
    pub const fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Number of mip levels
    pub const fn mip_levels(&self) -> u32 {
        self.image.desc().mip_levels
    }
}

fn color_range(base_mip_level: u32, level_count: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level,
        level_count,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Record a layout transition for a range of color mip levels
pub fn transition_layout(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    range: (u32, u32),
    (old_layout, new_layout): (vk::ImageLayout, vk::ImageLayout),
) -> VulkanResult<()> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_READ,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        (old, new) => {
            return Err(VulkanError::InvalidOperation {
                reason: format!("unsupported layout transition {old:?} -> {new:?}"),
            })
        }
    };

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_range(range.0, range.1))
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            src_stage,
            dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }
    Ok(())
}

/// Record a copy of tightly packed texels into mip level 0
pub fn copy_buffer_to_image(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    image: vk::Image,
    extent: vk::Extent2D,
) {
    let region = vk::BufferImageCopy::builder()
        .buffer_offset(0)
        .buffer_row_length(0)
        .buffer_image_height(0)
        .image_subresource(vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        })
        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
        .image_extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        });

    unsafe {
        device.cmd_copy_buffer_to_image(
            command_buffer,
            buffer,
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region.build()],
        );
    }
}

/// Record mip-chain generation.
///
/// Expects every level in `TRANSFER_DST_OPTIMAL` with level 0 filled; leaves
/// every level in `SHADER_READ_ONLY_OPTIMAL`.
pub fn record_mipmaps(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    extent: vk::Extent2D,
    mip_levels: u32,
) -> VulkanResult<()> {
    for blit in mip_blit_plan(extent.width, extent.height, mip_levels) {
        let src = blit.src_level;
        transition_layout(
            device,
            command_buffer,
            image,
            (src, 1),
            (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
        )?;

        let region = vk::ImageBlit::builder()
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: blit.src_extent.0, y: blit.src_extent.1, z: 1 },
            ])
            .src_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: src,
                base_array_layer: 0,
                layer_count: 1,
            })
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: blit.dst_extent.0, y: blit.dst_extent.1, z: 1 },
            ])
            .dst_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: src + 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            device.cmd_blit_image(
                command_buffer,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
                vk::Filter::LINEAR,
            );
        }

        transition_layout(
            device,
            command_buffer,
            image,
            (src, 1),
            (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        )?;
    }

    // The last level was only ever written
    transition_layout(
        device,
        command_buffer,
        image,
        (mip_levels.saturating_sub(1), 1),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_levels() {
        assert_eq!(mip_levels_for(1, 1), 1);
        assert_eq!(mip_levels_for(2, 1), 2);
        assert_eq!(mip_levels_for(256, 256), 9);
        assert_eq!(mip_levels_for(512, 300), 10);
        assert_eq!(mip_levels_for(1000, 10), 10);
        assert_eq!(mip_levels_for(0, 0), 1);
    }

    #[test]
    fn test_blit_plan_halves_and_clamps() {
        let plan = mip_blit_plan(8, 2, mip_levels_for(8, 2));
        assert_eq!(
            plan,
            vec![
                MipBlit { src_level: 0, src_extent: (8, 2), dst_extent: (4, 1) },
                MipBlit { src_level: 1, src_extent: (4, 1), dst_extent: (2, 1) },
                MipBlit { src_level: 2, src_extent: (2, 1), dst_extent: (1, 1) },
            ]
        );
    }

    #[test]
    fn test_single_level_needs_no_blits() {
        assert!(mip_blit_plan(1, 1, 1).is_empty());
    }

    #[test]
    fn test_blit_plan_odd_sizes() {
        let plan = mip_blit_plan(5, 3, mip_levels_for(5, 3));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].dst_extent, (2, 1));
        assert_eq!(plan[1].dst_extent, (1, 1));
    }

    #[test]
    fn test_linear_blit_support() {
        let mut properties = vk::FormatProperties::default();
        assert!(!supports_linear_blit(&properties));

        properties.optimal_tiling_features = vk::FormatFeatureFlags::BLIT_SRC
            | vk::FormatFeatureFlags::BLIT_DST
            | vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR;
        assert!(supports_linear_blit(&properties));

        properties.optimal_tiling_features = vk::FormatFeatureFlags::BLIT_SRC | vk::FormatFeatureFlags::BLIT_DST;
        assert!(!supports_linear_blit(&properties));
    }
}
