//! Host to device transfers
//!
//! All copies run through [`CommandPool::execute_one_shot`] on the graphics queue
//! and block until the queue is idle. This path is meant for startup loads.

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use ash::vk;

/// Access masks and stages for one image layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTransition {
    /// Accesses that must complete before the barrier
    pub src_access: vk::AccessFlags,
    /// Accesses that wait on the barrier
    pub dst_access: vk::AccessFlags,
    /// Stage the barrier waits on
    pub src_stage: vk::PipelineStageFlags,
    /// Stage blocked by the barrier
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier parameters for the two layout transitions used by texture uploads
pub fn transition_masks(old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) -> VulkanResult<LayoutTransition> {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Ok(LayoutTransition {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        }),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => Ok(LayoutTransition {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        }),
        (old, new) => Err(VulkanError::UnsupportedOperation(format!(
            "unsupported layout transition {old:?} -> {new:?}"
        ))),
    }
}

/// Sizes of every level of a mip chain, halving each axis with a floor of 1
pub fn mip_chain_extents(width: u32, height: u32, mip_levels: u32) -> Vec<(i32, i32)> {
    let mut extent = (width as i32, height as i32);
    let mut extents = Vec::with_capacity(mip_levels as usize);
    for _ in 0..mip_levels {
        extents.push(extent);
        extent = ((extent.0 / 2).max(1), (extent.1 / 2).max(1));
    }
    extents
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

fn color_layers(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Blocking upload helper borrowing the context and a command pool
pub struct Uploader<'a> {
    context: &'a VulkanContext,
    command_pool: &'a CommandPool,
}

impl<'a> Uploader<'a> {
    /// Upload through `command_pool` on the context's graphics queue
    pub fn new(context: &'a VulkanContext, command_pool: &'a CommandPool) -> Self {
        Self { context, command_pool }
    }

    /// The context uploads allocate from
    pub fn context(&self) -> &'a VulkanContext {
        self.context
    }

    fn one_shot<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer) -> VulkanResult<()>,
    {
        self.command_pool
            .execute_one_shot(self.context.graphics_queue(), record)
    }

    /// Copy `size` bytes from the start of `src` to the start of `dst`
    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        self.one_shot(|device, command_buffer| {
            unsafe { device.cmd_copy_buffer(command_buffer, src.handle(), dst.handle(), &[region]) };
            Ok(())
        })
    }

    /// Device-local buffer with `usage` holding a copy of `staging`
    pub fn upload_from_staging(&self, staging: &Buffer, usage: vk::BufferUsageFlags) -> VulkanResult<Buffer> {
        let buffer = Buffer::new(
            self.context,
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        self.copy_buffer(staging, &buffer, staging.size())?;
        Ok(buffer)
    }

    /// Copy tightly packed pixels from `buffer` into mip level 0 of `image`
    ///
    /// The image must be in `TRANSFER_DST_OPTIMAL`.
    pub fn copy_buffer_to_image(&self, buffer: &Buffer, image: vk::Image, width: u32, height: u32) -> VulkanResult<()> {
        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: color_layers(0),
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D { width, height, depth: 1 },
        };
        self.one_shot(|device, command_buffer| {
            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    buffer.handle(),
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            Ok(())
        })
    }

    /// Move every mip level of a color image between layouts
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        mip_levels: u32,
    ) -> VulkanResult<()> {
        let masks = transition_masks(old_layout, new_layout)?;
        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_range(0, mip_levels))
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access)
            .build();

        self.one_shot(|device, command_buffer| {
            unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    masks.src_stage,
                    masks.dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
            Ok(())
        })
    }

    /// Fill levels `1..mip_levels` by successive linear blits from level 0
    ///
    /// Expects every level in `TRANSFER_DST_OPTIMAL` and leaves every level in
    /// `SHADER_READ_ONLY_OPTIMAL`.
    pub fn generate_mipmaps(
        &self,
        image: vk::Image,
        format: vk::Format,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) -> VulkanResult<()> {
        let properties = self.context.format_properties(format);
        if !properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            return Err(VulkanError::UnsupportedOperation(format!(
                "texture image format {format:?} does not support linear blitting"
            )));
        }

        let extents = mip_chain_extents(width, height, mip_levels);

        self.one_shot(|device, command_buffer| {
            let barrier_for = |level: u32,
                               old_layout: vk::ImageLayout,
                               new_layout: vk::ImageLayout,
                               src_access: vk::AccessFlags,
                               dst_access: vk::AccessFlags| {
                vk::ImageMemoryBarrier::builder()
                    .image(image)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .subresource_range(color_range(level, 1))
                    .old_layout(old_layout)
                    .new_layout(new_layout)
                    .src_access_mask(src_access)
                    .dst_access_mask(dst_access)
                    .build()
            };
            let barrier = |barrier: vk::ImageMemoryBarrier, dst_stage: vk::PipelineStageFlags| unsafe {
                device.cmd_pipeline_barrier(
                    command_buffer,
                    vk::PipelineStageFlags::TRANSFER,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            };

            for (level, pair) in (1..mip_levels).zip(extents.windows(2)) {
                let (src, dst) = (pair[0], pair[1]);

                barrier(
                    barrier_for(
                        level - 1,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        vk::AccessFlags::TRANSFER_WRITE,
                        vk::AccessFlags::TRANSFER_READ,
                    ),
                    vk::PipelineStageFlags::TRANSFER,
                );

                let blit = vk::ImageBlit {
                    src_subresource: color_layers(level - 1),
                    src_offsets: [vk::Offset3D { x: 0, y: 0, z: 0 }, vk::Offset3D { x: src.0, y: src.1, z: 1 }],
                    dst_subresource: color_layers(level),
                    dst_offsets: [vk::Offset3D { x: 0, y: 0, z: 0 }, vk::Offset3D { x: dst.0, y: dst.1, z: 1 }],
                };
                unsafe {
                    device.cmd_blit_image(
                        command_buffer,
                        image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit],
                        vk::Filter::LINEAR,
                    );
                }

                barrier(
                    barrier_for(
                        level - 1,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                        vk::AccessFlags::TRANSFER_READ,
                        vk::AccessFlags::SHADER_READ,
                    ),
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                );
            }

            // The last level was only ever written
            barrier(
                barrier_for(
                    mip_levels.saturating_sub(1),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::SHADER_READ,
                ),
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            );

            Ok(())
        })?;

        log::debug!("Generated {mip_levels} mip levels for {width}x{height} image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_transitions_use_transfer_stages() {
        let to_dst = transition_masks(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(to_dst.src_access, vk::AccessFlags::empty());
        assert_eq!(to_dst.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags::TRANSFER);

        let to_read = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn other_transitions_are_unsupported() {
        for (old, new) in [
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
            (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            (vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ] {
            assert!(matches!(
                transition_masks(old, new),
                Err(VulkanError::UnsupportedOperation(_))
            ));
        }
    }

    #[test]
    fn mip_chain_halves_down_to_one() {
        assert_eq!(
            mip_chain_extents(300, 200, 9),
            vec![(300, 200), (150, 100), (75, 50), (37, 25), (18, 12), (9, 6), (4, 3), (2, 1), (1, 1)]
        );
        assert_eq!(mip_chain_extents(1, 1, 1), vec![(1, 1)]);
    }
}
