//! Framebuffers and the multisampled attachments they draw into

use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::image::{GpuImage, ImageDesc};
use ash::{vk, Device};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer; `attachments` follow the render pass order
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer =
            unsafe { device.create_framebuffer(&create_info, None) }.map_err(VulkanError::creation("framebuffer"))?;

        Ok(Self { device, framebuffer })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Multisampled color and depth images shared by every framebuffer
pub struct RenderTargets {
    /// Transient MSAA color target
    pub color: GpuImage,
    /// MSAA depth target
    pub depth: GpuImage,
}

impl RenderTargets {
    /// Allocate both targets at `extent` with `samples` per pixel
    pub fn new(
        context: &VulkanContext,
        color_format: vk::Format,
        depth_format: vk::Format,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        let color = GpuImage::new(
            context,
            &ImageDesc {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples,
                format: color_format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                aspect: vk::ImageAspectFlags::COLOR,
            },
        )?;

        let depth = GpuImage::new(
            context,
            &ImageDesc {
                width: extent.width,
                height: extent.height,
                mip_levels: 1,
                samples,
                format: depth_format,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                aspect: vk::ImageAspectFlags::DEPTH,
            },
        )?;

        Ok(Self { color, depth })
    }

    /// One framebuffer per swapchain view: `[color, depth, swapchain image]`
    pub fn framebuffers(
        &self,
        device: &Device,
        render_pass: vk::RenderPass,
        swapchain_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Vec<Framebuffer>> {
        swapchain_views
            .iter()
            .map(|&view| {
                let attachments = [self.color.view(), self.depth.view(), view];
                Framebuffer::new(device.clone(), render_pass, &attachments, extent)
            })
            .collect()
    }
}
