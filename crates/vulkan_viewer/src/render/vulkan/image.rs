//! Device images with bound memory and a view
//!
//! Used for the MSAA color target, the depth target and sampled textures.

use super::buffer::allocate_memory;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use ash::{vk, Device};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Number of mip levels for a full chain down to 1x1: `floor(log2(max(w, h))) + 1`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    largest.ilog2() + 1
}

/// Parameters for [`GpuImage::new`]
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Mip levels to allocate
    pub mip_levels: u32,
    /// Samples per pixel
    pub samples: vk::SampleCountFlags,
    /// Pixel format
    pub format: vk::Format,
    /// Memory tiling
    pub tiling: vk::ImageTiling,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Required memory properties
    pub memory_properties: vk::MemoryPropertyFlags,
    /// Aspect covered by the view
    pub aspect: vk::ImageAspectFlags,
}

/// RAII owner of an image, its memory and one view over all mip levels
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
    mip_levels: u32,
}

impl GpuImage {
    /// Create the image, allocate and bind its memory, then create the view
    pub fn new(context: &VulkanContext, desc: &ImageDesc) -> VulkanResult<Self> {
        let device = context.device().clone();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .format(desc.format)
            .tiling(desc.tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(desc.samples);

        let image = unsafe { device.create_image(&image_info, None) }.map_err(VulkanError::creation("image"))?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory = match allocate_memory(&device, context, requirements, desc.memory_properties) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let bound = unsafe { device.bind_image_memory(image, memory, 0) }
            .map_err(VulkanError::creation("image memory binding"))
            .and_then(|()| create_image_view(&device, image, desc.format, desc.aspect, desc.mip_levels));

        let view = match bound {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            device,
            image,
            memory,
            view,
            format: desc.format,
            mip_levels: desc.mip_levels,
        })
    }

    /// Image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Backing memory
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }

    /// View over every mip level
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Allocated mip levels
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Create a 2D view over `mip_levels` levels of `image`
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
) -> VulkanResult<vk::ImageView> {
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
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe { device.create_image_view(&create_info, None) }.map_err(VulkanError::creation("image view"))
}

/// First candidate whose properties support `features` for `tiling`
pub fn pick_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    properties_of: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let props = properties_of(format);
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
            _ => false,
        }
    })
}

/// Depth attachment format supported by the selected device
pub fn find_depth_format(context: &VulkanContext) -> VulkanResult<vk::Format> {
    pick_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        |format| context.format_properties(format),
    )
    .ok_or_else(|| VulkanError::MissingCapability("failed to find supported depth format".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_cover_full_chain() {
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(300, 200), 9);
        assert_eq!(mip_level_count(1024, 2), 11);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    fn optimal(features: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: features,
            ..Default::default()
        }
    }

    #[test]
    fn depth_format_skips_unsupported_candidates() {
        let chosen = pick_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| {
                if format == vk::Format::D24_UNORM_S8_UINT {
                    optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
                } else {
                    optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE)
                }
            },
        );
        assert_eq!(chosen, Some(vk::Format::D24_UNORM_S8_UINT));
    }

    #[test]
    fn depth_format_prefers_first_candidate() {
        let chosen = pick_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| optimal(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        );
        assert_eq!(chosen, Some(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn linear_tiling_checks_linear_features() {
        let chosen = pick_supported_format(
            &[vk::Format::R8G8B8A8_SRGB],
            vk::ImageTiling::LINEAR,
            vk::FormatFeatureFlags::SAMPLED_IMAGE,
            |_| optimal(vk::FormatFeatureFlags::SAMPLED_IMAGE),
        );
        assert_eq!(chosen, None);
    }
}
