//! Sampled textures on the GPU
//!
//! Each texture is uploaded through a staging buffer into a mipmapped
//! `R8G8B8A8_SRGB` image and paired with an anisotropic linear sampler.

use super::buffer::Buffer;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::image::{mip_level_count, GpuImage, ImageDesc};
use super::upload::Uploader;
use crate::assets::{Texture, TextureId, TexturesCollection};
use ash::{vk, Device};
use std::collections::BTreeMap;

/// Format every texture is uploaded as
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Device image, view and sampler for one texture
pub struct GpuTexture {
    device: Device,
    sampler: vk::Sampler,
    image: GpuImage,
}

impl GpuTexture {
    /// Upload `texture` and build its view and sampler
    pub fn upload(uploader: &Uploader<'_>, texture: &Texture) -> VulkanResult<Self> {
        if texture.bits_per_pixel != 32 {
            return Err(VulkanError::UnsupportedOperation(format!(
                "{} bits per pixel textures are not supported",
                texture.bits_per_pixel
            )));
        }
        if texture.pixels.len() as u64 != texture.size_bytes() || texture.pixels.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "texture {}x{} has {} bytes of pixel data",
                    texture.width,
                    texture.height,
                    texture.pixels.len()
                ),
            });
        }

        let context = uploader.context();
        let mip_levels = mip_level_count(texture.width, texture.height);
        let staging = Buffer::staging_with_bytes(context, &texture.pixels)?;

        let image = GpuImage::new(
            context,
            &ImageDesc {
                width: texture.width,
                height: texture.height,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
                memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                aspect: vk::ImageAspectFlags::COLOR,
            },
        )?;

        uploader.transition_image_layout(
            image.image(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            mip_levels,
        )?;
        uploader.copy_buffer_to_image(&staging, image.image(), texture.width, texture.height)?;
        uploader.generate_mipmaps(image.image(), TEXTURE_FORMAT, texture.width, texture.height, mip_levels)?;

        let sampler = create_sampler(context, mip_levels)?;

        log::info!(
            "Uploaded {}x{} texture with {} mip levels",
            texture.width,
            texture.height,
            mip_levels
        );

        Ok(Self {
            device: context.device().clone(),
            sampler,
            image,
        })
    }

    /// Image view over all mip levels
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Image handle
    pub fn image(&self) -> vk::Image {
        self.image.image()
    }

    /// Backing memory
    pub fn memory(&self) -> vk::DeviceMemory {
        self.image.memory()
    }

    /// Mip levels in the image
    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Sampler settings used for every texture
pub fn sampler_info(max_anisotropy: f32, mip_levels: u32) -> vk::SamplerCreateInfo {
    vk::SamplerCreateInfo::builder()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(true)
        .max_anisotropy(max_anisotropy)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
        .build()
}

fn create_sampler(context: &VulkanContext, mip_levels: u32) -> VulkanResult<vk::Sampler> {
    let max_anisotropy = context.physical_device.properties.limits.max_sampler_anisotropy;
    let info = sampler_info(max_anisotropy, mip_levels);
    unsafe { context.device().create_sampler(&info, None) }.map_err(VulkanError::creation("texture sampler"))
}

/// GPU copies of every texture in a collection
#[derive(Default)]
pub struct TextureManager {
    textures: BTreeMap<TextureId, GpuTexture>,
}

impl TextureManager {
    /// Manager with nothing uploaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Release any previous uploads, then upload every texture in `collection`
    pub fn bind_textures(&mut self, uploader: &Uploader<'_>, collection: &TexturesCollection) -> VulkanResult<()> {
        self.textures.clear();
        for (id, texture) in collection.iter() {
            let gpu_texture = GpuTexture::upload(uploader, texture)?;
            self.textures.insert(id, gpu_texture);
        }
        Ok(())
    }

    /// Uploaded texture for `id`
    pub fn texture(&self, id: TextureId) -> VulkanResult<&GpuTexture> {
        self.textures
            .get(&id)
            .ok_or_else(|| VulkanError::AssetNotFound(format!("{id:?} is not bound")))
    }

    /// Number of uploaded textures
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    /// Whether nothing is uploaded
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_covers_every_mip_level() {
        let info = sampler_info(16.0, 10);
        assert_eq!(info.max_lod, 10.0);
        assert_eq!(info.min_lod, 0.0);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 16.0);
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(info.compare_enable, vk::FALSE);
    }

    #[test]
    fn unknown_texture_is_not_found() {
        let manager = TextureManager::new();
        let mut textures = TexturesCollection::new();
        let id = textures.insert(Texture::solid_color(1, 1, [255; 4]));
        assert!(manager.is_empty());
        assert!(matches!(manager.texture(id), Err(VulkanError::AssetNotFound(_))));
    }
}
