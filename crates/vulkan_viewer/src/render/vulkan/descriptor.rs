//! Descriptor set layout, pool and per-image sets
//!
//! Binding 0 holds the camera block, binding 1 the per-node block as a dynamic
//! uniform buffer, binding 2 the texture. Every swapchain image gets its own set.

use super::context::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Binding numbers shared with the shaders
pub mod binding {
    /// Camera uniform block
    pub const CAMERA: u32 = 0;
    /// Per-node dynamic uniform block
    pub const NODE: u32 = 1;
    /// Combined image sampler
    pub const TEXTURE: u32 = 2;
}

/// Builder for descriptor set layouts
#[derive(Debug, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a uniform buffer binding whose offset is supplied at bind time
    pub fn add_dynamic_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// The viewer's layout: camera, node transform, texture
    pub fn viewer_layout() -> Self {
        Self::new()
            .add_uniform_buffer(binding::CAMERA, vk::ShaderStageFlags::VERTEX)
            .add_dynamic_uniform_buffer(binding::NODE, vk::ShaderStageFlags::VERTEX)
            .add_combined_image_sampler(binding::TEXTURE, vk::ShaderStageFlags::FRAGMENT)
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(VulkanError::creation("descriptor set layout"))?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
            bindings: self.bindings,
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// One descriptor of each binding's type per set
pub fn pool_sizes(bindings: &[vk::DescriptorSetLayoutBinding], set_count: u32) -> Vec<vk::DescriptorPoolSize> {
    bindings
        .iter()
        .map(|binding| vk::DescriptorPoolSize {
            ty: binding.descriptor_type,
            descriptor_count: binding.descriptor_count * set_count,
        })
        .collect()
}

/// Descriptor pool sized for exactly one set per swapchain image
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Pool holding `set_count` sets of `layout`
    pub fn for_layout(device: &Device, layout: &DescriptorSetLayout, set_count: u32) -> VulkanResult<Self> {
        let sizes = pool_sizes(layout.bindings(), set_count);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(set_count)
            .pool_sizes(&sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(VulkanError::creation("descriptor pool"))?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate `count` sets of `layout`; they are freed with the pool
    pub fn allocate(&self, layout: &DescriptorSetLayout, count: usize) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout.handle(); count];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(VulkanError::creation("descriptor sets"))
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Resources referenced by one image's descriptor set
#[derive(Debug, Clone, Copy)]
pub struct FrameBindings {
    /// Uniform buffer backing bindings 0 and 1
    pub uniform_buffer: vk::Buffer,
    /// Size of the uniform block
    pub uniform_range: vk::DeviceSize,
    /// Texture view for binding 2
    pub image_view: vk::ImageView,
    /// Texture sampler for binding 2
    pub sampler: vk::Sampler,
}

/// Point all three bindings of `set` at this frame's resources
pub fn write_frame_set(device: &Device, set: vk::DescriptorSet, resources: &FrameBindings) {
    let buffer_info = [vk::DescriptorBufferInfo {
        buffer: resources.uniform_buffer,
        offset: 0,
        range: resources.uniform_range,
    }];
    let image_info = [vk::DescriptorImageInfo {
        sampler: resources.sampler,
        image_view: resources.image_view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }];

    let writes = [
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding::CAMERA)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info)
            .build(),
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding::NODE)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
            .buffer_info(&buffer_info)
            .build(),
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(binding::TEXTURE)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info)
            .build(),
    ];

    unsafe { device.update_descriptor_sets(&writes, &[]) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_layout_bindings() {
        let builder = DescriptorSetLayoutBuilder::viewer_layout();
        let summary: Vec<_> = builder
            .bindings()
            .iter()
            .map(|b| (b.binding, b.descriptor_type, b.stage_flags))
            .collect();

        assert_eq!(
            summary,
            vec![
                (0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX),
                (1, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, vk::ShaderStageFlags::VERTEX),
                (2, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, vk::ShaderStageFlags::FRAGMENT),
            ]
        );
    }

    #[test]
    fn pool_has_one_descriptor_per_binding_per_image() {
        let builder = DescriptorSetLayoutBuilder::viewer_layout();
        let sizes = pool_sizes(builder.bindings(), 3);
        let summary: Vec<_> = sizes.iter().map(|s| (s.ty, s.descriptor_count)).collect();
        assert_eq!(
            summary,
            vec![
                (vk::DescriptorType::UNIFORM_BUFFER, 3),
                (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 3),
                (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 3),
            ]
        );
    }
}
