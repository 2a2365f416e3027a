//! Shared vertex and index buffers for every loaded model
//!
//! Models are packed back to back in collection order. Each model's position
//! inside the shared buffers is recorded as a [`ModelOffset`]. Binding a new set
//! of models replaces both buffers entirely.

use super::buffer::Buffer;
use super::context::{VulkanError, VulkanResult};
use super::upload::Uploader;
use crate::assets::{Model, ModelId, ModelsCollection, Vertex};
use ash::vk;
use std::collections::BTreeMap;
use std::mem::size_of;

/// Location of one model inside the shared buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelOffset {
    /// Byte offset of the first vertex
    pub vertex_byte_offset: vk::DeviceSize,
    /// Number of vertices
    pub vertex_element_count: u32,
    /// Size of the vertex range in bytes
    pub vertex_byte_size: vk::DeviceSize,
    /// Byte offset of the first index
    pub index_byte_offset: vk::DeviceSize,
    /// Offset of the first index in elements
    pub index_element_offset: u32,
    /// Number of indices
    pub index_element_count: u32,
    /// Size of the index range in bytes
    pub index_byte_size: vk::DeviceSize,
}

/// Offsets for a set of models plus the total buffer sizes they need
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedLayout {
    /// Per-model offsets in packing order
    pub offsets: Vec<(ModelId, ModelOffset)>,
    /// Bytes needed for every vertex
    pub vertex_bytes: vk::DeviceSize,
    /// Bytes needed for every index
    pub index_bytes: vk::DeviceSize,
}

/// Assign running offsets to `models` in iteration order
pub fn pack_models<'a>(models: impl IntoIterator<Item = (ModelId, &'a Model)>) -> PackedLayout {
    let vertex_stride = size_of::<Vertex>() as vk::DeviceSize;
    let index_stride = size_of::<u32>() as vk::DeviceSize;

    let mut layout = PackedLayout::default();
    let mut index_elements = 0u32;

    for (id, model) in models {
        let vertex_count = model.vertex_count() as u32;
        let index_count = model.index_count() as u32;

        let offset = ModelOffset {
            vertex_byte_offset: layout.vertex_bytes,
            vertex_element_count: vertex_count,
            vertex_byte_size: vk::DeviceSize::from(vertex_count) * vertex_stride,
            index_byte_offset: layout.index_bytes,
            index_element_offset: index_elements,
            index_element_count: index_count,
            index_byte_size: vk::DeviceSize::from(index_count) * index_stride,
        };

        layout.vertex_bytes += offset.vertex_byte_size;
        layout.index_bytes += offset.index_byte_size;
        index_elements += index_count;
        layout.offsets.push((id, offset));
    }

    layout
}

struct BoundBuffers {
    vertex: Buffer,
    index: Buffer,
}

/// Owns the shared model buffers and the offsets into them
#[derive(Default)]
pub struct ModelBufferManager {
    buffers: Option<BoundBuffers>,
    offsets: BTreeMap<ModelId, ModelOffset>,
}

impl ModelBufferManager {
    /// Manager with nothing bound
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shared buffers with the contents of `models`
    ///
    /// The previous buffers are released first. On failure the manager is left
    /// unbound.
    pub fn bind_models(&mut self, uploader: &Uploader<'_>, models: &ModelsCollection) -> VulkanResult<()> {
        self.buffers = None;
        self.offsets.clear();

        let layout = pack_models(models.iter());
        if layout.vertex_bytes == 0 || layout.index_bytes == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "no vertex or index data to bind".to_string(),
            });
        }

        let vertex_staging = Buffer::staging(uploader.context(), layout.vertex_bytes)?;
        let index_staging = Buffer::staging(uploader.context(), layout.index_bytes)?;
        for ((_, model), (_, offset)) in models.iter().zip(&layout.offsets) {
            vertex_staging.write_bytes(offset.vertex_byte_offset, bytemuck::cast_slice(model.vertices()))?;
            index_staging.write_bytes(offset.index_byte_offset, bytemuck::cast_slice(model.indices()))?;
        }

        let vertex = uploader.upload_from_staging(&vertex_staging, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index = uploader.upload_from_staging(&index_staging, vk::BufferUsageFlags::INDEX_BUFFER)?;

        for (id, offset) in &layout.offsets {
            log::debug!("Packed {id:?}: {offset:?}");
        }
        log::info!(
            "Bound {} model(s): {} vertex bytes, {} index bytes",
            layout.offsets.len(),
            layout.vertex_bytes,
            layout.index_bytes
        );

        self.buffers = Some(BoundBuffers { vertex, index });
        self.offsets = layout.offsets.into_iter().collect();
        Ok(())
    }

    /// Where `id` lives in the shared buffers
    pub fn model_offset(&self, id: ModelId) -> VulkanResult<ModelOffset> {
        self.offsets
            .get(&id)
            .copied()
            .ok_or_else(|| VulkanError::AssetNotFound(format!("{id:?} is not bound")))
    }

    /// Shared vertex and index buffer handles
    pub fn buffers(&self) -> VulkanResult<(vk::Buffer, vk::Buffer)> {
        self.buffers
            .as_ref()
            .map(|bound| (bound.vertex.handle(), bound.index.handle()))
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "model buffers are not bound".to_string(),
            })
    }

    /// Whether `bind_models` has succeeded
    pub fn is_bound(&self) -> bool {
        self.buffers.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Model {
        let white = [1.0, 1.0, 1.0];
        Model::new(
            vec![
                Vertex::new([-0.5, -0.5, 0.0], white, [0.0, 0.0]),
                Vertex::new([0.5, -0.5, 0.0], white, [1.0, 0.0]),
                Vertex::new([0.5, 0.5, 0.0], white, [1.0, 1.0]),
                Vertex::new([-0.5, 0.5, 0.0], white, [0.0, 1.0]),
            ],
            vec![0, 1, 2, 2, 3, 0],
        )
    }

    fn triangle() -> Model {
        let red = [1.0, 0.0, 0.0];
        Model::new(
            vec![
                Vertex::new([0.0, 0.0, 0.0], red, [0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0], red, [1.0, 0.0]),
                Vertex::new([0.0, 1.0, 0.0], red, [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn quad_packs_four_vertices_and_six_indices() {
        let mut models = ModelsCollection::new();
        let id = models.insert(quad());

        let layout = pack_models(models.iter());
        let (packed_id, offset) = layout.offsets[0];

        assert_eq!(packed_id, id);
        assert_eq!(offset.vertex_element_count, 4);
        assert_eq!(offset.index_element_count, 6);
        assert_eq!(offset.vertex_byte_size, 4 * 32);
        assert_eq!(offset.index_byte_size, 6 * 4);
        assert_eq!(layout.vertex_bytes, 128);
        assert_eq!(layout.index_bytes, 24);
    }

    #[test]
    fn offsets_are_contiguous_in_insertion_order() {
        let mut models = ModelsCollection::new();
        models.insert(quad());
        models.insert(triangle());
        models.insert(quad());

        let layout = pack_models(models.iter());
        let offsets: Vec<ModelOffset> = layout.offsets.iter().map(|(_, o)| *o).collect();

        let total_vertices: u32 = offsets.iter().map(|o| o.vertex_element_count).sum();
        assert_eq!(total_vertices, 4 + 3 + 4);
        assert_eq!(layout.vertex_bytes, u64::from(total_vertices) * 32);

        for pair in offsets.windows(2) {
            assert_eq!(pair[1].vertex_byte_offset, pair[0].vertex_byte_offset + pair[0].vertex_byte_size);
            assert_eq!(pair[1].index_byte_offset, pair[0].index_byte_offset + pair[0].index_byte_size);
            assert_eq!(
                pair[1].index_element_offset,
                pair[0].index_element_offset + pair[0].index_element_count
            );
            assert!(pair[1].vertex_byte_offset > pair[0].vertex_byte_offset);
        }

        assert_eq!(offsets[1].index_element_offset, 6);
        assert_eq!(offsets[2].index_element_offset, 9);
        assert_eq!(offsets[2].index_byte_offset, 36);
    }

    #[test]
    fn packing_is_idempotent() {
        let mut models = ModelsCollection::new();
        models.insert(quad());

        assert_eq!(pack_models(models.iter()), pack_models(models.iter()));
    }

    #[test]
    fn unbound_manager_rejects_use() {
        let manager = ModelBufferManager::new();
        assert!(!manager.is_bound());
        assert!(matches!(manager.buffers(), Err(VulkanError::InvalidOperation { .. })));

        let mut models = ModelsCollection::new();
        let id = models.insert(quad());
        assert!(matches!(manager.model_offset(id), Err(VulkanError::AssetNotFound(_))));
    }
}
