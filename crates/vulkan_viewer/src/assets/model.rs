//! Mesh data as it is uploaded to the GPU

use super::Asset;

/// Vertex data structure with position, color, and texture coordinates.
///
/// `#[repr(C)]` keeps the 32-byte layout the pipeline's vertex input expects.
/// Equality and hashing compare the raw bit patterns of every float, so two
/// vertices are merged during import only when they are bit-for-bit identical.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

// Only f32 arrays, no padding
unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, color, uv }
    }

    fn bits(&self) -> [u32; 8] {
        [
            self.position[0].to_bits(),
            self.position[1].to_bits(),
            self.position[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.uv[0].to_bits(),
            self.uv[1].to_bits(),
        ]
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl std::hash::Hash for Vertex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Immutable triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl Model {
    /// Create a model from already deduplicated vertex and index data
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Vertex data
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Triangle list indices into [`Model::vertices`]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

impl Asset for Model {
    const KIND: &'static str = "model";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn equality_is_bit_exact() {
        let a = Vertex::new([0.0, 1.0, 2.0], [1.0; 3], [0.5, 0.5]);
        let b = Vertex::new([-0.0, 1.0, 2.0], [1.0; 3], [0.5, 0.5]);
        let c = Vertex::new([0.0, 1.0, 2.000_000_2], [1.0; 3], [0.5, 0.5]);
        // -0.0 == 0.0 as floats but not as bits
        assert_ne!(a, b);
        assert_ne!(a, c);
        let copy = a;
        assert_eq!(a, copy);
    }

    #[test]
    fn hash_agrees_with_equality() {
        let a = Vertex::new([1.0, 2.0, 3.0], [1.0; 3], [0.0, 1.0]);
        let set: HashSet<Vertex> = [a, a, Vertex::default()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
