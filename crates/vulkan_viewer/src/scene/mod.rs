//! Scene description
//!
//! A scene is a flat list of nodes. Each node carries a transform and optionally
//! the model and texture it draws with.

use crate::assets::{ModelId, TextureId};
use crate::foundation::math::{Mat4, Transform};

/// Id of a node within its [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

/// One entity in the scene
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Stable id assigned by the owning scene
    pub id: NodeId,
    /// Local transform
    pub transform: Transform,
    /// Model drawn for this node
    pub model: Option<ModelId>,
    /// Texture sampled when drawing the model
    pub texture: Option<TextureId>,
}

impl SceneNode {
    /// Whether the node has both a model and a texture
    pub fn is_renderable(&self) -> bool {
        self.model.is_some() && self.texture.is_some()
    }

    /// Local transform as a matrix
    pub fn local_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }
}

/// Named collection of scene nodes
#[derive(Debug, Clone, Default)]
pub struct Scene {
    name: String,
    next_id: u32,
    nodes: Vec<SceneNode>,
}

impl Scene {
    /// Create an empty scene
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_id: 0,
            nodes: Vec::new(),
        }
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a node and return its id
    pub fn add_node(
        &mut self,
        transform: Transform,
        model: Option<ModelId>,
        texture: Option<TextureId>,
    ) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.push(SceneNode {
            id,
            transform,
            model,
            texture,
        });
        id
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Mutable node lookup
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// First node with both a model and a texture
    pub fn first_renderable(&self) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.is_renderable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Model, ModelsCollection, Texture, TexturesCollection};
    use crate::foundation::math::Vec3;

    #[test]
    fn first_renderable_skips_incomplete_nodes() {
        let mut models = ModelsCollection::new();
        let model = models.insert(Model::new(Vec::new(), Vec::new()));
        let mut textures = TexturesCollection::new();
        let texture = textures.insert(Texture::solid_color(1, 1, [0; 4]));

        let mut scene = Scene::new("test");
        scene.add_node(Transform::identity(), Some(model), None);
        let drawn = scene.add_node(Transform::from_position(Vec3::x()), Some(model), Some(texture));

        assert_eq!(scene.first_renderable().map(|n| n.id), Some(drawn));
        assert_eq!(scene.nodes().len(), 2);
        assert_eq!(scene.name(), "test");
    }

    #[test]
    fn node_lookup_by_id() {
        let mut scene = Scene::new("lookup");
        let a = scene.add_node(Transform::identity(), None, None);
        let b = scene.add_node(Transform::from_position(Vec3::y()), None, None);
        assert_ne!(a, b);
        assert_eq!(scene.node(b).unwrap().transform.position, Vec3::y());

        scene.node_mut(a).unwrap().transform.position = Vec3::z();
        assert_eq!(scene.node(a).unwrap().local_matrix()[(2, 3)], 1.0);
        assert!(scene.first_renderable().is_none());
    }
}
