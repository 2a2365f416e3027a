//! Asset loading and storage
//!
//! Models and textures are decoded on the CPU and kept in id-keyed collections
//! until the renderer uploads them.

pub mod collection;
pub mod image_loader;
pub mod model;
pub mod obj_loader;

pub use collection::{AssetCollection, AssetId};
pub use image_loader::Texture;
pub use model::{Model, Vertex};
pub use obj_loader::ObjLoader;

use std::path::PathBuf;
use thiserror::Error;

/// Marker for types stored in an [`AssetCollection`]
pub trait Asset {
    /// Human-readable kind used in log and error messages
    const KIND: &'static str;
}

/// Id of a model inside a [`ModelsCollection`]
pub type ModelId = AssetId<Model>;
/// Id of a texture inside a [`TexturesCollection`]
pub type TextureId = AssetId<Texture>;
/// All models loaded for the session
pub type ModelsCollection = AssetCollection<Model>;
/// All textures loaded for the session
pub type TexturesCollection = AssetCollection<Texture>;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// The file does not exist
    #[error("Asset file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// An id that was never issued by the collection
    #[error("No {kind} with id {id}")]
    NotFound {
        /// Asset kind, e.g. "model"
        kind: &'static str,
        /// The id that was looked up
        id: u32,
    },

    /// IO error while reading an asset
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed model file
    #[error("Parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Decoder or format failure
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),
}

impl AssetCollection<Model> {
    /// Load an OBJ model from disk and insert it
    pub fn load<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<ModelId, AssetError> {
        let model = ObjLoader::load_model(path)?;
        Ok(self.insert(model))
    }
}

impl AssetCollection<Texture> {
    /// Load a texture image from disk and insert it
    pub fn load<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<TextureId, AssetError> {
        let texture = Texture::from_file(path)?;
        Ok(self.insert(texture))
    }
}
