//! # Vulkan Viewer
//!
//! A minimal real-time renderer built directly on Vulkan. It loads one textured
//! triangle mesh, uploads it to device-local buffers and draws it every frame with
//! a perspective camera and a single combined image sampler.
//!
//! ## Layout
//!
//! - [`assets`]: model and texture loading, id-keyed collections
//! - [`scene`]: scene nodes selecting which model/texture pair is drawn
//! - [`render::vulkan`]: device bootstrap, swapchain, upload layer, GPU managers
//!   and the frame orchestrator
//! - [`core::config`]: serializable viewer configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vulkan_viewer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ViewerConfig::default();
//!     let mut window = GlfwWindow::new(&config.window)?;
//!
//!     let mut models = ModelsCollection::new();
//!     let model = models.load(&config.assets.model_path)?;
//!     let mut textures = TexturesCollection::new();
//!     let texture = textures.load(&config.assets.texture_path)?;
//!
//!     let mut scene = Scene::new("main");
//!     scene.add_node(Transform::identity(), Some(model), Some(texture));
//!     let node = scene.first_renderable().ok_or("nothing to draw")?;
//!
//!     let mut renderer = Renderer::new(&mut window, &config.renderer, &models, &textures, node)?;
//!     window.run(&mut renderer)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for viewer users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, Model, ModelId, ModelsCollection, Texture, TextureId, TexturesCollection, Vertex},
        core::config::{AssetConfig, RendererConfig, ShaderConfig, ViewerConfig, WindowConfig},
        config::{Config, ConfigError},
        foundation::math::{Mat4, Mat4Ext, Transform, Vec3},
        render::vulkan::{
            GlfwWindow, RenderWindow, Renderer, VulkanError, VulkanResult, WindowError,
            WindowEventHandler,
        },
        scene::{Scene, SceneNode},
    };
}
