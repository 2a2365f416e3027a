//! Model viewer
//!
//! Opens a window and spins one textured model in front of a fixed camera.
//! Settings come from `viewer.toml` in the working directory when it exists.

use thiserror::Error;
use vulkan_viewer::foundation::logging;
use vulkan_viewer::prelude::*;

const CONFIG_PATH: &str = "viewer.toml";

/// Anything that ends the viewer
#[derive(Error, Debug)]
enum ViewerError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("window: {0}")]
    Window(#[from] WindowError),

    #[error("asset: {0}")]
    Asset(#[from] AssetError),

    #[error("renderer: {0}")]
    Vulkan(#[from] VulkanError),

    #[error("scene has no node with both a model and a texture")]
    NothingToDraw,
}

fn run() -> Result<(), ViewerError> {
    let config = ViewerConfig::load_or_default(CONFIG_PATH)?;
    config.validate()?;

    let mut models = ModelsCollection::new();
    let model = models.load(&config.assets.model_path)?;
    let mut textures = TexturesCollection::new();
    let texture = textures.load(&config.assets.texture_path)?;

    let mut scene = Scene::new("viewer");
    scene.add_node(Transform::identity(), Some(model), Some(texture));
    let node = scene.first_renderable().ok_or(ViewerError::NothingToDraw)?;

    let mut window = GlfwWindow::new(&config.window)?;
    // Declared after the window so it is dropped first
    let mut renderer = Renderer::new(&mut window, &config.renderer, &models, &textures, node)?;
    window.run(&mut renderer)?;

    log::info!("Viewer finished");
    Ok(())
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
