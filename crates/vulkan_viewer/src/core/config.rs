//! # Viewer Configuration
//!
//! Window, renderer, shader and asset settings for the viewer. Every section has a
//! working default so the binary runs without a config file; a `viewer.toml` or
//! `viewer.ron` next to the executable overrides any subset of it.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

/// Default location of the compiled vertex shader
pub const DEFAULT_VERTEX_SHADER: &str = "shaders/default/shader.vert.spv";
/// Default location of the compiled fragment shader
pub const DEFAULT_FRAGMENT_SHADER: &str = "shaders/default/shader.frag.spv";

/// # Shader Configuration
///
/// Paths to the precompiled SPIR-V binaries. They are re-read every time the
/// graphics pipeline is rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(ConfigError::Invalid(format!("Vertex shader not found: {}", self.vertex_shader_path)));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(ConfigError::Invalid(format!(
                "Fragment shader not found: {}",
                self.fragment_shader_path
            )));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new(DEFAULT_VERTEX_SHADER, DEFAULT_FRAGMENT_SHADER)
    }
}

/// # Renderer Configuration
///
/// Settings consumed by the Vulkan bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable the Khronos validation layer (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// Shader configuration
    pub shaders: ShaderConfig,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            enable_validation: None,
            shaders: ShaderConfig::default(),
        }
    }

    /// Set custom shader configuration
    #[must_use]
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Enable or disable validation layers
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation is requested, resolving the automatic setting
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }
        if self.application_name.contains('\0') {
            return Err(ConfigError::Invalid("Application name cannot contain NUL".to_string()));
        }
        self.shaders.validate()
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Vulkan Viewer")
    }
}

/// Window creation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Model and texture files loaded at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Wavefront OBJ model
    pub model_path: String,
    /// Texture image (PNG or JPEG)
    pub texture_path: String,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model_path: "assets/viking_room.obj".to_string(),
            texture_path: "assets/viking_room.png".to_string(),
        }
    }
}

/// Top-level viewer configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Startup assets
    pub assets: AssetConfig,
}

impl ViewerConfig {
    /// Validate values that would otherwise fail deep inside window or device creation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        self.renderer.validate()
    }
}

impl Config for ViewerConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn defaults_match_viewer_conventions() {
        let config = ViewerConfig::default();
        assert_eq!(config.window.title, "Vulkan");
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.renderer.shaders.vertex_shader_path, "shaders/default/shader.vert.spv");
        assert_eq!(config.renderer.shaders.fragment_shader_path, "shaders/default/shader.frag.spv");
        assert_eq!(config.renderer.enable_validation, None);
    }

    #[test]
    fn validation_flag_resolves_automatic_setting() {
        let auto = RendererConfig::default();
        assert_eq!(auto.validation_enabled(), cfg!(debug_assertions));
        assert!(RendererConfig::default().with_validation(true).validation_enabled());
        assert!(!RendererConfig::default().with_validation(false).validation_enabled());
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() {
        let text = r#"
            [window]
            title = "Viking Room"

            [assets]
            model_path = "models/room.obj"
        "#;
        let config = ViewerConfig::from_str_with_format(text, ConfigFormat::Toml).unwrap();
        assert_eq!(config.window.title, "Viking Room");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.assets.model_path, "models/room.obj");
        assert_eq!(config.assets.texture_path, "assets/viking_room.png");
    }

    #[test]
    fn ron_output_parses_back() {
        let mut config = ViewerConfig::default();
        config.renderer = config.renderer.with_validation(false);
        let text = config.to_string_with_format(ConfigFormat::Ron).unwrap();
        let parsed = ViewerConfig::from_str_with_format(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_sized_window_is_rejected() {
        let mut config = ViewerConfig::default();
        config.window.height = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_shader_files_are_reported() {
        let shaders = ShaderConfig::new("does/not/exist.vert.spv", "does/not/exist.frag.spv");
        let err = shaders.validate().unwrap_err();
        assert!(err.to_string().contains("Vertex shader not found"));
    }
}
