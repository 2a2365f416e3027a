//! Rendering backends

/// Vulkan renderer
pub mod vulkan;
