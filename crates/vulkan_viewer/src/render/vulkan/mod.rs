//! Vulkan rendering backend
//!
//! Leaf wrappers own one kind of Vulkan object each and release it on drop.
//! [`Renderer`] ties them together into the per-frame loop.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod image;
pub mod model_buffers;
pub mod render_pass;
pub mod renderer;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod textures;
pub mod uniform;
pub mod upload;
pub mod vertex_layout;
pub mod window;

pub use buffer::Buffer;
pub use commands::{CommandBuffers, CommandPool, CommandRecorder};
pub use context::{PhysicalDeviceInfo, QueueFamilyIndices, VulkanContext, VulkanError, VulkanResult};
pub use descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use framebuffer::{Framebuffer, RenderTargets};
pub use image::{GpuImage, ImageDesc};
pub use model_buffers::{ModelBufferManager, ModelOffset};
pub use render_pass::RenderPass;
pub use renderer::{acquire_outcome, present_outcome, AcquireOutcome, Renderer};
pub use shader::{GraphicsPipeline, ShaderModule};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, ImagesInFlight, Semaphore, MAX_FRAMES_IN_FLIGHT};
pub use textures::{GpuTexture, TextureManager};
pub use uniform::UniformBufferObject;
pub use upload::Uploader;
pub use vertex_layout::VulkanVertexLayout;
pub use window::{GlfwWindow, RenderWindow, WindowError, WindowEventHandler, WindowResult};
