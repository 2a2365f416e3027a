//! Frame orchestration
//!
//! [`Renderer`] owns the device and everything created from it. Swapchain-sized
//! resources live in [`SwapchainResources`] and are rebuilt as a unit when the
//! surface changes; models, textures, the descriptor layout and the command pool
//! survive recreation.
//!
//! Per tick a frame slot moves through [`FramePhase`]: wait on the slot fence,
//! acquire an image, update its uniform block, wait for any other slot still
//! using that image, submit the pre-recorded command buffer, present, advance.

use super::buffer::Buffer;
use super::commands::{record_model_draw, CommandBuffers, CommandPool, DrawGeometry, DrawTarget};
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::descriptor::{write_frame_set, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, FrameBindings};
use super::framebuffer::{Framebuffer, RenderTargets};
use super::image::find_depth_format;
use super::model_buffers::ModelBufferManager;
use super::render_pass::RenderPass;
use super::shader::GraphicsPipeline;
use super::swapchain::Swapchain;
use super::sync::{next_frame, wait_for_fence, FrameSync, ImagesInFlight};
use super::textures::{GpuTexture, TextureManager};
use super::uniform::UniformBufferObject;
use super::upload::Uploader;
use super::window::{wait_while_minimized, RenderWindow, WindowEventHandler};
use crate::assets::{ModelId, ModelsCollection, TextureId, TexturesCollection};
use crate::core::config::{RendererConfig, ShaderConfig};
use crate::foundation::math::Mat4;
use crate::scene::SceneNode;
use ash::vk;

/// Where a frame slot is within one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Waiting for the slot's previous submission
    Idle,
    /// Acquiring a swapchain image
    Acquiring,
    /// Writing the image's uniform block
    Recording,
    /// Commands handed to the graphics queue
    Submitted,
    /// Image handed to the present queue
    Presenting,
}

/// What a tick does with the result of acquiring an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Draw into this swapchain image
    Draw(u32),
    /// Rebuild the swapchain and end the tick on the same frame slot
    Recreate,
}

/// Classify an acquire result; a suboptimal image is still drawn
pub fn acquire_outcome(result: VulkanResult<(u32, bool)>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((index, _suboptimal)) => Ok(AcquireOutcome::Draw(index)),
        Err(e) if e.is_recoverable() => Ok(AcquireOutcome::Recreate),
        Err(e) => Err(e),
    }
}

/// Whether the swapchain has to be rebuilt after a present
///
/// A suboptimal or stale present and a flagged resize all rebuild; any other
/// error is returned.
pub fn present_outcome(result: VulkanResult<bool>, resized: bool) -> VulkanResult<bool> {
    match result {
        Ok(suboptimal) => Ok(suboptimal || resized),
        Err(e) if e.is_recoverable() => Ok(true),
        Err(e) => Err(e),
    }
}

/// Everything whose size or count follows the swapchain
///
/// Fields drop in declaration order, so users go before what they reference.
/// Underscored fields are only held so they live as long as the command buffers.
struct SwapchainResources {
    command_buffers: CommandBuffers,
    _descriptor_pool: DescriptorPool,
    uniform_buffers: Vec<Buffer>,
    _framebuffers: Vec<Framebuffer>,
    _targets: RenderTargets,
    _pipeline: GraphicsPipeline,
    _render_pass: RenderPass,
    swapchain: Swapchain,
    images_in_flight: ImagesInFlight<vk::Fence>,
}

/// Long-lived state a swapchain rebuild reads from
struct SwapchainInputs<'a> {
    context: &'a VulkanContext,
    command_pool: &'a CommandPool,
    layout: &'a DescriptorSetLayout,
    shaders: &'a ShaderConfig,
    depth_format: vk::Format,
    geometry: DrawGeometry,
    texture: &'a GpuTexture,
}

impl SwapchainResources {
    fn new(inputs: &SwapchainInputs<'_>, framebuffer_size: (u32, u32)) -> VulkanResult<Self> {
        let context = inputs.context;
        let device = context.device();
        let samples = context.physical_device.msaa_samples;

        let swapchain = Swapchain::new(context, framebuffer_size)?;
        let extent = swapchain.extent();
        let color_format = swapchain.format().format;
        let image_count = swapchain.image_count();

        let render_pass = RenderPass::new_msaa_pass(device.clone(), color_format, inputs.depth_format, samples)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            render_pass.handle(),
            inputs.layout.handle(),
            inputs.shaders,
            extent,
            samples,
        )?;
        let targets = RenderTargets::new(context, color_format, inputs.depth_format, extent, samples)?;
        let framebuffers = targets.framebuffers(device, render_pass.handle(), swapchain.image_views(), extent)?;

        let uniform_buffers = (0..image_count)
            .map(|_| {
                Buffer::new(
                    context,
                    UniformBufferObject::SIZE,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptor_pool = DescriptorPool::for_layout(device, inputs.layout, image_count as u32)?;
        let descriptor_sets = descriptor_pool.allocate(inputs.layout, image_count)?;
        for (&set, uniform_buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            write_frame_set(
                device,
                set,
                &FrameBindings {
                    uniform_buffer: uniform_buffer.handle(),
                    uniform_range: UniformBufferObject::SIZE,
                    image_view: inputs.texture.view(),
                    sampler: inputs.texture.sampler(),
                },
            );
        }

        let command_buffers = inputs.command_pool.allocate(image_count as u32)?;
        for (index, (&command_buffer, framebuffer)) in command_buffers.handles().iter().zip(&framebuffers).enumerate() {
            let target = DrawTarget {
                render_pass: render_pass.handle(),
                framebuffer: framebuffer.handle(),
                extent,
                pipeline: pipeline.handle(),
                pipeline_layout: pipeline.layout(),
                descriptor_set: descriptor_sets[index],
            };
            record_model_draw(device, command_buffer, &target, &inputs.geometry)?;
        }

        Ok(Self {
            command_buffers,
            _descriptor_pool: descriptor_pool,
            uniform_buffers,
            _framebuffers: framebuffers,
            _targets: targets,
            _pipeline: pipeline,
            _render_pass: render_pass,
            swapchain,
            images_in_flight: ImagesInFlight::new(image_count),
        })
    }
}

/// Draws one model with one texture every frame
pub struct Renderer {
    swapchain_resources: Option<SwapchainResources>,
    frames: Vec<FrameSync>,
    textures: TextureManager,
    models: ModelBufferManager,
    descriptor_set_layout: DescriptorSetLayout,
    command_pool: CommandPool,
    context: VulkanContext,
    shaders: ShaderConfig,
    depth_format: vk::Format,
    model_id: ModelId,
    texture_id: TextureId,
    node_transform: Mat4,
    current_frame: usize,
    framebuffer_resized: bool,
}

impl Renderer {
    /// Bring up the device, upload every model and texture and build the swapchain
    ///
    /// `node` picks the model and texture that are drawn and supplies the
    /// transform applied in front of the spin.
    pub fn new(
        window: &mut dyn RenderWindow,
        config: &RendererConfig,
        models: &ModelsCollection,
        textures: &TexturesCollection,
        node: &SceneNode,
    ) -> VulkanResult<Self> {
        let (Some(model_id), Some(texture_id)) = (node.model, node.texture) else {
            return Err(VulkanError::InvalidOperation {
                reason: format!("scene node {:?} has no model or no texture", node.id),
            });
        };

        let context = VulkanContext::new(window, config)?;
        let command_pool = CommandPool::new(context.device().clone(), context.physical_device.queue_families.graphics)?;

        let mut model_buffers = ModelBufferManager::new();
        let mut texture_manager = TextureManager::new();
        {
            let uploader = Uploader::new(&context, &command_pool);
            model_buffers.bind_models(&uploader, models)?;
            texture_manager.bind_textures(&uploader, textures)?;
        }

        let descriptor_set_layout = DescriptorSetLayoutBuilder::viewer_layout().build(context.device())?;
        let depth_format = find_depth_format(&context)?;
        let frames = FrameSync::for_frames_in_flight(context.device())?;

        let mut renderer = Self {
            swapchain_resources: None,
            frames,
            textures: texture_manager,
            models: model_buffers,
            descriptor_set_layout,
            command_pool,
            context,
            shaders: config.shaders.clone(),
            depth_format,
            model_id,
            texture_id,
            node_transform: node.local_matrix(),
            current_frame: 0,
            framebuffer_resized: false,
        };

        let size = wait_while_minimized(window);
        renderer.swapchain_resources = Some(renderer.build_swapchain_resources(size)?);

        log::info!("Renderer ready");
        Ok(renderer)
    }

    fn build_swapchain_resources(&self, framebuffer_size: (u32, u32)) -> VulkanResult<SwapchainResources> {
        let (vertex_buffer, index_buffer) = self.models.buffers()?;
        let inputs = SwapchainInputs {
            context: &self.context,
            command_pool: &self.command_pool,
            layout: &self.descriptor_set_layout,
            shaders: &self.shaders,
            depth_format: self.depth_format,
            geometry: DrawGeometry {
                vertex_buffer,
                index_buffer,
                offset: self.models.model_offset(self.model_id)?,
            },
            texture: self.textures.texture(self.texture_id)?,
        };
        SwapchainResources::new(&inputs, framebuffer_size)
    }

    /// Tear down and rebuild every swapchain-sized resource
    ///
    /// Blocks while the framebuffer is empty, then until the device is idle.
    /// Consumes any pending resize notification.
    pub fn recreate_swapchain(&mut self, window: &mut dyn RenderWindow) -> VulkanResult<()> {
        let size = wait_while_minimized(window);
        self.context.wait_idle()?;
        self.framebuffer_resized = false;

        self.swapchain_resources = None;
        self.swapchain_resources = Some(self.build_swapchain_resources(size)?);

        log::info!("Recreated swapchain for {}x{} framebuffer", size.0, size.1);
        Ok(())
    }

    fn trace_phase(&self, phase: FramePhase) {
        log::trace!("frame slot {}: {:?}", self.current_frame, phase);
    }

    /// Render and present one frame
    pub fn draw_frame(&mut self, window: &mut dyn RenderWindow) -> VulkanResult<()> {
        if self.swapchain_resources.is_none() {
            return self.recreate_swapchain(window);
        }

        self.trace_phase(FramePhase::Idle);
        let frame = &self.frames[self.current_frame];
        frame.in_flight.wait()?;

        self.trace_phase(FramePhase::Acquiring);
        let acquired = match &self.swapchain_resources {
            Some(resources) => resources.swapchain.acquire_next_image(frame.image_available.handle()),
            None => Err(VulkanError::SwapchainStale),
        };
        let image_index = match acquire_outcome(acquired)? {
            AcquireOutcome::Draw(index) => index,
            AcquireOutcome::Recreate => return self.recreate_swapchain(window),
        };

        self.trace_phase(FramePhase::Recording);
        let time = window.time() as f32;
        let device = self.context.device();
        let frame = &self.frames[self.current_frame];
        let in_flight = frame.in_flight.handle();

        let present_result = {
            let Some(resources) = self.swapchain_resources.as_mut() else {
                return Err(VulkanError::SwapchainStale);
            };
            let image = image_index as usize;

            let ubo = UniformBufferObject::for_frame(time, resources.swapchain.extent(), &self.node_transform);
            let uniform_buffer = resources.uniform_buffers.get(image).ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no uniform buffer for swapchain image {image}"),
            })?;
            uniform_buffer.write_data(&[ubo])?;

            if let Some(previous) = resources.images_in_flight.claim(image, in_flight)? {
                wait_for_fence(device, previous)?;
            }

            let wait_semaphores = [frame.image_available.handle()];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [resources.command_buffers.get(image)?];
            let signal_semaphores = [frame.render_finished.handle()];
            let submit_info = vk::SubmitInfo::builder()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores)
                .build();

            frame.in_flight.reset()?;
            unsafe { device.queue_submit(self.context.graphics_queue(), &[submit_info], in_flight) }
                .map_err(VulkanError::Api)?;
            log::trace!("frame slot {}: {:?}", self.current_frame, FramePhase::Submitted);

            resources.swapchain.present(
                self.context.present_queue(),
                frame.render_finished.handle(),
                image_index,
            )
        };

        self.trace_phase(FramePhase::Presenting);
        if present_outcome(present_result, self.framebuffer_resized)? {
            self.recreate_swapchain(window)?;
        }

        self.current_frame = next_frame(self.current_frame);
        Ok(())
    }

    /// Frame slot the next tick uses
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Current swapchain extent, if a swapchain exists
    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.swapchain_resources
            .as_ref()
            .map(|resources| resources.swapchain.extent())
    }

    /// The device context
    pub fn context(&self) -> &VulkanContext {
        &self.context
    }

    /// Flag the swapchain for recreation after the next present
    pub fn notify_resized(&mut self) {
        self.framebuffer_resized = true;
    }
}

impl WindowEventHandler for Renderer {
    type Error = VulkanError;

    fn on_resize(&mut self, width: u32, height: u32) {
        log::debug!("Resize to {width}x{height} flagged");
        self.notify_resized();
    }

    fn on_render(&mut self, window: &mut dyn RenderWindow, _delta_seconds: f64) -> VulkanResult<()> {
        self.draw_frame(window)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.context.wait_idle() {
            log::error!("Failed to wait for device idle during shutdown: {e}");
        }
        // Swapchain resources reference the layout, pool and uploads below them
        self.swapchain_resources = None;
        log::debug!("Renderer resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_lost() -> VulkanError {
        VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)
    }

    #[test]
    fn acquired_image_is_drawn_even_when_suboptimal() {
        assert_eq!(acquire_outcome(Ok((2, false))).unwrap(), AcquireOutcome::Draw(2));
        assert_eq!(acquire_outcome(Ok((1, true))).unwrap(), AcquireOutcome::Draw(1));
    }

    #[test]
    fn stale_acquire_recreates_on_the_same_slot() {
        assert_eq!(
            acquire_outcome(Err(VulkanError::SwapchainStale)).unwrap(),
            AcquireOutcome::Recreate
        );
    }

    #[test]
    fn other_acquire_errors_are_fatal() {
        assert!(matches!(
            acquire_outcome(Err(device_lost())),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn present_rebuilds_when_suboptimal_stale_or_resized() {
        assert!(present_outcome(Ok(true), false).unwrap());
        assert!(present_outcome(Ok(false), true).unwrap());
        assert!(present_outcome(Err(VulkanError::SwapchainStale), false).unwrap());
    }

    #[test]
    fn clean_present_without_pending_resize_keeps_swapchain() {
        // A rebuild at acquire clears the resize flag, so the following present is clean
        assert!(!present_outcome(Ok(false), false).unwrap());
    }

    #[test]
    fn other_present_errors_are_fatal() {
        assert!(matches!(
            present_outcome(Err(device_lost()), true),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert!(present_outcome(
            Err(VulkanError::creation("present")(vk::Result::ERROR_SURFACE_LOST_KHR)),
            false
        )
        .is_err());
    }
}
