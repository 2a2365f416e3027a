//! Command buffer management
//!
//! Pool and buffer ownership, scoped recording with a render pass guard, the
//! blocking one-shot submit path used by uploads, and the per-image draw recording.

use super::context::{VulkanError, VulkanResult};
use super::model_buffers::ModelOffset;
use ash::{vk, Device};

/// Clear color for the MSAA color attachment
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Clear values in attachment order: color, depth, resolve (ignored)
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: CLEAR_COLOR },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ]
}

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None) }
            .map_err(VulkanError::creation("command pool"))?;

        Ok(Self { device, command_pool })
    }

    /// Allocate primary command buffers, freed again when the result drops
    pub fn allocate(&self, count: u32) -> VulkanResult<CommandBuffers> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(VulkanError::creation("command buffers"))?;

        Ok(CommandBuffers {
            device: self.device.clone(),
            pool: self.command_pool,
            buffers,
        })
    }

    /// Record, submit and wait for a single-use command buffer
    ///
    /// Blocks on `queue_wait_idle`. The buffer is freed on every path.
    pub fn execute_one_shot<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer) -> VulkanResult<()>,
    {
        let buffers = self.allocate(1)?;
        let command_buffer = buffers.get(0)?;

        let mut recorder = CommandRecorder::new(self.device.clone(), command_buffer);
        recorder.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
        record(&self.device, command_buffer)?;
        recorder.end()?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();

        unsafe {
            self.device
                .queue_submit(queue, &[submit_info], vk::Fence::null())
                .map_err(VulkanError::Api)?;
            self.device.queue_wait_idle(queue).map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    /// Get the command pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Command buffers allocated from a [`CommandPool`]
///
/// Must be dropped before the pool they came from.
pub struct CommandBuffers {
    device: Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    /// Buffer at `index`
    pub fn get(&self, index: usize) -> VulkanResult<vk::CommandBuffer> {
        self.buffers.get(index).copied().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("command buffer {index} of {} requested", self.buffers.len()),
        })
    }

    /// All buffer handles
    pub fn handles(&self) -> &[vk::CommandBuffer] {
        &self.buffers
    }

    /// Number of buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffers were allocated
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            unsafe { self.device.free_command_buffers(self.pool, &self.buffers) };
        }
    }
}

/// Tracks the begin/end state of one command buffer
pub struct CommandRecorder {
    device: Device,
    command_buffer: vk::CommandBuffer,
    recording: bool,
}

impl CommandRecorder {
    /// Wrap a command buffer that is not yet recording
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            recording: false,
        }
    }

    /// Begin command recording
    pub fn begin(&mut self, flags: vk::CommandBufferUsageFlags) -> VulkanResult<()> {
        if self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer already recording".to_string(),
            });
        }

        let begin_info = vk::CommandBufferBeginInfo::builder().flags(flags);
        unsafe { self.device.begin_command_buffer(self.command_buffer, &begin_info) }.map_err(VulkanError::Api)?;

        self.recording = true;
        Ok(())
    }

    /// Begin an inline render pass; it ends when the guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) -> VulkanResult<ActiveRenderPass<'_>> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        Ok(ActiveRenderPass { recorder: self })
    }

    /// End command recording
    pub fn end(&mut self) -> VulkanResult<()> {
        if !self.recording {
            return Err(VulkanError::InvalidOperation {
                reason: "Command buffer not recording".to_string(),
            });
        }

        unsafe { self.device.end_command_buffer(self.command_buffer) }.map_err(VulkanError::Api)?;
        self.recording = false;
        Ok(())
    }
}

/// Render pass scope; `cmd_end_render_pass` is recorded on drop
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    /// Bind a graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind one vertex buffer to binding 0 at `offset`
    pub fn bind_vertex_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.recorder
                .device
                .cmd_bind_vertex_buffers(self.recorder.command_buffer, 0, &[buffer], &[offset]);
        }
    }

    /// Bind a `u32` index buffer at `offset`
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: vk::DeviceSize) {
        unsafe {
            self.recorder.device.cmd_bind_index_buffer(
                self.recorder.command_buffer,
                buffer,
                offset,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Bind a descriptor set at set 0 with the given dynamic offsets
    pub fn bind_descriptor_set(
        &mut self,
        layout: vk::PipelineLayout,
        descriptor_set: vk::DescriptorSet,
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[descriptor_set],
                dynamic_offsets,
            );
        }
    }

    /// Draw indexed
    pub fn draw_indexed(&mut self, index_count: u32, first_index: u32, vertex_offset: i32) {
        unsafe {
            self.recorder.device.cmd_draw_indexed(
                self.recorder.command_buffer,
                index_count,
                1,
                first_index,
                vertex_offset,
                0,
            );
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}

/// Everything one swapchain image's command buffer references
#[derive(Debug, Clone, Copy)]
pub struct DrawTarget {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Framebuffer for this swapchain image
    pub framebuffer: vk::Framebuffer,
    /// Render area
    pub extent: vk::Extent2D,
    /// Graphics pipeline
    pub pipeline: vk::Pipeline,
    /// Layout the descriptor set is bound against
    pub pipeline_layout: vk::PipelineLayout,
    /// Descriptor set for this swapchain image
    pub descriptor_set: vk::DescriptorSet,
}

/// Shared geometry buffers and the range of the model to draw
#[derive(Debug, Clone, Copy)]
pub struct DrawGeometry {
    /// Shared vertex buffer
    pub vertex_buffer: vk::Buffer,
    /// Shared index buffer
    pub index_buffer: vk::Buffer,
    /// Where the model lives inside the shared buffers
    pub offset: ModelOffset,
}

/// Record the single indexed draw of one model into `command_buffer`
///
/// The buffers are bound at the model's byte offsets, so the draw itself starts
/// at index 0 and vertex 0.
pub fn record_model_draw(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    target: &DrawTarget,
    geometry: &DrawGeometry,
) -> VulkanResult<()> {
    let mut recorder = CommandRecorder::new(device.clone(), command_buffer);
    recorder.begin(vk::CommandBufferUsageFlags::empty())?;

    let clear_values = clear_values();
    {
        let mut pass = recorder.begin_render_pass(target.render_pass, target.framebuffer, target.extent, &clear_values)?;
        pass.bind_pipeline(target.pipeline);
        pass.bind_vertex_buffer(geometry.vertex_buffer, geometry.offset.vertex_byte_offset);
        pass.bind_index_buffer(geometry.index_buffer, geometry.offset.index_byte_offset);
        pass.bind_descriptor_set(target.pipeline_layout, target.descriptor_set, &[0]);
        pass.draw_indexed(geometry.offset.index_element_count, 0, 0);
    }

    recorder.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_to_opaque_black_and_far_depth() {
        let values = clear_values();
        unsafe {
            assert_eq!(values[0].color.float32, [0.0, 0.0, 0.0, 1.0]);
            assert_eq!(values[1].depth_stencil.depth, 1.0);
            assert_eq!(values[1].depth_stencil.stencil, 0);
        }
    }
}
