/// GraphicsDevice trait - the single seam between the engine and the GPU API
///
/// The backend owns every GPU object in its own storage and hands out typed
/// ids (see `handles.rs`). The `Renderer` never touches API pointers, which
/// keeps its frame protocol testable against a recording mock.

use crate::error::Result;
use crate::graphics_device::{
    AcquireOutcome, BufferDesc, ClearValue, CommandBufferId, DescriptorPoolDesc, DescriptorPoolId,
    DescriptorSetId, DescriptorSetLayoutDesc, DescriptorSetLayoutId, DescriptorWrite, Extent2D,
    FenceId, FramebufferDesc, FramebufferId, GpuBufferId, GpuImageId, GpuPipelineId,
    GraphicsPipelineDesc, ImageDesc, ImageLayout, IndexType, PipelineLayoutDesc, PipelineLayoutId,
    PresentOutcome, Rect2D, RenderPassDesc, RenderPassId, SemaphoreId, ShaderDesc, ShaderId,
    ShaderStageFlags, SwapchainInfo, Viewport,
};

/// Static information about the selected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human readable adapter name
    pub name: String,
    /// True for a discrete GPU
    pub discrete: bool,
}

/// Queue submission description
///
/// Command buffers execute in slice order. Wait semaphores gate the color
/// attachment output stage.
#[derive(Debug, Clone, Copy)]
pub struct SubmitInfo<'a> {
    pub command_buffers: &'a [CommandBufferId],
    pub wait_semaphores: &'a [SemaphoreId],
    pub signal_semaphores: &'a [SemaphoreId],
    pub fence: Option<FenceId>,
}

/// Explicit GPU device abstraction
///
/// All waits use an infinite timeout.
pub trait GraphicsDevice {
    /// Adapter information
    fn info(&self) -> &DeviceInfo;

    // ===== SWAPCHAIN =====

    /// Create the presentable image chain for the device's surface
    ///
    /// # Arguments
    ///
    /// * `extent` - Desired extent, clamped by the backend to the surface capabilities
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the surface cannot back a swapchain.
    fn create_swapchain(&mut self, extent: Extent2D) -> Result<SwapchainInfo>;

    /// Recreate the swapchain after a resize or an out-of-date report
    ///
    /// The caller guarantees the device is idle. Image ids returned by
    /// `swapchain_images` before the call become invalid.
    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<SwapchainInfo>;

    /// Presentable images, indexed by acquired image index
    fn swapchain_images(&self) -> Result<Vec<GpuImageId>>;

    /// Acquire the next presentable image, signaling `signal` when it is ready
    fn acquire_next_image(&mut self, signal: SemaphoreId) -> Result<AcquireOutcome>;

    /// Queue `image_index` for presentation once `wait` is signaled
    fn present(&mut self, image_index: u32, wait: SemaphoreId) -> Result<PresentOutcome>;

    // ===== BUFFERS =====

    /// Create a buffer
    ///
    /// # Errors
    ///
    /// `OutOfMemory` if the allocation fails.
    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<GpuBufferId>;

    /// Copy `data` into a host-visible buffer at `offset`
    ///
    /// # Errors
    ///
    /// `InvalidResource` for an unknown id, a device-local buffer, or a write
    /// past the end of the buffer.
    fn write_buffer(&mut self, buffer: GpuBufferId, offset: u64, data: &[u8]) -> Result<()>;

    /// Record, submit and wait for a one-shot `src -> dst` copy of `size` bytes
    fn copy_buffer_immediate(&mut self, src: GpuBufferId, dst: GpuBufferId, size: u64) -> Result<()>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&mut self, buffer: GpuBufferId);

    // ===== IMAGES =====

    /// Create an image and its default view (2D or cube)
    fn create_image(&mut self, desc: &ImageDesc) -> Result<GpuImageId>;

    /// One-shot copy of a tightly packed staging buffer into every layer of
    /// `dst`, leaving it in the shader-readable layout. Blocks until done.
    fn copy_buffer_to_image_immediate(&mut self, src: GpuBufferId, dst: GpuImageId) -> Result<()>;

    /// One-shot layout transition from undefined to `layout`. Blocks until done.
    fn initialize_image_layout(&mut self, image: GpuImageId, layout: ImageLayout) -> Result<()>;

    /// Destroy an image, its view and its memory
    fn destroy_image(&mut self, image: GpuImageId);

    // ===== SHADERS, PASSES, FRAMEBUFFERS =====

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId>;
    fn destroy_shader(&mut self, shader: ShaderId);

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassId>;
    fn destroy_render_pass(&mut self, render_pass: RenderPassId);

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId);

    // ===== LAYOUTS AND PIPELINES =====

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutId>;
    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutId);

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutId>;
    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutId);

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<GpuPipelineId>;
    fn destroy_pipeline(&mut self, pipeline: GpuPipelineId);

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId>;

    /// Allocate one set from `pool`
    ///
    /// # Errors
    ///
    /// `BackendError` when the pool is exhausted. The engine checks capacity
    /// before calling, so this only fires on a backend bug.
    fn allocate_descriptor_set(&mut self, pool: DescriptorPoolId, layout: DescriptorSetLayoutId) -> Result<DescriptorSetId>;

    fn write_descriptor_set(&mut self, set: DescriptorSetId, writes: &[DescriptorWrite]) -> Result<()>;

    /// Destroy a pool and every set allocated from it
    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId);

    // ===== COMMAND BUFFERS =====

    /// Allocate a resettable primary command buffer
    fn allocate_command_buffer(&mut self) -> Result<CommandBufferId>;
    fn free_command_buffer(&mut self, cmd: CommandBufferId);

    /// Reset and begin recording
    fn begin_command_buffer(&mut self, cmd: CommandBufferId) -> Result<()>;
    fn end_command_buffer(&mut self, cmd: CommandBufferId) -> Result<()>;

    /// Begin a render pass over the whole framebuffer extent (inline contents)
    fn cmd_begin_render_pass(
        &mut self,
        cmd: CommandBufferId,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        extent: Extent2D,
        clear_values: &[ClearValue],
    ) -> Result<()>;
    fn cmd_end_render_pass(&mut self, cmd: CommandBufferId) -> Result<()>;

    fn cmd_set_viewport(&mut self, cmd: CommandBufferId, viewport: Viewport) -> Result<()>;
    fn cmd_set_scissor(&mut self, cmd: CommandBufferId, scissor: Rect2D) -> Result<()>;

    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferId, pipeline: GpuPipelineId) -> Result<()>;

    /// Bind `sets` to consecutive set numbers starting at `first_set`
    fn cmd_bind_descriptor_sets(
        &mut self,
        cmd: CommandBufferId,
        layout: PipelineLayoutId,
        first_set: u32,
        sets: &[DescriptorSetId],
    ) -> Result<()>;

    fn cmd_push_constants(
        &mut self,
        cmd: CommandBufferId,
        layout: PipelineLayoutId,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()>;

    fn cmd_bind_vertex_buffer(&mut self, cmd: CommandBufferId, binding: u32, buffer: GpuBufferId) -> Result<()>;
    fn cmd_bind_index_buffer(&mut self, cmd: CommandBufferId, buffer: GpuBufferId, index_type: IndexType) -> Result<()>;

    fn cmd_draw(&mut self, cmd: CommandBufferId, vertex_count: u32, instance_count: u32) -> Result<()>;
    fn cmd_draw_indexed(&mut self, cmd: CommandBufferId, index_count: u32, instance_count: u32) -> Result<()>;

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceId>;
    fn destroy_fence(&mut self, fence: FenceId);

    fn create_semaphore(&mut self) -> Result<SemaphoreId>;
    fn destroy_semaphore(&mut self, semaphore: SemaphoreId);

    /// Block until `fence` is signaled
    fn wait_for_fence(&mut self, fence: FenceId) -> Result<()>;

    /// Return `fence` to the unsignaled state
    fn reset_fence(&mut self, fence: FenceId) -> Result<()>;

    /// Submit to the graphics queue
    fn submit(&mut self, submit: &SubmitInfo) -> Result<()>;

    /// Block until the device has finished all submitted work
    fn wait_idle(&mut self) -> Result<()>;
}
