/// Device object ids
///
/// Every object created through `GraphicsDevice` is owned by the backend in a
/// slotmap and referenced from the core by one of these keys. A key never
/// aliases a newer object after its own object is destroyed.

use slotmap::new_key_type;

new_key_type! {
    /// GPU buffer (vertex, index, uniform, storage or staging)
    pub struct GpuBufferId;
    /// GPU image together with its default view
    pub struct GpuImageId;
    /// Compiled shader module
    pub struct ShaderId;
    /// Render pass
    pub struct RenderPassId;
    /// Framebuffer
    pub struct FramebufferId;
    /// Descriptor set layout
    pub struct DescriptorSetLayoutId;
    /// Pipeline layout
    pub struct PipelineLayoutId;
    /// Compiled graphics pipeline
    pub struct GpuPipelineId;
    /// Descriptor pool
    pub struct DescriptorPoolId;
    /// Descriptor set
    pub struct DescriptorSetId;
    /// Primary command buffer
    pub struct CommandBufferId;
    /// Fence
    pub struct FenceId;
    /// Binary semaphore
    pub struct SemaphoreId;
}
