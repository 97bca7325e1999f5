/// Graphics device module - the GPU API seam and its description types

pub mod graphics_device;
pub mod handles;
pub mod buffer;
pub mod image;
pub mod command;
pub mod render_pass;
pub mod pipeline;
pub mod descriptor;
pub mod swapchain;

#[cfg(test)]
pub mod mock_graphics_device;

pub use graphics_device::{DeviceInfo, GraphicsDevice, SubmitInfo};
pub use handles::{
    CommandBufferId, DescriptorPoolId, DescriptorSetId, DescriptorSetLayoutId, FenceId,
    FramebufferId, GpuBufferId, GpuImageId, GpuPipelineId, PipelineLayoutId, RenderPassId,
    SemaphoreId, ShaderId,
};
pub use buffer::{BufferDesc, BufferUsage, MemoryLocation};
pub use image::{ImageDesc, ImageFormat, ImageKind, ImageUsage};
pub use command::{ClearValue, Extent2D, IndexType, Rect2D, Viewport};
pub use render_pass::{AttachmentDesc, FramebufferDesc, ImageLayout, LoadOp, RenderPassDesc, StoreOp};
pub use pipeline::{
    BlendMode, CompareOp, CullMode, DepthState, FrontFace, GraphicsPipelineDesc,
    PipelineLayoutDesc, PushConstantRange, RasterizationState, ShaderDesc, ShaderStage,
    ShaderStageFlags, VertexAttribute, VertexBinding, VertexFormat, VertexInputRate,
};
pub use descriptor::{
    DescriptorBinding, DescriptorPoolDesc, DescriptorResource, DescriptorSetLayoutDesc,
    DescriptorType, DescriptorWrite, SamplerKind,
};
pub use swapchain::{AcquireOutcome, PresentOutcome, SwapchainInfo};
