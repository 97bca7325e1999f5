/// Render pass and framebuffer description types

use crate::graphics_device::{Extent2D, GpuImageId, ImageFormat, RenderPassId};

/// Attachment load operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing contents
    Load,
    /// Clear to a value
    Clear,
    /// Don't care about existing contents
    DontCare,
}

/// Attachment store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store rendered contents
    Store,
    /// Don't care about storing
    DontCare,
}

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderReadOnly,
    TransferSrc,
    TransferDst,
    PresentSrc,
}

/// Attachment description for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDesc {
    pub format: ImageFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub initial_layout: ImageLayout,
    pub final_layout: ImageLayout,
}

/// Render pass description: one subpass, color attachments plus optional depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassDesc {
    pub color_attachments: Vec<AttachmentDesc>,
    pub depth_attachment: Option<AttachmentDesc>,
}

/// Framebuffer description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferDesc {
    /// Render pass the framebuffer is compatible with
    pub render_pass: RenderPassId,
    /// Attachments in render pass order (colors, then depth)
    pub attachments: Vec<GpuImageId>,
    pub extent: Extent2D,
}
