/// The two render passes of the frame
///
/// * **Offscreen**: color + depth, color left shader-readable. Used by every
///   render target.
/// * **Main**: a single color attachment left presentable. Used once per
///   frame by the composite pass that draws every target onto the swapchain.

use crate::error::Result;
use crate::graphics_device::{
    AttachmentDesc, GraphicsDevice, ImageFormat, ImageLayout, LoadOp, RenderPassDesc, RenderPassId, StoreOp,
};

/// Render pass variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPassKind {
    Main,
    Offscreen,
}

pub struct RenderPassRegistry {
    main: RenderPassId,
    offscreen: RenderPassId,
}

impl RenderPassRegistry {
    /// Create both passes
    ///
    /// # Arguments
    ///
    /// * `swapchain_format` - Color format of the presentable images
    /// * `color_format` - Color format of render target images
    /// * `depth_format` - Depth format of render target depth attachments
    pub fn new(
        device: &mut dyn GraphicsDevice,
        swapchain_format: ImageFormat,
        color_format: ImageFormat,
        depth_format: ImageFormat,
    ) -> Result<Self> {
        if !depth_format.is_depth() {
            engine_bail_violation!("lumen3d::RenderPassRegistry", "{:?} is not a depth format", depth_format);
        }
        let main = device.create_render_pass(&Self::main_desc(swapchain_format))?;
        let offscreen = match device.create_render_pass(&Self::offscreen_desc(color_format, depth_format)) {
            Ok(pass) => pass,
            Err(e) => {
                device.destroy_render_pass(main);
                return Err(e);
            }
        };
        Ok(Self { main, offscreen })
    }

    pub(crate) fn main_desc(swapchain_format: ImageFormat) -> RenderPassDesc {
        RenderPassDesc {
            color_attachments: vec![AttachmentDesc {
                format: swapchain_format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::PresentSrc,
            }],
            depth_attachment: None,
        }
    }

    pub(crate) fn offscreen_desc(color_format: ImageFormat, depth_format: ImageFormat) -> RenderPassDesc {
        RenderPassDesc {
            color_attachments: vec![AttachmentDesc {
                format: color_format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::Store,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::ShaderReadOnly,
            }],
            depth_attachment: Some(AttachmentDesc {
                format: depth_format,
                load_op: LoadOp::Clear,
                store_op: StoreOp::DontCare,
                initial_layout: ImageLayout::Undefined,
                final_layout: ImageLayout::DepthStencilAttachment,
            }),
        }
    }

    pub fn get(&self, kind: RenderPassKind) -> RenderPassId {
        match kind {
            RenderPassKind::Main => self.main,
            RenderPassKind::Offscreen => self.offscreen,
        }
    }

    pub fn destroy(&self, device: &mut dyn GraphicsDevice) {
        device.destroy_render_pass(self.offscreen);
        device.destroy_render_pass(self.main);
    }
}

#[cfg(test)]
#[path = "render_pass_registry_tests.rs"]
mod tests;
