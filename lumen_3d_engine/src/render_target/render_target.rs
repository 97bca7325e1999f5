/// Offscreen render target: a scene renders here, the compositor samples it
///
/// Owns a color + depth image pair, a framebuffer compatible with the
/// offscreen pass, one command buffer per frame in flight, a fullscreen quad
/// and the index of the texture descriptor that samples its color image.
///
/// Built in three steps, mirroring its lifecycle:
/// `create_render_target` -> `create_offscreen_quad_buffers` -> `create_command_buffer`.

use crate::buffer::{BufferState, GpuResource, IndexBuffer, VertexBuffer, VertexBufferKind};
use crate::error::Result;
use crate::graphics_device::{
    ClearValue, CommandBufferId, Extent2D, FramebufferDesc, FramebufferId, GpuImageId, GraphicsDevice,
    ImageDesc, ImageFormat, ImageKind, ImageLayout, ImageUsage, RenderPassId,
};
use crate::vertex::{Vertex2d, FULLSCREEN_QUAD_INDICES, FULLSCREEN_QUAD_VERTICES};

/// Per-frame recording state of a target command buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recording {
    Idle,
    Open,
    /// Ended, waiting for the frame's submission
    Recorded,
}

#[derive(Debug)]
struct Attachments {
    color: GpuImageId,
    depth: GpuImageId,
    framebuffer: FramebufferId,
}

#[derive(Debug)]
pub struct RenderTarget {
    state: BufferState,
    extent: Extent2D,
    color_format: ImageFormat,
    depth_format: ImageFormat,
    clear_color: [f32; 4],
    attachments: Option<Attachments>,
    quad_vertices: VertexBuffer,
    quad_indices: IndexBuffer,
    command_buffers: Vec<CommandBufferId>,
    recording: Vec<Recording>,
    descriptor_index: Option<usize>,
}

impl RenderTarget {
    pub fn new(extent: Extent2D, color_format: ImageFormat, depth_format: ImageFormat, clear_color: [f32; 4]) -> Self {
        Self {
            state: BufferState::None,
            extent,
            color_format,
            depth_format,
            clear_color,
            attachments: None,
            quad_vertices: VertexBuffer::new(VertexBufferKind::Static, Vertex2d::STRIDE),
            quad_indices: IndexBuffer::new(),
            command_buffers: Vec::new(),
            recording: Vec::new(),
            descriptor_index: None,
        }
    }

    // ===== LIFECYCLE =====

    /// Create the color and depth images and the framebuffer
    ///
    /// The color image is left shader-readable, so compositing a target
    /// before its first offscreen pass samples defined contents.
    pub fn create_render_target(&mut self, device: &mut dyn GraphicsDevice, render_pass: RenderPassId) -> Result<()> {
        self.state.require_none(Self::KIND)?;
        if self.extent.is_empty() {
            engine_bail_violation!("lumen3d::RenderTarget", "Render target created with an empty extent");
        }
        self.attachments = Some(self.create_attachments(device, render_pass)?);
        self.state = BufferState::Initialized;
        Ok(())
    }

    fn create_attachments(&self, device: &mut dyn GraphicsDevice, render_pass: RenderPassId) -> Result<Attachments> {
        let color = device.create_image(&ImageDesc {
            width: self.extent.width,
            height: self.extent.height,
            format: self.color_format,
            usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
            kind: ImageKind::Tex2D,
        })?;
        let depth = match device.create_image(&ImageDesc {
            width: self.extent.width,
            height: self.extent.height,
            format: self.depth_format,
            usage: ImageUsage::DEPTH_ATTACHMENT,
            kind: ImageKind::Tex2D,
        }) {
            Ok(depth) => depth,
            Err(e) => {
                device.destroy_image(color);
                return Err(e);
            }
        };

        let framebuffer = device
            .initialize_image_layout(color, ImageLayout::ShaderReadOnly)
            .and_then(|_| {
                device.create_framebuffer(&FramebufferDesc {
                    render_pass,
                    attachments: vec![color, depth],
                    extent: self.extent,
                })
            });
        match framebuffer {
            Ok(framebuffer) => Ok(Attachments { color, depth, framebuffer }),
            Err(e) => {
                device.destroy_image(depth);
                device.destroy_image(color);
                Err(e)
            }
        }
    }

    /// Upload the fullscreen quad used to composite this target
    pub fn create_offscreen_quad_buffers(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        self.state.require_initialized(Self::KIND, "create_offscreen_quad_buffers")?;
        self.quad_vertices.create(device, bytemuck::cast_slice(&FULLSCREEN_QUAD_VERTICES), 0)?;
        self.quad_indices.create(device, &FULLSCREEN_QUAD_INDICES)
    }

    /// Allocate one command buffer per frame in flight
    pub fn create_command_buffer(&mut self, device: &mut dyn GraphicsDevice, frames_in_flight: usize) -> Result<()> {
        self.state.require_initialized(Self::KIND, "create_command_buffer")?;
        if !self.command_buffers.is_empty() {
            engine_bail_violation!("lumen3d::RenderTarget", "Render target command buffers created twice");
        }
        for _ in 0..frames_in_flight {
            let cmd = device.allocate_command_buffer()?;
            self.command_buffers.push(cmd);
            self.recording.push(Recording::Idle);
        }
        Ok(())
    }

    /// Remember the texture descriptor that samples the color image
    pub fn set_descriptor_index(&mut self, index: usize) {
        self.descriptor_index = Some(index);
    }

    pub fn descriptor_index(&self) -> Result<usize> {
        self.descriptor_index.ok_or_else(|| {
            engine_violation!("lumen3d::RenderTarget", "Render target has no sampler descriptor")
        })
    }

    /// Rebuild the attachments at `extent` and return the new color image
    ///
    /// The device must be idle. The caller rewrites the sampler descriptor
    /// to point at the returned image.
    pub fn resize(
        &mut self,
        device: &mut dyn GraphicsDevice,
        render_pass: RenderPassId,
        extent: Extent2D,
    ) -> Result<GpuImageId> {
        self.state.require_initialized(Self::KIND, "resize")?;
        if let Some(old) = self.attachments.take() {
            Self::destroy_attachments(device, old);
        }
        self.extent = extent;
        let attachments = self.create_attachments(device, render_pass)?;
        let color = attachments.color;
        self.attachments = Some(attachments);
        Ok(color)
    }

    // ===== RECORDING =====

    /// Begin the frame's command buffer and the offscreen pass
    pub fn begin(&mut self, device: &mut dyn GraphicsDevice, frame: usize, render_pass: RenderPassId) -> Result<CommandBufferId> {
        self.state.require_initialized(Self::KIND, "begin")?;
        let cmd = self.command_buffer(frame)?;
        if self.recording[frame] != Recording::Idle {
            engine_bail_violation!(
                "lumen3d::RenderTarget",
                "Render target begun twice in frame {} ({:?})",
                frame, self.recording[frame]
            );
        }
        let framebuffer = self.framebuffer()?;
        device.begin_command_buffer(cmd)?;
        device.cmd_begin_render_pass(
            cmd,
            render_pass,
            framebuffer,
            self.extent,
            &[
                ClearValue::Color(self.clear_color),
                ClearValue::DepthStencil { depth: 1.0, stencil: 0 },
            ],
        )?;
        self.recording[frame] = Recording::Open;
        Ok(cmd)
    }

    /// End the offscreen pass and the command buffer; it joins the frame's submission
    pub fn end(&mut self, device: &mut dyn GraphicsDevice, frame: usize) -> Result<()> {
        let cmd = self.command_buffer(frame)?;
        if self.recording[frame] != Recording::Open {
            engine_bail_violation!("lumen3d::RenderTarget", "end without begin in frame {}", frame);
        }
        device.cmd_end_render_pass(cmd)?;
        device.end_command_buffer(cmd)?;
        self.recording[frame] = Recording::Recorded;
        Ok(())
    }

    /// Command buffer recorded for `frame`, if any, resetting the target for the next use
    ///
    /// # Errors
    ///
    /// `ContractViolation` if a recording was begun and never ended.
    pub(crate) fn take_recorded(&mut self, frame: usize) -> Result<Option<CommandBufferId>> {
        match self.recording.get(frame).copied() {
            Some(Recording::Recorded) => {
                self.recording[frame] = Recording::Idle;
                Ok(Some(self.command_buffers[frame]))
            }
            Some(Recording::Open) => Err(engine_violation!(
                "lumen3d::RenderTarget",
                "Render target still recording at submission of frame {}",
                frame
            )),
            Some(Recording::Idle) | None => Ok(None),
        }
    }

    /// Drop whatever was recorded for `frame` after a failed frame
    ///
    /// An open recording is closed so the buffer can be begun again.
    pub(crate) fn discard_recording(&mut self, device: &mut dyn GraphicsDevice, frame: usize) -> Result<()> {
        let Some(recording) = self.recording.get(frame).copied() else {
            return Ok(());
        };
        self.recording[frame] = Recording::Idle;
        if recording == Recording::Open {
            let cmd = self.command_buffers[frame];
            device.cmd_end_render_pass(cmd)?;
            device.end_command_buffer(cmd)?;
        }
        Ok(())
    }

    /// Bind the quad and draw it (the present pipeline must be bound)
    pub(crate) fn draw_quad(&self, device: &mut dyn GraphicsDevice, cmd: CommandBufferId) -> Result<()> {
        device.cmd_bind_vertex_buffer(cmd, 0, self.quad_vertices.gpu_buffer()?)?;
        device.cmd_bind_index_buffer(cmd, self.quad_indices.gpu_buffer()?, self.quad_indices.index_type())?;
        device.cmd_draw_indexed(cmd, self.quad_indices.index_count(), 1)
    }

    // ===== ACCESS =====

    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    pub fn color_image(&self) -> Result<GpuImageId> {
        self.state.require_initialized(Self::KIND, "color_image")?;
        Ok(self.attachments()?.color)
    }

    pub fn framebuffer(&self) -> Result<FramebufferId> {
        Ok(self.attachments()?.framebuffer)
    }

    /// Command buffer of frame slot `frame`
    pub fn command_buffer(&self, frame: usize) -> Result<CommandBufferId> {
        match self.command_buffers.get(frame) {
            Some(cmd) => Ok(*cmd),
            None => Err(engine_violation!(
                "lumen3d::RenderTarget",
                "No command buffer for frame {} ({} allocated)",
                frame, self.command_buffers.len()
            )),
        }
    }

    fn attachments(&self) -> Result<&Attachments> {
        self.attachments
            .as_ref()
            .ok_or_else(|| engine_violation!("lumen3d::RenderTarget", "Render target has no attachments"))
    }

    fn destroy_attachments(device: &mut dyn GraphicsDevice, attachments: Attachments) {
        device.destroy_framebuffer(attachments.framebuffer);
        device.destroy_image(attachments.depth);
        device.destroy_image(attachments.color);
    }
}

impl GpuResource for RenderTarget {
    const KIND: &'static str = "render target";

    fn state(&self) -> BufferState {
        self.state
    }

    /// The device must be idle: the target's command buffers are freed.
    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if !self.state.begin_dispose(Self::KIND)? {
            return Ok(());
        }
        for cmd in self.command_buffers.drain(..) {
            device.free_command_buffer(cmd);
        }
        self.recording.clear();
        if self.quad_vertices.state() == BufferState::Initialized {
            self.quad_vertices.dispose(device)?;
        }
        if self.quad_indices.state() == BufferState::Initialized {
            self.quad_indices.dispose(device)?;
        }
        if let Some(attachments) = self.attachments.take() {
            Self::destroy_attachments(device, attachments);
        }
        self.state = BufferState::Disposed;
        Ok(())
    }
}

#[cfg(test)]
#[path = "render_target_tests.rs"]
mod tests;
