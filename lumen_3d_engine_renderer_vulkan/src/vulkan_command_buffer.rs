/// CommandBuffer - a resettable primary command buffer and its recording state
///
/// Recording calls check the state so that a misuse surfaces as an error
/// instead of a validation message (or a driver crash without validation).

use ash::vk;
use lumen_3d_engine::lumen3d::device::{ClearValue, Extent2D, Rect2D, Viewport};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::engine_err;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordingState {
    Initial,
    Recording,
    InRenderPass,
    Executable,
}

pub(crate) struct CommandBuffer {
    pub(crate) buffer: vk::CommandBuffer,
    pub(crate) state: RecordingState,
}

impl CommandBuffer {
    pub(crate) fn new(buffer: vk::CommandBuffer) -> Self {
        Self {
            buffer,
            state: RecordingState::Initial,
        }
    }

    /// Fail unless the buffer is recording, inside or outside a render pass as asked
    pub(crate) fn require(&self, in_render_pass: bool) -> Result<vk::CommandBuffer> {
        let expected = if in_render_pass {
            RecordingState::InRenderPass
        } else {
            RecordingState::Recording
        };
        if self.state != expected {
            return Err(Error::BackendError(format!(
                "Command buffer is {:?}, expected {:?}",
                self.state, expected
            )));
        }
        Ok(self.buffer)
    }

    /// Fail unless the buffer is recording (inside a render pass or not)
    pub(crate) fn require_recording(&self) -> Result<vk::CommandBuffer> {
        match self.state {
            RecordingState::Recording | RecordingState::InRenderPass => Ok(self.buffer),
            state => Err(Error::BackendError(format!("Command buffer is {:?}, not recording", state))),
        }
    }

    pub(crate) fn begin(&mut self, device: &ash::Device) -> Result<()> {
        if matches!(self.state, RecordingState::Recording | RecordingState::InRenderPass) {
            return Err(Error::BackendError("Command buffer already recording".to_string()));
        }

        unsafe {
            device
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to reset command buffer: {:?}", e))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            device
                .begin_command_buffer(self.buffer, &begin_info)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to begin command buffer: {:?}", e))?;
        }

        self.state = RecordingState::Recording;
        Ok(())
    }

    pub(crate) fn end(&mut self, device: &ash::Device) -> Result<()> {
        if self.state == RecordingState::InRenderPass {
            return Err(Error::BackendError("Render pass not ended before ending command buffer".to_string()));
        }
        let buffer = self.require(false)?;

        unsafe {
            device
                .end_command_buffer(buffer)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to end command buffer: {:?}", e))?;
        }

        self.state = RecordingState::Executable;
        Ok(())
    }

    pub(crate) fn begin_render_pass(
        &mut self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: Extent2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let buffer = self.require(false)?;
        let vk_clear_values: Vec<vk::ClearValue> = clear_values.iter().map(|c| clear_value_to_vk(*c)).collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D { width: extent.width, height: extent.height },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            device.cmd_begin_render_pass(buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.state = RecordingState::InRenderPass;
        Ok(())
    }

    pub(crate) fn end_render_pass(&mut self, device: &ash::Device) -> Result<()> {
        let buffer = self.require(true)?;
        unsafe {
            device.cmd_end_render_pass(buffer);
        }
        self.state = RecordingState::Recording;
        Ok(())
    }

    pub(crate) fn set_viewport(&self, device: &ash::Device, viewport: Viewport) -> Result<()> {
        let buffer = self.require_recording()?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            device.cmd_set_viewport(buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    pub(crate) fn set_scissor(&self, device: &ash::Device, scissor: Rect2D) -> Result<()> {
        let buffer = self.require_recording()?;
        let vk_scissor = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.x, y: scissor.y },
            extent: vk::Extent2D { width: scissor.width, height: scissor.height },
        };
        unsafe {
            device.cmd_set_scissor(buffer, 0, &[vk_scissor]);
        }
        Ok(())
    }
}

pub(crate) fn clear_value_to_vk(value: ClearValue) -> vk::ClearValue {
    match value {
        ClearValue::Color(color) => vk::ClearValue {
            color: vk::ClearColorValue { float32: color },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

#[cfg(test)]
#[path = "vulkan_command_buffer_tests.rs"]
mod tests;
