/// Frame loop and swapchain recreation
///
/// ```text
/// WaitFence -> AcquireImage -> WaitImageOwner -> ResetFence -> RecordCommands
///           -> UpdateUniforms -> Submit -> Present -> Advance
/// ```
///
/// An out-of-date acquire rebuilds the swapchain and ends the call before
/// the fence is reset. A suboptimal acquire, an out-of-date or suboptimal
/// present, or a `resize` rebuild it once the frame has advanced.

use crate::buffer::{BufferState, GpuResource};
use crate::descriptor::DescriptorKind;
use crate::error::Result;
use crate::frame::FrameSlot;
use crate::graphics_device::{
    AcquireOutcome, ClearValue, CommandBufferId, Extent2D, PresentOutcome, Rect2D, SamplerKind, SubmitInfo,
    Viewport,
};
use crate::pipeline::PipelineMode;
use crate::render_pass::RenderPassKind;
use crate::renderer::renderer::{initialized, initialized_mut, FrameStatus, Renderer, RendererState};
use crate::vertex::FULLSCREEN_QUAD_INDICES;

impl Renderer {
    /// Render and present one frame
    ///
    /// # Errors
    ///
    /// `BackendError` for a failed wait, acquire, submit or present, and any
    /// error raised by an observer. A failed recording or submit still
    /// presents the acquired image cleared and signals the frame fence, so
    /// the next call starts from a consistent state.
    pub fn draw(&mut self) -> Result<FrameStatus> {
        if self.state != RendererState::Initialized {
            engine_bail_violation!("lumen3d::Renderer", "draw called in state {:?}", self.state);
        }
        if self.resize_pending {
            if self.surface_extent.is_empty() {
                return Ok(FrameStatus::Skipped);
            }
            self.recreate_swapchain(self.surface_extent)?;
            self.resize_pending = false;
        }

        // WaitFence: the slot's command buffers and uniforms are free again
        let (slot, frame) = {
            let gpu = initialized_mut(&mut self.gpu)?;
            let slot = gpu.frame_sync.current();
            self.device.wait_for_fence(slot.in_flight)?;
            gpu.frame_sync.collect_retired(self.device.as_mut());
            (slot, gpu.frame_sync.cursor())
        };

        let (image_index, acquire_suboptimal) = match self.device.acquire_next_image(slot.image_available)? {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                engine_debug!("lumen3d::Renderer", "Swapchain out of date at acquire");
                return self.recreate_or_defer();
            }
        };

        // WaitImageOwner: images may come back in any order
        {
            let gpu = initialized_mut(&mut self.gpu)?;
            if let Some(owner) = gpu.frame_sync.image_owner(image_index) {
                if owner != slot.in_flight {
                    self.device.wait_for_fence(owner)?;
                }
            }
            gpu.frame_sync.set_image_owner(image_index, slot.in_flight);
        }
        self.device.reset_fence(slot.in_flight)?;

        let command_buffers = match self.prepare_submission(slot, frame, image_index) {
            Ok(command_buffers) => command_buffers,
            Err(e) => {
                self.abandon_frame(slot, frame, image_index);
                return Err(e);
            }
        };

        let submitted = self.device.submit(&SubmitInfo {
            command_buffers: &command_buffers,
            wait_semaphores: &[slot.image_available],
            signal_semaphores: &[slot.render_finished],
            fence: Some(slot.in_flight),
        });
        if let Err(e) = submitted {
            self.abandon_frame(slot, frame, image_index);
            return Err(e);
        }

        let presented = self.device.present(image_index, slot.render_finished);
        initialized_mut(&mut self.gpu)?.frame_sync.advance();
        let outcome = presented?;

        if outcome != PresentOutcome::OutOfDate {
            self.stats.frames_presented += 1;
        }
        if acquire_suboptimal || outcome != PresentOutcome::Presented {
            engine_debug!(
                "lumen3d::Renderer",
                "Swapchain needs recreation (acquire suboptimal: {}, present: {:?})",
                acquire_suboptimal, outcome
            );
            return self.recreate_or_defer();
        }
        Ok(FrameStatus::Presented)
    }

    /// Request a new surface extent, applied before the next frame
    ///
    /// A zero width or height (minimized window) makes `draw` return
    /// `Skipped` until a non-zero extent is requested.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_extent = Extent2D::new(width, height);
        if self.state == RendererState::Initialized {
            self.resize_pending = true;
        }
    }

    /// Camera matrices written into the global uniforms of the next frames
    pub fn set_view_projection(&mut self, view: glam::Mat4, projection: glam::Mat4) {
        self.camera = crate::vertex::GlobalUniforms::new(view, projection);
    }

    // ===== RECORDING =====

    /// RecordCommands + UpdateUniforms; returns the frame's command buffers in submission order
    fn prepare_submission(&mut self, slot: FrameSlot, frame: usize, image_index: u32) -> Result<Vec<CommandBufferId>> {
        self.record_frame(slot.command_buffer, frame, image_index)?;

        let mut command_buffers = Vec::new();
        for (_, target) in self.render_targets.iter_mut() {
            if let Some(cmd) = target.take_recorded(frame)? {
                command_buffers.push(cmd);
            }
        }
        command_buffers.push(slot.command_buffer);

        let camera = self.camera;
        let gpu = initialized_mut(&mut self.gpu)?;
        gpu.globals[frame].buffer.update_value(self.device.as_mut(), &camera)?;
        Ok(command_buffers)
    }

    fn record_frame(&mut self, cmd: CommandBufferId, frame: usize, image_index: u32) -> Result<()> {
        self.device.begin_command_buffer(cmd)?;
        self.pipelines.clear_binding();
        self.stats.draw_calls = 0;
        self.stats.triangles = 0;
        self.recording_frame = Some(frame);

        let mut pass_open = false;
        let recorded = self.record_main_commands(cmd, frame, image_index, &mut pass_open);
        self.recording_frame = None;

        if recorded.is_err() && pass_open {
            if let Err(e) = self.device.cmd_end_render_pass(cmd) {
                engine_warn!("lumen3d::Renderer", "Failed to close the main pass of a failed frame: {}", e);
            }
        }
        let ended = self.device.end_command_buffer(cmd);
        recorded.and(ended)
    }

    fn record_main_commands(
        &mut self,
        cmd: CommandBufferId,
        frame: usize,
        image_index: u32,
        pass_open: &mut bool,
    ) -> Result<()> {
        self.notify(|observer, renderer| observer.on_offscreen(renderer, frame))?;
        self.notify(|observer, renderer| observer.on_draw(renderer, cmd, frame))?;
        self.pipelines.clear_binding();

        let gpu = initialized(&self.gpu)?;
        self.device.cmd_begin_render_pass(
            cmd,
            gpu.passes.get(RenderPassKind::Main),
            gpu.swap_chain.framebuffer(image_index)?,
            gpu.swap_chain.extent(),
            &[ClearValue::Color(self.config.clear_color)],
        )?;
        *pass_open = true;

        self.composite_render_targets(cmd)?;

        self.device.cmd_end_render_pass(cmd)?;
        *pass_open = false;
        Ok(())
    }

    /// Draw the quad of every live render target with the present pipeline
    fn composite_render_targets(&mut self, cmd: CommandBufferId) -> Result<()> {
        let live = |state: BufferState| state == BufferState::Initialized;
        if !self.render_targets.iter().any(|(_, target)| live(target.state())) {
            return Ok(());
        }

        self.pipelines.bind_pipeline(self.device.as_mut(), cmd, PipelineMode::Present.name())?;
        let layout = self.pipelines.bound_pipeline()?.layout()?;
        let gpu = initialized(&self.gpu)?;
        let triangles = (FULLSCREEN_QUAD_INDICES.len() / 3) as u64;

        for (_, target) in self.render_targets.iter().filter(|(_, target)| live(target.state())) {
            let set = gpu.descriptors.get_descriptor_set(DescriptorKind::Texture, target.descriptor_index()?)?;
            self.device.cmd_bind_descriptor_sets(cmd, layout, 0, &[set])?;
            target.draw_quad(self.device.as_mut(), cmd)?;
            self.stats.draw_calls += 1;
            self.stats.triangles += triangles;
        }
        Ok(())
    }

    /// Leave the slot consistent after a failed recording or submit
    ///
    /// Target recordings are dropped and the acquired image is cleared and
    /// presented, so the image goes back to the swapchain, the
    /// image-available semaphore is consumed and the fence signals.
    fn abandon_frame(&mut self, slot: FrameSlot, frame: usize, image_index: u32) {
        engine_warn!("lumen3d::Renderer", "Frame {} abandoned", frame);
        for (handle, target) in self.render_targets.iter_mut() {
            if let Err(e) = target.discard_recording(self.device.as_mut(), frame) {
                engine_warn!("lumen3d::Renderer", "Failed to discard recording of {:?}: {}", handle, e);
            }
        }

        let cleared = match self.record_cleared_frame(slot.command_buffer, image_index) {
            Ok(()) => vec![slot.command_buffer],
            Err(e) => {
                engine_warn!("lumen3d::Renderer", "Failed to record a cleared frame {}: {}", frame, e);
                Vec::new()
            }
        };
        let submitted = self.device.submit(&SubmitInfo {
            command_buffers: &cleared,
            wait_semaphores: &[slot.image_available],
            signal_semaphores: &[slot.render_finished],
            fence: Some(slot.in_flight),
        });
        if let Err(e) = submitted {
            engine_error!("lumen3d::Renderer", "Failed to release frame {}: {}", frame, e);
            return;
        }

        match self.device.present(image_index, slot.render_finished) {
            Ok(PresentOutcome::Presented) => {}
            Ok(outcome) => {
                engine_debug!("lumen3d::Renderer", "Abandoned frame {} presented as {:?}", frame, outcome);
                self.resize_pending = true;
            }
            Err(e) => engine_error!("lumen3d::Renderer", "Failed to present abandoned frame {}: {}", frame, e),
        }
        if let Ok(gpu) = initialized_mut(&mut self.gpu) {
            gpu.frame_sync.advance();
        }
    }

    /// Main pass with nothing but the clear color
    fn record_cleared_frame(&mut self, cmd: CommandBufferId, image_index: u32) -> Result<()> {
        let gpu = initialized(&self.gpu)?;
        let render_pass = gpu.passes.get(RenderPassKind::Main);
        let framebuffer = gpu.swap_chain.framebuffer(image_index)?;
        let extent = gpu.swap_chain.extent();

        self.device.begin_command_buffer(cmd)?;
        let recorded = self
            .device
            .cmd_begin_render_pass(cmd, render_pass, framebuffer, extent, &[ClearValue::Color(self.config.clear_color)])
            .and_then(|()| self.device.cmd_end_render_pass(cmd));
        let ended = self.device.end_command_buffer(cmd);
        recorded.and(ended)
    }

    // ===== SWAPCHAIN RECREATION =====

    fn recreate_or_defer(&mut self) -> Result<FrameStatus> {
        if self.surface_extent.is_empty() {
            self.resize_pending = true;
            return Ok(FrameStatus::Skipped);
        }
        self.recreate_swapchain(self.surface_extent)?;
        Ok(FrameStatus::SwapchainRecreated)
    }

    /// Rebuild swapchain, framebuffers and render targets at `extent`
    pub(super) fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<()> {
        self.device.wait_idle()?;
        self.notify(|observer, renderer| observer.before_swapchain_recreate(renderer))?;

        let new_extent = {
            let gpu = initialized_mut(&mut self.gpu)?;
            let device = self.device.as_mut();
            gpu.swap_chain.recreate(device, extent, gpu.passes.get(RenderPassKind::Main))?;
            let new_extent = gpu.swap_chain.extent();

            let offscreen = gpu.passes.get(RenderPassKind::Offscreen);
            for (_, target) in self.render_targets.iter_mut() {
                if target.state() != BufferState::Initialized {
                    continue;
                }
                let color = target.resize(device, offscreen, new_extent)?;
                gpu.descriptors.rewrite_texture_descriptor(
                    device,
                    target.descriptor_index()?,
                    color,
                    SamplerKind::LinearClamp,
                )?;
            }

            self.pipelines
                .update_viewport_scissor(Viewport::full(new_extent), Rect2D::full(new_extent));
            gpu.frame_sync.reset_image_owners(gpu.swap_chain.image_count());
            new_extent
        };

        self.surface_extent = new_extent;
        self.stats.swapchain_recreations += 1;
        self.notify(|observer, renderer| {
            observer.after_swapchain_recreate(renderer, new_extent.width, new_extent.height)
        })
    }
}

