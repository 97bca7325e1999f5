/// Mock graphics device for unit tests (no GPU)
///
/// Records everything the engine asks of the device and checks the
/// synchronization rules a real driver would only punish with undefined
/// behavior. Broken rules are pushed to `MockState::violations` instead of
/// failing, so a test can assert the list stays empty.
///
/// Tests keep a `MockProbe` (shared state) while the device itself is moved
/// into the `Renderer`.

use slotmap::SlotMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireOutcome, BufferDesc, ClearValue, CommandBufferId, DescriptorPoolDesc, DescriptorPoolId,
    DescriptorSetId, DescriptorSetLayoutDesc, DescriptorSetLayoutId, DescriptorWrite, DeviceInfo,
    Extent2D, FenceId, FramebufferDesc, FramebufferId, GpuBufferId, GpuImageId, GpuPipelineId,
    GraphicsDevice, GraphicsPipelineDesc, ImageDesc, ImageFormat, ImageKind, ImageLayout,
    ImageUsage, IndexType, MemoryLocation, PipelineLayoutDesc, PipelineLayoutId, PresentOutcome,
    Rect2D, RenderPassDesc, RenderPassId, SemaphoreId, ShaderDesc, ShaderId, ShaderStage,
    ShaderStageFlags, SubmitInfo, SwapchainInfo, Viewport,
};

// ============================================================================
// RECORDED STATE
// ============================================================================

/// A command recorded into a mock command buffer
#[derive(Debug, Clone, PartialEq)]
pub enum MockCommand {
    BeginRenderPass { render_pass: RenderPassId, framebuffer: FramebufferId },
    EndRenderPass,
    SetViewport(Viewport),
    SetScissor(Rect2D),
    BindPipeline(GpuPipelineId),
    BindDescriptorSets { first_set: u32, sets: Vec<DescriptorSetId> },
    PushConstants { offset: u32, data: Vec<u8> },
    BindVertexBuffer { binding: u32, buffer: GpuBufferId },
    BindIndexBuffer(GpuBufferId),
    Draw { vertex_count: u32, instance_count: u32 },
    DrawIndexed { index_count: u32, instance_count: u32 },
}

pub struct MockBuffer {
    pub desc: BufferDesc,
    pub data: Vec<u8>,
}

pub struct MockImage {
    pub desc: ImageDesc,
    pub data: Vec<u8>,
    pub layout: ImageLayout,
    /// Owned by the swapchain (never passed to destroy_image)
    pub swapchain: bool,
}

pub struct MockDescriptorPool {
    pub desc: DescriptorPoolDesc,
    pub allocated: u32,
}

pub struct MockDescriptorSet {
    pub pool: DescriptorPoolId,
    pub layout: DescriptorSetLayoutId,
    pub writes: Vec<DescriptorWrite>,
}

#[derive(Default)]
pub struct MockCommandBuffer {
    pub commands: Vec<MockCommand>,
    pub recording: bool,
    /// Fence of the last submission containing this buffer, until waited on
    pub in_flight: Option<FenceId>,
    pub begin_count: u32,
}

pub struct MockFence {
    pub signaled: bool,
    /// Submitted and not yet observed complete
    pub pending: bool,
    pub signal_count: u32,
}

/// One queue submission, with a snapshot of every command buffer's commands
pub struct MockSubmission {
    pub command_buffers: Vec<(CommandBufferId, Vec<MockCommand>)>,
    pub wait_semaphores: Vec<SemaphoreId>,
    pub signal_semaphores: Vec<SemaphoreId>,
    pub fence: Option<FenceId>,
}

impl MockSubmission {
    /// Every command of the submission in execution order
    pub fn all_commands(&self) -> Vec<MockCommand> {
        self.command_buffers
            .iter()
            .flat_map(|(_, commands)| commands.iter().cloned())
            .collect()
    }
}

pub struct MockSwapchain {
    pub info: SwapchainInfo,
    pub images: Vec<GpuImageId>,
    pub next_image: u32,
}

pub struct MockState {
    pub buffers: SlotMap<GpuBufferId, MockBuffer>,
    pub images: SlotMap<GpuImageId, MockImage>,
    pub shaders: SlotMap<ShaderId, ShaderStage>,
    pub render_passes: SlotMap<RenderPassId, RenderPassDesc>,
    pub framebuffers: SlotMap<FramebufferId, FramebufferDesc>,
    pub set_layouts: SlotMap<DescriptorSetLayoutId, DescriptorSetLayoutDesc>,
    pub pipeline_layouts: SlotMap<PipelineLayoutId, PipelineLayoutDesc>,
    pub pipelines: SlotMap<GpuPipelineId, GraphicsPipelineDesc>,
    pub descriptor_pools: SlotMap<DescriptorPoolId, MockDescriptorPool>,
    pub descriptor_sets: SlotMap<DescriptorSetId, MockDescriptorSet>,
    pub command_buffers: SlotMap<CommandBufferId, MockCommandBuffer>,
    pub fences: SlotMap<FenceId, MockFence>,
    pub semaphores: SlotMap<SemaphoreId, ()>,

    pub swapchain: Option<MockSwapchain>,
    /// Image count the mock surface hands out
    pub swapchain_image_count: u32,
    /// Extent the mock surface reports on (re)creation
    pub surface_extent: Extent2D,
    pub swapchain_recreations: u32,
    /// Outcomes returned by the next acquires, before falling back to round-robin
    pub acquire_script: VecDeque<AcquireOutcome>,
    /// Outcomes returned by the next presents, before falling back to Presented
    pub present_script: VecDeque<PresentOutcome>,
    /// Number of next submits rejected with a backend error
    pub failing_submits: u32,

    pub acquired: Vec<u32>,
    pub submissions: Vec<MockSubmission>,
    pub presented: Vec<u32>,
    pub immediate_copies: u32,
    pub destroyed_buffers: Vec<GpuBufferId>,
    pub destroyed_images: Vec<GpuImageId>,
    pub wait_idle_count: u32,
    pub violations: Vec<String>,
}

impl MockState {
    fn new() -> Self {
        Self {
            buffers: SlotMap::with_key(),
            images: SlotMap::with_key(),
            shaders: SlotMap::with_key(),
            render_passes: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            set_layouts: SlotMap::with_key(),
            pipeline_layouts: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            descriptor_pools: SlotMap::with_key(),
            descriptor_sets: SlotMap::with_key(),
            command_buffers: SlotMap::with_key(),
            fences: SlotMap::with_key(),
            semaphores: SlotMap::with_key(),
            swapchain: None,
            swapchain_image_count: 3,
            surface_extent: Extent2D::new(800, 600),
            swapchain_recreations: 0,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            failing_submits: 0,
            acquired: Vec::new(),
            submissions: Vec::new(),
            presented: Vec::new(),
            immediate_copies: 0,
            destroyed_buffers: Vec::new(),
            destroyed_images: Vec::new(),
            wait_idle_count: 0,
            violations: Vec::new(),
        }
    }

    /// Last queue submission
    pub fn last_submission(&self) -> Option<&MockSubmission> {
        self.submissions.last()
    }

    /// Number of live (not destroyed) buffers
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    fn recording_mut(&mut self, cmd: CommandBufferId) -> Result<&mut MockCommandBuffer> {
        let recording = self
            .command_buffers
            .get(cmd)
            .ok_or_else(|| unknown("command buffer"))?
            .recording;
        if !recording {
            self.violations.push("command recorded into a buffer that is not recording".to_string());
            return Err(Error::BackendError("mock: command buffer not recording".to_string()));
        }
        Ok(&mut self.command_buffers[cmd])
    }

    fn record(&mut self, cmd: CommandBufferId, command: MockCommand) -> Result<()> {
        self.recording_mut(cmd)?.commands.push(command);
        Ok(())
    }

    fn build_swapchain(&mut self, extent: Extent2D) -> SwapchainInfo {
        let info = SwapchainInfo {
            extent: if extent.is_empty() { self.surface_extent } else { extent },
            format: ImageFormat::Bgra8Srgb,
            image_count: self.swapchain_image_count,
        };
        let images = (0..info.image_count)
            .map(|_| {
                self.images.insert(MockImage {
                    desc: ImageDesc {
                        width: info.extent.width,
                        height: info.extent.height,
                        format: info.format,
                        usage: ImageUsage::COLOR_ATTACHMENT,
                        kind: ImageKind::Tex2D,
                    },
                    data: Vec::new(),
                    layout: ImageLayout::Undefined,
                    swapchain: true,
                })
            })
            .collect();
        self.swapchain = Some(MockSwapchain { info, images, next_image: 0 });
        info
    }
}

// ============================================================================
// DEVICE
// ============================================================================

/// Shared view of the mock state kept by tests
#[derive(Clone)]
pub struct MockProbe(Arc<Mutex<MockState>>);

impl MockProbe {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }
}

pub struct MockGraphicsDevice {
    info: DeviceInfo,
    state: Arc<Mutex<MockState>>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                name: "Mock GPU".to_string(),
                discrete: true,
            },
            state: Arc::new(Mutex::new(MockState::new())),
        }
    }

    /// Handle to the shared state, valid after the device is moved away
    pub fn probe(&self) -> MockProbe {
        MockProbe(Arc::clone(&self.state))
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

fn unknown(what: &str) -> Error {
    Error::InvalidResource(format!("mock: unknown {}", what))
}

impl GraphicsDevice for MockGraphicsDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    // ===== SWAPCHAIN =====

    fn create_swapchain(&mut self, extent: Extent2D) -> Result<SwapchainInfo> {
        let mut state = self.state();
        if state.swapchain.is_some() {
            state.violations.push("swapchain created twice".to_string());
        }
        Ok(state.build_swapchain(extent))
    }

    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<SwapchainInfo> {
        let mut state = self.state();
        if state.fences.values().any(|f| f.pending) {
            state.violations.push("swapchain recreated while work was in flight".to_string());
        }
        let old = state.swapchain.take().ok_or_else(|| unknown("swapchain"))?;
        for image in old.images {
            state.images.remove(image);
        }
        state.swapchain_recreations += 1;
        Ok(state.build_swapchain(extent))
    }

    fn swapchain_images(&self) -> Result<Vec<GpuImageId>> {
        let state = self.state();
        let swapchain = state.swapchain.as_ref().ok_or_else(|| unknown("swapchain"))?;
        Ok(swapchain.images.clone())
    }

    fn acquire_next_image(&mut self, signal: SemaphoreId) -> Result<AcquireOutcome> {
        let mut state = self.state();
        if !state.semaphores.contains_key(signal) {
            return Err(unknown("semaphore"));
        }
        let outcome = match state.acquire_script.pop_front() {
            Some(outcome) => outcome,
            None => {
                let swapchain = state.swapchain.as_mut().ok_or_else(|| unknown("swapchain"))?;
                let image_index = swapchain.next_image;
                swapchain.next_image = (swapchain.next_image + 1) % swapchain.info.image_count;
                AcquireOutcome::Acquired { image_index, suboptimal: false }
            }
        };
        if let AcquireOutcome::Acquired { image_index, .. } = outcome {
            state.acquired.push(image_index);
        }
        Ok(outcome)
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreId) -> Result<PresentOutcome> {
        let mut state = self.state();
        if !state.semaphores.contains_key(wait) {
            return Err(unknown("semaphore"));
        }
        state.presented.push(image_index);
        Ok(state.present_script.pop_front().unwrap_or(PresentOutcome::Presented))
    }

    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<GpuBufferId> {
        let mut state = self.state();
        if desc.size == 0 {
            state.violations.push("zero-sized buffer".to_string());
        }
        Ok(state.buffers.insert(MockBuffer {
            desc: *desc,
            data: vec![0; desc.size as usize],
        }))
    }

    fn write_buffer(&mut self, buffer: GpuBufferId, offset: u64, data: &[u8]) -> Result<()> {
        let mut state = self.state();
        let target = state.buffers.get_mut(buffer).ok_or_else(|| unknown("buffer"))?;
        if target.desc.location != MemoryLocation::HostVisible {
            return Err(Error::InvalidResource("mock: write to device-local buffer".to_string()));
        }
        let end = offset as usize + data.len();
        if end > target.data.len() {
            return Err(Error::InvalidResource("mock: write past end of buffer".to_string()));
        }
        target.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }

    fn copy_buffer_immediate(&mut self, src: GpuBufferId, dst: GpuBufferId, size: u64) -> Result<()> {
        let mut state = self.state();
        let bytes = state.buffers.get(src).ok_or_else(|| unknown("buffer"))?.data[..size as usize].to_vec();
        let target = state.buffers.get_mut(dst).ok_or_else(|| unknown("buffer"))?;
        target.data[..size as usize].copy_from_slice(&bytes);
        state.immediate_copies += 1;
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: GpuBufferId) {
        let mut state = self.state();
        if state.buffers.remove(buffer).is_none() {
            state.violations.push("destroy of unknown buffer".to_string());
        }
        state.destroyed_buffers.push(buffer);
    }

    // ===== IMAGES =====

    fn create_image(&mut self, desc: &ImageDesc) -> Result<GpuImageId> {
        Ok(self.state().images.insert(MockImage {
            desc: *desc,
            data: Vec::new(),
            layout: ImageLayout::Undefined,
            swapchain: false,
        }))
    }

    fn copy_buffer_to_image_immediate(&mut self, src: GpuBufferId, dst: GpuImageId) -> Result<()> {
        let mut state = self.state();
        let bytes = state.buffers.get(src).ok_or_else(|| unknown("buffer"))?.data.clone();
        let image = state.images.get_mut(dst).ok_or_else(|| unknown("image"))?;
        if bytes.len() as u64 != image.desc.upload_size() {
            return Err(Error::InvalidResource("mock: staging size does not match image".to_string()));
        }
        image.data = bytes;
        image.layout = ImageLayout::ShaderReadOnly;
        state.immediate_copies += 1;
        Ok(())
    }

    fn initialize_image_layout(&mut self, image: GpuImageId, layout: ImageLayout) -> Result<()> {
        let mut state = self.state();
        state.images.get_mut(image).ok_or_else(|| unknown("image"))?.layout = layout;
        Ok(())
    }

    fn destroy_image(&mut self, image: GpuImageId) {
        let mut state = self.state();
        match state.images.remove(image) {
            Some(removed) if removed.swapchain => {
                state.violations.push("destroy of a swapchain image".to_string());
            }
            Some(_) => {}
            None => state.violations.push("destroy of unknown image".to_string()),
        }
        state.destroyed_images.push(image);
    }

    // ===== SHADERS, PASSES, FRAMEBUFFERS =====

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId> {
        if desc.code.is_empty() {
            return Err(Error::InvalidResource("mock: empty shader code".to_string()));
        }
        Ok(self.state().shaders.insert(desc.stage))
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        self.state().shaders.remove(shader);
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassId> {
        Ok(self.state().render_passes.insert(desc.clone()))
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassId) {
        self.state().render_passes.remove(render_pass);
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId> {
        let mut state = self.state();
        if !state.render_passes.contains_key(desc.render_pass) {
            return Err(unknown("render pass"));
        }
        if desc.attachments.iter().any(|image| !state.images.contains_key(*image)) {
            return Err(unknown("framebuffer attachment"));
        }
        Ok(state.framebuffers.insert(desc.clone()))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.state().framebuffers.remove(framebuffer);
    }

    // ===== LAYOUTS AND PIPELINES =====

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutId> {
        Ok(self.state().set_layouts.insert(desc.clone()))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutId) {
        self.state().set_layouts.remove(layout);
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutId> {
        Ok(self.state().pipeline_layouts.insert(desc.clone()))
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutId) {
        self.state().pipeline_layouts.remove(layout);
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<GpuPipelineId> {
        let mut state = self.state();
        if !state.shaders.contains_key(desc.vertex_shader) || !state.shaders.contains_key(desc.fragment_shader) {
            return Err(unknown("shader"));
        }
        if !state.pipeline_layouts.contains_key(desc.layout) {
            return Err(unknown("pipeline layout"));
        }
        Ok(state.pipelines.insert(desc.clone()))
    }

    fn destroy_pipeline(&mut self, pipeline: GpuPipelineId) {
        self.state().pipelines.remove(pipeline);
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId> {
        Ok(self.state().descriptor_pools.insert(MockDescriptorPool { desc: *desc, allocated: 0 }))
    }

    fn allocate_descriptor_set(&mut self, pool: DescriptorPoolId, layout: DescriptorSetLayoutId) -> Result<DescriptorSetId> {
        let mut state = self.state();
        let entry = state.descriptor_pools.get_mut(pool).ok_or_else(|| unknown("descriptor pool"))?;
        if entry.allocated >= entry.desc.max_sets {
            state.violations.push("descriptor pool overflow reached the device".to_string());
            return Err(Error::BackendError("mock: descriptor pool exhausted".to_string()));
        }
        entry.allocated += 1;
        Ok(state.descriptor_sets.insert(MockDescriptorSet {
            pool,
            layout,
            writes: Vec::new(),
        }))
    }

    fn write_descriptor_set(&mut self, set: DescriptorSetId, writes: &[DescriptorWrite]) -> Result<()> {
        let mut state = self.state();
        let entry = state.descriptor_sets.get_mut(set).ok_or_else(|| unknown("descriptor set"))?;
        entry.writes = writes.to_vec();
        Ok(())
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId) {
        let mut state = self.state();
        state.descriptor_pools.remove(pool);
        state.descriptor_sets.retain(|_, set| set.pool != pool);
    }

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&mut self) -> Result<CommandBufferId> {
        Ok(self.state().command_buffers.insert(MockCommandBuffer::default()))
    }

    fn free_command_buffer(&mut self, cmd: CommandBufferId) {
        let mut state = self.state();
        let in_flight = state
            .command_buffers
            .get(cmd)
            .and_then(|buffer| buffer.in_flight)
            .is_some_and(|fence| state.fences.get(fence).is_some_and(|f| f.pending));
        if in_flight {
            state.violations.push("command buffer freed while in flight".to_string());
        }
        state.command_buffers.remove(cmd);
    }

    fn begin_command_buffer(&mut self, cmd: CommandBufferId) -> Result<()> {
        let mut state = self.state();
        let in_flight = {
            let buffer = state.command_buffers.get(cmd).ok_or_else(|| unknown("command buffer"))?;
            buffer
                .in_flight
                .is_some_and(|fence| state.fences.get(fence).is_some_and(|f| f.pending))
        };
        if in_flight {
            state.violations.push("recording began before the buffer's fence signaled".to_string());
        }
        let buffer = state.command_buffers.get_mut(cmd).ok_or_else(|| unknown("command buffer"))?;
        if buffer.recording {
            return Err(Error::BackendError("mock: command buffer already recording".to_string()));
        }
        buffer.commands.clear();
        buffer.recording = true;
        buffer.begin_count += 1;
        Ok(())
    }

    fn end_command_buffer(&mut self, cmd: CommandBufferId) -> Result<()> {
        self.state().recording_mut(cmd)?.recording = false;
        Ok(())
    }

    fn cmd_begin_render_pass(
        &mut self,
        cmd: CommandBufferId,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        _extent: Extent2D,
        _clear_values: &[ClearValue],
    ) -> Result<()> {
        let mut state = self.state();
        if !state.framebuffers.contains_key(framebuffer) {
            return Err(unknown("framebuffer"));
        }
        state.record(cmd, MockCommand::BeginRenderPass { render_pass, framebuffer })
    }

    fn cmd_end_render_pass(&mut self, cmd: CommandBufferId) -> Result<()> {
        self.state().record(cmd, MockCommand::EndRenderPass)
    }

    fn cmd_set_viewport(&mut self, cmd: CommandBufferId, viewport: Viewport) -> Result<()> {
        self.state().record(cmd, MockCommand::SetViewport(viewport))
    }

    fn cmd_set_scissor(&mut self, cmd: CommandBufferId, scissor: Rect2D) -> Result<()> {
        self.state().record(cmd, MockCommand::SetScissor(scissor))
    }

    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferId, pipeline: GpuPipelineId) -> Result<()> {
        self.state().record(cmd, MockCommand::BindPipeline(pipeline))
    }

    fn cmd_bind_descriptor_sets(
        &mut self,
        cmd: CommandBufferId,
        _layout: PipelineLayoutId,
        first_set: u32,
        sets: &[DescriptorSetId],
    ) -> Result<()> {
        self.state().record(cmd, MockCommand::BindDescriptorSets { first_set, sets: sets.to_vec() })
    }

    fn cmd_push_constants(
        &mut self,
        cmd: CommandBufferId,
        _layout: PipelineLayoutId,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.state().record(cmd, MockCommand::PushConstants { offset, data: data.to_vec() })
    }

    fn cmd_bind_vertex_buffer(&mut self, cmd: CommandBufferId, binding: u32, buffer: GpuBufferId) -> Result<()> {
        let mut state = self.state();
        if !state.buffers.contains_key(buffer) {
            state.violations.push("bound a destroyed vertex buffer".to_string());
        }
        state.record(cmd, MockCommand::BindVertexBuffer { binding, buffer })
    }

    fn cmd_bind_index_buffer(&mut self, cmd: CommandBufferId, buffer: GpuBufferId, _index_type: IndexType) -> Result<()> {
        let mut state = self.state();
        if !state.buffers.contains_key(buffer) {
            state.violations.push("bound a destroyed index buffer".to_string());
        }
        state.record(cmd, MockCommand::BindIndexBuffer(buffer))
    }

    fn cmd_draw(&mut self, cmd: CommandBufferId, vertex_count: u32, instance_count: u32) -> Result<()> {
        self.state().record(cmd, MockCommand::Draw { vertex_count, instance_count })
    }

    fn cmd_draw_indexed(&mut self, cmd: CommandBufferId, index_count: u32, instance_count: u32) -> Result<()> {
        self.state().record(cmd, MockCommand::DrawIndexed { index_count, instance_count })
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceId> {
        Ok(self.state().fences.insert(MockFence {
            signaled,
            pending: false,
            signal_count: 0,
        }))
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        self.state().fences.remove(fence);
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId> {
        Ok(self.state().semaphores.insert(()))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) {
        self.state().semaphores.remove(semaphore);
    }

    fn wait_for_fence(&mut self, fence: FenceId) -> Result<()> {
        let mut state = self.state();
        let entry = state.fences.get_mut(fence).ok_or_else(|| unknown("fence"))?;
        if entry.pending {
            // The GPU "finishes" the submission now.
            entry.pending = false;
            entry.signaled = true;
            entry.signal_count += 1;
        } else if !entry.signaled {
            state.violations.push("wait on a fence that can never signal".to_string());
        }
        Ok(())
    }

    fn reset_fence(&mut self, fence: FenceId) -> Result<()> {
        let mut state = self.state();
        let entry = state.fences.get_mut(fence).ok_or_else(|| unknown("fence"))?;
        let pending = entry.pending;
        entry.signaled = false;
        if pending {
            state.violations.push("reset of a fence still in flight".to_string());
        }
        Ok(())
    }

    fn submit(&mut self, submit: &SubmitInfo) -> Result<()> {
        let mut state = self.state();
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(Error::BackendError("mock: queue submit failed".to_string()));
        }
        let mut snapshot = Vec::with_capacity(submit.command_buffers.len());
        for &cmd in submit.command_buffers {
            let buffer = state.command_buffers.get(cmd).ok_or_else(|| unknown("command buffer"))?;
            if buffer.recording {
                state.violations.push("submitted a buffer that is still recording".to_string());
            }
            let commands = state.command_buffers[cmd].commands.clone();
            snapshot.push((cmd, commands));
        }
        if let Some(fence) = submit.fence {
            let entry = state.fences.get_mut(fence).ok_or_else(|| unknown("fence"))?;
            let misuse = entry.signaled || entry.pending;
            entry.pending = true;
            entry.signaled = false;
            if misuse {
                state.violations.push("submitted with a fence that was not reset".to_string());
            }
            for &cmd in submit.command_buffers {
                state.command_buffers[cmd].in_flight = Some(fence);
            }
        }
        state.submissions.push(MockSubmission {
            command_buffers: snapshot,
            wait_semaphores: submit.wait_semaphores.to_vec(),
            signal_semaphores: submit.signal_semaphores.to_vec(),
            fence: submit.fence,
        });
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<()> {
        let mut state = self.state();
        for fence in state.fences.values_mut() {
            if fence.pending {
                fence.pending = false;
                fence.signaled = true;
                fence.signal_count += 1;
            }
        }
        state.wait_idle_count += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
