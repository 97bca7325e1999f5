/// Renderer - owner of the GPU device and of every resource built on it
///
/// The renderer moves through three states:
///
/// ```text
/// Created --init()--> Initialized --dispose()--> Disposed
/// ```
///
/// Observers are registered while Created. Resource creation, drawing and
/// resizing require Initialized. `dispose` is idempotent and also runs on
/// drop.

use crate::buffer::{
    CubemapBuffer, GpuResource, ImageBuffer, IndexBuffer, PixelFormat, Registry, StorageBuffer, UniformBuffer, VertexBuffer,
};
use crate::config::Config;
use crate::descriptor::{DescriptorAllocator, DescriptorKind};
use crate::error::{Error, Result};
use crate::frame::{FrameSync, SwapChain};
use crate::graphics_device::{
    DeviceInfo, Extent2D, GraphicsDevice, PushConstantRange, Rect2D, SamplerKind, VertexBinding, Viewport,
};
use crate::pipeline::{Pipeline, PipelineMode, PipelineRegistry, ShaderLibrary, ShaderSources};
use crate::render_pass::{RenderPassKind, RenderPassRegistry};
use crate::render_target::RenderTarget;
use crate::renderer::observer::RenderObserver;
use crate::vertex::GlobalUniforms;

/// Lifecycle state of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Created,
    Initialized,
    Disposed,
}

/// Outcome of `Renderer::draw`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented
    Presented,
    /// The swapchain was out of date: it was rebuilt and nothing was drawn
    SwapchainRecreated,
    /// The surface has a zero extent (minimized window); nothing was drawn
    Skipped,
}

/// Counters of the last presented frame, plus lifetime totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    /// Draw calls recorded in the last frame (all command buffers)
    pub draw_calls: u32,
    /// Triangles drawn in the last frame
    pub triangles: u64,
    /// Frames presented since init
    pub frames_presented: u64,
    /// Swapchain recreations since init
    pub swapchain_recreations: u32,
}

/// Global uniform buffer of one frame in flight and its descriptor
pub(super) struct FrameGlobals {
    pub(super) buffer: UniformBuffer,
    pub(super) descriptor: usize,
}

/// Everything `init()` builds on the device
pub(super) struct GpuState {
    pub(super) swap_chain: SwapChain,
    pub(super) passes: RenderPassRegistry,
    pub(super) descriptors: DescriptorAllocator,
    pub(super) frame_sync: FrameSync,
    pub(super) globals: Vec<FrameGlobals>,
    pub(super) placeholder: ImageBuffer,
    pub(super) placeholder_descriptor: usize,
}

/// Lumen3D renderer
///
/// # Example
///
/// ```ignore
/// let device = VulkanGraphicsDevice::new(&window, &config)?;
/// let mut renderer = Renderer::new(Box::new(device), config, shaders);
/// renderer.add_observer(Box::new(scene))?;
/// renderer.init()?;
///
/// loop {
///     renderer.draw()?;
/// }
/// ```
pub struct Renderer {
    pub(super) device: Box<dyn GraphicsDevice>,
    pub(super) config: Config,
    pub(super) shaders: ShaderLibrary,
    pub(super) state: RendererState,
    pub(super) observers: Vec<Box<dyn RenderObserver>>,
    pub(super) gpu: Option<GpuState>,

    pub(super) vertex_buffers: Registry<VertexBuffer>,
    pub(super) index_buffers: Registry<IndexBuffer>,
    pub(super) image_buffers: Registry<ImageBuffer>,
    pub(super) image_descriptors: Vec<usize>,
    pub(super) cubemap_buffers: Registry<CubemapBuffer>,
    pub(super) cubemap_descriptors: Vec<usize>,
    pub(super) uniform_buffers: Registry<UniformBuffer>,
    pub(super) uniform_descriptors: Vec<usize>,
    pub(super) storage_buffers: Registry<StorageBuffer>,
    pub(super) storage_descriptors: Vec<usize>,
    pub(super) render_targets: Registry<RenderTarget>,
    pub(super) pipelines: PipelineRegistry,

    pub(super) camera: GlobalUniforms,
    /// Extent requested by the application (config, then `resize`)
    pub(super) surface_extent: Extent2D,
    /// Set by `resize`, applied before the next frame
    pub(super) resize_pending: bool,
    /// Frame slot whose commands are being recorded
    pub(super) recording_frame: Option<usize>,
    pub(super) stats: RendererStats,
}

/// White texel of the placeholder texture
const PLACEHOLDER_TEXEL: [u8; 4] = [255, 255, 255, 255];

impl Renderer {
    /// Wrap a graphics device. Nothing is created on it before `init()`.
    ///
    /// # Arguments
    ///
    /// * `device` - The GPU backend, owned by the renderer from now on
    /// * `config` - Extents, pool capacities, clear colors and formats
    /// * `shaders` - Bytecode of the built-in draw modes (`Present` required)
    pub fn new(device: Box<dyn GraphicsDevice>, config: Config, shaders: ShaderLibrary) -> Self {
        let surface_extent = Extent2D::new(config.width, config.height);
        Self {
            device,
            config,
            shaders,
            state: RendererState::Created,
            observers: Vec::new(),
            gpu: None,
            vertex_buffers: Registry::new(),
            index_buffers: Registry::new(),
            image_buffers: Registry::new(),
            image_descriptors: Vec::new(),
            cubemap_buffers: Registry::new(),
            cubemap_descriptors: Vec::new(),
            uniform_buffers: Registry::new(),
            uniform_descriptors: Vec::new(),
            storage_buffers: Registry::new(),
            storage_descriptors: Vec::new(),
            render_targets: Registry::new(),
            pipelines: PipelineRegistry::new(),
            camera: GlobalUniforms::default(),
            surface_extent,
            resize_pending: false,
            recording_frame: None,
            stats: RendererStats::default(),
        }
    }

    /// Register an observer. Only allowed before `init()`.
    pub fn add_observer(&mut self, observer: Box<dyn RenderObserver>) -> Result<()> {
        if self.state != RendererState::Created {
            engine_bail_violation!(
                "lumen3d::Renderer",
                "Observers must be registered before init (state is {:?})",
                self.state
            );
        }
        self.observers.push(observer);
        Ok(())
    }

    // ===== INITIALIZATION =====

    /// Build swapchain, passes, descriptor pools, frame sync objects, global
    /// uniforms, the placeholder texture and the built-in pipelines, then
    /// call every observer's `on_init`.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when a device object cannot be created or the
    /// `Present` shaders are missing. `ContractViolation` when called twice.
    pub fn init(&mut self) -> Result<()> {
        if self.state != RendererState::Created {
            engine_bail_violation!("lumen3d::Renderer", "init called in state {:?}", self.state);
        }
        if !self.shaders.contains(PipelineMode::Present) {
            return Err(engine_init_err!("lumen3d::Renderer", "The Present shaders are required"));
        }

        let gpu = Self::build_gpu_state(self.device.as_mut(), &self.config, self.surface_extent)
            .map_err(|e| Self::as_init_error("device resources", e))?;
        engine_info!(
            "lumen3d::Renderer",
            "Renderer initialized on '{}': {} frames in flight",
            self.device.info().name, gpu.frame_sync.frames_in_flight()
        );
        self.surface_extent = gpu.swap_chain.extent();
        self.gpu = Some(gpu);
        self.state = RendererState::Initialized;

        if let Err(e) = self.create_mode_pipelines() {
            if let Err(cleanup) = self.release_gpu() {
                engine_error!("lumen3d::Renderer", "Cleanup after failed init: {}", cleanup);
            }
            self.state = RendererState::Disposed;
            return Err(Self::as_init_error("pipelines", e));
        }

        self.notify(|observer, renderer| observer.on_init(renderer))
    }

    fn build_gpu_state(device: &mut dyn GraphicsDevice, config: &Config, extent: Extent2D) -> Result<GpuState> {
        let mut swap_chain = SwapChain::new(device, extent)?;
        let passes = RenderPassRegistry::new(
            device,
            swap_chain.format(),
            config.offscreen_color_format,
            config.depth_format,
        )?;
        swap_chain.create_framebuffers(device, passes.get(RenderPassKind::Main))?;

        let mut descriptors = DescriptorAllocator::new(device, &config.descriptor_pools)?;
        let image_count = swap_chain.image_count();
        let frame_sync = FrameSync::new(device, image_count, image_count)?;

        let mut globals = Vec::with_capacity(frame_sync.frames_in_flight());
        for _ in 0..frame_sync.frames_in_flight() {
            let mut buffer = UniformBuffer::new();
            buffer.create(device, GlobalUniforms::SIZE, Some(bytemuck::bytes_of(&GlobalUniforms::default())))?;
            let descriptor = descriptors.create_uniform_descriptor(device, buffer.gpu_buffer()?, GlobalUniforms::SIZE)?;
            globals.push(FrameGlobals { buffer, descriptor });
        }

        let mut placeholder = ImageBuffer::new();
        placeholder.create(device, &PLACEHOLDER_TEXEL, 1, 1, PixelFormat::Rgba)?;
        let placeholder_descriptor =
            descriptors.create_texture_descriptor(device, placeholder.gpu_image()?, SamplerKind::LinearRepeat)?;

        Ok(GpuState {
            swap_chain,
            passes,
            descriptors,
            frame_sync,
            globals,
            placeholder,
            placeholder_descriptor,
        })
    }

    fn create_mode_pipelines(&mut self) -> Result<()> {
        for mode in PipelineMode::ALL {
            let Some(sources) = self.shaders.get(mode).cloned() else {
                engine_debug!("lumen3d::Renderer", "No shaders for {:?}, pipeline skipped", mode);
                continue;
            };
            self.create_pipeline(
                mode.name(),
                &sources,
                mode.vertex_binding(),
                mode.set_kinds(),
                &mode.push_constant_ranges(),
                mode.render_pass(),
                |pipeline| mode.configure(pipeline),
            )?;
        }
        Ok(())
    }

    fn as_init_error(stage: &str, error: Error) -> Error {
        match error {
            Error::ContractViolation(_) | Error::InitializationFailed(_) => error,
            other => engine_init_err!("lumen3d::Renderer", "Failed to create {}: {}", stage, other),
        }
    }

    /// Register, configure and finalize a pipeline
    ///
    /// A failed step unregisters the pipeline and releases its layout, so
    /// the name can be used again.
    ///
    /// # Arguments
    ///
    /// * `name` - Registry name, used by `bind_pipeline`
    /// * `shaders` - Vertex + fragment bytecode
    /// * `binding` - Vertex binding 0
    /// * `set_kinds` - Descriptor kind of each set, in set order
    /// * `push_constant_ranges` - Push constant ranges of the layout
    /// * `render_pass` - Pass the pipeline renders in
    /// * `configure` - Declares attributes and fixed-function state
    #[allow(clippy::too_many_arguments)]
    pub fn create_pipeline<F>(
        &mut self,
        name: &str,
        shaders: &ShaderSources,
        binding: VertexBinding,
        set_kinds: &[DescriptorKind],
        push_constant_ranges: &[PushConstantRange],
        render_pass: RenderPassKind,
        configure: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Pipeline) -> Result<()>,
    {
        let gpu = initialized(&self.gpu)?;
        let set_layouts: Vec<_> = set_kinds.iter().map(|kind| gpu.descriptors.layout(*kind)).collect();
        let pass = gpu.passes.get(render_pass);
        let extent = gpu.swap_chain.extent();

        let pipeline = self.pipelines.create_pipeline(name, shaders, binding)?;
        let built = configure(&mut *pipeline)
            .and_then(|()| pipeline.create_pipeline_layout(self.device.as_mut(), &set_layouts, push_constant_ranges))
            .and_then(|()| {
                pipeline.create_pipeline(self.device.as_mut(), pass, Viewport::full(extent), Rect2D::full(extent))
            });
        if built.is_err() {
            self.pipelines.remove_pipeline(self.device.as_mut(), name);
        }
        built
    }

    // ===== DISPOSAL =====

    /// Wait for the device, notify observers, then release every resource
    ///
    /// A no-op when already disposed.
    pub fn dispose(&mut self) -> Result<()> {
        match self.state {
            RendererState::Disposed => return Ok(()),
            RendererState::Created => {
                self.state = RendererState::Disposed;
                return Ok(());
            }
            RendererState::Initialized => {}
        }

        self.device.wait_idle()?;
        let notified = self.notify(|observer, renderer| observer.on_dispose(renderer));
        self.release_gpu()?;

        self.state = RendererState::Disposed;
        engine_info!("lumen3d::Renderer", "Renderer disposed");
        notified
    }

    /// Destroy every resource built on the device. The device must be idle.
    fn release_gpu(&mut self) -> Result<()> {
        let device = self.device.as_mut();
        self.render_targets.dispose_all(device)?;
        self.vertex_buffers.dispose_all(device)?;
        self.index_buffers.dispose_all(device)?;
        self.image_buffers.dispose_all(device)?;
        self.cubemap_buffers.dispose_all(device)?;
        self.uniform_buffers.dispose_all(device)?;
        self.storage_buffers.dispose_all(device)?;
        self.pipelines.destroy_all(device);

        if let Some(mut gpu) = self.gpu.take() {
            for mut globals in gpu.globals.drain(..) {
                globals.buffer.dispose(device)?;
            }
            gpu.placeholder.dispose(device)?;
            gpu.descriptors.destroy(device);
            gpu.frame_sync.destroy(device);
            gpu.swap_chain.destroy_framebuffers(device);
            gpu.passes.destroy(device);
        }
        Ok(())
    }

    // ===== OBSERVERS =====

    /// Invoke `f` on every observer in registration order, stopping at the first error
    pub(super) fn notify<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut dyn RenderObserver, &mut Renderer) -> Result<()>,
    {
        let mut observers = std::mem::take(&mut self.observers);
        let mut result = Ok(());
        for observer in observers.iter_mut() {
            if let Err(e) = f(observer.as_mut(), self) {
                result = Err(e);
                break;
            }
        }
        observers.append(&mut self.observers);
        self.observers = observers;
        result
    }

    // ===== ACCESS =====

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_info(&self) -> &DeviceInfo {
        self.device.info()
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    /// Current swapchain extent
    pub fn swapchain_extent(&self) -> Result<Extent2D> {
        Ok(initialized(&self.gpu)?.swap_chain.extent())
    }

    pub fn frames_in_flight(&self) -> Result<usize> {
        Ok(initialized(&self.gpu)?.frame_sync.frames_in_flight())
    }

    /// Frame slot the next (or current) frame records into
    pub fn current_frame(&self) -> Result<usize> {
        Ok(initialized(&self.gpu)?.frame_sync.cursor())
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    pub fn descriptors(&self) -> Result<&DescriptorAllocator> {
        Ok(&initialized(&self.gpu)?.descriptors)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            engine_error!("lumen3d::Renderer", "Dispose on drop failed: {}", e);
        }
    }
}

pub(super) fn initialized(gpu: &Option<GpuState>) -> Result<&GpuState> {
    gpu.as_ref()
        .ok_or_else(|| engine_violation!("lumen3d::Renderer", "Renderer is not initialized"))
}

pub(super) fn initialized_mut(gpu: &mut Option<GpuState>) -> Result<&mut GpuState> {
    gpu.as_mut()
        .ok_or_else(|| engine_violation!("lumen3d::Renderer", "Renderer is not initialized"))
}
