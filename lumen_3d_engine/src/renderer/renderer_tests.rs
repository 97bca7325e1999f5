//! Unit tests for the renderer (renderer.rs, renderer_resources.rs,
//! renderer_frame.rs, renderer_draw.rs), against the mock device

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};

use crate::buffer::{BufferState, GpuResource, Handle, PixelFormat};
use crate::config::Config;
use crate::descriptor::DescriptorKind;
use crate::error::{Error, Result};
use crate::graphics_device::mock_graphics_device::{MockCommand, MockGraphicsDevice, MockProbe};
use crate::graphics_device::{
    AcquireOutcome, BlendMode, CommandBufferId, DescriptorResource, Extent2D, PresentOutcome, SamplerKind, ShaderStageFlags,
    Viewport,
};
use crate::pipeline::{PipelineMode, ShaderLibrary, ShaderSources};
use crate::render_target::RenderTarget;
use crate::renderer::{DescriptorRef, FrameStatus, RenderObserver, Renderer, RendererState};
use crate::vertex::{Vertex2d, Vertex3d};

// ============================================================================
// HELPERS
// ============================================================================

fn shader_library() -> ShaderLibrary {
    let sources = ShaderSources::new(vec![1, 2, 3, 4], vec![5, 6, 7, 8]);
    PipelineMode::ALL
        .iter()
        .fold(ShaderLibrary::new(), |library, mode| library.with(*mode, sources.clone()))
}

fn renderer_with(observers: Vec<Box<dyn RenderObserver>>) -> (Renderer, MockProbe) {
    let device = MockGraphicsDevice::new();
    let probe = device.probe();
    let mut renderer = Renderer::new(Box::new(device), Config::default(), shader_library());
    for observer in observers {
        renderer.add_observer(observer).unwrap();
    }
    renderer.init().unwrap();
    (renderer, probe)
}

fn script_acquires(probe: &MockProbe, images: &[u32]) {
    let mut state = probe.state();
    for &image_index in images {
        state
            .acquire_script
            .push_back(AcquireOutcome::Acquired { image_index, suboptimal: false });
    }
}

fn assert_no_violations(probe: &MockProbe) {
    let state = probe.state();
    assert!(state.violations.is_empty(), "device violations: {:?}", state.violations);
}

fn quad_vertices() -> [Vertex3d; 4] {
    let normal = Vec3::Z;
    [
        Vertex3d::new(Vec3::new(-1.0, -1.0, 0.0), normal, Vec2::new(0.0, 0.0)),
        Vertex3d::new(Vec3::new(1.0, -1.0, 0.0), normal, Vec2::new(1.0, 0.0)),
        Vertex3d::new(Vec3::new(1.0, 1.0, 0.0), normal, Vec2::new(1.0, 1.0)),
        Vertex3d::new(Vec3::new(-1.0, 1.0, 0.0), normal, Vec2::new(0.0, 1.0)),
    ]
}

type Events = Rc<RefCell<Vec<String>>>;

/// Logs every lifecycle callback as "name:event"
struct EventObserver {
    name: &'static str,
    events: Events,
}

impl EventObserver {
    fn boxed(name: &'static str, events: &Events) -> Box<dyn RenderObserver> {
        Box::new(Self {
            name,
            events: Rc::clone(events),
        })
    }

    fn push(&self, event: &str) {
        self.events.borrow_mut().push(format!("{}:{}", self.name, event));
    }
}

impl RenderObserver for EventObserver {
    fn on_init(&mut self, _renderer: &mut Renderer) -> Result<()> {
        self.push("init");
        Ok(())
    }

    fn on_offscreen(&mut self, _renderer: &mut Renderer, frame: usize) -> Result<()> {
        self.push(&format!("offscreen:{}", frame));
        Ok(())
    }

    fn on_draw(&mut self, _renderer: &mut Renderer, _cmd: CommandBufferId, frame: usize) -> Result<()> {
        self.push(&format!("draw:{}", frame));
        Ok(())
    }

    fn on_dispose(&mut self, _renderer: &mut Renderer) -> Result<()> {
        self.push("dispose");
        Ok(())
    }

    fn before_swapchain_recreate(&mut self, _renderer: &mut Renderer) -> Result<()> {
        self.push("before");
        Ok(())
    }

    fn after_swapchain_recreate(&mut self, _renderer: &mut Renderer, width: u32, height: u32) -> Result<()> {
        self.push(&format!("after:{}x{}", width, height));
        Ok(())
    }
}

/// A scene rendering nothing but its cleared render target
#[derive(Default)]
struct TargetScene {
    target: Option<Handle<RenderTarget>>,
}

impl RenderObserver for TargetScene {
    fn on_init(&mut self, renderer: &mut Renderer) -> Result<()> {
        self.target = Some(renderer.create_render_target()?);
        Ok(())
    }

    fn on_draw(&mut self, renderer: &mut Renderer, _cmd: CommandBufferId, frame: usize) -> Result<()> {
        let target = self.target.unwrap();
        renderer.begin_render_target(target, frame)?;
        renderer.end_render_target(target, frame)
    }
}

/// A scene drawing one indexed mesh into its render target with the opaque pipeline
#[derive(Default)]
struct MeshScene {
    target: Option<Handle<RenderTarget>>,
    mesh: Option<(Handle<crate::buffer::VertexBuffer>, Handle<crate::buffer::IndexBuffer>)>,
}

impl RenderObserver for MeshScene {
    fn on_init(&mut self, renderer: &mut Renderer) -> Result<()> {
        self.target = Some(renderer.create_render_target()?);
        let vertices = renderer.create_vertex_buffer(&quad_vertices())?;
        let indices = renderer.create_index_buffer(&[0, 1, 2, 2, 3, 0])?;
        self.mesh = Some((vertices, indices));
        Ok(())
    }

    fn on_draw(&mut self, renderer: &mut Renderer, _cmd: CommandBufferId, frame: usize) -> Result<()> {
        let target = self.target.unwrap();
        let (vertices, indices) = self.mesh.unwrap();

        let cmd = renderer.begin_render_target(target, frame)?;
        renderer.bind_pipeline(cmd, "opaque")?;
        let texture = renderer.texture_or_placeholder(None);
        renderer.bind_descriptor_sets(cmd, &[DescriptorRef::GlobalUniforms, DescriptorRef::Texture(texture)], frame)?;
        renderer.bind_push_constants(cmd, ShaderStageFlags::VERTEX, 0, bytemuck::bytes_of(&Mat4::IDENTITY))?;
        renderer.draw_buffers(vertices, indices, cmd, 1)?;
        renderer.end_render_target(target, frame)
    }
}

/// Runs a closure as `on_draw`
struct DrawFn(Box<dyn FnMut(&mut Renderer, CommandBufferId, usize) -> Result<()>>);

impl DrawFn {
    fn boxed<F>(f: F) -> Box<dyn RenderObserver>
    where
        F: FnMut(&mut Renderer, CommandBufferId, usize) -> Result<()> + 'static,
    {
        Box::new(Self(Box::new(f)))
    }
}

impl RenderObserver for DrawFn {
    fn on_draw(&mut self, renderer: &mut Renderer, cmd: CommandBufferId, frame: usize) -> Result<()> {
        (self.0)(renderer, cmd, frame)
    }
}

// ============================================================================
// INITIALIZATION AND DISPOSAL
// ============================================================================

#[test]
fn test_init_builds_frame_resources() {
    let (renderer, probe) = renderer_with(Vec::new());

    assert_eq!(renderer.state(), RendererState::Initialized);
    assert_eq!(renderer.frames_in_flight().unwrap(), 3);
    assert_eq!(renderer.current_frame().unwrap(), 0);
    assert_eq!(renderer.swapchain_extent().unwrap(), Extent2D::new(1280, 720));
    assert_eq!(renderer.device_info().name, "Mock GPU");

    for mode in PipelineMode::ALL {
        assert!(renderer.pipelines().get_pipeline(mode.name()).unwrap().is_finalized());
    }

    let descriptors = renderer.descriptors().unwrap();
    assert_eq!(descriptors.allocated(DescriptorKind::Uniform), 3);
    assert_eq!(descriptors.allocated(DescriptorKind::Texture), 1);

    let state = probe.state();
    assert_eq!(state.fences.len(), 3);
    assert!(state.fences.values().all(|fence| fence.signaled));
    assert_eq!(state.framebuffers.len(), 3);
    assert!(state.shaders.is_empty());
    assert!(state.violations.is_empty());
}

#[test]
fn test_optional_modes_skipped_without_shaders() {
    let device = MockGraphicsDevice::new();
    let shaders = ShaderLibrary::new().with(PipelineMode::Present, ShaderSources::new(vec![1], vec![2]));
    let mut renderer = Renderer::new(Box::new(device), Config::default(), shaders);
    renderer.init().unwrap();

    assert!(renderer.pipelines().contains("present"));
    assert!(!renderer.pipelines().contains("opaque"));
    assert_eq!(renderer.pipelines().len(), 1);
}

fn create_overlay_pipeline(renderer: &mut Renderer, shaders: &ShaderSources) -> Result<()> {
    let mode = PipelineMode::Sprite;
    renderer.create_pipeline(
        "overlay",
        shaders,
        mode.vertex_binding(),
        mode.set_kinds(),
        &mode.push_constant_ranges(),
        mode.render_pass(),
        |pipeline| mode.configure(pipeline),
    )
}

#[test]
fn test_failed_user_pipeline_is_unregistered() {
    let (mut renderer, probe) = renderer_with(Vec::new());
    let layouts_before = probe.state().pipeline_layouts.len();

    create_overlay_pipeline(&mut renderer, &ShaderSources::new(Vec::new(), vec![2])).unwrap_err();
    assert!(!renderer.pipelines().contains("overlay"));
    assert_eq!(probe.state().pipeline_layouts.len(), layouts_before);

    create_overlay_pipeline(&mut renderer, &ShaderSources::new(vec![1], vec![2])).unwrap();
    assert!(renderer.pipelines().get_pipeline("overlay").unwrap().is_finalized());
    assert_eq!(probe.state().pipeline_layouts.len(), layouts_before + 1);
    assert_no_violations(&probe);
}

#[test]
fn test_present_pipeline_blends_targets() {
    let (renderer, probe) = renderer_with(Vec::new());
    let present = renderer.pipelines().get_pipeline("present").unwrap();
    assert_eq!(present.blend(), BlendMode::Alpha);

    let state = probe.state();
    assert_eq!(state.pipelines[present.gpu_pipeline().unwrap()].blend, BlendMode::Alpha);
}

#[test]
fn test_init_requires_present_shaders() {
    let device = MockGraphicsDevice::new();
    let shaders = ShaderLibrary::new().with(PipelineMode::Opaque, ShaderSources::new(vec![1], vec![2]));
    let mut renderer = Renderer::new(Box::new(device), Config::default(), shaders);

    let err = renderer.init().unwrap_err();
    assert!(matches!(err, Error::InitializationFailed(_)));
    assert_eq!(renderer.state(), RendererState::Created);
}

#[test]
fn test_failed_pipeline_creation_releases_resources() {
    let device = MockGraphicsDevice::new();
    let probe = device.probe();
    let shaders = ShaderLibrary::new().with(PipelineMode::Present, ShaderSources::new(Vec::new(), vec![2]));
    let mut renderer = Renderer::new(Box::new(device), Config::default(), shaders);

    let err = renderer.init().unwrap_err();
    assert!(matches!(err, Error::InitializationFailed(_)));
    assert_eq!(renderer.state(), RendererState::Disposed);

    let state = probe.state();
    assert_eq!(state.live_buffer_count(), 0);
    assert!(state.fences.is_empty());
    assert!(state.descriptor_pools.is_empty());
    assert!(state.render_passes.is_empty());
}

#[test]
fn test_observer_registration_only_before_init() {
    let (mut renderer, _probe) = renderer_with(Vec::new());
    let err = renderer.add_observer(Box::new(TargetScene::default())).unwrap_err();
    assert!(err.is_contract_violation());
    assert!(renderer.init().unwrap_err().is_contract_violation());
}

#[test]
fn test_operations_before_init_are_violations() {
    let device = MockGraphicsDevice::new();
    let mut renderer = Renderer::new(Box::new(device), Config::default(), shader_library());

    assert!(renderer.draw().unwrap_err().is_contract_violation());
    assert!(renderer.create_index_buffer(&[0, 1, 2]).unwrap_err().is_contract_violation());
    assert!(renderer.create_render_target().unwrap_err().is_contract_violation());
    assert!(renderer.frames_in_flight().unwrap_err().is_contract_violation());
}

#[test]
fn test_init_notifies_observers_in_order() {
    let events = Events::default();
    let (_renderer, _probe) =
        renderer_with(vec![EventObserver::boxed("a", &events), EventObserver::boxed("b", &events)]);
    assert_eq!(*events.borrow(), vec!["a:init", "b:init"]);
}

#[test]
fn test_dispose_releases_everything_once() {
    let events = Events::default();
    let (mut renderer, probe) =
        renderer_with(vec![EventObserver::boxed("a", &events), Box::new(MeshScene::default())]);
    renderer.create_uniform_buffer(64, None).unwrap();
    renderer.create_storage_buffer(256, Some(&[1u8; 16])).unwrap();
    renderer.create_image_buffer(&[255u8; 16], 2, 2, PixelFormat::Rgba).unwrap();
    renderer.draw().unwrap();
    renderer.draw().unwrap();

    renderer.dispose().unwrap();
    assert_eq!(renderer.state(), RendererState::Disposed);
    assert_eq!(events.borrow().last().map(String::as_str), Some("a:dispose"));

    {
        let state = probe.state();
        assert_eq!(state.live_buffer_count(), 0);
        assert!(state.images.values().all(|image| image.swapchain));
        assert!(state.pipelines.is_empty());
        assert!(state.pipeline_layouts.is_empty());
        assert!(state.fences.is_empty());
        assert!(state.semaphores.is_empty());
        assert!(state.command_buffers.is_empty());
        assert!(state.descriptor_pools.is_empty());
        assert!(state.set_layouts.is_empty());
        assert!(state.render_passes.is_empty());
        assert!(state.framebuffers.is_empty());
        assert!(state.violations.is_empty(), "{:?}", state.violations);
    }

    let disposed_events = events.borrow().len();
    renderer.dispose().unwrap();
    assert_eq!(events.borrow().len(), disposed_events);
}

// ============================================================================
// RESOURCES
// ============================================================================

#[test]
fn test_scenario_a_indexed_draw() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(MeshScene::default())]);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);

    let state = probe.state();
    let submission = state.last_submission().unwrap();
    assert_eq!(submission.command_buffers.len(), 2);
    let (_, target_commands) = &submission.command_buffers[0];
    let draws: Vec<_> = target_commands
        .iter()
        .filter(|command| matches!(command, MockCommand::DrawIndexed { .. } | MockCommand::Draw { .. }))
        .collect();
    assert_eq!(draws, vec![&MockCommand::DrawIndexed { index_count: 6, instance_count: 1 }]);
    assert!(target_commands
        .iter()
        .any(|command| matches!(command, MockCommand::PushConstants { offset: 0, data } if data.len() == 64)));
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_scenario_c_empty_dynamic_update() {
    let (mut renderer, probe) = renderer_with(Vec::new());
    let buffers_before = probe.state().live_buffer_count();

    let handle = renderer.create_dynamic_vertex_buffer::<Vertex2d>(&[], None).unwrap();
    renderer.update_dynamic_vertex_buffer::<Vertex2d>(handle, &[]).unwrap();

    let buffer = renderer.get_vertex_buffer(handle).unwrap();
    assert_eq!(buffer.state(), BufferState::Initialized);
    assert_eq!(buffer.vertex_count(), 0);
    assert_eq!(buffer.capacity(), 1024);
    assert_eq!(buffer.reallocation_count(), 0);
    assert_eq!(probe.state().live_buffer_count(), buffers_before + 1);
}

#[test]
fn test_dynamic_update_rejects_other_vertex_type() {
    let (mut renderer, _probe) = renderer_with(Vec::new());
    let handle = renderer.create_dynamic_vertex_buffer::<Vertex2d>(&[], Some(8)).unwrap();
    let err = renderer.update_dynamic_vertex_buffer(handle, &quad_vertices()).unwrap_err();
    assert!(err.is_contract_violation());
}

#[test]
fn test_superseded_buffer_retired_for_frames_in_flight() {
    let (mut renderer, probe) = renderer_with(Vec::new());
    let handle = renderer
        .create_dynamic_vertex_buffer(&[Vertex2d::new(0.0, 0.0, 0.0, 0.0); 2], Some(2))
        .unwrap();
    let superseded = renderer.get_vertex_buffer(handle).unwrap().gpu_buffer().unwrap();

    renderer
        .update_dynamic_vertex_buffer(handle, &[Vertex2d::new(1.0, 1.0, 1.0, 1.0); 4])
        .unwrap();
    let buffer = renderer.get_vertex_buffer(handle).unwrap();
    assert_eq!(buffer.vertex_count(), 4);
    assert_ne!(buffer.gpu_buffer().unwrap(), superseded);

    for _ in 0..3 {
        renderer.draw().unwrap();
        assert!(probe.state().buffers.contains_key(superseded));
    }
    renderer.draw().unwrap();

    let state = probe.state();
    assert!(!state.buffers.contains_key(superseded));
    assert!(state.destroyed_buffers.contains(&superseded));
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_retired_buffer_destroyed_on_dispose() {
    let (mut renderer, probe) = renderer_with(Vec::new());
    let handle = renderer.create_dynamic_vertex_buffer::<Vertex2d>(&[], Some(1)).unwrap();
    let superseded = renderer.get_vertex_buffer(handle).unwrap().gpu_buffer().unwrap();
    renderer
        .update_dynamic_vertex_buffer(handle, &[Vertex2d::new(0.0, 0.0, 0.0, 0.0); 3])
        .unwrap();

    renderer.dispose().unwrap();
    assert!(!probe.state().buffers.contains_key(superseded));
    assert_no_violations(&probe);
}

#[test]
fn test_handles_stable_across_creation_and_disposal() {
    let (mut renderer, _probe) = renderer_with(Vec::new());
    let vertices = quad_vertices();

    let first = renderer.create_vertex_buffer(&vertices).unwrap();
    let indices = renderer.create_index_buffer(&[0, 1, 2]).unwrap();
    let second = renderer.create_vertex_buffer(&vertices).unwrap();
    renderer.dispose_vertex_buffer(first).unwrap();
    let third = renderer.create_vertex_buffer(&vertices).unwrap();

    assert_eq!((first.index(), second.index(), third.index()), (0, 1, 2));
    assert_eq!(indices.index(), 0);
    assert_eq!(renderer.get_vertex_buffer(first).unwrap().state(), BufferState::Disposed);
    assert_eq!(renderer.get_vertex_buffer(second).unwrap().state(), BufferState::Initialized);
    assert_eq!(renderer.get_vertex_buffer(third).unwrap().vertex_count(), 4);
    assert_eq!(renderer.get_index_buffer(indices).unwrap().index_count(), 3);

    let unknown = Handle::new(7);
    assert!(renderer.get_vertex_buffer(unknown).unwrap_err().is_contract_violation());
}

#[test]
fn test_image_descriptors_and_placeholder() {
    let (mut renderer, probe) = renderer_with(Vec::new());

    let placeholder = renderer.texture_or_placeholder(None);
    let rgb = renderer.create_image_buffer(&[10u8; 3 * 4], 2, 2, PixelFormat::Rgb).unwrap();
    let gray = renderer.create_image_buffer(&[7u8; 4], 2, 2, PixelFormat::Grayscale).unwrap();

    assert_eq!(placeholder, 0);
    assert_eq!(renderer.image_descriptor(rgb).unwrap(), 1);
    assert_eq!(renderer.image_descriptor(gray).unwrap(), 2);
    assert_eq!(renderer.texture_or_placeholder(Some(2)), 2);

    let image = renderer.get_image_buffer(rgb).unwrap().gpu_image().unwrap();
    let set = renderer.descriptors().unwrap().get_descriptor_set(DescriptorKind::Texture, 1).unwrap();
    let state = probe.state();
    assert_eq!(state.images[image].data.len(), 16);
    assert_eq!(
        state.descriptor_sets[set].writes[0].resource,
        DescriptorResource::Image { image, sampler: SamplerKind::LinearRepeat }
    );
}

#[test]
fn test_cubemap_creation_validates_faces() {
    let (mut renderer, _probe) = renderer_with(Vec::new());
    let face = [0u8; 4];

    let faces: Vec<&[u8]> = vec![&face[..]; 6];
    let cubemap = renderer.create_cubemap_buffer(&faces, 1, PixelFormat::Rgba).unwrap();
    assert_eq!(renderer.cubemap_descriptor(cubemap).unwrap(), 0);
    assert_eq!(renderer.get_cubemap_buffer(cubemap).unwrap().size(), 1);

    let five: Vec<&[u8]> = vec![&face[..]; 5];
    assert!(renderer.create_cubemap_buffer(&five, 1, PixelFormat::Rgba).unwrap_err().is_contract_violation());
    assert_eq!(renderer.descriptors().unwrap().allocated(DescriptorKind::Cubemap), 1);
}

#[test]
fn test_uniform_and_storage_buffers() {
    let (mut renderer, probe) = renderer_with(Vec::new());

    let uniforms = renderer.create_uniform_buffer(16, None).unwrap();
    let storage = renderer.create_storage_buffer(32, None).unwrap();
    renderer.update_uniform_buffer(uniforms, 8, &[1u8; 8]).unwrap();
    renderer.update_storage_buffer(storage, 0, &[2u8; 32]).unwrap();

    assert!(renderer.update_uniform_buffer(uniforms, 12, &[0u8; 8]).unwrap_err().is_contract_violation());
    // Three per-frame global uniform descriptors come first
    assert_eq!(renderer.uniform_descriptor(uniforms).unwrap(), 3);
    assert_eq!(renderer.storage_descriptor(storage).unwrap(), 0);

    let buffer = renderer.get_uniform_buffer(uniforms).unwrap().gpu_buffer().unwrap();
    assert_eq!(&probe.state().buffers[buffer].data[8..16], &[1u8; 8]);
    assert_eq!(renderer.get_storage_buffer(storage).unwrap().size(), 32);
}

#[test]
fn test_texture_pool_exhaustion_releases_image() {
    let device = MockGraphicsDevice::new();
    let probe = device.probe();
    let mut config = Config::default();
    config.descriptor_pools.textures = 2;
    let mut renderer = Renderer::new(Box::new(device), config, shader_library());
    renderer.init().unwrap();

    // The placeholder holds the first texture descriptor
    renderer.create_image_buffer(&[0u8; 4], 1, 1, PixelFormat::Rgba).unwrap();
    let images_before = probe.state().images.len();
    let err = renderer.create_image_buffer(&[0u8; 4], 1, 1, PixelFormat::Rgba).unwrap_err();

    assert!(err.is_contract_violation());
    assert_eq!(probe.state().images.len(), images_before);
    assert_no_violations(&probe);
}

// ============================================================================
// FRAME LOOP
// ============================================================================

#[test]
fn test_frame_submission_layout() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(TargetScene::default())]);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    assert_eq!(renderer.current_frame().unwrap(), 1);

    let state = probe.state();
    let submission = state.last_submission().unwrap();
    assert_eq!(submission.command_buffers.len(), 2);
    assert_eq!(submission.wait_semaphores.len(), 1);
    assert_eq!(submission.signal_semaphores.len(), 1);
    assert!(submission.fence.is_some());

    let (_, main_commands) = submission.command_buffers.last().unwrap();
    assert!(matches!(main_commands.first(), Some(MockCommand::BeginRenderPass { .. })));
    assert_eq!(main_commands.last(), Some(&MockCommand::EndRenderPass));
    assert_eq!(state.presented, vec![0]);
}

#[test]
fn test_scenario_b_two_targets_composited() {
    let (mut renderer, probe) =
        renderer_with(vec![Box::new(TargetScene::default()), Box::new(TargetScene::default())]);

    renderer.draw().unwrap();

    let descriptors = renderer.descriptors().unwrap();
    let expected: Vec<_> = [Handle::new(0), Handle::new(1)]
        .into_iter()
        .map(|handle| {
            let index = renderer.get_render_target(handle).unwrap().descriptor_index().unwrap();
            descriptors.get_descriptor_set(DescriptorKind::Texture, index).unwrap()
        })
        .collect();
    assert_ne!(expected[0], expected[1]);

    let state = probe.state();
    let submission = state.last_submission().unwrap();
    assert_eq!(submission.command_buffers.len(), 3);
    let (_, main_commands) = submission.command_buffers.last().unwrap();

    let quad_draws = main_commands
        .iter()
        .filter(|command| **command == MockCommand::DrawIndexed { index_count: 6, instance_count: 1 })
        .count();
    let sampled: Vec<_> = main_commands
        .iter()
        .filter_map(|command| match command {
            MockCommand::BindDescriptorSets { first_set: 0, sets } => Some(sets[0]),
            _ => None,
        })
        .collect();
    assert_eq!(quad_draws, 2);
    assert_eq!(sampled, expected);
    assert_eq!(renderer.stats().draw_calls, 2);
    assert_eq!(renderer.stats().triangles, 4);
}

#[test]
fn test_observers_called_each_frame_in_order() {
    let events = Events::default();
    let (mut renderer, _probe) =
        renderer_with(vec![EventObserver::boxed("a", &events), EventObserver::boxed("b", &events)]);
    events.borrow_mut().clear();

    renderer.draw().unwrap();
    renderer.draw().unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            "a:offscreen:0", "b:offscreen:0", "a:draw:0", "b:draw:0",
            "a:offscreen:1", "b:offscreen:1", "a:draw:1", "b:draw:1",
        ]
    );
}

#[test]
fn test_fence_discipline_with_out_of_order_images() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(MeshScene::default())]);
    let order = [0, 0, 2, 1, 1, 0, 2, 2, 1, 0];
    script_acquires(&probe, &order);

    renderer.draw().unwrap();
    let first_fence = probe.state().last_submission().unwrap().fence.unwrap();
    renderer.draw().unwrap();
    // Frame 1 acquired image 0, still owned by frame 0: it waited on frame 0's fence
    assert_eq!(probe.state().fences[first_fence].signal_count, 1);

    for _ in 2..order.len() {
        assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    }

    let state = probe.state();
    assert!(state.violations.is_empty(), "{:?}", state.violations);
    assert_eq!(state.presented, order.to_vec());
    assert_eq!(state.submissions.len(), order.len());
    assert_eq!(renderer.stats().frames_presented, order.len() as u64);
}

#[test]
fn test_out_of_date_acquire_recreates_swapchain() {
    let events = Events::default();
    let (mut renderer, probe) =
        renderer_with(vec![EventObserver::boxed("a", &events), EventObserver::boxed("b", &events)]);
    events.borrow_mut().clear();
    probe.state().acquire_script.push_back(AcquireOutcome::OutOfDate);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::SwapchainRecreated);
    assert_eq!(*events.borrow(), vec!["a:before", "b:before", "a:after:1280x720", "b:after:1280x720"]);
    {
        let state = probe.state();
        assert!(state.submissions.is_empty());
        assert_eq!(state.swapchain_recreations, 1);
        assert_eq!(state.framebuffers.len(), 3);
    }
    assert_eq!(renderer.current_frame().unwrap(), 0);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    assert_eq!(renderer.stats().swapchain_recreations, 1);
    assert_no_violations(&probe);
}

#[test]
fn test_suboptimal_present_recreates_after_frame() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(TargetScene::default())]);
    probe.state().present_script.push_back(PresentOutcome::Suboptimal);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::SwapchainRecreated);
    assert_eq!(renderer.stats().frames_presented, 1);
    assert_eq!(renderer.stats().swapchain_recreations, 1);
    assert_eq!(renderer.current_frame().unwrap(), 1);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    assert_no_violations(&probe);
}

#[test]
fn test_resize_rebuilds_targets_and_viewports() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(TargetScene::default())]);
    renderer.draw().unwrap();

    let target = Handle::<RenderTarget>::new(0);
    let index = renderer.get_render_target(target).unwrap().descriptor_index().unwrap();
    let old_color = renderer.get_render_target(target).unwrap().color_image().unwrap();

    renderer.resize(640, 480);
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);

    let extent = Extent2D::new(640, 480);
    let resized = renderer.get_render_target(target).unwrap();
    let new_color = resized.color_image().unwrap();
    assert_eq!(resized.extent(), extent);
    assert_eq!(resized.descriptor_index().unwrap(), index);
    assert_ne!(new_color, old_color);
    assert_eq!(renderer.swapchain_extent().unwrap(), extent);
    assert_eq!(renderer.pipelines().get_pipeline("present").unwrap().viewport(), Viewport::full(extent));

    let set = renderer.descriptors().unwrap().get_descriptor_set(DescriptorKind::Texture, index).unwrap();
    let state = probe.state();
    assert_eq!(
        state.descriptor_sets[set].writes[0].resource,
        DescriptorResource::Image { image: new_color, sampler: SamplerKind::LinearClamp }
    );
    assert!(state.destroyed_images.contains(&old_color));
    let (_, main_commands) = state.last_submission().unwrap().command_buffers.last().unwrap().clone();
    assert!(main_commands.contains(&MockCommand::SetViewport(Viewport::full(extent))));
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_minimized_window_skips_frames() {
    let (mut renderer, probe) = renderer_with(Vec::new());

    renderer.resize(0, 0);
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Skipped);
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Skipped);
    assert!(probe.state().submissions.is_empty());

    renderer.resize(800, 600);
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    assert_eq!(renderer.swapchain_extent().unwrap(), Extent2D::new(800, 600));
    assert_eq!(probe.state().swapchain_recreations, 1);
}

// ============================================================================
// RECORDING CONTRACTS
// ============================================================================

#[test]
fn test_descriptor_binding_without_pipeline_fails_frame() {
    let mut calls = 0;
    let observer = DrawFn::boxed(move |renderer, cmd, frame| {
        calls += 1;
        if calls == 1 {
            renderer.bind_descriptor_sets(cmd, &[DescriptorRef::GlobalUniforms], frame)
        } else {
            Ok(())
        }
    });
    let (mut renderer, probe) = renderer_with(vec![observer]);

    let err = renderer.draw().unwrap_err();
    assert!(err.is_contract_violation());
    {
        let state = probe.state();
        let released = state.last_submission().unwrap();
        assert_eq!(released.command_buffers.len(), 1);
        assert_eq!(released.wait_semaphores.len(), 1);
        assert_eq!(released.signal_semaphores.len(), 1);
        let commands = released.all_commands();
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], MockCommand::BeginRenderPass { .. }));
        assert_eq!(commands[1], MockCommand::EndRenderPass);
        assert_eq!(state.presented, vec![0]);
    }
    assert_eq!(renderer.current_frame().unwrap(), 1);

    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    assert_eq!(probe.state().presented, vec![0, 1]);
    assert_no_violations(&probe);
}

#[test]
fn test_draw_without_pipeline_fails_frame() {
    type Mesh = (Handle<crate::buffer::VertexBuffer>, Handle<crate::buffer::IndexBuffer>);
    let mesh: Rc<RefCell<Option<Mesh>>> = Rc::new(RefCell::new(None));
    let shared = Rc::clone(&mesh);
    let observer = DrawFn::boxed(move |renderer, cmd, _frame| {
        let Some((vertices, indices)) = *shared.borrow() else {
            return Ok(());
        };
        let unindexed = renderer.draw_vertices(vertices, cmd, 1);
        assert!(unindexed.unwrap_err().is_contract_violation());
        renderer.draw_buffers(vertices, indices, cmd, 1)
    });
    let (mut renderer, probe) = renderer_with(vec![observer]);
    let vertices = renderer.create_vertex_buffer(&quad_vertices()).unwrap();
    let indices = renderer.create_index_buffer(&[0, 1, 2, 2, 3, 0]).unwrap();
    *mesh.borrow_mut() = Some((vertices, indices));

    let err = renderer.draw().unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(renderer.stats().draw_calls, 0);
    {
        let state = probe.state();
        let drew = state.submissions.iter().flat_map(|submission| submission.all_commands()).any(|command| {
            matches!(command, MockCommand::Draw { .. } | MockCommand::DrawIndexed { .. })
        });
        assert!(!drew);
    }
    assert_no_violations(&probe);
}

#[test]
fn test_failed_frames_present_every_acquired_image() {
    let observer =
        DrawFn::boxed(|renderer, cmd, frame| renderer.bind_descriptor_sets(cmd, &[DescriptorRef::GlobalUniforms], frame));
    let (mut renderer, probe) = renderer_with(vec![observer]);

    for _ in 0..7 {
        assert!(renderer.draw().unwrap_err().is_contract_violation());
    }

    assert_eq!(renderer.current_frame().unwrap(), 1);
    let state = probe.state();
    assert_eq!(state.acquired.len(), 7);
    assert_eq!(state.presented, state.acquired);
    assert_eq!(state.submissions.len(), 7);
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_failed_submit_releases_frame() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(TargetScene::default())]);
    probe.state().failing_submits = 1;

    let err = renderer.draw().unwrap_err();
    assert!(matches!(err, Error::BackendError(_)));
    {
        let state = probe.state();
        assert_eq!(state.submissions.len(), 1);
        assert!(state.submissions[0].fence.is_some());
        assert_eq!(state.presented, vec![0]);
    }

    for _ in 0..4 {
        assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);
    }
    assert_eq!(renderer.stats().frames_presented, 4);
    assert_no_violations(&probe);
}

#[test]
fn test_descriptor_sets_checked_against_pipeline_layout() {
    let observer = DrawFn::boxed(|renderer, cmd, frame| {
        renderer.bind_pipeline(cmd, "opaque")?;
        let texture = renderer.texture_or_placeholder(None);

        let wrong_kind = renderer.bind_descriptor_sets(cmd, &[DescriptorRef::Texture(texture)], frame);
        assert!(wrong_kind.unwrap_err().is_contract_violation());

        let too_many = [DescriptorRef::GlobalUniforms, DescriptorRef::Texture(texture), DescriptorRef::Texture(texture)];
        assert!(renderer.bind_descriptor_sets(cmd, &too_many, frame).unwrap_err().is_contract_violation());

        let unknown = renderer.bind_descriptor_sets(cmd, &[DescriptorRef::Uniform(99)], frame);
        assert!(unknown.unwrap_err().is_contract_violation());

        renderer.bind_descriptor_sets(cmd, &[DescriptorRef::GlobalUniforms, DescriptorRef::Texture(texture)], frame)
    });
    let (mut renderer, probe) = renderer_with(vec![observer]);

    renderer.draw().unwrap();
    assert_no_violations(&probe);
}

#[test]
fn test_push_constants_checked_against_ranges() {
    let observer = DrawFn::boxed(|renderer, cmd, _frame| {
        assert!(renderer
            .bind_push_constants(cmd, ShaderStageFlags::VERTEX, 0, &[0u8; 16])
            .unwrap_err()
            .is_contract_violation());

        renderer.bind_pipeline(cmd, "opaque")?;
        assert!(renderer
            .bind_push_constants(cmd, ShaderStageFlags::VERTEX, 0, &[0u8; 68])
            .unwrap_err()
            .is_contract_violation());
        assert!(renderer
            .bind_push_constants(cmd, ShaderStageFlags::FRAGMENT, 0, &[0u8; 16])
            .unwrap_err()
            .is_contract_violation());
        renderer.bind_push_constants(cmd, ShaderStageFlags::VERTEX, 48, &[0u8; 16])
    });
    let (mut renderer, probe) = renderer_with(vec![observer]);

    renderer.draw().unwrap();
    let state = probe.state();
    let commands = state.last_submission().unwrap().all_commands();
    assert!(commands.contains(&MockCommand::PushConstants { offset: 48, data: vec![0u8; 16] }));
}

#[test]
fn test_render_target_only_recorded_during_frame() {
    let (mut renderer, _probe) = renderer_with(Vec::new());
    let target = renderer.create_render_target().unwrap();

    assert!(renderer.begin_render_target(target, 0).unwrap_err().is_contract_violation());
    assert!(renderer.end_render_target(target, 0).unwrap_err().is_contract_violation());
}

#[test]
fn test_unfinished_target_recording_is_discarded() {
    let target = Rc::new(RefCell::new(None));
    let shared = Rc::clone(&target);
    let mut calls = 0;
    let observer = DrawFn::boxed(move |renderer, _cmd, frame| {
        calls += 1;
        if shared.borrow().is_none() {
            *shared.borrow_mut() = Some(renderer.create_render_target()?);
        }
        let handle = shared.borrow().unwrap();
        renderer.begin_render_target(handle, frame)?;
        if calls == 1 {
            // Never ended
            return Ok(());
        }
        renderer.end_render_target(handle, frame)
    });
    let (mut renderer, probe) = renderer_with(vec![observer]);

    assert!(renderer.draw().unwrap_err().is_contract_violation());
    assert_eq!(renderer.draw().unwrap(), FrameStatus::Presented);

    let state = probe.state();
    assert_eq!(state.last_submission().unwrap().command_buffers.len(), 2);
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}

#[test]
fn test_draw_vertices_skips_empty_buffers() {
    let handles = Rc::new(RefCell::new(Vec::new()));
    let shared = Rc::clone(&handles);
    let observer = DrawFn::boxed(move |renderer, cmd, _frame| {
        if shared.borrow().is_empty() {
            let empty = renderer.create_dynamic_vertex_buffer::<Vertex2d>(&[], None)?;
            let text = renderer.create_dynamic_vertex_buffer(&[Vertex2d::new(0.0, 0.0, 0.0, 0.0); 6], None)?;
            let instances = renderer.create_dynamic_vertex_buffer(&[Mat4::IDENTITY; 2], None)?;
            shared.borrow_mut().extend([empty, text, instances]);
        }
        let buffers = shared.borrow().clone();
        renderer.bind_pipeline(cmd, "sprite")?;
        renderer.draw_vertices(buffers[0], cmd, 1)?;
        renderer.draw_vertices(buffers[1], cmd, 1)?;
        renderer.bind_instance_buffer(cmd, buffers[2])
    });
    let (mut renderer, probe) = renderer_with(vec![observer]);

    renderer.draw().unwrap();

    let state = probe.state();
    let commands = state.last_submission().unwrap().all_commands();
    let draws: Vec<_> = commands
        .iter()
        .filter(|command| matches!(command, MockCommand::Draw { .. }))
        .collect();
    assert_eq!(draws, vec![&MockCommand::Draw { vertex_count: 6, instance_count: 1 }]);
    assert!(commands
        .iter()
        .any(|command| matches!(command, MockCommand::BindVertexBuffer { binding: 1, .. })));
}

#[test]
fn test_camera_written_to_frame_globals() {
    let (mut renderer, probe) = renderer_with(Vec::new());
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    let projection = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 100.0);
    renderer.set_view_projection(view, projection);

    renderer.draw().unwrap();

    let expected = crate::vertex::GlobalUniforms::new(view, projection);
    let state = probe.state();
    assert!(state
        .buffers
        .values()
        .any(|buffer| buffer.data.len() >= 192 && buffer.data[..192] == *bytemuck::bytes_of(&expected)));
}

#[test]
fn test_disposed_render_target_not_composited() {
    let (mut renderer, probe) = renderer_with(vec![Box::new(TargetScene::default())]);
    let extra = renderer.create_render_target().unwrap();
    renderer.draw().unwrap();
    assert_eq!(renderer.stats().draw_calls, 2);

    renderer.dispose_render_target(extra).unwrap();
    assert_eq!(renderer.get_render_target(extra).unwrap().state(), BufferState::Disposed);
    renderer.draw().unwrap();

    assert_eq!(renderer.stats().draw_calls, 1);
    let state = probe.state();
    let (_, main_commands) = state.last_submission().unwrap().command_buffers.last().unwrap();
    let quad_draws = main_commands
        .iter()
        .filter(|command| matches!(command, MockCommand::DrawIndexed { .. }))
        .count();
    assert_eq!(quad_draws, 1);
    assert!(state.violations.is_empty(), "{:?}", state.violations);
}
