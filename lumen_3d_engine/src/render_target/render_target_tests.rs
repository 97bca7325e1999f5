//! Unit tests for render_target.rs

use crate::buffer::{BufferState, GpuResource};
use crate::graphics_device::mock_graphics_device::{MockCommand, MockGraphicsDevice};
use crate::graphics_device::{Extent2D, ImageFormat, ImageLayout, RenderPassId};
use crate::render_pass::{RenderPassKind, RenderPassRegistry};
use crate::render_target::RenderTarget;

fn setup(device: &mut MockGraphicsDevice) -> (RenderPassId, RenderTarget) {
    let passes =
        RenderPassRegistry::new(device, ImageFormat::Bgra8Srgb, ImageFormat::Rgba8Unorm, ImageFormat::D32Float).unwrap();
    let pass = passes.get(RenderPassKind::Offscreen);
    let mut target = RenderTarget::new(Extent2D::new(320, 240), ImageFormat::Rgba8Unorm, ImageFormat::D32Float, [0.0; 4]);
    target.create_render_target(device, pass).unwrap();
    target.create_offscreen_quad_buffers(device).unwrap();
    target.create_command_buffer(device, 2).unwrap();
    (pass, target)
}

#[test]
fn test_color_image_starts_shader_readable() {
    let mut device = MockGraphicsDevice::new();
    let probe = device.probe();
    let (_, target) = setup(&mut device);

    let state = probe.state();
    let color = &state.images[target.color_image().unwrap()];
    assert_eq!(color.layout, ImageLayout::ShaderReadOnly);
    assert_eq!((color.desc.width, color.desc.height), (320, 240));
    assert_eq!(state.framebuffers[target.framebuffer().unwrap()].attachments.len(), 2);
}

#[test]
fn test_lifecycle_order_enforced() {
    let mut device = MockGraphicsDevice::new();
    let mut target = RenderTarget::new(Extent2D::new(4, 4), ImageFormat::Rgba8Unorm, ImageFormat::D32Float, [0.0; 4]);
    assert!(target.create_offscreen_quad_buffers(&mut device).unwrap_err().is_contract_violation());
    assert!(target.create_command_buffer(&mut device, 2).unwrap_err().is_contract_violation());
    assert!(target.descriptor_index().unwrap_err().is_contract_violation());
}

#[test]
fn test_begin_end_marks_recorded_once() {
    let mut device = MockGraphicsDevice::new();
    let probe = device.probe();
    let (pass, mut target) = setup(&mut device);

    let cmd = target.begin(&mut device, 1, pass).unwrap();
    assert_eq!(cmd, target.command_buffer(1).unwrap());
    assert!(target.take_recorded(1).unwrap_err().is_contract_violation());
    target.end(&mut device, 1).unwrap();

    assert_eq!(target.take_recorded(0).unwrap(), None);
    assert_eq!(target.take_recorded(1).unwrap(), Some(cmd));
    assert_eq!(target.take_recorded(1).unwrap(), None);

    let state = probe.state();
    let commands = &state.command_buffers[cmd].commands;
    assert!(matches!(commands[0], MockCommand::BeginRenderPass { render_pass, .. } if render_pass == pass));
    assert_eq!(commands[1], MockCommand::EndRenderPass);
}

#[test]
fn test_double_begin_is_violation() {
    let mut device = MockGraphicsDevice::new();
    let (pass, mut target) = setup(&mut device);
    target.begin(&mut device, 0, pass).unwrap();
    assert!(target.begin(&mut device, 0, pass).unwrap_err().is_contract_violation());
    assert!(target.begin(&mut device, 5, pass).unwrap_err().is_contract_violation());
}

#[test]
fn test_draw_quad_records_indexed_draw() {
    let mut device = MockGraphicsDevice::new();
    let probe = device.probe();
    let (pass, mut target) = setup(&mut device);
    let cmd = target.begin(&mut device, 0, pass).unwrap();

    target.draw_quad(&mut device, cmd).unwrap();

    let state = probe.state();
    assert_eq!(
        state.command_buffers[cmd].commands.last(),
        Some(&MockCommand::DrawIndexed { index_count: 6, instance_count: 1 })
    );
}

#[test]
fn test_resize_rebuilds_attachments() {
    let mut device = MockGraphicsDevice::new();
    let probe = device.probe();
    let (pass, mut target) = setup(&mut device);
    let old_color = target.color_image().unwrap();

    let new_color = target.resize(&mut device, pass, Extent2D::new(640, 480)).unwrap();

    assert_ne!(new_color, old_color);
    assert_eq!(target.extent(), Extent2D::new(640, 480));
    let state = probe.state();
    assert!(!state.images.contains_key(old_color));
    assert_eq!(state.images[new_color].layout, ImageLayout::ShaderReadOnly);
    assert_eq!(state.framebuffers.len(), 1);
}

#[test]
fn test_dispose_releases_everything() {
    let mut device = MockGraphicsDevice::new();
    let probe = device.probe();
    let (_, mut target) = setup(&mut device);

    target.dispose(&mut device).unwrap();
    target.dispose(&mut device).unwrap();

    assert_eq!(target.state(), BufferState::Disposed);
    let state = probe.state();
    assert!(state.images.is_empty());
    assert!(state.framebuffers.is_empty());
    assert!(state.command_buffers.is_empty());
    assert_eq!(state.live_buffer_count(), 0);
    assert!(state.violations.is_empty());
}

#[test]
fn test_discard_closes_open_recording() {
    let mut device = MockGraphicsDevice::new();
    let probe = device.probe();
    let (pass, mut target) = setup(&mut device);
    let cmd = target.begin(&mut device, 0, pass).unwrap();

    target.discard_recording(&mut device, 0).unwrap();

    assert_eq!(target.take_recorded(0).unwrap(), None);
    assert!(!probe.state().command_buffers[cmd].recording);
    // The buffer can be recorded again
    target.begin(&mut device, 0, pass).unwrap();
}
