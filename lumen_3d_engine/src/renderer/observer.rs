/// Observer interface through which scenes take part in the renderer's lifecycle

use crate::error::Result;
use crate::graphics_device::CommandBufferId;
use crate::renderer::renderer::Renderer;

/// Lifecycle observer of a `Renderer`
///
/// Observers are registered with `Renderer::add_observer` before `init()`
/// and invoked in registration order. Each callback receives the renderer
/// mutably, so it can create resources and record commands. An error
/// aborts the current step and propagates out of the renderer call that
/// triggered it.
///
/// Every method has an empty default implementation.
///
/// # Example
///
/// ```ignore
/// struct Scene { target: Option<Handle<RenderTarget>> }
///
/// impl RenderObserver for Scene {
///     fn on_init(&mut self, renderer: &mut Renderer) -> Result<()> {
///         self.target = Some(renderer.create_render_target()?);
///         Ok(())
///     }
///
///     fn on_draw(&mut self, renderer: &mut Renderer, _cmd: CommandBufferId, frame: usize) -> Result<()> {
///         let Some(target) = self.target else { return Ok(()) };
///         let cmd = renderer.begin_render_target(target, frame)?;
///         renderer.bind_pipeline(cmd, "opaque")?;
///         // ...
///         renderer.end_render_target(target, frame)
///     }
/// }
/// ```
pub trait RenderObserver {
    /// After every renderer resource was created
    fn on_init(&mut self, _renderer: &mut Renderer) -> Result<()> {
        Ok(())
    }

    /// First recording step of a frame (shadow maps, reflections, ...)
    fn on_offscreen(&mut self, _renderer: &mut Renderer, _frame: usize) -> Result<()> {
        Ok(())
    }

    /// Second recording step of a frame
    ///
    /// `cmd` is the frame's main command buffer, recording and outside any
    /// render pass. Scenes usually record into their own render target
    /// with `begin_render_target` / `end_render_target`.
    fn on_draw(&mut self, _renderer: &mut Renderer, _cmd: CommandBufferId, _frame: usize) -> Result<()> {
        Ok(())
    }

    /// Before resources are released, with the device idle
    fn on_dispose(&mut self, _renderer: &mut Renderer) -> Result<()> {
        Ok(())
    }

    /// Before the swapchain is rebuilt, with the device idle
    fn before_swapchain_recreate(&mut self, _renderer: &mut Renderer) -> Result<()> {
        Ok(())
    }

    /// After the swapchain, framebuffers and render targets were rebuilt
    fn after_swapchain_recreate(&mut self, _renderer: &mut Renderer, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }
}
