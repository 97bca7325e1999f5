/// Render target module - offscreen scenes composited onto the swapchain

pub mod render_target;

pub use render_target::RenderTarget;
