/// Renderer module - the orchestrator and its observer interface

pub mod observer;
pub mod renderer;
mod renderer_draw;
mod renderer_frame;
mod renderer_resources;

pub use observer::RenderObserver;
pub use renderer::{FrameStatus, Renderer, RendererState, RendererStats};
pub use renderer_draw::DescriptorRef;

#[cfg(test)]
#[path = "renderer_tests.rs"]
mod tests;
