/*!
# Lumen 3D Engine

GPU resource and frame-lifecycle manager.

This crate owns everything between a scene and the GPU API: typed buffer
registries, fixed-capacity descriptor pools, named pipelines, render passes,
offscreen render targets and the frames-in-flight loop. The GPU API itself
sits behind the `GraphicsDevice` trait; the Vulkan implementation lives in
`lumen_3d_engine_renderer_vulkan`.

## Architecture

- **Renderer**: owns the device and every registry, runs `draw()`
- **RenderObserver**: lifecycle hooks through which scenes create resources and record commands
- **Registry / Handle**: append-only resource storage with stable typed handles
- **DescriptorAllocator**: one pool per descriptor kind, indices never freed
- **PipelineRegistry**: named pipelines, one per draw mode
- **RenderTarget**: offscreen color + depth, composited by the main pass
- **FrameSync**: semaphores, fences and deferred buffer retirement
*/

// Logging first: the engine_* macros are used by every module below
#[macro_use]
pub mod log;

mod error;
mod config;
pub mod graphics_device;
pub mod buffer;
pub mod descriptor;
pub mod vertex;
pub mod render_pass;
pub mod pipeline;
pub mod frame;
pub mod render_target;
pub mod renderer;

// Main lumen3d namespace module
pub mod lumen3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Configuration
    pub use crate::config::{Config, DebugSeverity, DescriptorPoolConfig};

    // Orchestrator and observer interface
    pub use crate::renderer::{DescriptorRef, FrameStatus, RenderObserver, Renderer, RendererState, RendererStats};

    // Logging sub-module (types only, the engine_* macros live at the crate root)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // GPU seam implemented by backends
    pub mod device {
        pub use crate::graphics_device::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::buffer::*;
        pub use crate::descriptor::*;
        pub use crate::render_target::*;
        pub use crate::vertex::*;
    }

    // Pipelines and passes
    pub mod render {
        pub use crate::frame::*;
        pub use crate::pipeline::*;
        pub use crate::render_pass::*;
    }
}

// Re-export math library at crate root
pub use glam;
// Backends see the same bytemuck version
pub use bytemuck;
