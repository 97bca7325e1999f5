/*!
# Lumen 3D Engine - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait from `lumen_3d_engine`.

Uses Ash for the Vulkan bindings, gpu-allocator for memory management and
ash-window for surface creation.

```no_run
use lumen_3d_engine::lumen3d::{Config, Renderer};
use lumen_3d_engine::lumen3d::render::ShaderLibrary;
use lumen_3d_engine_renderer_vulkan::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window, shaders: ShaderLibrary) -> lumen_3d_engine::lumen3d::Result<()> {
let config = Config::default();
let device = VulkanGraphicsDevice::new(window, &config)?;
let mut renderer = Renderer::new(Box::new(device), config, shaders);
renderer.init()?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_context;
mod vulkan_format;
mod vulkan_buffer;
mod vulkan_image;
mod vulkan_sampler;
mod vulkan_swapchain;
mod vulkan_render_pass;
mod vulkan_pipeline;
mod vulkan_descriptor;
mod vulkan_command_buffer;
mod debug;

pub use vulkan::VulkanGraphicsDevice;

// Re-export debug utilities
pub use debug::{get_validation_stats, print_validation_stats_report, ValidationStats};
