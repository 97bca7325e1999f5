//! Engine configuration
//!
//! A single plain struct consumed by both the backend (validation, debug
//! output) and the `Renderer` (pool capacities, clear color, formats).

use crate::graphics_device::ImageFormat;

/// Minimum severity of validation-layer messages forwarded to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Fixed capacities of the descriptor pools, one per descriptor kind
///
/// Pools never grow. Allocation beyond these numbers is a contract violation,
/// so they should be set generously at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolConfig {
    /// Uniform buffer descriptors (includes the per-frame global uniforms)
    pub uniform: u32,
    /// Storage buffer descriptors
    pub storage: u32,
    /// 2D texture descriptors (includes the placeholder and one per render target)
    pub textures: u32,
    /// Cubemap descriptors
    pub cubemaps: u32,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        Self {
            uniform: 64,
            storage: 16,
            textures: 256,
            cubemaps: 16,
        }
    }
}

/// Lumen3D configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable the Khronos validation layer and debug messenger
    pub enable_validation: bool,
    /// Validation message filter
    pub debug_severity: DebugSeverity,
    /// Initial surface width in pixels
    pub width: u32,
    /// Initial surface height in pixels
    pub height: u32,
    /// Descriptor pool capacities
    pub descriptor_pools: DescriptorPoolConfig,
    /// Default capacity (in vertices) of dynamic vertex buffers
    pub dynamic_vertex_capacity: u32,
    /// Clear color of the main (composite) pass
    pub clear_color: [f32; 4],
    /// Clear color of every render target's offscreen pass
    pub offscreen_clear_color: [f32; 4],
    /// Color format of render target images
    pub offscreen_color_format: ImageFormat,
    /// Depth format of render target depth attachments
    pub depth_format: ImageFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Lumen3D Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            width: 1280,
            height: 720,
            descriptor_pools: DescriptorPoolConfig::default(),
            dynamic_vertex_capacity: 1024,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            offscreen_clear_color: [0.0, 0.0, 0.0, 0.0],
            offscreen_color_format: ImageFormat::Rgba8Unorm,
            depth_format: ImageFormat::D32Float,
        }
    }
}
