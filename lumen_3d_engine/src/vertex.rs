/// Vertex, instance and uniform layouts shared with the shaders
///
/// All types are `#[repr(C)]` + `bytemuck::Pod` so they can be uploaded with
/// `bytemuck::cast_slice` without any copy or conversion.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::graphics_device::{VertexAttribute, VertexBinding, VertexFormat, VertexInputRate};

/// 3D mesh vertex: position, normal, texture coordinates (32 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex3d {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex3d {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self { position, normal, uv }
    }

    pub fn binding(binding: u32) -> VertexBinding {
        VertexBinding { binding, stride: Self::STRIDE, input_rate: VertexInputRate::Vertex }
    }

    /// Locations 0 (position), 1 (normal), 2 (uv)
    pub fn attributes(binding: u32) -> [VertexAttribute; 3] {
        [
            VertexAttribute { location: 0, binding, format: VertexFormat::Float3, offset: 0 },
            VertexAttribute { location: 1, binding, format: VertexFormat::Float3, offset: 12 },
            VertexAttribute { location: 2, binding, format: VertexFormat::Float2, offset: 24 },
        ]
    }
}

/// 2D vertex: position and texture coordinates (16 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex2d {
    pub position: Vec2,
    pub uv: Vec2,
}

impl Vertex2d {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { position: Vec2::new(x, y), uv: Vec2::new(u, v) }
    }

    pub fn binding(binding: u32) -> VertexBinding {
        VertexBinding { binding, stride: Self::STRIDE, input_rate: VertexInputRate::Vertex }
    }

    /// Locations 0 (position), 1 (uv)
    pub fn attributes(binding: u32) -> [VertexAttribute; 2] {
        [
            VertexAttribute { location: 0, binding, format: VertexFormat::Float2, offset: 0 },
            VertexAttribute { location: 1, binding, format: VertexFormat::Float2, offset: 8 },
        ]
    }
}

/// Per-instance data of instanced draws (64 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: Mat4,
}

impl InstanceData {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(model: Mat4) -> Self {
        Self { model }
    }

    pub fn binding(binding: u32) -> VertexBinding {
        VertexBinding { binding, stride: Self::STRIDE, input_rate: VertexInputRate::Instance }
    }

    /// The model matrix as four column attributes starting at `first_location`
    pub fn attributes(binding: u32, first_location: u32) -> [VertexAttribute; 4] {
        std::array::from_fn(|column| VertexAttribute {
            location: first_location + column as u32,
            binding,
            format: VertexFormat::Float4,
            offset: column as u32 * 16,
        })
    }
}

/// Camera matrices written once per frame into the frame's uniform buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

impl GlobalUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            view_projection: projection * view,
        }
    }
}

impl Default for GlobalUniforms {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY)
    }
}

/// Fullscreen quad in normalized device coordinates (Vulkan: +Y down, uv origin top-left)
pub const FULLSCREEN_QUAD_VERTICES: [Vertex2d; 4] = [
    Vertex2d { position: Vec2::new(-1.0, -1.0), uv: Vec2::new(0.0, 0.0) },
    Vertex2d { position: Vec2::new(1.0, -1.0), uv: Vec2::new(1.0, 0.0) },
    Vertex2d { position: Vec2::new(1.0, 1.0), uv: Vec2::new(1.0, 1.0) },
    Vertex2d { position: Vec2::new(-1.0, 1.0), uv: Vec2::new(0.0, 1.0) },
];

/// Two counter-clockwise triangles over `FULLSCREEN_QUAD_VERTICES`
pub const FULLSCREEN_QUAD_INDICES: [u32; 6] = [0, 2, 1, 0, 3, 2];

#[cfg(test)]
#[path = "vertex_tests.rs"]
mod tests;
