/// Buffer module - GPU memory owned by the renderer's registries

pub mod buffer_state;
pub mod host_buffer;
pub mod image_buffer;
pub mod index_buffer;
pub mod registry;
pub(crate) mod staging;
pub mod vertex_buffer;

pub use buffer_state::{BufferState, GpuResource};
pub use host_buffer::{StorageBuffer, UniformBuffer};
pub use image_buffer::{CubemapBuffer, ImageBuffer, PixelFormat, CUBEMAP_FACE_COUNT};
pub use index_buffer::IndexBuffer;
pub use registry::{Handle, Registry};
pub use vertex_buffer::{VertexBuffer, VertexBufferKind};
