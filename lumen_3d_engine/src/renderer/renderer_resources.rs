/// Renderer resource API: creation, lookup, update and per-handle disposal
///
/// Every `create_*` returns a typed handle that stays valid for the
/// renderer's lifetime. Disposing a resource keeps its handle resolvable
/// (the entry reports `Disposed`); indices are never reused.

use crate::buffer::{
    CubemapBuffer, GpuResource, Handle, ImageBuffer, IndexBuffer, PixelFormat, StorageBuffer, UniformBuffer,
    VertexBuffer, VertexBufferKind,
};
use crate::error::Result;
use crate::graphics_device::SamplerKind;
use crate::render_pass::RenderPassKind;
use crate::render_target::RenderTarget;
use crate::renderer::renderer::{initialized, initialized_mut, Renderer};

impl Renderer {
    // ===== VERTEX / INDEX BUFFERS =====

    /// Upload immutable vertices to device-local memory
    ///
    /// The stride is `size_of::<V>()`.
    pub fn create_vertex_buffer<V: bytemuck::Pod>(&mut self, vertices: &[V]) -> Result<Handle<VertexBuffer>> {
        initialized(&self.gpu)?;
        let mut buffer = VertexBuffer::new(VertexBufferKind::Static, stride_of::<V>());
        buffer.create(self.device.as_mut(), bytemuck::cast_slice(vertices), 0)?;
        Ok(self.vertex_buffers.insert(buffer))
    }

    /// Create a host-visible vertex buffer that can be rewritten every frame
    ///
    /// # Arguments
    ///
    /// * `vertices` - Initial contents, may be empty
    /// * `capacity` - Vertex slots to reserve, `config.dynamic_vertex_capacity` when `None`
    pub fn create_dynamic_vertex_buffer<V: bytemuck::Pod>(
        &mut self,
        vertices: &[V],
        capacity: Option<u32>,
    ) -> Result<Handle<VertexBuffer>> {
        initialized(&self.gpu)?;
        let capacity = capacity.unwrap_or(self.config.dynamic_vertex_capacity);
        let mut buffer = VertexBuffer::new(VertexBufferKind::Dynamic, stride_of::<V>());
        buffer.create(self.device.as_mut(), bytemuck::cast_slice(vertices), capacity)?;
        Ok(self.vertex_buffers.insert(buffer))
    }

    /// Replace the contents of a dynamic vertex buffer
    ///
    /// When the new data outgrows the capacity the buffer is reallocated and
    /// the previous GPU buffer is retired until no frame in flight can read it.
    pub fn update_dynamic_vertex_buffer<V: bytemuck::Pod>(
        &mut self,
        handle: Handle<VertexBuffer>,
        vertices: &[V],
    ) -> Result<()> {
        let gpu = initialized_mut(&mut self.gpu)?;
        let buffer = self.vertex_buffers.get_mut(handle)?;
        if buffer.stride() != stride_of::<V>() {
            engine_bail_violation!(
                "lumen3d::Renderer",
                "Vertex type of {} bytes written to a buffer of stride {}",
                stride_of::<V>(), buffer.stride()
            );
        }
        if let Some(superseded) = buffer.update(self.device.as_mut(), bytemuck::cast_slice(vertices))? {
            gpu.frame_sync.retire_buffer(superseded);
        }
        Ok(())
    }

    pub fn create_index_buffer(&mut self, indices: &[u32]) -> Result<Handle<IndexBuffer>> {
        initialized(&self.gpu)?;
        let mut buffer = IndexBuffer::new();
        buffer.create(self.device.as_mut(), indices)?;
        Ok(self.index_buffers.insert(buffer))
    }

    pub fn get_vertex_buffer(&self, handle: Handle<VertexBuffer>) -> Result<&VertexBuffer> {
        self.vertex_buffers.get(handle)
    }

    pub fn get_index_buffer(&self, handle: Handle<IndexBuffer>) -> Result<&IndexBuffer> {
        self.index_buffers.get(handle)
    }

    // ===== IMAGES =====

    /// Upload a 2D texture and allocate its sampler descriptor
    ///
    /// RGB data is expanded to RGBA on upload.
    pub fn create_image_buffer(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Handle<ImageBuffer>> {
        let gpu = initialized_mut(&mut self.gpu)?;
        let device = self.device.as_mut();

        let mut image = ImageBuffer::new();
        image.create(device, data, width, height, format)?;
        let descriptor = match image
            .gpu_image()
            .and_then(|gpu_image| gpu.descriptors.create_texture_descriptor(device, gpu_image, SamplerKind::LinearRepeat))
        {
            Ok(descriptor) => descriptor,
            Err(e) => {
                image.dispose(device)?;
                return Err(e);
            }
        };

        self.image_descriptors.push(descriptor);
        Ok(self.image_buffers.insert(image))
    }

    /// Upload six square faces (+X, -X, +Y, -Y, +Z, -Z) and allocate the cubemap descriptor
    pub fn create_cubemap_buffer(
        &mut self,
        faces: &[&[u8]],
        size: u32,
        format: PixelFormat,
    ) -> Result<Handle<CubemapBuffer>> {
        let gpu = initialized_mut(&mut self.gpu)?;
        let device = self.device.as_mut();

        let mut cubemap = CubemapBuffer::new();
        cubemap.create(device, faces, size, format)?;
        let descriptor = match cubemap
            .gpu_image()
            .and_then(|gpu_image| gpu.descriptors.create_cubemap_descriptor(device, gpu_image))
        {
            Ok(descriptor) => descriptor,
            Err(e) => {
                cubemap.dispose(device)?;
                return Err(e);
            }
        };

        self.cubemap_descriptors.push(descriptor);
        Ok(self.cubemap_buffers.insert(cubemap))
    }

    pub fn get_image_buffer(&self, handle: Handle<ImageBuffer>) -> Result<&ImageBuffer> {
        self.image_buffers.get(handle)
    }

    pub fn get_cubemap_buffer(&self, handle: Handle<CubemapBuffer>) -> Result<&CubemapBuffer> {
        self.cubemap_buffers.get(handle)
    }

    /// Texture descriptor index of an image
    pub fn image_descriptor(&self, handle: Handle<ImageBuffer>) -> Result<usize> {
        self.image_buffers.get(handle)?;
        Ok(self.image_descriptors[handle.index() as usize])
    }

    /// Cubemap descriptor index of a cubemap
    pub fn cubemap_descriptor(&self, handle: Handle<CubemapBuffer>) -> Result<usize> {
        self.cubemap_buffers.get(handle)?;
        Ok(self.cubemap_descriptors[handle.index() as usize])
    }

    /// `texture`, or the 1x1 white placeholder when the material has none
    pub fn texture_or_placeholder(&self, texture: Option<usize>) -> usize {
        match (texture, self.gpu.as_ref()) {
            (Some(index), _) => index,
            (None, Some(gpu)) => gpu.placeholder_descriptor,
            (None, None) => 0,
        }
    }

    // ===== UNIFORM / STORAGE BUFFERS =====

    /// Create a uniform buffer of `size` bytes and its descriptor
    pub fn create_uniform_buffer(&mut self, size: u64, initial: Option<&[u8]>) -> Result<Handle<UniformBuffer>> {
        let gpu = initialized_mut(&mut self.gpu)?;
        let device = self.device.as_mut();

        let mut buffer = UniformBuffer::new();
        buffer.create(device, size, initial)?;
        let descriptor = match buffer
            .gpu_buffer()
            .and_then(|gpu_buffer| gpu.descriptors.create_uniform_descriptor(device, gpu_buffer, size))
        {
            Ok(descriptor) => descriptor,
            Err(e) => {
                buffer.dispose(device)?;
                return Err(e);
            }
        };

        self.uniform_descriptors.push(descriptor);
        Ok(self.uniform_buffers.insert(buffer))
    }

    /// Create a storage buffer of `size` bytes and its descriptor
    pub fn create_storage_buffer(&mut self, size: u64, initial: Option<&[u8]>) -> Result<Handle<StorageBuffer>> {
        let gpu = initialized_mut(&mut self.gpu)?;
        let device = self.device.as_mut();

        let mut buffer = StorageBuffer::new();
        buffer.create(device, size, initial)?;
        let descriptor = match buffer
            .gpu_buffer()
            .and_then(|gpu_buffer| gpu.descriptors.create_storage_descriptor(device, gpu_buffer, size))
        {
            Ok(descriptor) => descriptor,
            Err(e) => {
                buffer.dispose(device)?;
                return Err(e);
            }
        };

        self.storage_descriptors.push(descriptor);
        Ok(self.storage_buffers.insert(buffer))
    }

    /// Write `data` at `offset`. Frames in flight read the same memory.
    pub fn update_uniform_buffer(&mut self, handle: Handle<UniformBuffer>, offset: u64, data: &[u8]) -> Result<()> {
        self.uniform_buffers.get_mut(handle)?.update(self.device.as_mut(), offset, data)
    }

    pub fn update_storage_buffer(&mut self, handle: Handle<StorageBuffer>, offset: u64, data: &[u8]) -> Result<()> {
        self.storage_buffers.get_mut(handle)?.update(self.device.as_mut(), offset, data)
    }

    pub fn get_uniform_buffer(&self, handle: Handle<UniformBuffer>) -> Result<&UniformBuffer> {
        self.uniform_buffers.get(handle)
    }

    pub fn get_storage_buffer(&self, handle: Handle<StorageBuffer>) -> Result<&StorageBuffer> {
        self.storage_buffers.get(handle)
    }

    pub fn uniform_descriptor(&self, handle: Handle<UniformBuffer>) -> Result<usize> {
        self.uniform_buffers.get(handle)?;
        Ok(self.uniform_descriptors[handle.index() as usize])
    }

    pub fn storage_descriptor(&self, handle: Handle<StorageBuffer>) -> Result<usize> {
        self.storage_buffers.get(handle)?;
        Ok(self.storage_descriptors[handle.index() as usize])
    }

    // ===== RENDER TARGETS =====

    /// Create an offscreen target sized to the swapchain, with its quad,
    /// per-frame command buffers and sampler descriptor
    pub fn create_render_target(&mut self) -> Result<Handle<RenderTarget>> {
        let gpu = initialized_mut(&mut self.gpu)?;
        let device = self.device.as_mut();

        let mut target = RenderTarget::new(
            gpu.swap_chain.extent(),
            self.config.offscreen_color_format,
            self.config.depth_format,
            self.config.offscreen_clear_color,
        );
        target.create_render_target(device, gpu.passes.get(RenderPassKind::Offscreen))?;

        let built = target
            .create_offscreen_quad_buffers(device)
            .and_then(|_| target.create_command_buffer(device, gpu.frame_sync.frames_in_flight()))
            .and_then(|_| target.color_image())
            .and_then(|color| gpu.descriptors.create_texture_descriptor(device, color, SamplerKind::LinearClamp));
        match built {
            Ok(descriptor) => target.set_descriptor_index(descriptor),
            Err(e) => {
                target.dispose(device)?;
                return Err(e);
            }
        }

        let handle = self.render_targets.insert(target);
        engine_debug!("lumen3d::Renderer", "Render target {:?} created", handle);
        Ok(handle)
    }

    pub fn get_render_target(&self, handle: Handle<RenderTarget>) -> Result<&RenderTarget> {
        self.render_targets.get(handle)
    }

    // ===== DISPOSAL =====

    /// Dispose one vertex buffer after waiting for the device
    pub fn dispose_vertex_buffer(&mut self, handle: Handle<VertexBuffer>) -> Result<()> {
        self.device.wait_idle()?;
        self.vertex_buffers.dispose(handle, self.device.as_mut())
    }

    pub fn dispose_index_buffer(&mut self, handle: Handle<IndexBuffer>) -> Result<()> {
        self.device.wait_idle()?;
        self.index_buffers.dispose(handle, self.device.as_mut())
    }

    /// The descriptor index stays allocated and must not be bound afterwards
    pub fn dispose_image_buffer(&mut self, handle: Handle<ImageBuffer>) -> Result<()> {
        self.device.wait_idle()?;
        self.image_buffers.dispose(handle, self.device.as_mut())
    }

    pub fn dispose_cubemap_buffer(&mut self, handle: Handle<CubemapBuffer>) -> Result<()> {
        self.device.wait_idle()?;
        self.cubemap_buffers.dispose(handle, self.device.as_mut())
    }

    pub fn dispose_uniform_buffer(&mut self, handle: Handle<UniformBuffer>) -> Result<()> {
        self.device.wait_idle()?;
        self.uniform_buffers.dispose(handle, self.device.as_mut())
    }

    pub fn dispose_storage_buffer(&mut self, handle: Handle<StorageBuffer>) -> Result<()> {
        self.device.wait_idle()?;
        self.storage_buffers.dispose(handle, self.device.as_mut())
    }

    /// A disposed target is no longer composited
    pub fn dispose_render_target(&mut self, handle: Handle<RenderTarget>) -> Result<()> {
        self.device.wait_idle()?;
        self.render_targets.dispose(handle, self.device.as_mut())
    }
}

fn stride_of<V>() -> u32 {
    std::mem::size_of::<V>() as u32
}
