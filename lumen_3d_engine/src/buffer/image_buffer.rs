/// Sampled images: 2D textures and cubemaps, device-local, filled through staging

use crate::buffer::buffer_state::{BufferState, GpuResource};
use crate::buffer::staging;
use crate::error::Result;
use crate::graphics_device::{GpuImageId, GraphicsDevice, ImageDesc, ImageFormat, ImageKind, ImageUsage};

/// Texel layout of caller-supplied pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per texel, sRGB color
    Rgba,
    /// 3 bytes per texel, sRGB color (expanded to RGBA on upload)
    Rgb,
    /// 1 byte per texel, linear
    Grayscale,
}

impl PixelFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            PixelFormat::Rgba => 4,
            PixelFormat::Rgb => 3,
            PixelFormat::Grayscale => 1,
        }
    }

    /// Format of the GPU image the data is uploaded into
    pub fn image_format(self) -> ImageFormat {
        match self {
            PixelFormat::Rgba | PixelFormat::Rgb => ImageFormat::Rgba8Srgb,
            PixelFormat::Grayscale => ImageFormat::R8Unorm,
        }
    }
}

/// Append an opaque alpha to every RGB texel
pub(crate) fn expand_rgb_to_rgba(rgb: &[u8]) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
    for texel in rgb.chunks_exact(3) {
        rgba.extend_from_slice(texel);
        rgba.push(u8::MAX);
    }
    rgba
}

/// Check `data` against the declared size, then convert it to upload texels
fn prepare_texels<'a>(
    kind: &str,
    data: &'a [u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<std::borrow::Cow<'a, [u8]>> {
    if width == 0 || height == 0 {
        engine_bail_violation!("lumen3d::ImageBuffer", "{}: zero-sized image {}x{}", kind, width, height);
    }
    let expected = width as u64 * height as u64 * format.bytes_per_texel() as u64;
    if data.len() as u64 != expected {
        engine_bail_violation!(
            "lumen3d::ImageBuffer",
            "{}: {} bytes supplied, {}x{} {:?} needs {}",
            kind, data.len(), width, height, format, expected
        );
    }
    Ok(match format {
        PixelFormat::Rgb => std::borrow::Cow::Owned(expand_rgb_to_rgba(data)),
        PixelFormat::Rgba | PixelFormat::Grayscale => std::borrow::Cow::Borrowed(data),
    })
}

fn sampled_desc(width: u32, height: u32, format: PixelFormat, kind: ImageKind) -> ImageDesc {
    ImageDesc {
        width,
        height,
        format: format.image_format(),
        usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
        kind,
    }
}

// ============================================================================
// IMAGE BUFFER
// ============================================================================

/// A sampled 2D texture
#[derive(Debug)]
pub struct ImageBuffer {
    state: BufferState,
    width: u32,
    height: u32,
    format: PixelFormat,
    image: Option<GpuImageId>,
}

impl ImageBuffer {
    pub fn new() -> Self {
        Self {
            state: BufferState::None,
            width: 0,
            height: 0,
            format: PixelFormat::Rgba,
            image: None,
        }
    }

    /// Upload `width x height` texels of `format`
    ///
    /// # Errors
    ///
    /// `ContractViolation` when `data.len()` differs from
    /// `width * height * bytes_per_texel`.
    pub fn create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        data: &[u8],
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<()> {
        self.state.require_none(Self::KIND)?;
        let texels = prepare_texels(Self::KIND, data, width, height, format)?;
        let desc = sampled_desc(width, height, format, ImageKind::Tex2D);
        self.image = Some(staging::upload_image(device, &texels, &desc)?);
        self.width = width;
        self.height = height;
        self.format = format;
        self.state = BufferState::Initialized;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Format of the supplied data
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn gpu_image(&self) -> Result<GpuImageId> {
        self.state.require_initialized(Self::KIND, "gpu_image")?;
        self.image.ok_or_else(|| engine_violation!("lumen3d::ImageBuffer", "Initialized image without GPU memory"))
    }
}

impl Default for ImageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResource for ImageBuffer {
    const KIND: &'static str = "image buffer";

    fn state(&self) -> BufferState {
        self.state
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if !self.state.begin_dispose(Self::KIND)? {
            return Ok(());
        }
        if let Some(image) = self.image.take() {
            device.destroy_image(image);
        }
        self.state = BufferState::Disposed;
        Ok(())
    }
}

// ============================================================================
// CUBEMAP BUFFER
// ============================================================================

/// Number of faces of a cubemap, in +X, -X, +Y, -Y, +Z, -Z order
pub const CUBEMAP_FACE_COUNT: usize = 6;

/// A sampled cubemap: six square faces in one layered image
#[derive(Debug)]
pub struct CubemapBuffer {
    state: BufferState,
    size: u32,
    format: PixelFormat,
    image: Option<GpuImageId>,
}

impl CubemapBuffer {
    pub fn new() -> Self {
        Self {
            state: BufferState::None,
            size: 0,
            format: PixelFormat::Rgba,
            image: None,
        }
    }

    /// Upload six `size x size` faces as one contiguous layered image
    ///
    /// # Errors
    ///
    /// `ContractViolation` unless exactly six faces of identical, correct
    /// byte size are supplied.
    pub fn create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        faces: &[&[u8]],
        size: u32,
        format: PixelFormat,
    ) -> Result<()> {
        self.state.require_none(Self::KIND)?;
        if faces.len() != CUBEMAP_FACE_COUNT {
            engine_bail_violation!(
                "lumen3d::CubemapBuffer",
                "cubemap needs {} faces, got {}",
                CUBEMAP_FACE_COUNT, faces.len()
            );
        }
        if faces.iter().any(|face| face.len() != faces[0].len()) {
            engine_bail_violation!("lumen3d::CubemapBuffer", "cubemap faces differ in size");
        }

        let mut layers = Vec::new();
        for face in faces {
            layers.extend_from_slice(&prepare_texels(Self::KIND, face, size, size, format)?);
        }
        let desc = sampled_desc(size, size, format, ImageKind::Cube);
        self.image = Some(staging::upload_image(device, &layers, &desc)?);
        self.size = size;
        self.format = format;
        self.state = BufferState::Initialized;
        Ok(())
    }

    /// Edge length of a face in texels
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn gpu_image(&self) -> Result<GpuImageId> {
        self.state.require_initialized(Self::KIND, "gpu_image")?;
        self.image.ok_or_else(|| engine_violation!("lumen3d::CubemapBuffer", "Initialized cubemap without GPU memory"))
    }
}

impl Default for CubemapBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResource for CubemapBuffer {
    const KIND: &'static str = "cubemap buffer";

    fn state(&self) -> BufferState {
        self.state
    }

    fn dispose(&mut self, device: &mut dyn GraphicsDevice) -> Result<()> {
        if !self.state.begin_dispose(Self::KIND)? {
            return Ok(());
        }
        if let Some(image) = self.image.take() {
            device.destroy_image(image);
        }
        self.state = BufferState::Disposed;
        Ok(())
    }
}

#[cfg(test)]
#[path = "image_buffer_tests.rs"]
mod tests;
