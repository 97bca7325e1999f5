/// GPU image description types

use bitflags::bitflags;

/// Image formats used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
    R8Unorm,
    D32Float,
}

impl ImageFormat {
    /// Bytes per texel
    pub fn bytes_per_texel(&self) -> u32 {
        match self {
            ImageFormat::R8Unorm => 1,
            ImageFormat::Rgba8Unorm
            | ImageFormat::Rgba8Srgb
            | ImageFormat::Bgra8Unorm
            | ImageFormat::Bgra8Srgb
            | ImageFormat::D32Float => 4,
        }
    }

    /// True for depth formats
    pub fn is_depth(&self) -> bool {
        matches!(self, ImageFormat::D32Float)
    }
}

bitflags! {
    /// How a GPU image will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_ATTACHMENT = 1 << 3;
    }
}

/// Image dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Single-layer 2D image
    Tex2D,
    /// Six-layer cube-compatible image with a cube view
    Cube,
}

impl ImageKind {
    /// Number of array layers
    pub fn layer_count(&self) -> u32 {
        match self {
            ImageKind::Tex2D => 1,
            ImageKind::Cube => 6,
        }
    }
}

/// Image creation description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub usage: ImageUsage,
    pub kind: ImageKind,
}

impl ImageDesc {
    /// Total byte size of a tightly packed upload covering every layer
    pub fn upload_size(&self) -> u64 {
        self.width as u64
            * self.height as u64
            * self.format.bytes_per_texel() as u64
            * self.kind.layer_count() as u64
    }
}
