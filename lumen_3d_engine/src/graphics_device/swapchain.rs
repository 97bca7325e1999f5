/// Presentable image chain types

use crate::graphics_device::{Extent2D, ImageFormat};

/// State of the backend swapchain after creation or recreation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainInfo {
    pub extent: Extent2D,
    pub format: ImageFormat,
    pub image_count: u32,
}

/// Result of acquiring the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired; `suboptimal` asks for a recreation after this frame
    Acquired { image_index: u32, suboptimal: bool },
    /// The surface changed and the swapchain must be recreated before use
    OutOfDate,
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}
