/// Swapchain - presentable image chain of the window surface
///
/// Handles surface format and present mode selection, image acquisition,
/// presentation and recreation. Semaphores are owned by the device and
/// passed in per call.

use ash::vk;
use lumen_3d_engine::lumen3d::device::{AcquireOutcome, Extent2D, ImageFormat, PresentOutcome};
use lumen_3d_engine::lumen3d::{Error, Result};
use lumen_3d_engine::{engine_debug, engine_err, engine_error, engine_info};

use crate::vulkan_format::format_from_vk;

pub(crate) struct Swapchain {
    loader: ash::khr::swapchain::Device,
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) images: Vec<vk::Image>,
    pub(crate) format: ImageFormat,
    pub(crate) extent: vk::Extent2D,
}

/// Surface objects needed to (re)create a swapchain
pub(crate) struct SurfaceContext<'a> {
    pub surface_loader: &'a ash::khr::surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,
}

impl Swapchain {
    /// Create a swapchain for `surface`, retiring `old` if it is not null
    pub(crate) fn new(
        loader: ash::khr::swapchain::Device,
        surface: &SurfaceContext<'_>,
        desired: Extent2D,
        old: vk::SwapchainKHR,
    ) -> Result<Self> {
        unsafe {
            let capabilities = surface.surface_loader
                .get_physical_device_surface_capabilities(surface.physical_device, surface.surface)
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;

            let formats = surface.surface_loader
                .get_physical_device_surface_formats(surface.physical_device, surface.surface)
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?;

            let present_modes = surface.surface_loader
                .get_physical_device_surface_present_modes(surface.physical_device, surface.surface)
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to query present modes: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get present modes: {:?}", e))
                })?;

            let (surface_format, format) = choose_surface_format(&formats).ok_or_else(|| {
                engine_error!("lumen3d::vulkan", "No supported surface format among {} candidates", formats.len());
                Error::InitializationFailed("No supported surface format".to_string())
            })?;
            let present_mode = choose_present_mode(&present_modes);
            let extent = choose_extent(&capabilities, desired);
            let image_count = choose_image_count(&capabilities);

            let queue_families = [surface.graphics_queue_family, surface.present_queue_family];
            let mut create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(surface.surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true)
                .old_swapchain(old);
            create_info = if surface.graphics_queue_family != surface.present_queue_family {
                create_info
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&queue_families)
            } else {
                create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            let swapchain = loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to create swapchain: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
                })?;

            let images = match loader.get_swapchain_images(swapchain) {
                Ok(images) => images,
                Err(e) => {
                    loader.destroy_swapchain(swapchain, None);
                    engine_error!("lumen3d::vulkan", "Failed to get swapchain images: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e)));
                }
            };

            engine_info!(
                "lumen3d::vulkan",
                "Swapchain {}x{} with {} images ({:?}, {:?})",
                extent.width, extent.height, images.len(), format, present_mode
            );

            Ok(Self {
                loader,
                swapchain,
                images,
                format,
                extent,
            })
        }
    }

    pub(crate) fn extent(&self) -> Extent2D {
        Extent2D::new(self.extent.width, self.extent.height)
    }

    pub(crate) fn acquire(&self, signal: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.loader.acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                engine_debug!("lumen3d::vulkan", "Swapchain out of date during acquire");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(engine_err!("lumen3d::vulkan", "Failed to acquire next swapchain image: {:?}", e)),
        }
    }

    pub(crate) fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> Result<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(engine_err!("lumen3d::vulkan", "Failed to present swapchain image: {:?}", e)),
        }
    }

    /// Destroy the swapchain (image views are owned by the device's image storage)
    pub(crate) fn destroy(&mut self) {
        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(self.swapchain, None); }
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.images.clear();
    }
}

/// Prefer BGRA8 sRGB, fall back to the first format the engine can name
pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<(vk::SurfaceFormatKHR, ImageFormat)> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    preferred
        .into_iter()
        .chain(formats.iter())
        .find_map(|f| format_from_vk(f.format).filter(|format| !format.is_depth()).map(|format| (*f, format)))
}

/// Mailbox when available, FIFO otherwise (always supported)
pub(crate) fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, or `desired` clamped to the allowed range
pub(crate) fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, desired: Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image more than the minimum, within the surface limit (0 means unbounded)
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

#[cfg(test)]
#[path = "vulkan_swapchain_tests.rs"]
mod tests;
