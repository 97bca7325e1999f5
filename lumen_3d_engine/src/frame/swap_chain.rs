/// Presentable image chain and the main-pass framebuffers built on it

use crate::error::Result;
use crate::graphics_device::{
    Extent2D, FramebufferDesc, FramebufferId, GpuImageId, GraphicsDevice, ImageFormat, RenderPassId,
    SwapchainInfo,
};

pub struct SwapChain {
    info: SwapchainInfo,
    images: Vec<GpuImageId>,
    framebuffers: Vec<FramebufferId>,
}

impl SwapChain {
    /// Create the backend swapchain. Framebuffers come later, once the main
    /// pass exists (it needs the negotiated format).
    pub fn new(device: &mut dyn GraphicsDevice, extent: Extent2D) -> Result<Self> {
        let info = device.create_swapchain(extent)?;
        let images = device.swapchain_images()?;
        engine_info!(
            "lumen3d::SwapChain",
            "Swapchain created: {}x{}, {:?}, {} images",
            info.extent.width, info.extent.height, info.format, info.image_count
        );
        Ok(Self {
            info,
            images,
            framebuffers: Vec::new(),
        })
    }

    /// One framebuffer per presentable image, compatible with `main_pass`
    pub fn create_framebuffers(&mut self, device: &mut dyn GraphicsDevice, main_pass: RenderPassId) -> Result<()> {
        self.destroy_framebuffers(device);
        for &image in &self.images {
            let framebuffer = device.create_framebuffer(&FramebufferDesc {
                render_pass: main_pass,
                attachments: vec![image],
                extent: self.info.extent,
            })?;
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Rebuild the chain at `extent`, then its framebuffers
    ///
    /// The device must be idle.
    pub fn recreate(
        &mut self,
        device: &mut dyn GraphicsDevice,
        extent: Extent2D,
        main_pass: RenderPassId,
    ) -> Result<()> {
        self.destroy_framebuffers(device);
        let info = device.recreate_swapchain(extent)?;
        if info.format != self.info.format {
            engine_warn!(
                "lumen3d::SwapChain",
                "Surface format changed from {:?} to {:?} on recreation",
                self.info.format, info.format
            );
        }
        self.info = info;
        self.images = device.swapchain_images()?;
        self.create_framebuffers(device, main_pass)?;
        engine_info!(
            "lumen3d::SwapChain",
            "Swapchain recreated: {}x{}, {} images",
            info.extent.width, info.extent.height, info.image_count
        );
        Ok(())
    }

    pub fn extent(&self) -> Extent2D {
        self.info.extent
    }

    pub fn format(&self) -> ImageFormat {
        self.info.format
    }

    pub fn image_count(&self) -> u32 {
        self.info.image_count
    }

    /// Main-pass framebuffer of a presentable image
    pub fn framebuffer(&self, image_index: u32) -> Result<FramebufferId> {
        match self.framebuffers.get(image_index as usize) {
            Some(framebuffer) => Ok(*framebuffer),
            None => Err(engine_err!(
                "lumen3d::SwapChain",
                "No framebuffer for swapchain image {} ({} built)",
                image_index, self.framebuffers.len()
            )),
        }
    }

    pub fn destroy_framebuffers(&mut self, device: &mut dyn GraphicsDevice) {
        for framebuffer in self.framebuffers.drain(..) {
            device.destroy_framebuffer(framebuffer);
        }
    }
}
