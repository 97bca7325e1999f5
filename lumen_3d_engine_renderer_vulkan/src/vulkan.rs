/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait
///
/// Owns the instance, the window surface, the logical device and every object
/// created through the trait. Objects live in one slotmap per id type, so a
/// stale id never resolves to a newer object.

use ash::vk;
use lumen_3d_engine::lumen3d::device::{
    AcquireOutcome, BufferDesc, ClearValue, CommandBufferId, DescriptorPoolDesc, DescriptorPoolId,
    DescriptorResource, DescriptorSetId, DescriptorSetLayoutDesc, DescriptorSetLayoutId, DescriptorWrite,
    DeviceInfo, Extent2D, FenceId, FramebufferDesc, FramebufferId, GpuBufferId, GpuImageId, GpuPipelineId,
    GraphicsDevice, GraphicsPipelineDesc, ImageDesc, ImageLayout, IndexType, PipelineLayoutDesc,
    PipelineLayoutId, PresentOutcome, Rect2D, RenderPassDesc, RenderPassId, SemaphoreId, ShaderDesc,
    ShaderId, ShaderStageFlags, SubmitInfo, SwapchainInfo, Viewport,
};
use lumen_3d_engine::lumen3d::{Config, Error, Result};
use lumen_3d_engine::{engine_bail_violation, engine_debug, engine_err, engine_error, engine_info, engine_warn};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use slotmap::SlotMap;
use std::ffi::CString;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_buffer::{CommandBuffer, RecordingState};
use crate::vulkan_context::{rate_physical_device, GpuContext};
use crate::vulkan_descriptor::{self, DescriptorSet, ResolvedResource, ResolvedWrite};
use crate::vulkan_format::{descriptor_type_to_vk, image_layout_to_vk, index_type_to_vk, stage_flags_to_vk};
use crate::vulkan_image::Image;
use crate::vulkan_pipeline::{self, Shader};
use crate::vulkan_render_pass;
use crate::vulkan_sampler::SamplerCache;
use crate::vulkan_swapchain::{SurfaceContext, Swapchain};

fn unknown(what: &str) -> Error {
    Error::InvalidResource(format!("Unknown {} id", what))
}

fn lookup<K: slotmap::Key, V: Copy>(map: &SlotMap<K, V>, key: K, what: &str) -> Result<V> {
    map.get(key).copied().ok_or_else(|| unknown(what))
}

/// Selected adapter and its queue families
struct PhysicalDeviceChoice {
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    graphics_family: u32,
    present_family: u32,
}

/// Vulkan device implementation
pub struct VulkanGraphicsDevice {
    /// Keeps the Vulkan library loaded
    _entry: ash::Entry,
    info: DeviceInfo,
    ctx: GpuContext,

    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    present_queue_family: u32,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: Option<Swapchain>,
    swapchain_image_ids: Vec<GpuImageId>,

    /// Pool of the command buffers handed out by `allocate_command_buffer`
    command_pool: vk::CommandPool,
    samplers: SamplerCache,
    max_anisotropy: f32,

    buffers: SlotMap<GpuBufferId, Buffer>,
    images: SlotMap<GpuImageId, Image>,
    shaders: SlotMap<ShaderId, Shader>,
    render_passes: SlotMap<RenderPassId, vk::RenderPass>,
    framebuffers: SlotMap<FramebufferId, vk::Framebuffer>,
    set_layouts: SlotMap<DescriptorSetLayoutId, vk::DescriptorSetLayout>,
    pipeline_layouts: SlotMap<PipelineLayoutId, vk::PipelineLayout>,
    pipelines: SlotMap<GpuPipelineId, vk::Pipeline>,
    descriptor_pools: SlotMap<DescriptorPoolId, vk::DescriptorPool>,
    descriptor_sets: SlotMap<DescriptorSetId, DescriptorSet>,
    command_buffers: SlotMap<CommandBufferId, CommandBuffer>,
    fences: SlotMap<FenceId, vk::Fence>,
    semaphores: SlotMap<SemaphoreId, vk::Semaphore>,
}

impl VulkanGraphicsDevice {
    /// Create a Vulkan device presenting to `window`
    ///
    /// Validation is enabled when `config.enable_validation` is set or the
    /// crate is built with the `vulkan-validation` feature.
    ///
    /// # Errors
    ///
    /// `InitializationFailed` when no usable GPU, surface or queue is found.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(window: &W, config: &Config) -> Result<Self> {
        let enable_validation = config.enable_validation || cfg!(feature = "vulkan-validation");

        unsafe {
            let entry = ash::Entry::load()
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to load Vulkan library: {:?}", e);
                    Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
                })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed(format!("Invalid application name {:?}", config.app_name)))?;

            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, 1, 0, 0))
                .engine_name(c"Lumen3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle()
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to get display handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get display handle: {}", e))
                })?;
            let window_handle = window.window_handle()
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to get window handle: {}", e);
                    Error::InitializationFailed(format!("Failed to get window handle: {}", e))
                })?;

            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            if enable_validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }

            let layer_names = if enable_validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry
                .create_instance(&create_info, None)
                .map_err(|e| {
                    engine_error!("lumen3d::vulkan", "Failed to create Vulkan instance: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
                })?;

            let debug_utils = if enable_validation {
                match Self::create_debug_messenger(&entry, &instance, config) {
                    Ok(debug_utils) => Some(debug_utils),
                    Err(e) => {
                        instance.destroy_instance(None);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
            let surface = match ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            ) {
                Ok(surface) => surface,
                Err(e) => {
                    engine_error!("lumen3d::vulkan", "Failed to create surface: {:?}", e);
                    Self::destroy_instance_objects(&instance, debug_utils.as_ref(), None);
                    return Err(Error::InitializationFailed(format!("Failed to create surface: {:?}", e)));
                }
            };

            let created = Self::pick_physical_device(&instance, &surface_loader, surface).and_then(|choice| {
                let (device, max_anisotropy) = Self::create_logical_device(&instance, &choice)?;
                let ctx = match GpuContext::new(
                    instance.clone(),
                    choice.physical_device,
                    device.clone(),
                    choice.graphics_family,
                    choice.present_family,
                ) {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        device.destroy_device(None);
                        return Err(e);
                    }
                };
                Ok((choice, ctx, max_anisotropy))
            });
            let (choice, mut ctx, max_anisotropy) = match created {
                Ok(created) => created,
                Err(e) => {
                    Self::destroy_instance_objects(&instance, debug_utils.as_ref(), Some((&surface_loader, surface)));
                    return Err(e);
                }
            };

            let pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(choice.graphics_family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
            let command_pool = match ctx.device.create_command_pool(&pool_create_info, None) {
                Ok(pool) => pool,
                Err(e) => {
                    engine_error!("lumen3d::vulkan", "Failed to create command pool: {:?}", e);
                    ctx.destroy();
                    Self::destroy_instance_objects(&instance, debug_utils.as_ref(), Some((&surface_loader, surface)));
                    return Err(Error::InitializationFailed(format!("Failed to create command pool: {:?}", e)));
                }
            };

            let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &ctx.device);

            let name = choice.properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "Unknown GPU".to_string());
            let info = DeviceInfo {
                name,
                discrete: choice.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
            };
            engine_info!(
                "lumen3d::vulkan",
                "Using {} ({}), validation {}",
                info.name,
                if info.discrete { "discrete" } else { "integrated or other" },
                if enable_validation { "on" } else { "off" }
            );

            Ok(Self {
                _entry: entry,
                info,
                ctx,
                debug_utils,
                surface_loader,
                surface,
                present_queue_family: choice.present_family,
                swapchain_loader,
                swapchain: None,
                swapchain_image_ids: Vec::new(),
                command_pool,
                samplers: SamplerCache::default(),
                max_anisotropy,
                buffers: SlotMap::with_key(),
                images: SlotMap::with_key(),
                shaders: SlotMap::with_key(),
                render_passes: SlotMap::with_key(),
                framebuffers: SlotMap::with_key(),
                set_layouts: SlotMap::with_key(),
                pipeline_layouts: SlotMap::with_key(),
                pipelines: SlotMap::with_key(),
                descriptor_pools: SlotMap::with_key(),
                descriptor_sets: SlotMap::with_key(),
                command_buffers: SlotMap::with_key(),
                fences: SlotMap::with_key(),
                semaphores: SlotMap::with_key(),
            })
        }
    }

    unsafe fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        config: &Config,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        crate::debug::init_debug_config(config.debug_severity);

        let debug_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(crate::debug::severity_flags(config.debug_severity))
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(crate::debug::vulkan_debug_callback));

        let messenger = debug_utils
            .create_debug_utils_messenger(&debug_info, None)
            .map_err(|e| {
                engine_error!("lumen3d::vulkan", "Failed to create debug messenger: {:?}", e);
                Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
            })?;

        Ok((debug_utils, messenger))
    }

    /// Graphics family and a present family for `physical_device`, preferring one family for both
    unsafe fn find_queue_families(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Option<(u32, u32)> {
        let queue_families = instance.get_physical_device_queue_family_properties(physical_device);
        let supports_present = |i: u32| {
            surface_loader
                .get_physical_device_surface_support(physical_device, i, surface)
                .unwrap_or(false)
        };

        let graphics: Vec<u32> = queue_families
            .iter()
            .enumerate()
            .filter(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|(i, _)| i as u32)
            .collect();

        if let Some(&both) = graphics.iter().find(|&&i| supports_present(i)) {
            return Some((both, both));
        }
        let graphics_family = *graphics.first()?;
        let present_family = (0..queue_families.len() as u32).find(|&i| supports_present(i))?;
        Some((graphics_family, present_family))
    }

    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<PhysicalDeviceChoice> {
        let physical_devices = instance
            .enumerate_physical_devices()
            .map_err(|e| {
                engine_error!("lumen3d::vulkan", "Failed to enumerate physical devices: {:?}", e);
                Error::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
            })?;

        let mut best: Option<(u32, PhysicalDeviceChoice)> = None;
        for physical_device in physical_devices {
            let properties = instance.get_physical_device_properties(physical_device);
            let families = Self::find_queue_families(instance, surface_loader, surface, physical_device);
            let Some(score) = rate_physical_device(&properties, families.is_some()) else {
                engine_debug!("lumen3d::vulkan", "Skipping physical device without graphics/present queues");
                continue;
            };
            let Some((graphics_family, present_family)) = families else {
                continue;
            };
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((
                    score,
                    PhysicalDeviceChoice {
                        physical_device,
                        properties,
                        graphics_family,
                        present_family,
                    },
                ));
            }
        }

        best.map(|(_, choice)| choice).ok_or_else(|| {
            engine_error!("lumen3d::vulkan", "No Vulkan-capable GPU can present to the window surface");
            Error::InitializationFailed("No Vulkan-capable GPU found".to_string())
        })
    }

    /// Logical device and the sampler anisotropy it supports (1.0 when disabled)
    unsafe fn create_logical_device(
        instance: &ash::Instance,
        choice: &PhysicalDeviceChoice,
    ) -> Result<(ash::Device, f32)> {
        let queue_priorities = [1.0];
        let mut queue_create_infos = vec![
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(choice.graphics_family)
                .queue_priorities(&queue_priorities),
        ];
        if choice.present_family != choice.graphics_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(choice.present_family)
                    .queue_priorities(&queue_priorities),
            );
        }

        let supported = instance.get_physical_device_features(choice.physical_device);
        let anisotropy = supported.sampler_anisotropy == vk::TRUE;
        let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(anisotropy);

        let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extension_names)
            .enabled_features(&device_features);

        let device = instance
            .create_device(choice.physical_device, &device_create_info, None)
            .map_err(|e| {
                engine_error!("lumen3d::vulkan", "Failed to create logical device: {:?}", e);
                Error::InitializationFailed(format!("Failed to create device: {:?}", e))
            })?;

        let max_anisotropy = if anisotropy {
            choice.properties.limits.max_sampler_anisotropy.min(16.0)
        } else {
            1.0
        };
        Ok((device, max_anisotropy))
    }

    /// Tear down what `new` created before the logical device
    unsafe fn destroy_instance_objects(
        instance: &ash::Instance,
        debug_utils: Option<&(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
        surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
    ) {
        if let Some((loader, surface)) = surface {
            loader.destroy_surface(surface, None);
        }
        crate::debug::cleanup_debug_config();
        if let Some((debug_utils, messenger)) = debug_utils {
            debug_utils.destroy_debug_utils_messenger(*messenger, None);
        }
        instance.destroy_instance(None);
    }

    fn surface_context(&self) -> SurfaceContext<'_> {
        SurfaceContext {
            surface_loader: &self.surface_loader,
            surface: self.surface,
            physical_device: self.ctx.physical_device,
            graphics_queue_family: self.ctx.graphics_queue_family,
            present_queue_family: self.present_queue_family,
        }
    }

    /// Wrap the swapchain's images so they can be used as framebuffer attachments
    fn register_swapchain_images(&mut self, mut swapchain: Swapchain) -> Result<SwapchainInfo> {
        let mut ids = Vec::with_capacity(swapchain.images.len());
        for image in swapchain.images.clone() {
            match Image::from_swapchain(&self.ctx.device, image, swapchain.format, swapchain.extent) {
                Ok(wrapped) => ids.push(self.images.insert(wrapped)),
                Err(e) => {
                    for id in ids {
                        if let Some(wrapped) = self.images.remove(id) {
                            wrapped.destroy(&mut self.ctx);
                        }
                    }
                    swapchain.destroy();
                    return Err(e);
                }
            }
        }

        let info = SwapchainInfo {
            extent: swapchain.extent(),
            format: swapchain.format,
            image_count: ids.len() as u32,
        };
        self.swapchain_image_ids = ids;
        self.swapchain = Some(swapchain);
        Ok(info)
    }

    fn unregister_swapchain_images(&mut self) {
        for id in self.swapchain_image_ids.drain(..) {
            if let Some(image) = self.images.remove(id) {
                image.destroy(&mut self.ctx);
            }
        }
    }

    fn swapchain(&self) -> Result<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| Error::BackendError("Swapchain not created".to_string()))
    }

    fn command_buffer(&self, cmd: CommandBufferId) -> Result<&CommandBuffer> {
        self.command_buffers.get(cmd).ok_or_else(|| unknown("command buffer"))
    }

    fn recording(&self, cmd: CommandBufferId) -> Result<vk::CommandBuffer> {
        self.command_buffer(cmd)?.require_recording()
    }

    fn resolve_write(&mut self, write: &DescriptorWrite) -> Result<ResolvedWrite> {
        let resource = match write.resource {
            DescriptorResource::Buffer { buffer, range } => {
                let buffer = self.buffers.get(buffer).ok_or_else(|| unknown("buffer"))?;
                if range > buffer.size {
                    return Err(Error::InvalidResource(format!(
                        "Descriptor range {} exceeds buffer size {}",
                        range, buffer.size
                    )));
                }
                ResolvedResource::Buffer { buffer: buffer.buffer, range }
            }
            DescriptorResource::Image { image, sampler } => {
                let view = self.images.get(image).ok_or_else(|| unknown("image"))?.view;
                let sampler = self.samplers.get(&self.ctx.device, sampler, self.max_anisotropy)?;
                ResolvedResource::Image { view, sampler }
            }
        };
        Ok(ResolvedWrite {
            binding: write.binding,
            descriptor_type: descriptor_type_to_vk(write.descriptor_type),
            resource,
        })
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    // ===== SWAPCHAIN =====

    fn create_swapchain(&mut self, extent: Extent2D) -> Result<SwapchainInfo> {
        if self.swapchain.is_some() {
            engine_bail_violation!("lumen3d::vulkan", "Swapchain created twice, use recreate_swapchain");
        }
        let swapchain = Swapchain::new(
            self.swapchain_loader.clone(),
            &self.surface_context(),
            extent,
            vk::SwapchainKHR::null(),
        )?;
        self.register_swapchain_images(swapchain)
    }

    fn recreate_swapchain(&mut self, extent: Extent2D) -> Result<SwapchainInfo> {
        let Some(mut old) = self.swapchain.take() else {
            engine_bail_violation!("lumen3d::vulkan", "recreate_swapchain before create_swapchain");
        };
        self.unregister_swapchain_images();

        let created = Swapchain::new(
            self.swapchain_loader.clone(),
            &self.surface_context(),
            extent,
            old.swapchain,
        );
        old.destroy();
        self.register_swapchain_images(created?)
    }

    fn swapchain_images(&self) -> Result<Vec<GpuImageId>> {
        self.swapchain()?;
        Ok(self.swapchain_image_ids.clone())
    }

    fn acquire_next_image(&mut self, signal: SemaphoreId) -> Result<AcquireOutcome> {
        let semaphore = lookup(&self.semaphores, signal, "semaphore")?;
        self.swapchain()?.acquire(semaphore)
    }

    fn present(&mut self, image_index: u32, wait: SemaphoreId) -> Result<PresentOutcome> {
        let semaphore = lookup(&self.semaphores, wait, "semaphore")?;
        let swapchain = self.swapchain()?;
        if image_index as usize >= swapchain.images.len() {
            return Err(Error::InvalidResource(format!(
                "Present image index {} out of range (count: {})",
                image_index, swapchain.images.len()
            )));
        }
        swapchain.present(self.ctx.present_queue, image_index, semaphore)
    }

    // ===== BUFFERS =====

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<GpuBufferId> {
        let buffer = Buffer::new(&mut self.ctx, desc)?;
        Ok(self.buffers.insert(buffer))
    }

    fn write_buffer(&mut self, buffer: GpuBufferId, offset: u64, data: &[u8]) -> Result<()> {
        self.buffers
            .get_mut(buffer)
            .ok_or_else(|| unknown("buffer"))?
            .write(offset, data)
    }

    fn copy_buffer_immediate(&mut self, src: GpuBufferId, dst: GpuBufferId, size: u64) -> Result<()> {
        let src = self.buffers.get(src).ok_or_else(|| unknown("buffer"))?;
        let dst = self.buffers.get(dst).ok_or_else(|| unknown("buffer"))?;
        if size > src.size || size > dst.size {
            return Err(Error::InvalidResource(format!(
                "Copy of {} bytes exceeds buffer sizes (src: {}, dst: {})",
                size, src.size, dst.size
            )));
        }

        let (src, dst) = (src.buffer, dst.buffer);
        self.ctx.immediate_submit(|device, cmd| unsafe {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size,
            };
            device.cmd_copy_buffer(cmd, src, dst, &[region]);
        })
    }

    fn destroy_buffer(&mut self, buffer: GpuBufferId) {
        if let Some(buffer) = self.buffers.remove(buffer) {
            buffer.destroy(&mut self.ctx);
        }
    }

    // ===== IMAGES =====

    fn create_image(&mut self, desc: &ImageDesc) -> Result<GpuImageId> {
        let image = Image::new(&mut self.ctx, desc)?;
        Ok(self.images.insert(image))
    }

    fn copy_buffer_to_image_immediate(&mut self, src: GpuBufferId, dst: GpuImageId) -> Result<()> {
        let src = self.buffers.get(src).ok_or_else(|| unknown("buffer"))?;
        let image = self.images.get(dst).ok_or_else(|| unknown("image"))?;
        if src.size < image.upload_size() {
            return Err(Error::InvalidResource(format!(
                "Staging buffer of {} bytes is smaller than the image ({} bytes)",
                src.size,
                image.upload_size()
            )));
        }

        let src = src.buffer;
        self.ctx.immediate_submit(|device, cmd| image.record_upload(device, cmd, src))
    }

    fn initialize_image_layout(&mut self, image: GpuImageId, layout: ImageLayout) -> Result<()> {
        let image = self.images.get(image).ok_or_else(|| unknown("image"))?;
        let new_layout = image_layout_to_vk(layout);
        self.ctx.immediate_submit(|device, cmd| {
            image.record_transition(device, cmd, vk::ImageLayout::UNDEFINED, new_layout)
        })
    }

    fn destroy_image(&mut self, image: GpuImageId) {
        if self.swapchain_image_ids.contains(&image) {
            engine_warn!("lumen3d::vulkan", "Ignoring destroy_image on a swapchain image");
            return;
        }
        if let Some(image) = self.images.remove(image) {
            image.destroy(&mut self.ctx);
        }
    }

    // ===== SHADERS, PASSES, FRAMEBUFFERS =====

    fn create_shader(&mut self, desc: &ShaderDesc) -> Result<ShaderId> {
        let shader = vulkan_pipeline::create_shader(&self.ctx.device, desc)?;
        Ok(self.shaders.insert(shader))
    }

    fn destroy_shader(&mut self, shader: ShaderId) {
        if let Some(shader) = self.shaders.remove(shader) {
            unsafe { self.ctx.device.destroy_shader_module(shader.module, None); }
        }
    }

    fn create_render_pass(&mut self, desc: &RenderPassDesc) -> Result<RenderPassId> {
        let render_pass = vulkan_render_pass::create_render_pass(&self.ctx.device, desc)?;
        Ok(self.render_passes.insert(render_pass))
    }

    fn destroy_render_pass(&mut self, render_pass: RenderPassId) {
        if let Some(render_pass) = self.render_passes.remove(render_pass) {
            unsafe { self.ctx.device.destroy_render_pass(render_pass, None); }
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Result<FramebufferId> {
        let render_pass = lookup(&self.render_passes, desc.render_pass, "render pass")?;
        let views = desc.attachments
            .iter()
            .map(|&id| self.images.get(id).map(|image| image.view).ok_or_else(|| unknown("image")))
            .collect::<Result<Vec<_>>>()?;

        let framebuffer = vulkan_render_pass::create_framebuffer(&self.ctx.device, render_pass, &views, desc.extent)?;
        Ok(self.framebuffers.insert(framebuffer))
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) {
        if let Some(framebuffer) = self.framebuffers.remove(framebuffer) {
            unsafe { self.ctx.device.destroy_framebuffer(framebuffer, None); }
        }
    }

    // ===== LAYOUTS AND PIPELINES =====

    fn create_descriptor_set_layout(&mut self, desc: &DescriptorSetLayoutDesc) -> Result<DescriptorSetLayoutId> {
        let layout = vulkan_pipeline::create_descriptor_set_layout(&self.ctx.device, desc)?;
        Ok(self.set_layouts.insert(layout))
    }

    fn destroy_descriptor_set_layout(&mut self, layout: DescriptorSetLayoutId) {
        if let Some(layout) = self.set_layouts.remove(layout) {
            unsafe { self.ctx.device.destroy_descriptor_set_layout(layout, None); }
        }
    }

    fn create_pipeline_layout(&mut self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutId> {
        let set_layouts = desc.set_layouts
            .iter()
            .map(|&id| lookup(&self.set_layouts, id, "descriptor set layout"))
            .collect::<Result<Vec<_>>>()?;

        let layout = vulkan_pipeline::create_pipeline_layout(&self.ctx.device, desc, &set_layouts)?;
        Ok(self.pipeline_layouts.insert(layout))
    }

    fn destroy_pipeline_layout(&mut self, layout: PipelineLayoutId) {
        if let Some(layout) = self.pipeline_layouts.remove(layout) {
            unsafe { self.ctx.device.destroy_pipeline_layout(layout, None); }
        }
    }

    fn create_graphics_pipeline(&mut self, desc: &GraphicsPipelineDesc) -> Result<GpuPipelineId> {
        let vertex_shader = self.shaders.get(desc.vertex_shader).ok_or_else(|| unknown("shader"))?;
        let fragment_shader = self.shaders.get(desc.fragment_shader).ok_or_else(|| unknown("shader"))?;
        let layout = lookup(&self.pipeline_layouts, desc.layout, "pipeline layout")?;
        let render_pass = lookup(&self.render_passes, desc.render_pass, "render pass")?;

        let pipeline = vulkan_pipeline::create_graphics_pipeline(
            &self.ctx.device,
            desc,
            vertex_shader,
            fragment_shader,
            layout,
            render_pass,
        )?;
        Ok(self.pipelines.insert(pipeline))
    }

    fn destroy_pipeline(&mut self, pipeline: GpuPipelineId) {
        if let Some(pipeline) = self.pipelines.remove(pipeline) {
            unsafe { self.ctx.device.destroy_pipeline(pipeline, None); }
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_pool(&mut self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolId> {
        let pool = vulkan_descriptor::create_descriptor_pool(&self.ctx.device, desc)?;
        Ok(self.descriptor_pools.insert(pool))
    }

    fn allocate_descriptor_set(&mut self, pool: DescriptorPoolId, layout: DescriptorSetLayoutId) -> Result<DescriptorSetId> {
        let vk_pool = lookup(&self.descriptor_pools, pool, "descriptor pool")?;
        let vk_layout = lookup(&self.set_layouts, layout, "descriptor set layout")?;
        let set = vulkan_descriptor::allocate_descriptor_set(&self.ctx.device, vk_pool, vk_layout)?;
        Ok(self.descriptor_sets.insert(DescriptorSet { set, pool }))
    }

    fn write_descriptor_set(&mut self, set: DescriptorSetId, writes: &[DescriptorWrite]) -> Result<()> {
        let vk_set = self.descriptor_sets.get(set).ok_or_else(|| unknown("descriptor set"))?.set;
        let resolved = writes
            .iter()
            .map(|write| self.resolve_write(write))
            .collect::<Result<Vec<_>>>()?;
        vulkan_descriptor::write_descriptor_set(&self.ctx.device, vk_set, &resolved);
        Ok(())
    }

    fn destroy_descriptor_pool(&mut self, pool: DescriptorPoolId) {
        if let Some(vk_pool) = self.descriptor_pools.remove(pool) {
            self.descriptor_sets.retain(|_, set| set.pool != pool);
            unsafe { self.ctx.device.destroy_descriptor_pool(vk_pool, None); }
        }
    }

    // ===== COMMAND BUFFERS =====

    fn allocate_command_buffer(&mut self) -> Result<CommandBufferId> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe {
            self.ctx.device.allocate_command_buffers(&alloc_info)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to allocate command buffer: {:?}", e))?
        };
        let buffer = buffers
            .into_iter()
            .next()
            .ok_or_else(|| engine_err!("lumen3d::vulkan", "Command buffer allocation returned no buffer"))?;
        Ok(self.command_buffers.insert(CommandBuffer::new(buffer)))
    }

    fn free_command_buffer(&mut self, cmd: CommandBufferId) {
        if let Some(cmd) = self.command_buffers.remove(cmd) {
            unsafe { self.ctx.device.free_command_buffers(self.command_pool, &[cmd.buffer]); }
        }
    }

    fn begin_command_buffer(&mut self, cmd: CommandBufferId) -> Result<()> {
        let buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| unknown("command buffer"))?;
        buffer.begin(&self.ctx.device)
    }

    fn end_command_buffer(&mut self, cmd: CommandBufferId) -> Result<()> {
        let buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| unknown("command buffer"))?;
        buffer.end(&self.ctx.device)
    }

    fn cmd_begin_render_pass(
        &mut self,
        cmd: CommandBufferId,
        render_pass: RenderPassId,
        framebuffer: FramebufferId,
        extent: Extent2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let render_pass = lookup(&self.render_passes, render_pass, "render pass")?;
        let framebuffer = lookup(&self.framebuffers, framebuffer, "framebuffer")?;
        let buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| unknown("command buffer"))?;
        buffer.begin_render_pass(&self.ctx.device, render_pass, framebuffer, extent, clear_values)
    }

    fn cmd_end_render_pass(&mut self, cmd: CommandBufferId) -> Result<()> {
        let buffer = self.command_buffers.get_mut(cmd).ok_or_else(|| unknown("command buffer"))?;
        buffer.end_render_pass(&self.ctx.device)
    }

    fn cmd_set_viewport(&mut self, cmd: CommandBufferId, viewport: Viewport) -> Result<()> {
        self.command_buffer(cmd)?.set_viewport(&self.ctx.device, viewport)
    }

    fn cmd_set_scissor(&mut self, cmd: CommandBufferId, scissor: Rect2D) -> Result<()> {
        self.command_buffer(cmd)?.set_scissor(&self.ctx.device, scissor)
    }

    fn cmd_bind_pipeline(&mut self, cmd: CommandBufferId, pipeline: GpuPipelineId) -> Result<()> {
        let pipeline = lookup(&self.pipelines, pipeline, "pipeline")?;
        let buffer = self.recording(cmd)?;
        unsafe {
            self.ctx.device.cmd_bind_pipeline(buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
        Ok(())
    }

    fn cmd_bind_descriptor_sets(
        &mut self,
        cmd: CommandBufferId,
        layout: PipelineLayoutId,
        first_set: u32,
        sets: &[DescriptorSetId],
    ) -> Result<()> {
        let layout = lookup(&self.pipeline_layouts, layout, "pipeline layout")?;
        let vk_sets = sets
            .iter()
            .map(|&id| {
                self.descriptor_sets
                    .get(id)
                    .map(|set| set.set)
                    .ok_or_else(|| unknown("descriptor set"))
            })
            .collect::<Result<Vec<_>>>()?;
        let buffer = self.recording(cmd)?;

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                &vk_sets,
                &[],
            );
        }
        Ok(())
    }

    fn cmd_push_constants(
        &mut self,
        cmd: CommandBufferId,
        layout: PipelineLayoutId,
        stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        let layout = lookup(&self.pipeline_layouts, layout, "pipeline layout")?;
        let buffer = self.recording(cmd)?;
        unsafe {
            self.ctx.device.cmd_push_constants(buffer, layout, stage_flags_to_vk(stages), offset, data);
        }
        Ok(())
    }

    fn cmd_bind_vertex_buffer(&mut self, cmd: CommandBufferId, binding: u32, buffer: GpuBufferId) -> Result<()> {
        let vk_buffer = self.buffers.get(buffer).ok_or_else(|| unknown("buffer"))?.buffer;
        let cb = self.recording(cmd)?;
        unsafe {
            self.ctx.device.cmd_bind_vertex_buffers(cb, binding, &[vk_buffer], &[0]);
        }
        Ok(())
    }

    fn cmd_bind_index_buffer(&mut self, cmd: CommandBufferId, buffer: GpuBufferId, index_type: IndexType) -> Result<()> {
        let vk_buffer = self.buffers.get(buffer).ok_or_else(|| unknown("buffer"))?.buffer;
        let cb = self.recording(cmd)?;
        unsafe {
            self.ctx.device.cmd_bind_index_buffer(cb, vk_buffer, 0, index_type_to_vk(index_type));
        }
        Ok(())
    }

    fn cmd_draw(&mut self, cmd: CommandBufferId, vertex_count: u32, instance_count: u32) -> Result<()> {
        let buffer = self.command_buffer(cmd)?.require(true)?;
        unsafe {
            self.ctx.device.cmd_draw(buffer, vertex_count, instance_count, 0, 0);
        }
        Ok(())
    }

    fn cmd_draw_indexed(&mut self, cmd: CommandBufferId, index_count: u32, instance_count: u32) -> Result<()> {
        let buffer = self.command_buffer(cmd)?.require(true)?;
        unsafe {
            self.ctx.device.cmd_draw_indexed(buffer, index_count, instance_count, 0, 0, 0);
        }
        Ok(())
    }

    // ===== SYNCHRONIZATION =====

    fn create_fence(&mut self, signaled: bool) -> Result<FenceId> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let fence = unsafe {
            self.ctx.device.create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create fence: {:?}", e))?
        };
        Ok(self.fences.insert(fence))
    }

    fn destroy_fence(&mut self, fence: FenceId) {
        if let Some(fence) = self.fences.remove(fence) {
            unsafe { self.ctx.device.destroy_fence(fence, None); }
        }
    }

    fn create_semaphore(&mut self) -> Result<SemaphoreId> {
        let semaphore = unsafe {
            self.ctx.device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to create semaphore: {:?}", e))?
        };
        Ok(self.semaphores.insert(semaphore))
    }

    fn destroy_semaphore(&mut self, semaphore: SemaphoreId) {
        if let Some(semaphore) = self.semaphores.remove(semaphore) {
            unsafe { self.ctx.device.destroy_semaphore(semaphore, None); }
        }
    }

    fn wait_for_fence(&mut self, fence: FenceId) -> Result<()> {
        let fence = lookup(&self.fences, fence, "fence")?;
        unsafe {
            self.ctx.device
                .wait_for_fences(&[fence], true, u64::MAX)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to wait for fence: {:?}", e))
        }
    }

    fn reset_fence(&mut self, fence: FenceId) -> Result<()> {
        let fence = lookup(&self.fences, fence, "fence")?;
        unsafe {
            self.ctx.device
                .reset_fences(&[fence])
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to reset fence: {:?}", e))
        }
    }

    fn submit(&mut self, submit: &SubmitInfo) -> Result<()> {
        let command_buffers = submit.command_buffers
            .iter()
            .map(|&id| {
                let cmd = self.command_buffer(id)?;
                if cmd.state != RecordingState::Executable {
                    return Err(Error::BackendError(format!(
                        "Submitted command buffer is {:?}, expected Executable",
                        cmd.state
                    )));
                }
                Ok(cmd.buffer)
            })
            .collect::<Result<Vec<_>>>()?;
        let wait_semaphores = submit.wait_semaphores
            .iter()
            .map(|&id| lookup(&self.semaphores, id, "semaphore"))
            .collect::<Result<Vec<_>>>()?;
        let signal_semaphores = submit.signal_semaphores
            .iter()
            .map(|&id| lookup(&self.semaphores, id, "semaphore"))
            .collect::<Result<Vec<_>>>()?;
        let fence = match submit.fence {
            Some(fence) => lookup(&self.fences, fence, "fence")?,
            None => vk::Fence::null(),
        };

        let wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.ctx.device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], fence)
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to submit commands to GPU queue: {:?}", e))
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe {
            self.ctx.device
                .device_wait_idle()
                .map_err(|e| engine_err!("lumen3d::vulkan", "Failed to wait idle: {:?}", e))
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();

            let device = &self.ctx.device;

            // 1. Objects that reference others
            for (_, pipeline) in self.pipelines.drain() {
                device.destroy_pipeline(pipeline, None);
            }
            for (_, layout) in self.pipeline_layouts.drain() {
                device.destroy_pipeline_layout(layout, None);
            }
            self.descriptor_sets.clear();
            for (_, pool) in self.descriptor_pools.drain() {
                device.destroy_descriptor_pool(pool, None);
            }
            for (_, layout) in self.set_layouts.drain() {
                device.destroy_descriptor_set_layout(layout, None);
            }
            for (_, framebuffer) in self.framebuffers.drain() {
                device.destroy_framebuffer(framebuffer, None);
            }
            for (_, render_pass) in self.render_passes.drain() {
                device.destroy_render_pass(render_pass, None);
            }
            for (_, shader) in self.shaders.drain() {
                device.destroy_shader_module(shader.module, None);
            }
            self.samplers.shutdown(device);

            // 2. Command buffers go with their pool
            self.command_buffers.clear();
            device.destroy_command_pool(self.command_pool, None);
            for (_, fence) in self.fences.drain() {
                device.destroy_fence(fence, None);
            }
            for (_, semaphore) in self.semaphores.drain() {
                device.destroy_semaphore(semaphore, None);
            }

            // 3. Memory-backed resources, while the allocator is alive
            self.swapchain_image_ids.clear();
            let images: Vec<Image> = self.images.drain().map(|(_, image)| image).collect();
            for image in images {
                image.destroy(&mut self.ctx);
            }
            let buffers: Vec<Buffer> = self.buffers.drain().map(|(_, buffer)| buffer).collect();
            for buffer in buffers {
                buffer.destroy(&mut self.ctx);
            }
            if let Some(mut swapchain) = self.swapchain.take() {
                swapchain.destroy();
            }

            // 4. Allocator and device, then instance-level objects
            self.ctx.destroy();
            self.surface_loader.destroy_surface(self.surface, None);
            crate::debug::cleanup_debug_config();
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.ctx.instance.destroy_instance(None);
        }
    }
}
