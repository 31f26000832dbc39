//! GPU device context management.

use crate::capabilities::GpuCapabilities;
use crate::command::CommandPool;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use crate::surface::SurfaceContext;
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

/// Main GPU context holding the instance, device, queues, and allocator.
///
/// All GPU objects borrow from this context and must be destroyed before it.
pub struct DeviceContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) surface: SurfaceContext,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,

    // Queue families and queues
    pub(crate) graphics_queue_family: u32,
    pub(crate) present_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,

    // Long-lived pool for frame command buffers, transient pool for uploads
    pub(crate) graphics_pool: CommandPool,
    pub(crate) transfer_pool: CommandPool,
}

impl DeviceContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get the present queue family index.
    pub fn present_queue_family(&self) -> u32 {
        self.present_queue_family
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Get the command pool used for frame command buffers.
    pub fn graphics_pool(&self) -> &CommandPool {
        &self.graphics_pool
    }

    /// Record and run a one-shot command buffer on the graphics queue.
    ///
    /// Blocks on a fence until the GPU has finished, so buffers and images
    /// touched by the recorded commands are safe to free afterwards.
    pub fn execute<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        unsafe {
            let cmd = self.transfer_pool.allocate_primary(&self.device)?;

            crate::command::begin_command_buffer(
                &self.device,
                cmd,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )?;
            let recorded = record(cmd);
            let ended = crate::command::end_command_buffer(&self.device, cmd);

            let cmd_buffers = [cmd];
            if let Err(e) = recorded.and(ended) {
                self.transfer_pool.free(&self.device, &cmd_buffers);
                return Err(e);
            }

            let fence = self
                .device
                .create_fence(&vk::FenceCreateInfo::default(), None)?;

            let submit_info = vk::SubmitInfo::default().command_buffers(&cmd_buffers);
            let submitted = self
                .device
                .queue_submit(self.graphics_queue, &[submit_info], fence)
                .and_then(|()| self.device.wait_for_fences(&[fence], true, u64::MAX));

            self.device.destroy_fence(fence, None);
            self.transfer_pool.free(&self.device, &cmd_buffers);

            submitted?;
        }
        Ok(())
    }

    /// Submit command buffers to the graphics queue.
    ///
    /// The caller supplies the full wait/signal plan; nothing is inferred
    /// here.
    ///
    /// # Safety
    /// All handles must be valid and the command buffers executable.
    pub unsafe fn submit(
        &self,
        command_buffers: &[vk::CommandBuffer],
        wait_semaphores: &[vk::Semaphore],
        wait_stages: &[vk::PipelineStageFlags],
        signal_semaphores: &[vk::Semaphore],
        fence: vk::Fence,
    ) -> Result<()> {
        crate::command::submit_command_buffers(
            &self.device,
            self.graphics_queue,
            command_buffers,
            wait_semaphores,
            wait_stages,
            signal_semaphores,
            fence,
        )
    }

    /// Present a swapchain image on the present queue.
    ///
    /// Returns `true` when the swapchain is suboptimal or out of date and
    /// must be recreated before the next frame.
    pub fn present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present_info)
        };

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            self.graphics_pool.destroy(&self.device);
            self.transfer_pool.destroy(&self.device);

            // Shutdown allocator BEFORE destroying device
            // This frees all VkDeviceMemory allocations
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a device context.
pub struct DeviceContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for DeviceContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Prism".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl DeviceContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the device context against a window surface.
    pub fn build<W>(self, window: &W) -> Result<DeviceContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        // Create Vulkan instance
        let instance = unsafe { create_instance(&entry, &self.app_name, self.enable_validation) }?;

        // The surface must exist before device selection so present support
        // can be queried per queue family
        let surface = unsafe { SurfaceContext::from_window(&entry, &instance, window) }?;

        // Select best physical device
        let physical_device = unsafe { select_physical_device(&instance) }?;

        // Query capabilities
        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };

        tracing::info!("Selected GPU: {}", capabilities.summary());

        // Find queue families
        let queue_families =
            unsafe { find_queue_families(&instance, physical_device, &surface) }?;

        // Create logical device
        let (device, graphics_queue, present_queue) =
            unsafe { create_device(&instance, physical_device, &queue_families)? };

        let device = Arc::new(device);

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        // Create GPU allocator
        let allocator = unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        // Frame command buffers are reset and re-recorded every frame
        let graphics_pool = unsafe {
            CommandPool::new(
                &device,
                queue_families.graphics,
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };

        // Upload command buffers are recorded once and thrown away
        let transfer_pool = unsafe {
            CommandPool::new(
                &device,
                queue_families.graphics,
                vk::CommandPoolCreateFlags::TRANSIENT,
            )?
        };

        Ok(DeviceContext {
            entry,
            instance,
            surface,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            swapchain_loader,
            graphics_queue_family: queue_families.graphics,
            present_queue_family: queue_families.present,
            graphics_queue,
            present_queue,
            graphics_pool,
            transfer_pool,
        })
    }
}

/// Queue family indices.
struct QueueFamilyIndices {
    graphics: u32,
    present: u32,
}

/// Find queue families for graphics and presentation.
///
/// # Safety
/// The instance, physical device, and surface must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &SurfaceContext,
) -> Result<QueueFamilyIndices> {
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut graphics_family = None;
    let mut present_family = None;

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) && graphics_family.is_none() {
            graphics_family = Some(i);
        }

        if present_family.is_none() && surface.supports_present(physical_device, i)? {
            present_family = Some(i);
        }

        if graphics_family.is_some() && present_family.is_some() {
            break;
        }
    }

    let graphics = graphics_family.ok_or(GpuError::NoSuitableDevice)?;
    let present = present_family.ok_or(GpuError::NoSuitableDevice)?;

    Ok(QueueFamilyIndices { graphics, present })
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    // Collect unique queue families; graphics and present often coincide
    let mut unique_families = std::collections::HashSet::new();
    unique_families.insert(queue_families.graphics);
    unique_families.insert(queue_families.present);

    // Create queue create infos
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    // Get required extensions
    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    // Create the device
    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    // Get queue handles
    let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
    let present_queue = device.get_device_queue(queue_families.present, 0);

    Ok((device, graphics_queue, present_queue))
}
