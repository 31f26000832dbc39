//! GPU memory management.

use crate::context::DeviceContext;
use crate::error::{GpuError, Result};
use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

/// GPU memory allocator wrapper.
pub struct GpuAllocator {
    allocator: Option<Allocator>,
    device: Arc<ash::Device>,
}

impl GpuAllocator {
    /// Create a new allocator.
    ///
    /// # Safety
    /// The instance, device, and physical device must be valid.
    pub unsafe fn new(
        instance: &ash::Instance,
        device: Arc<ash::Device>,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: (*device).clone(),
            physical_device,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: cfg!(debug_assertions),
                log_leaks_on_shutdown: true,
                store_stack_traces: cfg!(debug_assertions),
                log_allocations: false,
                log_frees: false,
                log_stack_traces: false,
            },
            // The device is created without the buffer device address feature
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        Ok(Self {
            allocator: Some(allocator),
            device,
        })
    }

    /// Allocate a buffer.
    pub fn create_buffer(
        &mut self,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<GpuBuffer> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device
                .create_buffer(&buffer_info, None)
                .map_err(GpuError::from)?
        };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = self
            .allocator
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Allocator not initialized".to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .map_err(GpuError::from)?;
        }

        Ok(GpuBuffer {
            buffer,
            allocation: Some(allocation),
            size,
        })
    }

    /// Free a buffer allocation.
    pub fn free_buffer(&mut self, buffer: &mut GpuBuffer) -> Result<()> {
        if let Some(allocation) = buffer.allocation.take() {
            self.allocator
                .as_mut()
                .ok_or_else(|| GpuError::InvalidState("Allocator not initialized".to_string()))?
                .free(allocation)
                .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;
        }

        unsafe {
            self.device.destroy_buffer(buffer.buffer, None);
        }
        buffer.buffer = vk::Buffer::null();

        Ok(())
    }

    /// Allocate memory for an image and bind it.
    ///
    /// The caller owns the returned image handle and allocation; image
    /// views are layered on top by the image module.
    pub fn allocate_image(
        &mut self,
        create_info: &vk::ImageCreateInfo,
        name: &str,
    ) -> Result<(vk::Image, Allocation)> {
        let image = unsafe {
            self.device
                .create_image(create_info, None)
                .map_err(GpuError::from)?
        };

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = self
            .allocator
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Allocator not initialized".to_string()))?
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .map_err(GpuError::from)?;
        }

        Ok((image, allocation))
    }

    /// Free an image allocation and destroy the image.
    pub fn free_image(&mut self, image: vk::Image, allocation: Allocation) -> Result<()> {
        self.allocator
            .as_mut()
            .ok_or_else(|| GpuError::InvalidState("Allocator not initialized".to_string()))?
            .free(allocation)
            .map_err(|e| GpuError::AllocationFailed(e.to_string()))?;

        unsafe {
            self.device.destroy_image(image, None);
        }

        Ok(())
    }

    /// Shutdown the allocator, freeing all GPU memory.
    ///
    /// This must be called before the Vulkan device is destroyed.
    /// Any remaining allocations will be freed (and logged as leaks).
    pub fn shutdown(&mut self) {
        // Take and drop the inner allocator to free all GPU memory
        // The gpu_allocator::Allocator::Drop will call vkFreeMemory
        if let Some(allocator) = self.allocator.take() {
            drop(allocator);
        }
    }
}

impl Drop for GpuAllocator {
    fn drop(&mut self) {
        // Shutdown if not already done
        self.shutdown();
    }
}

/// A GPU buffer with its allocation.
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub allocation: Option<Allocation>,
    pub size: u64,
}

impl GpuBuffer {
    /// Create a device-local buffer filled through a staging copy.
    ///
    /// The staging buffer is freed before returning; the copy runs to
    /// completion on the graphics queue.
    pub fn new_static(
        ctx: &DeviceContext,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
        name: &str,
    ) -> Result<Self> {
        let size = bytes.len() as u64;

        let mut staging = ctx.allocator().lock().create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "staging",
        )?;
        staging.upload(bytes, 0)?;

        let buffer = ctx.allocator().lock().create_buffer(
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            name,
        )?;

        let region = staging_copy_region(size);
        let copied = ctx.execute(|cmd| {
            unsafe {
                ctx.device()
                    .cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
            }
            Ok(())
        });

        ctx.allocator().lock().free_buffer(&mut staging)?;
        copied?;

        Ok(buffer)
    }

    /// Create a host-visible buffer with a retained mapping.
    ///
    /// The mapping stays valid for the buffer's lifetime, so per-frame
    /// uploads never remap.
    pub fn new_dynamic(
        ctx: &DeviceContext,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
        name: &str,
    ) -> Result<Self> {
        let buffer = ctx.allocator().lock().create_buffer(
            bytes.len() as u64,
            usage,
            MemoryLocation::CpuToGpu,
            name,
        )?;
        buffer.upload(bytes, 0)?;
        Ok(buffer)
    }

    /// Create a host-visible buffer of the given size without initial data.
    pub fn new_dynamic_uninit(
        ctx: &DeviceContext,
        usage: vk::BufferUsageFlags,
        size: u64,
        name: &str,
    ) -> Result<Self> {
        ctx.allocator()
            .lock()
            .create_buffer(size, usage, MemoryLocation::CpuToGpu, name)
    }

    /// Map the buffer memory for CPU access.
    pub fn mapped_ptr(&self) -> Option<*mut u8> {
        self.allocation
            .as_ref()
            .and_then(|a| a.mapped_ptr())
            .map(|p| p.as_ptr() as *mut u8)
    }

    /// Write bytes at the given offset through the persistent mapping.
    ///
    /// Fails if the range exceeds the buffer or the buffer is not
    /// host-visible.
    pub fn upload(&self, bytes: &[u8], offset: u64) -> Result<()> {
        let end = offset
            .checked_add(bytes.len() as u64)
            .ok_or_else(|| GpuError::InvalidState("Upload offset overflow".to_string()))?;
        if end > self.size {
            return Err(GpuError::InvalidState(format!(
                "Upload range {offset}..{end} exceeds buffer size {}",
                self.size
            )));
        }

        let ptr = self
            .mapped_ptr()
            .ok_or_else(|| GpuError::InvalidState("Buffer not mapped".to_string()))?;

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(offset as usize), bytes.len());
        }

        Ok(())
    }

    /// Write typed data from the start of the buffer.
    pub fn write<T: Copy>(&self, data: &[T]) -> Result<()> {
        let bytes = unsafe {
            std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), std::mem::size_of_val(data))
        };
        self.upload(bytes, 0)
    }
}

/// Copy region covering a whole staging upload.
pub(crate) fn staging_copy_region(size: u64) -> vk::BufferCopy {
    vk::BufferCopy::default()
        .src_offset(0)
        .dst_offset(0)
        .size(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_region_matches_payload_size() {
        for size in [1_u64, 48, 1024, 4 * 1024 * 1024] {
            let region = staging_copy_region(size);
            assert_eq!(region.src_offset, 0);
            assert_eq!(region.dst_offset, 0);
            assert_eq!(region.size, size);
        }
    }

    #[test]
    fn upload_rejects_out_of_bounds_range() {
        let buffer = GpuBuffer {
            buffer: vk::Buffer::null(),
            allocation: None,
            size: 64,
        };

        assert!(buffer.upload(&[0_u8; 65], 0).is_err());
        assert!(buffer.upload(&[0_u8; 32], 33).is_err());
        assert!(buffer.upload(&[0_u8; 1], u64::MAX).is_err());
    }

    #[test]
    fn upload_in_bounds_fails_only_on_missing_mapping() {
        let buffer = GpuBuffer {
            buffer: vk::Buffer::null(),
            allocation: None,
            size: 64,
        };

        // Range is valid; the unmapped test buffer is the only failure
        let err = buffer.upload(&[0_u8; 64], 0).unwrap_err();
        assert!(err.to_string().contains("not mapped"));
    }
}
